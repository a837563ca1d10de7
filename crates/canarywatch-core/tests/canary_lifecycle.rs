//! End-to-end canary lifecycle: write, check, tamper, stale, rekey.

use std::fs;
use std::time::Duration;

use canarywatch_core::canary::{CanaryRecord, CanaryStore, SecretKey};
use canarywatch_core::{CanaryStatus, CanaryWatchError};

const KEY_HEX: &str = "aabbccddeeff00112233445566778899aabbccddeeff00112233445566778899";
const OTHER_KEY_HEX: &str = "99887766554433221100ffeeddccbbaa99887766554433221100ffeeddccbbaa";

fn store_at(dir: &std::path::Path, staleness: Duration) -> CanaryStore {
    CanaryStore::new(
        dir.join("canary.json"),
        SecretKey::from_hex(KEY_HEX).unwrap(),
        staleness,
        None,
    )
}

#[test]
fn write_then_check_is_ok() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();
    assert_eq!(store.check_canary(), CanaryStatus::Ok);
}

#[test]
fn check_without_write_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_at(dir.path(), Duration::from_secs(300));
    assert_eq!(store.check_canary(), CanaryStatus::Missing);
}

#[test]
fn deleted_file_is_missing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();
    fs::remove_file(store.path()).unwrap();
    assert_eq!(store.check_canary(), CanaryStatus::Missing);
}

#[test]
fn mutated_record_is_tampered_hash() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();

    // Flip one byte of the nonce while keeping the record parseable.
    let mut record: CanaryRecord =
        serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
    let mut nonce: Vec<u8> = record.nonce.into_bytes();
    nonce[0] = if nonce[0] == b'0' { b'1' } else { b'0' };
    record.nonce = String::from_utf8(nonce).unwrap();
    fs::write(store.path(), serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(store.check_canary(), CanaryStatus::TamperedHash);
}

#[test]
fn forged_signature_is_tampered_hash() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();

    let mut record: CanaryRecord =
        serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
    record.signature = "00".repeat(32);
    fs::write(store.path(), serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(store.check_canary(), CanaryStatus::TamperedHash);
}

#[test]
fn unparsable_content_is_tampered_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();
    fs::write(store.path(), b"this is not a canary record").unwrap();
    assert_eq!(store.check_canary(), CanaryStatus::TamperedContent);
}

#[test]
fn malformed_signature_field_is_tampered_content() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();

    let mut record: CanaryRecord =
        serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
    record.signature = "abcd".to_string();
    fs::write(store.path(), serde_json::to_vec(&record).unwrap()).unwrap();

    assert_eq!(store.check_canary(), CanaryStatus::TamperedContent);
}

#[test]
fn old_record_is_stale() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_millis(10));

    store.write_canary().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(store.check_canary(), CanaryStatus::Stale);
}

#[test]
fn rewrite_clears_staleness() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_millis(10));

    store.write_canary().unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(store.check_canary(), CanaryStatus::Stale);

    store.write_canary().unwrap();
    assert_eq!(store.check_canary(), CanaryStatus::Ok);
}

#[test]
fn unreadable_path_is_error_status() {
    let dir = tempfile::tempdir().unwrap();
    // A directory at the canary path: read fails with something other than
    // NotFound, which is environmental failure, not tamper evidence.
    let path = dir.path().join("canary.json");
    fs::create_dir(&path).unwrap();

    let store = CanaryStore::new(
        path,
        SecretKey::from_hex(KEY_HEX).unwrap(),
        Duration::from_secs(300),
        None,
    );
    assert_eq!(store.check_canary(), CanaryStatus::Error);
}

#[test]
fn sequence_advances_on_every_write() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    let first = store.write_canary().unwrap();
    let second = store.write_canary().unwrap();
    let third = store.write_canary().unwrap();

    assert_eq!(second.sequence, first.sequence + 1);
    assert_eq!(third.sequence, second.sequence + 1);
    assert_ne!(first.nonce, second.nonce);
}

#[test]
fn sequence_resumes_across_store_instances() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));
    store.write_canary().unwrap();
    store.write_canary().unwrap();
    let last = store.sequence();

    let mut reopened = store_at(dir.path(), Duration::from_secs(300));
    let record = reopened.write_canary().unwrap();
    assert_eq!(record.sequence, last + 1);
}

#[test]
fn atomic_replace_leaves_no_debris() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));

    store.write_canary().unwrap();
    store.write_canary().unwrap();

    let entries: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(entries, vec!["canary.json".to_string()]);
}

#[test]
fn rate_limit_refuses_early_rewrites() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = CanaryStore::new(
        dir.path().join("canary.json"),
        SecretKey::from_hex(KEY_HEX).unwrap(),
        Duration::from_secs(300),
        Some(Duration::from_millis(100)),
    );

    store.write_canary().unwrap();
    match store.write_canary() {
        Err(CanaryWatchError::RateLimited { .. }) => {}
        other => panic!("expected RateLimited, got {other:?}"),
    }

    std::thread::sleep(Duration::from_millis(150));
    store.write_canary().unwrap();
}

#[test]
fn rekey_rewrites_under_the_new_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));
    store.write_canary().unwrap();

    store
        .rekey(SecretKey::from_hex(OTHER_KEY_HEX).unwrap())
        .unwrap();
    // No spurious TAMPERED_HASH after the swap.
    assert_eq!(store.check_canary(), CanaryStatus::Ok);

    // A store still holding the old key now sees proven tamper.
    let old_view = store_at(dir.path(), Duration::from_secs(300));
    assert_eq!(old_view.check_canary(), CanaryStatus::TamperedHash);
}

#[cfg(unix)]
#[test]
fn canary_file_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let mut store = store_at(dir.path(), Duration::from_secs(300));
    store.write_canary().unwrap();

    let mode = fs::metadata(store.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
