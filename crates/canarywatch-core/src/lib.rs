//! # canarywatch-core
//!
//! Core engines for CanaryWatch -- a tamper-evident integrity tripwire with
//! composite risk scoring.
//!
//! This crate defines the canary store (signed record, atomic writes, status
//! classification), the risk signal collectors, the composite entropy engine
//! with its alert levels, and the metabolic noise generator. Scheduling and
//! I/O collaborators (HTTP metadata source, snapshot log, escalation
//! consumers) live in the daemon crate.

pub mod canary;
pub mod config;
pub mod entropy;
pub mod error;
pub mod noise;
pub mod signals;

pub use canary::{CanaryRecord, CanaryStatus, CanaryStore, SecretKey};
pub use entropy::{ChaosLevel, EntropySnapshot};
pub use error::{CanaryWatchError, Result};
pub use signals::RiskSignal;
