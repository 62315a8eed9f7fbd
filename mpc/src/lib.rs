//! Online phase of the SPDZ protocol for secure multi-party computation.
//!
//! Parties hold additive shares of secret values together with shares of a MAC under a
//! secret-shared global key. Linear operations are local; inputs, multiplications and
//! openings run as round-based [`spdz::NativeProtocol`]s driven by a [`SpdzEvaluator`],
//! consuming correlated randomness from a [`preprocessing::DataSupplier`]. Opened values
//! are authenticated in batches by the MAC check.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod fields;
pub mod preprocessing;
pub mod serializer;
pub mod spdz;
pub mod testing;
pub mod transport;

pub use config::SpdzConfig;
pub use error::{ErrorCategory, Result, SpdzError};
pub use evaluator::{EvaluationStats, SpdzEvaluator};
pub use fields::MpcField;
pub use spdz::{SpdzResourcePool, SpdzShare};
