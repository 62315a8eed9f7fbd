//! In-process parties for tests and demos.
//!
//! Preprocessing is the insecure fake generator, so nothing here is fit for production.

use crate::config::SpdzConfig;
use crate::error::Result;
use crate::evaluator::SpdzEvaluator;
use crate::fields::MpcField;
use crate::spdz::SpdzResourcePool;
use crate::transport::{mock_multiparty_channels, MockNetwork};

/// Buffer size of every in-process channel.
pub const MOCK_BUFFER_SIZE: usize = 1 << 20;

/// Evaluators for parties `1..=num_parties`, connected by in-process channels.
/// Element `i` of the result is party `i + 1`.
pub fn fake_parties<T: MpcField>(
    num_parties: usize,
    config: SpdzConfig,
) -> Result<Vec<SpdzEvaluator<T, MockNetwork>>> {
    mock_multiparty_channels::<Vec<u8>>(num_parties, MOCK_BUFFER_SIZE)
        .into_iter()
        .enumerate()
        .map(|(index, network)| {
            let pool = SpdzResourcePool::fake(index + 1, num_parties, config.clone())?;
            SpdzEvaluator::new(pool, network)
        })
        .collect()
}
