//! Supply of single-use correlated randomness.
//!
//! A [`DataSupplier`] hands out triples, input masks, random elements, random bits and
//! exponentiation pipes one at a time. The only implementation shipped here,
//! [`BatchedSupplier`], serves them from per-kind queues refilled in batches from a
//! [`BulkGenerator`] that it constructs lazily through a [`GeneratorFactory`].

use async_trait::async_trait;
use thiserror::Error;

use crate::fields::MpcField;
use crate::spdz::{SpdzInputMask, SpdzShare, SpdzTriple};

mod batched;
mod fake;

pub use batched::BatchedSupplier;
pub use fake::{FakeGenerator, FakeGeneratorFactory};

/// Kind of preprocessed item, used in error reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreprocessingKind {
    Triple,
    InputMask,
    RandomElement,
    RandomBit,
    ExpPipe,
}

#[derive(Debug, Error)]
pub enum PreprocessingError {
    #[error("bulk generator failed: {0}")]
    Generator(String),

    #[error("bulk generator returned {actual} of {expected} requested {kind:?} items")]
    IncompleteBatch {
        kind: PreprocessingKind,
        expected: usize,
        actual: usize,
    },

    #[error("input mask toward this party carries no real value")]
    MissingMaskValue,

    #[error("no party with ID {0}")]
    NoSuchParty(usize),
}

/// Parameters handed to a [`GeneratorFactory`] when the generator is first needed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratorParams {
    pub party_id: usize,
    pub peers: Vec<usize>,
    pub seed: [u8; 32],
    pub modulus_bit_length: u32,
    pub batch_size: usize,
}

/// Producer of correlated randomness in bulk, e.g. an OT-extension based protocol.
///
/// Every call must return exactly the requested number of items, consistent across
/// all parties that issue the same call in the same order.
#[async_trait(?Send)]
pub trait BulkGenerator<T: MpcField> {
    async fn triples(&mut self, n: usize) -> Result<Vec<SpdzTriple<T>>, PreprocessingError>;

    /// Masks whose real value is known only to party `toward`.
    async fn input_masks(
        &mut self,
        toward: usize,
        n: usize,
    ) -> Result<Vec<SpdzInputMask<T>>, PreprocessingError>;

    async fn random_elements(&mut self, n: usize)
        -> Result<Vec<SpdzShare<T>>, PreprocessingError>;

    /// Shares of uniformly random values in {0, 1}.
    async fn random_bits(&mut self, n: usize) -> Result<Vec<SpdzShare<T>>, PreprocessingError>;

    /// Pipes `[r^-1, r, r^2, ..., r^(length-1)]` for random non-zero `r`.
    async fn exp_pipes(
        &mut self,
        n: usize,
        length: usize,
    ) -> Result<Vec<Vec<SpdzShare<T>>>, PreprocessingError>;
}

/// Constructs a [`BulkGenerator`], possibly setting up its own network connections.
#[async_trait(?Send)]
pub trait GeneratorFactory<T: MpcField> {
    type Generator: BulkGenerator<T>;

    async fn create(&mut self, params: GeneratorParams)
        -> Result<Self::Generator, PreprocessingError>;
}

/// Source of preprocessed material for one party. Never returns the same item twice.
#[async_trait(?Send)]
pub trait DataSupplier<T: MpcField> {
    /// This party's additive share of the global MAC key.
    fn secret_shared_key(&self) -> T;

    async fn next_triple(&mut self) -> Result<SpdzTriple<T>, PreprocessingError>;

    async fn next_input_mask(&mut self, toward: usize)
        -> Result<SpdzInputMask<T>, PreprocessingError>;

    async fn next_random_element(&mut self) -> Result<SpdzShare<T>, PreprocessingError>;

    async fn next_exp_pipe(&mut self) -> Result<Vec<SpdzShare<T>>, PreprocessingError>;

    async fn next_random_bit(&mut self) -> Result<SpdzShare<T>, PreprocessingError>;
}
