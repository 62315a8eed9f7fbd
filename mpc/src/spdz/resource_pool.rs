use rand::{rngs::StdRng, SeedableRng};
use sha3::{Digest, Sha3_256};

use crate::config::{ConfigError, PreprocessingStrategy, SpdzConfig};
use crate::fields::MpcField;
use crate::preprocessing::{BatchedSupplier, DataSupplier, FakeGeneratorFactory, GeneratorFactory};
use crate::serializer::FieldSerializer;

use super::opened_values::OpenedValueStore;

/// Per-party context of a SPDZ run.
///
/// Fixed after construction except for the supplier queues, the randomness source and
/// the opened-value buffer, all of which are consumed in the same order on every
/// honest party.
pub struct SpdzResourcePool<T: MpcField> {
    party_id: usize,
    num_parties: usize,
    config: SpdzConfig,
    supplier: Box<dyn DataSupplier<T>>,
    opened_values: OpenedValueStore<T>,
    rng: StdRng,
    serializer: FieldSerializer<T>,
}

impl<T: MpcField> SpdzResourcePool<T> {
    /// Create new context. Fails before any interaction if the configuration is invalid.
    pub fn new(
        party_id: usize,
        num_parties: usize,
        config: SpdzConfig,
        supplier: Box<dyn DataSupplier<T>>,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        config.validate(num_parties, party_id, T::NUM_BITS)?;
        Ok(Self {
            party_id,
            num_parties,
            config,
            supplier,
            opened_values: OpenedValueStore::new(),
            rng,
            serializer: FieldSerializer::new(),
        })
    }

    /// Create new context served by a [`BatchedSupplier`] over the given generator factory.
    pub fn with_generator<F>(
        party_id: usize,
        num_parties: usize,
        config: SpdzConfig,
        key_share: T,
        factory: F,
        mut rng: StdRng,
    ) -> Result<Self, ConfigError>
    where
        F: GeneratorFactory<T> + 'static,
    {
        let mut seed = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rng, &mut seed);
        let supplier = BatchedSupplier::new(
            party_id,
            num_parties,
            key_share,
            factory,
            config.batch_size,
            config.exp_pipe_length,
            seed,
        );
        Self::new(party_id, num_parties, config, Box::new(supplier), rng)
    }

    /// Create new context with insecure fake preprocessing. Only for tests and demos.
    pub fn fake(
        party_id: usize,
        num_parties: usize,
        config: SpdzConfig,
    ) -> Result<Self, ConfigError> {
        let seed = match config.preprocessing {
            PreprocessingStrategy::Fake { seed } => seed,
            PreprocessingStrategy::External => return Err(ConfigError::ExternalPreprocessing),
        };
        // The factory derives this party's key share eagerly, so ids are checked first.
        config.validate(num_parties, party_id, T::NUM_BITS)?;
        let factory = FakeGeneratorFactory::new(num_parties, party_id, seed);
        let key_share = factory.key_share();
        Self::with_generator(
            party_id,
            num_parties,
            config,
            key_share,
            factory,
            StdRng::from_entropy(),
        )
    }

    /// ID of current party, starting at 1.
    pub fn party_id(&self) -> usize {
        self.party_id
    }

    pub fn num_parties(&self) -> usize {
        self.num_parties
    }

    pub fn config(&self) -> &SpdzConfig {
        &self.config
    }

    /// This party's share of the MAC key.
    pub fn key_share(&self) -> T {
        self.supplier.secret_shared_key()
    }

    pub fn supplier(&mut self) -> &mut dyn DataSupplier<T> {
        self.supplier.as_mut()
    }

    pub fn opened_values(&mut self) -> &mut OpenedValueStore<T> {
        &mut self.opened_values
    }

    /// Source of local randomness for commitments and coin tossing.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn serializer(&self) -> FieldSerializer<T> {
        self.serializer
    }

    /// Fresh instance of the digest used for commitments and broadcast validation.
    pub fn message_digest(&self) -> Sha3_256 {
        Sha3_256::new()
    }
}
