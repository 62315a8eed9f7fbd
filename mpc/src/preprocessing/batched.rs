use std::collections::VecDeque;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::fields::MpcField;
use crate::spdz::{SpdzInputMask, SpdzShare, SpdzTriple};

use super::{
    BulkGenerator, DataSupplier, GeneratorFactory, GeneratorParams, PreprocessingError,
    PreprocessingKind,
};

/// Supplier serving preprocessed items from bounded queues.
///
/// An empty queue is refilled with one batch of `batch_size` items from the bulk
/// generator, which is only constructed on the first draw.
pub struct BatchedSupplier<T: MpcField, F: GeneratorFactory<T>> {
    party_id: usize,
    num_parties: usize,
    key_share: T,
    batch_size: usize,
    exp_pipe_length: usize,
    seed: [u8; 32],
    factory: F,
    generator: Option<F::Generator>,
    triples: VecDeque<SpdzTriple<T>>,
    input_masks: Vec<VecDeque<SpdzInputMask<T>>>,
    random_elements: VecDeque<SpdzShare<T>>,
    random_bits: VecDeque<SpdzShare<T>>,
    exp_pipes: VecDeque<Vec<SpdzShare<T>>>,
    refills: usize,
}

impl<T: MpcField, F: GeneratorFactory<T>> BatchedSupplier<T, F> {
    /// Create new supplier. `key_share` must be the MAC key share the generator authenticates under.
    pub fn new(
        party_id: usize,
        num_parties: usize,
        key_share: T,
        factory: F,
        batch_size: usize,
        exp_pipe_length: usize,
        seed: [u8; 32],
    ) -> Self {
        Self {
            party_id,
            num_parties,
            key_share,
            batch_size,
            exp_pipe_length,
            seed,
            factory,
            generator: None,
            triples: VecDeque::new(),
            input_masks: (0..num_parties).map(|_| VecDeque::new()).collect(),
            random_elements: VecDeque::new(),
            random_bits: VecDeque::new(),
            exp_pipes: VecDeque::new(),
            refills: 0,
        }
    }

    /// Number of batches requested from the bulk generator so far.
    pub fn refill_count(&self) -> usize {
        self.refills
    }

    /// Whether the bulk generator has been constructed.
    pub fn is_initialized(&self) -> bool {
        self.generator.is_some()
    }

    async fn generator(&mut self) -> Result<&mut F::Generator, PreprocessingError> {
        if self.generator.is_none() {
            let params = GeneratorParams {
                party_id: self.party_id,
                peers: (1..=self.num_parties)
                    .filter(|&id| id != self.party_id)
                    .collect(),
                seed: self.seed,
                modulus_bit_length: T::NUM_BITS,
                batch_size: self.batch_size,
            };
            debug!(party_id = self.party_id, "Constructing bulk generator");
            self.generator = Some(self.factory.create(params).await?);
        }
        self.generator
            .as_mut()
            .ok_or_else(|| PreprocessingError::Generator("generator unavailable".into()))
    }

    /// Account for a fetched batch, rejecting it unless it is complete.
    fn accept<I>(
        &mut self,
        kind: PreprocessingKind,
        batch: Vec<I>,
    ) -> Result<Vec<I>, PreprocessingError> {
        if batch.len() != self.batch_size {
            return Err(PreprocessingError::IncompleteBatch {
                kind,
                expected: self.batch_size,
                actual: batch.len(),
            });
        }
        self.refills += 1;
        trace!(?kind, size = batch.len(), "Got another batch");
        Ok(batch)
    }
}

/// Pop the front of a queue the caller has just made non-empty.
fn pop<I>(queue: &mut VecDeque<I>, kind: PreprocessingKind) -> Result<I, PreprocessingError> {
    queue.pop_front().ok_or(PreprocessingError::IncompleteBatch {
        kind,
        expected: 1,
        actual: 0,
    })
}

#[async_trait(?Send)]
impl<T: MpcField, F: GeneratorFactory<T>> DataSupplier<T> for BatchedSupplier<T, F> {
    fn secret_shared_key(&self) -> T {
        self.key_share
    }

    async fn next_triple(&mut self) -> Result<SpdzTriple<T>, PreprocessingError> {
        if self.triples.is_empty() {
            trace!("Getting another triple batch");
            let n = self.batch_size;
            let batch = self.generator().await?.triples(n).await?;
            let batch = self.accept(PreprocessingKind::Triple, batch)?;
            self.triples.extend(batch);
        }
        pop(&mut self.triples, PreprocessingKind::Triple)
    }

    async fn next_input_mask(
        &mut self,
        toward: usize,
    ) -> Result<SpdzInputMask<T>, PreprocessingError> {
        if toward == 0 || toward > self.num_parties {
            return Err(PreprocessingError::NoSuchParty(toward));
        }
        if self.input_masks[toward - 1].is_empty() {
            trace!(toward, "Getting another mask batch");
            let n = self.batch_size;
            let batch = self.generator().await?.input_masks(toward, n).await?;
            let batch = self.accept(PreprocessingKind::InputMask, batch)?;
            self.input_masks[toward - 1].extend(batch);
        }
        pop(&mut self.input_masks[toward - 1], PreprocessingKind::InputMask)
    }

    async fn next_random_element(&mut self) -> Result<SpdzShare<T>, PreprocessingError> {
        if self.random_elements.is_empty() {
            trace!("Getting another random element batch");
            let n = self.batch_size;
            let batch = self.generator().await?.random_elements(n).await?;
            let batch = self.accept(PreprocessingKind::RandomElement, batch)?;
            self.random_elements.extend(batch);
        }
        pop(&mut self.random_elements, PreprocessingKind::RandomElement)
    }

    async fn next_exp_pipe(&mut self) -> Result<Vec<SpdzShare<T>>, PreprocessingError> {
        if self.exp_pipes.is_empty() {
            trace!("Getting another exp pipe batch");
            let (n, length) = (self.batch_size, self.exp_pipe_length);
            let batch = self.generator().await?.exp_pipes(n, length).await?;
            let batch = self.accept(PreprocessingKind::ExpPipe, batch)?;
            self.exp_pipes.extend(batch);
        }
        pop(&mut self.exp_pipes, PreprocessingKind::ExpPipe)
    }

    async fn next_random_bit(&mut self) -> Result<SpdzShare<T>, PreprocessingError> {
        if self.random_bits.is_empty() {
            trace!("Getting another random bit batch");
            let n = self.batch_size;
            let batch = self.generator().await?.random_bits(n).await?;
            let batch = self.accept(PreprocessingKind::RandomBit, batch)?;
            self.random_bits.extend(batch);
        }
        pop(&mut self.random_bits, PreprocessingKind::RandomBit)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use super::*;
    use crate::fields::{Mersenne61, F251};
    use crate::preprocessing::{FakeGenerator, FakeGeneratorFactory};
    use crate::serializer::FieldSerializer;

    /// Wraps the fake generator, counting calls and optionally truncating or failing batches.
    struct ProbeGenerator {
        inner: FakeGenerator<F251>,
        calls: Rc<Cell<usize>>,
        shortfall: usize,
        fail: bool,
    }

    #[async_trait(?Send)]
    impl BulkGenerator<F251> for ProbeGenerator {
        async fn triples(&mut self, n: usize) -> Result<Vec<SpdzTriple<F251>>, PreprocessingError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(PreprocessingError::Generator("peer dropped out".into()));
            }
            self.inner.triples(n - self.shortfall).await
        }

        async fn input_masks(
            &mut self,
            toward: usize,
            n: usize,
        ) -> Result<Vec<SpdzInputMask<F251>>, PreprocessingError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.input_masks(toward, n).await
        }

        async fn random_elements(
            &mut self,
            n: usize,
        ) -> Result<Vec<SpdzShare<F251>>, PreprocessingError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.random_elements(n).await
        }

        async fn random_bits(
            &mut self,
            n: usize,
        ) -> Result<Vec<SpdzShare<F251>>, PreprocessingError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.random_bits(n).await
        }

        async fn exp_pipes(
            &mut self,
            n: usize,
            length: usize,
        ) -> Result<Vec<Vec<SpdzShare<F251>>>, PreprocessingError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.exp_pipes(n, length).await
        }
    }

    struct ProbeFactory {
        inner: FakeGeneratorFactory<F251>,
        created: Rc<Cell<usize>>,
        calls: Rc<Cell<usize>>,
        shortfall: usize,
        fail: bool,
    }

    impl ProbeFactory {
        fn new(shortfall: usize, fail: bool) -> Self {
            Self {
                inner: FakeGeneratorFactory::new(2, 1, 7),
                created: Rc::new(Cell::new(0)),
                calls: Rc::new(Cell::new(0)),
                shortfall,
                fail,
            }
        }
    }

    #[async_trait(?Send)]
    impl GeneratorFactory<F251> for ProbeFactory {
        type Generator = ProbeGenerator;

        async fn create(
            &mut self,
            params: GeneratorParams,
        ) -> Result<ProbeGenerator, PreprocessingError> {
            self.created.set(self.created.get() + 1);
            Ok(ProbeGenerator {
                inner: self.inner.create(params).await?,
                calls: self.calls.clone(),
                shortfall: self.shortfall,
                fail: self.fail,
            })
        }
    }

    fn supplier(factory: ProbeFactory, batch_size: usize) -> BatchedSupplier<F251, ProbeFactory> {
        let key_share = factory.inner.key_share();
        BatchedSupplier::new(1, 2, key_share, factory, batch_size, 5, [0; 32])
    }

    #[tokio::test]
    async fn test_batch_refill() {
        let factory = ProbeFactory::new(0, false);
        let (created, calls) = (factory.created.clone(), factory.calls.clone());
        let mut supplier = supplier(factory, 4);
        assert!(!supplier.is_initialized());
        assert_eq!(created.get(), 0);

        let serializer = FieldSerializer::<F251>::new();
        let mut seen = HashSet::new();
        for _ in 0..10 {
            let triple = supplier.next_triple().await.unwrap();
            let key = [triple.a, triple.b, triple.c]
                .iter()
                .flat_map(|s| serializer.serialize_list(&[s.value, s.mac]))
                .collect::<Vec<_>>();
            assert!(seen.insert(key), "triple handed out twice");
        }

        assert_eq!(created.get(), 1);
        assert_eq!(calls.get(), 3);
        assert_eq!(supplier.refill_count(), 3);
        assert!(supplier.is_initialized());
    }

    #[tokio::test]
    async fn test_masks_and_elements_are_single_use() {
        let factory = FakeGeneratorFactory::<Mersenne61>::new(2, 1, 7);
        let key_share = factory.key_share();
        let mut supplier = BatchedSupplier::new(1, 2, key_share, factory, 3, 5, [0; 32]);

        let serializer = FieldSerializer::<Mersenne61>::new();
        let mut seen = HashSet::new();
        for toward in 1..=2 {
            for _ in 0..7 {
                let mask = supplier.next_input_mask(toward).await.unwrap();
                assert_eq!(mask.real_value.is_some(), toward == 1);
                let key = serializer.serialize_list(&[mask.mask.value, mask.mask.mac]);
                assert!(seen.insert(key), "input mask handed out twice");
            }
        }
        for _ in 0..7 {
            let element = supplier.next_random_element().await.unwrap();
            let key = serializer.serialize_list(&[element.value, element.mac]);
            assert!(seen.insert(key), "random element handed out twice");
        }

        assert_eq!(seen.len(), 21);
        // Seven draws from batches of three take three batches per queue.
        assert_eq!(supplier.refill_count(), 9);
    }

    #[tokio::test]
    async fn test_kinds_have_separate_queues() {
        let factory = ProbeFactory::new(0, false);
        let calls = factory.calls.clone();
        let mut supplier = supplier(factory, 2);

        supplier.next_input_mask(1).await.unwrap();
        supplier.next_input_mask(2).await.unwrap();
        supplier.next_input_mask(1).await.unwrap();
        supplier.next_random_element().await.unwrap();
        supplier.next_random_bit().await.unwrap();
        let pipe = supplier.next_exp_pipe().await.unwrap();

        assert_eq!(pipe.len(), 5);
        assert_eq!(calls.get(), 5);
        assert!(matches!(
            supplier.next_input_mask(3).await,
            Err(PreprocessingError::NoSuchParty(3))
        ));
    }

    #[tokio::test]
    async fn test_own_masks_carry_real_value() {
        let mut supplier = supplier(ProbeFactory::new(0, false), 4);
        assert!(supplier.next_input_mask(1).await.unwrap().real_value.is_some());
        assert!(supplier.next_input_mask(2).await.unwrap().real_value.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_batch_is_rejected() {
        let mut supplier = supplier(ProbeFactory::new(1, false), 4);
        assert!(matches!(
            supplier.next_triple().await,
            Err(PreprocessingError::IncompleteBatch {
                kind: PreprocessingKind::Triple,
                expected: 4,
                actual: 3
            })
        ));
        assert_eq!(supplier.refill_count(), 0);
    }

    #[tokio::test]
    async fn test_generator_failure_propagates() {
        let mut supplier = supplier(ProbeFactory::new(0, true), 4);
        assert!(matches!(
            supplier.next_triple().await,
            Err(PreprocessingError::Generator(_))
        ));
    }
}
