use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::fields::MpcField;
use crate::spdz::{SpdzInputMask, SpdzShare, SpdzTriple};

use super::{BulkGenerator, GeneratorFactory, GeneratorParams, PreprocessingError};

/// Insecure bulk generator that can be used for tests.
///
/// All parties derive the same plain values from a common seed and keep only their own
/// additive share, so no communication is needed. Anyone knowing the seed knows every secret.
pub struct FakeGenerator<T> {
    dealing: Dealing<T>,
    key_share: T,
    triples: SmallRng,
    random_elements: SmallRng,
    bits: SmallRng,
    exp_pipes: SmallRng,
    input_masks: Vec<SmallRng>,
}

impl<T: MpcField> FakeGenerator<T> {
    /// Create new instance. Parties sharing `seed` get consistent material.
    pub fn new(num_parties: usize, party_id: usize, seed: u8) -> Self {
        let mut rng = SmallRng::from_seed([seed; 32]);
        let dealing = Dealing {
            party_id,
            num_parties,
            mac_key: T::random(&mut rng),
        };
        let key_share = dealing.share(&mut rng, dealing.mac_key);
        Self {
            dealing,
            key_share,
            triples: SmallRng::from_seed(rng.gen()),
            random_elements: SmallRng::from_seed(rng.gen()),
            bits: SmallRng::from_seed(rng.gen()),
            exp_pipes: SmallRng::from_seed(rng.gen()),
            input_masks: (0..num_parties)
                .map(|_| SmallRng::from_seed(rng.gen()))
                .collect(),
        }
    }

    /// This party's share of the MAC key.
    pub fn key_share(&self) -> T {
        self.key_share
    }

    fn next_triple(&mut self) -> SpdzTriple<T> {
        let (a, a_plain) = self.dealing.random(&mut self.triples);
        let (b, b_plain) = self.dealing.random(&mut self.triples);
        let c = self.dealing.authenticate(&mut self.triples, a_plain * b_plain);
        SpdzTriple { a, b, c }
    }

    fn next_bit(&mut self) -> SpdzShare<T> {
        let value = if self.bits.gen() { T::one() } else { T::zero() };
        self.dealing.authenticate(&mut self.bits, value)
    }

    /// Sharings of `[r^-1, r, r^2, ..., r^(length-1)]` for random non-zero `r`.
    fn next_exp_pipe(&mut self, length: usize) -> Vec<SpdzShare<T>> {
        let rng = &mut self.exp_pipes;
        let (r, r_inv) = loop {
            let r = T::random(&mut *rng);
            if let Some(r_inv) = Option::<T>::from(r.invert()) {
                break (r, r_inv);
            }
        };
        let mut pipe = Vec::with_capacity(length);
        if length > 0 {
            pipe.push(self.dealing.authenticate(rng, r_inv));
        }
        let mut power = r;
        for _ in 1..length {
            pipe.push(self.dealing.authenticate(rng, power));
            power *= r;
        }
        pipe
    }
}

#[async_trait(?Send)]
impl<T: MpcField> BulkGenerator<T> for FakeGenerator<T> {
    async fn triples(&mut self, n: usize) -> Result<Vec<SpdzTriple<T>>, PreprocessingError> {
        Ok((0..n).map(|_| self.next_triple()).collect())
    }

    async fn input_masks(
        &mut self,
        toward: usize,
        n: usize,
    ) -> Result<Vec<SpdzInputMask<T>>, PreprocessingError> {
        let dealing = self.dealing;
        let rng = toward
            .checked_sub(1)
            .and_then(|index| self.input_masks.get_mut(index))
            .ok_or(PreprocessingError::NoSuchParty(toward))?;
        Ok((0..n)
            .map(|_| {
                let (mask, plain) = dealing.random(rng);
                SpdzInputMask {
                    mask,
                    real_value: (toward == dealing.party_id).then(|| plain),
                }
            })
            .collect())
    }

    async fn random_elements(
        &mut self,
        n: usize,
    ) -> Result<Vec<SpdzShare<T>>, PreprocessingError> {
        Ok((0..n)
            .map(|_| self.dealing.random(&mut self.random_elements).0)
            .collect())
    }

    async fn random_bits(&mut self, n: usize) -> Result<Vec<SpdzShare<T>>, PreprocessingError> {
        Ok((0..n).map(|_| self.next_bit()).collect())
    }

    async fn exp_pipes(
        &mut self,
        n: usize,
        length: usize,
    ) -> Result<Vec<Vec<SpdzShare<T>>>, PreprocessingError> {
        Ok((0..n).map(|_| self.next_exp_pipe(length)).collect())
    }
}

/// Builds a [`FakeGenerator`] for the party named in the generator parameters.
pub struct FakeGeneratorFactory<T> {
    num_parties: usize,
    seed: u8,
    key_share: T,
}

impl<T: MpcField> FakeGeneratorFactory<T> {
    pub fn new(num_parties: usize, party_id: usize, seed: u8) -> Self {
        Self {
            num_parties,
            seed,
            key_share: FakeGenerator::<T>::new(num_parties, party_id, seed).key_share(),
        }
    }

    /// MAC key share the generated material is authenticated under.
    pub fn key_share(&self) -> T {
        self.key_share
    }
}

#[async_trait(?Send)]
impl<T: MpcField> GeneratorFactory<T> for FakeGeneratorFactory<T> {
    type Generator = FakeGenerator<T>;

    async fn create(
        &mut self,
        params: GeneratorParams,
    ) -> Result<Self::Generator, PreprocessingError> {
        if params.party_id == 0 || params.party_id > self.num_parties {
            return Err(PreprocessingError::NoSuchParty(params.party_id));
        }
        Ok(FakeGenerator::new(self.num_parties, params.party_id, self.seed))
    }
}

/// Plain MAC key and the position of this party among the share holders.
#[derive(Clone, Copy)]
struct Dealing<T> {
    party_id: usize,
    num_parties: usize,
    mac_key: T,
}

impl<T: MpcField> Dealing<T> {
    /// This party's additive share of `value`. Parties 2..=n get fresh random shares and
    /// party 1 gets the remainder. Every party draws all of them to stay in step.
    fn share(&self, rng: &mut SmallRng, value: T) -> T {
        let mut own = T::zero();
        let mut remainder = value;
        for id in 2..=self.num_parties {
            let share = T::random(&mut *rng);
            remainder -= share;
            if id == self.party_id {
                own = share;
            }
        }
        if self.party_id == 1 {
            remainder
        } else {
            own
        }
    }

    fn authenticate(&self, rng: &mut SmallRng, value: T) -> SpdzShare<T> {
        SpdzShare {
            value: self.share(rng, value),
            mac: self.share(rng, value * self.mac_key),
        }
    }

    /// Authenticated share of a fresh random value, together with the value.
    fn random(&self, rng: &mut SmallRng) -> (SpdzShare<T>, T) {
        let value = T::random(&mut *rng);
        (self.authenticate(rng, value), value)
    }
}

#[cfg(test)]
mod tests {
    use ff::Field;

    use super::*;
    use crate::fields::{Mersenne127, F251};

    fn generators<T: MpcField>(num_parties: usize, seed: u8) -> Vec<FakeGenerator<T>> {
        (1..=num_parties)
            .map(|id| FakeGenerator::new(num_parties, id, seed))
            .collect()
    }

    fn reconstruct<T: MpcField>(shares: impl IntoIterator<Item = SpdzShare<T>>) -> SpdzShare<T> {
        shares.into_iter().fold(SpdzShare::zero(), |acc, s| acc + s)
    }

    fn mac_key<T: MpcField>(gens: &[FakeGenerator<T>]) -> T {
        gens.iter().fold(T::zero(), |acc, g| acc + g.key_share())
    }

    #[tokio::test]
    async fn test_triples_reconstruct() {
        let mut gens = generators::<Mersenne127>(3, 42);
        let alpha = mac_key(&gens);
        let mut batches = Vec::new();
        for gen in gens.iter_mut() {
            batches.push(gen.triples(8).await.unwrap());
        }
        for i in 0..8 {
            let a = reconstruct(batches.iter().map(|b| b[i].a));
            let b = reconstruct(batches.iter().map(|b| b[i].b));
            let c = reconstruct(batches.iter().map(|b| b[i].c));
            assert_eq!(c.value, a.value * b.value);
            for x in [a, b, c] {
                assert_eq!(x.mac, alpha * x.value);
            }
        }
    }

    #[tokio::test]
    async fn test_input_masks() {
        let mut gens = generators::<F251>(3, 1);
        let alpha = mac_key(&gens);
        let mut batches = Vec::new();
        for gen in gens.iter_mut() {
            batches.push(gen.input_masks(2, 4).await.unwrap());
        }
        for i in 0..4 {
            assert!(batches[0][i].real_value.is_none());
            assert!(batches[2][i].real_value.is_none());
            let real = batches[1][i].real_value.unwrap();
            let mask = reconstruct(batches.iter().map(|b| b[i].mask));
            assert_eq!(mask, SpdzShare::new(real, alpha * real));
        }
        assert!(matches!(
            gens[0].input_masks(4, 1).await,
            Err(PreprocessingError::NoSuchParty(4))
        ));
    }

    #[tokio::test]
    async fn test_random_bits_are_bits() {
        let mut gens = generators::<F251>(2, 9);
        let alpha = mac_key(&gens);
        let first = gens[0].random_bits(32).await.unwrap();
        let second = gens[1].random_bits(32).await.unwrap();
        let mut ones = 0;
        for (x, y) in first.into_iter().zip(second) {
            let bit = x + y;
            assert!(bit.value == F251::zero() || bit.value == F251::one());
            assert_eq!(bit.mac, alpha * bit.value);
            if bit.value == F251::one() {
                ones += 1;
            }
        }
        assert!(ones > 0 && ones < 32);
    }

    #[tokio::test]
    async fn test_exp_pipe() {
        let mut gens = generators::<Mersenne127>(2, 3);
        let first = gens[0].exp_pipes(1, 6).await.unwrap().remove(0);
        let second = gens[1].exp_pipes(1, 6).await.unwrap().remove(0);
        let pipe: Vec<_> = first
            .into_iter()
            .zip(second)
            .map(|(x, y)| (x + y).value)
            .collect();
        assert_eq!(pipe.len(), 6);
        let r = pipe[1];
        assert_eq!(pipe[0] * r, Mersenne127::one());
        for i in 2..6 {
            assert_eq!(pipe[i], pipe[i - 1] * r);
        }
    }

    #[tokio::test]
    async fn test_random_elements_reconstruct() {
        let mut gens = generators::<F251>(4, 5);
        let alpha = mac_key(&gens);
        let mut batches = Vec::new();
        for gen in gens.iter_mut() {
            batches.push(gen.random_elements(3).await.unwrap());
        }
        for i in 0..3 {
            let x = reconstruct(batches.iter().map(|b| b[i]));
            assert_eq!(x.mac, alpha * x.value);
        }
    }
}
