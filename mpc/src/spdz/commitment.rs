//! Hash-based commitments and broadcast validation.
//!
//! A commitment to `x` is `SHA3-256(serialize(x) || r)` for fresh randomness `r`. The
//! [`CommitmentProtocol`] lets every party commit to a value before anyone reveals theirs,
//! which is what coin tossing needs. [`BroadcastValidationProtocol`] detects a party
//! that sent different values to different peers.

use async_trait::async_trait;
use digest::Digest;
use rand::RngCore;
use sha3::Sha3_256;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::serializer::{FieldSerializer, SerializationError};
use crate::transport::{Network, TransportError};

use super::{EvaluationStatus, NativeProtocol, SpdzResourcePool};

/// Length of a commitment digest in bytes.
pub const DIGEST_LENGTH: usize = 32;

/// Binding digest of a committed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    digest: Vec<u8>,
}

/// Value and randomness that open a [`Commitment`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opening<T> {
    pub value: T,
    pub randomness: Vec<u8>,
}

/// Number of random bytes mixed into a commitment to an element of `T`.
pub fn randomness_length<T: MpcField>() -> usize {
    T::NUM_BITS as usize / 8 + 1
}

impl Commitment {
    /// Commit to `value` with fresh randomness drawn from `rng`.
    pub fn commit<T: MpcField>(value: &T, rng: &mut impl RngCore) -> (Self, Opening<T>) {
        let mut randomness = vec![0u8; randomness_length::<T>()];
        rng.fill_bytes(&mut randomness);
        let opening = Opening {
            value: *value,
            randomness,
        };
        (
            Self {
                digest: opening.digest(),
            },
            opening,
        )
    }

    /// Check that `opening` is the one this commitment was created with.
    /// Compares in constant time.
    pub fn verify<T: MpcField>(&self, opening: &Opening<T>) -> bool {
        self.digest.as_slice().ct_eq(opening.digest().as_slice()).into()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.digest
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        if bytes.len() != DIGEST_LENGTH {
            return Err(SerializationError::InvalidLength {
                expected: DIGEST_LENGTH,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            digest: bytes.to_vec(),
        })
    }
}

impl<T: MpcField> Opening<T> {
    fn digest(&self) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update(FieldSerializer::<T>::new().serialize(&self.value));
        hasher.update(&self.randomness);
        hasher.finalize().to_vec()
    }

    /// Encoding as value followed by randomness.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = FieldSerializer::<T>::new().serialize(&self.value);
        bytes.extend_from_slice(&self.randomness);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        let serializer = FieldSerializer::<T>::new();
        let value_length = serializer.element_length();
        let expected = value_length + randomness_length::<T>();
        if bytes.len() != expected {
            return Err(SerializationError::InvalidLength {
                expected,
                actual: bytes.len(),
            });
        }
        let (value, randomness) = bytes.split_at(value_length);
        Ok(Self {
            value: serializer.deserialize(value)?,
            randomness: randomness.to_vec(),
        })
    }
}

/// Digest of a list of byte strings as hashed by broadcast validation.
pub fn broadcast_digest<D: Digest>(mut hasher: D, values: &[Vec<u8>]) -> Vec<u8> {
    for value in values {
        hasher.update((value.len() as u64).to_le_bytes());
        hasher.update(value);
    }
    hasher.finalize().to_vec()
}

/// Two-round check that all parties hold the same list of values.
///
/// Round 0 sends a digest of the local view to everyone, round 1 compares it against
/// every received digest and fails with [`SpdzError::BroadcastInconsistency`] on any
/// difference.
pub struct BroadcastValidationProtocol {
    values: Vec<Vec<u8>>,
    digest: Vec<u8>,
    done: bool,
}

impl BroadcastValidationProtocol {
    pub fn new(values: Vec<Vec<u8>>) -> Self {
        Self {
            values,
            digest: Vec::new(),
            done: false,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for BroadcastValidationProtocol {
    type Output = ();

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match round {
            0 => {
                self.digest = broadcast_digest(pool.message_digest(), &self.values);
                network.send_to_all(self.digest.clone()).await?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            1 => {
                for (party, digest) in network.receive_from_all().await? {
                    if !bool::from(digest.as_slice().ct_eq(self.digest.as_slice())) {
                        warn!(
                            party_id = pool.party_id(),
                            peer = party,
                            "Broadcast validation failed"
                        );
                        return Err(SpdzError::BroadcastInconsistency);
                    }
                }
                self.done = true;
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("BroadcastValidationProtocol", round)),
        }
    }

    fn out(&self) -> Option<()> {
        self.done.then(|| ())
    }
}

/// Every party commits to a value, then all values are revealed and checked.
///
/// With more than two parties the exchanged commitments and openings are additionally
/// validated for broadcast consistency. Outputs every party's value in party order.
pub struct CommitmentProtocol<T> {
    value: T,
    opening: Option<Opening<T>>,
    commitments: Vec<Option<Commitment>>,
    validation: Option<BroadcastValidationProtocol>,
    values: Vec<T>,
    output: Option<Vec<T>>,
}

impl<T: MpcField> CommitmentProtocol<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            opening: None,
            commitments: Vec::new(),
            validation: None,
            values: Vec::new(),
            output: None,
        }
    }

    async fn validate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match self.validation.as_mut() {
            Some(validation) => validation.evaluate(round, pool, network).await,
            None => Err(SpdzError::invalid_round("CommitmentProtocol", round)),
        }
    }

    async fn send_opening(&self, network: &mut dyn Network) -> Result<()> {
        let opening = self
            .opening
            .as_ref()
            .ok_or_else(|| SpdzError::invalid_round("CommitmentProtocol", 1))?;
        network.send_to_all(opening.to_bytes()).await?;
        Ok(())
    }

    async fn receive_commitments(
        &mut self,
        pool: &SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<()> {
        for (party, bytes) in network.receive_from_all().await? {
            let commitment = Commitment::from_bytes(&bytes)
                .map_err(|reason| SpdzError::malformed(party, reason))?;
            *slot(&mut self.commitments, party)? = Some(commitment);
        }
        if pool.num_parties() > 2 {
            let digests = self
                .commitments
                .iter()
                .flatten()
                .map(|commitment| commitment.as_bytes().to_vec())
                .collect();
            self.validation = Some(BroadcastValidationProtocol::new(digests));
        }
        Ok(())
    }

    /// Receive and verify every opening. Returns the encoded openings in party order.
    async fn receive_openings(
        &mut self,
        pool: &SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<Vec<Vec<u8>>> {
        let own = self
            .opening
            .take()
            .ok_or_else(|| SpdzError::invalid_round("CommitmentProtocol", 2))?;
        let mut openings: Vec<Option<Opening<T>>> = vec![None; pool.num_parties()];
        for (party, bytes) in network.receive_from_all().await? {
            let opening = Opening::from_bytes(&bytes)
                .map_err(|reason| SpdzError::malformed(party, reason))?;
            let verified = matches!(
                slot(&mut self.commitments, party)?,
                Some(commitment) if commitment.verify(&opening)
            );
            if !verified {
                warn!(
                    party_id = pool.party_id(),
                    peer = party,
                    "Opening does not match commitment"
                );
                return Err(SpdzError::CommitmentMismatch { party });
            }
            *slot(&mut openings, party)? = Some(opening);
        }
        *slot(&mut openings, pool.party_id())? = Some(own);

        let openings: Vec<_> = openings.into_iter().flatten().collect();
        self.values = openings.iter().map(|opening| opening.value).collect();
        Ok(openings.iter().map(Opening::to_bytes).collect())
    }
}

fn slot<I>(items: &mut [Option<I>], party: usize) -> Result<&mut Option<I>> {
    party
        .checked_sub(1)
        .and_then(move |index| items.get_mut(index))
        .ok_or_else(|| TransportError::UnknownParty(party).into())
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for CommitmentProtocol<T> {
    type Output = Vec<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        let validate = pool.num_parties() > 2;
        match (round, validate) {
            (0, _) => {
                let (commitment, opening) = Commitment::commit(&self.value, pool.rng());
                network.send_to_all(commitment.as_bytes().to_vec()).await?;
                self.commitments = vec![None; pool.num_parties()];
                *slot(&mut self.commitments, pool.party_id())? = Some(commitment);
                self.opening = Some(opening);
                Ok(EvaluationStatus::HasMoreRounds)
            }
            (1, _) => {
                self.receive_commitments(pool, network).await?;
                if validate {
                    self.validate(0, pool, network).await?;
                } else {
                    self.send_opening(network).await?;
                }
                Ok(EvaluationStatus::HasMoreRounds)
            }
            (2, true) => {
                self.validate(1, pool, network).await?;
                self.send_opening(network).await?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            (2, false) | (3, true) => {
                let openings = self.receive_openings(pool, network).await?;
                if validate {
                    self.validation = Some(BroadcastValidationProtocol::new(openings));
                    self.validate(0, pool, network).await?;
                    Ok(EvaluationStatus::HasMoreRounds)
                } else {
                    self.output = Some(std::mem::take(&mut self.values));
                    Ok(EvaluationStatus::IsDone)
                }
            }
            (4, true) => {
                self.validate(1, pool, network).await?;
                self.output = Some(std::mem::take(&mut self.values));
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("CommitmentProtocol", round)),
        }
    }

    fn out(&self) -> Option<Vec<T>> {
        self.output.clone()
    }
}
