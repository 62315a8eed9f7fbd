//! Batched MAC check over all partially opened values.
//!
//! Parties toss a joint coin with [`CommitmentProtocol`], expand it into public random
//! coefficients `r_j`, and each party computes
//! `sigma = sum(r_j * mac_j) - alpha_i * sum(r_j * opened_j)`. The sigmas are committed,
//! opened and must sum to zero. A single tampered opening makes the sum non-zero with
//! probability at least `1 - 1/p`.

use async_trait::async_trait;
use digest::Digest;
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, warn};

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::transport::Network;

use super::commitment::CommitmentProtocol;
use super::{EvaluationStatus, NativeProtocol, SpdzResourcePool, SpdzShare};

enum Stage<T> {
    Coin(CommitmentProtocol<T>),
    Sigma {
        start: usize,
        protocol: CommitmentProtocol<T>,
    },
    Done,
}

/// Checks and clears the opened-value buffer of the party context.
///
/// The buffer is drained in round 0. Failure is fatal: the opened values must not be used.
pub struct MacCheckProtocol<T> {
    stage: Option<Stage<T>>,
    shares: Vec<SpdzShare<T>>,
    values: Vec<T>,
}

impl<T: MpcField> MacCheckProtocol<T> {
    pub fn new() -> Self {
        Self {
            stage: None,
            shares: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Share of `sum(r_j * mac_j) - alpha * sum(r_j * opened_j)` for coefficients seeded by `coins`.
    fn sigma(&self, pool: &SpdzResourcePool<T>, coins: &[T]) -> T {
        let coin = coins.iter().fold(T::zero(), |acc, c| acc + c);
        let mut seed = [0u8; 32];
        let mut hasher = pool.message_digest();
        hasher.update(pool.serializer().serialize(&coin));
        seed.copy_from_slice(&hasher.finalize());
        let mut rng = StdRng::from_seed(seed);

        let mut opened = T::zero();
        let mut mac = T::zero();
        for (share, value) in self.shares.iter().zip(&self.values) {
            let r = T::random(&mut rng);
            opened += r * value;
            mac += r * share.mac;
        }
        mac - pool.key_share() * opened
    }
}

impl<T: MpcField> Default for MacCheckProtocol<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for MacCheckProtocol<T> {
    type Output = ();

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        if round == 0 && self.stage.is_none() {
            let (shares, values) = pool.opened_values().drain();
            debug!(
                party_id = pool.party_id(),
                count = values.len(),
                "Running MAC check"
            );
            self.shares = shares;
            self.values = values;
            let coin = T::random(pool.rng());
            self.stage = Some(Stage::Coin(CommitmentProtocol::new(coin)));
        }

        match self.stage.take() {
            Some(Stage::Coin(mut protocol)) => {
                let status = protocol.evaluate(round, pool, network).await?;
                if status == EvaluationStatus::HasMoreRounds {
                    self.stage = Some(Stage::Coin(protocol));
                    return Ok(EvaluationStatus::HasMoreRounds);
                }
                let coins = protocol
                    .out()
                    .ok_or_else(|| SpdzError::invalid_round("MacCheckProtocol", round))?;
                let mut protocol = CommitmentProtocol::new(self.sigma(pool, &coins));
                protocol.evaluate(0, pool, network).await?;
                self.stage = Some(Stage::Sigma {
                    start: round,
                    protocol,
                });
                Ok(EvaluationStatus::HasMoreRounds)
            }
            Some(Stage::Sigma {
                start,
                mut protocol,
            }) => {
                let sub_round = round
                    .checked_sub(start)
                    .ok_or_else(|| SpdzError::invalid_round("MacCheckProtocol", round))?;
                if protocol.evaluate(sub_round, pool, network).await?
                    == EvaluationStatus::HasMoreRounds
                {
                    self.stage = Some(Stage::Sigma { start, protocol });
                    return Ok(EvaluationStatus::HasMoreRounds);
                }
                let sigmas = protocol
                    .out()
                    .ok_or_else(|| SpdzError::invalid_round("MacCheckProtocol", round))?;
                if sigmas.iter().fold(T::zero(), |acc, s| acc + s) != T::zero() {
                    warn!(party_id = pool.party_id(), "MAC check failed");
                    return Err(SpdzError::MacCheckFailed);
                }
                debug!(party_id = pool.party_id(), "MAC check passed");
                self.stage = Some(Stage::Done);
                Ok(EvaluationStatus::IsDone)
            }
            stage => {
                self.stage = stage;
                Err(SpdzError::invalid_round("MacCheckProtocol", round))
            }
        }
    }

    fn out(&self) -> Option<()> {
        matches!(self.stage, Some(Stage::Done)).then(|| ())
    }
}
