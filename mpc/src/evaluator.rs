use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::error::{ErrorCategory, Result, SpdzError};
use crate::fields::MpcField;
use crate::spdz::gates::{
    InputProtocol, MaliciousInputProtocol, MultiplyProtocol, OpenProtocol, OpenToPartyProtocol,
    RandomElementProtocol,
};
use crate::spdz::mac_check::MacCheckProtocol;
use crate::spdz::{EvaluationStatus, NativeProtocol, Schedulable, SpdzResourcePool, SpdzShare};
use crate::transport::Network;

/// Counters reported by [`SpdzEvaluator::finish`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Batches of application protocols evaluated.
    pub batches: usize,
    /// Rounds over all batches, MAC checks excluded.
    pub rounds: usize,
    /// MAC checks that passed.
    pub mac_checks: usize,
}

/// SPDZ protocol driver for one party.
///
/// Evaluates batches of native protocols in lock-step rounds and runs a MAC check
/// whenever the number of pending openings reaches the configured threshold. The first
/// error aborts the evaluator: every later call fails with [`SpdzError::Aborted`].
pub struct SpdzEvaluator<T: MpcField, N: Network> {
    pool: SpdzResourcePool<T>,
    network: N,
    stats: EvaluationStats,
    aborted: Option<(ErrorCategory, String)>,
}

impl<T: MpcField, N: Network> SpdzEvaluator<T, N> {
    /// Create new evaluator. The network must belong to the same party as the context.
    pub fn new(pool: SpdzResourcePool<T>, network: N) -> Result<Self> {
        if network.party_id() != pool.party_id() || network.num_parties() != pool.num_parties() {
            return Err(ConfigError::NetworkMismatch {
                party_id: pool.party_id(),
                num_parties: pool.num_parties(),
                network_party_id: network.party_id(),
                network_num_parties: network.num_parties(),
            }
            .into());
        }
        Ok(Self {
            pool,
            network,
            stats: EvaluationStats::default(),
            aborted: None,
        })
    }

    /// ID of current party, starting at 1.
    pub fn party_id(&self) -> usize {
        self.pool.party_id()
    }

    pub fn num_parties(&self) -> usize {
        self.pool.num_parties()
    }

    pub fn pool(&mut self) -> &mut SpdzResourcePool<T> {
        &mut self.pool
    }

    pub fn stats(&self) -> EvaluationStats {
        self.stats
    }

    /// Category of the error that aborted this evaluator, if any.
    pub fn aborted(&self) -> Option<ErrorCategory> {
        self.aborted.as_ref().map(|(category, _)| *category)
    }

    /// Split into party context and network.
    pub fn into_parts(self) -> (SpdzResourcePool<T>, N) {
        (self.pool, self.network)
    }

    fn ensure_active(&self) -> Result<()> {
        match &self.aborted {
            Some((category, cause)) => Err(SpdzError::Aborted {
                category: *category,
                cause: cause.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Drive every protocol to completion. Any error aborts the evaluator.
    async fn drive(&mut self, protocols: &mut [&mut dyn Schedulable<T>]) -> Result<usize> {
        self.ensure_active()?;
        let result = self.drive_rounds(protocols).await;
        if let Err(err) = &result {
            warn!(party_id = self.party_id(), %err, "Aborting evaluation");
            self.aborted = Some((err.category(), err.to_string()));
        }
        result
    }

    /// Advance all unfinished protocols by one round at a time. Returns the number of rounds.
    async fn drive_rounds(&mut self, protocols: &mut [&mut dyn Schedulable<T>]) -> Result<usize> {
        let mut active = vec![true; protocols.len()];
        let mut round = 0;
        while active.iter().any(|&a| a) {
            for (protocol, is_active) in protocols.iter_mut().zip(active.iter_mut()) {
                if !*is_active {
                    continue;
                }
                let status = protocol
                    .evaluate_round(round, &mut self.pool, &mut self.network)
                    .await?;
                *is_active = status == EvaluationStatus::HasMoreRounds;
            }
            round += 1;
        }
        Ok(round)
    }

    /// Evaluate a batch of independent protocols, then check pending openings if the
    /// threshold is reached.
    pub async fn run_batch(&mut self, protocols: &mut [&mut dyn Schedulable<T>]) -> Result<()> {
        let rounds = self.drive(protocols).await?;
        self.stats.batches += 1;
        self.stats.rounds += rounds;
        debug!(
            party_id = self.party_id(),
            protocols = protocols.len(),
            rounds,
            "Evaluated batch"
        );

        let threshold = self.pool.config().opened_value_threshold;
        if self.pool.opened_values().exceeds_threshold(threshold) {
            self.mac_check().await?;
        }
        Ok(())
    }

    /// Evaluate a batch of protocols of the same type and collect their outputs.
    pub async fn run_all<P: NativeProtocol<T>>(
        &mut self,
        mut protocols: Vec<P>,
    ) -> Result<Vec<P::Output>> {
        let mut batch: Vec<&mut dyn Schedulable<T>> = protocols
            .iter_mut()
            .map(|protocol| protocol as &mut dyn Schedulable<T>)
            .collect();
        self.run_batch(&mut batch).await?;
        protocols.iter().map(output::<T, P>).collect()
    }

    /// Evaluate a single protocol.
    pub async fn run<P: NativeProtocol<T>>(&mut self, mut protocol: P) -> Result<P::Output> {
        self.run_batch(&mut [&mut protocol]).await?;
        output(&protocol)
    }

    /// Check all pending openings, failing with [`SpdzError::MacCheckFailed`] on tampering.
    pub async fn mac_check(&mut self) -> Result<()> {
        let mut check = MacCheckProtocol::new();
        self.drive(&mut [&mut check]).await?;
        self.stats.mac_checks += 1;
        Ok(())
    }

    /// Run a MAC check if any opening is pending. Opened values returned so far are
    /// authenticated once this succeeds.
    pub async fn checkpoint(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.pool.opened_values().is_empty() {
            return Ok(());
        }
        self.mac_check().await
    }

    /// Checkpoint and report statistics of the run.
    pub async fn finish(mut self) -> Result<EvaluationStats> {
        self.checkpoint().await?;
        debug!(party_id = self.party_id(), stats = ?self.stats, "Evaluation finished");
        Ok(self.stats)
    }

    /// Share of the value party `inputter` provides. `value` is ignored on other parties.
    pub async fn input(&mut self, inputter: usize, value: Option<T>) -> Result<SpdzShare<T>> {
        self.run(InputProtocol::new(value, inputter)).await
    }

    /// Like [`Self::input`], but detects an inputter sending inconsistent values.
    pub async fn input_malicious(
        &mut self,
        inputter: usize,
        value: Option<T>,
    ) -> Result<SpdzShare<T>> {
        self.run(MaliciousInputProtocol::new(value, inputter)).await
    }

    /// Multiply shared values. Requires communication.
    pub async fn multiply(&mut self, x: SpdzShare<T>, y: SpdzShare<T>) -> Result<SpdzShare<T>> {
        self.run(MultiplyProtocol::new(x, y)).await
    }

    /// Open provided share. Unauthenticated until the next checkpoint.
    pub async fn open(&mut self, x: SpdzShare<T>) -> Result<T> {
        self.run(OpenProtocol::new(x)).await
    }

    /// Open provided share to party `target` only.
    pub async fn open_to(&mut self, x: SpdzShare<T>, target: usize) -> Result<Option<T>> {
        self.run(OpenToPartyProtocol::new(x, target)).await
    }

    /// Share of a fresh random element.
    pub async fn random_element(&mut self) -> Result<SpdzShare<T>> {
        self.run(RandomElementProtocol::new()).await
    }
}

fn output<T: MpcField, P: NativeProtocol<T>>(protocol: &P) -> Result<P::Output> {
    protocol.out().ok_or(SpdzError::Unfinished {
        protocol: std::any::type_name::<P>(),
    })
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;

    use super::*;
    use crate::config::SpdzConfig;
    use crate::fields::{Mersenne61, F251};
    use crate::spdz::gates::{KnownValueProtocol, RandomBitProtocol};
    use crate::testing::fake_parties;
    use crate::transport::mock_multiparty_channels;

    #[tokio::test]
    async fn test_heterogeneous_batch() {
        let parties = fake_parties::<F251>(3, SpdzConfig::default()).unwrap();
        let results = join_all(parties.into_iter().map(|mut party| async move {
            let own = Some(F251::from(party.party_id() as u64));
            let x = party.input(1, own).await.unwrap();
            let y = party.input(2, own).await.unwrap();

            let mut product = MultiplyProtocol::new(x, y);
            let mut opened = OpenProtocol::new(x + y);
            let mut input = MaliciousInputProtocol::new(own, 3);
            let mut constant = KnownValueProtocol::new(F251::from(4));
            let mut bit = RandomBitProtocol::new();
            party
                .run_batch(&mut [
                    &mut product,
                    &mut opened,
                    &mut input,
                    &mut constant,
                    &mut bit,
                ])
                .await
                .unwrap();

            let product = party.open(product.out().unwrap()).await.unwrap();
            let z = party
                .open(input.out().unwrap() + constant.out().unwrap())
                .await
                .unwrap();
            let stats = party.finish().await.unwrap();
            (product, opened.out().unwrap(), z, stats)
        }))
        .await;

        for (product, sum, z, stats) in results {
            assert_eq!(product, F251::from(2));
            assert_eq!(sum, F251::from(3));
            assert_eq!(z, F251::from(7));
            // Two inputs, the batch and two openings; the malicious input takes three rounds.
            assert_eq!(
                stats,
                EvaluationStats {
                    batches: 5,
                    rounds: 2 + 2 + 3 + 2 + 2,
                    mac_checks: 1,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_threshold_triggers_mac_check() {
        let config = SpdzConfig {
            opened_value_threshold: 3,
            ..SpdzConfig::default()
        };
        let parties = fake_parties::<F251>(2, config).unwrap();
        let results = join_all(parties.into_iter().map(|mut party| async move {
            for _ in 0..4 {
                let share = party.random_element().await.unwrap();
                party.open(share).await.unwrap();
            }
            let pending = party.pool().opened_values().len();
            (pending, party.finish().await.unwrap().mac_checks)
        }))
        .await;
        // Third opening triggers a check, the fourth is checked on finish.
        assert_eq!(results, vec![(1, 2), (1, 2)]);
    }

    #[tokio::test]
    async fn test_checkpoint_without_openings() {
        let mut parties = fake_parties::<F251>(2, SpdzConfig::default()).unwrap();
        let party = parties.remove(0);
        let stats = party.finish().await.unwrap();
        assert_eq!(stats, EvaluationStats::default());
    }

    #[tokio::test]
    async fn test_failed_mac_check_aborts() {
        let parties = fake_parties::<Mersenne61>(2, SpdzConfig::default()).unwrap();
        let results = join_all(parties.into_iter().map(|mut party| async move {
            let share = party.random_element().await.unwrap();
            party.open(share).await.unwrap();
            let (shares, mut values) = party.pool().opened_values().drain();
            values[0] += Mersenne61::from(17);
            for (share, value) in shares.into_iter().zip(values) {
                party.pool().opened_values().push(share, value);
            }

            let first = party.checkpoint().await.unwrap_err();
            assert!(matches!(first, SpdzError::MacCheckFailed));
            assert_eq!(party.aborted(), Some(ErrorCategory::Cheating));
            let second = party.checkpoint().await.unwrap_err();
            let gate = party.random_element().await.unwrap_err();
            let finish = party.finish().await.unwrap_err();
            [second, gate, finish]
        }))
        .await;
        for errors in results {
            for err in errors {
                assert!(matches!(err, SpdzError::Aborted { .. }));
                assert_eq!(err.category(), ErrorCategory::Cheating);
            }
        }
    }

    #[tokio::test]
    async fn test_network_mismatch() {
        let mut networks = mock_multiparty_channels::<Vec<u8>>(2, 1 << 10);
        let pool = SpdzResourcePool::<F251>::fake(1, 2, SpdzConfig::default()).unwrap();
        let network = networks.pop().unwrap();
        assert!(matches!(
            SpdzEvaluator::new(pool, network),
            Err(SpdzError::Config(ConfigError::NetworkMismatch { .. }))
        ));
    }
}
