use async_trait::async_trait;

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::preprocessing::PreprocessingError;
use crate::spdz::commitment::BroadcastValidationProtocol;
use crate::spdz::protocol::{receive_elements, send_elements_to_all};
use crate::spdz::{EvaluationStatus, NativeProtocol, SpdzInputMask, SpdzResourcePool, SpdzShare};
use crate::transport::Network;

/// Input value masked with a preprocessed input mask, shared by both input variants.
struct MaskedInput<T> {
    input: Option<T>,
    inputter: usize,
    mask: Option<SpdzInputMask<T>>,
    masked: Option<T>,
}

impl<T: MpcField> MaskedInput<T> {
    fn new(input: Option<T>, inputter: usize) -> Self {
        Self {
            input,
            inputter,
            mask: None,
            masked: None,
        }
    }

    /// Draw the mask; the inputter sends `input - mask` to everyone.
    async fn send(
        &mut self,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<()> {
        let mask = pool.supplier().next_input_mask(self.inputter).await?;
        self.mask = Some(mask);
        if pool.party_id() != self.inputter {
            return Ok(());
        }
        let input = self.input.ok_or(SpdzError::MissingInput {
            party: self.inputter,
        })?;
        let real_value = mask.real_value.ok_or(PreprocessingError::MissingMaskValue)?;
        let masked = input - real_value;
        send_elements_to_all(pool, network, &[masked]).await?;
        self.masked = Some(masked);
        Ok(())
    }

    /// Masked input, as sent by this party or received from the inputter.
    async fn receive(
        &mut self,
        pool: &SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<T> {
        let masked = match self.masked {
            Some(masked) => masked,
            None => receive_elements(pool, network, self.inputter, 1).await?[0],
        };
        self.masked = Some(masked);
        Ok(masked)
    }

    fn combine(&self, pool: &SpdzResourcePool<T>, round: usize) -> Result<SpdzShare<T>> {
        match (self.mask, self.masked) {
            (Some(mask), Some(masked)) => {
                Ok(mask
                    .mask
                    .add_public(masked, pool.key_share(), pool.party_id()))
            }
            _ => Err(SpdzError::invalid_round("InputProtocol", round)),
        }
    }
}

/// Secret-shares a value provided by party `inputter`, secure against passive adversaries.
pub struct InputProtocol<T> {
    state: MaskedInput<T>,
    output: Option<SpdzShare<T>>,
}

impl<T: MpcField> InputProtocol<T> {
    /// `input` must be set on the inputting party and is ignored elsewhere.
    pub fn new(input: Option<T>, inputter: usize) -> Self {
        Self {
            state: MaskedInput::new(input, inputter),
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for InputProtocol<T> {
    type Output = SpdzShare<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match round {
            0 => {
                self.state.send(pool, network).await?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            1 => {
                self.state.receive(pool, network).await?;
                self.output = Some(self.state.combine(pool, round)?);
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("InputProtocol", round)),
        }
    }

    fn out(&self) -> Option<SpdzShare<T>> {
        self.output
    }
}

/// Input protocol that additionally checks the inputter sent the same masked value to
/// everyone, failing with [`SpdzError::BroadcastInconsistency`] otherwise.
pub struct MaliciousInputProtocol<T> {
    state: MaskedInput<T>,
    validation: Option<BroadcastValidationProtocol>,
    output: Option<SpdzShare<T>>,
}

impl<T: MpcField> MaliciousInputProtocol<T> {
    pub fn new(input: Option<T>, inputter: usize) -> Self {
        Self {
            state: MaskedInput::new(input, inputter),
            validation: None,
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for MaliciousInputProtocol<T> {
    type Output = SpdzShare<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match round {
            0 => {
                self.state.send(pool, network).await?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            1 => {
                let masked = self.state.receive(pool, network).await?;
                let mut validation =
                    BroadcastValidationProtocol::new(vec![pool.serializer().serialize(&masked)]);
                validation.evaluate(0, pool, network).await?;
                self.validation = Some(validation);
                Ok(EvaluationStatus::HasMoreRounds)
            }
            2 => {
                let validation = self
                    .validation
                    .as_mut()
                    .ok_or_else(|| SpdzError::invalid_round("MaliciousInputProtocol", round))?;
                validation.evaluate(1, pool, network).await?;
                self.output = Some(self.state.combine(pool, round)?);
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("MaliciousInputProtocol", round)),
        }
    }

    fn out(&self) -> Option<SpdzShare<T>> {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use futures::future::join_all;
    use sha3::{Digest, Sha3_256};

    use super::*;
    use crate::config::SpdzConfig;
    use crate::error::ErrorCategory;
    use crate::fields::{Mersenne61, F251};
    use crate::serializer::FieldSerializer;
    use crate::spdz::commitment::broadcast_digest;
    use crate::testing::fake_parties;

    #[tokio::test]
    async fn test_two_party_sum() {
        let parties = fake_parties::<F251>(2, SpdzConfig::default()).unwrap();
        let results = join_all(parties.into_iter().map(|mut party| async move {
            let own = match party.party_id() {
                1 => F251::from(10),
                _ => F251::from(15),
            };
            let x = party.input(1, Some(own)).await.unwrap();
            let y = party.input(2, Some(own)).await.unwrap();
            let sum = party.open(x + y).await.unwrap();
            party.finish().await.unwrap();
            sum
        }))
        .await;
        assert_eq!(results, vec![F251::from(25), F251::from(25)]);
    }

    #[tokio::test]
    async fn test_malicious_input() {
        let parties = fake_parties::<Mersenne61>(3, SpdzConfig::default()).unwrap();
        let results = join_all(parties.into_iter().map(|mut party| async move {
            let input = (party.party_id() == 3).then(|| Mersenne61::from(1234));
            let x = party.input_malicious(3, input).await.unwrap();
            let value = party.open(x).await.unwrap();
            party.checkpoint().await.unwrap();
            value
        }))
        .await;
        assert_eq!(results, vec![Mersenne61::from(1234); 3]);
    }

    #[tokio::test]
    async fn test_equivocation_is_detected() {
        let mut parties = fake_parties::<F251>(3, SpdzConfig::default()).unwrap();
        let mut third = parties.pop().unwrap();
        let mut second = parties.pop().unwrap();
        let (_, mut corrupt) = parties.pop().unwrap().into_parts();

        let equivocate = async move {
            let serializer = FieldSerializer::<F251>::new();
            let (seven, nine) = (
                serializer.serialize(&F251::from(7)),
                serializer.serialize(&F251::from(9)),
            );
            corrupt.send(2, seven.clone()).await.unwrap();
            corrupt.send(3, nine.clone()).await.unwrap();
            // Each victim is told its own view was the common one.
            corrupt
                .send(2, broadcast_digest(Sha3_256::new(), &[seven]))
                .await
                .unwrap();
            corrupt
                .send(3, broadcast_digest(Sha3_256::new(), &[nine]))
                .await
                .unwrap();
            corrupt
        };
        let (_corrupt, second_result, third_result) = futures::join!(
            equivocate,
            second.input_malicious(1, None),
            third.input_malicious(1, None)
        );

        for result in [second_result, third_result] {
            let err = result.unwrap_err();
            assert!(matches!(err, SpdzError::BroadcastInconsistency));
            assert_eq!(err.category(), ErrorCategory::Cheating);
        }
        // Neither victim may keep computing with the inconsistent input.
        for party in [&mut second, &mut third] {
            assert_eq!(party.aborted(), Some(ErrorCategory::Cheating));
            assert!(matches!(
                party.input(2, None).await,
                Err(SpdzError::Aborted { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_missing_input() {
        let mut parties = fake_parties::<F251>(2, SpdzConfig::default()).unwrap();
        let err = parties[0].input(1, None).await.unwrap_err();
        assert!(matches!(err, SpdzError::MissingInput { party: 1 }));
        assert_eq!(err.category(), ErrorCategory::Misconfiguration);
    }

    #[tokio::test]
    async fn test_invalid_round() {
        let mut parties = fake_parties::<F251>(2, SpdzConfig::default()).unwrap();
        let (mut pool, mut network) = parties.remove(0).into_parts();

        let mut protocol = InputProtocol::new(Some(F251::from(1)), 1);
        assert!(matches!(
            protocol.evaluate(2, &mut pool, &mut network).await,
            Err(SpdzError::InvalidRound { round: 2, .. })
        ));

        let mut protocol = MaliciousInputProtocol::new(Some(F251::from(1)), 1);
        assert!(matches!(
            protocol.evaluate(2, &mut pool, &mut network).await,
            Err(SpdzError::InvalidRound { round: 2, .. })
        ));
        assert_eq!(protocol.out(), None);
    }
}
