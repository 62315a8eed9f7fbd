use async_trait::async_trait;

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::preprocessing::PreprocessingError;
use crate::spdz::protocol::{receive_elements_from_all, send_elements_to_all, sum_contributions};
use crate::spdz::{EvaluationStatus, NativeProtocol, SpdzInputMask, SpdzResourcePool, SpdzShare};
use crate::transport::Network;

/// Reveals a shared value to all parties.
///
/// The output is unauthenticated until the next MAC check: the opening is recorded in
/// the party context and only a successful check certifies it.
pub struct OpenProtocol<T> {
    share: SpdzShare<T>,
    output: Option<T>,
}

impl<T: MpcField> OpenProtocol<T> {
    pub fn new(share: SpdzShare<T>) -> Self {
        Self {
            share,
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for OpenProtocol<T> {
    type Output = T;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match round {
            0 => {
                send_elements_to_all(pool, network, &[self.share.value]).await?;
                Ok(EvaluationStatus::HasMoreRounds)
            }
            1 => {
                let received = receive_elements_from_all(pool, network, 1).await?;
                let value = sum_contributions(&[self.share.value], &received)[0];
                pool.opened_values().push(self.share, value);
                self.output = Some(value);
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("OpenProtocol", round)),
        }
    }

    fn out(&self) -> Option<T> {
        self.output
    }
}

/// Reveals a shared value to a single party.
///
/// Everyone opens the value minus an input mask toward `target`; only the target knows
/// the mask and can unmask. Outputs `Some(value)` at the target and `None` elsewhere.
pub struct OpenToPartyProtocol<T> {
    share: SpdzShare<T>,
    target: usize,
    mask: Option<SpdzInputMask<T>>,
    output: Option<Option<T>>,
}

impl<T: MpcField> OpenToPartyProtocol<T> {
    pub fn new(share: SpdzShare<T>, target: usize) -> Self {
        Self {
            share,
            target,
            mask: None,
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for OpenToPartyProtocol<T> {
    type Output = Option<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match (round, self.mask) {
            (0, _) => {
                let mask = pool.supplier().next_input_mask(self.target).await?;
                let masked = self.share - mask.mask;
                send_elements_to_all(pool, network, &[masked.value]).await?;
                self.mask = Some(mask);
                Ok(EvaluationStatus::HasMoreRounds)
            }
            (1, Some(mask)) => {
                let masked = self.share - mask.mask;
                let received = receive_elements_from_all(pool, network, 1).await?;
                let opened = sum_contributions(&[masked.value], &received)[0];
                pool.opened_values().push(masked, opened);

                let output = if pool.party_id() == self.target {
                    let real_value = mask.real_value.ok_or(PreprocessingError::MissingMaskValue)?;
                    Some(opened + real_value)
                } else {
                    None
                };
                self.output = Some(output);
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("OpenToPartyProtocol", round)),
        }
    }

    fn out(&self) -> Option<Option<T>> {
        self.output
    }
}
