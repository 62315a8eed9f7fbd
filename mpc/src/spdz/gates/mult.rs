use async_trait::async_trait;

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::spdz::protocol::{receive_elements_from_all, send_elements_to_all, sum_contributions};
use crate::spdz::{EvaluationStatus, NativeProtocol, SpdzResourcePool, SpdzShare, SpdzTriple};
use crate::transport::Network;

/// Multiplies two shared values with a Beaver triple.
///
/// Opens `e = x - a` and `d = y - b`, both recorded for the next MAC check, and outputs
/// `c + e*b + d*a + e*d`.
pub struct MultiplyProtocol<T> {
    x: SpdzShare<T>,
    y: SpdzShare<T>,
    triple: Option<SpdzTriple<T>>,
    output: Option<SpdzShare<T>>,
}

impl<T: MpcField> MultiplyProtocol<T> {
    pub fn new(x: SpdzShare<T>, y: SpdzShare<T>) -> Self {
        Self {
            x,
            y,
            triple: None,
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for MultiplyProtocol<T> {
    type Output = SpdzShare<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        match (round, self.triple) {
            (0, _) => {
                let triple = pool.supplier().next_triple().await?;
                let epsilon = self.x - triple.a;
                let delta = self.y - triple.b;
                send_elements_to_all(pool, network, &[epsilon.value, delta.value]).await?;
                self.triple = Some(triple);
                Ok(EvaluationStatus::HasMoreRounds)
            }
            (1, Some(SpdzTriple { a, b, c })) => {
                let epsilon = self.x - a;
                let delta = self.y - b;
                let received = receive_elements_from_all(pool, network, 2).await?;
                let opened = sum_contributions(&[epsilon.value, delta.value], &received);
                let (e, d) = (opened[0], opened[1]);
                pool.opened_values().push(epsilon, e);
                pool.opened_values().push(delta, d);

                let product =
                    (c + b * e + a * d).add_public(e * d, pool.key_share(), pool.party_id());
                self.output = Some(product);
                Ok(EvaluationStatus::IsDone)
            }
            _ => Err(SpdzError::invalid_round("MultiplyProtocol", round)),
        }
    }

    fn out(&self) -> Option<SpdzShare<T>> {
        self.output
    }
}
