//! Round state machine every native protocol implements.
//!
//! A protocol is driven by calling [`NativeProtocol::evaluate`] with round numbers
//! 0, 1, 2, ... until it reports [`EvaluationStatus::IsDone`]. All parties evaluate the
//! same protocols at the same round numbers, in the same order. Messages sent in round
//! `r` are received in round `r + 1`, so a batch of protocols can be advanced round by
//! round without any party waiting on a message that was not yet sent.

use async_trait::async_trait;

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::transport::Network;

use super::SpdzResourcePool;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluationStatus {
    HasMoreRounds,
    IsDone,
}

/// Indivisible protocol instance evaluated round by round.
#[async_trait(?Send)]
pub trait NativeProtocol<T: MpcField> {
    type Output;

    /// Perform the local computation and message exchange of round `round`.
    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus>;

    /// Result of the protocol. `None` until `evaluate` has returned `IsDone`.
    fn out(&self) -> Option<Self::Output>;
}

/// Object-safe view of a [`NativeProtocol`], used to batch protocols with different outputs.
#[async_trait(?Send)]
pub trait Schedulable<T: MpcField> {
    async fn evaluate_round(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus>;
}

#[async_trait(?Send)]
impl<T: MpcField, P: NativeProtocol<T>> Schedulable<T> for P {
    async fn evaluate_round(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        self.evaluate(round, pool, network).await
    }
}

/// Send field elements to every other party.
pub(crate) async fn send_elements_to_all<T: MpcField>(
    pool: &SpdzResourcePool<T>,
    network: &mut dyn Network,
    values: &[T],
) -> Result<()> {
    let bytes = pool.serializer().serialize_list(values);
    network.send_to_all(bytes).await?;
    Ok(())
}

/// Receive exactly `count` field elements from party `from`.
pub(crate) async fn receive_elements<T: MpcField>(
    pool: &SpdzResourcePool<T>,
    network: &mut dyn Network,
    from: usize,
    count: usize,
) -> Result<Vec<T>> {
    let bytes = network.receive(from).await?;
    pool.serializer()
        .deserialize_list(&bytes, count)
        .map_err(|reason| SpdzError::malformed(from, reason))
}

/// Receive exactly `count` field elements from every other party, in party order.
pub(crate) async fn receive_elements_from_all<T: MpcField>(
    pool: &SpdzResourcePool<T>,
    network: &mut dyn Network,
    count: usize,
) -> Result<Vec<(usize, Vec<T>)>> {
    let serializer = pool.serializer();
    network
        .receive_from_all()
        .await?
        .into_iter()
        .map(|(party, bytes)| {
            serializer
                .deserialize_list(&bytes, count)
                .map(|values| (party, values))
                .map_err(|reason| SpdzError::malformed(party, reason))
        })
        .collect()
}

/// Add the elements received from the other parties to this party's own elements.
pub(crate) fn sum_contributions<T: MpcField>(own: &[T], received: &[(usize, Vec<T>)]) -> Vec<T> {
    let mut sums = own.to_vec();
    for (_, values) in received {
        for (sum, value) in sums.iter_mut().zip(values) {
            *sum += value;
        }
    }
    sums
}
