//! Single-round protocols that only draw from the supplier or share a public value.

use async_trait::async_trait;

use crate::error::{Result, SpdzError};
use crate::fields::MpcField;
use crate::spdz::{EvaluationStatus, NativeProtocol, SpdzResourcePool, SpdzShare};
use crate::transport::Network;

/// Share of a uniformly random element unknown to every party.
#[derive(Default)]
pub struct RandomElementProtocol<T> {
    output: Option<SpdzShare<T>>,
}

impl<T: MpcField> RandomElementProtocol<T> {
    pub fn new() -> Self {
        Self { output: None }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for RandomElementProtocol<T> {
    type Output = SpdzShare<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        _network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        if round != 0 {
            return Err(SpdzError::invalid_round("RandomElementProtocol", round));
        }
        self.output = Some(pool.supplier().next_random_element().await?);
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&self) -> Option<SpdzShare<T>> {
        self.output
    }
}

/// Share of a uniformly random bit.
#[derive(Default)]
pub struct RandomBitProtocol<T> {
    output: Option<SpdzShare<T>>,
}

impl<T: MpcField> RandomBitProtocol<T> {
    pub fn new() -> Self {
        Self { output: None }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for RandomBitProtocol<T> {
    type Output = SpdzShare<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        _network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        if round != 0 {
            return Err(SpdzError::invalid_round("RandomBitProtocol", round));
        }
        self.output = Some(pool.supplier().next_random_bit().await?);
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&self) -> Option<SpdzShare<T>> {
        self.output
    }
}

/// Exponentiation pipe `[r^-1, r, r^2, ...]` of the requested length.
pub struct ExpPipeProtocol<T> {
    length: usize,
    output: Option<Vec<SpdzShare<T>>>,
}

impl<T: MpcField> ExpPipeProtocol<T> {
    /// `length` must match the pipe length the supplier was configured with.
    pub fn new(length: usize) -> Self {
        Self {
            length,
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for ExpPipeProtocol<T> {
    type Output = Vec<SpdzShare<T>>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        _network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        if round != 0 {
            return Err(SpdzError::invalid_round("ExpPipeProtocol", round));
        }
        let pipe = pool.supplier().next_exp_pipe().await?;
        if pipe.len() != self.length {
            return Err(SpdzError::ExpPipeLength {
                expected: self.length,
                actual: pipe.len(),
            });
        }
        self.output = Some(pipe);
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&self) -> Option<Vec<SpdzShare<T>>> {
        self.output.clone()
    }
}

/// Share of a public constant.
pub struct KnownValueProtocol<T> {
    value: T,
    output: Option<SpdzShare<T>>,
}

impl<T: MpcField> KnownValueProtocol<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            output: None,
        }
    }
}

#[async_trait(?Send)]
impl<T: MpcField> NativeProtocol<T> for KnownValueProtocol<T> {
    type Output = SpdzShare<T>;

    async fn evaluate(
        &mut self,
        round: usize,
        pool: &mut SpdzResourcePool<T>,
        _network: &mut dyn Network,
    ) -> Result<EvaluationStatus> {
        if round != 0 {
            return Err(SpdzError::invalid_round("KnownValueProtocol", round));
        }
        self.output = Some(SpdzShare::from_public(
            self.value,
            pool.key_share(),
            pool.party_id(),
        ));
        Ok(EvaluationStatus::IsDone)
    }

    fn out(&self) -> Option<SpdzShare<T>> {
        self.output
    }
}
