use std::ops::{Add, Mul, Neg, Sub};

use crate::fields::MpcField;

/// Value share in SPDZ protocol.
///
/// `value` is this party's additive share of a secret `x`, `mac` is its additive share
/// of `alpha * x` under the global MAC key `alpha`. Both are linear, so every operation
/// here is local and needs no preprocessing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SpdzShare<T> {
    pub value: T,
    pub mac: T,
}

impl<T: MpcField> SpdzShare<T> {
    pub fn new(value: T, mac: T) -> Self {
        Self { value, mac }
    }

    pub fn zero() -> Self {
        SpdzShare {
            value: T::zero(),
            mac: T::zero(),
        }
    }

    /// Share of a public constant. Only party 1 holds the value; every party
    /// authenticates it with its own key share.
    pub fn from_public(x: T, key_share: T, party_id: usize) -> Self {
        SpdzShare {
            value: if party_id == 1 { x } else { T::zero() },
            mac: x * key_share,
        }
    }

    /// Add a public constant.
    pub fn add_public(self, x: T, key_share: T, party_id: usize) -> Self {
        self + Self::from_public(x, key_share, party_id)
    }

    pub fn double(&self) -> Self {
        SpdzShare {
            value: self.value.double(),
            mac: self.mac.double(),
        }
    }
}

impl<T: MpcField> Add for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn add(self, rhs: Self) -> Self::Output {
        SpdzShare {
            value: self.value + rhs.value,
            mac: self.mac + rhs.mac,
        }
    }
}

impl<T: MpcField> Sub for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn sub(self, rhs: Self) -> Self::Output {
        SpdzShare {
            value: self.value - rhs.value,
            mac: self.mac - rhs.mac,
        }
    }
}

impl<T: MpcField> Neg for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn neg(self) -> Self::Output {
        SpdzShare {
            value: -self.value,
            mac: -self.mac,
        }
    }
}

impl<T: MpcField> Mul<T> for SpdzShare<T> {
    type Output = SpdzShare<T>;
    fn mul(self, rhs: T) -> Self::Output {
        SpdzShare {
            value: self.value * rhs,
            mac: self.mac * rhs,
        }
    }
}
