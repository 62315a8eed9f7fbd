mod share;
pub use share::SpdzShare;

pub mod commitment;
pub mod gates;
pub mod mac_check;
pub mod opened_values;
pub mod protocol;
pub mod resource_pool;

pub use protocol::{EvaluationStatus, NativeProtocol, Schedulable};
pub use resource_pool::SpdzResourcePool;

/// Random sharing of a secret random triple (a, b, c) that satisfies ab = c.
/// Consumed by exactly one multiplication.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpdzTriple<T> {
    pub a: SpdzShare<T>,
    pub b: SpdzShare<T>,
    pub c: SpdzShare<T>,
}

/// Random sharing of a random value, in plain known only to the party it was dealt toward.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpdzInputMask<T> {
    pub mask: SpdzShare<T>,
    pub real_value: Option<T>,
}
