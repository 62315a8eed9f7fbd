//! Native protocols evaluated by the SPDZ online phase.

mod input;
mod mult;
mod open;
mod preprocessed;

pub use input::{InputProtocol, MaliciousInputProtocol};
pub use mult::MultiplyProtocol;
pub use open::{OpenProtocol, OpenToPartyProtocol};
pub use preprocessed::{
    ExpPipeProtocol, KnownValueProtocol, RandomBitProtocol, RandomElementProtocol,
};
