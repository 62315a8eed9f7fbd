use ff::PrimeField;

/// Prime field usable as the value domain of SPDZ shares.
pub trait MpcField: PrimeField {
    /// Number of bytes in the canonical little-endian encoding of an element.
    fn byte_length() -> usize {
        Self::Repr::default().as_ref().len()
    }
}

impl<T: PrimeField> MpcField for T {}

mod mersenne_61 {
    use ff::PrimeField;

    /// Finite field mod 2^61-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "2305843009213693951"]
    #[PrimeFieldGenerator = "37"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne61([u64; 1]);
}

mod mersenne_127 {
    use ff::PrimeField;

    /// Finite field mod 2^127-1.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "170141183460469231731687303715884105727"]
    #[PrimeFieldGenerator = "43"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct Mersenne127([u64; 2]);
}

mod small {
    use ff::PrimeField;

    /// Finite field mod 251. Small enough that a forged MAC passes with observable probability.
    #[derive(PrimeField)]
    #[PrimeFieldModulus = "251"]
    #[PrimeFieldGenerator = "6"]
    #[PrimeFieldReprEndianness = "little"]
    pub struct F251([u64; 1]);
}

pub use mersenne_127::{Mersenne127, Mersenne127Repr};
pub use mersenne_61::{Mersenne61, Mersenne61Repr};
pub use small::{F251Repr, F251};

#[cfg(test)]
mod tests {
    use ff::Field;

    use super::*;

    #[test]
    fn test_small_field_wraps_around() {
        let a = F251::from(250);
        let b = F251::from(3);
        assert_eq!(a + b, F251::from(2));
        assert_eq!(b - a, F251::from(4));
        assert_eq!(-F251::one(), F251::from(250));
        assert_eq!(F251::from(251), F251::zero());
    }

    #[test]
    fn test_invert() {
        let a = F251::from(17);
        let inv = Option::<F251>::from(a.invert()).unwrap();
        assert_eq!(a * inv, F251::one());
        assert!(bool::from(F251::zero().invert().is_none()));

        let b = Mersenne61::from(123456789);
        let inv = Option::<Mersenne61>::from(b.invert()).unwrap();
        assert_eq!(b * inv, Mersenne61::one());
    }

    #[test]
    fn test_byte_length() {
        assert_eq!(F251::byte_length(), 8);
        assert_eq!(Mersenne61::byte_length(), 8);
        assert_eq!(Mersenne127::byte_length(), 16);
        assert_eq!(F251::NUM_BITS, 8);
        assert_eq!(Mersenne61::NUM_BITS, 61);
        assert_eq!(Mersenne127::NUM_BITS, 127);
    }
}
