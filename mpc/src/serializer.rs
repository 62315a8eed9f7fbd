use std::marker::PhantomData;

use thiserror::Error;

use crate::fields::MpcField;

/// Reason a byte string could not be decoded into field elements.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SerializationError {
    #[error("expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("encoding is not a canonical field element")]
    NonCanonical,
}

/// Fixed-length encoding of field elements.
///
/// The length depends only on the field, so concatenated elements need no framing.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldSerializer<T> {
    _phantom: PhantomData<T>,
}

impl<T: MpcField> FieldSerializer<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }

    /// Length of a single encoded element.
    pub fn element_length(&self) -> usize {
        T::byte_length()
    }

    pub fn serialize(&self, value: &T) -> Vec<u8> {
        value.to_repr().as_ref().to_vec()
    }

    pub fn deserialize(&self, bytes: &[u8]) -> Result<T, SerializationError> {
        let mut repr = T::Repr::default();
        if bytes.len() != repr.as_ref().len() {
            return Err(SerializationError::InvalidLength {
                expected: repr.as_ref().len(),
                actual: bytes.len(),
            });
        }
        repr.as_mut().copy_from_slice(bytes);
        Option::from(T::from_repr(repr)).ok_or(SerializationError::NonCanonical)
    }

    pub fn serialize_list(&self, values: &[T]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(values.len() * self.element_length());
        for value in values {
            bytes.extend_from_slice(value.to_repr().as_ref());
        }
        bytes
    }

    /// Decode exactly `count` concatenated elements.
    pub fn deserialize_list(
        &self,
        bytes: &[u8],
        count: usize,
    ) -> Result<Vec<T>, SerializationError> {
        let len = self.element_length();
        if bytes.len() != count * len {
            return Err(SerializationError::InvalidLength {
                expected: count * len,
                actual: bytes.len(),
            });
        }
        bytes.chunks(len).map(|chunk| self.deserialize(chunk)).collect()
    }
}
