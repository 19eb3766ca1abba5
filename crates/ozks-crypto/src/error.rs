use thiserror::Error;

/// Errors raised by the hashing, curve and VRF primitives.
#[derive(Clone, Debug, Error)]
pub enum CryptoError {
    #[error("failed to decode a {what}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("point is not on the curve or not in the prime-order subgroup")]
    InvalidPoint,

    #[error("scalar is out of range for the curve's order")]
    InvalidScalar,

    #[error("failed to hash input to a curve point after exhausting the try-and-increment budget")]
    HashToCurveExhausted,

    #[error("secret key has not been initialized")]
    UninitializedKey,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
