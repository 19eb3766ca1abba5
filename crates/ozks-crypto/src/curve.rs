//! A thin wrapper around the NIST P-256 curve group used by the VRF.
//!
//! The original source mixes two elliptic-curve backends (P-256 and FourQ,
//! see `oZKS/ecpoint.h`); this port settles on P-256 via `ark-secp256r1`,
//! which the teacher workspace already depends on.

use ark_ec::{AffineRepr, CurveGroup, Group};
use ark_ff::{BigInteger, Field, PrimeField};
use ark_secp256r1::{Affine, Fq, Fr, Projective};
use blake2::{Blake2b512, Digest};

use crate::error::{CryptoError, CryptoResult};

/// Uncompressed point encoding length for P-256 (two 32-byte coordinates).
pub const POINT_SIZE: usize = 64;
/// Scalar encoding length for P-256's order.
pub const SCALAR_SIZE: usize = 32;

const HASH_TO_CURVE_DOMAIN: &[u8] = b"ozks_hash_to_curve";
const MAX_HASH_TO_CURVE_ATTEMPTS: u32 = 256;

/// A point in the P-256 group, always checked to be on-curve and in the
/// (cofactor-1, so automatic) prime-order subgroup by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EcPoint(pub Projective);

impl EcPoint {
    pub fn generator() -> Self {
        EcPoint(Projective::generator())
    }

    pub fn identity() -> Self {
        EcPoint(Projective::zero())
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != POINT_SIZE {
            return Err(CryptoError::InvalidLength {
                what: "EC point",
                expected: POINT_SIZE,
                actual: bytes.len(),
            });
        }
        let x = Fq::from_be_bytes_mod_order(&bytes[0..32]);
        let y = Fq::from_be_bytes_mod_order(&bytes[32..64]);
        let affine = Affine::new_unchecked(x, y);
        if !affine.is_on_curve() || !affine.is_in_correct_subgroup_assuming_on_curve() {
            return Err(CryptoError::InvalidPoint);
        }
        Ok(EcPoint(affine.into_group()))
    }

    pub fn to_bytes(&self) -> [u8; POINT_SIZE] {
        let affine = self.0.into_affine();
        let mut out = [0u8; POINT_SIZE];
        let (x, y) = affine.xy().unwrap_or((Fq::from(0u64), Fq::from(0u64)));
        out[0..32].copy_from_slice(&be_bytes_32(&x));
        out[32..64].copy_from_slice(&be_bytes_32(&y));
        out
    }

    pub fn mul_scalar(&self, scalar: &EcScalar) -> Self {
        EcPoint((self.0 * scalar.0).into())
    }

    pub fn add(&self, other: &EcPoint) -> Self {
        EcPoint((self.0 + other.0).into())
    }
}

/// A scalar in P-256's order field `Fr`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EcScalar(pub Fr);

impl EcScalar {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SCALAR_SIZE {
            return Err(CryptoError::InvalidLength {
                what: "EC scalar",
                expected: SCALAR_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(EcScalar(Fr::from_be_bytes_mod_order(bytes)))
    }

    pub fn from_hash_mod_order(data: &[u8]) -> Self {
        EcScalar(Fr::from_be_bytes_mod_order(data))
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_SIZE] {
        let mut out = [0u8; SCALAR_SIZE];
        let bytes = self.0.into_bigint().to_bytes_be();
        let offset = SCALAR_SIZE - bytes.len();
        out[offset..].copy_from_slice(&bytes);
        out
    }

    pub fn add(&self, other: &EcScalar) -> Self {
        EcScalar(self.0 + other.0)
    }

    pub fn mul(&self, other: &EcScalar) -> Self {
        EcScalar(self.0 * other.0)
    }
}

fn be_bytes_32(field_element: &Fq) -> [u8; 32] {
    let bytes = field_element.into_bigint().to_bytes_be();
    let mut out = [0u8; 32];
    let offset = 32 - bytes.len();
    out[offset..].copy_from_slice(&bytes);
    out
}

/// Hashes arbitrary data to a curve point via try-and-increment: the
/// candidate x-coordinate is `BLAKE2b(domain ‖ counter ‖ data) mod p`, and is
/// accepted once `x^3 + a*x + b` is a quadratic residue (has a square root).
///
/// Grounded on the general shape of `oZKS/vrf.cpp`'s hash-to-curve step;
/// the original delegates this to its FourQ/P-256 backend library, so the
/// try-and-increment loop itself is a standard, curve-agnostic construction.
pub fn hash_to_curve(data: &[u8]) -> CryptoResult<EcPoint> {
    for counter in 0..MAX_HASH_TO_CURVE_ATTEMPTS {
        let mut hasher = Blake2b512::new();
        hasher.update(HASH_TO_CURVE_DOMAIN);
        hasher.update(counter.to_be_bytes());
        hasher.update(data);
        let digest = hasher.finalize();

        let x = Fq::from_be_bytes_mod_order(&digest);
        let a = Fq::from(-3i64);
        let b = ark_secp256r1::Config::COEFF_B;
        let rhs = x * x * x + a * x + b;

        if let Some(y) = rhs.sqrt() {
            let affine = Affine::new_unchecked(x, y);
            if affine.is_on_curve() && affine.is_in_correct_subgroup_assuming_on_curve() {
                return Ok(EcPoint(affine.into_group()));
            }
        }
    }
    Err(CryptoError::HashToCurveExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_round_trips_through_bytes() {
        let g = EcPoint::generator();
        let bytes = g.to_bytes();
        let back = EcPoint::from_bytes(&bytes).expect("generator bytes must decode");
        assert_eq!(g, back);
    }

    #[test]
    fn hash_to_curve_is_deterministic_and_on_curve() {
        let a = hash_to_curve(b"some VRF input").expect("should find a point");
        let b = hash_to_curve(b"some VRF input").expect("should find a point");
        assert_eq!(a, b);
    }

    #[test]
    fn hash_to_curve_varies_with_input() {
        let a = hash_to_curve(b"input a").expect("should find a point");
        let b = hash_to_curve(b"input b").expect("should find a point");
        assert_ne!(a, b);
    }
}
