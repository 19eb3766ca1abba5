//! Verifiable Random Function over the P-256 group.
//!
//! Grounded on `oZKS/vrf.h`/`vrf.cpp`: `VRFSecretKey::get_proof` produces a
//! Schnorr-style proof `(gamma, c, s)` over `h = hash_to_curve(data)`, and
//! `VRFPublicKey::verify_proof` checks it via `u' = c*pk + s*g`,
//! `v' = c*gamma + s*h` and recomputing the challenge.

use blake2::{Blake2b512, Digest};
use rand::RngCore;

use crate::curve::{hash_to_curve, EcPoint, EcScalar, POINT_SIZE, SCALAR_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::hash::Hash;

const VRF_PROOF_HASH_DOMAIN: &[u8] = b"vrf_proof_hash";
const VRF_OUTPUT_HASH_DOMAIN: &[u8] = b"vrf_output_hash";

/// A non-interactive proof that `gamma = secret_key * hash_to_curve(data)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VrfProof {
    pub gamma: EcPoint,
    pub c: EcScalar,
    pub s: EcScalar,
}

impl VrfProof {
    pub const SAVE_SIZE: usize = POINT_SIZE + SCALAR_SIZE + SCALAR_SIZE;

    pub fn to_bytes(&self) -> [u8; Self::SAVE_SIZE] {
        let mut out = [0u8; Self::SAVE_SIZE];
        out[0..POINT_SIZE].copy_from_slice(&self.gamma.to_bytes());
        out[POINT_SIZE..POINT_SIZE + SCALAR_SIZE].copy_from_slice(&self.c.to_bytes());
        out[POINT_SIZE + SCALAR_SIZE..].copy_from_slice(&self.s.to_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != Self::SAVE_SIZE {
            return Err(CryptoError::InvalidLength {
                what: "VRF proof",
                expected: Self::SAVE_SIZE,
                actual: bytes.len(),
            });
        }
        let gamma = EcPoint::from_bytes(&bytes[0..POINT_SIZE])?;
        let c = EcScalar::from_bytes(&bytes[POINT_SIZE..POINT_SIZE + SCALAR_SIZE])?;
        let s = EcScalar::from_bytes(&bytes[POINT_SIZE + SCALAR_SIZE..])?;
        Ok(VrfProof { gamma, c, s })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VrfSecretKey(EcScalar);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VrfPublicKey(EcPoint);

impl VrfSecretKey {
    /// Generates a fresh secret key using the system RNG.
    pub fn generate() -> Self {
        let mut rng = rand::rngs::OsRng;
        let mut bytes = [0u8; SCALAR_SIZE];
        loop {
            rng.fill_bytes(&mut bytes);
            if let Ok(scalar) = EcScalar::from_bytes(&bytes) {
                return VrfSecretKey(scalar);
            }
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        Ok(VrfSecretKey(EcScalar::from_bytes(bytes)?))
    }

    pub fn to_bytes(&self) -> [u8; SCALAR_SIZE] {
        self.0.to_bytes()
    }

    pub fn public_key(&self) -> VrfPublicKey {
        VrfPublicKey(EcPoint::generator().mul_scalar(&self.0))
    }

    /// The raw VRF hash output for `data`, independent of the proof.
    pub fn output_hash(&self, data: &[u8]) -> CryptoResult<Hash> {
        let gamma = hash_to_curve(data)?.mul_scalar(&self.0);
        Ok(output_hash_from_gamma(&gamma))
    }

    /// Produces a non-deterministic VRF proof for `data`.
    pub fn prove(&self, data: &[u8]) -> CryptoResult<(VrfProof, Hash)> {
        let h = hash_to_curve(data)?;
        let gamma = h.mul_scalar(&self.0);

        let mut rng = rand::rngs::OsRng;
        let mut nonce_bytes = [0u8; SCALAR_SIZE];
        let r = loop {
            rng.fill_bytes(&mut nonce_bytes);
            if let Ok(scalar) = EcScalar::from_bytes(&nonce_bytes) {
                break scalar;
            }
        };

        let u = EcPoint::generator().mul_scalar(&r);
        let v = h.mul_scalar(&r);
        let public_key = self.public_key();

        let c = hash_points(&[
            &EcPoint::generator(),
            &h,
            &public_key.0,
            &gamma,
            &u,
            &v,
        ]);
        // s = r - c * sk  (mod order)
        let s = r.add(&c.mul(&self.0).negate());

        Ok((VrfProof { gamma, c, s }, output_hash_from_gamma(&gamma)))
    }
}

impl EcScalar {
    fn negate(&self) -> Self {
        EcScalar(-self.0)
    }
}

impl VrfPublicKey {
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        Ok(VrfPublicKey(EcPoint::from_bytes(bytes)?))
    }

    pub fn to_bytes(&self) -> [u8; POINT_SIZE] {
        self.0.to_bytes()
    }

    /// Verifies `proof` for `data` and, if valid, returns the VRF hash output.
    pub fn verify_proof(&self, data: &[u8], proof: &VrfProof) -> CryptoResult<Hash> {
        let h = hash_to_curve(data)?;

        let u_prime = self.0.mul_scalar(&proof.c).add(&EcPoint::generator().mul_scalar(&proof.s));
        let v_prime = proof.gamma.mul_scalar(&proof.c).add(&h.mul_scalar(&proof.s));

        let c_prime = hash_points(&[
            &EcPoint::generator(),
            &h,
            &self.0,
            &proof.gamma,
            &u_prime,
            &v_prime,
        ]);

        if c_prime.0 != proof.c.0 {
            return Err(CryptoError::InvalidPoint);
        }

        Ok(output_hash_from_gamma(&proof.gamma))
    }
}

fn output_hash_from_gamma(gamma: &EcPoint) -> Hash {
    let mut hasher = blake2::Blake2b512::new();
    hasher.update(VRF_OUTPUT_HASH_DOMAIN);
    hasher.update(gamma.to_bytes());
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// Domain-separated Fiat-Shamir challenge over an arbitrary number of points,
/// reduced modulo the curve order. Grounded on `oZKS/vrf.cpp`'s
/// `hash_points`.
fn hash_points(points: &[&EcPoint]) -> EcScalar {
    let mut hasher = Blake2b512::new();
    hasher.update(VRF_PROOF_HASH_DOMAIN);
    for point in points {
        hasher.update(point.to_bytes());
    }
    let digest = hasher.finalize();
    EcScalar::from_hash_mod_order(&digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prove_then_verify_succeeds() {
        let sk = VrfSecretKey::generate();
        let pk = sk.public_key();
        let (proof, output) = sk.prove(b"some key").expect("prove should succeed");
        let verified = pk.verify_proof(b"some key", &proof).expect("verify should not error");
        assert_eq!(verified, output);
    }

    #[test]
    fn verify_rejects_wrong_data() {
        let sk = VrfSecretKey::generate();
        let pk = sk.public_key();
        let (proof, _) = sk.prove(b"some key").expect("prove should succeed");
        assert!(pk.verify_proof(b"different key", &proof).is_err());
    }

    #[test]
    fn verify_rejects_wrong_public_key() {
        let sk = VrfSecretKey::generate();
        let other_pk = VrfSecretKey::generate().public_key();
        let (proof, _) = sk.prove(b"some key").expect("prove should succeed");
        assert!(other_pk.verify_proof(b"some key", &proof).is_err());
    }

    #[test]
    fn proof_round_trips_through_bytes() {
        let sk = VrfSecretKey::generate();
        let (proof, _) = sk.prove(b"round trip").expect("prove should succeed");
        let bytes = proof.to_bytes();
        let back = VrfProof::from_bytes(&bytes).expect("proof bytes must decode");
        assert_eq!(proof, back);
    }
}
