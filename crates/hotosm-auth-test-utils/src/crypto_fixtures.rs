//! Deterministic cryptographic fixtures for testing.
//!
//! Provides reproducible Ed25519 keypairs; the same seed always produces the
//! same keypair, so tokens and JWKS documents are stable across test runs.

use ring::signature::{Ed25519KeyPair, KeyPair};
use thiserror::Error;

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// Generate a deterministic Ed25519 keypair for testing.
///
/// # Arguments
/// * `seed` - Seed value for deterministic key generation (0-255)
///
/// # Returns
/// * `Ok((public_key_bytes, private_key_pkcs8))` - Raw 32-byte public key
///   and the private key as a PKCS#8 v1 document (what
///   `jsonwebtoken::EncodingKey::from_ed_der` expects)
pub fn test_signing_key(seed: u8) -> Result<(Vec<u8>, Vec<u8>), FixtureError> {
    // Create deterministic 32-byte seed from input
    let mut seed_bytes = [0u8; 32];
    seed_bytes[0] = seed;
    for (i, byte) in seed_bytes.iter_mut().enumerate().skip(1) {
        *byte = seed.wrapping_mul(i as u8).wrapping_add(i as u8);
    }

    let key_pair = Ed25519KeyPair::from_seed_unchecked(&seed_bytes)
        .map_err(|e| FixtureError::Crypto(format!("Failed to generate test keypair: {e:?}")))?;

    let public_key_bytes = key_pair.public_key().as_ref().to_vec();
    let pkcs8_bytes = build_pkcs8_from_seed(&seed_bytes);

    Ok((public_key_bytes, pkcs8_bytes))
}

/// Build a PKCS#8 v1 document from an Ed25519 seed.
///
/// Ring doesn't expose PKCS#8 for a keypair constructed from a seed, so the
/// DER structure (RFC 5208) is assembled by hand. Test-only; production key
/// material comes from the identity provider.
fn build_pkcs8_from_seed(seed: &[u8; 32]) -> Vec<u8> {
    // SEQUENCE {
    //   version         INTEGER (0),
    //   algorithm       AlgorithmIdentifier (OID 1.3.101.112),
    //   privateKey      OCTET STRING { OCTET STRING seed }
    // }
    let mut pkcs8 = Vec::new();

    pkcs8.push(0x30);
    pkcs8.push(0x2e); // Length: 46 bytes

    // Version: INTEGER 0
    pkcs8.extend_from_slice(&[0x02, 0x01, 0x00]);

    // Algorithm Identifier: SEQUENCE { OID for Ed25519 }
    pkcs8.push(0x30);
    pkcs8.push(0x05);
    pkcs8.extend_from_slice(&[0x06, 0x03, 0x2b, 0x65, 0x70]);

    // Private Key: OCTET STRING containing OCTET STRING with the seed
    pkcs8.push(0x04);
    pkcs8.push(0x22);
    pkcs8.push(0x04);
    pkcs8.push(0x20);
    pkcs8.extend_from_slice(seed);

    pkcs8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signing_key_is_deterministic() {
        let (pub1, priv1) = test_signing_key(1).unwrap();
        let (pub2, priv2) = test_signing_key(1).unwrap();

        assert_eq!(pub1, pub2, "Public keys should be identical for same seed");
        assert_eq!(priv1, priv2, "Private keys should be identical for same seed");
    }

    #[test]
    fn test_different_seeds_produce_different_keys() {
        let (pub1, _) = test_signing_key(1).unwrap();
        let (pub2, _) = test_signing_key(2).unwrap();

        assert_ne!(pub1, pub2, "Different seeds should produce different keys");
    }

    #[test]
    fn test_public_key_is_32_bytes() {
        let (public, _) = test_signing_key(7).unwrap();
        assert_eq!(public.len(), 32);
    }

    #[test]
    fn test_pkcs8_round_trips_through_ring() {
        let (public, pkcs8) = test_signing_key(3).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(&pkcs8)
            .expect("hand-built PKCS#8 should parse");
        assert_eq!(pair.public_key().as_ref(), public.as_slice());
    }
}
