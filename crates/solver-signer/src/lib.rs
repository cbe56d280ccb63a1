// SPDX-License-Identifier: MIT OR Apache-2.0
//! solver-signer
#![deny(unsafe_code)]
#![warn(missing_docs)]
//!
//! Deterministic secp256k1 digest signing, behind a narrow [`SignerPort`]
//! trait. [`LocalSigner`] wraps an in-process key for tests and reference
//! deployments; [`KmsSigner`] adapts an injected [`KmsClient`] (a stand-in
//! for an HSM/KMS network call) to the same port.
//!
//! The vault-never-exports-keys shape and the EVM-address-from-secp256k1
//! derivation follow the identity trait used elsewhere in the corpus;
//! narrowed here from a dual ed25519/secp256k1 identity down to the single
//! digest-signing port this workspace needs.

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};
use solver_core::Signature;

/// Errors a signer backend may return.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// A backend-side failure that may succeed on retry (network blip, rate limit).
    #[error("transient signer error: {0}")]
    Transient(String),
    /// A backend-side failure that will not succeed on retry (bad key, malformed response).
    #[error("permanent signer error: {0}")]
    Permanent(String),
}

/// Signs a 32-byte digest with a deterministic secp256k1 key.
///
/// Implementations MUST normalize `s` to the lower half of the curve order
/// (EIP-2) and return a recovery id in `{27, 28}`. Signing need not be
/// deterministic between different signer instances, but nonces must come
/// from RFC-6979 or an HSM — never from this crate's own entropy.
pub trait SignerPort: Send + Sync {
    /// Sign `digest`, returning an EIP-2-normalized `{r, s, v}` signature.
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SignerError>;

    /// The uncompressed SEC1 public key (65 bytes: `0x04 || X || Y`).
    fn public_key(&self) -> Vec<u8>;

    /// The Ethereum-style address: the low 20 bytes of `keccak256(X || Y)`.
    fn address(&self) -> [u8; 20];
}

/// An in-process signer backed by a `k256` signing key. Used by the
/// reference deployment and by tests; production deployments anchoring
/// on-chain should prefer [`KmsSigner`].
pub struct LocalSigner {
    signing_key: SigningKey,
}

impl LocalSigner {
    /// Wrap an existing signing key.
    #[must_use]
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// The verifying (public) key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    /// Parse a signing key from a 32-byte hex string (with or without a
    /// leading `0x`). Used to build a [`LocalSigner`] from an operator-
    /// supplied key outside of tests.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::Permanent`] if `hex` is not valid hex, is not
    /// exactly 32 bytes, or does not encode a valid secp256k1 scalar.
    pub fn from_hex(hex: &str) -> Result<Self, SignerError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex).map_err(|e| SignerError::Permanent(format!("invalid signing key hex: {e}")))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| SignerError::Permanent(format!("invalid signing key bytes: {e}")))?;
        Ok(Self { signing_key })
    }
}

impl SignerPort for LocalSigner {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SignerError> {
        let (sig, recid): (EcdsaSignature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|e| SignerError::Permanent(e.to_string()))?;
        let (sig, recid) = normalize_low_s(sig, recid);
        Ok(encode_signature(&sig, recid))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key().to_encoded_point(false).as_bytes().to_vec()
    }

    fn address(&self) -> [u8; 20] {
        address_from_verifying_key(&self.verifying_key())
    }
}

/// Port to an external signing backend (HSM/KMS): returns a DER-encoded
/// ECDSA signature over a SHA-256 digest. Implementations never return or
/// log private key material.
pub trait KmsClient: Send + Sync {
    /// Request a signature over `digest` from the backend. Returns the
    /// DER-encoded `(r, s)` pair.
    fn sign_digest_der(&self, digest: &[u8; 32]) -> Result<Vec<u8>, SignerError>;

    /// The backend's public key, uncompressed SEC1 (65 bytes).
    fn public_key_sec1(&self) -> Vec<u8>;
}

/// Adapts a [`KmsClient`] to [`SignerPort`]: DER-decodes the response,
/// normalizes `s`, and recovers `v` by brute-forcing both candidate
/// recovery ids against the backend's known public key.
pub struct KmsSigner {
    client: Box<dyn KmsClient>,
    verifying_key: VerifyingKey,
}

impl KmsSigner {
    /// Build a KMS-backed signer, caching the backend's public key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's reported public key is not a valid
    /// SEC1-encoded point.
    pub fn new(client: Box<dyn KmsClient>) -> Result<Self, SignerError> {
        let bytes = client.public_key_sec1();
        let verifying_key = VerifyingKey::from_sec1_bytes(&bytes)
            .map_err(|e| SignerError::Permanent(format!("invalid KMS public key: {e}")))?;
        Ok(Self { client, verifying_key })
    }
}

impl SignerPort for KmsSigner {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<Signature, SignerError> {
        let der = self.client.sign_digest_der(digest)?;
        let sig = EcdsaSignature::from_der(&der)
            .map_err(|e| SignerError::Permanent(format!("malformed DER signature: {e}")))?;
        let sig = sig.normalize_s().unwrap_or(sig);

        let recid = recover_recovery_id(&sig, digest, &self.verifying_key)
            .ok_or_else(|| SignerError::Permanent("neither recovery candidate matched the known public key".to_string()))?;

        Ok(encode_signature(&sig, recid))
    }

    fn public_key(&self) -> Vec<u8> {
        self.verifying_key.to_encoded_point(false).as_bytes().to_vec()
    }

    fn address(&self) -> [u8; 20] {
        address_from_verifying_key(&self.verifying_key)
    }
}

/// If `sig.s()` is in the upper half of the curve order, negate it (EIP-2)
/// and flip the recovery id's y-parity bit to match — the two roots
/// correspond to the same message under the opposite nonce sign, so only
/// the parity bit (not the x-overflow bit) changes.
fn normalize_low_s(sig: EcdsaSignature, recid: RecoveryId) -> (EcdsaSignature, RecoveryId) {
    match sig.normalize_s() {
        Some(normalized) => {
            let flipped = RecoveryId::from_byte(recid.to_byte() ^ 1).unwrap_or(recid);
            (normalized, flipped)
        }
        None => (sig, recid),
    }
}

fn recover_recovery_id(sig: &EcdsaSignature, digest: &[u8; 32], expected: &VerifyingKey) -> Option<RecoveryId> {
    for candidate in [0u8, 1u8] {
        let recid = RecoveryId::from_byte(candidate)?;
        if let Ok(recovered) = VerifyingKey::recover_from_prehash(digest, sig, recid) {
            if recovered == *expected {
                return Some(recid);
            }
        }
    }
    None
}

fn encode_signature(sig: &EcdsaSignature, recid: RecoveryId) -> Signature {
    let bytes = sig.to_bytes();
    let (r, s) = bytes.split_at(32);
    Signature {
        r: hex_lower(r),
        s: hex_lower(s),
        v: recid.to_byte() + 27,
    }
}

fn address_from_verifying_key(key: &VerifyingKey) -> [u8; 20] {
    let encoded = key.to_encoded_point(false);
    let full = encoded.as_bytes();
    // Skip the leading 0x04 tag; hash the raw X || Y coordinates.
    let hash = Keccak256::digest(&full[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

fn hex_lower(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
