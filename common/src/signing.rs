use std::fmt;

use alloy_primitives::{hex, Address, Signature, B256};
use k256::ecdsa::VerifyingKey;
use tracing::debug;

use crate::error::{Result, SignError};

/// A secp256k1 public key recovered from a signature.
#[derive(Clone, PartialEq, Eq)]
pub struct RecoveredKey(VerifyingKey);

impl RecoveredKey {
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.0
    }

    /// 65-byte SEC1 encoding, `0x04 || x || y`.
    pub fn to_uncompressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(false).as_bytes().to_vec()
    }

    /// 33-byte SEC1 encoding.
    pub fn to_compressed(&self) -> Vec<u8> {
        self.0.to_encoded_point(true).as_bytes().to_vec()
    }

    /// Ethereum address: the last 20 bytes of keccak256(x || y).
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.0)
    }

    /// Parses a SEC1 public key, compressed or uncompressed, with or without `0x`.
    pub fn from_sec1_hex(input: &str) -> Result<Self> {
        let bytes = hex::decode(input.trim())
            .map_err(|e| SignError::InvalidSignature(format!("public key is not hex: {e}")))?;
        VerifyingKey::from_sec1_bytes(&bytes)
            .map(Self)
            .map_err(|e| SignError::InvalidSignature(format!("invalid public key: {e}")))
    }
}

impl From<VerifyingKey> for RecoveredKey {
    fn from(key: VerifyingKey) -> Self {
        Self(key)
    }
}

/// Displays the uncompressed key as `0x`-prefixed hex.
impl fmt::Display for RecoveredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_uncompressed()))
    }
}

impl fmt::Debug for RecoveredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecoveredKey").field(&self.to_string()).finish()
    }
}

/// Renders a signature as 65-byte `0x`-prefixed hex.
pub fn signature_hex(signature: &Signature) -> String {
    format!("0x{}", hex::encode(signature.as_bytes()))
}

/// Recovers the public key that produced `signature` over `hash`.
///
/// `signature` must be the 65-byte `r || s || v` encoding; `v` may be 0/1 or 27/28.
pub fn recover_signer_key(hash: &B256, signature: &[u8]) -> Result<RecoveredKey> {
    if signature.len() != 65 {
        return Err(SignError::InvalidSignature(format!(
            "expected 65 bytes, got {}",
            signature.len()
        )));
    }
    let signature =
        Signature::try_from(signature).map_err(|e| SignError::InvalidSignature(e.to_string()))?;
    recover_from_signature(hash, &signature)
}

pub fn recover_from_signature(hash: &B256, signature: &Signature) -> Result<RecoveredKey> {
    let key = signature
        .recover_from_prehash(hash)
        .map_err(|e| SignError::InvalidSignature(format!("recovery failed: {e}")))?;
    let key = RecoveredKey(key);
    debug!(%hash, address = %key.address(), "recovered signer key");
    Ok(key)
}
