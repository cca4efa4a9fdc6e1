//! ECDSA P-256 keys, signing, and the verifier the ledger consults.
//!
//! Addresses are the hex of the uncompressed public point without its SEC1
//! tag (`X || Y`); signatures are the hex of `r || s`. Messages are hashed
//! with SHA-256 before signing.

use crate::transaction::signing_payload;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

const SCALAR_SIZE: usize = 32;

/// Narrow contract the ledger uses to check transaction signatures.
pub trait SignatureVerifier: Send + Sync {
    fn verify(&self, public_key_hex: &str, message: &str, signature_hex: &str) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct P256Verifier;

impl SignatureVerifier for P256Verifier {
    fn verify(&self, public_key_hex: &str, message: &str, signature_hex: &str) -> bool {
        let Some(key) = decode_public_key(public_key_hex) else {
            return false;
        };
        let Some(signature) = decode_signature(signature_hex) else {
            return false;
        };
        key.verify(message.as_bytes(), &signature).is_ok()
    }
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("invalid secret key")]
    InvalidSecret,
}

pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(secret_hex.trim())?;
        let padded = left_pad(&bytes).ok_or(WalletError::InvalidSecret)?;
        let signing_key =
            SigningKey::from_slice(&padded).map_err(|_| WalletError::InvalidSecret)?;
        Ok(Self { signing_key })
    }

    pub fn secret_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// The public key as `hex(X || Y)`; doubles as the wallet's address.
    pub fn address(&self) -> String {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        hex::encode(&point.as_bytes()[1..])
    }

    pub fn sign(&self, message: &str) -> String {
        let signature: Signature = self.signing_key.sign(message.as_bytes());
        hex::encode(signature.to_bytes())
    }

    /// Signs the canonical payload of a transfer from this wallet.
    pub fn sign_transfer(&self, receiver: &str, amount: f64) -> String {
        self.sign(&signing_payload(&self.address(), receiver, amount))
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

fn decode_public_key(public_key_hex: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(public_key_hex).ok()?;
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return None;
    }
    let (x, y) = bytes.split_at(bytes.len() / 2);
    let mut sec1 = Vec::with_capacity(1 + 2 * SCALAR_SIZE);
    sec1.push(0x04);
    sec1.extend_from_slice(&left_pad(x)?);
    sec1.extend_from_slice(&left_pad(y)?);
    VerifyingKey::from_sec1_bytes(&sec1).ok()
}

fn decode_signature(signature_hex: &str) -> Option<Signature> {
    let bytes = hex::decode(signature_hex).ok()?;
    if bytes.len() < 2 * SCALAR_SIZE {
        return None;
    }
    let (r, s) = bytes.split_at(bytes.len() / 2);
    let mut raw = Vec::with_capacity(2 * SCALAR_SIZE);
    raw.extend_from_slice(&left_pad(r)?);
    raw.extend_from_slice(&left_pad(s)?);
    Signature::from_slice(&raw).ok()
}

/// Big-endian integers may arrive with leading zero bytes stripped.
fn left_pad(bytes: &[u8]) -> Option<[u8; SCALAR_SIZE]> {
    let significant = match bytes.iter().position(|b| *b != 0) {
        Some(start) => &bytes[start..],
        None => &[][..],
    };
    if significant.len() > SCALAR_SIZE {
        return None;
    }
    let mut out = [0u8; SCALAR_SIZE];
    out[SCALAR_SIZE - significant.len()..].copy_from_slice(significant);
    Some(out)
}
