//! Cryptographic primitives: AES-256-GCM, P-256 ECDH, SHA-256 hashing, and
//! the listener's stateless handshake token.
//!
//! All key material derives `Zeroize`/`ZeroizeOnDrop` — wiped from memory
//! when dropped. There is no unsafe code in this module.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use hmac::{Hmac, Mac};
use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

// ── SHA-256 ───────────────────────────────────────────────────────────────────

/// Hash a byte slice, returning a 32-byte SHA-256 digest.
pub fn hash(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Incremental SHA-256 hasher for messages assembled in pieces.
pub struct Hasher(Sha256);

impl Hasher {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> [u8; 32] {
        let digest = self.0.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

// ── AES-256-GCM ───────────────────────────────────────────────────────────────

const NONCE_LEN: usize = 12;

/// Encrypt `plaintext` under `key`, returning `nonce ‖ ciphertext‖tag`.
///
/// The nonce is sampled fresh from a cryptographic RNG on every call —
/// required for AES-GCM safety, since nonce reuse under the same key is
/// catastrophic.
pub fn encrypt(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::EncryptFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt `nonce‖ciphertext‖tag` under `key`.
pub fn decrypt(key: &[u8; 32], blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < NONCE_LEN {
        return Err(CryptoError::TooShort);
    }
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::AuthFailure)
}

// ── P-256 ECDH ────────────────────────────────────────────────────────────────

/// A P-256 keypair used for one handshake's key agreement.
///
/// Generated fresh per handshake — this transport has no long-term
/// identity keys, only ephemeral key agreement (see spec Non-goals:
/// "authenticated identity beyond raw ECDH key agreement").
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Keypair {
    public: [u8; 64],
    secret: Zeroizing<[u8; 32]>,
}

impl Keypair {
    /// Generate a new random P-256 keypair.
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut rand::thread_rng());
        let public = encode_public_key(&secret);
        let mut secret_bytes = [0u8; 32];
        secret_bytes.copy_from_slice(secret.to_bytes().as_slice());
        Self {
            public,
            secret: Zeroizing::new(secret_bytes),
        }
    }

    /// The public key as wire-format `X‖Y`, each coordinate zero-padded to
    /// 32 bytes (total 64), per spec.
    pub fn public_bytes(&self) -> [u8; 64] {
        self.public
    }

    /// Compute the shared secret with a peer's wire-format public key.
    ///
    /// Returns the raw affine X coordinate of the ECDH shared point — for
    /// P-256 this is exactly 32 bytes, used directly as the AES-256 key
    /// with no KDF (matches the reference implementation's derivation;
    /// see DESIGN.md for the rationale).
    pub fn shared_secret(&self, peer_public: &[u8; 64]) -> Result<[u8; 32], CryptoError> {
        let secret = SecretKey::from_slice(&self.secret[..]).map_err(|_| CryptoError::BadKey)?;
        let peer = decode_public_key(peer_public)?;
        let shared = diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
        let x = shared.raw_secret_bytes();
        let mut out = [0u8; 32];
        out.copy_from_slice(x.as_slice());
        Ok(out)
    }
}

fn encode_public_key(secret: &SecretKey) -> [u8; 64] {
    let public = secret.public_key();
    let point = public.to_encoded_point(false);
    let mut out = [0u8; 64];
    out[..32].copy_from_slice(point.x().expect("uncompressed point has x"));
    out[32..].copy_from_slice(point.y().expect("uncompressed point has y"));
    out
}

fn decode_public_key(bytes: &[u8; 64]) -> Result<PublicKey, CryptoError> {
    let mut sec1 = [0u8; 65];
    sec1[0] = 0x04; // uncompressed point tag
    sec1[1..].copy_from_slice(bytes);
    PublicKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::BadKey)
}

// ── Handshake token ───────────────────────────────────────────────────────────

type HmacSha256 = Hmac<Sha256>;

/// A listener-side stateless handshake cookie.
///
/// `Token = truncate16(HMAC-SHA256(server_secret, peer_addr))`. The server
/// holds one random secret for its process lifetime; verification
/// recomputes the HMAC from the observed source address rather than
/// storing per-connection state. Replaces the reference implementation's
/// all-zero placeholder token (see DESIGN.md Open Question 4).
pub struct TokenSecret([u8; 32]);

impl TokenSecret {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn token_for(&self, peer_addr: &str) -> [u8; 16] {
        let mut mac = HmacSha256::new_from_slice(&self.0).expect("hmac accepts any key length");
        mac.update(peer_addr.as_bytes());
        let full = mac.finalize().into_bytes();
        let mut token = [0u8; 16];
        token.copy_from_slice(&full[..16]);
        token
    }

    pub fn verify(&self, peer_addr: &str, token: &[u8; 16]) -> bool {
        let expected = self.token_for(peer_addr);
        let mut diff = 0u8;
        for (a, b) in expected.iter().zip(token.iter()) {
            diff |= a ^ b;
        }
        diff == 0
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("AES-GCM encryption failed")]
    EncryptFailed,

    #[error("AES-GCM authentication failure")]
    AuthFailure,

    #[error("ciphertext too short to contain a nonce")]
    TooShort,

    #[error("invalid key or point")]
    BadKey,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
