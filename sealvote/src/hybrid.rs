//! RSA-PEM hybrid encryption, the alternative to OpenPGP sealing for deployments that
//! issue plain RSA keys.
//!
//! Every message gets its own AES-256-GCM content key. The content key is wrapped with
//! RSA-OAEP (SHA-256) under the recipient's public key, so the length of a message is not
//! bounded by the RSA modulus. The sealed output is an ASCII-armored text block:
//!
//! ```text
//! -----BEGIN SEALVOTE MESSAGE-----
//! base64(version || u16 BE wrapped key length || wrapped key || nonce || AES-GCM ciphertext)
//! -----END SEALVOTE MESSAGE-----
//! ```
//!
//! Public keys are PEM encoded, either SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`).

use crate::*;
use aes_gcm::aead::{generic_array::GenericArray, Aead, KeyInit};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::{thread_rng, Rng};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::fmt;

const FORMAT_VERSION: u8 = 1;
const AES_KEY_LENGTH: usize = 32;
const AES_IV_LENGTH: usize = 12;
const ARMOR_BEGIN: &str = "-----BEGIN SEALVOTE MESSAGE-----";
const ARMOR_END: &str = "-----END SEALVOTE MESSAGE-----";
const ARMOR_LINE: usize = 64;

/// Default modulus size for authority keys
pub const DEFAULT_KEY_BITS: usize = 2048;

type AesKey = [u8; AES_KEY_LENGTH];

/// The public-key encryption primitive used to seal vote messages.
pub trait Sealer: Send + Sync {
    /// Encrypt `plaintext` for the holder of the PEM encoded `recipient` public key,
    /// returning armored ciphertext.
    fn seal(&self, recipient: &str, plaintext: &[u8]) -> Result<String>;

    /// Check that `recipient` is a key this sealer can encrypt to
    fn check_recipient(&self, recipient: &str) -> Result<()>;
}

/// RSA-OAEP wrapped AES-256-GCM for PEM encoded RSA keys
#[derive(Debug, Default, Clone, Copy)]
pub struct HybridSealer;

impl Sealer for HybridSealer {
    fn seal(&self, recipient: &str, plaintext: &[u8]) -> Result<String> {
        let public = parse_public_key(recipient)?;
        seal(&public, plaintext)
    }

    fn check_recipient(&self, recipient: &str) -> Result<()> {
        parse_public_key(recipient).map(|_| ())
    }
}

/// An RSA keypair held by an authority (CO or DE).
#[derive(Clone)]
pub struct AuthorityKeypair {
    secret: RsaPrivateKey,
    public: RsaPublicKey,
}

impl AuthorityKeypair {
    /// Generate a new keypair with a modulus of `bits` bits
    pub fn generate(bits: usize) -> Result<Self> {
        let secret = RsaPrivateKey::new(&mut thread_rng(), bits)?;
        let public = RsaPublicKey::from(&secret);
        Ok(AuthorityKeypair { secret, public })
    }

    /// Load a keypair from a PKCS#8 PEM encoded private key
    pub fn from_secret_pem(pem: &str) -> Result<Self> {
        let secret =
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let public = RsaPublicKey::from(&secret);
        Ok(AuthorityKeypair { secret, public })
    }

    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public
    }

    pub fn secret_key(&self) -> &RsaPrivateKey {
        &self.secret
    }

    /// SPKI PEM encoding of the public key, as served by the election service
    pub fn public_pem(&self) -> Result<String> {
        self.public
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(e.to_string()))
    }

    /// PKCS#8 PEM encoding of the private key
    pub fn secret_pem(&self) -> Result<String> {
        let pem = self
            .secret
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| Error::InvalidKey(e.to_string()))?;
        Ok(pem.to_string())
    }

    /// Decrypt an armored message sealed for this keypair
    pub fn open(&self, armored: &str) -> Result<Vec<u8>> {
        open(&self.secret, armored)
    }
}

impl fmt::Debug for AuthorityKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorityKeypair").finish_non_exhaustive()
    }
}

/// Returns true if `key` has the shape of an armored block, PEM or OpenPGP
pub fn is_ascii_armored(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("-----BEGIN ") && key.contains("-----END ")
}

/// Parse a PEM encoded RSA public key (SPKI or PKCS#1)
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Encrypt a message so that it can only be decrypted by the receiver's private key.
pub fn seal(receiver: &RsaPublicKey, msg: &[u8]) -> Result<String> {
    let mut rng = thread_rng();

    let mut content_key: AesKey = [0u8; AES_KEY_LENGTH];
    rng.fill(&mut content_key);

    let wrapped = receiver.encrypt(&mut rng, Oaep::new::<Sha256>(), &content_key)?;
    let wrapped_len = u16::try_from(wrapped.len())
        .map_err(|_| Error::InvalidKey("modulus too large".to_owned()))?;
    let encrypted = aes_encrypt(&content_key, msg)?;

    let mut cipher_text = Vec::with_capacity(3 + wrapped.len() + encrypted.len());
    cipher_text.push(FORMAT_VERSION);
    cipher_text.extend(wrapped_len.to_be_bytes());
    cipher_text.extend(wrapped);
    cipher_text.extend(encrypted);

    Ok(armor(&cipher_text))
}

/// Decrypt an armored message using the receiver's private key.
pub fn open(receiver: &RsaPrivateKey, armored: &str) -> Result<Vec<u8>> {
    let bytes = dearmor(armored)?;
    if bytes.len() < 3 || bytes[0] != FORMAT_VERSION {
        return Err(Error::MalformedMessage);
    }

    let wrapped_len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    let body = &bytes[3..];
    if body.len() < wrapped_len + AES_IV_LENGTH {
        return Err(Error::MalformedMessage);
    }
    let (wrapped, encrypted) = body.split_at(wrapped_len);

    let content_key = receiver
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| Error::Decryption)?;
    if content_key.len() != AES_KEY_LENGTH {
        return Err(Error::Decryption);
    }

    let mut key: AesKey = [0u8; AES_KEY_LENGTH];
    key.copy_from_slice(&content_key);
    aes_decrypt(&key, encrypted)
}

fn aes_encrypt(key: &AesKey, msg: &[u8]) -> Result<Vec<u8>> {
    let aead = Aes256Gcm::new(GenericArray::from_slice(key));

    let mut nonce = [0u8; AES_IV_LENGTH];
    thread_rng().fill(&mut nonce);
    let nonce = GenericArray::from_slice(&nonce);

    let ciphertext = aead
        .encrypt(nonce, msg)
        .map_err(|_| Error::EncryptionFailure("message"))?;

    let mut output = Vec::with_capacity(AES_IV_LENGTH + ciphertext.len());
    output.extend(nonce);
    output.extend(ciphertext);

    Ok(output)
}

fn aes_decrypt(key: &AesKey, ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.len() < AES_IV_LENGTH {
        return Err(Error::MalformedMessage);
    }
    let aead = Aes256Gcm::new(GenericArray::from_slice(key));

    let nonce = GenericArray::from_slice(&ciphertext[..AES_IV_LENGTH]);
    let encrypted = &ciphertext[AES_IV_LENGTH..];

    aead.decrypt(nonce, encrypted).map_err(|_| Error::Decryption)
}

fn armor(bytes: &[u8]) -> String {
    let encoded = BASE64.encode(bytes);

    let mut out = String::with_capacity(encoded.len() + encoded.len() / ARMOR_LINE + 80);
    out.push_str(ARMOR_BEGIN);
    out.push('\n');
    let mut start = 0;
    while start < encoded.len() {
        let end = usize::min(start + ARMOR_LINE, encoded.len());
        out.push_str(&encoded[start..end]);
        out.push('\n');
        start = end;
    }
    out.push_str(ARMOR_END);
    out.push('\n');
    out
}

fn dearmor(armored: &str) -> Result<Vec<u8>> {
    let body = armored
        .trim()
        .strip_prefix(ARMOR_BEGIN)
        .and_then(|rest| rest.strip_suffix(ARMOR_END))
        .ok_or(Error::MalformedMessage)?;

    let compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(compact).map_err(|_| Error::MalformedMessage)
}

/// Two small authority keypairs shared by every test in the crate.
#[cfg(test)]
pub(crate) fn test_keypair(index: usize) -> &'static AuthorityKeypair {
    use std::sync::OnceLock;

    static KEYS: OnceLock<Vec<AuthorityKeypair>> = OnceLock::new();
    let keys = KEYS.get_or_init(|| {
        (0..2)
            .map(|_| AuthorityKeypair::generate(1024).unwrap())
            .collect()
    });
    &keys[index]
}
