use crate::*;

/// Decrypts messages sealed for one authority.
pub trait Unsealer {
    fn open(&self, armored: &str) -> Result<Vec<u8>>;
}

impl Unsealer for AuthorityKeypair {
    fn open(&self, armored: &str) -> Result<Vec<u8>> {
        AuthorityKeypair::open(self, armored)
    }
}

impl Unsealer for OpenPgpSecretKey {
    fn open(&self, armored: &str) -> Result<Vec<u8>> {
        OpenPgpSecretKey::open(self, armored)
    }
}

/// A CO or DE secret key in either supported format
#[derive(Debug, Clone)]
pub enum AuthorityKey {
    OpenPgp(OpenPgpSecretKey),
    Rsa(AuthorityKeypair),
}

impl AuthorityKey {
    /// Load an armored OpenPGP secret key or a PKCS#8 PEM RSA key
    pub fn from_armored(armored: &str) -> Result<Self> {
        if armored.trim_start().starts_with(PGP_SECRET_KEY_HEADER) {
            Ok(AuthorityKey::OpenPgp(OpenPgpSecretKey::from_armored(armored)?))
        } else {
            Ok(AuthorityKey::Rsa(AuthorityKeypair::from_secret_pem(armored)?))
        }
    }
}

impl Unsealer for AuthorityKey {
    fn open(&self, armored: &str) -> Result<Vec<u8>> {
        match self {
            AuthorityKey::OpenPgp(key) => key.open(armored),
            AuthorityKey::Rsa(key) => key.open(armored),
        }
    }
}
