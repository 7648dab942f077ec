use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// The value that binds an identity message to its ballot message.
///
/// It is the SHA-256 of a freshly generated random secret, hex encoded. The secret is
/// dropped as soon as the hash is computed, so neither authority can recover it from the
/// token. Only the token itself travels, and only inside the two ciphertexts.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Generate a new token from a fresh random UUID
    pub fn generate() -> Self {
        let secret = Uuid::new_v4().to_string();
        Self::from_secret(secret.as_bytes())
    }

    /// Hash an arbitrary secret into a token
    pub fn from_secret(secret: &[u8]) -> Self {
        CorrelationToken(hex::encode(Sha256::digest(secret)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CorrelationToken(..)")
    }
}

impl AsRef<str> for CorrelationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of correlation tokens
pub trait TokenSource: Send + Sync {
    fn correlation_token(&self) -> CorrelationToken;
}

/// CSPRNG-backed tokens, the default
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomTokenSource;

impl TokenSource for RandomTokenSource {
    fn correlation_token(&self) -> CorrelationToken {
        CorrelationToken::generate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = CorrelationToken::generate();
        assert_eq!(token.as_str().len(), 64);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_token_from_secret() {
        // SHA-256("abc")
        let token = CorrelationToken::from_secret(b"abc");
        assert_eq!(
            token.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_tokens_are_unique() {
        let tokens: HashSet<CorrelationToken> = (0..1000)
            .map(|_| RandomTokenSource.correlation_token())
            .collect();
        assert_eq!(tokens.len(), 1000);
    }

    #[test]
    fn test_debug_hides_token() {
        let token = CorrelationToken::generate();
        assert!(!format!("{:?}", token).contains(token.as_str()));
    }
}
