use crate::*;
use log::{debug, warn};

/// The two recipient keys of one election, ASCII armored.
///
/// Only ever held for the duration of a single vote attempt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ElectionPublicKeys {
    co_public_key: String,
    de_public_key: String,
}

impl ElectionPublicKeys {
    pub fn new(co_public_key: String, de_public_key: String) -> Self {
        ElectionPublicKeys {
            co_public_key,
            de_public_key,
        }
    }

    /// Key of the identity-verification authority
    pub fn co_public_key(&self) -> &str {
        &self.co_public_key
    }

    /// Key of the tally authority
    pub fn de_public_key(&self) -> &str {
        &self.de_public_key
    }
}

impl TryFrom<PublicKeysResponse> for ElectionPublicKeys {
    type Error = Error;

    fn try_from(resp: PublicKeysResponse) -> Result<Self, Self::Error> {
        let co = required_key("co_public_key", resp.co_public_key)?;
        let de = required_key("de_public_key", resp.de_public_key)?;
        Ok(ElectionPublicKeys::new(co, de))
    }
}

fn required_key(name: &str, key: Option<String>) -> Result<String> {
    match key {
        None => Err(Error::KeyUnavailable(format!("{} missing", name))),
        Some(key) if key.trim().is_empty() => {
            Err(Error::KeyUnavailable(format!("{} is empty", name)))
        }
        Some(key) if !is_ascii_armored(&key) => {
            Err(Error::KeyUnavailable(format!("{} is not ASCII armored", name)))
        }
        Some(key) => Ok(key),
    }
}

/// Fetch the CO and DE public keys of an election, checked against the default
/// OpenPGP sealer.
pub async fn fetch_election_keys<S: ElectionService + ?Sized>(
    service: &S,
    election_id: ElectionId,
) -> Result<ElectionPublicKeys> {
    fetch_election_keys_with(service, election_id, &OpenPgpSealer).await
}

/// Fetch the CO and DE public keys of an election.
///
/// Always goes to the service: keys are never cached between vote attempts. Both keys
/// must parse with `sealer`, so a key the vote could not be sealed for is rejected here.
/// Network failures are reported as such, every other failure as `KeyUnavailable`.
pub async fn fetch_election_keys_with<S: ElectionService + ?Sized>(
    service: &S,
    election_id: ElectionId,
    sealer: &dyn Sealer,
) -> Result<ElectionPublicKeys> {
    debug!("vote: fetching public keys for election {}", election_id);

    let resp = match service.public_keys(election_id).await {
        Ok(resp) => resp,
        Err(Error::NetworkFailure(e)) => return Err(Error::NetworkFailure(e)),
        Err(Error::KeyUnavailable(e)) => return Err(Error::KeyUnavailable(e)),
        Err(e) => return Err(Error::KeyUnavailable(e.to_string())),
    };

    let checked = ElectionPublicKeys::try_from(resp).and_then(|keys| {
        usable_key(sealer, "co_public_key", keys.co_public_key())?;
        usable_key(sealer, "de_public_key", keys.de_public_key())?;
        Ok(keys)
    });

    checked.map_err(|e| {
        warn!("vote: election {}: {}", election_id, e);
        e
    })
}

fn usable_key(sealer: &dyn Sealer, name: &str, key: &str) -> Result<()> {
    sealer
        .check_recipient(key)
        .map_err(|e| Error::KeyUnavailable(format!("{} cannot be used: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEM: &str = "-----BEGIN PUBLIC KEY-----\nMIIB\n-----END PUBLIC KEY-----\n";

    fn resp(co: Option<&str>, de: Option<&str>) -> PublicKeysResponse {
        PublicKeysResponse {
            co_public_key: co.map(str::to_owned),
            de_public_key: de.map(str::to_owned),
        }
    }

    #[test]
    fn test_both_keys_present() {
        let keys = ElectionPublicKeys::try_from(resp(Some(PEM), Some(PEM))).unwrap();
        assert_eq!(keys.co_public_key(), PEM);
        assert_eq!(keys.de_public_key(), PEM);
    }

    #[test]
    fn test_missing_or_malformed_keys() {
        for bad in [
            resp(None, Some(PEM)),
            resp(Some(PEM), None),
            resp(Some(""), Some(PEM)),
            resp(Some(PEM), Some("   ")),
            resp(Some(PEM), Some("not a key")),
        ] {
            assert!(matches!(
                ElectionPublicKeys::try_from(bad),
                Err(Error::KeyUnavailable(_))
            ));
        }
    }

    #[test]
    fn test_missing_key_names_the_key() {
        let err = ElectionPublicKeys::try_from(resp(Some(PEM), None)).unwrap_err();
        assert!(err.to_string().contains("de_public_key"));
    }

    #[tokio::test]
    async fn test_fetch_from_service() {
        let service = test_service(1);

        let keys = fetch_election_keys(&service, 1).await.unwrap();
        assert!(keys.co_public_key().starts_with(PGP_PUBLIC_KEY_HEADER));
        assert_ne!(keys.co_public_key(), keys.de_public_key());

        assert!(matches!(
            fetch_election_keys(&service, 404).await,
            Err(Error::KeyUnavailable(_))
        ));

        service.set_offline(true);
        assert!(matches!(
            fetch_election_keys(&service, 1).await,
            Err(Error::NetworkFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_gnupg_keys_are_accepted_and_sealed_for() {
        let service = test_service(1);
        let keys = fetch_election_keys(&service, 1).await.unwrap();

        let package =
            build_encrypted_vote_package(1, &test_voter(), &test_candidates()[1], &keys).unwrap();
        let ballot = open_ballot(test_pgp_secret(1), &package.m2_ballot).unwrap();
        assert_eq!(ballot.candidate_name, "C2");
    }

    #[tokio::test]
    async fn test_unusable_key_is_unavailable() {
        let service = test_service(1);
        let rsa_pem = test_keypair(0).public_pem().unwrap();
        service.set_public_keys(1, test_pgp_public(0).to_owned(), rsa_pem.clone());

        let err = fetch_election_keys(&service, 1).await.unwrap_err();
        assert!(matches!(err, Error::KeyUnavailable(_)));
        assert!(err.to_string().contains("de_public_key"));

        // The same key is fine for the RSA-PEM sealer
        service.set_public_keys(1, rsa_pem.clone(), rsa_pem);
        assert!(fetch_election_keys_with(&service, 1, &HybridSealer)
            .await
            .is_ok());
    }
}
