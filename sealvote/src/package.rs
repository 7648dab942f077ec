use crate::*;
use log::{debug, warn};
use serde::Serialize;
use uuid::Uuid;

/// Everything the server receives for one vote.
///
/// `unique_id` only tracks the package while it moves from the CO stage to the DE stage.
/// It is generated independently of the correlation token and carries no link to it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncryptedVotePackage {
    pub election_id: ElectionId,

    /// `IdentityMessage` sealed for the CO
    pub m1_identity: String,

    /// `BallotMessage` sealed for the DE
    pub m2_ballot: String,

    pub unique_id: Uuid,
}

/// Builds encrypted vote packages from a token source and a sealer.
pub struct PackageBuilder {
    tokens: Box<dyn TokenSource>,
    sealer: Box<dyn Sealer>,
}

impl Default for PackageBuilder {
    fn default() -> Self {
        PackageBuilder {
            tokens: Box::new(RandomTokenSource),
            sealer: Box::new(OpenPgpSealer),
        }
    }
}

impl PackageBuilder {
    pub fn new(tokens: Box<dyn TokenSource>, sealer: Box<dyn Sealer>) -> Self {
        PackageBuilder { tokens, sealer }
    }

    pub fn with_sealer(mut self, sealer: Box<dyn Sealer>) -> Self {
        self.sealer = sealer;
        self
    }

    pub fn with_tokens(mut self, tokens: Box<dyn TokenSource>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn sealer(&self) -> &dyn Sealer {
        self.sealer.as_ref()
    }

    /// Build the two sealed messages for a vote.
    ///
    /// Either both messages are sealed or an `EncryptionFailure` is returned; there is no
    /// partially built package.
    pub fn build(
        &self,
        election_id: ElectionId,
        voter: &Voter,
        candidate: &Candidate,
        keys: &ElectionPublicKeys,
    ) -> Result<EncryptedVotePackage> {
        let linking_id = self.tokens.correlation_token();

        let identity = IdentityMessage::new(voter, linking_id.clone());
        let ballot = BallotMessage::new(candidate, linking_id);

        let m1_identity = self
            .seal_json(keys.co_public_key(), &identity)
            .map_err(|e| {
                warn!("vote: sealing identity message failed: {}", e);
                Error::EncryptionFailure("identity message")
            })?;
        let m2_ballot = self
            .seal_json(keys.de_public_key(), &ballot)
            .map_err(|e| {
                warn!("vote: sealing ballot message failed: {}", e);
                Error::EncryptionFailure("ballot message")
            })?;

        let package = EncryptedVotePackage {
            election_id,
            m1_identity,
            m2_ballot,
            unique_id: Uuid::new_v4(),
        };
        debug!(
            "vote: built package {} for election {}",
            package.unique_id, election_id
        );

        Ok(package)
    }

    fn seal_json<T: Serialize>(&self, recipient: &str, message: &T) -> Result<String> {
        let plaintext = serde_json::to_vec(message)?;
        let sealed = self.sealer.seal(recipient, &plaintext)?;
        if sealed.trim().is_empty() {
            return Err(Error::EncryptionFailure("message"));
        }
        Ok(sealed)
    }
}

/// Build an encrypted vote package with random tokens, sealed for OpenPGP authority keys.
pub fn build_encrypted_vote_package(
    election_id: ElectionId,
    voter: &Voter,
    candidate: &Candidate,
    keys: &ElectionPublicKeys,
) -> Result<EncryptedVotePackage> {
    PackageBuilder::default().build(election_id, voter, candidate, keys)
}
