use crate::*;
use chrono::{DateTime, Utc};
use std::fmt;

/// M1: who is voting. Sealed for the CO, who never sees the ballot.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct IdentityMessage {
    pub voter_id: VoterId,
    pub voter_name: String,
    pub voter_email: String,
    pub linking_id: CorrelationToken,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl IdentityMessage {
    pub fn new(voter: &Voter, linking_id: CorrelationToken) -> Self {
        IdentityMessage {
            voter_id: voter.id,
            voter_name: voter.display_name(),
            voter_email: voter.email.clone(),
            linking_id,
            timestamp: Utc::now(),
        }
    }

    /// True if both messages were produced for the same vote
    pub fn correlates_with(&self, ballot: &BallotMessage) -> bool {
        self.linking_id == ballot.linking_id
    }
}

/// M2: what was chosen. Sealed for the DE, who never sees the voter.
#[derive(Serialize, Deserialize, Clone, PartialEq)]
pub struct BallotMessage {
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    pub linking_id: CorrelationToken,
    #[serde(with = "iso8601")]
    pub timestamp: DateTime<Utc>,
}

impl BallotMessage {
    pub fn new(candidate: &Candidate, linking_id: CorrelationToken) -> Self {
        BallotMessage {
            candidate_id: candidate.id,
            candidate_name: candidate.name.clone(),
            linking_id,
            timestamp: Utc::now(),
        }
    }
}

// Plaintext messages must never end up in logs
impl fmt::Debug for IdentityMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMessage").finish_non_exhaustive()
    }
}

impl fmt::Debug for BallotMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BallotMessage").finish_non_exhaustive()
    }
}

/// Decrypt and parse an identity message (CO side)
pub fn open_identity<K: Unsealer + ?Sized>(
    key: &K,
    m1_identity: &str,
) -> Result<IdentityMessage> {
    let plaintext = key.open(m1_identity)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

/// Decrypt and parse a ballot message (DE side)
pub fn open_ballot<K: Unsealer + ?Sized>(key: &K, m2_ballot: &str) -> Result<BallotMessage> {
    let plaintext = key.open(m2_ballot)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

// Millisecond precision with a `Z` suffix, e.g. 2024-05-01T09:30:00.123Z
mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
