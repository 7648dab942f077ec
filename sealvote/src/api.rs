use crate::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type ElectionId = u64;
pub type CandidateId = u64;
pub type VoterId = u64;

/// Lifecycle status of an election. Only `Open` admits votes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElectionStatus {
    Draft,
    Waiting,
    Open,
    EnCours,
    Closed,
    Archived,
    #[serde(other)]
    Unknown,
}

impl ElectionStatus {
    pub fn is_open(&self) -> bool {
        *self == ElectionStatus::Open
    }
}

/// An election as seen by the logged-in voter
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ElectionDetail {
    pub id: ElectionId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: ElectionStatus,

    /// Whether the logged-in voter has already voted. Always reported by the server.
    #[serde(default)]
    pub has_voted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

/// Key endpoint response, as sent. Validation happens in `fetch_election_keys`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct PublicKeysResponse {
    #[serde(default)]
    pub co_public_key: Option<String>,
    #[serde(default)]
    pub de_public_key: Option<String>,
}

/// The voter's assignment to an election
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoterStatus {
    pub has_voted: bool,
    #[serde(default = "assigned_by_default")]
    pub is_assigned: bool,
}

fn assigned_by_default() -> bool {
    true
}

/// Server acknowledgement of an accepted vote
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct VoteReceipt {
    #[serde(default)]
    pub message: String,
    pub vote_id: u64,
    pub receipt_code: String,
    pub unique_id: String,
}

/// Result of looking up a receipt code
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ReceiptCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub election: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginResponse {
    pub user: Voter,
    pub token: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// The election service the voting core talks to.
///
/// Transport and storage are the implementor's business; the vote flow only relies on
/// the contracts below.
#[async_trait]
pub trait ElectionService: Send + Sync {
    /// The CO and DE public keys of an election
    async fn public_keys(&self, election: ElectionId) -> Result<PublicKeysResponse>;

    /// Election detail, including whether the current voter has voted
    async fn election(&self, election: ElectionId) -> Result<ElectionDetail>;

    /// Candidates on the ballot, in ballot order. May be empty.
    async fn candidates(&self, election: ElectionId) -> Result<Vec<Candidate>>;

    /// Cast a vote. This is irreversible on success.
    async fn submit_vote(&self, package: &EncryptedVotePackage) -> Result<VoteReceipt>;

    /// The current voter's assignment to an election
    async fn voter_status(&self, election: ElectionId) -> Result<VoterStatus>;

    async fn verify_receipt(&self, code: &str) -> Result<ReceiptCheck>;

    /// The logged-in user
    async fn current_user(&self) -> Result<Voter>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parsing() {
        let status: ElectionStatus = serde_json::from_str("\"open\"").unwrap();
        assert!(status.is_open());

        let status: ElectionStatus = serde_json::from_str("\"en_cours\"").unwrap();
        assert_eq!(status, ElectionStatus::EnCours);
        assert!(!status.is_open());

        let status: ElectionStatus = serde_json::from_str("\"suspended\"").unwrap();
        assert_eq!(status, ElectionStatus::Unknown);
    }

    #[test]
    fn test_election_detail() {
        let json = r#"{
            "id": 4,
            "title": "Board",
            "description": "Annual board election",
            "status": "closed",
            "start_date": "2024-01-01T00:00:00Z",
            "total_candidates": 3,
            "has_voted": true
        }"#;
        let election: ElectionDetail = serde_json::from_str(json).unwrap();
        assert_eq!(election.id, 4);
        assert_eq!(election.status, ElectionStatus::Closed);
        assert!(election.has_voted);
    }

    #[test]
    fn test_candidate_optional_fields() {
        let candidate: Candidate =
            serde_json::from_str(r#"{"id": 1, "name": "Ada", "party": null}"#).unwrap();
        assert_eq!(candidate.party, None);
        assert_eq!(
            serde_json::to_string(&candidate).unwrap(),
            r#"{"id":1,"name":"Ada"}"#
        );
    }
}
