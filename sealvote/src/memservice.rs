use crate::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// The two authorities of an election
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    /// Identity verification
    Co,
    /// Decryption and tally
    De,
}

/// A vote as stored by the in-memory service
#[derive(Debug, Clone)]
pub struct StoredVote {
    pub vote_id: u64,
    pub voter_id: VoterId,
    pub package: EncryptedVotePackage,
    pub receipt_code: String,
    pub submitted_at: DateTime<Utc>,
}

struct MemElection {
    detail: ElectionDetail,
    candidates: Vec<Candidate>,
    // armored (co, de) public keys
    public_keys: Option<(String, String)>,
    withheld: Option<Authority>,

    // voter id -> has voted
    assignments: HashMap<VoterId, bool>,
}

#[derive(Default)]
struct MemState {
    elections: BTreeMap<ElectionId, MemElection>,
    used_unique_ids: HashSet<Uuid>,
    votes: Vec<StoredVote>,
}

/// An in-process election service, logged in as a single voter.
///
/// Applies the same acceptance rules as the real server: the election must be open, the
/// voter assigned and not yet voted, and a `unique_id` can only be used once.
pub struct MemElectionService {
    voter: Voter,
    offline: AtomicBool,
    submit_calls: AtomicUsize,
    candidate_calls: AtomicUsize,
    state: Mutex<MemState>,
}

impl MemElectionService {
    pub fn new(voter: Voter) -> Self {
        MemElectionService {
            voter,
            offline: AtomicBool::new(false),
            submit_calls: AtomicUsize::new(0),
            candidate_calls: AtomicUsize::new(0),
            state: Mutex::new(MemState::default()),
        }
    }

    /// Add an election and assign the logged-in voter to it.
    ///
    /// `detail.has_voted` is ignored; it is derived from the voter's assignment.
    pub fn add_election(&self, detail: ElectionDetail, candidates: Vec<Candidate>) -> ElectionId {
        let id = detail.id;
        let mut assignments = HashMap::new();
        assignments.insert(self.voter.id, false);

        self.lock().elections.insert(
            id,
            MemElection {
                detail,
                candidates,
                public_keys: None,
                withheld: None,
                assignments,
            },
        );
        id
    }

    /// Publish the armored CO and DE public keys of an election.
    ///
    /// Until this is called the key endpoint answers with neither key.
    pub fn set_public_keys(&self, election: ElectionId, co: String, de: String) {
        if let Some(e) = self.lock().elections.get_mut(&election) {
            e.public_keys = Some((co, de));
        }
    }

    pub fn set_status(&self, election: ElectionId, status: ElectionStatus) {
        if let Some(e) = self.lock().elections.get_mut(&election) {
            e.detail.status = status;
        }
    }

    /// Leave one authority's key out of the key endpoint response
    pub fn withhold_key(&self, election: ElectionId, authority: Authority) {
        if let Some(e) = self.lock().elections.get_mut(&election) {
            e.withheld = Some(authority);
        }
    }

    pub fn unassign(&self, election: ElectionId, voter: VoterId) {
        if let Some(e) = self.lock().elections.get_mut(&election) {
            e.assignments.remove(&voter);
        }
    }

    /// While offline every call fails with `NetworkFailure`
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `submit_vote` calls made, including ones that failed offline
    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of `candidates` calls received
    pub fn candidate_calls(&self) -> usize {
        self.candidate_calls.load(Ordering::SeqCst)
    }

    /// Accepted votes, oldest first
    pub fn votes(&self) -> Vec<StoredVote> {
        self.lock().votes.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::NetworkFailure("connection refused".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl ElectionService for MemElectionService {
    async fn public_keys(&self, election: ElectionId) -> Result<PublicKeysResponse> {
        self.check_online()?;
        let state = self.lock();
        let e = state
            .elections
            .get(&election)
            .ok_or(Error::ElectionNotFound(election))?;

        let mut resp = PublicKeysResponse::default();
        if let Some((co, de)) = &e.public_keys {
            if e.withheld != Some(Authority::Co) {
                resp.co_public_key = Some(co.clone());
            }
            if e.withheld != Some(Authority::De) {
                resp.de_public_key = Some(de.clone());
            }
        }
        Ok(resp)
    }

    async fn election(&self, election: ElectionId) -> Result<ElectionDetail> {
        self.check_online()?;
        let state = self.lock();
        let e = state
            .elections
            .get(&election)
            .ok_or(Error::ElectionNotFound(election))?;

        let mut detail = e.detail.clone();
        detail.has_voted = e.assignments.get(&self.voter.id).copied().unwrap_or(false);
        Ok(detail)
    }

    async fn candidates(&self, election: ElectionId) -> Result<Vec<Candidate>> {
        self.check_online()?;
        self.candidate_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.lock();
        let e = state
            .elections
            .get(&election)
            .ok_or(Error::ElectionNotFound(election))?;
        Ok(e.candidates.clone())
    }

    async fn submit_vote(&self, package: &EncryptedVotePackage) -> Result<VoteReceipt> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut state = self.lock();
        let next_vote_id = state.votes.len() as u64 + 1;
        if state.used_unique_ids.contains(&package.unique_id) {
            return Err(Error::SubmissionRejected(
                "This unique ID already exists. Please try again.".to_owned(),
            ));
        }

        let e = state
            .elections
            .get_mut(&package.election_id)
            .ok_or(Error::ElectionNotFound(package.election_id))?;

        if !e.detail.status.is_open() {
            return Err(Error::SubmissionRejected(
                "This election is not open for voting.".to_owned(),
            ));
        }
        let has_voted = match e.assignments.get_mut(&self.voter.id) {
            Some(has_voted) => has_voted,
            None => {
                return Err(Error::SubmissionRejected(
                    "You are not assigned to this election.".to_owned(),
                ))
            }
        };
        if *has_voted {
            return Err(Error::SubmissionRejected(
                "You have already voted in this election.".to_owned(),
            ));
        }
        if package.m1_identity.trim().is_empty() || package.m2_ballot.trim().is_empty() {
            return Err(Error::SubmissionRejected(
                "m1_identity and m2_ballot are required.".to_owned(),
            ));
        }
        *has_voted = true;

        let mut salt = [0u8; 16];
        thread_rng().fill(&mut salt);
        let receipt_code = hex::encode(Sha256::digest(
            format!(
                "{}-{}-{}",
                next_vote_id,
                package.unique_id,
                hex::encode(salt)
            )
            .as_bytes(),
        ));

        state.used_unique_ids.insert(package.unique_id);
        state.votes.push(StoredVote {
            vote_id: next_vote_id,
            voter_id: self.voter.id,
            package: package.clone(),
            receipt_code: receipt_code.clone(),
            submitted_at: Utc::now(),
        });

        Ok(VoteReceipt {
            message: "Vote submitted successfully.".to_owned(),
            vote_id: next_vote_id,
            receipt_code,
            unique_id: package.unique_id.to_string(),
        })
    }

    async fn voter_status(&self, election: ElectionId) -> Result<VoterStatus> {
        self.check_online()?;
        let state = self.lock();
        let e = state
            .elections
            .get(&election)
            .ok_or(Error::ElectionNotFound(election))?;

        Ok(match e.assignments.get(&self.voter.id) {
            Some(has_voted) => VoterStatus {
                has_voted: *has_voted,
                is_assigned: true,
            },
            None => VoterStatus {
                has_voted: false,
                is_assigned: false,
            },
        })
    }

    async fn verify_receipt(&self, code: &str) -> Result<ReceiptCheck> {
        self.check_online()?;
        let state = self.lock();
        let vote = state.votes.iter().find(|v| v.receipt_code == code);

        Ok(match vote {
            Some(vote) => ReceiptCheck {
                valid: true,
                election: state
                    .elections
                    .get(&vote.package.election_id)
                    .map(|e| e.detail.title.clone()),
                submitted_at: Some(vote.submitted_at),
                status: Some("pending_co".to_owned()),
                message: None,
            },
            None => ReceiptCheck {
                valid: false,
                election: None,
                submitted_at: None,
                status: None,
                message: Some("Invalid receipt.".to_owned()),
            },
        })
    }

    async fn current_user(&self) -> Result<Voter> {
        self.check_online()?;
        Ok(self.voter.clone())
    }
}

#[cfg(test)]
pub(crate) fn test_voter() -> Voter {
    Voter {
        id: 42,
        username: "voter42".to_owned(),
        email: "voter42@example.org".to_owned(),
        first_name: Some("Grace".to_owned()),
        last_name: Some("Hopper".to_owned()),
        role: Some("voter".to_owned()),
    }
}

#[cfg(test)]
pub(crate) fn open_election(id: ElectionId) -> ElectionDetail {
    ElectionDetail {
        id,
        title: format!("Election {}", id),
        description: String::new(),
        status: ElectionStatus::Open,
        has_voted: false,
    }
}

#[cfg(test)]
pub(crate) fn test_candidates() -> Vec<Candidate> {
    ["C1", "C2", "C3"]
        .iter()
        .enumerate()
        .map(|(i, name)| Candidate {
            id: i as CandidateId + 1,
            name: name.to_string(),
            party: None,
            program: None,
            photo: None,
        })
        .collect()
}

/// A service with one open election publishing the GnuPG test keys
#[cfg(test)]
pub(crate) fn test_service(election: ElectionId) -> MemElectionService {
    let service = MemElectionService::new(test_voter());
    service.add_election(open_election(election), test_candidates());
    service.set_public_keys(
        election,
        test_pgp_public(0).to_owned(),
        test_pgp_public(1).to_owned(),
    );
    service
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(election_id: ElectionId) -> EncryptedVotePackage {
        let keys =
            ElectionPublicKeys::new(test_pgp_public(0).to_owned(), test_pgp_public(1).to_owned());
        build_encrypted_vote_package(election_id, &test_voter(), &test_candidates()[0], &keys)
            .unwrap()
    }

    #[tokio::test]
    async fn test_accepts_once() {
        let service = test_service(1);

        let receipt = service.submit_vote(&package(1)).await.unwrap();
        assert_eq!(receipt.vote_id, 1);
        assert_eq!(receipt.receipt_code.len(), 64);
        assert!(service.election(1).await.unwrap().has_voted);

        let err = service.submit_vote(&package(1)).await.unwrap_err();
        assert_eq!(err.to_string(), "You have already voted in this election.");
        assert_eq!(service.submit_calls(), 2);
        assert_eq!(service.votes().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_closed_election() {
        let service = test_service(1);
        service.set_status(1, ElectionStatus::Closed);

        assert!(matches!(
            service.submit_vote(&package(1)).await,
            Err(Error::SubmissionRejected(_))
        ));
        assert!(service.votes().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_reused_unique_id() {
        let service = test_service(1);
        service.add_election(open_election(2), test_candidates());

        let first = package(1);
        service.submit_vote(&first).await.unwrap();

        let mut second = package(2);
        second.unique_id = first.unique_id;
        let err = service.submit_vote(&second).await.unwrap_err();
        assert!(err.to_string().contains("unique ID"));
    }

    #[tokio::test]
    async fn test_voter_status() {
        let service = test_service(1);
        assert_eq!(
            service.voter_status(1).await.unwrap(),
            VoterStatus {
                has_voted: false,
                is_assigned: true
            }
        );

        service.unassign(1, test_voter().id);
        assert!(!service.voter_status(1).await.unwrap().is_assigned);
        assert!(matches!(
            service.submit_vote(&package(1)).await,
            Err(Error::SubmissionRejected(_))
        ));
    }

    #[tokio::test]
    async fn test_withheld_key() {
        let service = test_service(1);
        service.withhold_key(1, Authority::De);

        let resp = service.public_keys(1).await.unwrap();
        assert!(resp.co_public_key.is_some());
        assert!(resp.de_public_key.is_none());
    }

    #[tokio::test]
    async fn test_unpublished_keys() {
        let service = MemElectionService::new(test_voter());
        service.add_election(open_election(3), test_candidates());
        let resp = service.public_keys(3).await.unwrap();
        assert!(resp.co_public_key.is_none());
        assert!(resp.de_public_key.is_none());
    }

    #[tokio::test]
    async fn test_receipt_lookup() {
        let service = test_service(1);
        let receipt = service.submit_vote(&package(1)).await.unwrap();

        let check = service.verify_receipt(&receipt.receipt_code).await.unwrap();
        assert!(check.valid);
        assert_eq!(check.election.as_deref(), Some("Election 1"));

        assert!(!service.verify_receipt("nope").await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_offline() {
        let service = test_service(1);
        service.set_offline(true);
        assert!(matches!(
            service.election(1).await,
            Err(Error::NetworkFailure(_))
        ));
        assert_eq!(service.submit_calls(), 0);

        // An attempt that never reaches the server still counts as a call
        assert!(matches!(
            service.submit_vote(&package(1)).await,
            Err(Error::NetworkFailure(_))
        ));
        assert_eq!(service.submit_calls(), 1);
        assert!(service.votes().is_empty());
    }
}
