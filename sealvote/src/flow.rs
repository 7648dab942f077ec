use crate::*;
use log::{debug, info, warn};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Where a voter is in casting one vote.
///
/// No state ever holds key material or ciphertext: keys and the sealed package only live
/// inside a single `confirm` call.
#[derive(Debug, Clone, PartialEq)]
pub enum VoteState {
    Selecting { selected: Option<Candidate> },
    Confirming { candidate: Candidate },
    Submitting { candidate: Candidate },
    Submitted { receipt: VoteReceipt },
    Failed { failure: Failure },
}

/// Why the last attempt failed, in words the voter can read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&Error> for Failure {
    fn from(e: &Error) -> Self {
        Failure {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VoteEvent {
    Select(CandidateId),
    Proceed,
    Cancel,
    Confirm,
    Retry,
    Completed(VoteReceipt),
    Aborted(Failure),
}

impl VoteEvent {
    pub fn name(&self) -> &'static str {
        match self {
            VoteEvent::Select(_) => "select",
            VoteEvent::Proceed => "proceed",
            VoteEvent::Cancel => "cancel",
            VoteEvent::Confirm => "confirm",
            VoteEvent::Retry => "retry",
            VoteEvent::Completed(_) => "complete",
            VoteEvent::Aborted(_) => "abort",
        }
    }
}

impl Default for VoteState {
    fn default() -> Self {
        VoteState::Selecting { selected: None }
    }
}

impl VoteState {
    pub fn name(&self) -> &'static str {
        match self {
            VoteState::Selecting { .. } => "selecting",
            VoteState::Confirming { .. } => "confirming",
            VoteState::Submitting { .. } => "submitting",
            VoteState::Submitted { .. } => "submitted",
            VoteState::Failed { .. } => "failed",
        }
    }

    /// The candidate currently picked, if any
    pub fn candidate(&self) -> Option<&Candidate> {
        match self {
            VoteState::Selecting { selected } => selected.as_ref(),
            VoteState::Confirming { candidate } | VoteState::Submitting { candidate } => {
                Some(candidate)
            }
            _ => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, VoteState::Submitted { .. })
    }

    /// The state that `event` leads to, given the candidates on the ballot.
    ///
    /// Every transition of the vote flow goes through here. A rejected event leaves the
    /// current state untouched.
    pub fn apply(
        &self,
        event: VoteEvent,
        candidates: &[Candidate],
    ) -> Result<VoteState, TransitionError> {
        use VoteEvent::*;
        use VoteState::*;

        let not_allowed = |event: &VoteEvent| TransitionError::NotAllowed(event.name(), self.name());

        match (self, event) {
            (Selecting { .. }, Select(id)) | (Failed { .. }, Select(id)) => Ok(Selecting {
                selected: Some(find_candidate(candidates, id)?),
            }),
            (Selecting { selected: Some(c) }, Proceed) => Ok(Confirming {
                candidate: c.clone(),
            }),
            (Selecting { selected: None }, Proceed) => Err(TransitionError::NoCandidateSelected),

            (Confirming { candidate }, Confirm) => Ok(Submitting {
                candidate: candidate.clone(),
            }),
            (Confirming { candidate }, Cancel) => Ok(Selecting {
                selected: Some(candidate.clone()),
            }),

            (Submitting { .. }, Completed(receipt)) => Ok(Submitted { receipt }),
            (Submitting { .. }, Aborted(failure)) => Ok(Failed { failure }),
            (Submitting { .. }, _) => Err(TransitionError::SubmissionInProgress),

            (Submitted { .. }, _) => Err(TransitionError::AlreadySubmitted),

            (Failed { .. }, Retry) => Ok(Selecting { selected: None }),

            (_, event) => Err(not_allowed(&event)),
        }
    }
}

fn find_candidate(candidates: &[Candidate], id: CandidateId) -> Result<Candidate, TransitionError> {
    candidates
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .ok_or(TransitionError::UnknownCandidate(id))
}

/// One voter casting one vote in one election.
///
/// Created through `open`, which checks with the server that the voter may vote here.
/// All methods take `&self`; the state lock is never held across an await, so a second
/// `confirm` issued while the first is in flight sees `Submitting` and is turned away.
pub struct VoteFlow<'a, S: ElectionService + ?Sized> {
    service: &'a S,
    session: VoterSession,
    election: ElectionDetail,
    candidates: Vec<Candidate>,
    builder: PackageBuilder,
    state: Mutex<VoteState>,
}

impl<'a, S: ElectionService + ?Sized> VoteFlow<'a, S> {
    /// Open the ballot of an election.
    ///
    /// Election status and the voter's assignment are always asked of the server, never
    /// remembered. Fails without fetching candidates if the election is not open, the
    /// voter is not assigned to it, or has already voted.
    pub async fn open(
        service: &'a S,
        session: VoterSession,
        election_id: ElectionId,
    ) -> Result<VoteFlow<'a, S>> {
        let election = service.election(election_id).await?;
        if !election.status.is_open() {
            info!(
                "vote: election {} is {:?}, not open",
                election_id, election.status
            );
            return Err(Error::ElectionNotOpen(election_id));
        }
        if election.has_voted {
            return Err(Error::AlreadyVoted(election_id));
        }

        let status = service.voter_status(election_id).await?;
        if !status.is_assigned {
            return Err(Error::NotAssigned(election_id));
        }
        if status.has_voted {
            return Err(Error::AlreadyVoted(election_id));
        }

        let candidates = service.candidates(election_id).await?;
        debug!(
            "vote: opened election {} with {} candidates",
            election_id,
            candidates.len()
        );

        Ok(VoteFlow {
            service,
            session,
            election,
            candidates,
            builder: PackageBuilder::default(),
            state: Mutex::new(VoteState::default()),
        })
    }

    /// Replace the package builder, e.g. to plug in another sealer
    pub fn with_builder(mut self, builder: PackageBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn election(&self) -> &ElectionDetail {
        &self.election
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn session(&self) -> &VoterSession {
        &self.session
    }

    pub fn state(&self) -> VoteState {
        self.lock().clone()
    }

    pub fn select(&self, candidate: CandidateId) -> Result<VoteState, TransitionError> {
        self.apply(VoteEvent::Select(candidate))
    }

    /// Move on to the confirmation step with the selected candidate
    pub fn proceed(&self) -> Result<VoteState, TransitionError> {
        self.apply(VoteEvent::Proceed)
    }

    /// Back out of the confirmation step, keeping the selection
    pub fn cancel(&self) -> Result<VoteState, TransitionError> {
        self.apply(VoteEvent::Cancel)
    }

    /// Start over after a failed attempt
    pub fn retry(&self) -> Result<VoteState, TransitionError> {
        self.apply(VoteEvent::Retry)
    }

    /// Cast the confirmed vote.
    ///
    /// Fetches the election keys, builds the package and submits it, in that order and
    /// exactly once. Any failure leaves the flow in `Failed`; nothing is retried.
    pub async fn confirm(&self) -> Result<VoteReceipt> {
        let candidate = {
            let mut state = self.lock();
            let next = state.apply(VoteEvent::Confirm, &self.candidates)?;
            let candidate = match &next {
                VoteState::Submitting { candidate } => candidate.clone(),
                _ => return Err(TransitionError::NotAllowed("confirm", state.name()).into()),
            };
            *state = next;
            candidate
        };

        info!("vote: submitting vote in election {}", self.election.id);
        match self.submit(&candidate).await {
            Ok(receipt) => {
                self.apply(VoteEvent::Completed(receipt.clone()))?;
                info!(
                    "vote: accepted in election {}, vote id {}",
                    self.election.id, receipt.vote_id
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!("vote: election {}: {}", self.election.id, e);
                self.apply(VoteEvent::Aborted(Failure::from(&e)))?;
                Err(e)
            }
        }
    }

    async fn submit(&self, candidate: &Candidate) -> Result<VoteReceipt> {
        let election_id = self.election.id;

        let keys =
            fetch_election_keys_with(self.service, election_id, self.builder.sealer()).await?;
        let package = self
            .builder
            .build(election_id, self.session.voter(), candidate, &keys)?;
        drop(keys);

        debug!("vote: posting package {}", package.unique_id);
        self.service.submit_vote(&package).await
    }

    fn apply(&self, event: VoteEvent) -> Result<VoteState, TransitionError> {
        let mut state = self.lock();
        let event_name = event.name();
        let next = state.apply(event, &self.candidates).map_err(|e| {
            debug!("vote: {} rejected while {}: {}", event_name, state.name(), e);
            e
        })?;
        debug!("vote: {} -> {}", state.name(), next.name());
        *state = next.clone();
        Ok(next)
    }

    fn lock(&self) -> MutexGuard<'_, VoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn receipt() -> VoteReceipt {
        VoteReceipt {
            message: "ok".to_owned(),
            vote_id: 1,
            receipt_code: "abc".to_owned(),
            unique_id: "u".to_owned(),
        }
    }

    fn failure() -> Failure {
        Failure {
            kind: FailureKind::NetworkFailure,
            message: "connection reset".to_owned(),
        }
    }

    fn c1() -> Candidate {
        test_candidates()[0].clone()
    }

    #[test]
    fn test_proceed_without_selection() {
        let state = VoteState::default();
        assert_eq!(
            state.apply(VoteEvent::Proceed, &test_candidates()),
            Err(TransitionError::NoCandidateSelected)
        );
    }

    #[test]
    fn test_select_and_proceed() {
        let candidates = test_candidates();
        let state = VoteState::default()
            .apply(VoteEvent::Select(1), &candidates)
            .unwrap();
        assert_eq!(state.candidate(), Some(&c1()));

        // Changing one's mind before proceeding is fine
        let state = state.apply(VoteEvent::Select(3), &candidates).unwrap();
        assert_eq!(state.candidate().map(|c| c.id), Some(3));

        let state = state.apply(VoteEvent::Proceed, &candidates).unwrap();
        assert_eq!(state.name(), "confirming");
        assert_eq!(state.candidate().map(|c| c.id), Some(3));
    }

    #[test]
    fn test_unknown_candidate() {
        let state = VoteState::default();
        assert_eq!(
            state.apply(VoteEvent::Select(99), &test_candidates()),
            Err(TransitionError::UnknownCandidate(99))
        );
        assert_eq!(
            state.apply(VoteEvent::Select(1), &[]),
            Err(TransitionError::UnknownCandidate(1))
        );
    }

    #[test]
    fn test_cancel_keeps_selection() {
        let state = VoteState::Confirming { candidate: c1() };
        assert_eq!(
            state.apply(VoteEvent::Cancel, &test_candidates()),
            Ok(VoteState::Selecting {
                selected: Some(c1())
            })
        );
    }

    #[test]
    fn test_confirming_rejects_other_events() {
        let candidates = test_candidates();
        let state = VoteState::Confirming { candidate: c1() };
        assert_eq!(
            state.apply(VoteEvent::Select(2), &candidates),
            Err(TransitionError::NotAllowed("select", "confirming"))
        );
        assert!(state.apply(VoteEvent::Proceed, &candidates).is_err());
        assert!(state.apply(VoteEvent::Retry, &candidates).is_err());
        assert!(state
            .apply(VoteEvent::Completed(receipt()), &candidates)
            .is_err());
    }

    #[test]
    fn test_submitting_only_accepts_outcome() {
        let candidates = test_candidates();
        let state = VoteState::Submitting { candidate: c1() };

        for event in [
            VoteEvent::Confirm,
            VoteEvent::Cancel,
            VoteEvent::Proceed,
            VoteEvent::Retry,
            VoteEvent::Select(2),
        ] {
            assert_eq!(
                state.apply(event, &candidates),
                Err(TransitionError::SubmissionInProgress)
            );
        }

        assert!(state
            .apply(VoteEvent::Completed(receipt()), &candidates)
            .unwrap()
            .is_submitted());
        assert_eq!(
            state.apply(VoteEvent::Aborted(failure()), &candidates),
            Ok(VoteState::Failed { failure: failure() })
        );
    }

    #[test]
    fn test_submitted_is_final() {
        let candidates = test_candidates();
        let state = VoteState::Submitted { receipt: receipt() };
        for event in [
            VoteEvent::Select(1),
            VoteEvent::Proceed,
            VoteEvent::Cancel,
            VoteEvent::Confirm,
            VoteEvent::Retry,
        ] {
            assert_eq!(
                state.apply(event, &candidates),
                Err(TransitionError::AlreadySubmitted)
            );
        }
    }

    #[test]
    fn test_failed_returns_to_selecting() {
        let candidates = test_candidates();
        let state = VoteState::Failed { failure: failure() };

        assert_eq!(
            state.apply(VoteEvent::Retry, &candidates),
            Ok(VoteState::Selecting { selected: None })
        );
        assert_eq!(
            state.apply(VoteEvent::Select(2), &candidates).unwrap().candidate(),
            Some(&candidates[1])
        );
        assert_eq!(
            state.apply(VoteEvent::Confirm, &candidates),
            Err(TransitionError::NotAllowed("confirm", "failed"))
        );
        assert!(state.apply(VoteEvent::Proceed, &candidates).is_err());
    }

    #[test]
    fn test_failure_from_error() {
        let failure = Failure::from(&Error::SubmissionRejected(
            "You have already voted in this election.".to_owned(),
        ));
        assert_eq!(failure.kind, FailureKind::SubmissionRejected);
        assert_eq!(failure.message, "You have already voted in this election.");
    }
}
