use crate::*;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("sealvote: election public keys unavailable: {0}")]
    KeyUnavailable(String),

    #[error("sealvote: failed to encrypt {0}")]
    EncryptionFailure(&'static str),

    #[error("{0}")]
    SubmissionRejected(String),

    #[error("sealvote: network failure: {0}")]
    NetworkFailure(String),

    #[error("sealvote: election {0} not found")]
    ElectionNotFound(ElectionId),

    #[error("sealvote: election {0} is not open for voting")]
    ElectionNotOpen(ElectionId),

    #[error("sealvote: you have already voted in election {0}")]
    AlreadyVoted(ElectionId),

    #[error("sealvote: you are not assigned to election {0}")]
    NotAssigned(ElectionId),

    #[error("sealvote: not authenticated: {0}")]
    Unauthorized(String),

    #[error("sealvote: server error {0}: {1}")]
    Server(u16, String),

    #[error("sealvote: invalid key: {0}")]
    InvalidKey(String),

    #[error("sealvote: failed to decrypt message")]
    Decryption,

    #[error("sealvote: malformed encrypted message")]
    MalformedMessage,

    #[error("sealvote: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sealvote: RSA error: {0}")]
    Rsa(#[from] rsa::Error),

    #[error("sealvote: OpenPGP error: {0}")]
    OpenPgp(#[from] pgp::errors::Error),

    #[error("sealvote: {0}")]
    Transition(#[from] TransitionError),
}

impl Error {
    /// Broad failure category, used by the vote flow to record why an attempt failed.
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::KeyUnavailable(_) => FailureKind::KeyUnavailable,
            Error::EncryptionFailure(_)
            | Error::InvalidKey(_)
            | Error::Rsa(_)
            | Error::OpenPgp(_) => FailureKind::EncryptionFailure,
            Error::SubmissionRejected(_)
            | Error::ElectionNotOpen(_)
            | Error::AlreadyVoted(_)
            | Error::NotAssigned(_) => FailureKind::SubmissionRejected,
            Error::NetworkFailure(_) => FailureKind::NetworkFailure,
            _ => FailureKind::Other,
        }
    }
}

/// Why a vote attempt ended in the `Failed` state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    KeyUnavailable,
    EncryptionFailure,
    SubmissionRejected,
    NetworkFailure,
    Other,
}

/// Vote flow transitions that are not allowed from the current state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("please select a candidate")]
    NoCandidateSelected,

    #[error("candidate {0} is not on this ballot")]
    UnknownCandidate(CandidateId),

    #[error("a vote submission is already in progress")]
    SubmissionInProgress,

    #[error("the vote has already been submitted")]
    AlreadySubmitted,

    #[error("cannot {0} while {1}")]
    NotAllowed(&'static str, &'static str),
}
