use crate::*;

/// A registered user, as returned by the authentication endpoints
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Voter {
    pub id: VoterId,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl Voter {
    /// "First Last" when both names are known, otherwise the username
    pub fn display_name(&self) -> String {
        match (non_empty(&self.first_name), non_empty(&self.last_name)) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            _ => self.username.clone(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// The voter on whose behalf a vote flow runs.
///
/// Passed explicitly into the flow so that package construction only depends on its inputs.
#[derive(Debug, Clone)]
pub struct VoterSession {
    voter: Voter,
}

impl VoterSession {
    pub fn new(voter: Voter) -> Self {
        VoterSession { voter }
    }

    /// Build a session for whoever the service says is logged in
    pub async fn current<S: ElectionService + ?Sized>(service: &S) -> Result<Self> {
        let voter = service.current_user().await?;
        Ok(VoterSession::new(voter))
    }

    pub fn voter(&self) -> &Voter {
        &self.voter
    }
}
