use crate::*;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// `ElectionService` over the election server's REST API
pub struct RestClient {
    base_uri: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl RestClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::NetworkFailure(e.to_string()))?;

        Ok(RestClient {
            base_uri: config.uri.trim_end_matches('/').to_owned(),
            token: config.token.clone(),
            client,
        })
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    /// Exchange credentials for an access token.
    ///
    /// The token is remembered by this client; persisting it is up to the caller.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResponse> {
        let body = serde_json::json!({ "username": username, "password": password });
        let resp = self
            .request(Method::POST, "/auth/login/")
            .json(&body)
            .send()
            .await
            .map_err(network_failure)?;

        let login: LoginResponse = match resp.status() {
            status if status.is_success() => json_body(resp).await?,
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                return Err(Error::Unauthorized(error_message(resp).await))
            }
            _ => return Err(server_error(resp).await),
        };

        self.token = Some(login.token.clone());
        Ok(login)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_uri, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let full_url = self.url(path);
        debug!("{} {}", method, full_url);

        let req = self.client.request(method, &full_url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self
            .request(Method::GET, path)
            .send()
            .await
            .map_err(network_failure)?;

        if !resp.status().is_success() {
            return Err(server_error(resp).await);
        }
        json_body(resp).await
    }
}

#[async_trait]
impl ElectionService for RestClient {
    async fn public_keys(&self, election: ElectionId) -> Result<PublicKeysResponse> {
        self.get(&format!("/elections/{}/public_keys/", election))
            .await
            .map_err(|e| match e {
                Error::NetworkFailure(e) => Error::NetworkFailure(e),
                e => Error::KeyUnavailable(e.to_string()),
            })
    }

    async fn election(&self, election: ElectionId) -> Result<ElectionDetail> {
        self.get(&format!("/elections/{}/", election))
            .await
            .map_err(|e| match e {
                Error::Server(404, _) => Error::ElectionNotFound(election),
                e => e,
            })
    }

    async fn candidates(&self, election: ElectionId) -> Result<Vec<Candidate>> {
        let list: CandidateList = self
            .get(&format!("/candidates/election/{}/", election))
            .await?;
        Ok(list.into_vec())
    }

    async fn submit_vote(&self, package: &EncryptedVotePackage) -> Result<VoteReceipt> {
        let resp = self
            .request(Method::POST, "/votes/submit/")
            .json(package)
            .send()
            .await
            .map_err(network_failure)?;

        let status = resp.status();
        if status.is_success() {
            return json_body(resp).await;
        }

        let message = error_message(resp).await;
        warn!("vote: submission failed with status {}", status.as_u16());
        Err(submit_error(status, message))
    }

    async fn voter_status(&self, election: ElectionId) -> Result<VoterStatus> {
        self.get(&format!("/votes/my-vote/?election_id={}", election))
            .await
    }

    async fn verify_receipt(&self, code: &str) -> Result<ReceiptCheck> {
        let resp = self
            .request(Method::GET, "/votes/receipt/")
            .query(&[("code", code)])
            .send()
            .await
            .map_err(network_failure)?;

        match resp.status() {
            status if status.is_success() => json_body(resp).await,
            // Unknown codes come back as 404 with the same body shape
            StatusCode::NOT_FOUND => json_body(resp).await,
            _ => Err(server_error(resp).await),
        }
    }

    async fn current_user(&self) -> Result<Voter> {
        self.get("/auth/me/").await
    }
}

/// The candidate endpoint returns either a bare list or a paginated page
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateList {
    Bare(Vec<Candidate>),
    Page { results: Vec<Candidate> },
}

impl CandidateList {
    fn into_vec(self) -> Vec<Candidate> {
        match self {
            CandidateList::Bare(list) => list,
            CandidateList::Page { results } => results,
        }
    }
}

fn network_failure(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::NetworkFailure(format!("request timed out: {}", e))
    } else {
        Error::NetworkFailure(e.to_string())
    }
}

async fn json_body<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let body = resp.text().await.map_err(network_failure)?;
    Ok(serde_json::from_str(&body)?)
}

async fn server_error(resp: Response) -> Error {
    let status = resp.status();
    let message = error_message(resp).await;
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Unauthorized(message),
        _ => Error::Server(status.as_u16(), message),
    }
}

/// A failed submission: 4xx is the server refusing the vote, 5xx means it never got
/// a decision and the voter may try again.
fn submit_error(status: StatusCode, message: String) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => Error::Unauthorized(message),
        s if s.is_server_error() => {
            Error::NetworkFailure(format!("server error {}: {}", s.as_u16(), message))
        }
        _ => Error::SubmissionRejected(message),
    }
}

async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    parse_error_body(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned()
    })
}

/// Pull the human-readable message out of an error body.
///
/// Looks at `detail`, then `error`, then `message`, then the first field error of a
/// validation response. A non-JSON body is returned as is.
fn parse_error_body(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Some(body.to_owned()),
    };

    let obj = value.as_object()?;
    for key in ["detail", "error", "message"] {
        if let Some(Value::String(msg)) = obj.get(key) {
            return Some(msg.clone());
        }
    }

    obj.values().find_map(|v| match v {
        Value::String(msg) => Some(msg.clone()),
        Value::Array(list) => list.iter().find_map(|m| m.as_str().map(str::to_owned)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_url_building() {
        let config = Config {
            uri: "https://vote.example.org/api/".to_owned(),
            token: Some("abc".to_owned()),
            timeout: Duration::from_secs(2),
        };
        let client = RestClient::new(&config).unwrap();
        assert_eq!(client.base_uri(), "https://vote.example.org/api");
        assert_eq!(
            client.url("/elections/3/public_keys/"),
            "https://vote.example.org/api/elections/3/public_keys/"
        );
    }

    #[test]
    fn test_error_body_parsing() {
        assert_eq!(
            parse_error_body(r#"{"error": "You have already voted in this election."}"#),
            Some("You have already voted in this election.".to_owned())
        );
        assert_eq!(
            parse_error_body(r#"{"detail": "Not found.", "error": "ignored"}"#),
            Some("Not found.".to_owned())
        );
        assert_eq!(
            parse_error_body(r#"{"unique_id": ["This unique ID already exists."]}"#),
            Some("This unique ID already exists.".to_owned())
        );
        assert_eq!(
            parse_error_body("Bad Gateway"),
            Some("Bad Gateway".to_owned())
        );
        assert_eq!(parse_error_body("  "), None);
        assert_eq!(parse_error_body("[]"), None);
    }

    #[test]
    fn test_candidate_list_shapes() {
        let bare: CandidateList =
            serde_json::from_str(r#"[{"id": 1, "name": "C1"}, {"id": 2, "name": "C2"}]"#)
                .unwrap();
        assert_eq!(bare.into_vec().len(), 2);

        let page: CandidateList = serde_json::from_str(
            r#"{"count": 1, "next": null, "results": [{"id": 7, "name": "C7"}]}"#,
        )
        .unwrap();
        let page = page.into_vec();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, 7);

        let empty: CandidateList = serde_json::from_str("[]").unwrap();
        assert!(empty.into_vec().is_empty());
    }

    #[test]
    fn test_submit_status_mapping() {
        let rejected = submit_error(
            StatusCode::BAD_REQUEST,
            "You have already voted in this election.".to_owned(),
        );
        assert_eq!(rejected.kind(), FailureKind::SubmissionRejected);
        assert_eq!(
            rejected.to_string(),
            "You have already voted in this election."
        );

        assert!(matches!(
            submit_error(StatusCode::UNAUTHORIZED, "expired".to_owned()),
            Error::Unauthorized(_)
        ));

        for status in [
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = submit_error(status, "Internal Server Error".to_owned());
            assert_eq!(err.kind(), FailureKind::NetworkFailure);
            assert!(err.to_string().contains(&status.as_u16().to_string()));
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        let config = Config {
            uri: "http://127.0.0.1:9".to_owned(),
            token: None,
            timeout: Duration::from_secs(2),
        };
        let client = RestClient::new(&config).unwrap();
        assert!(matches!(
            client.election(1).await,
            Err(Error::NetworkFailure(_))
        ));
        assert!(matches!(
            client.public_keys(1).await,
            Err(Error::NetworkFailure(_))
        ));
    }
}
