use log::warn;
use std::env::var;
use std::time::Duration;

pub const DEFAULT_URI: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the election service lives and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URI of the REST API, without a trailing slash
    pub uri: String,

    /// Bearer token of the logged-in voter
    pub token: Option<String>,

    /// Applies to every request, including vote submission
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            uri: DEFAULT_URI.to_owned(),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Read `SEALVOTE_URI`, `SEALVOTE_TOKEN` and `SEALVOTE_TIMEOUT_SECS`
    pub fn from_env() -> Self {
        Self::from_vars(|name| var(name).ok())
    }

    fn from_vars<F: Fn(&str) -> Option<String>>(get: F) -> Self {
        let uri = match get("SEALVOTE_URI") {
            Some(val) => val,
            None => DEFAULT_URI.to_owned(),
        };

        let token = get("SEALVOTE_TOKEN").filter(|t| !t.trim().is_empty());

        let timeout = match get("SEALVOTE_TIMEOUT_SECS") {
            Some(val) => match val.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        "SEALVOTE_TIMEOUT_SECS={} is not a positive integer, using {}",
                        val, DEFAULT_TIMEOUT_SECS
                    );
                    Duration::from_secs(DEFAULT_TIMEOUT_SECS)
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        Config {
            uri: uri.trim_end_matches('/').to_owned(),
            token,
            timeout,
        }
    }
}
