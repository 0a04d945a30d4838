use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::models::{Fetched, JobsResponse};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to job board failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("job board returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("unexpected response from job board: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can answer a search against the upstream board. Filtering
/// by term and category is the source's job; callers never filter locally.
pub trait ListingSource: Send + Sync {
    fn search(&self, term: &str, category: Option<&str>) -> Result<Fetched, FetchError>;
}

pub struct RemotiveClient {
    api_url: String,
    client: reqwest::blocking::Client,
}

impl RemotiveClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_url: config.api_url.clone(),
            client,
        })
    }
}

impl ListingSource for RemotiveClient {
    fn search(&self, term: &str, category: Option<&str>) -> Result<Fetched, FetchError> {
        let params = query_params(term, category);
        info!(url = %self.api_url, ?params, "fetching listings");

        let response = self.client.get(&self.api_url).query(&params).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: snippet(&body, 200),
            });
        }

        let body = response.text()?;
        let decoded: JobsResponse = serde_json::from_str(&body)?;
        let fetched = Fetched::from(decoded);

        debug!(
            kept = fetched.listings.len(),
            rejected = fetched.rejected,
            "decoded listings"
        );
        Ok(fetched)
    }
}

/// Query string pairs for a search. Empty values are left out so an empty
/// search asks for the unfiltered board.
pub fn query_params<'a>(term: &'a str, category: Option<&'a str>) -> Vec<(&'static str, &'a str)> {
    let mut params = Vec::new();
    let term = term.trim();
    if !term.is_empty() {
        params.push(("search", term));
    }
    if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
        params.push(("category", category));
    }
    params
}

fn snippet(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_omit_empty_values() {
        assert!(query_params("", None).is_empty());
        assert!(query_params("   ", Some("")).is_empty());
        assert_eq!(query_params("rust", None), vec![("search", "rust")]);
        assert_eq!(
            query_params(" rust ", Some("Software Development")),
            vec![("search", "rust"), ("category", "Software Development")]
        );
        assert_eq!(query_params("", Some("Data")), vec![("category", "Data")]);
    }

    #[test]
    fn test_snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("  short  ", 10), "short");
        assert_eq!(snippet("héllo wörld", 5), "héllo...");
    }

    #[test]
    fn test_decode_error_is_distinct() {
        let err: FetchError = serde_json::from_str::<JobsResponse>("<html>")
            .unwrap_err()
            .into();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(err.to_string().starts_with("unexpected response"));
    }

    #[test]
    fn test_status_error_message() {
        let err = FetchError::Status {
            status: 503,
            body: "maintenance".to_string(),
        };
        assert_eq!(err.to_string(), "job board returned status 503: maintenance");
    }

    #[test]
    fn test_client_builds_from_default_config() {
        let client = RemotiveClient::new(&Config::default()).unwrap();
        assert_eq!(client.api_url, Config::default().api_url);
    }

    #[test]
    #[ignore] // Hits the live job board
    fn test_live_search() {
        let client = RemotiveClient::new(&Config::default()).expect("client");
        let fetched = client.search("rust", None).expect("search");
        assert!(fetched.listings.iter().all(|l| !l.url.is_empty()));
    }
}
