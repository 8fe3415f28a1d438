pub mod fanout;
pub mod http;
pub mod tally;

pub use fanout::{fetch_all_accounts, fetch_posts_for_account, spawn_fetch_all, FetchOptions};
pub use http::HttpFeedSource;
pub use tally::PostTally;

use async_trait::async_trait;
use thiserror::Error;

/// A single post record. The server decides its shape; it is passed through untouched.
pub type Post = serde_json::Value;

#[derive(Debug, Clone)]
pub struct FeedMessage {
    /// `None` for messages about the whole run rather than one account.
    pub account: Option<String>,
    pub data: FeedData,
}

#[derive(Debug, Clone)]
pub enum FeedData {
    Posts(Vec<Post>),
    Error(String),
    Complete(FetchSummary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub accounts: usize,
    pub loaded: usize,
    pub failed: Vec<String>,
}

impl FetchSummary {
    pub fn settled(&self) -> usize {
        self.loaded + self.failed.len()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("could not build http client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where account lists and per-account posts come from.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn accounts(&self) -> Result<Vec<String>, FetchError>;

    async fn posts(&self, account: &str) -> Result<Vec<Post>, FetchError>;
}
