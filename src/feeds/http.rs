use super::{FeedSource, FetchError, Post};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Talks to the tracking server: `GET /accts` and `GET /tweets/{acct}`.
pub struct HttpFeedSource {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpFeedSource {
    /// `timeout` of `None` keeps reqwest's default, which never times out.
    pub fn new(
        base_url: &str,
        timeout: Option<Duration>,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let mut parsed = Url::parse(base_url).map_err(|e| FetchError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(FetchError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "not a hierarchical url".to_string(),
            });
        }
        // Joining relative paths replaces the last segment unless the base ends in '/'
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }

        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|source| FetchError::Client { source })?;

        Ok(Self {
            base_url: parsed,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        Self::new(
            &config.server.base_url,
            config.request_timeout(),
            &config.server.user_agent,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::InvalidBaseUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let url_text = url.to_string();
        tracing::debug!(url = %url_text, "GET");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url_text.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url_text,
                status: response.status(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url_text.clone(),
                source,
            })?;

        serde_json::from_str(&body).map_err(|source| FetchError::Decode {
            url: url_text,
            source,
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn accounts(&self) -> Result<Vec<String>, FetchError> {
        let url = self.endpoint("accts")?;
        let accounts: Vec<String> = self.get_json(url).await?;
        tracing::debug!(count = accounts.len(), "received account list");
        Ok(accounts)
    }

    async fn posts(&self, account: &str) -> Result<Vec<Post>, FetchError> {
        let url = self.endpoint(&format!("tweets/{}", urlencoding::encode(account)))?;
        let posts: Vec<Post> = self.get_json(url).await?;
        tracing::debug!(account, count = posts.len(), "received posts");
        Ok(posts)
    }
}
