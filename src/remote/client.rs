use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, USER_AGENT};
use tracing::debug;
use url::Url;

use super::{FetchError, PostDto, RemotePage, RemoteSource};
use crate::config::Config;
use crate::constants::USER_AGENT as FEEDSYNC_USER_AGENT;

/// Header carrying the corpus size on paginated responses.
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// [`RemoteSource`] backed by the HTTP posts endpoint.
#[derive(Debug, Clone)]
pub struct HttpPostSource {
    client: reqwest::Client,
    posts_url: Url,
}

impl HttpPostSource {
    /// Build a source from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the base URL is invalid.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Self::with_client(client, &config.api_base_url)
    }

    /// Build a source around an existing client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self> {
        let mut base = base_url.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let posts_url = Url::parse(&base)
            .and_then(|u| u.join("posts"))
            .with_context(|| format!("Invalid API base URL: {base_url}"))?;
        Ok(Self { client, posts_url })
    }

    async fn get_posts(&self, query: &[(&str, usize)]) -> Result<(Vec<PostDto>, HeaderMap), FetchError> {
        let response = self
            .client
            .get(self.posts_url.clone())
            .query(query)
            .header(USER_AGENT, FEEDSYNC_USER_AGENT)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown status").to_string(),
            });
        }

        let headers = response.headers().clone();
        let posts = response
            .json::<Vec<PostDto>>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;
        Ok((posts, headers))
    }
}

fn parse_total(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(TOTAL_COUNT_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl RemoteSource for HttpPostSource {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<RemotePage, FetchError> {
        debug!(offset, limit, "Fetching remote page");
        let (items, headers) = self.get_posts(&[("_start", offset), ("_limit", limit)]).await?;
        Ok(RemotePage {
            items,
            total: parse_total(&headers),
        })
    }

    async fn fetch_all(&self) -> Result<Vec<PostDto>, FetchError> {
        debug!("Fetching full remote corpus");
        let (items, _) = self.get_posts(&[]).await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_posts_url_with_and_without_trailing_slash() {
        let client = reqwest::Client::new();
        let a = HttpPostSource::with_client(client.clone(), "https://api.example.com/v1/").unwrap();
        let b = HttpPostSource::with_client(client, "https://api.example.com/v1").unwrap();
        assert_eq!(a.posts_url.as_str(), "https://api.example.com/v1/posts");
        assert_eq!(a.posts_url, b.posts_url);
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpPostSource::with_client(reqwest::Client::new(), "::nope").is_err());
    }

    #[test]
    fn test_parse_total() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_total(&headers), None);
        headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from_static("100"));
        assert_eq!(parse_total(&headers), Some(100));
        headers.insert(TOTAL_COUNT_HEADER, HeaderValue::from_static("many"));
        assert_eq!(parse_total(&headers), None);
    }
}
