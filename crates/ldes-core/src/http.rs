//! Thin reqwest wrapper shared by the model-serving clients.

use reqwest::{Client, Response};
use std::time::Duration;
use url::Url;

const USER_AGENT: &str = concat!("ldes/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

pub type HttpResult<T> = Result<T, HttpError>;

/// Client bound to one service endpoint.
#[derive(Debug, Clone)]
pub struct EndpointClient {
    inner: Client,
    endpoint: Url,
}

impl EndpointClient {
    pub fn new(endpoint: &str, timeout: Duration) -> HttpResult<Self> {
        let endpoint = Url::parse(endpoint)?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(HttpError::InvalidUrl(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }
        if endpoint.host_str().is_none() {
            return Err(HttpError::InvalidUrl("No host in URL".to_string()));
        }

        let inner = Client::builder()
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { inner, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Resolve `path` against the endpoint, keeping the endpoint's own path.
    pub fn url(&self, path: &str) -> HttpResult<Url> {
        if path.is_empty() {
            return Ok(self.endpoint.clone());
        }
        let mut base = self.endpoint.clone();
        if !base.path().ends_with('/') {
            let with_slash = format!("{}/", base.path());
            base.set_path(&with_slash);
        }
        Ok(base.join(path.trim_start_matches('/'))?)
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> HttpResult<Response> {
        let mut request = self.inner.post(self.url(path)?).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        Ok(request.send().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_endpoints() {
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            EndpointClient::new("not a url", timeout),
            Err(HttpError::UrlParse(_))
        ));
        assert!(matches!(
            EndpointClient::new("ftp://models.local/ner", timeout),
            Err(HttpError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_url_join_keeps_base_path() {
        let client =
            EndpointClient::new("http://localhost:8080/v1", Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.url("chat/completions").unwrap().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(client.url("").unwrap().as_str(), "http://localhost:8080/v1");
    }
}
