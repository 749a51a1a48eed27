//! Client for the external login service used in delegated mode.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use thiserror::Error;
use url::Url;

use crate::config::DelegatedAuthConfig;

/// Query parameter carrying the share id on login and validate URLs.
pub const SHARE_ID_PARAM: &str = "shareId";

/// Failures of the delegated authorization flow.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid auth endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("authorize request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("authorize endpoint answered {0}")]
    Status(u16),

    #[error("authorize endpoint returned an empty grant")]
    EmptyGrant,
}

/// Endpoints and HTTP client for delegated authentication.
#[derive(Debug, Clone)]
pub struct DelegatedAuth {
    base_url: String,
    login_path: String,
    validate_path: String,
    authorize_url: Url,
    bearer_secret: String,
    client: reqwest::Client,
}

impl DelegatedAuth {
    pub fn new(config: &DelegatedAuthConfig, timeout: Duration) -> Result<Self, AuthError> {
        let authorize_url = Url::parse(&format!("{}{}", config.base_url, config.authorize_path))?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: config.base_url.clone(),
            login_path: config.login_path.clone(),
            validate_path: config.validate_path.clone(),
            authorize_url,
            bearer_secret: config.bearer_secret.clone(),
            client,
        })
    }

    /// Page the human opens in a browser to log in.
    pub fn login_url(&self, share_id: &str) -> Result<Url, AuthError> {
        self.share_url(&self.login_path, share_id)
    }

    /// Endpoint the tunnel client polls for its login token.
    pub fn validate_url(&self, share_id: &str) -> Result<Url, AuthError> {
        self.share_url(&self.validate_path, share_id)
    }

    fn share_url(&self, suffix: &str, share_id: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, suffix))?;
        url.query_pairs_mut().append_pair(SHARE_ID_PARAM, share_id);
        Ok(url)
    }

    /// Ask the login service whether `token` grants access.
    ///
    /// Only a 2xx answer with a non-empty body authorizes; the body is
    /// returned but not interpreted.
    pub async fn authorize(&self, token: &str) -> Result<String, AuthError> {
        let response = self
            .client
            .post(self.authorize_url.clone())
            .header(AUTHORIZATION, format!("Bearer {}", self.bearer_secret))
            .header(CONTENT_TYPE, "text/plain")
            .body(token.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Status(status.as_u16()));
        }

        let grant = response.text().await?;
        if grant.is_empty() {
            return Err(AuthError::EmptyGrant);
        }
        Ok(grant)
    }
}
