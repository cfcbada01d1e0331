//! Thin JSON client shared by the provider backends.

use std::time::Duration;

use dbprov_core::types::ProviderKind;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ProviderError;

/// Per-request timeout for provider management APIs.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client shared by all providers.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("dbprov/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// How requests authenticate against a provider API.
#[derive(Clone)]
pub enum Auth {
    Bearer(String),
    Basic { user: String, password: String },
    /// A literal `Authorization` header value.
    Header(String),
}

/// HTTP client bound to one provider API base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    provider: ProviderKind,
    auth: Auth,
    accept: Option<&'static str>,
}

impl ApiClient {
    pub fn new(
        client: reqwest::Client,
        provider: ProviderKind,
        base_url: impl Into<String>,
        auth: Auth,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            provider,
            auth,
            accept: None,
        }
    }

    /// Send a custom `Accept` header on every request (versioned APIs).
    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let response = self.request(reqwest::Method::GET, path).send().await?;
        self.parse_response(response).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let response = self.request(reqwest::Method::DELETE, path).send().await?;
        self.check_status(response).await
    }

    // ---- private helpers ----

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(provider = %self.provider, %method, %url, "Provider API request");
        let builder = self.client.request(method, url);
        let builder = match &self.auth {
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Basic { user, password } => builder.basic_auth(user, Some(password)),
            Auth::Header(value) => builder.header(reqwest::header::AUTHORIZATION, value),
        };
        match self.accept {
            Some(accept) => builder.header(reqwest::header::ACCEPT, accept),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ProviderError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        &self,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::Api {
                provider: self.provider,
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        let response = self.ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::response(self.provider, e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(&self, response: reqwest::Response) -> Result<(), ProviderError> {
        self.ensure_success(response).await?;
        Ok(())
    }
}
