//! Async HTTP client for application commands.

use std::fmt;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use tokio_util::sync::CancellationToken;

use super::{ApiError, CommandScope};
use crate::config::Config;
use crate::constants;
use crate::schema::{self, Command, Snowflake};

/// Command API client.
///
/// Cloning is cheap; clones share the connection pool. Use
/// [`Client::with_cancel`] to derive a client bound to another scope.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_url: String,
    token: String,
    application_id: Snowflake,
    cancel: CancellationToken,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("api_url", &self.api_url)
            .field("application_id", &self.application_id)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client with the default request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        api_url: impl Into<String>,
        token: impl Into<String>,
        application_id: Snowflake,
    ) -> Result<Self, ApiError> {
        Self::with_timeout(api_url, token, application_id, constants::HTTP_REQUEST_TIMEOUT)
    }

    /// Creates a client with an explicit per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_timeout(
        api_url: impl Into<String>,
        token: impl Into<String>,
        application_id: Snowflake,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_http(http, api_url, token, application_id))
    }

    /// Creates a client around a pre-configured HTTP client.
    pub fn with_http(
        http: reqwest::Client,
        api_url: impl Into<String>,
        token: impl Into<String>,
        application_id: Snowflake,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            application_id,
            cancel: CancellationToken::new(),
        }
    }

    /// Creates a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::with_timeout(
            config.api_url.clone(),
            config.token.clone(),
            config.application_id,
            config.request_timeout(),
        )
    }

    /// A copy of this client whose calls are bound to `cancel`.
    #[must_use]
    pub fn with_cancel(&self, cancel: CancellationToken) -> Self {
        Self {
            cancel,
            ..self.clone()
        }
    }

    /// Token that aborts this client's calls.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Base URL of the API.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Application whose commands this client manages.
    pub fn application_id(&self) -> Snowflake {
        self.application_id
    }

    /// Lists every command in `scope`.
    pub async fn commands(&self, scope: CommandScope) -> Result<Vec<Command>, ApiError> {
        let body = self.execute(self.request(Method::GET, scope, None)).await?;
        Ok(schema::decode_commands(&body)?)
    }

    /// Fetches one command.
    pub async fn command(&self, scope: CommandScope, id: Snowflake) -> Result<Command, ApiError> {
        let body = self.execute(self.request(Method::GET, scope, Some(id))).await?;
        Ok(schema::decode_command(&body)?)
    }

    /// Registers a new command and returns it as stored by the server.
    pub async fn create_command(
        &self,
        scope: CommandScope,
        command: &Command,
    ) -> Result<Command, ApiError> {
        let payload = schema::encode_command(command)?;
        let request = self.request(Method::POST, scope, None);
        let body = self.execute(json(request, payload)).await?;
        log::info!("[Api] Created {scope} command {:?}", command.name);
        Ok(schema::decode_command(&body)?)
    }

    /// Replaces an existing command.
    pub async fn edit_command(
        &self,
        scope: CommandScope,
        id: Snowflake,
        command: &Command,
    ) -> Result<Command, ApiError> {
        let payload = schema::encode_command(command)?;
        let request = self.request(Method::PATCH, scope, Some(id));
        let body = self.execute(json(request, payload)).await?;
        Ok(schema::decode_command(&body)?)
    }

    /// Deletes a command.
    pub async fn delete_command(&self, scope: CommandScope, id: Snowflake) -> Result<(), ApiError> {
        self.execute(self.request(Method::DELETE, scope, Some(id))).await?;
        log::info!("[Api] Deleted {scope} command {id}");
        Ok(())
    }

    /// Replaces the whole command list of `scope` in one call.
    pub async fn overwrite_commands(
        &self,
        scope: CommandScope,
        commands: &[Command],
    ) -> Result<Vec<Command>, ApiError> {
        let payload = schema::encode_commands(commands)?;
        let request = self.request(Method::PUT, scope, None);
        let body = self.execute(json(request, payload)).await?;
        Ok(schema::decode_commands(&body)?)
    }

    fn request(&self, method: Method, scope: CommandScope, id: Option<Snowflake>) -> RequestBuilder {
        let mut url = format!("{}{}", self.api_url, scope.path(self.application_id));
        if let Some(id) = id {
            url.push('/');
            url.push_str(&id.to_string());
        }
        log::debug!("[Api] {method} {url}");
        self.http
            .request(method, url)
            .header(AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(ApiError::Cancelled),
            body = response.bytes() => body?,
        };

        if !status.is_success() {
            log::warn!("[Api] Request failed with {status}");
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body.to_vec())
    }
}

fn json(request: RequestBuilder, payload: Vec<u8>) -> RequestBuilder {
    request.header(CONTENT_TYPE, "application/json").body(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let client = Client::new("https://api.example", "secret-token", Snowflake(1)).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = Client::new("https://api.example/v10/", "t", Snowflake(1)).unwrap();
        assert_eq!(client.api_url(), "https://api.example/v10");
    }

    #[tokio::test]
    async fn test_cancelled_client_fails_fast() {
        let client = Client::new("http://127.0.0.1:1", "t", Snowflake(1)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let scoped = client.with_cancel(cancel);
        let result = scoped.commands(CommandScope::Global).await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
        assert!(!client.cancel_token().is_cancelled());
    }
}
