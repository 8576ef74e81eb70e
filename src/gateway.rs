//! Authenticated HTTP gateway to the monitoring API
//!
//! Every outbound call goes through [`Gateway::call`], which attaches the bearer
//! credential, refreshes it once when the server rejects it, retries the original
//! request once, and ends the session when that is not enough.

use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::errors::{Result, SyncError};
use crate::models::{RefreshRequest, RefreshResponse};
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

const REFRESH_PATH: &str = "/api/token/refresh/";

/// A request relative to the API base URL
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn post<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::POST, path).with_json(body)
    }

    pub fn patch<B: Serialize>(path: impl Into<String>, body: &B) -> Result<Self> {
        Self::new(Method::PATCH, path).with_json(body)
    }

    pub fn with_json<B: Serialize>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// Any answer in the 200–599 range. Interpreting the status is up to the caller.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Session lifecycle signals for the UI layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// Credentials are gone; the user has to log in again
    Ended,
}

/// Progress of a single call through the refresh-then-retry flow.
///
/// `Retrying` can only lead to `Authenticated` or `Expired`, so one call never
/// refreshes or retries more than once. `rejected` is the access credential the
/// server turned down, if one was sent.
#[derive(Debug)]
enum CallState {
    Initial,
    Unauthenticated { rejected: Option<String> },
    Refreshing { rejected: Option<String> },
    Retrying,
    Authenticated(ApiResponse),
    Expired,
}

enum Attempt {
    Response(ApiResponse),
    Rejected(Option<String>),
}

enum RefreshOutcome {
    Refreshed,
    Rejected(String),
}

#[derive(Debug, Clone)]
pub struct Gateway {
    client: Client,
    config: Config,
    credentials: Arc<CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
    /// Serializes refreshes across clones so concurrent rejections share one
    refresh_lock: Arc<Mutex<()>>,
}

impl Gateway {
    pub fn new(config: Config, credentials: Arc<CredentialStore>) -> Result<Self> {
        config.validate().map_err(SyncError::Config)?;

        let client = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(SyncError::Http)?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            client,
            config,
            credentials,
            events,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Receive [`SessionEvent`]s emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Send a request, refreshing the access credential and retrying once if the
    /// server rejects it.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn call(&self, request: ApiRequest, auth_required: bool) -> Result<ApiResponse> {
        if auth_required && !self.credentials.is_active().await {
            debug!("No session credentials, not sending");
            return Err(SyncError::Unauthenticated);
        }

        let mut state = CallState::Initial;

        loop {
            state = match state {
                CallState::Initial => match self.attempt(&request, auth_required).await? {
                    Attempt::Response(response) => CallState::Authenticated(response),
                    Attempt::Rejected(rejected) => CallState::Unauthenticated { rejected },
                },
                CallState::Unauthenticated { rejected } => {
                    debug!("Access credential rejected or missing, refreshing");
                    CallState::Refreshing { rejected }
                }
                CallState::Refreshing { rejected } => {
                    match self.refresh_access(rejected.as_deref()).await? {
                        RefreshOutcome::Refreshed => CallState::Retrying,
                        RefreshOutcome::Rejected(_) => CallState::Expired,
                    }
                }
                CallState::Retrying => match self.attempt(&request, auth_required).await? {
                    Attempt::Response(response) => CallState::Authenticated(response),
                    Attempt::Rejected(_) => {
                        warn!("Request still unauthorized after refresh");
                        CallState::Expired
                    }
                },
                CallState::Authenticated(response) => return Ok(response),
                CallState::Expired => {
                    self.end_session().await;
                    return Err(SyncError::SessionExpired);
                }
            };
        }
    }

    /// Send once with whatever access credential is held.
    ///
    /// A rejection is returned as a plain response: no refresh, no retry, and the
    /// session is left alone. Meant for best-effort calls such as logout.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn call_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut builder = self.request_builder(request);
        if let Some(access) = self.credentials.access().await {
            builder = builder.bearer_auth(access);
        }

        let response = self.send(builder).await?;
        debug!("{} {} -> {}", request.method, request.path, response.status);
        Ok(response)
    }

    fn request_builder(&self, request: &ApiRequest) -> reqwest::RequestBuilder {
        let url = self.config.endpoint(&request.path);
        let builder = self.client.request(request.method.clone(), &url);
        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Single send. Authorization failures are reported as `Rejected`, never as errors.
    async fn attempt(&self, request: &ApiRequest, auth_required: bool) -> Result<Attempt> {
        let mut builder = self.request_builder(request);

        let mut sent_access = None;
        if auth_required {
            match self.credentials.access().await {
                Some(access) => {
                    builder = builder.bearer_auth(&access);
                    sent_access = Some(access);
                }
                None => {
                    debug!("No access credential for {}, not sending", request.path);
                    return Ok(Attempt::Rejected(None));
                }
            }
        }

        let response = self.send(builder).await?;

        if auth_required && is_auth_failure(response.status) {
            debug!("{} {} rejected with {}", request.method, request.path, response.status);
            return Ok(Attempt::Rejected(sent_access));
        }

        debug!("{} {} -> {}", request.method, request.path, response.status);
        Ok(Attempt::Response(response))
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<ApiResponse> {
        let response = timeout(self.config.http_timeout, builder.send())
            .await
            .map_err(|_| SyncError::Transport("Request timeout".to_string()))?
            .map_err(|e| SyncError::Transport(e.to_string()))?;

        let status = response.status();
        if !(200..600).contains(&status.as_u16()) {
            return Err(SyncError::Transport(format!("Unexpected response status {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Transport(format!("Failed to read response body: {}", e)))?;

        Ok(ApiResponse { status, body })
    }

    /// Replace the `rejected` access credential, at most one refresh in flight.
    ///
    /// A caller that waited on another refresh reuses its result instead of
    /// posting again. A rejected refresh ends the session before the lock is
    /// released, so waiters find no refresh credential and post nothing.
    async fn refresh_access(&self, rejected: Option<&str>) -> Result<RefreshOutcome> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.credentials.access().await;
        if current.is_some() && current.as_deref() != rejected {
            debug!("Access credential already replaced by a concurrent refresh");
            return Ok(RefreshOutcome::Refreshed);
        }

        let outcome = self.request_access().await?;
        if let RefreshOutcome::Rejected(reason) = &outcome {
            warn!("Credential refresh failed: {}", reason);
            self.end_session().await;
        }
        Ok(outcome)
    }

    /// Trade the refresh credential for a new access credential.
    ///
    /// Transport failures are returned as errors and leave the session alone; any
    /// answer other than a usable token counts as a rejected refresh.
    async fn request_access(&self) -> Result<RefreshOutcome> {
        let Some(refresh) = self.credentials.refresh().await else {
            return Ok(RefreshOutcome::Rejected("no refresh credential".to_string()));
        };

        let url = self.config.endpoint(REFRESH_PATH);
        let builder = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh: &refresh });

        let response = self.send(builder).await?;

        if !response.is_success() {
            return Ok(RefreshOutcome::Rejected(format!(
                "refresh endpoint returned {}",
                response.status
            )));
        }

        let token: RefreshResponse = match response.json() {
            Ok(token) => token,
            Err(e) => return Ok(RefreshOutcome::Rejected(e.to_string())),
        };

        // The session may have been cleared while the refresh was in flight.
        if let Err(e) = self.credentials.set(Some(token.access), None).await {
            return Ok(RefreshOutcome::Rejected(e.to_string()));
        }

        info!("Access credential refreshed");
        Ok(RefreshOutcome::Refreshed)
    }

    /// Clear credentials; only the call that actually ends the session emits the event.
    async fn end_session(&self) {
        if !self.credentials.clear().await {
            debug!("Session already ended");
            return;
        }
        error!("Session ended, credentials cleared");
        // No subscribers is fine; the error returned to the caller carries the same news.
        let _ = self.events.send(SessionEvent::Ended);
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
