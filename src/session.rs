//! Authenticated session and its in-memory working set

use crate::analytics::{self, DerivedAnalytics};
use crate::chart::{self, TrendPoint};
use crate::config::Config;
use crate::credentials::CredentialStore;
use crate::errors::{Result, SyncError};
use crate::fetcher::{FetchReport, StatusFetcher};
use crate::gateway::{ApiRequest, ApiResponse, Gateway, SessionEvent};
use crate::history::HistoryStore;
use crate::models::{
    AckResponse, LoginRequest, LoginResponse, LogoutRequest, MonitoredService, ServiceDraft,
    ServiceId, ServiceListResponse, ServiceResponse, StatusRecord, UserProfile, UserResponse,
    error_message,
};
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// One logged-in user's view of their monitored services.
///
/// Owns the credential store for its whole lifetime; `logout` tears the
/// working set down again.
pub struct Session {
    id: Uuid,
    config: Config,
    gateway: Gateway,
    fetcher: StatusFetcher,
    services: RwLock<Vec<MonitoredService>>,
}

impl Session {
    /// Start a session with no credentials; call [`login`](Self::login) next
    pub fn new(config: Config) -> Result<Self> {
        Self::with_store(config, CredentialStore::new())
    }

    /// Start a session from previously issued credentials.
    ///
    /// With only a refresh credential the first call refreshes before sending.
    pub fn resume(config: Config, access: Option<String>, refresh: String) -> Result<Self> {
        Self::with_store(config, CredentialStore::with_credentials(access, Some(refresh))?)
    }

    fn with_store(config: Config, store: CredentialStore) -> Result<Self> {
        let gateway = Gateway::new(config.clone(), Arc::new(store))?;
        let fetcher = StatusFetcher::new(Arc::new(gateway.clone()), HistoryStore::new());
        let id = Uuid::new_v4();

        info!("Session {} started against {}", id, config.api_base_url);

        Ok(Self {
            id,
            config,
            gateway,
            fetcher,
            services: RwLock::new(Vec::new()),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        self.gateway.credentials()
    }

    pub fn history(&self) -> &HistoryStore {
        self.fetcher.history()
    }

    /// Session lifecycle events, most importantly [`SessionEvent::Ended`]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.gateway.subscribe()
    }

    pub async fn is_active(&self) -> bool {
        self.credentials().is_active().await
    }

    #[instrument(skip(self, password), fields(session = %self.id))]
    pub async fn login(&self, email: &str, password: &str) -> Result<()> {
        let request = ApiRequest::post("/api/auth/login/", &LoginRequest { email, password })?;
        let response = self.gateway.call(request, false).await?;
        let body: LoginResponse = parse_body(&response)?;

        match body.token {
            Some(token) if body.success => {
                self.credentials()
                    .set(Some(token.access), Some(token.refresh))
                    .await?;
                info!("Logged in as {}", email);
                Ok(())
            }
            _ => Err(SyncError::Service {
                status: response.status.as_u16(),
                message: error_message(body.error.as_ref(), "Login failed. Please try again."),
            }),
        }
    }

    /// Tell the server to revoke the refresh credential, then drop everything local.
    ///
    /// The server call is sent once as-is; a stale credential is not refreshed
    /// just to log out.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn logout(&self) {
        let refresh = self.credentials().refresh().await;
        let request = ApiRequest::post(
            "/api/auth/logout/",
            &LogoutRequest {
                refresh_token: refresh.as_deref(),
            },
        );

        match request {
            Ok(request) => match self.gateway.call_once(&request).await {
                Ok(response) if !response.is_success() => {
                    debug!("Server logout answered {}", response.status)
                }
                Ok(_) => {}
                Err(e) => warn!("Logout request failed: {}", e),
            },
            Err(e) => warn!("Could not build logout request: {}", e),
        }

        self.credentials().clear().await;
        self.services.write().await.clear();
        self.history().clear().await;
        info!("Logged out");
    }

    pub async fn current_user(&self) -> Result<UserProfile> {
        let response = self.gateway.call(ApiRequest::get("/api/auth/user/"), true).await?;
        if !response.is_success() {
            return Err(service_error(&response, "Failed to load user data"));
        }
        let body: UserResponse = response.json()?;
        Ok(body.user)
    }

    pub async fn services(&self) -> Vec<MonitoredService> {
        self.services.read().await.clone()
    }

    pub async fn service(&self, service_id: ServiceId) -> Option<MonitoredService> {
        self.services
            .read()
            .await
            .iter()
            .find(|s| s.id == service_id)
            .cloned()
    }

    /// Load the service list and then every service's history.
    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn load_services(&self) -> Result<FetchReport> {
        let services = self.list_services().await?;
        Ok(self.fetcher.fetch_all(&services).await)
    }

    /// Load only the service list; histories are left to [`refresh`](Self::refresh).
    pub async fn list_services(&self) -> Result<Vec<MonitoredService>> {
        let response = self
            .gateway
            .call(ApiRequest::get("/api/webservice/all/"), true)
            .await?;
        let body: ServiceListResponse = parse_body(&response)?;
        if !body.success {
            return Err(SyncError::Service {
                status: response.status.as_u16(),
                message: error_message(body.error.as_ref(), "Failed to load web services"),
            });
        }

        info!("Loaded {} services", body.webservices.len());
        *self.services.write().await = body.webservices.clone();

        Ok(body.webservices)
    }

    /// Refetch history for one service, or for all of them.
    pub async fn refresh(&self, service_id: Option<ServiceId>) -> FetchReport {
        match service_id {
            Some(id) => match self.service(id).await {
                Some(service) => self.fetcher.fetch_one(&service).await,
                None => {
                    warn!("Refresh requested for unknown service {}", id);
                    FetchReport::default()
                }
            },
            None => {
                let services = self.services().await;
                self.fetcher.fetch_all(&services).await
            }
        }
    }

    #[instrument(skip(self, draft), fields(session = %self.id, name = %draft.name))]
    pub async fn add_service(&self, draft: &ServiceDraft) -> Result<MonitoredService> {
        let request = ApiRequest::post("/api/webservice/add/", draft)?;
        let service = self.service_call(request, "Failed to add web service").await?;

        self.services.write().await.push(service.clone());
        self.history().replace(service.id, Vec::new()).await;
        info!("Added service {}", service.id);

        Ok(service)
    }

    #[instrument(skip(self, draft), fields(session = %self.id))]
    pub async fn update_service(
        &self,
        service_id: ServiceId,
        draft: &ServiceDraft,
    ) -> Result<MonitoredService> {
        let path = format!("/api/webservice/{}/update/", service_id);
        let request = ApiRequest::patch(path, draft)?;
        let service = self.service_call(request, "Failed to update web service").await?;

        let mut services = self.services.write().await;
        match services.iter_mut().find(|s| s.id == service_id) {
            Some(existing) => *existing = service.clone(),
            None => services.push(service.clone()),
        }
        info!("Updated service {}", service_id);

        Ok(service)
    }

    #[instrument(skip(self), fields(session = %self.id))]
    pub async fn delete_service(&self, service_id: ServiceId) -> Result<()> {
        let path = format!("/api/webservice/{}/delete/", service_id);
        let response = self.gateway.call(ApiRequest::delete(path), true).await?;
        let body: AckResponse = parse_body(&response)?;
        if !body.success {
            return Err(SyncError::Service {
                status: response.status.as_u16(),
                message: error_message(body.error.as_ref(), "Failed to delete web service"),
            });
        }

        self.services.write().await.retain(|s| s.id != service_id);
        self.history().remove(service_id).await;
        info!("Deleted service {}", service_id);

        Ok(())
    }

    async fn service_call(&self, request: ApiRequest, fallback: &str) -> Result<MonitoredService> {
        let response = self.gateway.call(request, true).await?;
        let body: ServiceResponse = parse_body(&response)?;

        match body.webservice {
            Some(service) if body.success => Ok(service),
            _ => Err(SyncError::Service {
                status: response.status.as_u16(),
                message: error_message(body.error.as_ref(), fallback),
            }),
        }
    }

    /// Records currently held for a service; `None` if never fetched
    pub async fn records(&self, service_id: ServiceId) -> Option<Vec<StatusRecord>> {
        self.history().get(service_id).await
    }

    pub async fn analytics(&self, service_id: ServiceId) -> Option<DerivedAnalytics> {
        let records = self.records(service_id).await?;
        analytics::aggregate(&records, Utc::now())
    }

    pub async fn trend(&self, service_id: ServiceId) -> Vec<TrendPoint> {
        match self.records(service_id).await {
            Some(records) => chart::bucketize(&records),
            None => Vec::new(),
        }
    }

    pub async fn current_status(&self, service_id: ServiceId) -> Option<StatusRecord> {
        let records = self.records(service_id).await?;
        analytics::current_status(&records).cloned()
    }

    /// The newest checks, up to the configured limit
    pub async fn recent_activity(&self, service_id: ServiceId) -> Vec<StatusRecord> {
        match self.records(service_id).await {
            Some(records) => analytics::recent_activity(&records, self.config.recent_activity_limit)
                .into_iter()
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

/// Decode an envelope, turning an unparseable error page into a service error.
fn parse_body<T: DeserializeOwned>(response: &ApiResponse) -> Result<T> {
    match response.json() {
        Ok(body) => Ok(body),
        Err(e) if !response.is_success() => Err(SyncError::Service {
            status: response.status.as_u16(),
            message: format!("Unexpected response: {}", e),
        }),
        Err(e) => Err(e),
    }
}

fn service_error(response: &ApiResponse, fallback: &str) -> SyncError {
    let error = response
        .json::<serde_json::Value>()
        .ok()
        .and_then(|v| v.get("error").cloned());
    SyncError::Service {
        status: response.status.as_u16(),
        message: error_message(error.as_ref(), fallback),
    }
}
