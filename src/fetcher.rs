//! Concurrent status-history fetching
//!
//! One fetch per service, all in flight at once. A failing service never
//! cancels or empties its siblings; the fan-in waits for every fetch to settle.

use crate::errors::{Result, SyncError};
use crate::gateway::{ApiRequest, Gateway};
use crate::history::HistoryStore;
use crate::models::{HistoryResponse, MonitoredService, ServiceId, StatusRecord, error_message};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Anything that can produce the full status history of one service
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, service_id: ServiceId) -> Result<Vec<StatusRecord>>;
}

#[async_trait]
impl HistorySource for Gateway {
    async fn fetch_history(&self, service_id: ServiceId) -> Result<Vec<StatusRecord>> {
        let path = format!("/api/webservice/{}/webstatus/", service_id);
        let response = self.call(ApiRequest::get(path), true).await?;

        let parsed: Option<HistoryResponse> = response.json().ok();
        if !response.is_success() {
            return Err(SyncError::Service {
                status: response.status.as_u16(),
                message: error_message(
                    parsed.as_ref().and_then(|p| p.error.as_ref()),
                    "Failed to load status history",
                ),
            });
        }

        let body: HistoryResponse = match parsed {
            Some(body) => body,
            None => response.json()?,
        };

        match body.webstatus {
            Some(records) if body.success => Ok(records),
            _ => Err(SyncError::Service {
                status: response.status.as_u16(),
                message: error_message(body.error.as_ref(), "History response reported failure"),
            }),
        }
    }
}

/// Result of fetching one service
#[derive(Debug)]
pub struct FetchOutcome {
    pub service_id: ServiceId,
    /// Number of records stored on success
    pub result: Result<usize>,
}

/// Per-service results of a fan-out, in the order the services were given
#[derive(Debug, Default)]
pub struct FetchReport {
    pub outcomes: Vec<FetchOutcome>,
}

impl FetchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn succeeded(&self) -> Vec<ServiceId> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.service_id)
            .collect()
    }

    /// Failed services as `PartialFetchFailure` errors
    pub fn failures(&self) -> Vec<SyncError> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.result {
                Ok(_) => None,
                Err(e) => Some(SyncError::PartialFetchFailure {
                    service_id: o.service_id,
                    reason: e.to_string(),
                }),
            })
            .collect()
    }

    /// Whether any fetch ran into an ended session
    pub fn session_expired(&self) -> bool {
        self.outcomes
            .iter()
            .any(|o| matches!(&o.result, Err(e) if e.is_session_expired()))
    }
}

#[derive(Clone)]
pub struct StatusFetcher {
    source: Arc<dyn HistorySource>,
    history: HistoryStore,
}

impl StatusFetcher {
    pub fn new(source: Arc<dyn HistorySource>, history: HistoryStore) -> Self {
        Self { source, history }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Fetch every service's history concurrently and store each result as it lands.
    #[instrument(skip(self, services), fields(services = services.len()))]
    pub async fn fetch_all(&self, services: &[MonitoredService]) -> FetchReport {
        let fetches = services.iter().map(|service| self.fetch_into_store(service.id));
        let outcomes = join_all(fetches).await;

        let report = FetchReport { outcomes };
        let failed = report.outcomes.len() - report.succeeded().len();
        if failed > 0 {
            warn!(
                "Fetched status history for {} of {} services",
                report.outcomes.len() - failed,
                report.outcomes.len()
            );
        } else {
            info!("Fetched status history for {} services", report.outcomes.len());
        }

        report
    }

    /// Same as [`fetch_all`](Self::fetch_all) for a single service
    pub async fn fetch_one(&self, service: &MonitoredService) -> FetchReport {
        self.fetch_all(std::slice::from_ref(service)).await
    }

    async fn fetch_into_store(&self, service_id: ServiceId) -> FetchOutcome {
        let result = match self.source.fetch_history(service_id).await {
            Ok(records) => {
                let count = records.len();
                self.history.replace(service_id, records).await;
                debug!("Service {}: {} status records", service_id, count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to fetch status for service {}: {}", service_id, e);
                self.history.keep_or_empty(service_id).await;
                Err(e)
            }
        };

        FetchOutcome { service_id, result }
    }
}
