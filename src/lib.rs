//! Session and data-sync core for the byteping monitoring dashboard
//!
//! Keeps an authenticated API session alive across access-credential expiry,
//! fetches per-service status history concurrently, and derives uptime
//! analytics and trend charts from it.

pub mod analytics;
pub mod chart;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod fetcher;
pub mod gateway;
pub mod history;
pub mod models;
pub mod session;

pub use analytics::{DerivedAnalytics, aggregate, current_status, recent_activity};
pub use chart::{TrendPoint, bucketize, bucketize_in};
pub use config::Config;
pub use credentials::{CredentialStore, SessionCredentials};
pub use errors::{Result, SyncError};
pub use fetcher::{FetchOutcome, FetchReport, HistorySource, StatusFetcher};
pub use gateway::{ApiRequest, ApiResponse, Gateway, SessionEvent};
pub use history::HistoryStore;
pub use models::{MonitoredService, ServiceDraft, ServiceId, StatusRecord, UserProfile};
pub use session::Session;
