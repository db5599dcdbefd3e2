//! State shared by the steps of one run.

use crate::ConnectorConfig;
use chrono::{DateTime, Utc};
use qualys_client::QualysClient;
use qualys_error::QualysResult;
use qualys_graph::JobState;
use std::sync::Arc;

/// Configuration, API client and job state for one collection run.
pub struct StepContext {
    /// Run configuration
    pub config: ConnectorConfig,
    /// Rate-limited API client
    pub client: QualysClient,
    /// Sink for collected entities and relationships
    pub job_state: Arc<dyn JobState>,
    /// Reference time for the `since` windows
    pub started_at: DateTime<Utc>,
}

impl StepContext {
    /// Build the client for `config` and start the run clock.
    pub fn new(config: ConnectorConfig, job_state: Arc<dyn JobState>) -> QualysResult<Self> {
        let client = QualysClient::new(config.client_config()?)?;
        Ok(Self {
            config,
            client,
            job_state,
            started_at: Utc::now(),
        })
    }
}
