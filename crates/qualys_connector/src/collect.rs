//! Entry points behind the command-line commands.

use crate::steps::all_steps;
use crate::{ConnectorConfig, RunSummary, StepContext, StepId, StepRunner};
use qualys_client::QualysClient;
use qualys_error::QualysResult;
use qualys_graph::{InMemoryJobState, JobState};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Check that the configured credentials are accepted.
#[instrument(skip_all, fields(api_url = %config.api_url))]
pub async fn verify(config: &ConnectorConfig) -> QualysResult<()> {
    let client = QualysClient::new(config.client_config()?)?;
    client.verify_authentication().await?;
    info!("Credentials accepted");
    Ok(())
}

/// Run the selected steps (all when `only` is empty) and write the
/// collected graph to `output`.
///
/// The graph is written even when some steps fail; their status is in the
/// returned summary.
#[instrument(skip_all, fields(api_url = %config.api_url, output = %output.display()))]
pub async fn collect(
    config: ConnectorConfig,
    output: &Path,
    only: &[StepId],
) -> QualysResult<RunSummary> {
    let job_state = Arc::new(InMemoryJobState::new());
    let context = StepContext::new(config, job_state.clone())?;
    let runner = StepRunner::new().with_steps(all_steps());

    let summary = runner.run(&context, only).await?;
    job_state.write_to_dir(output).await?;

    info!(
        entities = job_state.entity_count().await,
        relationships = job_state.relationship_count().await,
        "Collection finished"
    );
    Ok(summary)
}
