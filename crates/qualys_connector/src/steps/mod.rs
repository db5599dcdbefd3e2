//! Collection steps for the Qualys VM and WAS products.

mod account;
mod hosts;
mod vulnerabilities;
mod web_apps;

pub use account::{FetchAccount, FetchServices};
pub use hosts::{FetchHostDetections, FetchHosts};
pub use vulnerabilities::FetchVulnerabilities;
pub use web_apps::{FetchWebAppFindings, FetchWebApps};

use crate::{Step, StepContext};
use qualys_error::{JobStateError, JobStateErrorKind, QualysResult};
use qualys_graph::{Entity, JobState, Relationship};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Ids of collected web apps, written by [`FetchWebApps`].
pub const WEB_APP_IDS: &str = "web_app_ids";
/// VM host ids of collected hosts, written by [`FetchHosts`].
pub const HOST_IDS: &str = "host_ids";
/// Host entity key for each VM host id.
pub const HOST_KEYS: &str = "host_keys";
/// QIDs referenced by web app findings.
pub const WEB_APP_FINDING_QIDS: &str = "web_app_finding_qids";
/// QIDs referenced by host detections.
pub const HOST_FINDING_QIDS: &str = "host_finding_qids";

/// Every step, in registration order.
pub fn all_steps() -> Vec<Box<dyn Step<StepContext>>> {
    vec![
        Box::new(FetchAccount),
        Box::new(FetchServices),
        Box::new(FetchWebApps),
        Box::new(FetchWebAppFindings),
        Box::new(FetchHosts),
        Box::new(FetchHostDetections),
        Box::new(FetchVulnerabilities),
    ]
}

/// Value stored by an earlier step, or the default if it stored nothing.
async fn read_data<T>(job_state: &dyn JobState, key: &str) -> QualysResult<T>
where
    T: DeserializeOwned + Default,
{
    match job_state.get_data(key).await {
        None => Ok(T::default()),
        Some(value) => serde_json::from_value(value).map_err(|e| data_error(key, e).into()),
    }
}

async fn write_data<T: Serialize>(job_state: &dyn JobState, key: &str, value: &T) -> QualysResult<()> {
    let value = serde_json::to_value(value).map_err(|e| data_error(key, e))?;
    job_state.set_data(key, value).await;
    Ok(())
}

fn data_error(key: &str, error: serde_json::Error) -> JobStateError {
    JobStateError::new(JobStateErrorKind::Serialize(format!("{}: {}", key, error)))
}

/// Add an entity unless its key was already collected. Returns whether it was added.
async fn add_entity(job_state: &dyn JobState, entity: Entity) -> QualysResult<bool> {
    if job_state.has_key(entity.key()).await {
        debug!(key = %entity.key(), "Entity already collected");
        return Ok(false);
    }
    job_state.add_entities(vec![entity]).await?;
    Ok(true)
}

async fn add_relationship(job_state: &dyn JobState, relationship: Relationship) -> QualysResult<()> {
    if job_state.has_key(relationship.key()).await {
        debug!(key = %relationship.key(), "Relationship already collected");
        return Ok(());
    }
    job_state.add_relationships(vec![relationship]).await
}
