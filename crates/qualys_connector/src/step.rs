//! Step identity and the trait every collection step implements.

use qualys_error::QualysResult;

/// Collection steps, in the order they are usually run.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum StepId {
    /// The subscription account
    FetchAccount,
    /// VM and WAS service entities
    FetchServices,
    /// WAS web applications
    FetchWebApps,
    /// WAS findings on collected web applications
    FetchWebAppFindings,
    /// Asset Management hosts
    FetchHosts,
    /// VM detections on collected hosts
    FetchHostDetections,
    /// Knowledge base entries for every collected QID
    FetchVulnerabilities,
}

/// A unit of collection run by the [`StepRunner`](crate::StepRunner).
///
/// `C` is the context shared by all steps of a run.
#[async_trait::async_trait]
pub trait Step<C>: Send + Sync
where
    C: Sync,
{
    /// Identifier used for ordering, filtering and reporting.
    fn id(&self) -> StepId;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Steps that must succeed before this one runs.
    fn depends_on(&self) -> Vec<StepId>;

    /// Run the step.
    async fn execute(&self, context: &C) -> QualysResult<()>;
}
