//! Dependency-ordered step execution.

use crate::{Step, StepId};
use derive_getters::Getters;
use futures::future::join_all;
use qualys_error::{ConfigError, ConfigErrorKind, QualysResult};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};
use tracing::{Instrument, error, info, info_span, instrument, warn};

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    /// Completed without error
    Success,
    /// Returned an error
    Failure,
    /// Not run because a dependency did not succeed
    Skipped,
}

/// Report for one step of a run.
#[derive(Debug, Clone, Getters)]
pub struct StepSummary {
    id: StepId,
    name: String,
    status: StepStatus,
    duration: Duration,
    error: Option<String>,
}

/// Report for a whole run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    steps: Vec<StepSummary>,
}

impl RunSummary {
    /// Per-step reports.
    pub fn steps(&self) -> &[StepSummary] {
        &self.steps
    }

    /// Report for one step, if it was part of the run.
    pub fn get(&self, id: StepId) -> Option<&StepSummary> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Status of one step, if it was part of the run.
    pub fn status(&self, id: StepId) -> Option<StepStatus> {
        self.get(id).map(|step| step.status)
    }

    /// True when every step succeeded.
    pub fn is_success(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.status == StepStatus::Success)
    }

    /// Number of steps with the given status.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == status)
            .count()
    }
}

#[track_caller]
fn plan_error(message: String) -> ConfigError {
    ConfigError::new(ConfigErrorKind::StepPlan(message))
}

/// Runs steps in dependency order.
///
/// Steps whose dependencies have all finished run together as one wave.
/// A failed step does not stop the run; everything depending on it,
/// directly or not, is reported as skipped.
pub struct StepRunner<C: Sync> {
    steps: Vec<Box<dyn Step<C>>>,
}

impl<C: Sync> Default for StepRunner<C> {
    fn default() -> Self {
        Self { steps: Vec::new() }
    }
}

impl<C: Sync> StepRunner<C> {
    /// Runner with no steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step.
    pub fn with_step(mut self, step: impl Step<C> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add boxed steps.
    pub fn with_steps(mut self, steps: Vec<Box<dyn Step<C>>>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Group the selected steps into waves.
    ///
    /// An empty `only` selects every step. Otherwise the named steps and
    /// everything they depend on are selected.
    ///
    /// # Errors
    ///
    /// Fails on duplicate ids, unknown ids, or dependency cycles.
    pub fn plan(&self, only: &[StepId]) -> QualysResult<Vec<Vec<StepId>>> {
        let mut index: HashMap<StepId, &dyn Step<C>> = HashMap::new();
        for step in &self.steps {
            if index.insert(step.id(), step.as_ref()).is_some() {
                return Err(plan_error(format!("step {} registered twice", step.id())).into());
            }
        }
        for step in &self.steps {
            for dependency in step.depends_on() {
                if !index.contains_key(&dependency) {
                    return Err(plan_error(format!(
                        "step {} depends on unknown step {}",
                        step.id(),
                        dependency
                    ))
                    .into());
                }
            }
        }

        let selected: HashSet<StepId> = if only.is_empty() {
            index.keys().copied().collect()
        } else {
            let mut selected = HashSet::new();
            let mut pending = only.to_vec();
            while let Some(id) = pending.pop() {
                let step = index
                    .get(&id)
                    .ok_or_else(|| plan_error(format!("unknown step {}", id)))?;
                if selected.insert(id) {
                    pending.extend(step.depends_on());
                }
            }
            selected
        };

        let mut placed = HashSet::new();
        let mut waves = Vec::new();
        while placed.len() < selected.len() {
            let wave: Vec<StepId> = self
                .steps
                .iter()
                .filter(|step| selected.contains(&step.id()) && !placed.contains(&step.id()))
                .filter(|step| step.depends_on().iter().all(|dep| placed.contains(dep)))
                .map(|step| step.id())
                .collect();

            if wave.is_empty() {
                let mut stuck: Vec<String> = selected
                    .difference(&placed)
                    .map(|id| id.to_string())
                    .collect();
                stuck.sort();
                return Err(plan_error(format!(
                    "dependency cycle among steps: {}",
                    stuck.join(", ")
                ))
                .into());
            }
            placed.extend(wave.iter().copied());
            waves.push(wave);
        }
        Ok(waves)
    }

    /// Run the selected steps against `context`.
    ///
    /// # Errors
    ///
    /// Fails only when the plan is invalid. Step failures are reported in
    /// the summary.
    #[instrument(skip_all, fields(steps = self.steps.len()))]
    pub async fn run(&self, context: &C, only: &[StepId]) -> QualysResult<RunSummary> {
        let waves = self.plan(only)?;
        let mut summary = RunSummary::default();

        for wave in waves {
            let mut runnable = Vec::new();
            for id in wave {
                let Some(step) = self.steps.iter().find(|step| step.id() == id) else {
                    continue;
                };
                let blocked = step
                    .depends_on()
                    .into_iter()
                    .find(|dep| summary.status(*dep) != Some(StepStatus::Success));

                match blocked {
                    Some(dependency) => {
                        warn!(step = %id, %dependency, "Skipping step, dependency did not succeed");
                        summary.steps.push(StepSummary {
                            id,
                            name: step.name().to_string(),
                            status: StepStatus::Skipped,
                            duration: Duration::ZERO,
                            error: None,
                        });
                    }
                    None => runnable.push(step.as_ref()),
                }
            }

            let results = join_all(runnable.into_iter().map(|step| {
                let span = info_span!("step", id = %step.id());
                async move {
                    info!(name = step.name(), "Starting step");
                    let started = Instant::now();
                    let result = step.execute(context).await;
                    (step, result, started.elapsed())
                }
                .instrument(span)
            }))
            .await;

            for (step, result, duration) in results {
                let (status, message) = match result {
                    Ok(()) => {
                        info!(step = %step.id(), duration_ms = duration.as_millis() as u64, "Step succeeded");
                        (StepStatus::Success, None)
                    }
                    Err(e) => {
                        error!(step = %step.id(), error = %e, "Step failed");
                        (StepStatus::Failure, Some(e.to_string()))
                    }
                };
                summary.steps.push(StepSummary {
                    id: step.id(),
                    name: step.name().to_string(),
                    status,
                    duration,
                    error: message,
                });
            }
        }

        info!(
            succeeded = summary.count(StepStatus::Success),
            failed = summary.count(StepStatus::Failure),
            skipped = summary.count(StepStatus::Skipped),
            "Run finished"
        );
        Ok(summary)
    }
}
