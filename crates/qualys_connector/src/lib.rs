//! Qualys graph connector.
//!
//! Collects accounts, services, web apps, hosts, findings and knowledge base
//! vulnerabilities from a Qualys subscription and writes them as a graph of
//! entities and relationships.
//!
//! Collection is split into [`Step`]s run by a [`StepRunner`] in dependency
//! order. Every API call goes through one rate-limited client, so steps that
//! run together share the subscription's budget.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod cli;
mod collect;
mod config;
mod context;
mod runner;
mod step;
pub mod steps;

pub use cli::{Cli, Commands};
pub use collect::{collect, verify};
pub use config::{ConfigOverrides, ConnectorConfig};
pub use context::StepContext;
pub use runner::{RunSummary, StepRunner, StepStatus, StepSummary};
pub use step::{Step, StepId};
