//! Command-line interface.

use crate::{ConfigOverrides, StepId};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Qualys connector - collects VM and WAS data into a security graph.
#[derive(Parser, Debug)]
#[command(name = "qualys-connector")]
#[command(about = "Collect Qualys VM and WAS data into a security graph", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file layered over the defaults
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API platform URL, e.g. https://qualysapi.qualys.com
    #[arg(long, env = "QUALYS_API_URL", global = true)]
    pub api_url: Option<String>,

    /// API user
    #[arg(long, env = "QUALYS_USERNAME", global = true)]
    pub username: Option<String>,

    /// API password
    #[arg(long, env = "QUALYS_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the credentials are accepted
    Verify,

    /// Collect entities and relationships
    Collect {
        /// Directory for entities.json and relationships.json
        #[arg(short, long, default_value = ".qualys-graph")]
        output: PathBuf,

        /// Run only this step and its dependencies (repeatable)
        #[arg(long = "step", value_name = "STEP")]
        steps: Vec<StepId>,
    },
}

impl Cli {
    /// Values given on the command line that override configuration files.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            api_url: self.api_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}
