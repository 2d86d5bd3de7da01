//! Config given as command line arguments

use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct AgentModeArgs {
    /// Set config file directory. Current directory is used by default.
    #[arg(short, long, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
