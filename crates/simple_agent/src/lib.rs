#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_features)]
#![warn(unused_crate_dependencies)]

pub mod exchange;
pub mod map;
pub mod platform;

use simple_agent_config::AgentConfig;
use tokio::{
    signal::{self, unix::Signal},
    sync::broadcast,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Drop this when quit starts
pub type AgentQuitHandle = broadcast::Sender<()>;

/// Use resubscribe() for cloning.
pub type AgentQuitWatcher = broadcast::Receiver<()>;

pub fn init_logging(config: &AgentConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_timestamp() {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .without_time()
            .init();
    }
}

pub async fn wait_quit_signal(terminate_signal: &mut Signal) {
    tokio::select! {
        _ = terminate_signal.recv() => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => (),
                Err(e) => error!("Failed to listen CTRL+C. Error: {}", e),
            }
        }
    }
}
