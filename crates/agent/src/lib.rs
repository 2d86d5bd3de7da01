#![deny(unsafe_code)]
#![deny(unused_must_use)]
#![deny(unused_features)]
#![warn(unused_crate_dependencies)]

pub mod push_registration;

use std::sync::Arc;

use registration::{ExchangeOutcome, ExchangeOutcomeReceiver, RegistrationCoordinator};
use simple_agent::{exchange::TokenExchangeClient, map::TileMapClient, platform::PlatformClient};
use simple_agent_config::AgentConfig;
use tokio::{
    signal::{self, unix::SignalKind},
    sync::broadcast,
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::push_registration::{AgentPushPlatform, AgentTokenExchanger};

pub struct PushRegistrationAgent {
    config: Arc<AgentConfig>,
}

impl PushRegistrationAgent {
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub async fn run(self) {
        simple_agent::init_logging(&self.config);

        info!(
            "Pushlink agent version: {}-{}",
            self.config.agent_semver_version(),
            self.config.agent_code_version()
        );

        if self.config.debug_mode() {
            warn!("Debug mode is enabled");
        }

        let mut terminate_signal = signal::unix::signal(SignalKind::terminate()).unwrap();

        // Tile map provider API key goes in before other launch work.
        let tile_map = TileMapClient::new(&self.config);
        tile_map.provide_api_key();

        let (agent_quit_handle, agent_quit_watcher) = broadcast::channel(1);

        let http_client = reqwest::Client::new();
        let platform_client = PlatformClient::new(self.config.clone(), http_client.clone());
        let exchange_client = TokenExchangeClient::new(self.config.clone(), http_client);

        // Location permission is requested early and nothing waits
        // for the result.
        let location_client = platform_client.clone();
        tokio::spawn(async move {
            match location_client.request_location_permission().await {
                Ok(()) => info!("Location permission requested"),
                Err(e) => warn!("Location permission request failed: {:?}", e),
            }
        });

        let (event_sender, event_receiver) = registration::channel();
        let platform = AgentPushPlatform::new(platform_client, event_sender);
        let exchanger = AgentTokenExchanger::new(exchange_client);

        let (coordinator_quit_handle, outcomes) = RegistrationCoordinator::new_coordinator(
            self.config.permission_options(),
            agent_quit_watcher.resubscribe(),
            platform,
            exchanger,
            event_receiver,
        );

        let outcome_task = Self::spawn_outcome_logger(outcomes);

        simple_agent::wait_quit_signal(&mut terminate_signal).await;
        info!("Agent quit signal received");

        drop(agent_quit_handle);

        coordinator_quit_handle.wait_quit().await;

        match outcome_task.await {
            Ok(()) => (),
            Err(e) => warn!("Exchange outcome logger quit failed. Error: {:?}", e),
        }

        info!("Agent quit done");
    }

    /// Exchange outcome reporting.
    ///
    /// In a full system the messaging token would also go to an
    /// application backend from here.
    fn spawn_outcome_logger(mut outcomes: ExchangeOutcomeReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(outcome) = outcomes.recv().await {
                match outcome {
                    ExchangeOutcome::Exchanged { platform_token, .. } => {
                        info!(
                            "Messaging token obtained for device token {}",
                            platform_token.to_hex()
                        );
                    }
                    ExchangeOutcome::ExchangeFailed { platform_token } => {
                        warn!(
                            "Messaging token exchange failed for device token {}",
                            platform_token.to_hex()
                        );
                    }
                }
            }
        })
    }
}
