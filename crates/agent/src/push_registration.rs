//! Registration collaborator implementations for the agent.

use error_stack::ResultExt;
use model::{MessagingToken, PermissionOptions, PermissionState, PlatformToken};
use registration::{
    MessagingTokenExchanger, PlatformEventSender, PushPlatform, RegistrationError,
};
use simple_agent::{exchange::TokenExchangeClient, platform::PlatformClient};

pub struct AgentPushPlatform {
    client: PlatformClient,
    events: PlatformEventSender,
}

impl AgentPushPlatform {
    pub fn new(client: PlatformClient, events: PlatformEventSender) -> Self {
        Self { client, events }
    }
}

impl PushPlatform for AgentPushPlatform {
    async fn request_notification_permission(
        &self,
        options: PermissionOptions,
    ) -> error_stack::Result<PermissionState, RegistrationError> {
        self.client
            .request_notification_permission(options)
            .await
            .change_context(RegistrationError::PermissionRequestFailed)
    }

    async fn register_for_remote_notifications(&self) {
        // Registration completion reaches the coordinator as a
        // platform event, also here where the transport is a plain
        // request and response.
        match self.client.register_for_remote_notifications().await {
            Ok(token) => self.events.send_token_received(token),
            Err(e) => self.events.send_registration_failed(format!("{:?}", e)),
        }
    }
}

pub struct AgentTokenExchanger {
    client: TokenExchangeClient,
}

impl AgentTokenExchanger {
    pub fn new(client: TokenExchangeClient) -> Self {
        Self { client }
    }
}

impl MessagingTokenExchanger for AgentTokenExchanger {
    async fn exchange_messaging_token(
        &self,
        token: PlatformToken,
    ) -> error_stack::Result<MessagingToken, RegistrationError> {
        self.client
            .exchange_messaging_token(&token)
            .await
            .change_context(RegistrationError::ExchangeFailed)
    }
}
