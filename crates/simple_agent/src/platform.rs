//! HTTP client for the platform permission and push registration
//! services.

use std::sync::Arc;

use error_stack::{Result, ResultExt};
use model::{PermissionOptions, PermissionState, PlatformToken};
use serde::Deserialize;
use simple_agent_config::AgentConfig;
use tracing::warn;
use url::Url;

const NOTIFICATION_PERMISSION_PATH: &str = "v1/notification-permission";
const LOCATION_PERMISSION_PATH: &str = "v1/location-permission";
const REGISTER_PATH: &str = "v1/register";

#[derive(thiserror::Error, Debug)]
pub enum PlatformApiError {
    #[error("API URL creation failed")]
    ApiUrl,
    #[error("HTTP request failed")]
    Request,
    #[error("HTTP response status was not successful")]
    RequestStatus,
    #[error("Response JSON parsing failed")]
    ResponseParsing,
    #[error("Invalid platform device token")]
    InvalidDeviceToken,
}

/// Authorization result from the platform permission service.
#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    granted: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    /// Hex encoded device token.
    device_token: String,
}

#[derive(Debug, Clone)]
pub struct PlatformClient {
    config: Arc<AgentConfig>,
    client: reqwest::Client,
}

impl PlatformClient {
    pub fn new(config: Arc<AgentConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn api_url(&self, path: &str) -> Result<Url, PlatformApiError> {
        self.config
            .platform_base_url()
            .join(path)
            .change_context(PlatformApiError::ApiUrl)
    }

    /// Ask the platform permission service for notification permission.
    ///
    /// The OS level permission prompt is displayed at most once per
    /// cold start, which the platform service guarantees.
    pub async fn request_notification_permission(
        &self,
        options: PermissionOptions,
    ) -> Result<PermissionState, PlatformApiError> {
        let url = self.api_url(NOTIFICATION_PERMISSION_PATH)?;
        let response = self
            .client
            .post(url)
            .json(&options)
            .send()
            .await
            .change_context(PlatformApiError::Request)?;

        if !response.status().is_success() {
            return Err(PlatformApiError::RequestStatus)
                .attach_printable(format!("status: {}", response.status()));
        }

        let authorization: AuthorizationResponse = response
            .json()
            .await
            .change_context(PlatformApiError::ResponseParsing)?;

        if let Some(error) = authorization.error {
            warn!("Platform reported authorization error: {}", error);
        }

        if authorization.granted {
            Ok(PermissionState::Granted)
        } else {
            Ok(PermissionState::Denied)
        }
    }

    /// Request when-in-use geolocation permission.
    ///
    /// Fire-and-forget: nothing in the agent depends on the result.
    pub async fn request_location_permission(&self) -> Result<(), PlatformApiError> {
        let url = self.api_url(LOCATION_PERMISSION_PATH)?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "mode": "when-in-use" }))
            .send()
            .await
            .change_context(PlatformApiError::Request)?;

        if !response.status().is_success() {
            return Err(PlatformApiError::RequestStatus)
                .attach_printable(format!("status: {}", response.status()));
        }

        Ok(())
    }

    /// Register this device with the platform push transport.
    pub async fn register_for_remote_notifications(
        &self,
    ) -> Result<PlatformToken, PlatformApiError> {
        let url = self.api_url(REGISTER_PATH)?;
        let response = self
            .client
            .post(url)
            .send()
            .await
            .change_context(PlatformApiError::Request)?;

        if !response.status().is_success() {
            return Err(PlatformApiError::RequestStatus)
                .attach_printable(format!("status: {}", response.status()));
        }

        let registration: RegisterResponse = response
            .json()
            .await
            .change_context(PlatformApiError::ResponseParsing)?;

        PlatformToken::from_hex(&registration.device_token)
            .change_context(PlatformApiError::InvalidDeviceToken)
    }
}
