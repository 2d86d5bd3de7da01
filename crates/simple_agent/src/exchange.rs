//! HTTP client for the messaging backend token service.

use std::sync::Arc;

use error_stack::{Report, Result, ResultExt};
use model::{MessagingToken, PlatformToken};
use serde::{Deserialize, Serialize};
use simple_agent_config::AgentConfig;
use url::Url;

const TOKEN_PATH: &str = "v1/token";

#[derive(thiserror::Error, Debug)]
pub enum TokenExchangeError {
    #[error("API URL creation failed")]
    ApiUrl,
    #[error("HTTP request failed")]
    Request,
    #[error("HTTP response status was not successful")]
    RequestStatus,
    #[error("Response JSON parsing failed")]
    ResponseParsing,
    #[error("Token service reported an error")]
    ServiceError,
    #[error("Token service response did not contain a token")]
    MissingToken,
}

#[derive(Debug, Serialize)]
struct ExchangeRequest {
    /// Hex encoded platform device token.
    platform_token: String,
}

#[derive(Debug, Deserialize)]
struct ExchangeResponse {
    messaging_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TokenExchangeClient {
    config: Arc<AgentConfig>,
    client: reqwest::Client,
}

impl TokenExchangeClient {
    pub fn new(config: Arc<AgentConfig>, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn api_url(&self, path: &str) -> Result<Url, TokenExchangeError> {
        self.config
            .token_service_url()
            .join(path)
            .change_context(TokenExchangeError::ApiUrl)
    }

    /// Exchange a platform token for a messaging backend token.
    ///
    /// The request carries a bounded timeout so that one slow exchange
    /// can not stay pending forever. Expiry is an ordinary failure.
    pub async fn exchange_messaging_token(
        &self,
        token: &PlatformToken,
    ) -> Result<MessagingToken, TokenExchangeError> {
        let url = self.api_url(TOKEN_PATH)?;
        let request = ExchangeRequest {
            platform_token: token.to_hex(),
        };

        let response = self
            .client
            .post(url)
            .timeout(self.config.exchange_timeout())
            .json(&request)
            .send()
            .await
            .change_context(TokenExchangeError::Request)?;

        if !response.status().is_success() {
            return Err(TokenExchangeError::RequestStatus)
                .attach_printable(format!("status: {}", response.status()));
        }

        let exchange: ExchangeResponse = response
            .json()
            .await
            .change_context(TokenExchangeError::ResponseParsing)?;

        if let Some(error) = exchange.error {
            return Err(TokenExchangeError::ServiceError).attach_printable(error);
        }

        let Some(messaging_token) = exchange.messaging_token else {
            return Err(Report::new(TokenExchangeError::MissingToken));
        };

        Ok(MessagingToken::new(messaging_token))
    }
}
