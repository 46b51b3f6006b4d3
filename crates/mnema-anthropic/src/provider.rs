// SPDX-FileCopyrightText: 2026 Mnema Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ProviderAdapter implementation backed by the Anthropic Messages API.

use async_trait::async_trait;

use mnema_config::model::ProviderConfig;
use mnema_core::types::{ProviderRequest, ProviderResponse, TokenUsage};
use mnema_core::{AdapterType, HealthStatus, MnemaError, PluginAdapter, ProviderAdapter};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Anthropic Claude provider adapter.
pub struct AnthropicProvider {
    client: AnthropicClient,
}

impl AnthropicProvider {
    /// Build a provider from config. The API key comes from config or the
    /// `ANTHROPIC_API_KEY` environment variable.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, MnemaError> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
                MnemaError::Config(
                    "no API key: set provider.api_key or ANTHROPIC_API_KEY".to_string(),
                )
            })?,
        };
        let client = AnthropicClient::new(
            api_key,
            config.api_version.clone(),
            config.model.clone(),
        )?;
        Ok(Self { client })
    }

    /// Wrap an existing client. For tests with an overridden base URL.
    pub fn with_client(client: AnthropicClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, MnemaError> {
        // No cheap ping endpoint exists; a constructed client is considered
        // healthy until a call fails.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), MnemaError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, MnemaError> {
        let model = if request.model.is_empty() {
            self.client.default_model().to_string()
        } else {
            request.model
        };
        let api_request = MessageRequest {
            model,
            messages: request
                .messages
                .into_iter()
                .map(|m| ApiMessage {
                    role: m.role,
                    content: m.content,
                })
                .collect(),
            system: request.system_prompt,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let response = self.client.complete_message(&api_request).await?;
        let content = response.text();
        Ok(ProviderResponse {
            id: response.id,
            content,
            model: response.model,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}
