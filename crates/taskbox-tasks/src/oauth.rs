//! `ms-oauth-token`: client-credentials token from the Microsoft identity
//! platform, scoped to the Defender security API.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskbox_core::Failure;
use taskbox_runtime::{form_body, Capabilities, FetchOptions, TaskDescriptor, TaskEntry, TaskFn};
use tracing::info;

use crate::{generate_schema, parse_input, to_output};

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const SECURITY_SCOPE: &str = "https://api.security.microsoft.com/.default";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MsOAuthInput {
    #[serde(rename = "TENANT_ID")]
    pub tenant_id: String,
    #[serde(rename = "CLIENT_ID")]
    pub client_id: String,
    #[serde(rename = "CLIENT_SECRET")]
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MsOAuthOutput {
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct MsOAuthToken {
    authority: String,
}

impl Default for MsOAuthToken {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
        }
    }
}

impl MsOAuthToken {
    pub const NAME: &'static str = "ms-oauth-token";

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn into_descriptor(self) -> TaskDescriptor {
        TaskDescriptor::new(Self::NAME, TaskEntry::unary(self))
            .with_description("Requests an app-only access token for the Microsoft security API")
            .with_input_schema(generate_schema::<MsOAuthInput>())
            .with_output_schema(generate_schema::<MsOAuthOutput>())
    }

    fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{tenant_id}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl TaskFn for MsOAuthToken {
    async fn call(&self, input: Value, caps: Capabilities) -> Result<Value, Failure> {
        let input: MsOAuthInput = parse_input(input)?;

        let body = form_body(&[
            ("grant_type", "client_credentials"),
            ("client_id", input.client_id.as_str()),
            ("client_secret", input.client_secret.as_str()),
            ("scope", SECURITY_SCOPE),
        ]);
        let options =
            FetchOptions::post().header("Content-Type", "application/x-www-form-urlencoded");

        let response = caps
            .fetch(&self.token_url(&input.tenant_id), options, Some(body))
            .await?;

        let Some(token) = response.body.get("access_token").and_then(Value::as_str) else {
            return Err(caps
                .errors()
                .data(format!("Failed to get access token: {}", response.body)));
        };

        info!(tenant = %input.tenant_id, "Access token acquired");
        to_output(&MsOAuthOutput {
            token: token.to_string(),
        })
    }
}
