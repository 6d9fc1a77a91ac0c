//! `rest-call-sample`: fetch one object from a REST API and return it as-is.

use std::fmt;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskbox_core::Failure;
use taskbox_runtime::{Capabilities, FetchOptions, TaskDescriptor, TaskEntry, TaskFn};

use crate::{generate_schema, parse_input};

const DEFAULT_BASE_URL: &str = "https://api.restful-api.dev/objects";

/// Object id, numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ObjectId {
    Number(u64),
    Text(String),
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RestCallInput {
    pub id: ObjectId,
}

#[derive(Debug, Clone)]
pub struct RestCallSample {
    base_url: String,
}

impl Default for RestCallSample {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl RestCallSample {
    pub const NAME: &'static str = "rest-call-sample";

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Output is whatever the API returns, so no output schema is declared.
    pub fn into_descriptor(self) -> TaskDescriptor {
        TaskDescriptor::new(Self::NAME, TaskEntry::unary(self))
            .with_description("Fetches an object by id from a REST API")
            .with_input_schema(generate_schema::<RestCallInput>())
    }
}

#[async_trait]
impl TaskFn for RestCallSample {
    async fn call(&self, input: Value, caps: Capabilities) -> Result<Value, Failure> {
        let input: RestCallInput = parse_input(input)?;
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), input.id);
        let options = FetchOptions::get().header("Content-Type", "application/json");
        let response = caps.fetch(&url, options, None).await?;
        Ok(response.body)
    }
}
