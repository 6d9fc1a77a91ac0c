//! `addition`: adds two numbers.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taskbox_core::Failure;
use taskbox_runtime::{Capabilities, TaskDescriptor, TaskEntry, TaskFn};

use crate::{generate_schema, parse_input, to_output};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdditionInput {
    pub num1: f64,
    pub num2: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AdditionOutput {
    pub sum: f64,
}

pub struct Addition;

impl Addition {
    pub const NAME: &'static str = "addition";

    pub fn descriptor() -> TaskDescriptor {
        TaskDescriptor::new(Self::NAME, TaskEntry::unary(Addition))
            .with_description("Adds num1 and num2")
            .with_input_schema(generate_schema::<AdditionInput>())
            .with_output_schema(generate_schema::<AdditionOutput>())
    }
}

#[async_trait]
impl TaskFn for Addition {
    async fn call(&self, input: Value, _caps: Capabilities) -> Result<Value, Failure> {
        let input: AdditionInput = parse_input(input)?;
        to_output(&AdditionOutput {
            sum: input.num1 + input.num2,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::runtime;
    use serde_json::json;
    use std::sync::Arc;
    use taskbox_core::{InvocationStatus, SchemaDirection, TaskError};
    use taskbox_runtime::StaticTransport;

    #[tokio::test]
    async fn test_adds_numbers() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let report = rt
            .run(Addition::NAME, json!({"num1": 2, "num2": 3}))
            .await
            .unwrap();

        assert_eq!(report.status, InvocationStatus::Succeeded);
        assert_eq!(report.output().and_then(|o| o["sum"].as_f64()), Some(5.0));
        assert!(report.events.is_empty());
    }

    #[tokio::test]
    async fn test_string_operand_is_schema_error() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let report = rt
            .run(Addition::NAME, json!({"num1": "2", "num2": 3}))
            .await
            .unwrap();

        assert_eq!(report.status, InvocationStatus::Failed);
        assert!(report.started_at.is_none());
        match report.error() {
            Some(TaskError::Schema {
                path, direction, ..
            }) => {
                assert_eq!(path, "$.num1");
                assert_eq!(*direction, SchemaDirection::Input);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_operand_names_field() {
        let rt = runtime(Arc::new(StaticTransport::new()));
        let report = rt.run(Addition::NAME, json!({"num1": 2})).await.unwrap();
        assert!(matches!(
            report.error(),
            Some(TaskError::Schema { path, .. }) if path == "$.num2"
        ));
    }
}
