//! Built-in sample tasks.
//!
//! Each task is a typed port of one of the sample payloads. Input and output
//! schemas are derived from the Rust types with `schemars`, so the runtime
//! validates exactly what the task deserializes.

mod addition;
mod oauth;
mod rest_call;
mod streaming;
mod weather;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use taskbox_core::{Failure, SchemaDirection, TaskError};
use taskbox_runtime::{RegistryError, TaskDescriptor, TaskRegistry};

pub use addition::{Addition, AdditionInput, AdditionOutput};
pub use oauth::{MsOAuthInput, MsOAuthOutput, MsOAuthToken};
pub use rest_call::{ObjectId, RestCallInput, RestCallSample};
pub use streaming::{StepResult, StreamingExample, StreamingInput, StreamingOutput};
pub use weather::{WeatherApi, WeatherInput, WeatherOutput};

/// Descriptors of every built-in task with default settings.
pub fn builtin_descriptors() -> Vec<TaskDescriptor> {
    vec![
        Addition::descriptor(),
        MsOAuthToken::default().into_descriptor(),
        RestCallSample::default().into_descriptor(),
        StreamingExample::descriptor(),
        WeatherApi::default().into_descriptor(),
    ]
}

/// Register every built-in task.
pub fn register_builtin(registry: &mut TaskRegistry) -> Result<(), RegistryError> {
    for descriptor in builtin_descriptors() {
        registry.register(descriptor)?;
    }
    Ok(())
}

/// A registry holding only the built-in tasks.
pub fn builtin_registry() -> Result<TaskRegistry, RegistryError> {
    let mut registry = TaskRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}

/// Generate JSON Schema from a type that implements JsonSchema.
pub(crate) fn generate_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

/// Decode validated input into the task's input type.
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, Failure> {
    serde_json::from_value(input).map_err(|e| {
        Failure::from(TaskError::schema(
            format!("Input could not be decoded: {e}"),
            "$",
            SchemaDirection::Input,
        ))
    })
}

pub(crate) fn to_output<T: Serialize>(output: &T) -> Result<Value, Failure> {
    Ok(serde_json::to_value(output)?)
}
