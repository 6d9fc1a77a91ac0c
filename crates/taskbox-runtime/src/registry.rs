//! Task registry.

use std::collections::HashMap;
use std::sync::Arc;

use taskbox_core::schema;
use taskbox_core::TaskName;
use tracing::info;

use crate::error::RegistryError;
use crate::task::TaskDescriptor;

/// Registered tasks by name.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskName, Arc<TaskDescriptor>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Names must be unique and both schemas well formed.
    pub fn register(&mut self, descriptor: TaskDescriptor) -> Result<(), RegistryError> {
        let name = descriptor.name().clone();
        if self.tasks.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }

        for (which, schema) in [
            ("input", descriptor.input_schema()),
            ("output", descriptor.output_schema()),
        ] {
            schema::check_schema(schema).map_err(|source| RegistryError::InvalidSchema {
                task: name.clone(),
                which,
                source,
            })?;
        }

        info!(task = %name, entry = descriptor.entry().kind_name(), "Registered task");
        self.tasks.insert(name, Arc::new(descriptor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<TaskDescriptor>> {
        self.tasks.get(&TaskName::new(name)).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<TaskName> {
        let mut names: Vec<TaskName> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Descriptors sorted by name.
    pub fn descriptors(&self) -> Vec<Arc<TaskDescriptor>> {
        let mut descriptors: Vec<Arc<TaskDescriptor>> = self.tasks.values().cloned().collect();
        descriptors.sort_by(|a, b| a.name().cmp(b.name()));
        descriptors
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
