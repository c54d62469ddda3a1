//! Immutable agent capability profile

use crew_core::Operation;
use serde::Serialize;
use std::collections::BTreeSet;

/// Role identity, instruction text and allowed-operation set
///
/// Fields are private and there is no mutator: once built, the operation set
/// can never be widened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentProfile {
    role: String,
    instructions: String,
    allowed_operations: Vec<Operation>,
    capabilities: Vec<String>,
}

impl AgentProfile {
    /// Build a profile; duplicate operations are collapsed
    pub fn new(
        role: impl Into<String>,
        instructions: impl Into<String>,
        allowed_operations: impl IntoIterator<Item = Operation>,
    ) -> Self {
        let mut seen = BTreeSet::new();
        let allowed_operations = allowed_operations
            .into_iter()
            .filter(|op| seen.insert(*op))
            .collect();

        Self {
            role: role.into(),
            instructions: instructions.into(),
            allowed_operations,
            capabilities: Vec::new(),
        }
    }

    /// Attach human-readable capability labels
    pub fn with_capabilities<S: Into<String>>(
        mut self,
        capabilities: impl IntoIterator<Item = S>,
    ) -> Self {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    pub fn allowed_operations(&self) -> &[Operation] {
        &self.allowed_operations
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn allows(&self, operation: Operation) -> bool {
        self.allowed_operations.contains(&operation)
    }

    /// Whether any allowed operation can change the project
    pub fn can_mutate(&self) -> bool {
        self.allowed_operations.iter().any(Operation::is_mutating)
    }
}
