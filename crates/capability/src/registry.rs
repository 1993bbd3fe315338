//! Capability registry
//!
//! Tool descriptors are discovered once from the provider and shared
//! read-only for the rest of the session.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::{CapabilityError, CapabilityProvider, Result, ToolDescriptor};

/// Discovered tools plus the provider that serves them
#[derive(Clone)]
pub struct CapabilityRegistry {
    provider: Arc<dyn CapabilityProvider>,
    descriptors: Arc<Vec<ToolDescriptor>>,
}

impl CapabilityRegistry {
    /// Query the provider's tool list
    pub async fn discover(provider: Arc<dyn CapabilityProvider>) -> Result<Self> {
        let descriptors = provider.list_tools().await?;
        info!("discovered {} tools", descriptors.len());
        for d in &descriptors {
            debug!("tool {}: {}", d.name, d.description);
        }
        Ok(Self {
            provider,
            descriptors: Arc::new(descriptors),
        })
    }

    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.descriptors.iter().map(|d| d.name.clone()).collect()
    }

    /// Function definitions for a tool-augmented chat request
    pub fn definitions(&self) -> Vec<stepwise_provider::Tool> {
        self.descriptors
            .iter()
            .map(ToolDescriptor::to_provider_tool)
            .collect()
    }

    /// Tool list as embedded in planning prompts
    pub fn render(&self) -> String {
        if self.descriptors.is_empty() {
            return "(no tools available)".to_string();
        }
        self.descriptors
            .iter()
            .map(|d| {
                format!(
                    "- {}: {}\n  parameters: {}",
                    d.name, d.description, d.parameters
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Validate the arguments against the tool's schema, then invoke it
    pub async fn invoke(&self, name: &str, arguments: Value) -> Result<String> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| CapabilityError::NotFound(name.to_string()))?;
        let arguments = descriptor.normalize_arguments(arguments)?;
        self.provider.call_tool(name, arguments).await
    }
}
