//! In-process capability provider

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::{builtin, CapabilityError, CapabilityProvider, Result, ToolDescriptor};

type BoxedTool = Box<dyn ToolTrait + Send + Sync>;

/// A tool implemented in this process
#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> Result<String>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.parameters())
    }
}

/// Capability provider backed by registered `ToolTrait` implementations
pub struct LocalCapabilities {
    tools: HashMap<String, BoxedTool>,
}

impl LocalCapabilities {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// The builtin tool set rooted at `workspace`
    pub fn builtin(workspace: &Path) -> Self {
        let mut caps = Self::new();
        builtin::register_builtin_tools(&mut caps, workspace);
        caps
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool));
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for LocalCapabilities {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CapabilityProvider for LocalCapabilities {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(descriptors)
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<String> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| CapabilityError::NotFound(name.to_string()))?;
        debug!("local tool {} args={}", name, arguments);
        tool.execute(arguments).await
    }
}
