use serde_json::Value;

use crate::error::Result;
use crate::vm::VmInspectionClient;

/// Captures what the UI framework itself believes it is rendering, via the
/// VM Inspection Client, scoped to a single isolate.
pub struct FrameworkCamera<'a> {
    vm: &'a mut VmInspectionClient,
    isolate_id: String,
}

impl<'a> FrameworkCamera<'a> {
    pub fn new(vm: &'a mut VmInspectionClient, isolate_id: impl Into<String>) -> Self {
        Self {
            vm,
            isolate_id: isolate_id.into(),
        }
    }

    pub async fn capture_screenshot(&mut self) -> Result<Vec<u8>> {
        self.vm.take_screenshot(&self.isolate_id).await
    }

    pub async fn get_widget_tree(&mut self, summary: bool) -> Result<Value> {
        self.vm.get_widget_tree(&self.isolate_id, summary).await
    }

    pub async fn get_semantics_tree(&mut self) -> Result<Value> {
        self.vm.get_semantics_tree(&self.isolate_id).await
    }

    /// Captures screenshot, widget tree, and semantics tree in one call.
    pub async fn capture_all(&mut self) -> Result<(Vec<u8>, Value, Value)> {
        let screenshot = self.vm.take_screenshot(&self.isolate_id).await?;
        let widget_tree = self.vm.get_widget_tree(&self.isolate_id, true).await?;
        let semantics_tree = self.vm.get_semantics_tree(&self.isolate_id).await?;
        Ok((screenshot, widget_tree, semantics_tree))
    }
}
