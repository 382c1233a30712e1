//! Scene Executor: the top-level coordinator. Consumes a [`Scene`], runs
//! setup, walks its steps in order, and routes each step to either the
//! Interaction Controller or the Observation Bundle Assembler.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::adb::AdbClient;
use crate::barrier::{BarrierResult, VisualStabilityBarrier};
use crate::camera::{DeviceCamera, FrameworkCamera};
use crate::error::{EngineError, Result};
use crate::events::ExecutionEventSender;
use crate::interaction::{InteractionController, POST_INTERACTION_SETTLE};
use crate::model::{
    Interaction, ObservationBundle, Scene, SessionState, StabilityStatus, Step,
};
use crate::observation::ObservationBuilder;
use crate::session::Session;
use crate::vm::VmInspectionClient;
use crate::widget_tree;

/// One recorded step failure.
#[derive(Debug, Clone)]
pub struct StepError {
    pub step_index: usize,
    pub message: String,
}

/// Result of a full `execute(scene)` run.
#[derive(Debug)]
pub struct SceneResult {
    pub scene_name: String,
    pub observations: Vec<ObservationBundle>,
    pub errors: Vec<StepError>,
    pub elapsed: Duration,
    pub success: bool,
}

/// Bound at construction to a session, an ADB Client, a device id, and an
/// output directory. A VM Inspection Client (and the Framework Camera it
/// backs) may be attached later via [`SceneExecutor::connect_vm_service`].
pub struct SceneExecutor<'a> {
    session: &'a mut Session,
    adb: &'a AdbClient,
    device_id: String,
    output_dir: std::path::PathBuf,
    vm: Option<&'a mut VmInspectionClient>,
    isolate_id: Option<String>,
    events: ExecutionEventSender,
}

impl<'a> SceneExecutor<'a> {
    pub fn new(
        session: &'a mut Session,
        adb: &'a AdbClient,
        device_id: impl Into<String>,
        output_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self {
            session,
            adb,
            device_id: device_id.into(),
            output_dir: output_dir.into(),
            vm: None,
            isolate_id: None,
            events: ExecutionEventSender::none(),
        }
    }

    pub fn with_events(mut self, events: ExecutionEventSender) -> Self {
        self.events = events;
        self
    }

    /// Attaches a VM Inspection Client, enabling the Framework Camera and
    /// label/text-based taps for the remainder of this executor's life.
    pub fn connect_vm_service(mut self, vm: &'a mut VmInspectionClient, isolate_id: impl Into<String>) -> Self {
        self.vm = Some(vm);
        self.isolate_id = Some(isolate_id.into());
        self
    }

    fn framework_camera(&mut self) -> Option<FrameworkCamera<'_>> {
        let isolate_id = self.isolate_id.clone()?;
        let vm = self.vm.as_deref_mut()?;
        Some(FrameworkCamera::new(vm, isolate_id))
    }

    pub async fn execute(&mut self, scene: &Scene) -> Result<SceneResult> {
        scene.validate()?;

        self.events.scene_started(&scene.name, scene.steps.len());
        let start = Instant::now();

        self.run_setup(scene).await?;

        let mut observations = Vec::new();
        let mut errors = Vec::new();

        for (index, step) in scene.steps.iter().enumerate() {
            let kind = step_kind(step);
            self.events.step_started(index, kind);

            let outcome = self.run_step(scene, index, step).await;
            match outcome {
                Ok(Some(bundle)) => {
                    self.events
                        .checkpoint_captured(index, &bundle.checkpoint_name, bundle.metadata.overlay_present);
                    observations.push(bundle);
                    self.events.step_completed(index);
                }
                Ok(None) => {
                    self.events.step_completed(index);
                }
                Err(e) => {
                    let message = e.to_string();
                    self.events.step_failed(index, &message);
                    errors.push(StepError {
                        step_index: index,
                        message,
                    });
                }
            }
        }

        let elapsed = start.elapsed();
        let success = errors.is_empty();
        self.events
            .scene_completed(&scene.name, errors.len(), elapsed);

        Ok(SceneResult {
            scene_name: scene.name.clone(),
            observations,
            errors,
            elapsed,
            success,
        })
    }

    async fn run_setup(&mut self, scene: &Scene) -> Result<()> {
        if scene.setup.hot_restart {
            self.session.hot_restart(Duration::from_secs(30)).await?;
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        if let Some(target) = &scene.setup.navigate_to {
            self.events
                .log(&format!("navigate_to({target}) is a documented no-op in the core"));
        }

        if let Some(delay_ms) = scene.setup.setup_delay_ms {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        Ok(())
    }

    async fn run_step(
        &mut self,
        scene: &Scene,
        index: usize,
        step: &Step,
    ) -> Result<Option<ObservationBundle>> {
        match step {
            Step::Checkpoint(checkpoint) => {
                let bundle = self.capture_checkpoint(scene, checkpoint).await?;
                Ok(Some(bundle))
            }
            Step::Interaction(interaction) => {
                self.run_interaction(scene, index, interaction).await?;
                Ok(None)
            }
        }
    }

    async fn run_interaction(
        &mut self,
        scene: &Scene,
        index: usize,
        interaction: &Interaction,
    ) -> Result<()> {
        match interaction {
            Interaction::WaitForBarrier {
                barrier_type,
                timeout_override_ms,
            } => {
                self.run_wait_for_barrier(scene, barrier_type, *timeout_override_ms)
                    .await;
                self.events.interaction_completed(index, "wait_for_barrier", Duration::ZERO);
                Ok(())
            }
            Interaction::TapByLabel { label, occurrence, within } => {
                let start = Instant::now();
                self.resolve_and_tap(label, true, *occurrence, within.as_deref())
                    .await?;
                self.events
                    .interaction_completed(index, "tap_by_label", start.elapsed());
                Ok(())
            }
            Interaction::TapByText { text, occurrence, within } => {
                let start = Instant::now();
                self.resolve_and_tap(text, false, *occurrence, within.as_deref())
                    .await?;
                self.events
                    .interaction_completed(index, "tap_by_text", start.elapsed());
                Ok(())
            }
            other => {
                let controller = InteractionController::new(self.adb, &self.device_id);
                let outcome = controller.dispatch(other).await?;
                self.events
                    .interaction_completed(index, outcome.kind, outcome.duration);
                Ok(())
            }
        }
    }

    async fn run_wait_for_barrier(&mut self, scene: &Scene, barrier_type: &str, timeout_override_ms: Option<u64>) {
        let mut config = scene.barrier_config(barrier_type);
        if let Some(ms) = timeout_override_ms {
            config.timeout_ms = crate::model::FlexDuration(ms);
        }

        let result: BarrierResult<()> = match barrier_type {
            "visual_stability" => {
                let barrier = VisualStabilityBarrier::new(self.adb, &self.device_id);
                match barrier.wait(&config).await {
                    BarrierResult::Success { elapsed, .. } => {
                        BarrierResult::Success { value: Some(()), elapsed }
                    }
                    BarrierResult::Timeout { elapsed, diagnostics } => {
                        BarrierResult::Timeout { elapsed, diagnostics }
                    }
                    BarrierResult::Failure { elapsed, error, diagnostics } => {
                        BarrierResult::Failure { elapsed, error, diagnostics }
                    }
                }
            }
            "delay" => {
                tokio::time::sleep(config.timeout_ms.as_duration()).await;
                BarrierResult::Success { value: Some(()), elapsed: config.timeout_ms.as_duration() }
            }
            unknown => {
                self.events
                    .warning(&format!("unknown wait-for-barrier type '{unknown}', skipping"));
                return;
            }
        };

        if let BarrierResult::Timeout { diagnostics, .. } = result {
            self.events
                .warning(&format!("wait-for-barrier '{barrier_type}' timed out: {diagnostics}"));
        }
    }

    async fn resolve_and_tap(
        &mut self,
        target: &str,
        exact: bool,
        occurrence: Option<usize>,
        within: Option<&str>,
    ) -> Result<()> {
        let (width, height) = self.adb.screen_resolution(&self.device_id).await?;

        let tree = {
            let mut camera = self.framework_camera().ok_or_else(|| {
                EngineError::SessionInvariant(
                    "tap_by_label/tap_by_text requires a connected VM Inspection Client".to_string(),
                )
            })?;
            camera.get_semantics_tree().await?
        };

        let candidates = widget_tree::resolve(&tree, target, exact, within, width as i32, height as i32)
            .map_err(EngineError::SceneValidation)?;

        if candidates.is_empty() {
            return Err(EngineError::SceneValidation(format!(
                "no on-screen node matched '{target}'"
            )));
        }
        if candidates.len() > 1 && occurrence.is_none() {
            let listing = candidates
                .iter()
                .enumerate()
                .map(|(i, c)| format!("[{i}] {:?} at {:?}", c.label, c.bounds))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(EngineError::Ambiguity(format!(
                "{} candidates matched '{target}' and no occurrence was specified: {listing}",
                candidates.len()
            )));
        }

        let index = occurrence.unwrap_or(0);
        let chosen = candidates.get(index).ok_or_else(|| {
            EngineError::SceneValidation(format!(
                "occurrence {index} out of range, {} candidates matched '{target}'",
                candidates.len()
            ))
        })?;

        let (x, y) = chosen.bounds.center();
        self.adb.tap(&self.device_id, x, y).await?;
        tokio::time::sleep(POST_INTERACTION_SETTLE).await;
        Ok(())
    }

    async fn capture_checkpoint(
        &mut self,
        scene: &Scene,
        checkpoint: &crate::model::Checkpoint,
    ) -> Result<ObservationBundle> {
        let stability_config = scene.barrier_config("visual_stability");
        let stability_barrier = VisualStabilityBarrier::new(self.adb, &self.device_id);
        let stability_result = stability_barrier.wait(&stability_config).await;
        let (stability_status, barrier_frame) = match stability_result {
            BarrierResult::Success { value, .. } => (StabilityStatus::Stable, value),
            BarrierResult::Timeout { .. } => (StabilityStatus::Unstable, None),
            BarrierResult::Failure { .. } => (StabilityStatus::Unknown, None),
        };

        let mut builder = ObservationBuilder::new(&scene.name, &checkpoint.name, &self.device_id)
            .stability_status(stability_status)
            .reload_id(self.session.reload_count());
        if let Some(description) = &checkpoint.description {
            builder = builder.description(description.clone());
        }

        if checkpoint.device_screenshot {
            match barrier_frame {
                Some(data) => builder = builder.device_screenshot(data),
                None => {
                    let device_camera = DeviceCamera::new(self.adb, &self.device_id);
                    match device_camera.capture().await {
                        Ok(data) => builder = builder.device_screenshot(data),
                        Err(e) => self.events.warning(&format!("device screenshot failed: {e}")),
                    }
                }
            }
        }

        if self.vm.is_some() {
            if checkpoint.framework_screenshot || checkpoint.widget_tree || checkpoint.semantics_tree {
                if let Some(mut camera) = self.framework_camera() {
                    if checkpoint.framework_screenshot {
                        match camera.capture_screenshot().await {
                            Ok(data) => builder = builder.framework_screenshot(data),
                            Err(e) => self.events.warning(&format!("framework screenshot failed: {e}")),
                        }
                    }
                    if checkpoint.widget_tree {
                        match camera.get_widget_tree(true).await {
                            Ok(tree) => builder = builder.widget_tree(tree),
                            Err(e) => self.events.warning(&format!("widget tree capture failed: {e}")),
                        }
                    }
                    if checkpoint.semantics_tree {
                        match camera.get_semantics_tree().await {
                            Ok(tree) => builder = builder.semantics_tree(tree),
                            Err(e) => self.events.warning(&format!("semantics tree capture failed: {e}")),
                        }
                    }
                }
            }
        }

        if checkpoint.logs {
            match self.adb.logcat_dump(&self.device_id).await {
                Ok(dump) => {
                    let tail: Vec<String> = dump.lines().rev().take(50).map(str::to_string).collect();
                    builder = builder.logs(tail.into_iter().rev().collect());
                }
                Err(e) => self.events.warning(&format!("logcat dump failed: {e}")),
            }
        }

        let bundle = builder.build();
        crate::observation::write(&bundle, &self.output_dir).await?;
        Ok(bundle)
    }

    pub fn require_session_running(&self) -> Result<()> {
        if self.session.state() != SessionState::Running {
            return Err(EngineError::SessionInvariant(
                "scene executor requires a running session".to_string(),
            ));
        }
        Ok(())
    }
}

fn step_kind(step: &Step) -> &'static str {
    match step {
        Step::Checkpoint(_) => "checkpoint",
        Step::Interaction(interaction) => interaction.kind_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Checkpoint, Scene, SceneSetup, Step};
    use std::collections::HashMap;

    fn minimal_scene() -> Scene {
        Scene {
            name: "min".to_string(),
            description: None,
            setup: SceneSetup::default(),
            steps: vec![Step::Checkpoint(Checkpoint::new("only"))],
            barriers: HashMap::new(),
        }
    }

    #[test]
    fn step_kind_names_match_spec_vocabulary() {
        let scene = minimal_scene();
        assert_eq!(step_kind(&scene.steps[0]), "checkpoint");
    }
}
