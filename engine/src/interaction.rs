//! Interaction Controller: the pure dispatch layer between a resolved
//! [`Interaction`] and the ADB Client. Label/text resolution against a
//! widget tree happens one level up, in the Scene Executor — this module
//! only ever sees concrete coordinates, text, or key codes.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::adb::AdbClient;
use crate::error::{EngineError, Result};
use crate::model::Interaction;

/// Delay applied after every interaction to let the UI settle before the
/// next step runs or a checkpoint is captured.
pub(crate) const POST_INTERACTION_SETTLE: Duration = Duration::from_millis(100);

/// Outcome of dispatching a single interaction.
#[derive(Debug, Clone)]
pub struct InteractionOutcome {
    pub kind: &'static str,
    pub duration: Duration,
}

pub struct InteractionController<'a> {
    adb: &'a AdbClient,
    device_id: String,
}

impl<'a> InteractionController<'a> {
    pub fn new(adb: &'a AdbClient, device_id: impl Into<String>) -> Self {
        Self {
            adb,
            device_id: device_id.into(),
        }
    }

    /// Dispatches a single interaction and waits out the settle delay.
    /// `tap_by_label`/`tap_by_text` must already have been resolved to a
    /// concrete `Tap` by the caller — they fail fast here if they weren't.
    pub async fn dispatch(&self, interaction: &Interaction) -> Result<InteractionOutcome> {
        let start = Instant::now();
        let kind = interaction.kind_name();

        match interaction {
            Interaction::Tap { x, y } => {
                self.adb.tap(&self.device_id, *x, *y).await?;
            }
            Interaction::Text { text } => {
                self.adb.input_text(&self.device_id, text).await?;
            }
            Interaction::Key { key_code } => {
                self.adb.key_event(&self.device_id, *key_code).await?;
            }
            Interaction::Swipe {
                start_x,
                start_y,
                end_x,
                end_y,
                duration_ms,
            } => {
                self.adb
                    .swipe(&self.device_id, *start_x, *start_y, *end_x, *end_y, *duration_ms)
                    .await?;
            }
            Interaction::WaitForBarrier { .. } => {
                return Err(EngineError::SessionInvariant(
                    "wait_for_barrier must be handled by the scene executor, not dispatched here"
                        .to_string(),
                ));
            }
            Interaction::TapByLabel { label, .. } => {
                return Err(EngineError::SessionInvariant(format!(
                    "tap_by_label({label}) reached the interaction controller unresolved"
                )));
            }
            Interaction::TapByText { text, .. } => {
                return Err(EngineError::SessionInvariant(format!(
                    "tap_by_text({text}) reached the interaction controller unresolved"
                )));
            }
        }

        tokio::time::sleep(POST_INTERACTION_SETTLE).await;

        let duration = start.elapsed();
        debug!(kind, ?duration, "interaction dispatched");
        Ok(InteractionOutcome { kind, duration })
    }
}
