//! Execution events emitted by the Scene Executor for real-time visibility.
//!
//! Consumers (the CLI's terminal renderer, a future web UI) subscribe to
//! the channel instead of polling executor state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while a scene runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionEvent {
    SceneStarted {
        scene_name: String,
        step_count: usize,
    },
    StepStarted {
        index: usize,
        kind: String,
    },
    CheckpointCaptured {
        index: usize,
        checkpoint_name: String,
        overlay_present: bool,
    },
    InteractionCompleted {
        index: usize,
        kind: String,
        #[serde(with = "duration_millis")]
        duration: Duration,
    },
    StepCompleted {
        index: usize,
    },
    StepFailed {
        index: usize,
        error: String,
    },
    SceneCompleted {
        scene_name: String,
        failed_steps: usize,
        #[serde(with = "duration_millis")]
        total_duration: Duration,
    },
    Warning {
        message: String,
    },
    Log {
        message: String,
    },
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

pub type EventSender = mpsc::UnboundedSender<ExecutionEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<ExecutionEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Consistent sending API that is a no-op when nobody is listening.
#[derive(Clone, Default)]
pub struct ExecutionEventSender {
    sender: Option<EventSender>,
}

impl ExecutionEventSender {
    pub fn new(sender: EventSender) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub fn none() -> Self {
        Self { sender: None }
    }

    pub fn is_active(&self) -> bool {
        self.sender.is_some()
    }

    pub fn send(&self, event: ExecutionEvent) {
        if let Some(ref sender) = self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn scene_started(&self, scene_name: &str, step_count: usize) {
        self.send(ExecutionEvent::SceneStarted {
            scene_name: scene_name.to_string(),
            step_count,
        });
    }

    pub fn step_started(&self, index: usize, kind: &str) {
        self.send(ExecutionEvent::StepStarted {
            index,
            kind: kind.to_string(),
        });
    }

    pub fn checkpoint_captured(&self, index: usize, checkpoint_name: &str, overlay_present: bool) {
        self.send(ExecutionEvent::CheckpointCaptured {
            index,
            checkpoint_name: checkpoint_name.to_string(),
            overlay_present,
        });
    }

    pub fn interaction_completed(&self, index: usize, kind: &str, duration: Duration) {
        self.send(ExecutionEvent::InteractionCompleted {
            index,
            kind: kind.to_string(),
            duration,
        });
    }

    pub fn step_completed(&self, index: usize) {
        self.send(ExecutionEvent::StepCompleted { index });
    }

    pub fn step_failed(&self, index: usize, error: &str) {
        self.send(ExecutionEvent::StepFailed {
            index,
            error: error.to_string(),
        });
    }

    pub fn scene_completed(&self, scene_name: &str, failed_steps: usize, total_duration: Duration) {
        self.send(ExecutionEvent::SceneCompleted {
            scene_name: scene_name.to_string(),
            failed_steps,
            total_duration,
        });
    }

    pub fn warning(&self, message: &str) {
        self.send(ExecutionEvent::Warning {
            message: message.to_string(),
        });
    }

    pub fn log(&self, message: &str) {
        self.send(ExecutionEvent::Log {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_delivers_events_in_order() {
        let (tx, mut rx) = event_channel();
        let sender = ExecutionEventSender::new(tx);

        sender.scene_started("login", 3);
        sender.step_started(0, "tap");

        assert!(matches!(
            rx.recv().await.unwrap(),
            ExecutionEvent::SceneStarted { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            ExecutionEvent::StepStarted { .. }
        ));
    }

    #[test]
    fn noop_sender_does_not_panic() {
        let sender = ExecutionEventSender::none();
        assert!(!sender.is_active());
        sender.warning("nothing is listening");
    }

    #[test]
    fn serializes_with_snake_case_tag() {
        let event = ExecutionEvent::StepFailed {
            index: 2,
            error: "timed out".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"step_failed\""));
    }
}
