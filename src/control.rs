//! Boundary between control requests and the shared task state.
//!
//! Requests are validated here; a rejected request leaves the state as it
//! was. Accepted requests apply to every stream from its next frame on.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ControlError;
use crate::pipeline::state::{Effect, TaskSnapshot, TaskState};

/// A control request as received over JSON.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ControlRequest {
    Task { task: String },
    Mirror { mirror: MirrorValue },
}

/// Mirror flag as sent by clients: a JSON bool or its string spelling.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MirrorValue {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Task { task_received: Effect },
    Mirror { mirror_received: bool },
}

/// Writer side of the task state, handed to whatever receives requests.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    state: TaskState,
}

impl ControlSurface {
    pub fn new(state: TaskState) -> Self {
        Self { state }
    }

    pub fn current(&self) -> TaskSnapshot {
        self.state.current()
    }

    pub fn set_effect(&self, name: &str) -> Result<Effect, ControlError> {
        let effect = name.parse::<Effect>()?;
        self.state.set_effect(effect);
        info!(%effect, "Effect changed");
        Ok(effect)
    }

    pub fn set_mirror(&self, value: &str) -> Result<bool, ControlError> {
        let mirror = match value.trim() {
            "true" => true,
            "false" => false,
            other => return Err(ControlError::InvalidMirror(other.to_string())),
        };
        self.apply_mirror(mirror);
        Ok(mirror)
    }

    pub fn handle(&self, request: ControlRequest) -> Result<ControlResponse, ControlError> {
        match request {
            ControlRequest::Task { task } => {
                let effect = self.set_effect(&task)?;
                Ok(ControlResponse::Task {
                    task_received: effect,
                })
            }
            ControlRequest::Mirror {
                mirror: MirrorValue::Bool(mirror),
            } => {
                self.apply_mirror(mirror);
                Ok(ControlResponse::Mirror {
                    mirror_received: mirror,
                })
            }
            ControlRequest::Mirror {
                mirror: MirrorValue::Text(text),
            } => {
                let mirror = self.set_mirror(&text)?;
                Ok(ControlResponse::Mirror {
                    mirror_received: mirror,
                })
            }
        }
    }

    /// Parse and apply one JSON request.
    pub fn handle_json(&self, body: &str) -> Result<ControlResponse, ControlError> {
        let request = serde_json::from_str::<ControlRequest>(body).map_err(|err| {
            warn!("Rejected control request: {err}");
            ControlError::from(err)
        })?;
        self.handle(request)
    }

    fn apply_mirror(&self, mirror: bool) {
        self.state.set_mirror(mirror);
        info!(mirror, "Mirror changed");
    }
}
