//! Mode selection shared by every stream.
//!
//! One [`TaskState`] exists per running server and is written by control
//! requests. Frame cycles hold a [`TaskReader`] and take one
//! [`TaskSnapshot`] per frame, so effect and mirror flag are always read as a
//! pair. All streams see the same mode; there is no per-stream isolation.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

use crate::error::ControlError;

/// Per-frame transform selected by control requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    None,
    Cartoon,
    Edges,
    Rotate,
    #[serde(alias = "object detection")]
    Detect,
}

impl Effect {
    pub const ALL: [Effect; 5] = [
        Effect::None,
        Effect::Cartoon,
        Effect::Edges,
        Effect::Rotate,
        Effect::Detect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Cartoon => "cartoon",
            Effect::Edges => "edges",
            Effect::Rotate => "rotate",
            Effect::Detect => "detect",
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Effect {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" => Ok(Effect::None),
            "cartoon" => Ok(Effect::Cartoon),
            "edges" => Ok(Effect::Edges),
            "rotate" => Ok(Effect::Rotate),
            "detect" | "object detection" => Ok(Effect::Detect),
            other => Err(ControlError::UnknownEffect(other.to_string())),
        }
    }
}

/// Effect and mirror flag as observed by one frame cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub effect: Effect,
    pub mirror: bool,
}

/// Writer handle. Cloning shares the same underlying state.
#[derive(Clone)]
pub struct TaskState {
    current: Arc<ArcSwap<TaskSnapshot>>,
}

impl TaskState {
    pub fn new(initial: TaskSnapshot) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(initial)),
        }
    }

    pub fn current(&self) -> TaskSnapshot {
        **self.current.load()
    }

    pub fn set_effect(&self, effect: Effect) {
        self.current.rcu(|prev| TaskSnapshot { effect, ..**prev });
    }

    pub fn set_mirror(&self, mirror: bool) {
        self.current.rcu(|prev| TaskSnapshot { mirror, ..**prev });
    }

    /// Replace both fields in one step.
    pub fn set(&self, snapshot: TaskSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    pub fn reader(&self) -> TaskReader {
        TaskReader {
            current: self.current.clone(),
        }
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new(TaskSnapshot::default())
    }
}

impl fmt::Debug for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskState").field(&self.current()).finish()
    }
}

/// Read-only handle given to frame cycles
#[derive(Clone)]
pub struct TaskReader {
    current: Arc<ArcSwap<TaskSnapshot>>,
}

impl TaskReader {
    pub fn current(&self) -> TaskSnapshot {
        **self.current.load()
    }
}

impl fmt::Debug for TaskReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TaskReader").field(&self.current()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn parses_effect_names() {
        for effect in Effect::ALL {
            assert_eq!(effect.as_str().parse::<Effect>().unwrap(), effect);
        }
        assert_eq!("object detection".parse::<Effect>().unwrap(), Effect::Detect);
        assert!(matches!(
            "sepia".parse::<Effect>(),
            Err(ControlError::UnknownEffect(name)) if name == "sepia"
        ));
    }

    #[test]
    fn setters_keep_the_other_field() {
        let state = TaskState::default();
        let reader = state.reader();

        state.set_mirror(true);
        state.set_effect(Effect::Edges);
        assert_eq!(
            reader.current(),
            TaskSnapshot {
                effect: Effect::Edges,
                mirror: true
            }
        );

        state.set_mirror(false);
        assert_eq!(reader.current().effect, Effect::Edges);
    }

    #[test]
    fn readers_never_observe_a_torn_pair() {
        let state = TaskState::default();
        let a = TaskSnapshot {
            effect: Effect::Cartoon,
            mirror: true,
        };
        let b = TaskSnapshot {
            effect: Effect::Edges,
            mirror: false,
        };
        state.set(a);

        let done = Arc::new(AtomicBool::new(false));
        let writers: Vec<_> = (0..2)
            .map(|_| {
                let state = state.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut flip = false;
                    while !done.load(Ordering::Relaxed) {
                        state.set(if flip { a } else { b });
                        flip = !flip;
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let reader = state.reader();
                thread::spawn(move || {
                    for _ in 0..20_000 {
                        let seen = reader.current();
                        assert!(seen == a || seen == b, "torn snapshot: {seen:?}");
                    }
                })
            })
            .collect();

        for reader in readers {
            reader.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        for writer in writers {
            writer.join().unwrap();
        }
    }

    #[test]
    fn concurrent_setters_do_not_lose_updates() {
        let state = TaskState::default();
        let effect_writer = {
            let state = state.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    state.set_effect(Effect::Rotate);
                }
            })
        };
        let mirror_writer = {
            let state = state.clone();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    state.set_mirror(true);
                }
            })
        };
        effect_writer.join().unwrap();
        mirror_writer.join().unwrap();

        assert_eq!(
            state.current(),
            TaskSnapshot {
                effect: Effect::Rotate,
                mirror: true
            }
        );
    }
}
