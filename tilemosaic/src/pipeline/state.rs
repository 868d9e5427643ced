//! Run lifecycle.

use std::fmt;

/// Phase of a mosaic run.
///
/// ```text
/// Idle -> PreparingScratch -> Planning -> Fetching -> Assembling -> CleaningUp -> Done
///                                                                        \-> Failed
/// ```
///
/// Any phase can divert to `CleaningUp` and then `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    PreparingScratch,
    Planning,
    /// Tiles are being fetched and georeferenced
    Fetching { total: usize },
    Assembling,
    CleaningUp,
    Done,
    Failed,
}

impl RunState {
    /// True for `Done` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::PreparingScratch => write!(f, "preparing scratch"),
            RunState::Planning => write!(f, "planning"),
            RunState::Fetching { total } => write!(f, "fetching {} tiles", total),
            RunState::Assembling => write!(f, "assembling"),
            RunState::CleaningUp => write!(f, "cleaning up"),
            RunState::Done => write!(f, "done"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}
