// Observable per-block data state

use crate::source::{FetchError, Resolution};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// What a block renders: data, loading flag and error, in one value.
///
/// Failures keep the last good value so a block can show stale data next to
/// an error indicator instead of going blank.
#[derive(Clone, Debug, PartialEq)]
pub enum BindingState {
    /// No descriptor bound, or the source has nothing to bind
    Idle,
    /// A resolve is in flight; `last` is what was displayed before it
    Loading { last: Option<Value> },
    Ready {
        value: Value,
        updated_at: DateTime<Utc>,
    },
    Failed {
        error: FetchError,
        last: Option<Value>,
        updated_at: DateTime<Utc>,
    },
}

impl Default for BindingState {
    fn default() -> Self {
        BindingState::Idle
    }
}

impl BindingState {
    /// Value to display, possibly stale.
    pub fn data(&self) -> Option<&Value> {
        match self {
            BindingState::Idle => None,
            BindingState::Loading { last } | BindingState::Failed { last, .. } => last.as_ref(),
            BindingState::Ready { value, .. } => Some(value),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, BindingState::Loading { .. })
    }

    pub fn error(&self) -> Option<&FetchError> {
        match self {
            BindingState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, BindingState::Idle)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, BindingState::Ready { .. })
    }

    /// When the current data or error landed.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        match self {
            BindingState::Ready { updated_at, .. } | BindingState::Failed { updated_at, .. } => {
                Some(*updated_at)
            }
            _ => None,
        }
    }

    /// Mark a dispatch, keeping whatever is on screen.
    pub(crate) fn begin_loading(&mut self) {
        let last = self.data().cloned();
        *self = BindingState::Loading { last };
    }

    /// Apply the outcome of one resolve call.
    pub(crate) fn settle(&mut self, outcome: Result<Resolution, FetchError>) {
        let now = Utc::now();
        *self = match outcome {
            Ok(Resolution::Data(value)) => BindingState::Ready {
                value,
                updated_at: now,
            },
            Ok(Resolution::Nothing) => BindingState::Idle,
            Err(error) => BindingState::Failed {
                error,
                last: self.data().cloned(),
                updated_at: now,
            },
        };
    }
}
