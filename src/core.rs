//! Core traits and data types shared by every runtime object.
use crate::error::CldResult;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

/// One acquisition sample: a timestamp plus one value per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct DataRecord {
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Channel name and value pairs, in acquisition order.
    pub values: Vec<(String, f64)>,
}

impl DataRecord {
    /// Create a record stamped with the current time.
    pub fn now(values: Vec<(String, f64)>) -> Self {
        Self {
            timestamp: Utc::now(),
            values,
        }
    }

    /// Value recorded for `channel`, if any.
    pub fn value(&self, channel: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(name, _)| name == channel)
            .map(|(_, value)| *value)
    }
}

/// Lifecycle state of a log component.
///
/// ```text
/// Closed → Open → Running → Stopped → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// No file handle held.
    #[default]
    Closed,
    /// File open, not accepting writes yet.
    Open,
    /// Accepting writes.
    Running,
    /// File still open but inactive; ready to rotate.
    Stopped,
}

impl LifecycleState {
    /// True while a file handle is held.
    pub fn holds_file(&self) -> bool {
        !matches!(self, LifecycleState::Closed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Closed => write!(f, "closed"),
            LifecycleState::Open => write!(f, "open"),
            LifecycleState::Running => write!(f, "running"),
            LifecycleState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Anything reachable by name through the registry.
pub trait Named {
    /// The unique name the object was registered under.
    fn name(&self) -> &str;
}

/// The open/run/stop/rotate lifecycle.
///
/// Every transition is a single step of the chain documented on [`LifecycleState`];
/// anything else fails with [`InvalidState`](crate::error::CldError::InvalidState).
pub trait Lifecycle: Named + Send + Sync {
    /// Closed → Open.
    fn open(&self) -> CldResult<()>;

    /// Open → Running.
    fn run(&self) -> CldResult<()>;

    /// Running → Stopped. Returns only after any in-flight write has completed.
    fn stop(&self) -> CldResult<()>;

    /// Stopped → Closed, archiving the file. Returns the archive path.
    fn rotate(&self, archive: bool) -> CldResult<PathBuf>;

    /// Current state.
    fn current_state(&self) -> LifecycleState;
}
