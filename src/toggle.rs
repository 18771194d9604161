//! Activate/deactivate handler behind the logging toggle.
//!
//! Turning logging on opens and runs each target log, then starts acquisition.
//! Turning it off stops acquisition first, so the thread is joined before any log is
//! stopped, then stops each log and rotates it into a timestamped archive.
//!
//! Every log is attempted even if an earlier one fails; failures are returned together
//! as [`CldError::ToggleFailed`].

use crate::acquisition::AcquisitionController;
use crate::core::{Lifecycle, LifecycleState};
use crate::error::{CldError, CldResult};
use crate::registry::ObjectRegistry;
use std::sync::Arc;
use tracing::{info, warn};

/// Which logs a toggle applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    /// Every log in the registry.
    #[default]
    All,
    /// The first log in document order.
    First,
    /// One log by name.
    Named(String),
}

/// Handle a toggle event.
pub fn handle_toggle(
    active: bool,
    logs: &[&dyn Lifecycle],
    controller: &AcquisitionController,
    registry: &Arc<ObjectRegistry>,
) -> CldResult<()> {
    let mut errors = Vec::new();

    if active {
        for log in logs {
            if let Err(e) = log.open().and_then(|()| log.run()) {
                warn!(log = log.name(), error = %e, "Could not start log");
                errors.push(e);
            }
        }
        if controller.is_active() {
            info!("Acquisition already active");
        } else if let Err(e) = controller.start(Arc::clone(registry)) {
            errors.push(e);
        }
    } else {
        if let Err(e) = controller.stop() {
            errors.push(e);
        }
        for log in logs {
            errors.extend(stop_and_archive(*log).err());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CldError::ToggleFailed(errors))
    }
}

/// Stop `log` and rotate it into a timestamped archive.
///
/// A log left Stopped is rotated even when `stop` itself reported a failure, so a
/// failing sink never keeps the log from returning to Closed.
pub(crate) fn stop_and_archive(log: &dyn Lifecycle) -> CldResult<()> {
    let stopped = log.stop();
    if let Err(e) = &stopped {
        warn!(log = log.name(), error = %e, "Could not stop log cleanly");
    }
    if log.current_state() != LifecycleState::Stopped {
        return stopped;
    }

    match log.rotate(true) {
        Ok(archive) => {
            info!(log = log.name(), archive = %archive.display(), "Log archived");
            stopped
        }
        Err(e) => {
            warn!(log = log.name(), error = %e, "Could not archive log");
            // The stop failure came first and explains the rotate failure.
            stopped.and(Err(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::document::load;
    use std::time::Duration;
    use tempfile::tempdir;

    fn registry_in(dir: &std::path::Path) -> Arc<ObjectRegistry> {
        let source = format!(
            r#"
            [[object]]
            id = "log0"
            type = "log"
            properties = {{ path = "{0}", file = "a.csv" }}

            [[object]]
            id = "log1"
            type = "log"
            properties = {{ path = "{0}/missing", file = "b.csv" }}

            [[object]]
            id = "ai0"
            type = "channel"
            "#,
            dir.display().to_string().replace('\\', "/")
        );
        Arc::new(build(&load(&source).unwrap()).unwrap())
    }

    #[test]
    fn on_then_off_archives_the_log() {
        let dir = tempdir().unwrap();
        let registry = registry_in(dir.path());
        let controller = AcquisitionController::new(Duration::from_millis(5));
        let log = registry.log("log0").unwrap();
        let targets: [&dyn Lifecycle; 1] = [log];

        handle_toggle(true, &targets, &controller, &registry).unwrap();
        assert!(controller.is_active());
        assert_eq!(log.current_state(), LifecycleState::Running);

        handle_toggle(false, &targets, &controller, &registry).unwrap();
        assert!(!controller.is_active());
        assert_eq!(log.current_state(), LifecycleState::Closed);
        assert!(!dir.path().join("a.csv").exists());
    }

    #[test]
    fn failures_are_collected_per_log() {
        let dir = tempdir().unwrap();
        let registry = registry_in(dir.path());
        let controller = AcquisitionController::new(Duration::from_millis(5));
        let logs: Vec<&dyn Lifecycle> = registry
            .logs()
            .map(|(_, log)| log as &dyn Lifecycle)
            .collect();

        let err = handle_toggle(true, &logs, &controller, &registry).unwrap_err();
        match err {
            CldError::ToggleFailed(errors) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(errors[0], CldError::FileOpen { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
        // The healthy log and the controller still came up.
        assert_eq!(logs[0].current_state(), LifecycleState::Running);
        assert!(controller.is_active());
        controller.stop().unwrap();
    }
}
