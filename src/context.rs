//! Application context.
//!
//! Everything the control path needs (settings, the built registry and the acquisition
//! controller) is constructed once at startup and handed around as a [`Context`].

use crate::acquisition::{AcquisitionController, SampleSource, SimulatedSource};
use crate::builder::ObjectBuilder;
use crate::config::Settings;
use crate::core::{Lifecycle, LifecycleState};
use crate::document::{self, ConfigurationDocument};
use crate::error::{CldError, CldResult};
use crate::log_file::LogComponent;
use crate::object::RuntimeObject;
use crate::registry::ObjectRegistry;
use crate::toggle::{handle_toggle, stop_and_archive, LogTarget};
use std::sync::Arc;
use tracing::{error, info};

/// Settings, registry and acquisition controller for one running application.
pub struct Context {
    settings: Arc<Settings>,
    registry: Arc<ObjectRegistry>,
    controller: AcquisitionController,
}

impl Context {
    /// Load the object document named in `settings` and build the context.
    pub fn new(settings: Settings) -> CldResult<Self> {
        let document = document::load_file(&settings.objects.path)?;
        Self::from_document(settings, &document)
    }

    /// Build the context from an already loaded document.
    pub fn from_document(settings: Settings, document: &ConfigurationDocument) -> CldResult<Self> {
        settings.validate()?;

        let registry = ObjectBuilder::new()
            .with_timestamp_format(&settings.archive.timestamp_format)
            .build(document)?;

        let source = match settings.acquisition.seed {
            Some(seed) => SimulatedSource::seeded(seed),
            None => SimulatedSource::new(),
        };
        let controller =
            AcquisitionController::new(settings.acquisition.interval()).with_source(source);

        info!(
            application = %settings.application.name,
            objects = registry.len(),
            "Context ready"
        );

        Ok(Self {
            settings: Arc::new(settings),
            registry: Arc::new(registry),
            controller,
        })
    }

    /// Replace the sample source. Only takes effect for sessions started afterwards.
    pub fn with_source(mut self, source: impl SampleSource + 'static) -> Self {
        let controller = std::mem::take(&mut self.controller);
        self.controller = controller.with_source(source);
        self
    }

    /// The loaded settings.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// The object registry.
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// The acquisition controller.
    pub fn controller(&self) -> &AcquisitionController {
        &self.controller
    }

    /// Look up any object by name.
    pub fn get_object(&self, name: &str) -> Option<&RuntimeObject> {
        self.registry.get(name)
    }

    /// Look up a log by name.
    pub fn log(&self, name: &str) -> Option<&LogComponent> {
        self.registry.log(name)
    }

    /// Indented listing of the registry.
    pub fn describe(&self) -> String {
        self.registry.describe()
    }

    /// True while acquisition is running.
    pub fn is_logging(&self) -> bool {
        self.controller.is_active()
    }

    /// The logs `target` refers to.
    pub fn resolve(&self, target: &LogTarget) -> CldResult<Vec<&LogComponent>> {
        match target {
            LogTarget::All => Ok(self.registry.logs().map(|(_, log)| log).collect()),
            LogTarget::First => self
                .registry
                .logs()
                .next()
                .map(|(_, log)| vec![log])
                .ok_or_else(|| CldError::NotFound("no log objects configured".to_string())),
            LogTarget::Named(name) => self
                .registry
                .log(name)
                .map(|log| vec![log])
                .ok_or_else(|| CldError::NotFound(name.clone())),
        }
    }

    /// Turn logging on or off for `target`.
    pub fn set_logging(&self, active: bool, target: &LogTarget) -> CldResult<()> {
        let logs: Vec<&dyn Lifecycle> = self
            .resolve(target)?
            .into_iter()
            .map(|log| log as &dyn Lifecycle)
            .collect();
        handle_toggle(active, &logs, &self.controller, &self.registry)
    }

    /// Turn logging on for `target`, or leave nothing running if any part fails.
    ///
    /// On failure every log that did come up is stopped and archived before the
    /// original error is returned.
    pub fn start_logging(&self, target: &LogTarget) -> CldResult<()> {
        let started = self.set_logging(true, target);
        if started.is_err() {
            if let Err(e) = self.shutdown() {
                error!(error = %e, "Failed to roll back a partial start");
            }
        }
        started
    }

    /// Stop acquisition and archive every log that is still running or stopped.
    pub fn shutdown(&self) -> CldResult<()> {
        self.controller.stop()?;

        let mut errors = Vec::new();
        for (name, log) in self.registry.logs() {
            let result = match log.current_state() {
                LifecycleState::Running => stop_and_archive(log),
                LifecycleState::Stopped => log.rotate(true).map(drop),
                LifecycleState::Closed | LifecycleState::Open => continue,
            };
            if let Err(e) = result {
                error!(log = name, error = %e, "Failed to archive log on shutdown");
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CldError::ToggleFailed(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    fn document_in(dir: &Path) -> ConfigurationDocument {
        let dir = dir.display().to_string().replace('\\', "/");
        document::load(&format!(
            r#"
            [[object]]
            id = "logctl0"
            type = "controller"
            properties = {{ ctype = "log" }}

              [[object.object]]
              id = "log0"
              type = "log"
              properties = {{ path = "{dir}", file = "first.csv" }}

              [[object.object]]
              id = "log1"
              type = "log"
              properties = {{ path = "{dir}", file = "second.csv" }}

            [[object]]
            id = "ai0"
            type = "channel"
            "#
        ))
        .unwrap()
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.acquisition.interval_ms = 5;
        settings.acquisition.seed = Some(1);
        settings
    }

    #[test]
    fn first_target_only_touches_the_first_log() {
        let dir = tempdir().unwrap();
        let context = Context::from_document(settings(), &document_in(dir.path())).unwrap();

        context.set_logging(true, &LogTarget::First).unwrap();
        assert!(context.is_logging());
        assert_eq!(context.log("log0").unwrap().current_state(), LifecycleState::Running);
        assert_eq!(context.log("log1").unwrap().current_state(), LifecycleState::Closed);

        context.set_logging(false, &LogTarget::First).unwrap();
        assert!(!context.is_logging());
        assert_eq!(context.log("log0").unwrap().current_state(), LifecycleState::Closed);
    }

    #[test]
    fn unknown_target_is_not_found() {
        let dir = tempdir().unwrap();
        let context = Context::from_document(settings(), &document_in(dir.path())).unwrap();
        let err = context
            .set_logging(true, &LogTarget::Named("log9".into()))
            .unwrap_err();
        assert!(matches!(err, CldError::NotFound(name) if name == "log9"));
        assert!(!context.is_logging());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let dir = tempdir().unwrap();
        let mut bad = settings();
        bad.acquisition.interval_ms = 0;
        assert!(matches!(
            Context::from_document(bad, &document_in(dir.path())),
            Err(CldError::Configuration(_))
        ));
    }

    #[test]
    fn shutdown_archives_running_logs() {
        let dir = tempdir().unwrap();
        let context = Context::from_document(settings(), &document_in(dir.path())).unwrap();
        context.set_logging(true, &LogTarget::All).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        context.shutdown().unwrap();
        assert!(!context.is_logging());
        for (_, log) in context.registry().logs() {
            assert_eq!(log.current_state(), LifecycleState::Closed);
        }
        assert!(!dir.path().join("first.csv").exists());
        assert!(!dir.path().join("second.csv").exists());
    }

    #[test]
    fn partial_start_is_rolled_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().display().to_string().replace('\\', "/");
        let doc = document::load(&format!(
            r#"
            [[object]]
            id = "log0"
            type = "log"
            properties = {{ path = "{path}", file = "first.csv" }}

            [[object]]
            id = "log1"
            type = "log"
            properties = {{ path = "{path}/missing", file = "second.csv" }}
            "#
        ))
        .unwrap();
        let context = Context::from_document(settings(), &doc).unwrap();

        let err = context.start_logging(&LogTarget::All).unwrap_err();
        assert!(matches!(err, CldError::ToggleFailed(_)));
        assert!(!context.is_logging());
        assert_eq!(context.log("log0").unwrap().current_state(), LifecycleState::Closed);
        assert_eq!(context.log("log1").unwrap().current_state(), LifecycleState::Closed);
        assert!(!dir.path().join("first.csv").exists());
    }

    #[test]
    fn shutdown_rotates_a_stopped_log() {
        let dir = tempdir().unwrap();
        let context = Context::from_document(settings(), &document_in(dir.path())).unwrap();
        let log = context.log("log1").unwrap();
        log.open().unwrap();
        log.run().unwrap();
        log.stop().unwrap();

        context.shutdown().unwrap();
        assert_eq!(log.current_state(), LifecycleState::Closed);
        assert!(!dir.path().join("second.csv").exists());
    }

    #[test]
    fn objects_are_reachable_by_name() {
        let dir = tempdir().unwrap();
        let context = Context::from_document(settings(), &document_in(dir.path())).unwrap();
        assert_eq!(context.get_object("ai0").map(RuntimeObject::type_tag), Some("channel"));
        assert!(context.describe().contains("  log1 [log]"));
    }
}
