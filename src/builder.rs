//! Object builder: turns a configuration document into a registry.
//!
//! Each type tag maps to a constructor in a fixed factory table. The builder walks the
//! document in order, resolves every node's tag, constructs the runtime object from the
//! node's parameters and registers it under the node's name. Any failure discards
//! everything built so far. No files are touched; log components start Closed.

use crate::document::{ConfigurationDocument, ObjectDescriptor};
use crate::error::{CldError, CldResult};
use crate::log_file::{LogComponent, LogSettings, DEFAULT_TIMESTAMP_FORMAT};
use crate::object::{
    reference_name, Calibration, Channel, Coefficient, Column, Controller, RuntimeObject,
};
use crate::registry::ObjectRegistry;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Defaults applied to objects whose declarations leave a setting out.
#[derive(Debug, Clone)]
pub struct BuildDefaults {
    /// Archive timestamp format for logs without a `format` parameter.
    pub timestamp_format: String,
}

impl Default for BuildDefaults {
    fn default() -> Self {
        Self {
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

type Constructor = fn(&ObjectDescriptor<'_>, &BuildDefaults) -> RuntimeObject;

/// Builds registries from documents.
pub struct ObjectBuilder {
    factories: HashMap<&'static str, Constructor>,
    defaults: BuildDefaults,
}

impl Default for ObjectBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectBuilder {
    /// Builder with every known type tag registered.
    pub fn new() -> Self {
        let mut factories: HashMap<&'static str, Constructor> = HashMap::new();
        factories.insert("controller", build_controller);
        factories.insert("log", build_log);
        factories.insert("column", build_column);
        factories.insert("channel", build_channel);
        factories.insert("calibration", build_calibration);
        factories.insert("coefficient", build_coefficient);

        Self {
            factories,
            defaults: BuildDefaults::default(),
        }
    }

    /// Replace the defaults.
    pub fn with_defaults(mut self, defaults: BuildDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the default archive timestamp format.
    pub fn with_timestamp_format(mut self, format: impl Into<String>) -> Self {
        self.defaults.timestamp_format = format.into();
        self
    }

    /// True if `type_tag` resolves to a constructor.
    pub fn knows(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }

    /// Build every object in `document`. All-or-nothing.
    pub fn build(&self, document: &ConfigurationDocument) -> CldResult<ObjectRegistry> {
        let mut registry = ObjectRegistry::new();

        for descriptor in document.descriptors() {
            let constructor = self.factories.get(descriptor.type_tag()).ok_or_else(|| {
                CldError::UnknownType {
                    name: descriptor.name().to_string(),
                    type_tag: descriptor.type_tag().to_string(),
                }
            })?;

            let object = constructor(&descriptor, &self.defaults);
            registry.insert(descriptor.parent(), object)?;
            debug!(
                name = descriptor.name(),
                type_tag = descriptor.type_tag(),
                "Built object"
            );
        }

        info!(
            objects = registry.len(),
            logs = registry.logs().count(),
            "Built object registry"
        );
        Ok(registry)
    }
}

/// Build `document` with the default builder.
pub fn build(document: &ConfigurationDocument) -> CldResult<ObjectRegistry> {
    ObjectBuilder::new().build(document)
}

/// Parse an optional numeric parameter, warning and falling back on bad input.
fn parse_or<T: FromStr>(descriptor: &ObjectDescriptor<'_>, key: &str, fallback: T) -> T {
    match descriptor.parameter(key) {
        None => fallback,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(
                object = descriptor.name(),
                key,
                value = raw,
                "Unparseable parameter, using default"
            );
            fallback
        }),
    }
}

fn text(descriptor: &ObjectDescriptor<'_>, key: &str) -> Option<String> {
    descriptor.parameter(key).map(str::to_string)
}

fn build_controller(descriptor: &ObjectDescriptor<'_>, _: &BuildDefaults) -> RuntimeObject {
    RuntimeObject::Controller(Controller {
        name: descriptor.name().to_string(),
        kind: text(descriptor, "ctype"),
    })
}

fn build_log(descriptor: &ObjectDescriptor<'_>, defaults: &BuildDefaults) -> RuntimeObject {
    let name = descriptor.name();
    let mut settings = LogSettings::new(name).with_timestamp_format(&defaults.timestamp_format);

    if let Some(path) = descriptor.parameter("path") {
        settings = settings.with_directory(path);
    }
    if let Some(file) = descriptor.parameter("file") {
        settings = settings.with_file(file);
    }
    if let Some(title) = descriptor.parameter("title") {
        settings = settings.with_title(title);
    }
    if let Some(format) = descriptor.parameter("format") {
        settings = settings.with_timestamp_format(format);
    }

    let columns = descriptor
        .children()
        .filter(|child| child.type_tag() == "column")
        .filter_map(|child| child.parameter("chref").map(reference_name))
        .map(str::to_string)
        .collect();

    RuntimeObject::Log(LogComponent::new(name, settings.with_columns(columns)))
}

fn build_column(descriptor: &ObjectDescriptor<'_>, _: &BuildDefaults) -> RuntimeObject {
    RuntimeObject::Column(Column {
        name: descriptor.name().to_string(),
        channel: descriptor
            .parameter("chref")
            .map(|r| reference_name(r).to_string()),
    })
}

fn build_channel(descriptor: &ObjectDescriptor<'_>, _: &BuildDefaults) -> RuntimeObject {
    RuntimeObject::Channel(Channel {
        name: descriptor.name().to_string(),
        tag: text(descriptor, "tag"),
        description: text(descriptor, "desc"),
        number: parse_or(descriptor, "num", 0),
        calibration: descriptor
            .parameter("calref")
            .map(|r| reference_name(r).to_string()),
    })
}

fn build_calibration(descriptor: &ObjectDescriptor<'_>, _: &BuildDefaults) -> RuntimeObject {
    let coefficients = descriptor
        .children()
        .filter(|child| child.type_tag() == "coefficient")
        .map(|child| (parse_or(&child, "n", 0), parse_or(&child, "value", 0.0)))
        .collect();

    RuntimeObject::Calibration(Calibration {
        name: descriptor.name().to_string(),
        units: text(descriptor, "units"),
        coefficients,
    })
}

fn build_coefficient(descriptor: &ObjectDescriptor<'_>, _: &BuildDefaults) -> RuntimeObject {
    RuntimeObject::Coefficient(Coefficient {
        name: descriptor.name().to_string(),
        order: parse_or(descriptor, "n", 0),
        value: parse_or(descriptor, "value", 0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LifecycleState, Named};
    use crate::document::load;
    use std::path::PathBuf;

    const DOCUMENT: &str = r#"
        [[object]]
        id = "logctl0"
        type = "controller"
        properties = { ctype = "log" }

          [[object.object]]
          id = "log0"
          type = "log"
          properties = { title = "Data Log", path = "/tmp/cld", file = "log.dat", format = "%F-%T" }

            [[object.object.object]]
            id = "col0"
            type = "column"
            properties = { chref = "/ai0" }

        [[object]]
        id = "cal0"
        type = "calibration"
        properties = { units = "Volts" }

          [[object.object]]
          id = "cft0"
          type = "coefficient"
          properties = { n = 0, value = "0.5" }

          [[object.object]]
          id = "cft1"
          type = "coefficient"
          properties = { n = 1, value = 2.0 }

        [[object]]
        id = "ai0"
        type = "channel"
        properties = { tag = "IN0", num = "3", calref = "/cal0" }
    "#;

    #[test]
    fn builds_every_declared_object() {
        let doc = load(DOCUMENT).unwrap();
        let registry = build(&doc).unwrap();
        assert_eq!(registry.len(), doc.len());
        for descriptor in doc.descriptors() {
            let object = registry.get(descriptor.name()).unwrap();
            assert_eq!(object.name(), descriptor.name());
            assert_eq!(object.type_tag(), descriptor.type_tag());
        }
    }

    #[test]
    fn log_is_built_closed_with_its_columns() {
        let registry = build(&load(DOCUMENT).unwrap()).unwrap();
        let log = registry.log("log0").unwrap();
        assert_eq!(log.current_state(), LifecycleState::Closed);
        assert_eq!(log.settings().directory, PathBuf::from("/tmp/cld"));
        assert_eq!(log.settings().file_template, "log.dat");
        assert_eq!(log.settings().timestamp_format, "%F-%T");
        assert_eq!(log.settings().columns, ["ai0"]);
        assert!(log.current_path().is_none());
    }

    #[test]
    fn calibration_collects_coefficients() {
        let registry = build(&load(DOCUMENT).unwrap()).unwrap();
        let cal = registry.get("cal0").and_then(RuntimeObject::as_calibration).unwrap();
        assert_eq!(cal.coefficients(), [(0, 0.5), (1, 2.0)]);
        assert_eq!(cal.units(), Some("Volts"));

        let channel = registry.get("ai0").and_then(RuntimeObject::as_channel).unwrap();
        assert_eq!(channel.number(), 3);
        assert_eq!(channel.calibration(), Some("cal0"));
    }

    #[test]
    fn unknown_type_aborts_build() {
        let doc = load(
            "[[object]]\nid = \"log0\"\ntype = \"log\"\n[[object]]\nid = \"pid0\"\ntype = \"pid-2\"\n",
        )
        .unwrap();
        let err = build(&doc).unwrap_err();
        assert!(matches!(
            err,
            CldError::UnknownType { ref name, ref type_tag } if name == "pid0" && type_tag == "pid-2"
        ));
    }

    #[test]
    fn duplicate_name_aborts_build() {
        let doc = load(
            "[[object]]\nid = \"log0\"\ntype = \"log\"\n[[object]]\nid = \"log0\"\ntype = \"channel\"\n",
        )
        .unwrap();
        assert!(matches!(build(&doc), Err(CldError::DuplicateName(name)) if name == "log0"));
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let doc = load("[[object]]\nid = \"ai0\"\ntype = \"channel\"\nproperties = { num = \"x\" }\n")
            .unwrap();
        let registry = build(&doc).unwrap();
        assert_eq!(
            registry.get("ai0").and_then(RuntimeObject::as_channel).map(Channel::number),
            Some(0)
        );
    }

    #[test]
    fn default_timestamp_format_is_configurable() {
        let doc = load("[[object]]\nid = \"log0\"\ntype = \"log\"\n").unwrap();
        let registry = ObjectBuilder::new()
            .with_timestamp_format("%s")
            .build(&doc)
            .unwrap();
        assert_eq!(registry.log("log0").unwrap().settings().timestamp_format, "%s");
        assert_eq!(registry.log("log0").unwrap().settings().file_template, "log0.csv");
    }

    #[test]
    fn knows_the_fixed_variant_set() {
        let builder = ObjectBuilder::new();
        for tag in ["controller", "log", "column", "channel", "calibration", "coefficient"] {
            assert!(builder.knows(tag));
        }
        assert!(!builder.knows("device"));
    }
}
