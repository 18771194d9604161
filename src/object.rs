//! Runtime object variants assembled by the builder.
//!
//! Every variant is [`Named`]. Only [`LogComponent`] carries the [`Lifecycle`]; the
//! rest are passive descriptions that other components look up by name (a channel
//! points at its calibration, a log column points at a channel).

use crate::core::{Lifecycle, Named};
use crate::log_file::LogComponent;

/// Strip a `/parent/child` style reference down to the object name it points at.
pub(crate) fn reference_name(reference: &str) -> &str {
    reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference)
}

/// Grouping object; its `kind` mirrors the declaration's `ctype`.
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    pub(crate) name: String,
    pub(crate) kind: Option<String>,
}

impl Controller {
    /// Controller kind, e.g. `log` or `acquisition`.
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }
}

/// A log column bound to a channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub(crate) name: String,
    pub(crate) channel: Option<String>,
}

impl Column {
    /// Name of the channel this column records.
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }
}

/// An acquisition channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub(crate) name: String,
    pub(crate) tag: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) number: u32,
    pub(crate) calibration: Option<String>,
}

impl Channel {
    /// Short display tag.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Free-form description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Hardware channel number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Name of the calibration applied to raw values.
    pub fn calibration(&self) -> Option<&str> {
        self.calibration.as_deref()
    }
}

/// One polynomial term of a calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Coefficient {
    pub(crate) name: String,
    pub(crate) order: u32,
    pub(crate) value: f64,
}

impl Coefficient {
    /// Power of the term.
    pub fn order(&self) -> u32 {
        self.order
    }

    /// Multiplier of the term.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Polynomial calibration `Σ cₙ·xⁿ` with display units.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub(crate) name: String,
    pub(crate) units: Option<String>,
    pub(crate) coefficients: Vec<(u32, f64)>,
}

impl Calibration {
    /// Display units of calibrated values.
    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// `(order, value)` pairs in declaration order.
    pub fn coefficients(&self) -> &[(u32, f64)] {
        &self.coefficients
    }

    /// Apply the polynomial. Without coefficients the raw value passes through.
    pub fn apply(&self, raw: f64) -> f64 {
        if self.coefficients.is_empty() {
            return raw;
        }
        self.coefficients
            .iter()
            .map(|&(order, value)| match i32::try_from(order) {
                Ok(n) => value * raw.powi(n),
                Err(_) => value * raw.powf(f64::from(order)),
            })
            .sum()
    }
}

/// A registered runtime object.
#[derive(Debug)]
pub enum RuntimeObject {
    /// Grouping controller.
    Controller(Controller),
    /// CSV data log.
    Log(LogComponent),
    /// Log column.
    Column(Column),
    /// Acquisition channel.
    Channel(Channel),
    /// Channel calibration.
    Calibration(Calibration),
    /// Calibration term.
    Coefficient(Coefficient),
}

impl RuntimeObject {
    /// The type tag this variant is declared with.
    pub fn type_tag(&self) -> &'static str {
        match self {
            RuntimeObject::Controller(_) => "controller",
            RuntimeObject::Log(_) => "log",
            RuntimeObject::Column(_) => "column",
            RuntimeObject::Channel(_) => "channel",
            RuntimeObject::Calibration(_) => "calibration",
            RuntimeObject::Coefficient(_) => "coefficient",
        }
    }

    /// The lifecycle capability, if this variant has one.
    pub fn as_lifecycle(&self) -> Option<&dyn Lifecycle> {
        match self {
            RuntimeObject::Log(log) => Some(log),
            _ => None,
        }
    }

    /// The log component, if this is one.
    pub fn as_log(&self) -> Option<&LogComponent> {
        match self {
            RuntimeObject::Log(log) => Some(log),
            _ => None,
        }
    }

    /// The channel, if this is one.
    pub fn as_channel(&self) -> Option<&Channel> {
        match self {
            RuntimeObject::Channel(channel) => Some(channel),
            _ => None,
        }
    }

    /// The calibration, if this is one.
    pub fn as_calibration(&self) -> Option<&Calibration> {
        match self {
            RuntimeObject::Calibration(calibration) => Some(calibration),
            _ => None,
        }
    }
}

impl Named for RuntimeObject {
    fn name(&self) -> &str {
        match self {
            RuntimeObject::Controller(o) => &o.name,
            RuntimeObject::Log(o) => o.name(),
            RuntimeObject::Column(o) => &o.name,
            RuntimeObject::Channel(o) => &o.name,
            RuntimeObject::Calibration(o) => &o.name,
            RuntimeObject::Coefficient(o) => &o.name,
        }
    }
}
