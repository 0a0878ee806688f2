//! Values held by control points
//!
//! Control points carry loosely typed state in the host (numbers, switches,
//! strings, or nothing at all). `ControlValue` keeps that variety but gives
//! readers lenient, fallible accessors instead of string parsing at every
//! call site.
//!
//! # Example
//!
//! ```rust
//! use control_store::ControlValue;
//!
//! assert_eq!(ControlValue::Text("42".into()).as_number(), Some(42.0));
//! assert_eq!(ControlValue::Text("ON".into()).as_switch(), Some(true));
//! assert_eq!(ControlValue::Null.as_number(), None);
//! ```

use std::fmt;

/// State of a single control point
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ControlValue {
    /// No state has been set yet (`NULL`/`UNDEF` in the host)
    #[default]
    Null,
    /// Numeric state, e.g. a volume level
    Number(f64),
    /// On/off state, e.g. a mute flag
    Switch(bool),
    /// Free-form text, e.g. a zone name or a JSON payload
    Text(String),
}

impl ControlValue {
    /// Numeric view of the value
    ///
    /// Text is parsed leniently; switches and null have no numeric form.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ControlValue::Number(n) if n.is_finite() => Some(*n),
            ControlValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Switch view of the value
    ///
    /// Accepts `ON`/`OFF`, `true`/`false` and `1`/`0` when stored as text.
    pub fn as_switch(&self) -> Option<bool> {
        match self {
            ControlValue::Switch(b) => Some(*b),
            ControlValue::Text(s) => match s.trim().to_ascii_uppercase().as_str() {
                "ON" | "TRUE" | "1" => Some(true),
                "OFF" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Text view of the value, `None` for null
    pub fn as_text(&self) -> Option<String> {
        match self {
            ControlValue::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ControlValue::Null)
    }
}

impl fmt::Display for ControlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlValue::Null => write!(f, "NULL"),
            ControlValue::Number(n) if n.fract() == 0.0 => write!(f, "{}", *n as i64),
            ControlValue::Number(n) => write!(f, "{}", n),
            ControlValue::Switch(true) => write!(f, "ON"),
            ControlValue::Switch(false) => write!(f, "OFF"),
            ControlValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for ControlValue {
    fn from(b: bool) -> Self {
        ControlValue::Switch(b)
    }
}

impl From<u8> for ControlValue {
    fn from(n: u8) -> Self {
        ControlValue::Number(f64::from(n))
    }
}

impl From<f64> for ControlValue {
    fn from(n: f64) -> Self {
        ControlValue::Number(n)
    }
}

impl From<&str> for ControlValue {
    fn from(s: &str) -> Self {
        ControlValue::Text(s.to_string())
    }
}

impl From<String> for ControlValue {
    fn from(s: String) -> Self {
        ControlValue::Text(s)
    }
}
