use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FlowAbsError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParamDef {
    Int {
        name: String,
        default: i32,
        min: i32,
        max: i32,
    },
    Float {
        name: String,
        default: f32,
        min: f32,
        max: f32,
    },
}

impl ParamDef {
    pub fn int(name: &str, default: i32, min: i32, max: i32) -> Self {
        ParamDef::Int {
            name: name.to_string(),
            default,
            min,
            max,
        }
    }

    pub fn float(name: &str, default: f32, min: f32, max: f32) -> Self {
        ParamDef::Float {
            name: name.to_string(),
            default,
            min,
            max,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ParamDef::Int { name, .. } => name,
            ParamDef::Float { name, .. } => name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamDef::Int { .. } => "int",
            ParamDef::Float { .. } => "float",
        }
    }

    pub fn default_value(&self) -> ParamValue {
        match self {
            ParamDef::Int { default, .. } => ParamValue::Int(*default),
            ParamDef::Float { default, .. } => ParamValue::Float(*default),
        }
    }

    pub fn min_value(&self) -> ParamValue {
        match self {
            ParamDef::Int { min, .. } => ParamValue::Int(*min),
            ParamDef::Float { min, .. } => ParamValue::Float(*min),
        }
    }

    pub fn max_value(&self) -> ParamValue {
        match self {
            ParamDef::Int { max, .. } => ParamValue::Int(*max),
            ParamDef::Float { max, .. } => ParamValue::Float(*max),
        }
    }

    /// Coerce `value` to this parameter's kind and clamp it into `[min, max]`.
    /// Integers widen to floats; a float offered to an int parameter is
    /// rejected rather than truncated.
    pub fn constrain(&self, value: ParamValue) -> Result<ParamValue> {
        match (self, value) {
            (ParamDef::Int { min, max, .. }, ParamValue::Int(v)) => {
                Ok(ParamValue::Int(v.clamp(*min, *max)))
            }
            (ParamDef::Float { min, max, .. }, ParamValue::Float(v)) => {
                Ok(ParamValue::Float(v.clamp(*min, *max)))
            }
            (ParamDef::Float { min, max, .. }, ParamValue::Int(v)) => {
                Ok(ParamValue::Float((v as f32).clamp(*min, *max)))
            }
            (ParamDef::Int { .. }, ParamValue::Float(_)) => Err(FlowAbsError::ParamKind {
                name: self.name().to_string(),
                expected: self.kind_name(),
                got: value.kind_name(),
            }),
        }
    }

    /// Parse a textual value (CLI, presets) as this parameter's kind.
    pub fn parse(&self, text: &str) -> Option<ParamValue> {
        let text = text.trim();
        match self {
            ParamDef::Int { .. } => text.parse().ok().map(ParamValue::Int),
            ParamDef::Float { .. } => text.parse().ok().map(ParamValue::Float),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
}

impl ParamValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
        }
    }

    pub fn as_f32(&self) -> f32 {
        match self {
            ParamValue::Int(v) => *v as f32,
            ParamValue::Float(v) => *v,
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            ParamValue::Int(v) => *v,
            ParamValue::Float(v) => v.round() as i32,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constrain_clamps_both_kinds() {
        let i = ParamDef::int("n", 1, 0, 4);
        assert_eq!(i.constrain(ParamValue::Int(9)).unwrap(), ParamValue::Int(4));
        assert_eq!(i.constrain(ParamValue::Int(-2)).unwrap(), ParamValue::Int(0));
        let f = ParamDef::float("s", 1.0, 0.0, 2.0);
        assert_eq!(f.constrain(ParamValue::Float(3.5)).unwrap(), ParamValue::Float(2.0));
    }

    #[test]
    fn int_widens_into_float_param() {
        let f = ParamDef::float("s", 1.0, 0.0, 10.0);
        assert_eq!(f.constrain(ParamValue::Int(3)).unwrap(), ParamValue::Float(3.0));
    }

    #[test]
    fn float_into_int_param_is_rejected() {
        let i = ParamDef::int("n", 1, 0, 4);
        assert!(matches!(
            i.constrain(ParamValue::Float(1.5)),
            Err(FlowAbsError::ParamKind { expected: "int", got: "float", .. })
        ));
    }

    #[test]
    fn parse_follows_kind() {
        assert_eq!(ParamDef::int("n", 0, 0, 9).parse(" 7 "), Some(ParamValue::Int(7)));
        assert_eq!(ParamDef::int("n", 0, 0, 9).parse("7.5"), None);
        assert_eq!(
            ParamDef::float("s", 0.0, 0.0, 9.0).parse("7"),
            Some(ParamValue::Float(7.0))
        );
    }

    #[test]
    fn serde_tagged_def() {
        let def = ParamDef::float("fs_sigma", 1.0, 0.0, 10.0);
        let json = serde_json::to_string(&def).unwrap();
        assert!(json.contains("\"type\":\"Float\""));
        let back: ParamDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn untagged_value_json() {
        let v: ParamValue = serde_json::from_str("3").unwrap();
        assert_eq!(v, ParamValue::Int(3));
        let v: ParamValue = serde_json::from_str("0.5").unwrap();
        assert_eq!(v, ParamValue::Float(0.5));
    }
}
