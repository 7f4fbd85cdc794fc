use std::collections::BTreeMap;

use rand::{seq::IndexedRandom, Rng};
use serde_json::Value;

/// Range used when a `range` property carries non-numeric bounds.
const FALLBACK_RANGE: (i64, i64) = (1, 100);

/// Declarative recipe for one event property.
///
/// Parsed from the job config, where each property is either a literal
/// (`"pro"`, `3`, `true`) or an object tagged with `type`:
///
/// - `{"type": "set", "values": [...]}` picks one value uniformly.
/// - `{"type": "range", "min": 1, "max": 10}` picks an integer in `[min, max]`.
/// - `{"type": "uuid"}` generates a fresh v4 UUID.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertySpec {
    Static(Value),
    Choice(Vec<Value>),
    IntRange { min: i64, max: i64 },
    GeneratedUuid,
}

pub type PropertySpecs = BTreeMap<String, PropertySpec>;

impl PropertySpec {
    /// Interpret a raw config value. Anything that is not a recognized
    /// tagged object degrades to a static value instead of failing the run.
    pub fn from_json(raw: &Value) -> Self {
        let Value::Object(obj) = raw else {
            return Self::Static(raw.clone());
        };

        match obj.get("type").and_then(Value::as_str) {
            Some("set") => match obj.get("values") {
                Some(Value::Array(values)) => Self::Choice(values.clone()),
                _ => Self::Static(Value::String(raw.to_string())),
            },
            Some("range") => match (obj.get("min"), obj.get("max")) {
                (Some(min), Some(max)) => match (as_int(min), as_int(max)) {
                    (Some(min), Some(max)) => Self::IntRange { min, max },
                    _ => {
                        tracing::warn!(
                            config = %raw,
                            min = FALLBACK_RANGE.0,
                            max = FALLBACK_RANGE.1,
                            "invalid range values, using default range"
                        );
                        Self::IntRange {
                            min: FALLBACK_RANGE.0,
                            max: FALLBACK_RANGE.1,
                        }
                    }
                },
                _ => Self::Static(Value::String(raw.to_string())),
            },
            Some("uuid") => Self::GeneratedUuid,
            _ => Self::Static(Value::String(raw.to_string())),
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Value {
        match self {
            Self::Static(v) => v.clone(),
            Self::Choice(values) => values
                .choose(rng)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            Self::IntRange { min, max } if min > max => Value::from(*min),
            Self::IntRange { min, max } => Value::from(rng.random_range(*min..=*max)),
            Self::GeneratedUuid => Value::String(random_uuid(rng).to_string()),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Static(v) => format!("static value {v}"),
            Self::Choice(values) => format!("random choice from {} values", values.len()),
            Self::IntRange { min, max } => format!("random integer between {min} and {max}"),
            Self::GeneratedUuid => "generated uuid".to_string(),
        }
    }
}

pub fn parse_specs(raw: &BTreeMap<String, Value>) -> PropertySpecs {
    raw.iter()
        .map(|(k, v)| (k.clone(), PropertySpec::from_json(v)))
        .collect()
}

/// Produce one concrete property map for a single event.
pub fn generate_properties<R: Rng + ?Sized>(specs: &PropertySpecs, rng: &mut R) -> BTreeMap<String, Value> {
    specs
        .iter()
        .map(|(k, spec)| (k.clone(), spec.generate(rng)))
        .collect()
}

/// v4 UUID drawn from the supplied rng so seeded runs stay reproducible.
pub fn random_uuid<R: Rng + ?Sized>(rng: &mut R) -> uuid::Uuid {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

fn as_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
