//! World-level aggregation of per-country history.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::entity::HISTORY_FIELD;
use crate::error::{EngineError, EngineResult};
use crate::snapshot::Snapshot;

/// Summed history across every entity of a snapshot.
///
/// Serializes as `{"history": {"<date>": <count>, ...}}` with dates in
/// first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorldHistory {
    /// Date → summed cumulative count.
    pub history: Map<String, Value>,
}

impl WorldHistory {
    /// Summed count for `date`, if any entity reported it.
    #[must_use]
    pub fn get(&self, date: &str) -> Option<u64> {
        self.history.get(date).and_then(Value::as_u64)
    }

    /// Number of distinct dates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Returns true if no dates were observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// The response document, `{"history": {...}}`.
    #[must_use]
    pub fn into_json(self) -> Value {
        let mut body = Map::with_capacity(1);
        body.insert("history".to_string(), Value::Object(self.history));
        Value::Object(body)
    }
}

/// Sums every entity's history per date.
///
/// Each date observed anywhere in the snapshot appears exactly once in the
/// output. Counts stored as numeric strings are accepted; anything that is
/// not a non-negative integer fails with a data format error.
pub fn aggregate_world(snapshot: &Snapshot) -> EngineResult<WorldHistory> {
    // Index into `totals` per date; keeps first-seen order without a second map type.
    let mut index: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    let mut totals: Vec<(&str, u64)> = Vec::new();

    for entity in snapshot.entities() {
        let history = match entity.record().get(HISTORY_FIELD) {
            None | Some(Value::Null) => continue,
            Some(Value::Object(history)) => history,
            Some(_) => {
                return Err(EngineError::data_format(format!(
                    "history of '{}' in {} is not an object",
                    entity.name(),
                    snapshot.name()
                )));
            }
        };
        for (date, raw) in history {
            let count = parse_count(raw).map_err(|reason| {
                EngineError::data_format(format!(
                    "invalid count for '{}' on {date} in {}: {reason}",
                    entity.name(),
                    snapshot.name()
                ))
            })?;

            match index.get(date.as_str()) {
                Some(&slot) => {
                    let total = &mut totals[slot].1;
                    *total = total.checked_add(count).ok_or_else(|| {
                        EngineError::data_format(format!(
                            "count overflow on {date} in {}",
                            snapshot.name()
                        ))
                    })?;
                }
                None => {
                    index.insert(date.as_str(), totals.len());
                    totals.push((date.as_str(), count));
                }
            }
        }
    }

    let history = totals
        .into_iter()
        .map(|(date, total)| (date.to_string(), Value::from(total)))
        .collect();
    Ok(WorldHistory { history })
}

/// Interprets a stored count as a non-negative integer.
///
/// Accepts JSON integers, integral floats and decimal digit strings
/// (surrounding whitespace ignored, a zero fraction such as `"12.0"`
/// allowed). Signs and exponents are rejected.
pub fn parse_count(raw: &Value) -> Result<u64, String> {
    match raw {
        Value::Number(n) => {
            if let Some(v) = n.as_u64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(f) => float_to_count(f).ok_or_else(|| format!("{n} is not a non-negative integer")),
                None => Err(format!("{n} is not a non-negative integer")),
            }
        }
        Value::String(s) => {
            let invalid = || format!("\"{s}\" is not a non-negative integer");
            let trimmed = s.trim();
            let digits = match trimmed.split_once('.') {
                Some((whole, fraction))
                    if !fraction.is_empty() && fraction.bytes().all(|b| b == b'0') =>
                {
                    whole
                }
                Some(_) => return Err(invalid()),
                None => trimmed,
            };
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            digits.parse::<u64>().map_err(|_| invalid())
        }
        other => Err(format!("{other} is not a count")),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn float_to_count(f: f64) -> Option<u64> {
    // 2^53: beyond this f64 cannot represent every integer.
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= MAX_EXACT {
        Some(f as u64)
    } else {
        None
    }
}
