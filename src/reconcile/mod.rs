//! Prediction reconciliation: turn a model-produced prediction payload into
//! a list that is safe to submit. Validation rejects structurally broken or
//! degenerate payloads, backfill synthesizes rows the model skipped, and
//! repair softens draw-heavy lists without discarding the model's work.

pub mod backfill;
pub mod repair;

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::warn;

use crate::models::{MatchRow, Prediction};

/// Goals above this are treated as a transcription accident, not a tip.
pub const MAX_GOALS: u8 = 9;
/// Longest rationale kept per prediction; the rest is cut off.
pub const REASON_MAX_LEN: usize = 250;

/// Reasons a prediction payload is rejected. The variant distinguishes
/// shape problems (re-prompt with stricter format hints) from degeneracy
/// (re-prompt asking for differentiated scorelines).
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("prediction payload is not a JSON array (got {0})")]
    NotAnArray(String),
    #[error("expected {expected} predictions, got {got}")]
    WrongLength { expected: usize, got: usize },
    #[error("prediction {pos} is not an object")]
    NotAnObject { pos: usize },
    #[error("prediction {pos} is missing field '{field}'")]
    MissingField { pos: usize, field: &'static str },
    #[error("prediction {pos}: field '{field}' has the wrong type")]
    WrongType { pos: usize, field: &'static str },
    #[error("prediction {pos}: row index {index} does not exist on the sheet")]
    UnknownRow { pos: usize, index: u64 },
    #[error("prediction {pos} carries no row index and its team names match no sheet row")]
    UnknownTeams { pos: usize },
    #[error("row index {index} appears more than once")]
    DuplicateRow { index: u32 },
    #[error("prediction {pos}: goal value {value} exceeds the plausible maximum")]
    ImplausibleScore { pos: usize, value: u64 },
    #[error("{count} of {total} predictions are the identical scoreline {home}:{away}")]
    Degenerate {
        count: usize,
        total: usize,
        home: u8,
        away: u8,
    },
}

/// Lossless coercion to an unsigned integer. Models on the free-form path
/// regularly emit `"2"` or `2.0` where an integer belongs; only values that
/// convert without loss are accepted.
fn value_as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

fn get_u64(
    obj: &serde_json::Map<String, Value>,
    pos: usize,
    field: &'static str,
) -> Result<u64, ReconcileError> {
    let v = obj
        .get(field)
        .ok_or(ReconcileError::MissingField { pos, field })?;
    value_as_u64(v).ok_or(ReconcileError::WrongType { pos, field })
}

fn get_str<'a>(
    obj: &'a serde_json::Map<String, Value>,
    pos: usize,
    field: &'static str,
) -> Result<&'a str, ReconcileError> {
    let v = obj
        .get(field)
        .ok_or(ReconcileError::MissingField { pos, field })?;
    v.as_str().ok_or(ReconcileError::WrongType { pos, field })
}

/// Validate a raw payload against the extracted sheet. Team names are taken
/// from the sheet, never from the payload; model-provided names only feed
/// the log line when they disagree.
pub fn validate_predictions(
    raw: &Value,
    rows: &[MatchRow],
    matchday: u32,
    forbid_degenerate: bool,
) -> Result<Vec<Prediction>, ReconcileError> {
    let list = match raw {
        Value::Array(items) => items.as_slice(),
        // Tolerated wrapper: a single object holding the array under a
        // conventional key.
        Value::Object(obj) => obj
            .get("predictions")
            .or_else(|| obj.get("tipps"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .ok_or_else(|| ReconcileError::NotAnArray(json_kind(raw)))?,
        other => return Err(ReconcileError::NotAnArray(json_kind(other))),
    };

    // A short batch never gets partial acceptance; gaps are the backfill
    // path's business, not a valid model reply.
    if list.len() != rows.len() {
        return Err(ReconcileError::WrongLength {
            expected: rows.len(),
            got: list.len(),
        });
    }

    let mut seen: HashSet<u32> = HashSet::new();
    let mut out = Vec::with_capacity(list.len());

    for (pos, item) in list.iter().enumerate() {
        let obj = item
            .as_object()
            .ok_or(ReconcileError::NotAnObject { pos })?;

        // Index resolution: `match_index`, the alternative key `row_index`,
        // then the name-keyed path (normalized team-pair matching) for
        // batches that reference fixtures by name only.
        let index = match get_u64(obj, pos, "match_index") {
            Ok(i) => Some(i),
            Err(ReconcileError::MissingField { .. }) => match get_u64(obj, pos, "row_index") {
                Ok(i) => Some(i),
                Err(ReconcileError::MissingField { .. }) => None,
                Err(e) => return Err(e),
            },
            Err(e) => return Err(e),
        };
        let row = match index {
            Some(index) => rows
                .iter()
                .find(|r| u64::from(r.index) == index)
                .ok_or(ReconcileError::UnknownRow { pos, index })?,
            None => {
                let home = get_str(obj, pos, "home_team")?;
                let away = get_str(obj, pos, "away_team")?;
                rows.iter()
                    .find(|r| {
                        backfill::team_matches(home, &r.home_team)
                            && backfill::team_matches(away, &r.away_team)
                    })
                    .ok_or(ReconcileError::UnknownTeams { pos })?
            }
        };
        if !seen.insert(row.index) {
            return Err(ReconcileError::DuplicateRow { index: row.index });
        }

        let home_goals = get_u64(obj, pos, "home_goals")?;
        let away_goals = get_u64(obj, pos, "away_goals")?;
        for value in [home_goals, away_goals] {
            if value > u64::from(MAX_GOALS) {
                return Err(ReconcileError::ImplausibleScore { pos, value });
            }
        }

        let reason: String = get_str(obj, pos, "reason")
            .unwrap_or("")
            .chars()
            .take(REASON_MAX_LEN)
            .collect();

        if let Some(claimed) = obj.get("home_team").and_then(Value::as_str) {
            if !backfill::normalize_team(claimed).is_empty()
                && !backfill::team_matches(claimed, &row.home_team)
            {
                warn!(
                    row = row.index,
                    claimed, sheet = %row.home_team,
                    "Model named a different home team than the sheet, keeping the sheet's"
                );
            }
        }

        out.push(Prediction {
            row_index: row.index,
            matchday,
            home_team: row.home_team.clone(),
            away_team: row.away_team.clone(),
            predicted_home_goals: home_goals as u8,
            predicted_away_goals: away_goals as u8,
            reason,
        });
    }

    if forbid_degenerate && !out.is_empty() {
        let ones = out
            .iter()
            .filter(|p| p.predicted_home_goals == 1 && p.predicted_away_goals == 1)
            .count();
        let threshold = std::cmp::max(3, out.len() / 2);
        if ones >= threshold {
            return Err(ReconcileError::Degenerate {
                count: ones,
                total: out.len(),
                home: 1,
                away: 1,
            });
        }
    }

    Ok(out)
}

fn json_kind(v: &Value) -> String {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}
