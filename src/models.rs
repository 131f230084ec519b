use serde::{Deserialize, Serialize};

/// One fixture row recovered from the tip-sheet form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRow {
    /// 1-based position in submission order; join key between extraction
    /// and reconciliation for the lifetime of one matchday fetch.
    pub index: u32,
    /// Best-effort display name; "Heim" when unresolved.
    pub home_team: String,
    /// Best-effort display name; "Gast" when unresolved.
    pub away_team: String,
    /// Name of the numeric input that takes the home goal count.
    /// `None` only when the row could not be matched to real fields.
    pub home_field_id: Option<String>,
    /// Name of the numeric input that takes the away goal count.
    /// Always paired with `home_field_id`.
    pub away_field_id: Option<String>,
    /// Whether the portal still accepts a tip for this fixture.
    pub is_open: bool,
    /// Decimal odds (home / draw / away); `None` when not recoverable.
    pub odds_home: Option<f64>,
    pub odds_draw: Option<f64>,
    pub odds_away: Option<f64>,
}

impl MatchRow {
    /// Placeholder names mean identity resolution failed; features that need
    /// real team identities (e.g. web research) must be skipped.
    pub fn has_placeholder_teams(&self) -> bool {
        is_placeholder(&self.home_team) || is_placeholder(&self.away_team)
    }
}

fn is_placeholder(name: &str) -> bool {
    matches!(
        name.trim().to_lowercase().as_str(),
        "heim" | "gast" | "home" | "away"
    )
}

/// One validated scoreline forecast, keyed to a `MatchRow` index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// References exactly one `MatchRow.index`.
    pub row_index: u32,
    pub matchday: u32,
    /// Authoritative names copied from the row, never from the model.
    pub home_team: String,
    pub away_team: String,
    /// Predicted goals, 0..=9.
    pub predicted_home_goals: u8,
    pub predicted_away_goals: u8,
    /// Free-text rationale, truncated to 250 characters.
    pub reason: String,
}

impl Prediction {
    pub fn is_draw(&self) -> bool {
        self.predicted_home_goals == self.predicted_away_goals
    }
}

/// Owned snapshot of the submission form: everything needed to POST it back
/// without holding a borrow on the parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    /// `action` attribute, resolved against the page URL at submit time.
    pub action: Option<String>,
    /// "post" unless the form says otherwise.
    pub method: String,
    /// Serializable fields in document order (hidden inputs included).
    pub fields: Vec<(String, String)>,
    /// Name/value of the named submit button, if any.
    pub submit: Option<(String, String)>,
}

impl FormSnapshot {
    /// Set a field value, appending the field if the form did not carry it.
    pub fn set(&mut self, name: &str, value: String) {
        if let Some(entry) = self.fields.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value;
        } else {
            self.fields.push((name.to_string(), value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
