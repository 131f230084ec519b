//! Odds-derived fallback predictions. When the model skips a row (or fails
//! entirely) the sheet's bookmaker odds still carry enough signal for a
//! plausible scoreline, derived through a coarse expected-goals split.

use tracing::{info, warn};

use crate::models::{MatchRow, Prediction};

/// Average total goals assumed per fixture.
const TOTAL_GOALS: f64 = 2.95;
/// Dampening applied to the probability gap before it becomes a goal gap.
const EDGE_WEIGHT: f64 = 0.85;
/// Goals of separation a full probability gap is worth.
const EDGE_SPAN: f64 = 2.4;
/// League-typical outcome split used when a row has no odds.
const DEFAULT_SPLIT: (f64, f64, f64) = (0.45, 0.28, 0.27);

/// Canonical lowercase form used for fuzzy team-name comparison: umlauts
/// transliterated, punctuation dropped, club-form prefixes removed.
pub fn normalize_team(name: &str) -> String {
    const PREFIXES: [&str; 12] = [
        "fc", "sv", "vfl", "vfb", "tsg", "sc", "fsv", "spvgg", "rb", "bsc", "tsv", "borussia",
    ];

    let mut s = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        match c {
            'ä' => s.push_str("ae"),
            'ö' => s.push_str("oe"),
            'ü' => s.push_str("ue"),
            'ß' => s.push_str("ss"),
            c if c.is_alphanumeric() => s.push(c),
            _ => s.push(' '),
        }
    }

    let tokens: Vec<&str> = s
        .split_whitespace()
        .filter(|t| !PREFIXES.contains(t) && t.parse::<u32>().is_err())
        .collect();
    tokens.join(" ")
}

/// Colloquial names the model likes to use, mapped to the token their
/// sheet counterpart will contain.
const ALIASES: [(&str, &str); 4] = [
    ("gladbach", "moenchengladbach"),
    ("bayern", "muenchen"),
    ("hertha", "berlin"),
    ("effzeh", "koeln"),
];

/// Fuzzy match for model-supplied vs sheet team names.
pub fn team_matches(a: &str, b: &str) -> bool {
    let na = normalize_team(a);
    let nb = normalize_team(b);
    if na.is_empty() || nb.is_empty() {
        return false;
    }
    if na == nb || na.contains(&nb) || nb.contains(&na) {
        return true;
    }
    ALIASES.iter().any(|(nick, canonical)| {
        (na.contains(nick) && nb.contains(canonical))
            || (nb.contains(nick) && na.contains(canonical))
    })
}

/// Outcome probabilities implied by a row's decimal odds: inverted and
/// normalized to remove the bookmaker margin. Rows with incomplete odds get
/// the league-typical default split.
pub fn implied_probabilities(row: &MatchRow) -> (f64, f64, f64) {
    match (row.odds_home, row.odds_draw, row.odds_away) {
        (Some(h), Some(d), Some(a)) if h > 1.0 && d > 1.0 && a > 1.0 => {
            let (ih, id, ia) = (1.0 / h, 1.0 / d, 1.0 / a);
            let sum = ih + id + ia;
            (ih / sum, id / sum, ia / sum)
        }
        _ => DEFAULT_SPLIT,
    }
}

fn map_goals(lambda: f64) -> u8 {
    // High expected-goal sides round upward a little more eagerly.
    let bias = if lambda >= 1.6 { 0.15 } else { 0.0 };
    (lambda + bias).round().clamp(0.0, 4.0) as u8
}

/// Derive a scoreline from a row's odds. Splits an assumed goal total
/// according to the home/away probability gap. Never produces 1:1, the
/// statistically laziest tip, so synthesized rows stay distinguishable.
pub fn synthesize_from_odds(row: &MatchRow, matchday: u32) -> Prediction {
    let (p_home, _p_draw, p_away) = implied_probabilities(row);
    let edge = EDGE_WEIGHT * (p_home - p_away) * EDGE_SPAN;
    let lambda_home = ((TOTAL_GOALS + edge) / 2.0).max(0.2);
    let lambda_away = ((TOTAL_GOALS - edge) / 2.0).max(0.2);

    let mut home_goals = map_goals(lambda_home);
    let mut away_goals = map_goals(lambda_away);
    if home_goals == 1 && away_goals == 1 {
        if p_home >= p_away {
            home_goals = 2;
        } else {
            away_goals = 2;
        }
    }

    Prediction {
        row_index: row.index,
        matchday,
        home_team: row.home_team.clone(),
        away_team: row.away_team.clone(),
        predicted_home_goals: home_goals,
        predicted_away_goals: away_goals,
        reason: format!(
            "Aus Quoten abgeleitet (Heimsieg {:.0}%, Auswärtssieg {:.0}%)",
            p_home * 100.0,
            p_away * 100.0
        ),
    }
}

/// Fill every open sheet row the model skipped with an odds-derived tip and
/// return the list ordered by row index. Closed rows are never backfilled.
pub fn backfill_missing(
    mut predictions: Vec<Prediction>,
    rows: &[MatchRow],
    matchday: u32,
) -> Vec<Prediction> {
    for row in rows.iter().filter(|r| r.is_open) {
        if predictions.iter().any(|p| p.row_index == row.index) {
            continue;
        }
        warn!(
            row = row.index,
            home = %row.home_team,
            away = %row.away_team,
            "No prediction for this fixture, backfilling from odds"
        );
        predictions.push(synthesize_from_odds(row, matchday));
    }
    predictions.sort_by_key(|p| p.row_index);
    predictions
}

/// Full odds-only prediction list, used when the model is unavailable or
/// keeps producing rejected payloads.
pub fn predictions_from_odds(rows: &[MatchRow], matchday: u32) -> Vec<Prediction> {
    info!(
        rows = rows.len(),
        "Building the complete prediction list from odds alone"
    );
    rows.iter()
        .filter(|r| r.is_open)
        .map(|r| synthesize_from_odds(r, matchday))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn row(index: u32, odds: Option<(f64, f64, f64)>) -> MatchRow {
        MatchRow {
            index,
            home_team: format!("Heim {index}"),
            away_team: format!("Gast {index}"),
            home_field_id: Some(format!("m{index}.heimTipp")),
            away_field_id: Some(format!("m{index}.gastTipp")),
            is_open: true,
            odds_home: odds.map(|o| o.0),
            odds_draw: odds.map(|o| o.1),
            odds_away: odds.map(|o| o.2),
        }
    }

    #[test]
    fn implied_probabilities_strip_the_margin() {
        let (h, d, a) = implied_probabilities(&row(1, Some((2.0, 4.0, 4.0))));
        assert_relative_eq!(h + d + a, 1.0, epsilon = 1e-9);
        assert_relative_eq!(h, 0.5, epsilon = 1e-9);
        assert_relative_eq!(d, 0.25, epsilon = 1e-9);
    }

    #[test]
    fn missing_or_bogus_odds_use_the_default_split() {
        assert_eq!(implied_probabilities(&row(1, None)), DEFAULT_SPLIT);
        assert_eq!(
            implied_probabilities(&row(1, Some((1.0, 3.0, 3.0)))),
            DEFAULT_SPLIT
        );
    }

    #[test]
    fn clear_favorite_wins_the_synthesized_scoreline() {
        let pred = synthesize_from_odds(&row(1, Some((1.50, 4.00, 6.00))), 3);
        assert!(pred.predicted_home_goals > pred.predicted_away_goals);
        assert_eq!(pred.matchday, 3);

        let pred = synthesize_from_odds(&row(1, Some((6.00, 4.00, 1.50))), 3);
        assert!(pred.predicted_away_goals > pred.predicted_home_goals);
    }

    #[test]
    fn synthesized_rows_are_never_one_one() {
        for odds in [
            (3.0, 3.0, 3.0),
            (2.8, 3.2, 2.6),
            (1.5, 4.0, 6.0),
            (10.0, 6.0, 1.2),
        ] {
            let pred = synthesize_from_odds(&row(1, Some(odds)), 1);
            assert!(
                !(pred.predicted_home_goals == 1 && pred.predicted_away_goals == 1),
                "odds {odds:?} produced 1:1"
            );
        }
        let pred = synthesize_from_odds(&row(1, None), 1);
        assert!(!(pred.predicted_home_goals == 1 && pred.predicted_away_goals == 1));
    }

    #[test]
    fn goal_counts_stay_inside_zero_to_four() {
        let pred = synthesize_from_odds(&row(1, Some((1.01, 15.0, 40.0))), 1);
        assert!(pred.predicted_home_goals <= 4);
        assert!(pred.predicted_away_goals <= 4);
    }

    #[test]
    fn backfill_adds_only_missing_open_rows_in_order() {
        let mut rows = vec![row(1, Some((2.0, 3.3, 3.6))), row(2, None), row(3, None)];
        rows[2].is_open = false;

        let existing = vec![Prediction {
            row_index: 2,
            matchday: 5,
            home_team: "Heim 2".into(),
            away_team: "Gast 2".into(),
            predicted_home_goals: 0,
            predicted_away_goals: 2,
            reason: "Modell".into(),
        }];
        let filled = backfill_missing(existing, &rows, 5);

        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].row_index, 1);
        assert!(filled[0].reason.starts_with("Aus Quoten"));
        assert_eq!(filled[1].row_index, 2);
        assert_eq!(filled[1].reason, "Modell");
    }

    #[test]
    fn odds_only_list_skips_closed_rows() {
        let mut rows = vec![row(1, Some((2.0, 3.3, 3.6))), row(2, Some((2.0, 3.3, 3.6)))];
        rows[0].is_open = false;
        let preds = predictions_from_odds(&rows, 1);
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].row_index, 2);
    }

    #[test]
    fn team_normalization_handles_umlauts_and_prefixes() {
        assert_eq!(normalize_team("1. FC Köln"), "koeln");
        assert_eq!(normalize_team("FC Bayern München"), "bayern muenchen");
        assert_eq!(normalize_team("Borussia Mönchengladbach"), "moenchengladbach");
    }

    #[test]
    fn fuzzy_team_matching_covers_nicknames() {
        assert!(team_matches("Bayern", "FC Bayern München"));
        assert!(team_matches("Gladbach", "Borussia Mönchengladbach"));
        assert!(team_matches("SV Werder Bremen", "Werder Bremen"));
        assert!(!team_matches("Werder Bremen", "VfB Stuttgart"));
        assert!(!team_matches("", "VfB Stuttgart"));
    }
}
