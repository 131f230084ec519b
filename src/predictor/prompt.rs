//! Prompt and response-schema assembly for the OpenAI predictor. The prompt
//! is German because the model reasons about Bundesliga coverage noticeably
//! better when the whole exchange stays in the league's language.

use serde_json::{json, Value};

use crate::extract::odds::odds_to_str;
use crate::models::MatchRow;

/// Extra instruction appended after a payload came back structurally broken.
pub const FORMAT_HINT: &str = "WICHTIG: Antworte ausschließlich mit einem JSON-Array. \
    Jedes Element braucht exakt die Felder match_index, home_team, away_team, \
    home_goals, away_goals und reason. Keine weiteren Felder, kein Text davor oder danach.";

/// Extra instruction appended after a payload was rejected as draw-heavy.
pub const DEGENERATE_HINT: &str = "WICHTIG: Deine letzte Antwort bestand fast nur aus 1:1. \
    Differenziere die Ergebnisse: nutze die Quoten, tippe bei klaren Favoriten \
    einen Sieg und nur bei wirklich ausgeglichenen Spielen ein Unentschieden.";

/// Research prompt for one matchday. Lists every open fixture with its odds
/// and pins the expected output format.
pub fn build_research_prompt(rows: &[MatchRow], matchday: u32) -> String {
    let mut fixtures = String::new();
    for row in rows {
        fixtures.push_str(&format!(
            "  {}. {} gegen {} | Quoten 1/X/2: {} | {}\n",
            row.index,
            row.home_team,
            row.away_team,
            odds_to_str(row.odds_home, row.odds_draw, row.odds_away),
            if row.is_open { "offen" } else { "geschlossen" },
        ));
    }

    format!(
        "Du bist ein erfahrener Fußball-Analyst und tippst den {matchday}. Spieltag.\n\
         Recherchiere für jede Partie die aktuelle Form, Verletzungen, Sperren und \
         die Tabellensituation und tippe dann ein konkretes Endergebnis.\n\n\
         Partien:\n{fixtures}\n\
         Regeln:\n\
         - Tippe realistische Ergebnisse (0 bis 4 Tore pro Team).\n\
         - Ein Tipp pro Partie, match_index muss der Nummer oben entsprechen.\n\
         - Begründe jeden Tipp in einem Satz (Feld reason).\n\
         - Nicht mehr als zwei Unentschieden, außer die Quoten sprechen klar dafür.\n\n\
         Antworte nur mit einem JSON-Array im Format:\n\
         [{{\"match_index\": 1, \"home_team\": \"…\", \"away_team\": \"…\", \
         \"home_goals\": 2, \"away_goals\": 1, \"reason\": \"…\"}}]"
    )
}

/// Strict response schema for the Chat Completions `json_schema` format.
pub fn prediction_schema() -> Value {
    json!({
        "name": "matchday_predictions",
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "predictions": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "match_index": { "type": "integer" },
                            "home_team": { "type": "string" },
                            "away_team": { "type": "string" },
                            "home_goals": { "type": "integer" },
                            "away_goals": { "type": "integer" },
                            "reason": { "type": "string" }
                        },
                        "required": [
                            "match_index", "home_team", "away_team",
                            "home_goals", "away_goals", "reason"
                        ],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["predictions"],
            "additionalProperties": false
        }
    })
}
