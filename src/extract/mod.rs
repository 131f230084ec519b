//! Tip-sheet extraction: raw HTML of a tip-submission page → ordered
//! `MatchRow` list plus an owned snapshot of the form for submission.
//!
//! No class name, id, or DOM depth is assumed stable; every step degrades
//! gracefully. A structurally unusable page (no form, fewer than two score
//! candidates) yields an empty row list so the caller can skip the round.

pub mod dom;
pub mod odds;
pub mod teams;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{FormSnapshot, MatchRow};

/// Fixed round size of the target league; extra pairs are dropped.
pub const MAX_ROWS: usize = 9;

/// Tokens in an input's name/class that mark it as a score field.
const SCORE_TOKENS: [&str; 8] = [
    "tipp", "tor", "tore", "heim", "gast", "home", "away", "score",
];

static SEASON_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"tippsaisonId["']?\s*[:=]\s*["'](\d{6,})["']"#).unwrap()
});

static INPUT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("input").unwrap());
static FORM_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("form").unwrap());
static ROUND_MARKER_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[name="tippsaisonId"], input[name="spieltagIndex"]"#).unwrap()
});
static SELECT_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("select").unwrap());
static OPTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static TEXTAREA_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("textarea").unwrap());

/// Everything recovered from one tip-sheet page.
#[derive(Debug, Clone, Default)]
pub struct TipSheet {
    pub rows: Vec<MatchRow>,
    /// `None` only when the page carried no form at all.
    pub form: Option<FormSnapshot>,
}

/// Parse one tip-sheet page. Deterministic: identical HTML yields an
/// identical sheet.
pub fn extract_tip_sheet(html: &str) -> TipSheet {
    let doc = Html::parse_document(html);

    let Some(form) = select_tip_form(&doc) else {
        return TipSheet::default();
    };
    let snapshot = snapshot_form(form);

    let cands = score_input_candidates(form);
    if cands.len() < 2 {
        debug!("Only {} score-field candidate(s) found, treating round as unavailable", cands.len());
        return TipSheet { rows: Vec::new(), form: Some(snapshot) };
    }

    let pairs = pair_candidates(&cands);

    let mut rows = Vec::new();
    for (a, b) in pairs.into_iter().take(MAX_ROWS) {
        let container = dom::nearest_common_container(a, b)
            .or_else(|| a.ancestors().next().and_then(ElementRef::wrap))
            .unwrap_or(form);

        let (home_input, away_input) = assign_home_away(a, b);
        let scope = teams::ResolveScope {
            doc: &doc,
            container,
            home_input,
            away_input,
        };
        let (home_team, away_team) = teams::resolve_team_names(&scope);
        let (odds_home, odds_draw, odds_away) = odds::extract_odds(&dom::visible_text(container));
        let is_open = !home_input.value().attr("disabled").is_some()
            && !away_input.value().attr("disabled").is_some();

        rows.push(MatchRow {
            index: rows.len() as u32 + 1,
            home_team,
            away_team,
            home_field_id: home_input.value().attr("name").map(str::to_string),
            away_field_id: away_input.value().attr("name").map(str::to_string),
            is_open,
            odds_home,
            odds_draw,
            odds_away,
        });
    }

    TipSheet { rows, form: Some(snapshot) }
}

/// First form carrying a season/round marker hidden field, else the first
/// form on the page.
fn select_tip_form(doc: &Html) -> Option<ElementRef<'_>> {
    let forms: Vec<ElementRef<'_>> = doc.select(&FORM_SEL).collect();
    forms
        .iter()
        .copied()
        .find(|f| f.select(&ROUND_MARKER_SEL).next().is_some())
        .or_else(|| forms.first().copied())
}

/// Score-field candidates: named, non-hidden/submit/button inputs whose
/// name/class tokens look score-like, or whose input mode / max length
/// implies a small integer entry. Disabled inputs stay candidates; their
/// row is simply reported closed.
fn score_input_candidates<'a>(form: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut out = Vec::new();
    for input in form.select(&INPUT_SEL) {
        let el = input.value();
        let Some(name) = el.attr("name") else { continue };
        if name.is_empty() {
            continue;
        }
        let typ = el.attr("type").unwrap_or("text").to_lowercase();
        if matches!(typ.as_str(), "hidden" | "submit" | "button") {
            continue;
        }

        let mut tokens = name.to_lowercase();
        for class in el.classes() {
            tokens.push(' ');
            tokens.push_str(&class.to_lowercase());
        }
        let scoreish = SCORE_TOKENS.iter().any(|k| tokens.contains(k));
        let numeric_mode = matches!(el.attr("inputmode"), Some("numeric" | "tel" | "decimal"));
        let short_entry = el
            .attr("maxlength")
            .and_then(|m| m.trim().parse::<u32>().ok())
            .is_some_and(|m| m <= 2);

        if scoreish || numeric_mode || short_entry {
            out.push(input);
        }
    }
    out
}

/// Normalized field-name fragment used to pair a fixture's two score fields:
/// home/away tokens and digits stripped, separators trimmed.
fn stem(name: &str) -> String {
    let mut s = name.to_lowercase();
    for token in ["heim", "home", "gast", "away"] {
        s = s.replace(token, "");
    }
    s.retain(|c| c != 'h' && c != 'a' && !c.is_ascii_digit());
    s.trim_matches(|c: char| "[]()._- ".contains(c)).to_string()
}

/// Pair candidates by shared stem first (first two members per stem, in
/// document order), then pair the leftovers sequentially two-at-a-time.
/// An odd trailing leftover is dropped.
fn pair_candidates<'a>(cands: &[ElementRef<'a>]) -> Vec<(ElementRef<'a>, ElementRef<'a>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (i, input) in cands.iter().enumerate() {
        let st = stem(input.value().attr("name").unwrap_or(""));
        match groups.iter_mut().find(|(g, _)| *g == st) {
            Some((_, members)) => members.push(i),
            None => groups.push((st, vec![i])),
        }
    }

    let mut used = vec![false; cands.len()];
    let mut pairs = Vec::new();
    for (_, members) in &groups {
        let avail: Vec<usize> = members.iter().copied().filter(|&i| !used[i]).collect();
        if avail.len() >= 2 {
            pairs.push((cands[avail[0]], cands[avail[1]]));
            used[avail[0]] = true;
            used[avail[1]] = true;
        }
    }

    let leftovers: Vec<usize> = (0..cands.len()).filter(|&i| !used[i]).collect();
    for chunk in leftovers.chunks(2) {
        if let [a, b] = *chunk {
            pairs.push((cands[a], cands[b]));
        }
    }
    pairs
}

/// Field-name home token check used for side assignment. Note the single
/// letter "h" makes this very permissive; ambiguous pairs default to
/// first-field-is-home, which mis-assigns some markup variants; preserved
/// deliberately, see the extractor tests.
fn has_home_token(name: &str) -> bool {
    let n = name.to_lowercase();
    ["heim", "home", "h"].iter().any(|k| n.contains(k))
}

fn assign_home_away<'a>(
    a: ElementRef<'a>,
    b: ElementRef<'a>,
) -> (ElementRef<'a>, ElementRef<'a>) {
    let name_a = a.value().attr("name").unwrap_or("");
    let name_b = b.value().attr("name").unwrap_or("");
    if has_home_token(name_a) || !has_home_token(name_b) {
        (a, b)
    } else {
        (b, a)
    }
}

// ── Form snapshot & page-level discovery ─────────────────────────────────────

/// Serialize a form the way a browser would: named enabled inputs (checkbox
/// and radio only when checked), selects with their selected option, and
/// textareas. The named submit button is kept separately.
pub fn snapshot_form(form: ElementRef<'_>) -> FormSnapshot {
    let mut snapshot = FormSnapshot {
        action: form.value().attr("action").map(str::to_string),
        method: form
            .value()
            .attr("method")
            .unwrap_or("post")
            .to_lowercase(),
        fields: Vec::new(),
        submit: None,
    };

    for input in form.select(&INPUT_SEL) {
        let el = input.value();
        let Some(name) = el.attr("name") else { continue };
        if name.is_empty() || el.attr("disabled").is_some() {
            continue;
        }
        let typ = el.attr("type").unwrap_or("text").to_lowercase();
        match typ.as_str() {
            "submit" => {
                if snapshot.submit.is_none() {
                    snapshot.submit = Some((
                        name.to_string(),
                        el.attr("value").unwrap_or("Speichern").to_string(),
                    ));
                }
            }
            "button" => {}
            "checkbox" | "radio" => {
                if el.attr("checked").is_some() {
                    snapshot
                        .fields
                        .push((name.to_string(), el.attr("value").unwrap_or("on").to_string()));
                }
            }
            _ => {
                snapshot
                    .fields
                    .push((name.to_string(), el.attr("value").unwrap_or("").to_string()));
            }
        }
    }

    for select in form.select(&SELECT_SEL) {
        let el = select.value();
        let Some(name) = el.attr("name") else { continue };
        if name.is_empty() || el.attr("disabled").is_some() {
            continue;
        }
        let options: Vec<ElementRef<'_>> = select.select(&OPTION_SEL).collect();
        let chosen = options
            .iter()
            .copied()
            .find(|o| o.value().attr("selected").is_some())
            .or_else(|| options.first().copied());
        if let Some(opt) = chosen {
            let value = opt
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| dom::visible_text(opt));
            snapshot.fields.push((name.to_string(), value));
        }
    }

    for ta in form.select(&TEXTAREA_SEL) {
        let el = ta.value();
        let Some(name) = el.attr("name") else { continue };
        if name.is_empty() || el.attr("disabled").is_some() {
            continue;
        }
        snapshot
            .fields
            .push((name.to_string(), ta.text().collect::<String>()));
    }

    snapshot
}

/// Season identifier: hidden `tippsaisonId` input, else a raw-HTML scan for
/// an inline script assignment.
pub fn find_season_id(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    if let Ok(sel) = Selector::parse(r#"input[name="tippsaisonId"]"#) {
        if let Some(input) = doc.select(&sel).next() {
            if let Some(v) = input.value().attr("value") {
                let v = v.trim();
                if !v.is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }
    SEASON_ID_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
}

/// Round the portal currently shows: the selected option of the round
/// selector, else the hidden `spieltagIndex` field.
pub fn find_selected_matchday(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    if let Ok(sel) = Selector::parse(r#"select[name="spieltagIndex"] option[selected]"#) {
        if let Some(opt) = doc.select(&sel).next() {
            let value = opt
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| dom::visible_text(opt));
            if let Ok(day) = value.trim().parse() {
                return Some(day);
            }
        }
    }
    input_value(html, "spieltagIndex")?.trim().parse().ok()
}

/// Highest matchday offered by the round selector, when present.
pub fn find_max_matchday(html: &str) -> Option<u32> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(r#"select[name="spieltagIndex"], #spieltagIndex"#).ok()?;
    let select = doc.select(&sel).next()?;
    select
        .select(&OPTION_SEL)
        .filter_map(|opt| {
            opt.value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| dom::visible_text(opt))
                .trim()
                .parse::<u32>()
                .ok()
        })
        .max()
}

/// Current value of a named input on a page; used for submit verification.
pub fn input_value(html: &str, name: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(&format!(r#"input[name="{}"]"#, name)).ok()?;
    doc.select(&sel)
        .next()
        .map(|i| i.value().attr("value").unwrap_or("").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A two-fixture sheet in the portal's usual table markup.
    fn sheet_html() -> String {
        r#"<html><body>
        <form action="/pool/tippabgabe" method="post">
          <input type="hidden" name="tippsaisonId" value="123456789">
          <input type="hidden" name="spieltagIndex" value="7">
          <table>
            <tr>
              <td>18.10.25 15:30</td>
              <td>FC Bayern München</td>
              <td><input name="spieltipps[1].heimTipp" maxlength="2"></td>
              <td><input name="spieltipps[1].gastTipp" maxlength="2"></td>
              <td>Borussia Dortmund</td>
              <td>1.80 / 3.40 / 4.20</td>
            </tr>
            <tr>
              <td>19.10.25 17:30</td>
              <td>1. FC Köln</td>
              <td><input name="spieltipps[2].heimTipp" maxlength="2"></td>
              <td><input name="spieltipps[2].gastTipp" maxlength="2"></td>
              <td>SV Werder Bremen</td>
              <td>2,10/3,30/3,60</td>
            </tr>
          </table>
          <input type="submit" name="submitbutton" value="Tipps speichern">
        </form></body></html>"#
            .to_string()
    }

    #[test]
    fn extracts_rows_with_contiguous_indices() {
        let sheet = extract_tip_sheet(&sheet_html());
        assert_eq!(sheet.rows.len(), 2);
        for (i, row) in sheet.rows.iter().enumerate() {
            assert_eq!(row.index, i as u32 + 1);
        }
    }

    #[test]
    fn pairs_by_stem_and_assigns_sides() {
        let sheet = extract_tip_sheet(&sheet_html());
        let row = &sheet.rows[0];
        assert_eq!(row.home_field_id.as_deref(), Some("spieltipps[1].heimTipp"));
        assert_eq!(row.away_field_id.as_deref(), Some("spieltipps[1].gastTipp"));
        assert_ne!(row.home_field_id, row.away_field_id);
        assert!(row.is_open);
    }

    #[test]
    fn resolves_team_names_from_row_text() {
        let sheet = extract_tip_sheet(&sheet_html());
        assert_eq!(sheet.rows[0].home_team, "FC Bayern München");
        assert_eq!(sheet.rows[0].away_team, "Borussia Dortmund");
        assert_eq!(sheet.rows[1].home_team, "1. FC Köln");
        assert_eq!(sheet.rows[1].away_team, "SV Werder Bremen");
    }

    #[test]
    fn odds_round_trip_both_decimal_styles() {
        let sheet = extract_tip_sheet(&sheet_html());
        assert_eq!(sheet.rows[0].odds_home, Some(1.80));
        assert_eq!(sheet.rows[0].odds_draw, Some(3.40));
        assert_eq!(sheet.rows[0].odds_away, Some(4.20));
        assert_eq!(sheet.rows[1].odds_home, Some(2.10));
        assert_eq!(sheet.rows[1].odds_draw, Some(3.30));
        assert_eq!(sheet.rows[1].odds_away, Some(3.60));
    }

    #[test]
    fn extraction_is_deterministic() {
        let html = sheet_html();
        let first = extract_tip_sheet(&html);
        let second = extract_tip_sheet(&html);
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.form, second.form);
    }

    #[test]
    fn no_form_yields_empty_sheet() {
        let sheet = extract_tip_sheet("<html><body><p>Fehler</p></body></html>");
        assert!(sheet.rows.is_empty());
        assert!(sheet.form.is_none());
    }

    #[test]
    fn single_candidate_yields_no_rows_but_keeps_form() {
        let sheet = extract_tip_sheet(
            r#"<form><input type="hidden" name="spieltagIndex" value="1">
               <input name="heimTipp" maxlength="2"></form>"#,
        );
        assert!(sheet.rows.is_empty());
        assert!(sheet.form.is_some());
    }

    #[test]
    fn disabled_inputs_mark_the_row_closed() {
        let sheet = extract_tip_sheet(
            r#"<form><input type="hidden" name="spieltagIndex" value="1">
               <div><input name="m1.heimTipp" disabled maxlength="2">
                    <input name="m1.gastTipp" disabled maxlength="2"></div></form>"#,
        );
        assert_eq!(sheet.rows.len(), 1);
        assert!(!sheet.rows[0].is_open);
    }

    #[test]
    fn leftover_inputs_pair_sequentially_and_odd_one_drops() {
        // Three inputs whose stems all differ: one sequential pair, the
        // trailing input is dropped.
        let sheet = extract_tip_sheet(
            r#"<form><input type="hidden" name="spieltagIndex" value="1">
               <div><input name="score_x" inputmode="numeric">
                    <input name="score_yy" inputmode="numeric">
                    <input name="score_zzz" inputmode="numeric"></div></form>"#,
        );
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0].home_field_id.as_deref(), Some("score_x"));
        assert_eq!(sheet.rows[0].away_field_id.as_deref(), Some("score_yy"));
    }

    #[test]
    fn truncates_to_nine_rows() {
        let mut html = String::from(
            r#"<form><input type="hidden" name="spieltagIndex" value="1">"#,
        );
        for i in 1..=12 {
            html.push_str(&format!(
                r#"<div><input name="m{i}.heimTipp" maxlength="2">
                   <input name="m{i}.gastTipp" maxlength="2"></div>"#
            ));
        }
        html.push_str("</form>");
        let sheet = extract_tip_sheet(&html);
        assert_eq!(sheet.rows.len(), MAX_ROWS);
        assert_eq!(sheet.rows.last().unwrap().index, MAX_ROWS as u32);
    }

    #[test]
    fn ambiguous_pair_defaults_first_field_to_home() {
        // Neither name carries a recognizable home/away token ("x"/"y").
        // The documented (and deliberately preserved) default puts the first
        // field on the home side even though the markup gives no evidence.
        let sheet = extract_tip_sheet(
            r#"<form><input type="hidden" name="spieltagIndex" value="1">
               <div><input name="x1" inputmode="numeric">
                    <input name="y1" inputmode="numeric"></div></form>"#,
        );
        assert_eq!(sheet.rows[0].home_field_id.as_deref(), Some("x1"));
    }

    #[test]
    fn form_snapshot_carries_hidden_fields_and_submit() {
        let sheet = extract_tip_sheet(&sheet_html());
        let form = sheet.form.unwrap();
        assert_eq!(form.get("tippsaisonId"), Some("123456789"));
        assert_eq!(form.get("spieltagIndex"), Some("7"));
        assert_eq!(
            form.submit,
            Some(("submitbutton".to_string(), "Tipps speichern".to_string()))
        );
        assert_eq!(form.action.as_deref(), Some("/pool/tippabgabe"));
        assert_eq!(form.method, "post");
    }

    #[test]
    fn season_id_from_hidden_input_and_raw_scan() {
        assert_eq!(
            find_season_id(&sheet_html()).as_deref(),
            Some("123456789")
        );
        let js = r#"<html><script>var tippsaisonId = "987654321";</script></html>"#;
        assert_eq!(find_season_id(js).as_deref(), Some("987654321"));
        assert_eq!(find_season_id("<html></html>"), None);
    }

    #[test]
    fn max_matchday_from_round_selector() {
        let html = r#"<select name="spieltagIndex">
            <option value="1">1</option><option value="17">17</option>
            <option value="34">34</option></select>"#;
        assert_eq!(find_max_matchday(html), Some(34));
        assert_eq!(find_max_matchday("<html></html>"), None);
    }

    #[test]
    fn selected_matchday_prefers_the_selector_over_the_hidden_field() {
        let html = r#"<select name="spieltagIndex">
            <option value="7">7</option><option value="8" selected>8</option></select>"#;
        assert_eq!(find_selected_matchday(html), Some(8));
        // The sheet fixture carries only the hidden field (value 7).
        assert_eq!(find_selected_matchday(&sheet_html()), Some(7));
        assert_eq!(find_selected_matchday("<html></html>"), None);
    }

    #[test]
    fn stem_strips_side_tokens_and_digits() {
        assert_eq!(
            stem("spieltipps[1].heimTipp"),
            stem("spieltipps[1].gastTipp")
        );
        assert_ne!(stem("spieltipps[1].tippx"), stem("spieltipps[2].tippq"));
    }
}
