//! Team-name resolution for a paired fixture.
//!
//! The portal's markup is not stable, so names are recovered by a prioritized
//! list of independent strategies, tried in order until one yields both
//! names. Each strategy is a plain function over the same scope, which keeps
//! the chain testable strategy-by-strategy. When everything fails the row
//! falls back to the literal placeholders "Heim"/"Gast".

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use super::dom::{nearest_tr, stripped_strings};

pub const PLACEHOLDER_HOME: &str = "Heim";
pub const PLACEHOLDER_AWAY: &str = "Gast";

/// Label-ish tokens that can never be team names.
const BAD_TOKENS: [&str; 11] = [
    "tipp", "joker", "punkte", "quote", "remis", "heim", "gast", "home", "away", "vs", ":",
];

/// Input attributes that may carry a team name directly.
const NAME_ATTRS: [&str; 9] = [
    "data-team",
    "data-verein",
    "data-home-team",
    "data-away-team",
    "data-team-name",
    "data-name",
    "aria-label",
    "title",
    "placeholder",
];

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}\.\d{1,2}\.\d{2,4}").unwrap());
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}(:\d{2})?$").unwrap());
static PURE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").unwrap());

/// Everything a resolver strategy may look at.
pub struct ResolveScope<'a> {
    pub doc: &'a Html,
    pub container: ElementRef<'a>,
    pub home_input: ElementRef<'a>,
    pub away_input: ElementRef<'a>,
}

type Strategy = fn(&ResolveScope<'_>) -> Option<(String, String)>;

/// Resolution order matters: precise sources first, broad text scans last.
const STRATEGIES: [Strategy; 5] = [
    input_attributes,
    bound_labels,
    container_hints,
    table_row_scan,
    container_text_scan,
];

/// Run the strategy chain; always yields two names, placeholders as a last
/// resort.
pub fn resolve_team_names(scope: &ResolveScope<'_>) -> (String, String) {
    for strategy in STRATEGIES {
        if let Some((home, away)) = strategy(scope) {
            return (home, away);
        }
    }
    // The final scan may have found one usable name; re-run it leniently so a
    // half-resolved row keeps what it has.
    let texts: Vec<&str> = stripped_strings(scope.container).collect();
    let (home, away) = choose_two_names(&texts);
    (
        home.unwrap_or_else(|| PLACEHOLDER_HOME.to_string()),
        away.unwrap_or_else(|| PLACEHOLDER_AWAY.to_string()),
    )
}

// ── Strategies ───────────────────────────────────────────────────────────────

/// (a) Explicit data/accessibility attributes on the two inputs.
fn input_attributes(scope: &ResolveScope<'_>) -> Option<(String, String)> {
    let home = attr_name(scope.home_input)?;
    let away = attr_name(scope.away_input)?;
    Some((home, away))
}

fn attr_name(input: ElementRef<'_>) -> Option<String> {
    for key in NAME_ATTRS {
        if let Some(v) = input.value().attr(key) {
            let v = v.trim();
            if !v.is_empty() && !is_generic_placeholder(v) {
                return Some(v.to_string());
            }
        }
    }
    None
}

/// (b) `<label for=...>` or `aria-labelledby` bound to the inputs.
fn bound_labels(scope: &ResolveScope<'_>) -> Option<(String, String)> {
    let home = label_text(scope.doc, scope.home_input)?;
    let away = label_text(scope.doc, scope.away_input)?;
    Some((home, away))
}

fn label_text(doc: &Html, input: ElementRef<'_>) -> Option<String> {
    if let Some(id) = input.value().attr("id") {
        if let Ok(sel) = Selector::parse(&format!(r#"label[for="{}"]"#, id)) {
            if let Some(label) = doc.select(&sel).next() {
                let text = super::dom::visible_text(label);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    if let Some(label_id) = input.value().attr("aria-labelledby") {
        if let Ok(sel) = Selector::parse(&format!("#{}", label_id)) {
            if let Some(label) = doc.select(&sel).next() {
                let text = super::dom::visible_text(label);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// (c) Tightly-scoped home/away-styled nodes inside the pair container.
fn container_hints(scope: &ResolveScope<'_>) -> Option<(String, String)> {
    let home = select_first_text(
        scope.container,
        &[".heim", ".home", ".team-heim", ".teamhome", "[data-home]"],
    )?;
    let away = select_first_text(
        scope.container,
        &[".gast", ".away", ".team-gast", ".teamaway", "[data-away]"],
    )?;
    if is_generic_placeholder(&home) || is_generic_placeholder(&away) {
        return None;
    }
    Some((home, away))
}

fn select_first_text(el: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for s in selectors {
        if let Ok(sel) = Selector::parse(s) {
            if let Some(node) = el.select(&sel).next() {
                let text = super::dom::visible_text(node);
                if !text.is_empty() {
                    return Some(text);
                }
            }
        }
    }
    None
}

/// (d) Scan the nearest enclosing table row: logo alts, titled anchors, then
/// plain text, noise-filtered, first two survivors win.
fn table_row_scan(scope: &ResolveScope<'_>) -> Option<(String, String)> {
    let tr = nearest_tr(scope.container)
        .or_else(|| nearest_tr(scope.home_input))
        .or_else(|| nearest_tr(scope.away_input))
        .unwrap_or(scope.container);

    let mut texts: Vec<&str> = Vec::new();
    if let Ok(sel) = Selector::parse("img[alt]") {
        for img in tr.select(&sel) {
            if let Some(alt) = img.value().attr("alt") {
                let alt = alt.trim();
                if !alt.is_empty() {
                    texts.push(alt);
                }
            }
        }
    }
    if let Ok(sel) = Selector::parse("a[title], abbr[title], span[title]") {
        for node in tr.select(&sel) {
            if let Some(title) = node.value().attr("title") {
                let title = title.trim();
                if !title.is_empty() {
                    texts.push(title);
                }
            }
        }
    }
    texts.extend(stripped_strings(tr).filter(|t| t.len() >= 2));

    match choose_two_names(&texts) {
        (Some(home), Some(away)) => Some((home, away)),
        _ => None,
    }
}

/// (e) Last resort: the container's own visible text with the same filter.
fn container_text_scan(scope: &ResolveScope<'_>) -> Option<(String, String)> {
    let texts: Vec<&str> = stripped_strings(scope.container)
        .filter(|t| t.len() >= 2)
        .collect();
    match choose_two_names(&texts) {
        (Some(home), Some(away)) => Some((home, away)),
        _ => None,
    }
}

// ── Filtering ────────────────────────────────────────────────────────────────

fn is_generic_placeholder(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "heim" | "gast" | "home" | "away"
    )
}

/// A text fragment qualifies as a team-name candidate when it is not a known
/// label token, not a bare number, not a date (`dd.mm.yy[yy]`), not a clock
/// time (`hh:mm[:ss]`), and at least 3 characters long.
fn is_valid_team_name(t: &str) -> bool {
    let trimmed = t.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }
    let lower = trimmed.to_lowercase();
    if BAD_TOKENS.contains(&lower.as_str()) {
        return false;
    }
    if PURE_NUMBER_RE.is_match(trimmed)
        || DATE_RE.is_match(trimmed)
        || TIME_RE.is_match(trimmed)
    {
        return false;
    }
    true
}

/// Noise-filter and order-preserving dedupe; the first two survivors become
/// the home and away names.
fn choose_two_names(texts: &[&str]) -> (Option<String>, Option<String>) {
    let mut uniq: Vec<String> = Vec::new();
    for t in texts {
        let t = t.trim();
        if !is_valid_team_name(t) {
            continue;
        }
        if !uniq.iter().any(|u| u == t) {
            uniq.push(t.to_string());
        }
        if uniq.len() == 2 {
            break;
        }
    }
    let mut it = uniq.into_iter();
    (it.next(), it.next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope_from<'a>(
        doc: &'a Html,
        container_sel: &str,
    ) -> (ElementRef<'a>, ElementRef<'a>, ElementRef<'a>) {
        let csel = Selector::parse(container_sel).unwrap();
        let isel = Selector::parse("input").unwrap();
        let container = doc.select(&csel).next().unwrap();
        let mut inputs = container.select(&isel);
        let home = inputs.next().unwrap();
        let away = inputs.next().unwrap();
        (container, home, away)
    }

    #[test]
    fn attributes_win_over_everything() {
        let doc = Html::parse_document(
            r#"<div id="c"><span>ignored text here</span>
               <input name="h" data-team="FC Augsburg">
               <input name="a" title="SC Freiburg"></div>"#,
        );
        let (container, home_input, away_input) = scope_from(&doc, "#c");
        let scope = ResolveScope { doc: &doc, container, home_input, away_input };
        assert_eq!(
            resolve_team_names(&scope),
            ("FC Augsburg".to_string(), "SC Freiburg".to_string())
        );
    }

    #[test]
    fn generic_placeholder_attributes_are_skipped() {
        let doc = Html::parse_document(
            r#"<div id="c">
               <input id="ih" name="h" placeholder="Heim">
               <input id="ia" name="a" placeholder="Gast">
               <label for="ih">VfL Bochum</label>
               <label for="ia">Hertha BSC</label></div>"#,
        );
        let (container, home_input, away_input) = scope_from(&doc, "#c");
        let scope = ResolveScope { doc: &doc, container, home_input, away_input };
        assert_eq!(
            resolve_team_names(&scope),
            ("VfL Bochum".to_string(), "Hertha BSC".to_string())
        );
    }

    #[test]
    fn table_row_scan_filters_noise() {
        let doc = Html::parse_document(
            r#"<table><tr><td>18.10.25</td><td>18:30</td>
               <td>Werder Bremen</td><td id="c"><input name="h"><input name="a"></td>
               <td>VfB Stuttgart</td><td>Quote</td><td>42</td></tr></table>"#,
        );
        let (container, home_input, away_input) = scope_from(&doc, "#c");
        let scope = ResolveScope { doc: &doc, container, home_input, away_input };
        assert_eq!(
            resolve_team_names(&scope),
            ("Werder Bremen".to_string(), "VfB Stuttgart".to_string())
        );
    }

    #[test]
    fn logo_alt_text_is_preferred_within_the_row() {
        let doc = Html::parse_document(
            r#"<table><tr>
               <td><img alt="RB Leipzig" src="l.png"></td>
               <td><img alt="1. FC Union Berlin" src="u.png"></td>
               <td id="c"><input name="h"><input name="a"></td></tr></table>"#,
        );
        let (container, home_input, away_input) = scope_from(&doc, "#c");
        let scope = ResolveScope { doc: &doc, container, home_input, away_input };
        assert_eq!(
            resolve_team_names(&scope),
            ("RB Leipzig".to_string(), "1. FC Union Berlin".to_string())
        );
    }

    #[test]
    fn exhausted_chain_falls_back_to_placeholders() {
        let doc = Html::parse_document(
            r#"<div id="c"><input name="h"><input name="a"><span>42</span></div>"#,
        );
        let (container, home_input, away_input) = scope_from(&doc, "#c");
        let scope = ResolveScope { doc: &doc, container, home_input, away_input };
        assert_eq!(
            resolve_team_names(&scope),
            (PLACEHOLDER_HOME.to_string(), PLACEHOLDER_AWAY.to_string())
        );
    }

    #[test]
    fn single_survivor_keeps_one_side() {
        let doc = Html::parse_document(
            r#"<div id="c"><input name="h"><input name="a"><span>Hansa Rostock</span></div>"#,
        );
        let (container, home_input, away_input) = scope_from(&doc, "#c");
        let scope = ResolveScope { doc: &doc, container, home_input, away_input };
        assert_eq!(
            resolve_team_names(&scope),
            ("Hansa Rostock".to_string(), PLACEHOLDER_AWAY.to_string())
        );
    }

    #[test]
    fn duplicate_fragments_are_deduplicated_in_order() {
        let (home, away) =
            choose_two_names(&["Mainz 05", "Mainz 05", "1. FC Köln", "Mainz 05"]);
        assert_eq!(home.as_deref(), Some("Mainz 05"));
        assert_eq!(away.as_deref(), Some("1. FC Köln"));
    }

    #[test]
    fn date_and_time_variants_are_rejected() {
        assert!(!is_valid_team_name("18.10.2025"));
        assert!(!is_valid_team_name("7.3.25"));
        assert!(!is_valid_team_name("18:30"));
        assert!(!is_valid_team_name("18:30:00"));
        assert!(!is_valid_team_name("90"));
        assert!(!is_valid_team_name("vs"));
        assert!(is_valid_team_name("1899 Hoffenheim"));
    }
}
