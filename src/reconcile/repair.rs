//! Soft repair for draw-heavy prediction lists. Unlike the hard validation
//! reject, this keeps the model's work and only flips a few draws into
//! narrow non-draws, a minimal intervention.

use tracing::info;

use crate::models::Prediction;

use super::MAX_GOALS;

/// Draw share above which a list counts as suspiciously flat.
pub const DEFAULT_MAX_DRAW_SHARE: f64 = 0.45;
/// Lists shorter than this are left alone, the share is too noisy.
const MIN_LIST_LEN: usize = 5;

/// If more than `max_draw_share` of the predictions are draws, walk the list
/// in order and convert draws into narrow results: the home side is bumped
/// while it sits at 0 or 1, otherwise the away side. At most `max(1, n/3)`
/// tips are touched; a draw already at the goal ceiling on both sides is
/// left standing. Returns the number of changed tips.
pub fn soften_draw_degeneration(predictions: &mut [Prediction], max_draw_share: f64) -> usize {
    let n = predictions.len();
    if n < MIN_LIST_LEN {
        return 0;
    }
    let draws = predictions.iter().filter(|p| p.is_draw()).count();
    if (draws as f64) / (n as f64) <= max_draw_share {
        return 0;
    }

    let limit = std::cmp::max(1, n / 3);
    let mut changed = 0;
    for p in predictions.iter_mut() {
        if changed >= limit {
            break;
        }
        if !p.is_draw() {
            continue;
        }
        if p.predicted_home_goals <= 1 {
            p.predicted_home_goals += 1;
        } else if p.predicted_away_goals < MAX_GOALS {
            p.predicted_away_goals += 1;
        } else {
            continue;
        }
        p.reason.push_str(" (Remis zur Diversifizierung aufgelöst)");
        changed += 1;
    }

    if changed > 0 {
        info!(
            draws,
            total = n,
            changed, "Draw-heavy prediction list softened"
        );
    }
    changed
}
