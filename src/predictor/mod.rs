//! Prediction sources. The portal-facing code only sees the `Predictor`
//! trait; the OpenAI implementation lives behind it so a run can fall back
//! to odds-only predictions when no API key is configured.

pub mod openai;
pub mod prompt;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{MatchRow, Prediction};

pub use openai::{OpenAiPredictor, OpenAiSettings};

/// A source of scoreline predictions for one matchday sheet.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Produce validated predictions for the given rows. Implementations
    /// return only predictions that already passed reconciliation; callers
    /// still backfill rows the source skipped.
    async fn predict(&self, rows: &[MatchRow], matchday: u32) -> Result<Vec<Prediction>>;
}
