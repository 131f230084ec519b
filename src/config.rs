use clap::Parser;
use std::path::PathBuf;

/// Kicktipp tipping bot: extracts the tip sheet, asks an LLM (or the odds)
/// for scorelines, and submits them.
#[derive(Parser, Debug, Clone)]
#[command(name = "tippbot", version, about)]
pub struct Config {
    /// Run without submitting anything (predictions are only logged/saved)
    #[arg(long, env = "DRY_RUN", default_value = "false")]
    pub dry_run: bool,

    /// Portal base URL
    #[arg(
        long,
        env = "KICKTIPP_BASE_URL",
        default_value = "https://www.kicktipp.de"
    )]
    pub base_url: String,

    /// Prediction-game (community) slug, the path segment after the base URL
    #[arg(long, env = "KICKTIPP_COMMUNITY")]
    pub community: String,

    /// Portal login name or e-mail address
    #[arg(long, env = "KICKTIPP_USERNAME")]
    pub username: String,

    /// Portal password
    #[arg(long, env = "KICKTIPP_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Tip exactly this matchday (default: the round the portal shows)
    #[arg(long, env = "MATCHDAY")]
    pub matchday: Option<u32>,

    /// Tip every matchday from the current one through the season's last
    #[arg(long, env = "ALL_REMAINING", default_value = "false")]
    pub all_remaining: bool,

    /// OpenAI API key; without it predictions come from the odds alone
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI model used for predictions
    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o")]
    pub openai_model: String,

    /// OpenAI API base URL
    #[arg(
        long,
        env = "OPENAI_API_URL",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_api_url: String,

    /// Sampling temperature for the prediction calls
    #[arg(long, env = "OPENAI_TEMPERATURE", default_value = "0.8")]
    pub openai_temperature: f64,

    /// Per-request timeout for the prediction calls, in seconds
    #[arg(long, env = "OPENAI_TIMEOUT", default_value = "120")]
    pub openai_timeout_secs: u64,

    /// Attempts per matchday before the predictor gives up
    #[arg(long, env = "OPENAI_MAX_RETRIES", default_value = "3")]
    pub openai_max_retries: u32,

    /// Derive tips from the odds when the predictor fails (or has no key)
    #[arg(long, env = "ALLOW_HEURISTIC_FALLBACK", default_value = "false")]
    pub allow_heuristic_fallback: bool,

    /// Draw share above which a prediction list gets diversified
    #[arg(long, env = "PRED_MAX_DRAW_SHARE", default_value = "0.45")]
    pub max_draw_share: f64,

    /// Accept prediction lists that are mostly 1:1 instead of re-prompting
    #[arg(long, env = "ALLOW_DEGENERATE", default_value = "false")]
    pub allow_degenerate: bool,

    /// Directory for run artifacts (fetched pages, raw replies, predictions)
    #[arg(long, env = "TIPPBOT_OUT_DIR")]
    pub out_dir: Option<PathBuf>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.community.trim().is_empty() {
            anyhow::bail!("KICKTIPP_COMMUNITY must not be empty");
        }
        if self.username.trim().is_empty() || self.password.is_empty() {
            anyhow::bail!("KICKTIPP_USERNAME and KICKTIPP_PASSWORD are required");
        }
        if let Some(day) = self.matchday {
            if !(1..=34).contains(&day) {
                anyhow::bail!("matchday must be between 1 and 34, got {day}");
            }
            if self.all_remaining {
                anyhow::bail!("--matchday and --all-remaining are mutually exclusive");
            }
        }
        if self.openai_api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
            anyhow::bail!("OPENAI_API_KEY is set but empty");
        }
        if self.openai_api_key.is_none() && !self.allow_heuristic_fallback {
            anyhow::bail!(
                "OPENAI_API_KEY is required unless --allow-heuristic-fallback is set"
            );
        }
        if !(0.0..=2.0).contains(&self.openai_temperature) {
            anyhow::bail!("openai_temperature must be between 0.0 and 2.0");
        }
        if self.openai_max_retries == 0 {
            anyhow::bail!("openai_max_retries must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.max_draw_share) {
            anyhow::bail!("max_draw_share must be between 0.0 and 1.0");
        }
        Ok(())
    }
}
