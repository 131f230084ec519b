use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

mod config;
mod extract;
mod models;
mod output;
mod portal;
mod predictor;
mod reconcile;

use config::Config;
use models::MatchRow;
use portal::PortalClient;
use predictor::{OpenAiPredictor, OpenAiSettings, Predictor};
use reconcile::{backfill, repair};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.dry_run {
        info!("🟡 DRY RUN mode – predictions are computed but nothing is submitted");
    } else {
        info!("🔴 LIVE mode – tips WILL be submitted to {}", config.base_url);
    }

    let portal = PortalClient::new(&config.base_url, &config.community)?;
    portal.login(&config.username, &config.password).await?;

    let predictor: Option<Box<dyn Predictor>> = match &config.openai_api_key {
        Some(key) => Some(Box::new(OpenAiPredictor::new(
            &config.openai_api_url,
            key.clone(),
            config.openai_model.clone(),
            OpenAiSettings {
                temperature: config.openai_temperature,
                timeout_secs: config.openai_timeout_secs,
                max_retries: config.openai_max_retries,
                forbid_degenerate: !config.allow_degenerate,
            },
            config.out_dir.as_ref().map(|d| d.join("raw")),
        )?)),
        None => {
            info!("No OpenAI key configured, predictions will come from the odds alone");
            None
        }
    };

    // Bootstrap from the round the portal shows by default.
    let overview = portal.fetch_tip_sheet(None, None).await?;
    let season_id = extract::find_season_id(&overview);
    let current = extract::find_selected_matchday(&overview);
    let max_day = extract::find_max_matchday(&overview);
    info!(
        season_id = season_id.as_deref().unwrap_or("?"),
        current = current.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
        last = max_day.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
        "Season discovered"
    );

    let matchdays: Vec<Option<u32>> = if let Some(day) = config.matchday {
        vec![Some(day)]
    } else if config.all_remaining {
        match (current, max_day) {
            (Some(c), Some(m)) if c <= m => (c..=m).map(Some).collect(),
            _ => {
                warn!("Season bounds not discoverable, tipping the current round only");
                vec![None]
            }
        }
    } else {
        vec![current]
    };

    for day in matchdays {
        if let Err(e) = run_matchday(
            &portal,
            predictor.as_deref(),
            &config,
            season_id.as_deref(),
            day,
        )
        .await
        {
            error!(
                "Matchday {} failed: {e:#}",
                day.map(|d| d.to_string()).unwrap_or_else(|| "current".into())
            );
        }
    }

    Ok(())
}

async fn run_matchday(
    portal: &PortalClient,
    predictor: Option<&dyn Predictor>,
    config: &Config,
    season_id: Option<&str>,
    day: Option<u32>,
) -> Result<()> {
    let html = portal.fetch_tip_sheet(season_id, day).await?;
    let matchday = day
        .or_else(|| extract::find_selected_matchday(&html))
        .unwrap_or(0);
    if let Some(dir) = &config.out_dir {
        output::write_text(&dir.join("raw"), &format!("tippabgabe_{matchday}"), "html", &html)?;
    }

    let sheet = extract::extract_tip_sheet(&html);
    if sheet.rows.is_empty() {
        warn!(matchday, "No usable tip sheet on this page, skipping the round");
        return Ok(());
    }
    if let Some(dir) = &config.out_dir {
        output::write_json(&dir.join("forms"), &format!("rows_{matchday}"), &sheet.rows)?;
    }
    let open: Vec<MatchRow> = sheet.rows.iter().filter(|r| r.is_open).cloned().collect();
    info!(
        matchday,
        rows = sheet.rows.len(),
        open = open.len(),
        "Tip sheet extracted"
    );
    if open.is_empty() {
        info!(matchday, "Every fixture is already closed, nothing to tip");
        return Ok(());
    }

    let mut predictions = match predictor {
        Some(p) => match p.predict(&open, matchday).await {
            Ok(preds) => preds,
            Err(e) if config.allow_heuristic_fallback => {
                warn!(
                    "Predictor '{}' gave up, deriving tips from the odds: {e:#}",
                    p.name()
                );
                backfill::predictions_from_odds(&open, matchday)
            }
            Err(e) => {
                return Err(e.context(
                    "Predictor failed and the heuristic fallback is not enabled",
                ))
            }
        },
        None => backfill::predictions_from_odds(&open, matchday),
    };
    predictions = backfill::backfill_missing(predictions, &open, matchday);
    repair::soften_draw_degeneration(&mut predictions, config.max_draw_share);

    for p in &predictions {
        info!(
            "  [{}] {} {}:{} {}  ({})",
            p.row_index,
            p.home_team,
            p.predicted_home_goals,
            p.predicted_away_goals,
            p.away_team,
            p.reason
        );
    }
    if let Some(dir) = &config.out_dir {
        output::write_json(
            &dir.join("predictions"),
            &format!("predictions_{matchday}"),
            &predictions,
        )?;
    }

    if config.dry_run {
        info!(matchday, "Dry run, skipping submission");
        return Ok(());
    }
    portal
        .submit_predictions(&sheet, &predictions, season_id, day)
        .await
}
