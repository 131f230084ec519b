use anyhow::{bail, Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::extract::{self, TipSheet};
use crate::models::Prediction;
use crate::output::mask_secret;

/// Session-holding client for the tipping portal. Cookies live in the
/// underlying HTTP client, so one login carries every later request.
#[derive(Clone)]
pub struct PortalClient {
    http: Client,
    base: Url,
    community: String,
}

impl PortalClient {
    pub fn new(base_url: &str, community: &str) -> Result<Self> {
        let http = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) tippbot/0.3")
            .build()
            .context("Failed to build HTTP client")?;
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid portal base URL: {base_url}"))?;
        Ok(PortalClient {
            http,
            base,
            community: community.trim_matches('/').to_string(),
        })
    }

    /// Log in with the portal's credential form and confirm the session by
    /// checking that the profile page no longer shows the login fields.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        info!(
            user = %mask_secret(username),
            "Logging in to {}", self.base
        );
        let login_url = self.base.join("info/profil/loginaction")?;
        let resp = self
            .http
            .post(login_url)
            .form(&[("kennung", username), ("passwort", password)])
            .send()
            .await
            .context("Login request failed")?;
        if !resp.status().is_success() {
            bail!("Login request returned HTTP {}", resp.status());
        }

        let profile = self
            .http
            .get(self.base.join("info/profil/")?)
            .send()
            .await
            .context("Profile check request failed")?
            .text()
            .await?;
        if profile.contains(r#"name="kennung""#) {
            bail!("Login rejected, the profile page still shows the credential form");
        }
        info!("Login confirmed");
        Ok(())
    }

    fn tip_sheet_url(&self, season_id: Option<&str>, matchday: Option<u32>) -> Result<Url> {
        let mut url = self.base.join(&format!("{}/tippabgabe", self.community))?;
        {
            let mut q = url.query_pairs_mut();
            if let Some(id) = season_id {
                q.append_pair("tippsaisonId", id);
            }
            if let Some(day) = matchday {
                q.append_pair("spieltagIndex", &day.to_string());
            }
        }
        Ok(url)
    }

    /// Fetch one tip-sheet page. Without parameters the portal serves the
    /// current round, which is how discovery bootstraps.
    pub async fn fetch_tip_sheet(
        &self,
        season_id: Option<&str>,
        matchday: Option<u32>,
    ) -> Result<String> {
        let url = self.tip_sheet_url(season_id, matchday)?;
        debug!("Fetching {url}");
        let resp = self.http.get(url.clone()).send().await
            .with_context(|| format!("Fetch of {url} failed"))?;
        if !resp.status().is_success() {
            bail!("Tip sheet fetch returned HTTP {}", resp.status());
        }
        Ok(resp.text().await?)
    }

    /// Submit predictions through the sheet's own form and verify them by
    /// reading the sheet back. One silent retry on mismatch; a second
    /// mismatch is an error.
    pub async fn submit_predictions(
        &self,
        sheet: &TipSheet,
        predictions: &[Prediction],
        season_id: Option<&str>,
        matchday: Option<u32>,
    ) -> Result<()> {
        let form = sheet
            .form
            .as_ref()
            .context("Cannot submit, the sheet carried no form")?;

        let mut filled = form.clone();
        for pred in predictions {
            let row = sheet.rows.iter().find(|r| r.index == pred.row_index);
            let Some(row) = row else { continue };
            if !row.is_open {
                continue;
            }
            if let Some(name) = &row.home_field_id {
                filled.set(name, pred.predicted_home_goals.to_string());
            }
            if let Some(name) = &row.away_field_id {
                filled.set(name, pred.predicted_away_goals.to_string());
            }
        }
        if let Some((name, value)) = &form.submit {
            filled.fields.push((name.clone(), value.clone()));
        }
        let fields = filled.fields;

        let action = match &form.action {
            Some(a) if !a.is_empty() => self.base.join(a)?,
            _ => self.tip_sheet_url(season_id, matchday)?,
        };

        for attempt in 1..=2u32 {
            info!(attempt, "Submitting {} prediction(s) to {action}", predictions.len());
            let resp = self
                .http
                .post(action.clone())
                .form(&fields)
                .send()
                .await
                .context("Tip submission failed")?;
            if !resp.status().is_success() {
                bail!("Tip submission returned HTTP {}", resp.status());
            }

            let mismatches = self
                .verify(predictions, sheet, season_id, matchday)
                .await?;
            if mismatches.is_empty() {
                info!("All submitted tips verified on the reloaded sheet");
                return Ok(());
            }
            warn!(
                attempt,
                "Reloaded sheet disagrees for row(s) {:?}", mismatches
            );
        }
        bail!("Submitted tips did not stick after a retry")
    }

    /// Reload the sheet and compare every open predicted row's input values
    /// against what was submitted. Returns the row indices that disagree.
    async fn verify(
        &self,
        predictions: &[Prediction],
        sheet: &TipSheet,
        season_id: Option<&str>,
        matchday: Option<u32>,
    ) -> Result<Vec<u32>> {
        let html = self.fetch_tip_sheet(season_id, matchday).await?;
        let mut mismatches = Vec::new();
        for pred in predictions {
            let Some(row) = sheet.rows.iter().find(|r| r.index == pred.row_index) else {
                continue;
            };
            if !row.is_open {
                continue;
            }
            let ok = |field: &Option<String>, goals: u8| {
                field.as_deref().map_or(true, |name| {
                    extract::input_value(&html, name).as_deref()
                        == Some(goals.to_string().as_str())
                })
            };
            if !ok(&row.home_field_id, pred.predicted_home_goals)
                || !ok(&row.away_field_id, pred.predicted_away_goals)
            {
                mismatches.push(pred.row_index);
            }
        }
        Ok(mismatches)
    }
}
