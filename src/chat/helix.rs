use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::hub::BroadcastHub;
use crate::status::StatusTracker;

const TOKEN_URL: &str = "https://id.twitch.tv/oauth2/token";
const STREAMS_URL: &str = "https://api.twitch.tv/helix/streams";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    data: Vec<serde_json::Value>,
}

#[derive(Debug)]
struct AppToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Out-of-band stream liveness check against the Helix API.
///
/// A failed poll leaves `stream_live` at its last known value; only a
/// successful response flips the flag.
pub struct LivenessPoller {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    channel: String,
    poll_interval: Duration,
    status: Arc<StatusTracker>,
    hub: Arc<BroadcastHub>,
    token: Option<AppToken>,
}

impl LivenessPoller {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        channel: &str,
        poll_interval: Duration,
        status: Arc<StatusTracker>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            channel: channel.to_lowercase(),
            poll_interval,
            status,
            hub,
            token: None,
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.check_stream_status().await {
                        tracing::warn!(error = %e, "Stream liveness check failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
        tracing::info!("Liveness poller stopped");
    }

    async fn check_stream_status(&mut self) -> Result<()> {
        self.ensure_token().await?;
        let mut response = self.streams_request().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::info!("Helix token rejected, refreshing and retrying");
            self.refresh_token().await?;
            response = self.streams_request().await?;
        }

        let payload: StreamsResponse = response
            .error_for_status()
            .context("streams query returned error status")?
            .json()
            .await
            .context("streams response was not valid JSON")?;

        let is_live = !payload.data.is_empty();
        if let Some(snapshot) = self.status.set_stream_live(is_live) {
            tracing::info!(live = is_live, channel = %self.channel, "Stream liveness changed");
            self.hub.publish_status(&snapshot);
        }
        Ok(())
    }

    async fn streams_request(&self) -> Result<reqwest::Response> {
        let token = self
            .token
            .as_ref()
            .map(|t| t.access_token.clone())
            .unwrap_or_default();
        self.http
            .get(STREAMS_URL)
            .bearer_auth(token)
            .header("Client-Id", &self.client_id)
            .query(&[("user_login", &self.channel)])
            .send()
            .await
            .context("streams query failed")
    }

    async fn ensure_token(&mut self) -> Result<()> {
        if let Some(token) = &self.token {
            if token.expires_at - Utc::now() > ChronoDuration::seconds(60) {
                return Ok(());
            }
        }
        self.refresh_token().await
    }

    async fn refresh_token(&mut self) -> Result<()> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("token request failed")?
            .error_for_status()
            .context("token request returned error status")?;

        let payload: TokenResponse = response
            .json()
            .await
            .context("token response was not valid JSON")?;

        tracing::info!(expires_in = payload.expires_in, "Obtained Helix app token");
        self.token = Some(AppToken {
            access_token: payload.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(payload.expires_in),
        });
        Ok(())
    }
}
