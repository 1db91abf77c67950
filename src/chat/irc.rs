use anyhow::{Context, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::tungstenite;

use super::parse::{contains_keyword, parse_line, IrcMessage};
use crate::event::ChatConnectionStatus;
use crate::hub::BroadcastHub;
use crate::status::StatusTracker;
use crate::tally::KeywordTally;

const TWITCH_IRC_URL: &str = "wss://irc-ws.chat.twitch.tv:443";

/// Exponential backoff for reconnection.
struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// IRC-over-WebSocket chat listener. Counts keyword votes into the shared
/// tally and keeps the chat-connected flag current. Network failures are
/// recoverable by construction: the run loop only exits on shutdown.
pub struct ChatListener {
    username: String,
    oauth_token: String,
    channel: String,
    up_keyword: String,
    down_keyword: String,
    tally: Arc<KeywordTally>,
    status: Arc<StatusTracker>,
    hub: Arc<BroadcastHub>,
}

impl ChatListener {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        username: &str,
        oauth_token: &str,
        channel: &str,
        up_keyword: &str,
        down_keyword: &str,
        tally: Arc<KeywordTally>,
        status: Arc<StatusTracker>,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            username: username.to_lowercase(),
            oauth_token: oauth_token.to_string(),
            channel: channel.to_lowercase(),
            up_keyword: up_keyword.to_string(),
            down_keyword: down_keyword.to_string(),
            tally,
            status,
            hub,
        }
    }

    /// Connect and run the chat loop with automatic reconnection.
    pub async fn connect_and_run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.connect_once(&mut backoff, &mut shutdown).await {
                Ok(()) => {
                    // Clean shutdown requested
                    self.mark_disconnected();
                    break;
                }
                Err(e) => {
                    self.mark_disconnected();
                    let delay = backoff.next_delay();
                    let state = ChatConnectionStatus::Reconnecting {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    };
                    tracing::warn!(error = %e, state = ?state, "Chat connection lost");

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during chat reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        backoff: &mut ExponentialBackoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        tracing::info!(channel = %self.channel, "Connecting to chat");

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(TWITCH_IRC_URL)
            .await
            .context("chat WebSocket connect failed")?;

        let (mut write, mut read) = ws_stream.split();

        write
            .send(tungstenite::Message::Text(format!(
                "PASS {}",
                self.oauth_token
            )))
            .await
            .context("failed to send PASS")?;
        write
            .send(tungstenite::Message::Text(format!("NICK {}", self.username)))
            .await
            .context("failed to send NICK")?;
        write
            .send(tungstenite::Message::Text(format!("JOIN #{}", self.channel)))
            .await
            .context("failed to send JOIN")?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            for line in text.lines() {
                                self.handle_line(line, backoff, &mut write).await?;
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite answers transport pings automatically
                        }
                        Some(Ok(tungstenite::Message::Close(_))) => {
                            return Err(anyhow::anyhow!("chat server closed the connection"));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("chat read error: {}", e));
                        }
                        None => {
                            return Err(anyhow::anyhow!("chat stream ended"));
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }

    async fn handle_line(
        &self,
        line: &str,
        backoff: &mut ExponentialBackoff,
        write: &mut (impl Sink<tungstenite::Message, Error = tungstenite::Error> + Unpin),
    ) -> Result<()> {
        match parse_line(line) {
            IrcMessage::Ping(payload) => {
                write
                    .send(tungstenite::Message::Text(format!("PONG {}", payload)))
                    .await
                    .context("failed to answer PING")?;
            }
            IrcMessage::Join { nick, channel } => {
                // Connected only once the server echoes our own join.
                if nick == self.username && channel == self.channel {
                    backoff.reset();
                    self.mark_connected();
                }
            }
            IrcMessage::Privmsg { channel, body } => {
                if channel == self.channel {
                    self.count_votes(&body);
                }
            }
            IrcMessage::Notice(notice) => {
                tracing::warn!(notice = %notice, "Chat server notice");
            }
            IrcMessage::Other => {}
        }
        Ok(())
    }

    fn count_votes(&self, body: &str) {
        let mut matched = false;
        if contains_keyword(body, &self.up_keyword) {
            self.tally.increment_up();
            matched = true;
        }
        if contains_keyword(body, &self.down_keyword) {
            self.tally.increment_down();
            matched = true;
        }
        if matched {
            let (up, down) = self.tally.counts();
            self.hub.publish_live_counts(up, down);
        }
    }

    fn mark_connected(&self) {
        if let Some(snapshot) = self.status.set_chat_connected(true) {
            tracing::info!(state = ?ChatConnectionStatus::Connected, channel = %self.channel, "Joined chat");
            self.hub.publish_status(&snapshot);
        }
    }

    fn mark_disconnected(&self) {
        if let Some(snapshot) = self.status.set_chat_connected(false) {
            tracing::info!(state = ?ChatConnectionStatus::Disconnected, "Left chat");
            self.hub.publish_status(&snapshot);
        }
    }
}
