//! Shared bot state and the handle command handlers act through.
//!
//! Handlers never touch the socket: every outbound line goes through the
//! session's queue, and shared state sits behind short-lived locks. This is
//! what lets a slow handler run without stalling keepalive.

use crate::proto::Message;
use anyhow::{bail, Context};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::time::Instant;

/// Observable connection health.
#[derive(Debug, Clone)]
pub enum Health {
    Connecting,
    Registering,
    Connected { since: Instant },
    Reconnecting { attempt: u32 },
}

impl Health {
    pub fn describe(&self) -> String {
        match self {
            Health::Connecting => "connecting".to_string(),
            Health::Registering => "registering".to_string(),
            Health::Connected { since } => {
                format!("connected for {}", fmt_duration(since.elapsed()))
            }
            Health::Reconnecting { attempt } => {
                format!("reconnecting (attempt {attempt})")
            }
        }
    }
}

/// Render a duration as `1d 2h 3m` (seconds only under a minute).
pub fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (days, hours, mins) = (secs / 86_400, (secs / 3600) % 24, (secs / 60) % 60);
    if days > 0 {
        format!("{days}d {hours}h {mins}m")
    } else if hours > 0 {
        format!("{hours}h {mins}m")
    } else if mins > 0 {
        format!("{mins}m")
    } else {
        format!("{secs}s")
    }
}

struct Waiter {
    matcher: Box<dyn Fn(&Message) -> bool + Send>,
    tx: oneshot::Sender<Message>,
}

/// State shared between the session loop and the command worker.
pub struct BotState {
    channels: Mutex<BTreeSet<String>>,
    health: Mutex<Health>,
    waiters: Mutex<Vec<Waiter>>,
    last_ping: Mutex<Option<Instant>>,
    started: Instant,
}

impl BotState {
    pub fn new(initial_channels: &[String]) -> Self {
        Self {
            channels: Mutex::new(
                initial_channels.iter().map(|c| normalize_channel(c)).collect(),
            ),
            health: Mutex::new(Health::Connecting),
            waiters: Mutex::new(Vec::new()),
            last_ping: Mutex::new(None),
            started: Instant::now(),
        }
    }

    pub fn set_health(&self, health: Health) {
        *self.health.lock() = health;
    }

    pub fn health(&self) -> Health {
        self.health.lock().clone()
    }

    pub fn note_ping(&self) {
        *self.last_ping.lock() = Some(Instant::now());
    }

    pub fn last_ping(&self) -> Option<Instant> {
        *self.last_ping.lock()
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Offer an inbound message to pending request/reply waiters.
    ///
    /// Returns `true` when a waiter consumed it. Waiters whose requester has
    /// given up (timeout, handler death) are purged first.
    pub fn offer_to_waiters(&self, msg: &Message) -> bool {
        let mut waiters = self.waiters.lock();
        waiters.retain(|w| !w.tx.is_closed());
        if let Some(i) = waiters.iter().position(|w| (w.matcher)(msg)) {
            let waiter = waiters.swap_remove(i);
            return waiter.tx.send(msg.clone()).is_ok();
        }
        false
    }

    fn push_waiter(&self, waiter: Waiter) {
        self.waiters.lock().push(waiter);
    }
}

fn normalize_channel(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// The capability surface handed to command handlers.
#[derive(Clone)]
pub struct BotHandle {
    outbound: mpsc::UnboundedSender<String>,
    state: Arc<BotState>,
    shutdown: Arc<Notify>,
    nick: Arc<str>,
    request_timeout: Duration,
}

impl BotHandle {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        state: Arc<BotState>,
        shutdown: Arc<Notify>,
        nick: &str,
        request_timeout: Duration,
    ) -> Self {
        Self {
            outbound,
            state,
            shutdown,
            nick: Arc::from(nick),
            request_timeout,
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    pub fn send_line(&self, line: String) -> anyhow::Result<()> {
        self.outbound
            .send(line)
            .ok()
            .context("the connection is gone")
    }

    pub fn privmsg(&self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_line(Message::privmsg(target, text).to_line())
    }

    pub fn notice(&self, target: &str, text: &str) -> anyhow::Result<()> {
        self.send_line(Message::notice(target, text).to_line())
    }

    /// Join a channel and track it. Idempotent on the channel set.
    pub fn join_channel(&self, channel: &str) -> anyhow::Result<()> {
        let channel = normalize_channel(channel);
        self.send_line(Message::join(&channel).to_line())?;
        self.state.channels.lock().insert(channel);
        Ok(())
    }

    /// Part a channel. Returns `false`, sending nothing, when the bot is not
    /// a member.
    pub fn part_channel(&self, channel: &str) -> anyhow::Result<bool> {
        let channel = normalize_channel(channel);
        if !self.state.channels.lock().contains(&channel) {
            return Ok(false);
        }
        self.send_line(Message::part(&channel).to_line())?;
        self.state.channels.lock().remove(&channel);
        Ok(true)
    }

    pub fn is_member(&self, channel: &str) -> bool {
        self.state
            .channels
            .lock()
            .contains(&normalize_channel(channel))
    }

    pub fn channels(&self) -> Vec<String> {
        self.state.channels.lock().iter().cloned().collect()
    }

    /// Send a request line and wait for the first inbound message matching
    /// `matcher`, up to the configured timeout. Unrelated traffic is not
    /// consumed.
    pub async fn request(
        &self,
        line: String,
        matcher: impl Fn(&Message) -> bool + Send + 'static,
    ) -> anyhow::Result<Message> {
        let (tx, rx) = oneshot::channel();
        self.state.push_waiter(Waiter {
            matcher: Box::new(matcher),
            tx,
        });
        self.send_line(line)?;
        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(msg)) => Ok(msg),
            Ok(Err(_)) => bail!("the connection dropped while waiting for a reply"),
            Err(_) => bail!("timed out waiting for a server reply"),
        }
    }

    /// Ask the session to shut down cleanly.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn health(&self) -> Health {
        self.state.health()
    }

    pub fn uptime(&self) -> Duration {
        self.state.uptime()
    }

    /// When the last server PING was answered.
    pub fn last_ping(&self) -> Option<Instant> {
        self.state.last_ping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle_with_state() -> (BotHandle, Arc<BotState>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(BotState::new(&["#Home".to_string()]));
        let handle = BotHandle::new(
            tx,
            state.clone(),
            Arc::new(Notify::new()),
            "modbot",
            Duration::from_millis(50),
        );
        (handle, state, rx)
    }

    #[test]
    fn channels_are_case_normalized_at_startup() {
        let (handle, _, _rx) = handle_with_state();
        assert_eq!(handle.channels(), vec!["#home"]);
        assert!(handle.is_member("#HOME"));
    }

    #[test]
    fn join_is_idempotent_on_the_set() {
        let (handle, _, mut rx) = handle_with_state();
        handle.join_channel("#home").unwrap();
        handle.join_channel("#Home").unwrap();
        assert_eq!(handle.channels(), vec!["#home"]);
        // Both JOIN lines still go out; the server treats them the same way.
        assert_eq!(rx.try_recv().unwrap(), "JOIN #home");
        assert_eq!(rx.try_recv().unwrap(), "JOIN #home");
    }

    #[test]
    fn part_of_non_member_is_a_no_op() {
        let (handle, _, mut rx) = handle_with_state();
        assert!(!handle.part_channel("#elsewhere").unwrap());
        assert_eq!(handle.channels(), vec!["#home"]);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn part_of_member_sends_and_untracks() {
        let (handle, _, mut rx) = handle_with_state();
        assert!(handle.part_channel("#HOME").unwrap());
        assert!(handle.channels().is_empty());
        assert_eq!(rx.try_recv().unwrap(), "PART #home");
    }

    #[tokio::test]
    async fn request_resolves_on_matching_message() {
        let (handle, state, mut rx) = handle_with_state();
        let pending = tokio::spawn({
            let handle = handle.clone();
            async move {
                handle
                    .request("NAMES #home".to_string(), |m| m.command == "353")
                    .await
            }
        });
        // Wait until the request line is out, so the waiter is registered.
        let sent = rx.recv().await.unwrap();
        assert_eq!(sent, "NAMES #home");

        let unrelated = Message::parse(":x!u@h PRIVMSG #home :hi").unwrap();
        assert!(!state.offer_to_waiters(&unrelated));

        let reply = Message::parse(":srv 353 modbot = #home :@a b").unwrap();
        assert!(state.offer_to_waiters(&reply));

        let got = pending.await.unwrap().unwrap();
        assert_eq!(got.command, "353");
    }

    #[tokio::test]
    async fn request_times_out_without_a_reply() {
        let (handle, _, _rx) = handle_with_state();
        let err = handle
            .request("NAMES #home".to_string(), |m| m.command == "353")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
