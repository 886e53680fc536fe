//! Bot assembly and the reconnect driver.

pub mod dispatch;
pub mod handle;
pub mod session;
pub mod transport;

use crate::config::{BotConfig, ReconnectConfig};
use crate::seen::SeenStore;
use dispatch::{CommandRegistry, DispatchJob, Dispatcher};
use handle::{BotHandle, BotState, Health};
use session::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tracing::{info, warn};

/// Exponential reconnect backoff with a cap and an attempt circuit breaker.
pub struct Backoff {
    initial: Duration,
    max_delay: Duration,
    max_attempts: u32,
    delay: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: &ReconnectConfig) -> Self {
        let initial = Duration::from_secs(config.initial_delay_secs.max(1));
        Self {
            initial,
            max_delay: Duration::from_secs(config.max_delay_secs.max(1)),
            max_attempts: config.max_attempts,
            delay: initial,
            attempt: 0,
        }
    }

    /// The delay before the next attempt, or `None` once the breaker trips.
    /// `max_attempts == 0` never trips.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.max_attempts != 0 && self.attempt > self.max_attempts {
            return None;
        }
        let delay = self.delay;
        self.delay = (self.delay * 2).min(self.max_delay);
        Some(delay)
    }

    /// Call after a healthy session so only consecutive failures count.
    pub fn reset(&mut self) {
        self.delay = self.initial;
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

pub struct Bot {
    config: BotConfig,
    state: Arc<BotState>,
    shutdown: Arc<Notify>,
    dispatcher: Arc<Dispatcher>,
    seen: Arc<dyn SeenStore>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

impl Bot {
    pub fn new(config: BotConfig, registry: CommandRegistry, seen: Arc<dyn SeenStore>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let state = Arc::new(BotState::new(&config.channels));
        let shutdown = Arc::new(Notify::new());
        let handle = BotHandle::new(
            outbound_tx,
            state.clone(),
            shutdown.clone(),
            &config.server.nickname,
            config.timeouts.request(),
        );
        let dispatcher = Arc::new(Dispatcher::new(
            registry,
            handle,
            &config.server.nickname,
            &config.owner,
            &config.prefix,
        ));
        Self {
            config,
            state,
            shutdown,
            dispatcher,
            seen,
            outbound_rx,
        }
    }

    pub fn state(&self) -> Arc<BotState> {
        self.state.clone()
    }

    /// Run until an authorized shutdown (`Ok`) or until reconnection gives
    /// up (`Err`).
    pub async fn run(mut self) -> anyhow::Result<()> {
        let (work_tx, mut work_rx) = mpsc::unbounded_channel::<DispatchJob>();
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            while let Some(job) = work_rx.recv().await {
                dispatcher.dispatch(job).await;
            }
        });

        let mut backoff = Backoff::new(&self.config.reconnect);
        loop {
            let session = Session {
                config: &self.config,
                state: self.state.clone(),
                seen: self.seen.clone(),
                work_tx: work_tx.clone(),
                outbound_rx: &mut self.outbound_rx,
                shutdown: self.shutdown.clone(),
            };
            match session.run().await {
                Ok(()) => {
                    info!("shut down by owner request");
                    return Ok(());
                }
                Err(e) => {
                    // A session that made it to Registered resets the breaker,
                    // so only consecutive failed attempts count against it.
                    if matches!(self.state.health(), Health::Connected { .. }) {
                        backoff.reset();
                    }
                    let Some(delay) = backoff.next_delay() else {
                        anyhow::bail!("giving up on reconnecting: {e}");
                    };
                    warn!(
                        error = %e,
                        attempt = backoff.attempt(),
                        delay_secs = delay.as_secs(),
                        "session ended, reconnecting"
                    );
                    self.state
                        .set_health(Health::Reconnecting { attempt: backoff.attempt() });
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
