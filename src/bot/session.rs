//! The connection state machine and receive loop.
//!
//! One session is one connection attempt: register, then process lines until
//! the transport dies, a deadline fires, or the owner asks for a shutdown.
//! The loop itself never runs business logic; command work is queued to the
//! worker task so keepalive replies cannot be starved by a slow handler.

use crate::bot::dispatch::DispatchJob;
use crate::bot::handle::{BotState, Health};
use crate::bot::transport::{Transport, TransportError};
use crate::config::BotConfig;
use crate::proto::Message;
use crate::seen::{SeenEntry, SeenStore};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("server did not confirm registration in time")]
    RegistrationTimeout,
}

pub struct Session<'a> {
    pub config: &'a BotConfig,
    pub state: Arc<BotState>,
    pub seen: Arc<dyn SeenStore>,
    pub work_tx: mpsc::UnboundedSender<DispatchJob>,
    pub outbound_rx: &'a mut mpsc::UnboundedReceiver<String>,
    pub shutdown: Arc<Notify>,
}

impl Session<'_> {
    /// Drive one connection to completion.
    ///
    /// `Ok(())` means an authorized shutdown; any error means the caller
    /// should reconnect.
    pub async fn run(self) -> Result<(), SessionError> {
        let Session {
            config,
            state,
            seen,
            work_tx,
            outbound_rx,
            shutdown,
        } = self;
        let nick = config.server.nickname.as_str();

        state.set_health(Health::Connecting);
        let mut transport = Transport::connect(
            &config.server.host,
            config.server.port,
            config.timeouts.connect(),
        )
        .await?;

        state.set_health(Health::Registering);
        if let Some(password) = &config.server.password {
            transport.send_line(&Message::pass(password).to_line()).await?;
        }
        transport
            .send_line(&Message::user(nick, &config.server.realname).to_line())
            .await?;
        transport.send_line(&Message::nick(nick).to_line()).await?;
        let (mut sink, mut stream) = transport.split();

        // Lines queued for a previous connection are stale.
        while outbound_rx.try_recv().is_ok() {}

        let mut registered = false;
        let mut last_activity = Instant::now();
        let registration_deadline = Instant::now() + config.timeouts.registration();

        loop {
            let idle_deadline = last_activity + config.timeouts.idle();
            let deadline = if registered {
                idle_deadline
            } else {
                idle_deadline.min(registration_deadline)
            };

            tokio::select! {
                _ = shutdown.notified() => {
                    // Flush whatever the quit handler queued, QUIT included.
                    while let Ok(line) = outbound_rx.try_recv() {
                        if sink.send_line(line).await.is_err() {
                            break;
                        }
                    }
                    return Ok(());
                }

                Some(line) = outbound_rx.recv() => {
                    sink.send_line(line).await?;
                }

                line = stream.next_line() => {
                    let line = line?;
                    last_activity = Instant::now();
                    let msg = match Message::parse(&line) {
                        Ok(msg) => msg,
                        Err(e) => {
                            warn!(error = %e, line = %line, "skipping malformed line");
                            continue;
                        }
                    };

                    if state.offer_to_waiters(&msg) {
                        continue;
                    }

                    match msg.command.as_str() {
                        "PING" => {
                            let token = msg
                                .trailing
                                .as_deref()
                                .or(msg.destination.as_deref())
                                .unwrap_or_default();
                            sink.send_line(Message::pong(token).to_line()).await?;
                            state.note_ping();
                        }
                        "001" if !registered => {
                            registered = true;
                            state.set_health(Health::Connected { since: Instant::now() });
                            info!(nick = %nick, "connected to server successfully");
                            for channel in &config.channels {
                                info!(channel = %channel, "joining");
                                sink.send_line(
                                    Message::join(&channel.to_ascii_lowercase()).to_line(),
                                )
                                .await?;
                            }
                        }
                        "PRIVMSG" if registered => {
                            let Some(sender) = msg.sender() else { continue };
                            if sender.nick.eq_ignore_ascii_case(nick) {
                                continue;
                            }
                            let Some(destination) =
                                msg.destination.clone().filter(|d| !d.is_empty())
                            else {
                                continue;
                            };
                            let text = msg.trailing.clone().unwrap_or_default();

                            if !config
                                .seen
                                .ignore
                                .iter()
                                .any(|n| n.eq_ignore_ascii_case(&sender.nick))
                            {
                                let store = seen.clone();
                                let entry = SeenEntry {
                                    date: Utc::now(),
                                    message: text.clone(),
                                    channel: destination.clone(),
                                };
                                let who = sender.nick.clone();
                                tokio::task::spawn_blocking(move || store.record(&who, entry));
                            }

                            if text.starts_with(&config.prefix) {
                                let job = DispatchJob {
                                    hostmask: sender.hostmask,
                                    source: sender.nick,
                                    destination,
                                    text,
                                };
                                if work_tx.send(job).is_err() {
                                    warn!("command worker is gone");
                                }
                            }
                        }
                        _ => {}
                    }
                }

                _ = tokio::time::sleep_until(deadline) => {
                    if !registered && Instant::now() >= registration_deadline {
                        return Err(SessionError::RegistrationTimeout);
                    }
                    return Err(TransportError::Timeout.into());
                }
            }
        }
    }
}
