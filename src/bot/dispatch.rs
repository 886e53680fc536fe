//! Command registration and dispatch.
//!
//! Commands are registered once at startup through [`RegistryBuilder`]; a
//! duplicate name is a startup failure, not a silent overwrite. Dispatch
//! never lets a handler fault reach the session loop: errors become one
//! generic chat reply and a server-side log line.

use crate::bot::handle::BotHandle;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, error, info};

/// What a handler sends back to the reply target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    None,
    Line(String),
    Lines(Vec<String>),
}

impl From<String> for Reply {
    fn from(line: String) -> Self {
        Reply::Line(line)
    }
}

impl From<&str> for Reply {
    fn from(line: &str) -> Self {
        Reply::Line(line.to_owned())
    }
}

impl From<Vec<String>> for Reply {
    fn from(lines: Vec<String>) -> Self {
        Reply::Lines(lines)
    }
}

/// Who may invoke a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLevel {
    Public,
    /// Only the configured owner nick (compared case-insensitively).
    Owner,
}

/// Everything a handler gets to see about one invocation.
pub struct CommandContext<'a> {
    pub hostmask: &'a str,
    pub source: &'a str,
    pub reply_target: &'a str,
    pub args: &'a [String],
    /// All registered command names, sorted.
    pub command_names: &'a [String],
    pub bot: &'a BotHandle,
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate command name: {0}")]
    DuplicateCommand(String),
    #[error("invalid command name: {0:?} (must be lowercase, no whitespace)")]
    InvalidName(String),
}

struct Registered {
    auth: AuthLevel,
    handler: Box<dyn CommandHandler>,
}

/// Startup-time command registration.
#[derive(Default)]
pub struct RegistryBuilder {
    commands: HashMap<String, Registered>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: &str,
        auth: AuthLevel,
        handler: impl CommandHandler + 'static,
    ) -> Result<Self, RegistryError> {
        if name.is_empty()
            || name.chars().any(|c| c.is_whitespace() || c.is_ascii_uppercase())
        {
            return Err(RegistryError::InvalidName(name.to_owned()));
        }
        let previous = self.commands.insert(
            name.to_owned(),
            Registered {
                auth,
                handler: Box::new(handler),
            },
        );
        if previous.is_some() {
            return Err(RegistryError::DuplicateCommand(name.to_owned()));
        }
        Ok(self)
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: self.commands,
        }
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The immutable name → command mapping.
pub struct CommandRegistry {
    commands: HashMap<String, Registered>,
}

impl CommandRegistry {
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    fn get(&self, name: &str) -> Option<&Registered> {
        self.commands.get(name)
    }
}

/// One chat line that looked like a command, as extracted by the session.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub hostmask: String,
    pub source: String,
    pub destination: String,
    pub text: String,
}

pub struct Dispatcher {
    registry: CommandRegistry,
    names: Vec<String>,
    handle: BotHandle,
    nick: String,
    owner: String,
    prefix: String,
}

impl Dispatcher {
    pub fn new(
        registry: CommandRegistry,
        handle: BotHandle,
        nick: &str,
        owner: &str,
        prefix: &str,
    ) -> Self {
        let names = registry.names();
        Self {
            registry,
            names,
            handle,
            nick: nick.to_owned(),
            owner: owner.to_owned(),
            prefix: prefix.to_owned(),
        }
    }

    /// Run one chat command to completion. Never panics the caller: handler
    /// faults are contained here.
    pub async fn dispatch(&self, job: DispatchJob) {
        let Some(rest) = job.text.strip_prefix(&self.prefix) else {
            return;
        };
        let mut parts = rest.split_whitespace();
        let Some(key) = parts.next() else {
            debug!("command prefix with no command");
            return;
        };
        let key = key.to_lowercase();
        let args: Vec<String> = parts.map(str::to_owned).collect();

        // A message addressed to the bot itself is private; reply to the
        // sender. Anything else came from a channel; reply there.
        let reply_target = if job.destination.eq_ignore_ascii_case(&self.nick) {
            job.source.as_str()
        } else {
            job.destination.as_str()
        };

        let Some(command) = self.registry.get(&key) else {
            debug!(command = %key, "ignoring unknown command");
            return;
        };

        if command.auth == AuthLevel::Owner && !job.source.eq_ignore_ascii_case(&self.owner) {
            info!(command = %key, source = %job.source, "rejected unauthorized command");
            self.send_reply(
                reply_target,
                Reply::Line(format!("You can't control me {}!", job.source)),
            );
            return;
        }

        info!(command = %key, source = %job.source, "running command");
        let ctx = CommandContext {
            hostmask: &job.hostmask,
            source: &job.source,
            reply_target,
            args: &args,
            command_names: &self.names,
            bot: &self.handle,
        };
        match command.handler.handle(ctx).await {
            Ok(reply) => self.send_reply(reply_target, reply),
            Err(e) => {
                error!(command = %key, error = %format!("{e:#}"), "command failed");
                self.send_reply(
                    reply_target,
                    Reply::Line(
                        "Sorry, I encountered an error while running that command.".to_owned(),
                    ),
                );
            }
        }
    }

    fn send_reply(&self, target: &str, reply: Reply) {
        let lines = match reply {
            Reply::None => return,
            Reply::Line(line) => vec![line],
            Reply::Lines(lines) => lines,
        };
        for line in lines {
            if self.handle.privmsg(target, &line).is_err() {
                debug!("dropping reply, connection is gone");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::handle::BotState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, Notify};

    struct Counting {
        calls: Arc<AtomicUsize>,
        reply: Reply,
    }

    #[async_trait]
    impl CommandHandler for Counting {
        async fn handle(&self, _ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl CommandHandler for Failing {
        async fn handle(&self, _ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
            anyhow::bail!("boom")
        }
    }

    struct Echo;

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
            Ok(format!("Available commands: {}", ctx.command_names.join(", ")).into())
        }
    }

    fn dispatcher_with(
        registry: CommandRegistry,
        owner: &str,
    ) -> (Dispatcher, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::new(BotState::new(&[]));
        let handle = BotHandle::new(
            tx,
            state,
            Arc::new(Notify::new()),
            "modbot",
            Duration::from_millis(50),
        );
        (Dispatcher::new(registry, handle, "modbot", owner, "!"), rx)
    }

    fn job(source: &str, destination: &str, text: &str) -> DispatchJob {
        DispatchJob {
            hostmask: "host.example".to_owned(),
            source: source.to_owned(),
            destination: destination.to_owned(),
            text: text.to_owned(),
        }
    }

    #[test]
    fn duplicate_registration_fails_at_startup() {
        let calls = Arc::new(AtomicUsize::new(0));
        let err = RegistryBuilder::new()
            .register("seen", AuthLevel::Public, Counting { calls: calls.clone(), reply: Reply::None })
            .unwrap()
            .register("seen", AuthLevel::Public, Counting { calls, reply: Reply::None })
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateCommand(name) if name == "seen"));
    }

    #[test]
    fn uppercase_names_are_rejected() {
        let err = RegistryBuilder::new()
            .register("Seen", AuthLevel::Public, Failing)
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }

    #[tokio::test]
    async fn registered_command_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RegistryBuilder::new()
            .register("ping", AuthLevel::Public, Counting { calls: calls.clone(), reply: Reply::Line("pong".into()) })
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "#room", "!ping with args")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #room :pong");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_command_is_silently_ignored() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RegistryBuilder::new()
            .register("ping", AuthLevel::Public, Counting { calls: calls.clone(), reply: Reply::None })
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "#room", "!nosuch")).await;
        dispatcher.dispatch(job("Alice", "#room", "!")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn command_keys_are_lowercased() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RegistryBuilder::new()
            .register("ping", AuthLevel::Public, Counting { calls: calls.clone(), reply: Reply::None })
            .unwrap()
            .build();
        let (dispatcher, _rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "#room", "!PiNg")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn owner_check_is_case_insensitive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RegistryBuilder::new()
            .register("quit", AuthLevel::Owner, Counting { calls: calls.clone(), reply: Reply::None })
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Owner", "#room", "!quit")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn non_owner_gets_rejected_by_name() {
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = RegistryBuilder::new()
            .register("quit", AuthLevel::Owner, Counting { calls: calls.clone(), reply: Reply::None })
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Mallory", "#room", "!quit")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            rx.try_recv().unwrap(),
            "PRIVMSG #room :You can't control me Mallory!"
        );
    }

    #[tokio::test]
    async fn private_message_replies_go_to_the_sender() {
        let registry = RegistryBuilder::new()
            .register("commands", AuthLevel::Public, Echo)
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "modbot", "!commands")).await;
        assert_eq!(
            rx.try_recv().unwrap(),
            "PRIVMSG Alice :Available commands: commands"
        );
    }

    #[tokio::test]
    async fn handler_fault_becomes_one_generic_reply() {
        let registry = RegistryBuilder::new()
            .register("boom", AuthLevel::Public, Failing)
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "#room", "!boom")).await;

        assert_eq!(
            rx.try_recv().unwrap(),
            "PRIVMSG #room :Sorry, I encountered an error while running that command."
        );
        assert!(rx.try_recv().is_err());

        // The dispatcher is still usable afterwards.
        dispatcher.dispatch(job("Alice", "#room", "!boom")).await;
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn multi_line_replies_are_sent_in_order() {
        let registry = RegistryBuilder::new()
            .register(
                "multi",
                AuthLevel::Public,
                Counting {
                    calls: Arc::new(AtomicUsize::new(0)),
                    reply: Reply::Lines(vec!["one".into(), "two".into()]),
                },
            )
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "#room", "!multi")).await;
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #room :one");
        assert_eq!(rx.try_recv().unwrap(), "PRIVMSG #room :two");
    }

    #[tokio::test]
    async fn listing_commands_matches_the_registry() {
        let registry = RegistryBuilder::new()
            .register("commands", AuthLevel::Public, Echo)
            .unwrap()
            .register("join", AuthLevel::Owner, Failing)
            .unwrap()
            .build();
        let (dispatcher, mut rx) = dispatcher_with(registry, "owner");

        dispatcher.dispatch(job("Alice", "#room", "!commands")).await;
        assert_eq!(
            rx.try_recv().unwrap(),
            "PRIVMSG #room :Available commands: commands, join"
        );
    }
}
