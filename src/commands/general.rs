//! Public commands.

use crate::bot::dispatch::{CommandContext, CommandHandler, Reply};
use crate::config::WarnConfig;
use crate::proto::{Message, NamesReply};
use crate::reputation::ReputationLookup;
use crate::seen::{humanize_age, SeenStore};
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// `commands`: list everything that is registered.
pub struct CommandsCmd;

#[async_trait]
impl CommandHandler for CommandsCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        Ok(format!("Available commands: {}", ctx.command_names.join(", ")).into())
    }
}

/// `seen <nick>`: when a nick was last active and what they said.
pub struct SeenCmd {
    pub store: Arc<dyn SeenStore>,
}

#[async_trait]
impl CommandHandler for SeenCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        let name = ctx.args.join(" ");
        if name.is_empty() {
            return Ok("Who should I look for?".into());
        }
        match self.store.lookup(&name) {
            None => Ok(format!("Sorry, I haven't seen {name}.").into()),
            Some(entry) => {
                let when = entry.date.format("%Y-%m-%d %H:%M:%S %z");
                let ago = humanize_age(entry.date, Utc::now());
                Ok(format!("{name} was seen {ago} ({when}) saying {}", entry.message).into())
            }
        }
    }
}

/// Accept `1.2.3.4` or the dash-separated form people paste from logs.
fn normalize_ip(raw: &str) -> Option<String> {
    let candidate = raw.trim().replace('-', ".");
    candidate.parse::<IpAddr>().ok().map(|_| candidate)
}

/// `check <ip>`: reputation lookup, reported as a percentage.
pub struct CheckCmd {
    pub lookup: Arc<dyn ReputationLookup>,
}

#[async_trait]
impl CommandHandler for CheckCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        let Some(ip) = normalize_ip(&ctx.args.join(" ")) else {
            return Ok("Sorry, that's not an IP address!".into());
        };
        let score = self.lookup.score(&ip).await?;
        let percent = (score * 100.0).round() as i64;
        Ok(format!("{}: chances of naughty IP = {percent}%", ctx.source).into())
    }
}

/// `ip <addr>`: normalize a dash-separated address to dotted form.
pub struct IpCmd;

#[async_trait]
impl CommandHandler for IpCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        match normalize_ip(&ctx.args.join(" ")) {
            Some(ip) => Ok(ip.into()),
            None => Ok("Sorry, that's not an IP address!".into()),
        }
    }
}

/// `ticket [id]`: hand out the support URL.
pub struct TicketCmd {
    pub url: String,
}

#[async_trait]
impl CommandHandler for TicketCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        match ctx.args.first() {
            Some(id) => Ok(format!("{}/{id}", self.url).into()),
            None => Ok(self.url.clone().into()),
        }
    }
}

/// `names [channel]`: current membership, via a NAMES round trip.
pub struct NamesCmd;

#[async_trait]
impl CommandHandler for NamesCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        let channel = ctx
            .args
            .first()
            .map(String::as_str)
            .unwrap_or(ctx.reply_target);
        if !channel.starts_with('#') {
            return Ok("That only works for channels.".into());
        }
        let channel = channel.to_ascii_lowercase();
        let matcher_channel = channel.clone();
        let msg = ctx
            .bot
            .request(Message::names(&channel).to_line(), move |m| {
                NamesReply::is_names_for(m, &matcher_channel)
            })
            .await?;
        let reply = NamesReply::parse(&msg).context("unreadable membership listing")?;

        let mut parts = Vec::new();
        if !reply.operators.is_empty() {
            parts.push(format!("operators: {}", reply.operators.join(", ")));
        }
        if !reply.voiced.is_empty() {
            parts.push(format!("voiced: {}", reply.voiced.join(", ")));
        }
        if !reply.others.is_empty() {
            parts.push(format!("others: {}", reply.others.join(", ")));
        }
        if parts.is_empty() {
            return Ok(format!("Nobody seems to be in {channel}.").into());
        }
        Ok(format!("{}: {}", reply.channel, parts.join(" | ")).into())
    }
}

/// `warn`: rate-limited NOTICE nudging a configured channel back on topic.
pub struct WarnCmd {
    channel: Option<String>,
    text: String,
    cooldown: Duration,
    last: Mutex<Option<Instant>>,
}

impl WarnCmd {
    pub fn new(config: &WarnConfig) -> Self {
        Self {
            channel: config.channel.clone(),
            text: config.text.clone(),
            cooldown: Duration::from_secs(config.cooldown_secs),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CommandHandler for WarnCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        let Some(channel) = &self.channel else {
            return Ok("No warning channel is configured.".into());
        };
        {
            let mut last = self.last.lock();
            if last.is_some_and(|at| at.elapsed() < self.cooldown) {
                return Ok("You're using that too much.".into());
            }
            *last = Some(Instant::now());
        }
        ctx.bot.notice(channel, &self.text)?;
        Ok(Reply::None)
    }
}
