//! Owner-only commands.

use crate::bot::dispatch::{CommandContext, CommandHandler, Reply};
use crate::bot::handle::fmt_duration;
use crate::proto::Message;
use async_trait::async_trait;
use tracing::{info, warn};

/// `join <channel>`.
pub struct JoinCmd;

#[async_trait]
impl CommandHandler for JoinCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        let Some(channel) = ctx.args.first() else {
            return Ok("Please specify a channel you wish me to join.".into());
        };
        info!(channel = %channel, source = %ctx.source, "joining by request");
        ctx.bot.join_channel(channel)?;
        Ok(Reply::None)
    }
}

/// `part [channel]`: leave the named channel, or the current one.
pub struct PartCmd;

#[async_trait]
impl CommandHandler for PartCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        match ctx.args.first() {
            Some(channel) => {
                if ctx.bot.part_channel(channel)? {
                    Ok(format!("Left channel {channel}!").into())
                } else {
                    Ok("I don't believe I'm in that channel!".into())
                }
            }
            // A private message leaves no channel to part.
            None if ctx.reply_target.eq_ignore_ascii_case(ctx.source) => Ok(
                "Sorry, you must run this command in a channel or provide a channel as an argument."
                    .into(),
            ),
            None => {
                ctx.bot.part_channel(ctx.reply_target)?;
                Ok(Reply::None)
            }
        }
    }
}

/// `say <channel> <text...>`: speak into a joined channel.
pub struct SayCmd;

#[async_trait]
impl CommandHandler for SayCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        if ctx.args.len() < 2 {
            return Ok("The format is: say <channel> <message>".into());
        }
        let target = &ctx.args[0];
        if !ctx.bot.is_member(target) {
            return Ok(format!("Whoops! I'm not in the channel {target}").into());
        }
        ctx.bot.privmsg(target, &ctx.args[1..].join(" "))?;
        Ok(Reply::None)
    }
}

/// `status`: connection health for the owner.
pub struct StatusCmd;

#[async_trait]
impl CommandHandler for StatusCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        let channels = ctx.bot.channels();
        let channels = if channels.is_empty() {
            "none".to_string()
        } else {
            channels.join(", ")
        };
        let keepalive = match ctx.bot.last_ping() {
            Some(at) => format!("{} ago", fmt_duration(at.elapsed())),
            None => "never".to_string(),
        };
        Ok(Reply::Lines(vec![
            format!("State: {}", ctx.bot.health().describe()),
            format!("Channels: {channels}"),
            format!("Uptime: {}", fmt_duration(ctx.bot.uptime())),
            format!("Last keepalive: {keepalive}"),
        ]))
    }
}

/// `quit`: announce departure and shut the process down.
pub struct QuitCmd;

#[async_trait]
impl CommandHandler for QuitCmd {
    async fn handle(&self, ctx: CommandContext<'_>) -> anyhow::Result<Reply> {
        warn!(source = %ctx.source, "shutting down by request");
        ctx.bot
            .send_line(Message::quit(&format!("{}'s out!", ctx.bot.nick())).to_line())?;
        ctx.bot.shutdown();
        Ok(Reply::None)
    }
}
