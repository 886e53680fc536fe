//! The built-in command set.

pub mod admin;
pub mod general;

use crate::bot::dispatch::{AuthLevel, RegistryBuilder, RegistryError};
use crate::config::BotConfig;
use crate::reputation::ReputationLookup;
use crate::seen::SeenStore;
use std::sync::Arc;

/// Register every built-in command. Fails on a name collision, which is a
/// programming error caught before the bot connects.
pub fn register_builtins(
    builder: RegistryBuilder,
    config: &BotConfig,
    seen: Arc<dyn SeenStore>,
    reputation: Arc<dyn ReputationLookup>,
) -> Result<RegistryBuilder, RegistryError> {
    builder
        .register("commands", AuthLevel::Public, general::CommandsCmd)?
        .register("seen", AuthLevel::Public, general::SeenCmd { store: seen })?
        .register("check", AuthLevel::Public, general::CheckCmd { lookup: reputation })?
        .register("ip", AuthLevel::Public, general::IpCmd)?
        .register("ticket", AuthLevel::Public, general::TicketCmd { url: config.links.ticket.clone() })?
        .register("names", AuthLevel::Public, general::NamesCmd)?
        .register("warn", AuthLevel::Public, general::WarnCmd::new(&config.warn))?
        .register("join", AuthLevel::Owner, admin::JoinCmd)?
        .register("part", AuthLevel::Owner, admin::PartCmd)?
        .register("say", AuthLevel::Owner, admin::SayCmd)?
        .register("status", AuthLevel::Owner, admin::StatusCmd)?
        .register("quit", AuthLevel::Owner, admin::QuitCmd)
}
