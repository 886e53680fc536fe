//! IRC message parsing and serialization.
//!
//! One wire line maps to one [`Message`]:
//!
//! ```text
//! [`:`prefix SPACE] command [SPACE destination] [SPACE `:`trailing]
//! ```
//!
//! The destination is kept verbatim (it may contain spaces, as in numeric
//! replies like `353 nick = #channel`); whitespace splitting belongs to the
//! layers that know what the fields mean. Lines are CR-LF terminated on the
//! wire, but parsing tolerates a missing or partial terminator.

use std::fmt;

/// A parsed IRC message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Optional prefix (server name or `nick!user@host`).
    pub prefix: Option<String>,
    /// The command (e.g. `PRIVMSG`, `001`, `PING`).
    pub command: String,
    /// The middle parameter portion, verbatim.
    pub destination: Option<String>,
    /// The trailing parameter, introduced by ` :`.
    pub trailing: Option<String>,
}

/// Errors for lines that do not match the grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("prefix present but missing command")]
    MissingCommand,
    #[error("empty prefix")]
    EmptyPrefix,
}

/// The user identity carried by a `nick!user@host` prefix.
///
/// Server-originated lines have no identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub nick: String,
    pub hostmask: String,
}

impl Message {
    /// Parse a single raw line (trailing CR/LF tolerated).
    ///
    /// Fails with [`ParseError`] rather than coercing garbage into
    /// plausible-looking fields.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let input = input.trim_end_matches(['\r', '\n']);
        if input.is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = if let Some(stripped) = input.strip_prefix(':') {
            match stripped.split_once(' ') {
                Some((p, _)) if p.is_empty() => return Err(ParseError::EmptyPrefix),
                Some((p, rest)) => (Some(p.to_owned()), rest),
                None => return Err(ParseError::MissingCommand),
            }
        } else {
            (None, input)
        };

        let (command, params) = match rest.split_once(' ') {
            Some((c, rest)) => (c, Some(rest)),
            None => (rest, None),
        };
        if command.is_empty() || command.starts_with(':') {
            return Err(ParseError::MissingCommand);
        }

        let (destination, trailing) = match params {
            None => (None, None),
            Some(p) => {
                if let Some(t) = p.strip_prefix(':') {
                    (None, Some(t.to_owned()))
                } else if let Some((dest, t)) = p.split_once(" :") {
                    (non_empty(dest), Some(t.to_owned()))
                } else {
                    (non_empty(p), None)
                }
            }
        };

        Ok(Message {
            prefix,
            command: command.to_owned(),
            destination,
            trailing,
        })
    }

    /// Serialize to the wire format (without trailing `\r\n`).
    pub fn to_line(&self) -> String {
        let mut out = String::new();
        if let Some(prefix) = &self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(&self.command);
        if let Some(dest) = &self.destination {
            out.push(' ');
            out.push_str(dest);
        }
        if let Some(trailing) = &self.trailing {
            out.push_str(" :");
            out.push_str(trailing);
        }
        out
    }

    /// The user identity from the prefix, if it denotes one.
    pub fn sender(&self) -> Option<Sender> {
        let prefix = self.prefix.as_deref()?;
        let (nick, rest) = prefix.split_once('!')?;
        let hostmask = rest.split_once('@').map_or(rest, |(_, host)| host);
        Some(Sender {
            nick: nick.to_owned(),
            hostmask: hostmask.to_owned(),
        })
    }

    fn cmd(command: &str) -> Self {
        Message {
            prefix: None,
            command: command.to_owned(),
            destination: None,
            trailing: None,
        }
    }

    fn with_dest(command: &str, destination: &str) -> Self {
        Message {
            destination: Some(destination.to_owned()),
            ..Self::cmd(command)
        }
    }

    fn with_trailing(command: &str, trailing: &str) -> Self {
        Message {
            trailing: Some(trailing.to_owned()),
            ..Self::cmd(command)
        }
    }

    pub fn privmsg(target: &str, text: &str) -> Self {
        Message {
            trailing: Some(text.to_owned()),
            ..Self::with_dest("PRIVMSG", target)
        }
    }

    pub fn notice(target: &str, text: &str) -> Self {
        Message {
            trailing: Some(text.to_owned()),
            ..Self::with_dest("NOTICE", target)
        }
    }

    pub fn pong(token: &str) -> Self {
        Self::with_trailing("PONG", token)
    }

    pub fn join(channel: &str) -> Self {
        Self::with_dest("JOIN", channel)
    }

    pub fn part(channel: &str) -> Self {
        Self::with_dest("PART", channel)
    }

    pub fn nick(nick: &str) -> Self {
        Self::with_dest("NICK", nick)
    }

    pub fn user(nick: &str, realname: &str) -> Self {
        Message {
            trailing: Some(realname.to_owned()),
            ..Self::with_dest("USER", &format!("{nick} {nick} {nick}"))
        }
    }

    pub fn pass(password: &str) -> Self {
        Self::with_dest("PASS", password)
    }

    pub fn names(channel: &str) -> Self {
        Self::with_dest("NAMES", channel)
    }

    pub fn quit(text: &str) -> Self {
        Self::with_trailing("QUIT", text)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_line())
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

/// A decoded numeric 353 membership listing.
///
/// The destination carries `<nick> <symbol> <channel>` and the trailing text
/// the space-separated names, `@`-prefixed for operators and `+`-prefixed for
/// voiced members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamesReply {
    pub channel: String,
    pub operators: Vec<String>,
    pub voiced: Vec<String>,
    pub others: Vec<String>,
}

impl NamesReply {
    /// Whether `msg` is the membership listing for `channel`.
    pub fn is_names_for(msg: &Message, channel: &str) -> bool {
        msg.command == "353"
            && msg.destination.as_deref().is_some_and(|d| {
                d.split_whitespace().any(|t| t.eq_ignore_ascii_case(channel))
            })
    }

    pub fn parse(msg: &Message) -> Option<Self> {
        if msg.command != "353" {
            return None;
        }
        let channel = msg.destination.as_deref()?.split_whitespace().last()?;
        let mut reply = NamesReply {
            channel: channel.to_owned(),
            operators: Vec::new(),
            voiced: Vec::new(),
            others: Vec::new(),
        };
        for name in msg.trailing.as_deref()?.split_whitespace() {
            if let Some(op) = name.strip_prefix('@') {
                reply.operators.push(op.to_owned());
            } else if let Some(voiced) = name.strip_prefix('+') {
                reply.voiced.push(voiced.to_owned());
            } else {
                reply.others.push(name.to_owned());
            }
        }
        Some(reply)
    }
}
