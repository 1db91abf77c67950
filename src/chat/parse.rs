//! Minimal IRC line parsing for the Twitch chat protocol. Anything the
//! listener does not recognize maps to `Other` and is discarded upstream.

#[derive(Debug, Clone, PartialEq)]
pub enum IrcMessage {
    /// Server keep-alive; the payload must be echoed back in a PONG.
    Ping(String),
    Privmsg { channel: String, body: String },
    Join { nick: String, channel: String },
    Notice(String),
    Other,
}

pub fn parse_line(raw: &str) -> IrcMessage {
    let line = raw.trim_end_matches(['\r', '\n']);
    if line.is_empty() {
        return IrcMessage::Other;
    }

    if let Some(payload) = line.strip_prefix("PING") {
        return IrcMessage::Ping(payload.trim().to_string());
    }

    let (prefix, rest) = match line.strip_prefix(':') {
        Some(stripped) => match stripped.split_once(' ') {
            Some((prefix, rest)) => (Some(prefix), rest),
            None => return IrcMessage::Other,
        },
        None => (None, line),
    };

    let (command, args) = match rest.split_once(' ') {
        Some((command, args)) => (command, args),
        None => (rest, ""),
    };

    match command {
        "PRIVMSG" => match args.split_once(" :") {
            Some((target, body)) => IrcMessage::Privmsg {
                channel: target.trim().trim_start_matches('#').to_string(),
                body: body.to_string(),
            },
            None => IrcMessage::Other,
        },
        "JOIN" => {
            let nick = prefix
                .map(|p| p.split('!').next().unwrap_or(p))
                .unwrap_or("")
                .to_string();
            let channel = args
                .trim()
                .trim_start_matches(':')
                .trim_start_matches('#')
                .to_string();
            IrcMessage::Join { nick, channel }
        }
        "NOTICE" => {
            let body = args.split_once(" :").map(|(_, b)| b).unwrap_or(args);
            IrcMessage::Notice(body.to_string())
        }
        _ => IrcMessage::Other,
    }
}

/// Case-insensitive containment match used for vote counting.
pub fn contains_keyword(body: &str, keyword: &str) -> bool {
    body.to_lowercase().contains(&keyword.to_lowercase())
}
