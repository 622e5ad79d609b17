//! Minimal IRCv3 line parser for Twitch chat

use std::collections::HashMap;

/// A parsed IRC line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IrcLine {
    /// IRCv3 message tags (`@key=value;...`), unescaped
    pub tags: HashMap<String, String>,

    /// Source prefix without the leading `:`
    pub prefix: Option<String>,

    /// Command or numeric reply
    pub command: String,

    /// Middle parameters
    pub params: Vec<String>,

    /// Trailing parameter (after ` :`)
    pub trailing: Option<String>,
}

impl IrcLine {
    /// Tag value by key
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Nickname portion of the prefix (`nick!user@host`)
    #[must_use]
    pub fn nick(&self) -> Option<&str> {
        self.prefix
            .as_deref()
            .map(|p| p.split_once('!').map_or(p, |(nick, _)| nick))
    }
}

/// Parse a single IRC line
///
/// Returns `None` for blank lines or lines without a command.
#[must_use]
pub fn parse_line(line: &str) -> Option<IrcLine> {
    let mut rest = line.trim_end_matches(['\r', '\n']);
    let mut parsed = IrcLine::default();

    if let Some(tagged) = rest.strip_prefix('@') {
        let (tags, tail) = tagged.split_once(' ')?;
        parsed.tags = tags
            .split(';')
            .filter(|t| !t.is_empty())
            .map(|t| {
                let (k, v) = t.split_once('=').unwrap_or((t, ""));
                (k.to_string(), unescape_tag(v))
            })
            .collect();
        rest = tail.trim_start();
    }

    if let Some(prefixed) = rest.strip_prefix(':') {
        let (prefix, tail) = prefixed.split_once(' ')?;
        parsed.prefix = Some(prefix.to_string());
        rest = tail.trim_start();
    }

    let (head, trailing) = match rest.split_once(" :") {
        Some((head, trailing)) => (head, Some(trailing.to_string())),
        None => (rest, None),
    };
    parsed.trailing = trailing;

    let mut words = head.split(' ').filter(|w| !w.is_empty());
    parsed.command = words.next()?.to_string();
    parsed.params = words.map(ToString::to_string).collect();

    Some(parsed)
}

/// Undo IRCv3 tag value escaping
fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg_with_tags() {
        let line = "@badge-info=;badges=broadcaster/1;color=#0D4200;display-name=Ronni;\
                    id=b34ccfc7-4977-403a-8a94-33c6bac34fb8;mod=0;room-id=1337;\
                    tmi-sent-ts=1507246572675;user-id=1337 \
                    :ronni!ronni@ronni.tmi.twitch.tv PRIVMSG #dallas :Kappa +2 Keepo\r\n";
        let parsed = parse_line(line).unwrap();

        assert_eq!(parsed.command, "PRIVMSG");
        assert_eq!(parsed.params, vec!["#dallas"]);
        assert_eq!(parsed.trailing.as_deref(), Some("Kappa +2 Keepo"));
        assert_eq!(parsed.nick(), Some("ronni"));
        assert_eq!(parsed.tag("id"), Some("b34ccfc7-4977-403a-8a94-33c6bac34fb8"));
        assert_eq!(parsed.tag("tmi-sent-ts"), Some("1507246572675"));
        assert_eq!(parsed.tag("badge-info"), None);
    }

    #[test]
    fn test_parse_ping() {
        let parsed = parse_line("PING :tmi.twitch.tv").unwrap();
        assert_eq!(parsed.command, "PING");
        assert!(parsed.prefix.is_none());
        assert_eq!(parsed.trailing.as_deref(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_parse_numeric_reply() {
        let parsed = parse_line(":tmi.twitch.tv 001 jokebot :Welcome, GLHF!").unwrap();
        assert_eq!(parsed.command, "001");
        assert_eq!(parsed.params, vec!["jokebot"]);
        assert_eq!(parsed.nick(), Some("tmi.twitch.tv"));
    }

    #[test]
    fn test_trailing_keeps_colons() {
        let parsed = parse_line(":a!a@a PRIVMSG #c :time is 10:30 :)").unwrap();
        assert_eq!(parsed.trailing.as_deref(), Some("time is 10:30 :)"));
    }

    #[test]
    fn test_unescape_tag_values() {
        assert_eq!(unescape_tag(r"hello\sworld"), "hello world");
        assert_eq!(unescape_tag(r"a\:b"), "a;b");
        assert_eq!(unescape_tag(r"back\\slash"), r"back\slash");
    }

    #[test]
    fn test_blank_line() {
        assert!(parse_line("").is_none());
        assert!(parse_line("\r\n").is_none());
    }
}
