//! Nickname and channel name rules, plus RFC 1459 case mapping.
//!
//! # Reference
//! - RFC 2812 Section 1.3 (channels) and 2.3.1 (nicknames)

/// Default maximum nickname length per RFC 2812.
pub const DEFAULT_NICK_MAX_LEN: usize = 30;

const CHANNEL_MAX_LEN: usize = 50;

/// Lowercase one character under `rfc1459`: ASCII plus `[]\~` → `{}|^`.
#[inline]
pub const fn irc_lower_char(c: char) -> char {
    match c {
        'A'..='Z' => c.to_ascii_lowercase(),
        '[' => '{',
        ']' => '}',
        '\\' => '|',
        '~' => '^',
        _ => c,
    }
}

/// Lowercase a string under `rfc1459`. Used as the roster key.
pub fn irc_to_lower(s: &str) -> String {
    s.chars().map(irc_lower_char).collect()
}

/// Case-insensitive comparison under `rfc1459`.
pub fn irc_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a
            .chars()
            .zip(b.chars())
            .all(|(x, y)| irc_lower_char(x) == irc_lower_char(y))
}

#[inline]
fn is_special(c: char) -> bool {
    matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}')
}

/// Extension trait for nickname validation.
pub trait NickExt {
    /// Valid per RFC 2812 with the default length limit.
    ///
    /// ```
    /// use plugbot_proto::NickExt;
    ///
    /// assert!("plugbot".is_valid_nick());
    /// assert!("[away]".is_valid_nick());
    /// assert!(!"9lives".is_valid_nick());
    /// assert!(!"two words".is_valid_nick());
    /// ```
    fn is_valid_nick(&self) -> bool;
}

impl NickExt for str {
    fn is_valid_nick(&self) -> bool {
        if self.is_empty() || self.len() > DEFAULT_NICK_MAX_LEN {
            return false;
        }
        let mut chars = self.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || is_special(first) => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
    }
}

impl NickExt for String {
    fn is_valid_nick(&self) -> bool {
        self.as_str().is_valid_nick()
    }
}

/// Extension trait for channel names.
pub trait ChannelExt {
    /// Whether this names a channel (`#`, `&`, `+` or `!` sigil, no space,
    /// comma, BEL or control characters, at most 50 chars).
    fn is_channel_name(&self) -> bool;
}

impl ChannelExt for str {
    fn is_channel_name(&self) -> bool {
        let mut chars = self.chars();
        if !matches!(chars.next(), Some('#' | '&' | '+' | '!')) {
            return false;
        }
        self.chars().count() <= CHANNEL_MAX_LEN
            && chars.all(|c| c != ' ' && c != ',' && !c.is_control())
    }
}

impl ChannelExt for String {
    fn is_channel_name(&self) -> bool {
        self.as_str().is_channel_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_casemapping() {
        assert_eq!(irc_to_lower("Nick[Away]"), "nick{away}");
        assert!(irc_eq("ALICE\\", "alice|"));
        assert!(!irc_eq("alice", "alicia"));
    }

    #[test]
    fn test_nicks() {
        assert!("bob".is_valid_nick());
        assert!("bob-2".is_valid_nick());
        assert!(!"".is_valid_nick());
        assert!(!"-bob".is_valid_nick());
        assert!(!"x".repeat(31).is_valid_nick());
    }

    #[test]
    fn test_channels() {
        assert!("#rust".is_channel_name());
        assert!("&local".is_channel_name());
        assert!(!"rust".is_channel_name());
        assert!(!"#a,b".is_channel_name());
        assert!(!"#a b".is_channel_name());
        assert!(!"#bell\x07".is_channel_name());
    }
}
