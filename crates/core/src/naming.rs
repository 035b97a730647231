//! Vendor tool-name rules.
//!
//! Every model vendor restricts what a tool may be called. OpenAI, Anthropic
//! and Bedrock all accept `^[a-zA-Z0-9_-]{1,64}$`, which is the default here.

/// Alphabet and length limit for tool names presented to one vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamePolicy {
    /// Maximum number of characters in a tool name.
    pub max_len: usize,

    /// Characters allowed in addition to ASCII letters and digits.
    pub extra_chars: &'static str,

    /// Substitute for every illegal character.
    pub replacement: char,
}

impl NamePolicy {
    pub const fn new(max_len: usize, extra_chars: &'static str) -> Self {
        Self {
            max_len,
            extra_chars,
            replacement: '_',
        }
    }

    pub fn is_legal_char(&self, c: char) -> bool {
        c.is_ascii_alphanumeric() || self.extra_chars.contains(c)
    }

    /// Replace illegal characters. The result is never empty and always
    /// starts with an ASCII letter or digit; length is not enforced here.
    pub fn sanitize(&self, name: &str) -> String {
        let sanitized: String = name
            .chars()
            .map(|c| if self.is_legal_char(c) { c } else { self.replacement })
            .collect();

        match sanitized.chars().next() {
            Some(c) if c.is_ascii_alphanumeric() => sanitized,
            _ => format!("tool_{sanitized}"),
        }
    }

    /// Whether `name` can be sent to the vendor as-is.
    pub fn accepts(&self, name: &str) -> bool {
        !name.is_empty()
            && name.chars().count() <= self.max_len
            && name.chars().all(|c| self.is_legal_char(c))
    }
}

impl Default for NamePolicy {
    fn default() -> Self {
        Self::new(64, "_-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dots_become_underscores() {
        let policy = NamePolicy::default();
        assert_eq!(policy.sanitize("orders.lookup"), "orders_lookup");
        assert_eq!(policy.sanitize("news api/top headlines"), "news_api_top_headlines");
    }

    #[test]
    fn hyphen_is_kept() {
        assert_eq!(NamePolicy::default().sanitize("get-weather"), "get-weather");
    }

    #[test]
    fn leading_symbol_gets_prefix() {
        let policy = NamePolicy::default();
        assert_eq!(policy.sanitize(".hidden"), "tool__hidden");
        assert_eq!(policy.sanitize(""), "tool_");
    }

    #[test]
    fn accepts_enforces_length_and_alphabet() {
        let policy = NamePolicy::new(8, "_");
        assert!(policy.accepts("abc_123"));
        assert!(!policy.accepts("abc-123"));
        assert!(!policy.accepts("abcdefghi"));
        assert!(!policy.accepts(""));
    }
}
