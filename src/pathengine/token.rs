//! A named regex fragment a [`crate::pathengine::Template`] placeholder
//! can reference.
//!
//! Grounded on `original_source/FolderStructure/tokens.py`'s `Token` —
//! a name plus the regex pattern that constrains what a placeholder may
//! match. A template may also declare a pattern inline
//! (`{field:pattern}`), which takes precedence over a registered token of
//! the same name.
//!
//! A token may additionally declare `options`: a friendly-value -> on-disk
//! code mapping (e.g. `modeling` -> `mdl`), grounded on the source's
//! `Token.options` dict. When present, `options` takes over both
//! directions: solving substitutes the code for the supplied friendly
//! value, and parsing resolves a matched code back to its friendly value.

use std::collections::HashMap;

/// The pattern used when neither an inline override nor a registered
/// token supplies one: anything but a path separator.
pub const DEFAULT_PATTERN: &str = "[^/\\\\]+";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Token {
    name: String,
    pattern: String,
    /// Friendly value -> on-disk code.
    options: HashMap<String, String>,
}

impl Token {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pattern: pattern.into(),
            options: HashMap::new(),
        }
    }

    /// A token with no explicit pattern, falling back to
    /// [`DEFAULT_PATTERN`].
    pub fn unconstrained(name: impl Into<String>) -> Self {
        Self::new(name, DEFAULT_PATTERN)
    }

    /// A token whose valid values are an enumerated friendly-name -> code
    /// mapping rather than a free-form pattern.
    pub fn with_options(name: impl Into<String>, options: HashMap<String, String>) -> Self {
        Self {
            name: name.into(),
            pattern: String::new(),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn options(&self) -> &HashMap<String, String> {
        &self.options
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// The regex fragment that should appear in a compiled template: an
    /// alternation of every option's code if options are declared,
    /// otherwise the plain pattern.
    pub fn matching_pattern(&self) -> String {
        if self.options.is_empty() {
            return if self.pattern.is_empty() {
                DEFAULT_PATTERN.to_string()
            } else {
                self.pattern.clone()
            };
        }
        let mut codes: Vec<&str> = self.options.values().map(String::as_str).collect();
        codes.sort_unstable();
        codes.dedup();
        codes
            .iter()
            .map(|code| regex::escape(code))
            .collect::<Vec<_>>()
            .join("|")
    }

    /// Friendly value -> on-disk code, for solving.
    pub fn encode<'a>(&'a self, friendly_value: &'a str) -> &'a str {
        self.options.get(friendly_value).map(String::as_str).unwrap_or(friendly_value)
    }

    /// On-disk code -> friendly value, for parsing.
    pub fn decode<'a>(&'a self, code: &'a str) -> &'a str {
        self.options
            .iter()
            .find(|(_, v)| v.as_str() == code)
            .map(|(k, _)| k.as_str())
            .unwrap_or(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconstrained_token_uses_default_pattern() {
        let token = Token::unconstrained("shot");
        assert_eq!(token.pattern(), DEFAULT_PATTERN);
    }

    #[test]
    fn explicit_pattern_is_kept_verbatim() {
        let token = Token::new("version", r"v\d+");
        assert_eq!(token.pattern(), r"v\d+");
    }

    #[test]
    fn options_round_trip_encode_and_decode() {
        let mut options = HashMap::new();
        options.insert("modeling".to_string(), "mdl".to_string());
        options.insert("rigging".to_string(), "rig".to_string());
        let token = Token::with_options("step", options);
        assert_eq!(token.encode("modeling"), "mdl");
        assert_eq!(token.decode("mdl"), "modeling");
    }

    #[test]
    fn matching_pattern_alternates_declared_codes() {
        let mut options = HashMap::new();
        options.insert("modeling".to_string(), "mdl".to_string());
        options.insert("rigging".to_string(), "rig".to_string());
        let token = Token::with_options("step", options);
        let pattern = token.matching_pattern();
        assert!(pattern.contains("mdl"));
        assert!(pattern.contains("rig"));
        assert!(pattern.contains('|'));
    }
}
