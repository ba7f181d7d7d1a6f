//! Placeholder substitution for welcome messages.
//!
//! Templates use single-brace placeholders such as `{user}`. Only the fixed
//! set in [`Placeholder`] is recognized; anything else, and any recognized
//! placeholder without a value, is copied through literally.

use std::fmt;

/// Placeholders a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    User,
    UserId,
    ServerName,
    ServerId,
    MemberCount,
    BotName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 6] = [
        Self::User,
        Self::UserId,
        Self::ServerName,
        Self::ServerId,
        Self::MemberCount,
        Self::BotName,
    ];

    /// Returns the name used between the braces.
    pub fn name(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::UserId => "user_id",
            Self::ServerName => "server_name",
            Self::ServerId => "server_id",
            Self::MemberCount => "member_count",
            Self::BotName => "bot_name",
        }
    }

    /// Looks up a placeholder by name. Names are case-sensitive.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.name())
    }
}

/// Values available to a template.
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: [Option<String>; 6],
}

impl TemplateVars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of a placeholder.
    pub fn set(mut self, placeholder: Placeholder, value: impl ToString) -> Self {
        self.values[Self::slot(placeholder)] = Some(value.to_string());
        self
    }

    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values[Self::slot(placeholder)].as_deref()
    }

    fn slot(placeholder: Placeholder) -> usize {
        placeholder as usize
    }

    /// Renders `template`, substituting every known placeholder that has a
    /// value.
    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            match after.find(['{', '}']) {
                Some(end) if after.as_bytes()[end] == b'}' => {
                    let name = &after[..end];
                    match Placeholder::parse(name).and_then(|p| self.get(p)) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &after[end + 1..];
                }
                // Another `{` before any `}`: this brace is plain text.
                Some(end) => {
                    out.push('{');
                    out.push_str(&after[..end]);
                    rest = &after[end..];
                }
                None => {
                    out.push('{');
                    rest = after;
                    break;
                }
            }
        }

        out.push_str(rest);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> TemplateVars {
        TemplateVars::new()
            .set(Placeholder::User, "alice")
            .set(Placeholder::ServerName, "Rustaceans")
            .set(Placeholder::MemberCount, 42)
    }

    #[test]
    fn test_substitutes_known_placeholders() {
        assert_eq!(
            vars().render("Hi {user}, welcome to {server_name} ({member_count} members)"),
            "Hi alice, welcome to Rustaceans (42 members)"
        );
    }

    #[test]
    fn test_unknown_and_unset_stay_literal() {
        assert_eq!(vars().render("{nickname} {bot_name}"), "{nickname} {bot_name}");
        assert_eq!(vars().render("{USER}"), "{USER}");
    }

    #[test]
    fn test_unbalanced_braces() {
        assert_eq!(vars().render("{{user}"), "{alice");
        assert_eq!(vars().render("hello {user"), "hello {user");
        assert_eq!(vars().render("}{user}{"), "}alice{");
    }

    #[test]
    fn test_repeated_placeholder() {
        assert_eq!(vars().render("{user}{user}"), "alicealice");
    }

    #[test]
    fn test_placeholder_display() {
        assert_eq!(Placeholder::ServerId.to_string(), "{server_id}");
        assert_eq!(Placeholder::parse("bot_name"), Some(Placeholder::BotName));
    }
}
