use crate::config::SpamConfig;
use crate::models::Visitor;
use once_cell::sync::Lazy;
use regex::Regex;

static LINK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("valid link regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpamDecision {
    Allowed,
    /// Accept, but hold for moderator approval.
    Moderated,
    Denied,
}

pub trait SpamChecker: Send + Sync {
    fn check(&self, visitor: &Visitor, title: &str, description: &str) -> SpamDecision;
}

/// Flags submissions by configured phrases and by link count. Staff are never checked.
pub struct PhraseSpamChecker {
    blocked_phrases: Vec<String>,
    moderated_phrases: Vec<String>,
    max_links: usize,
}

impl PhraseSpamChecker {
    pub fn new(config: &SpamConfig) -> Self {
        let normalize = |phrases: &[String]| {
            phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect()
        };
        Self {
            blocked_phrases: normalize(&config.blocked_phrases),
            moderated_phrases: normalize(&config.moderated_phrases),
            max_links: config.max_links,
        }
    }
}

impl SpamChecker for PhraseSpamChecker {
    fn check(&self, visitor: &Visitor, title: &str, description: &str) -> SpamDecision {
        if visitor.is_staff() {
            return SpamDecision::Allowed;
        }

        let text = format!("{}\n{}", title, description).to_lowercase();

        if self.blocked_phrases.iter().any(|p| text.contains(p.as_str())) {
            tracing::info!(user_id = visitor.user_id(), "Submission rejected as spam");
            return SpamDecision::Denied;
        }

        let links = LINK_PATTERN.find_iter(&text).count();
        if (self.max_links > 0 && links > self.max_links)
            || self.moderated_phrases.iter().any(|p| text.contains(p.as_str()))
        {
            tracing::info!(
                user_id = visitor.user_id(),
                links,
                "Submission held for moderation"
            );
            return SpamDecision::Moderated;
        }

        SpamDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{User, UserRole};

    fn checker() -> PhraseSpamChecker {
        PhraseSpamChecker::new(&SpamConfig {
            blocked_phrases: vec!["Cheap Pills".to_string(), "  ".to_string()],
            moderated_phrases: vec!["casino".to_string()],
            max_links: 2,
        })
    }

    fn member() -> Visitor {
        Visitor::User(User {
            user_id: 4,
            username: "m".to_string(),
            role: UserRole::Member,
            created_at: String::new(),
        })
    }

    #[test]
    fn clean_text_is_allowed() {
        assert_eq!(
            checker().check(&member(), "Sunset", "Taken at https://example.com"),
            SpamDecision::Allowed
        );
    }

    #[test]
    fn blocked_phrase_is_denied_case_insensitively() {
        assert_eq!(
            checker().check(&member(), "Buy CHEAP pills", ""),
            SpamDecision::Denied
        );
    }

    #[test]
    fn link_heavy_or_flagged_text_is_moderated() {
        let links = "http://a.io http://b.io www.c.io";
        assert_eq!(checker().check(&member(), "x", links), SpamDecision::Moderated);
        assert_eq!(
            checker().check(&member(), "Casino night", ""),
            SpamDecision::Moderated
        );
    }

    #[test]
    fn staff_bypass_checks() {
        let admin = Visitor::User(User {
            user_id: 1,
            username: "a".to_string(),
            role: UserRole::Admin,
            created_at: String::new(),
        });
        assert_eq!(checker().check(&admin, "cheap pills", ""), SpamDecision::Allowed);
    }
}
