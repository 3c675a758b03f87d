//! Story model - an estimable unit of work

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::code::RoomCode;

/// A story in a room's queue, ordered by `order_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: i64,
    pub room_code: RoomCode,
    pub title: String,
    pub external_link: Option<String>,
    /// Dense, zero-based position in the queue.
    pub order_index: i64,
    /// Facilitator-confirmed point value, independent of the raw
    /// vote distribution.
    pub final_estimate: Option<f64>,
    /// Set the first time votes are revealed for this story.
    pub voted_at: Option<DateTime<Utc>>,
}

/// Payload for creating a story; id and position are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub title: String,
    pub external_link: Option<String>,
}

impl NewStory {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            external_link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.external_link = Some(link.into());
        self
    }

    /// Build a story from a bulk-import line, auto-linking a ticket
    /// reference against the room's tracker base URL when one is found.
    pub fn from_import_line(line: &str, base_url: Option<&str>) -> Self {
        let title = line.trim().to_string();
        let link = base_url.and_then(|base| {
            detect_ticket_ref(&title).map(|key| {
                format!("{}/browse/{key}", base.trim_end_matches('/'))
            })
        });
        Self {
            title,
            external_link: link,
        }
    }
}

/// Find a ticket reference in a story title.
///
/// Recognizes issue keys like `PROJ-123` and bare numeric references.
pub fn detect_ticket_ref(title: &str) -> Option<String> {
    for token in title.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
        if token.is_empty() {
            continue;
        }
        if is_issue_key(token) || token.chars().all(|c| c.is_ascii_digit()) {
            return Some(token.to_string());
        }
    }
    None
}

/// `ABC-123` shape: uppercase alphanumeric project key, dash, digits.
fn is_issue_key(token: &str) -> bool {
    let Some((project, number)) = token.split_once('-') else {
        return false;
    };
    !project.is_empty()
        && project.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && project
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        && !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_issue_key() {
        assert_eq!(
            detect_ticket_ref("PROJ-123 Login flow"),
            Some("PROJ-123".into())
        );
        assert_eq!(
            detect_ticket_ref("Fix checkout (WEB2-45)"),
            Some("WEB2-45".into())
        );
    }

    #[test]
    fn test_detects_bare_number() {
        assert_eq!(detect_ticket_ref("4711 payment retries"), Some("4711".into()));
    }

    #[test]
    fn test_plain_title_has_no_ref() {
        assert_eq!(detect_ticket_ref("Login flow rework"), None);
        assert_eq!(detect_ticket_ref("lowercase-123 thing"), None);
    }

    #[test]
    fn test_import_line_links_against_base_url() {
        let story =
            NewStory::from_import_line("PROJ-9 Add search", Some("https://tracker.example/"));
        assert_eq!(story.title, "PROJ-9 Add search");
        assert_eq!(
            story.external_link.as_deref(),
            Some("https://tracker.example/browse/PROJ-9")
        );
    }

    #[test]
    fn test_import_line_without_base_url_has_no_link() {
        let story = NewStory::from_import_line("PROJ-9 Add search", None);
        assert_eq!(story.external_link, None);
    }
}
