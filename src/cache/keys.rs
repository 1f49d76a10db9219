//! Cache key definitions.
//!
//! Every key is `namespace:field[:field...]`. Each query shape owns one
//! namespace and a fixed field order, and free-form fields are escaped so
//! they can never forge a delimiter.

use std::fmt;

pub const DELIMITER: char = ':';

const ABSENT_SEARCH: &str = "all";
const ABSENT_TAGS: &str = "none";
const SEARCH_MARKER: char = '=';

/// Key namespaces used by the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Startup detail by id.
    Startup,
    /// "Has this user requested access to this startup" checks.
    Access,
    /// User profile by id.
    Profile,
    /// Paginated, filtered startup listings.
    Startups,
    /// The full tag catalogue.
    Tags,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Startup => "startup",
            Namespace::Access => "access",
            Namespace::Profile => "profile",
            Namespace::Startups => "startups",
            Namespace::Tags => "tags",
        }
    }

    /// Prefix shared by every key in the namespace, delimiter included.
    pub fn prefix(self) -> String {
        format!("{}{DELIMITER}", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn startup_key(startup_id: &str) -> String {
    compose(Namespace::Startup, &[escape(startup_id)])
}

pub fn access_key(startup_id: &str, user_id: &str) -> String {
    compose(Namespace::Access, &[escape(startup_id), escape(user_id)])
}

pub fn profile_key(user_id: &str) -> String {
    compose(Namespace::Profile, &[escape(user_id)])
}

/// Listing key for a page of startups.
///
/// Pages are 1-based and page 0 is read as page 1. Search matching is
/// case-insensitive and ignores surrounding whitespace, so the search term is
/// normalised the same way; a blank search is the same query as no search.
/// Tag ids are sorted but not deduplicated.
pub fn list_key(page: u32, search: Option<&str>, tag_ids: &[i32]) -> String {
    let page = page.max(1);
    let search = match search.map(str::trim).filter(|term| !term.is_empty()) {
        Some(term) => format!("{SEARCH_MARKER}{}", escape(&term.to_lowercase())),
        None => ABSENT_SEARCH.to_string(),
    };

    let tags = if tag_ids.is_empty() {
        ABSENT_TAGS.to_string()
    } else {
        let mut sorted = tag_ids.to_vec();
        sorted.sort_unstable();
        sorted
            .iter()
            .map(i32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };

    compose(Namespace::Startups, &[page.to_string(), search, tags])
}

pub fn tags_key() -> String {
    compose(Namespace::Tags, &["all".to_string()])
}

fn compose(namespace: Namespace, fields: &[String]) -> String {
    let mut key = namespace.as_str().to_string();
    for field in fields {
        key.push(DELIMITER);
        key.push_str(field);
    }
    key
}

/// Percent-escape the characters that carry meaning inside a key.
fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            ',' => escaped.push_str("%2C"),
            '=' => escaped.push_str("%3D"),
            other => escaped.push(other),
        }
    }
    escaped
}
