//! Startup input rules and listing queries.

use serde::Deserialize;

use crate::cache::list_key;
use crate::domain::error::DomainError;

pub const MIN_NAME_CHARS: usize = 3;
pub const MIN_DESCRIPTION_CHARS: usize = 10;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// A startup as submitted by its creator.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStartup {
    pub name: String,
    pub description: String,
    /// Existing tags, by id.
    #[serde(default)]
    pub tag_ids: Vec<i32>,
    /// Tags to attach by name, created when unknown.
    #[serde(default)]
    pub tag_names: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
}

impl NewStartup {
    /// Trim the text fields and enforce their minimum lengths.
    pub fn validated(self) -> Result<Self, DomainError> {
        let name = validate_name(&self.name)?;
        let description = validate_description(&self.description)?;

        let mut tag_names: Vec<String> = Vec::with_capacity(self.tag_names.len());
        for tag in self.tag_names {
            let tag = tag.trim();
            if !tag.is_empty() && !tag_names.iter().any(|seen| seen == tag) {
                tag_names.push(tag.to_string());
            }
        }

        Ok(Self {
            name,
            description,
            tag_names,
            ..self
        })
    }
}

pub fn validate_name(name: &str) -> Result<String, DomainError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("startup name is required"));
    }
    if trimmed.chars().count() < MIN_NAME_CHARS {
        return Err(DomainError::validation(format!(
            "startup name must be at least {MIN_NAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_description(description: &str) -> Result<String, DomainError> {
    let trimmed = description.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("description is required"));
    }
    if trimmed.chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(DomainError::validation(format!(
            "description must be at least {MIN_DESCRIPTION_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

/// One page of the startup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupListQuery {
    pub page: u32,
    pub search: Option<String>,
    pub tag_ids: Vec<i32>,
}

impl Default for StartupListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            search: None,
            tag_ids: Vec::new(),
        }
    }
}

impl StartupListQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: page.max(1),
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_tags(mut self, tag_ids: impl IntoIterator<Item = i32>) -> Self {
        self.tag_ids = tag_ids.into_iter().collect();
        self
    }

    /// Search term as the listing filters on it: trimmed, lowercased, and
    /// `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase)
    }

    pub fn offset(&self, page_size: u32) -> u64 {
        u64::from(self.page.max(1) - 1) * u64::from(page_size)
    }

    pub fn cache_key(&self) -> String {
        list_key(self.page, self.search.as_deref(), &self.tag_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_before_length_check() {
        assert_eq!(validate_name("  Acme  ").expect("valid"), "Acme");
        assert!(validate_name("  ab  ").is_err());
        assert!(validate_name("   ").is_err());
    }

    #[test]
    fn descriptions_need_ten_characters() {
        assert!(validate_description("too short").is_err());
        assert!(validate_description("long enough").is_ok());
    }

    #[test]
    fn validated_startup_dedupes_tag_names() {
        let startup = NewStartup {
            name: " Rocket ".to_string(),
            description: "Reusable launch vehicles".to_string(),
            tag_names: vec![" rust ".to_string(), "rust".to_string(), " ".to_string()],
            ..NewStartup::default()
        }
        .validated()
        .expect("valid startup");

        assert_eq!(startup.name, "Rocket");
        assert_eq!(startup.tag_names, vec!["rust".to_string()]);
    }

    #[test]
    fn equivalent_queries_share_a_cache_key() {
        let a = StartupListQuery::page(2).with_search("React").with_tags([3, 1]);
        let b = StartupListQuery::page(2).with_search(" react ").with_tags([1, 3]);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.search_term().as_deref(), Some("react"));
        assert_eq!(a.offset(10), 10);
    }

    #[test]
    fn page_zero_is_clamped() {
        assert_eq!(StartupListQuery::page(0).page, 1);

        let literal = StartupListQuery {
            page: 0,
            ..StartupListQuery::default()
        };
        assert_eq!(literal.cache_key(), StartupListQuery::default().cache_key());
        assert_eq!(literal.offset(10), 0);
    }
}
