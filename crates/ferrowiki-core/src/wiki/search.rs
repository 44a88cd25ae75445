use super::Wiki;
use crate::error::WikiError;
use crate::page::Page;
use regex::RegexBuilder;
use std::collections::BTreeMap;

/// Page fields a search term is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Tags,
    Body,
}

pub const DEFAULT_SEARCH_FIELDS: [SearchField; 3] =
    [SearchField::Title, SearchField::Tags, SearchField::Body];

/// Read-side queries over the whole index: tag aggregation and search.
impl Wiki {
    /// Tag aggregation, derived on demand. Each page's `tags` field is split
    /// on commas, tokens are trimmed, empty tokens are discarded.
    pub fn tags(&self) -> Result<BTreeMap<String, Vec<Page>>, WikiError> {
        let mut tags: BTreeMap<String, Vec<Page>> = BTreeMap::new();

        for page in self.index()? {
            for token in page.tags().split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                tags.entry(token.to_string()).or_default().push(page.clone());
            }
        }

        Ok(tags)
    }

    /// Pages whose raw tags field contains `tag` as a substring. This is
    /// containment, not token equality: a page tagged `cat` matches `a`.
    /// Results keep the index ordering (case-insensitive title).
    pub fn pages_by_tag(&self, tag: &str) -> Result<Vec<Page>, WikiError> {
        Ok(self
            .index()?
            .into_iter()
            .filter(|page| page.tags().contains(tag))
            .collect())
    }

    /// Regex search over title, tags and body.
    pub fn search(&self, term: &str, ignore_case: bool) -> Result<Vec<Page>, WikiError> {
        self.search_fields(term, ignore_case, &DEFAULT_SEARCH_FIELDS)
    }

    /// Regex search over the given fields, short-circuiting per page on the
    /// first field match. Results keep the index ordering rather than being
    /// ranked by relevance.
    pub fn search_fields(
        &self,
        term: &str,
        ignore_case: bool,
        fields: &[SearchField],
    ) -> Result<Vec<Page>, WikiError> {
        let regex = RegexBuilder::new(term)
            .case_insensitive(ignore_case)
            .build()?;

        let mut matched = Vec::new();
        for page in self.index()? {
            let hit = fields.iter().any(|field| {
                let text = match field {
                    SearchField::Title => page.title(),
                    SearchField::Tags => page.tags(),
                    SearchField::Body => page.body.as_str(),
                };
                regex.is_match(text)
            });
            if hit {
                matched.push(page);
            }
        }

        Ok(matched)
    }
}
