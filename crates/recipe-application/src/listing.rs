//! Sorting and searching the Persistence Index for display.

use recipe_core::recipe::RecipeSummary;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    UpdateTime,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn reversed(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// How to present the recipe list.
///
/// Defaults to most recently updated first, with no search terms.
#[derive(Debug, Clone)]
pub struct RecipeQuery {
    sort: SortKey,
    order: SortOrder,
    terms: Vec<String>,
}

impl Default for RecipeQuery {
    fn default() -> Self {
        Self {
            sort: SortKey::UpdateTime,
            order: SortOrder::Descending,
            terms: Vec::new(),
        }
    }
}

impl RecipeQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(&self) -> SortKey {
        self.sort
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Selects the sort column. Selecting the current column again flips
    /// the direction; a new column starts ascending.
    pub fn sort_by(mut self, key: SortKey) -> Self {
        if self.sort == key {
            self.order = self.order.reversed();
        } else {
            self.sort = key;
            self.order = SortOrder::Ascending;
        }
        self
    }

    pub fn with_order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the search terms. Every term must match the recipe name.
    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.terms = terms
            .into_iter()
            .map(Into::into)
            .filter(|term: &String| !term.trim().is_empty())
            .collect();
        self
    }

    /// Splits `search` on whitespace into terms.
    pub fn with_search(self, search: &str) -> Self {
        let terms: Vec<&str> = search.split_whitespace().collect();
        self.with_terms(terms)
    }

    /// Filters and sorts `entries`.
    pub fn apply(&self, entries: &[RecipeSummary]) -> Vec<RecipeSummary> {
        let matchers: Vec<Matcher> = self.terms.iter().map(|term| Matcher::new(term)).collect();
        let mut matching: Vec<RecipeSummary> = entries
            .iter()
            .filter(|entry| matchers.iter().all(|m| m.is_match(&entry.name)))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = match self.sort {
                SortKey::UpdateTime => a.update_time.cmp(&b.update_time),
                SortKey::Name => compare_names(&a.name, &b.name),
            };
            match self.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });
        matching
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_uppercase().cmp(&b.to_uppercase())
}

/// Case-insensitive matcher for a search term. A term that is not a valid
/// pattern matches literally.
enum Matcher {
    Pattern(Regex),
    Literal(String),
}

impl Matcher {
    fn new(term: &str) -> Self {
        match RegexBuilder::new(term).case_insensitive(true).build() {
            Ok(regex) => Matcher::Pattern(regex),
            Err(_) => Matcher::Literal(term.to_lowercase()),
        }
    }

    fn is_match(&self, name: &str) -> bool {
        match self {
            Matcher::Pattern(regex) => regex.is_match(name),
            Matcher::Literal(term) => name.to_lowercase().contains(term.as_str()),
        }
    }
}
