//! Browsing queries over a species snapshot: kind filter, name search,
//! ordering by common name and pagination.

use std::cmp::Ordering;

use crate::id::Kind;
use crate::types::Species;

pub const DEFAULT_PAGE_SIZE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    pub kind: Option<Kind>,
    pub search: String,
    pub order: SortOrder,
    /// 1-based.
    pub page: usize,
    pub per_page: usize,
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self {
            kind: None,
            search: String::new(),
            order: SortOrder::Ascending,
            page: 1,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub items: Vec<Species>,
    pub total_items: usize,
    pub total_pages: usize,
    pub page: usize,
}

impl CatalogQuery {
    pub fn of_kind(kind: Kind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn matches(&self, species: &Species) -> bool {
        if self.kind.is_some_and(|kind| species.kind() != kind) {
            return false;
        }
        let needle = self.search.trim().to_lowercase();
        needle.is_empty()
            || species.common_name.to_lowercase().contains(&needle)
            || species.scientific_name.to_lowercase().contains(&needle)
    }

    pub fn apply(&self, species: &[Species]) -> CatalogPage {
        let mut matched: Vec<&Species> = species.iter().filter(|s| self.matches(s)).collect();
        matched.sort_by(|a, b| {
            let ordering = compare_names(&a.common_name, &b.common_name);
            match self.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            }
        });

        let per_page = self.per_page.max(1);
        let page = self.page.max(1);
        let total_items = matched.len();
        let items = matched
            .into_iter()
            .skip((page - 1).saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect();

        CatalogPage {
            items,
            total_items,
            total_pages: total_items.div_ceil(per_page),
            page,
        }
    }
}

fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Number of trees and animals in a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KindCounts {
    pub trees: usize,
    pub animals: usize,
}

impl KindCounts {
    pub fn of(species: &[Species]) -> Self {
        species.iter().fold(Self::default(), |mut counts, entry| {
            match entry.kind() {
                Kind::Tree => counts.trees += 1,
                Kind::Animal => counts.animals += 1,
            }
            counts
        })
    }
}
