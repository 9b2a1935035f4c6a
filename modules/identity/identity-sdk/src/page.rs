//! Offset/limit pagination envelope with navigation links.

use serde::{Deserialize, Serialize};

/// A single navigation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub rel: String,
    pub href: String,
}

/// A page of results together with the total match count and navigation
/// links for the same `limit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(rename = "totalResults")]
    pub total: u64,
    pub items: Vec<T>,
    pub links: Vec<PageLink>,
}

impl<T> Page<T> {
    /// Assemble a page and derive its navigation links.
    ///
    /// `first` and `last` are present whenever there is any content;
    /// `prev` is absent at offset zero and `next` is absent once
    /// `offset + limit` reaches the total.
    #[must_use]
    pub fn new(items: Vec<T>, total: u64, base_path: &str, limit: u64, offset: u64) -> Self {
        Self {
            total,
            items,
            links: build_links(base_path, limit, offset, total),
        }
    }

    /// An empty page with no links, used when list scoping denies all
    /// organization units without touching the store.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            total: 0,
            items: Vec::new(),
            links: Vec::new(),
        }
    }
}

fn link(rel: &str, base_path: &str, offset: u64, limit: u64) -> PageLink {
    PageLink {
        rel: rel.to_owned(),
        href: format!("{base_path}?offset={offset}&limit={limit}"),
    }
}

fn build_links(base_path: &str, limit: u64, offset: u64, total: u64) -> Vec<PageLink> {
    if total == 0 || limit == 0 {
        return Vec::new();
    }

    let mut links = vec![link("first", base_path, 0, limit)];
    if offset > 0 {
        links.push(link("prev", base_path, offset.saturating_sub(limit), limit));
    }
    if offset + limit < total {
        links.push(link("next", base_path, offset + limit, limit));
    }
    let last_offset = ((total - 1) / limit) * limit;
    links.push(link("last", base_path, last_offset, limit));
    links
}
