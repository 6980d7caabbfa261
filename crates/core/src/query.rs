//! Filter, sort and paginate over index projections.
//!
//! The engine is pure: it takes the items of an index and a [`ListQuery`] and returns a
//! [`Page`]. Services decide where the items come from and which projection is exposed.

use crate::collation;
use crate::constants::{DEFAULT_LIMIT, DEFAULT_PAGE};
use crate::{AcervoError, AcervoResult, Issue};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// A value an item exposes for one of its sort keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue<'a> {
    Text(&'a str),
    Number(u64),
    Time(DateTime<Utc>),
}

impl SortValue<'_> {
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => collation::compare(a, b),
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// An item the query engine can filter and sort.
pub trait Queryable {
    /// Keys accepted by [`Queryable::sort_value`]. Any other key leaves order untouched.
    const SORT_KEYS: &'static [&'static str];

    /// Lower-cased text matched by the `q` filter.
    fn search_text(&self) -> &str;

    /// Value of a categorical field compared by exact case-insensitive equality.
    fn field(&self, name: &str) -> Option<&str>;

    fn tags(&self) -> &[String];

    /// Sort value for `key`. Missing values are reported as empty text, zero or the epoch.
    fn sort_value(&self, key: &str) -> SortValue<'_>;
}

/// A listing request.
///
/// Empty strings are treated the same as absent filters.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    q: Option<String>,
    equals: Vec<(String, String)>,
    tag: Option<String>,
    sort: Option<String>,
    page: i64,
    limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            q: None,
            equals: Vec::new(),
            tag: None,
            sort: None,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, q: Option<String>) -> Self {
        self.q = non_empty(q).map(|q| q.to_lowercase());
        self
    }

    /// Adds an equality filter on a categorical field.
    pub fn filter(mut self, field: &str, value: Option<String>) -> Self {
        if let Some(value) = non_empty(value) {
            self.equals.push((field.to_string(), value.to_lowercase()));
        }
        self
    }

    pub fn tag(mut self, tag: Option<String>) -> Self {
        self.tag = non_empty(tag).map(|t| t.to_lowercase());
        self
    }

    /// Sets the sort key, keeping `default` when none is given.
    pub fn sort(mut self, sort: Option<String>, default: &str) -> Self {
        self.sort = Some(non_empty(sort).unwrap_or_else(|| default.to_string()));
        self
    }

    /// Sets the page; values below 1 are treated as 1.
    pub fn page(mut self, page: i64) -> Self {
        self.page = page.max(1);
        self
    }

    /// Sets the page size; zero or negative sizes yield no items.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    fn matches<T: Queryable>(&self, item: &T) -> bool {
        if let Some(q) = &self.q {
            if !item.search_text().contains(q.as_str()) {
                return false;
            }
        }

        for (field, wanted) in &self.equals {
            match item.field(field) {
                Some(value) if value.to_lowercase() == *wanted => {}
                _ => return false,
            }
        }

        if let Some(tag) = &self.tag {
            if !item.tags().iter().any(|t| t.to_lowercase() == *tag) {
                return false;
            }
        }

        true
    }

    /// Slice bounds of the requested page within `total` items.
    fn window(&self, total: usize) -> Option<(usize, usize)> {
        if self.limit <= 0 {
            return None;
        }
        let limit = usize::try_from(self.limit).ok()?;
        let start = usize::try_from(self.page - 1).ok()?.checked_mul(limit)?;
        if start >= total {
            return None;
        }
        Some((start, start.saturating_add(limit).min(total)))
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[aliases(
    FilePage = Page<crate::uploads::FileMeta>,
    AnimalPage = Page<crate::animals::AnimalSummary>
)]
pub struct Page<T> {
    /// Number of items matching the filters, before pagination.
    pub total: usize,
    pub page: i64,
    pub limit: i64,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            total: self.total,
            page: self.page,
            limit: self.limit,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Filters, sorts and paginates `items`.
pub fn run<T: Queryable>(items: Vec<T>, query: &ListQuery) -> Page<T> {
    let mut items: Vec<T> = items.into_iter().filter(|i| query.matches(i)).collect();

    if let Some(key) = query.sort.as_deref() {
        if T::SORT_KEYS.contains(&key) {
            // `sort_by` is stable, so ties and equal-under-collation keep index order.
            items.sort_by(|a, b| a.sort_value(key).compare(&b.sort_value(key)));
        }
    }

    let total = items.len();
    let items = match query.window(total) {
        Some((start, end)) => items.drain(start..end).collect(),
        None => Vec::new(),
    };

    Page {
        total,
        page: query.page,
        limit: query.limit,
        items,
    }
}

/// Parses raw `page` / `limit` query values.
///
/// Absent or empty values take the defaults. Anything that is not an integer is a validation
/// error naming the offending parameter.
pub fn parse_paging(page: Option<&str>, limit: Option<&str>) -> AcervoResult<(i64, i64)> {
    let mut issues = Vec::new();
    let mut parse = |name: &str, raw: Option<&str>, default: i64| -> i64 {
        match raw.map(str::trim).filter(|r| !r.is_empty()) {
            None => default,
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                issues.push(Issue::new(name, format!("expected an integer, got {raw:?}")));
                default
            }),
        }
    };

    let page = parse("page", page, DEFAULT_PAGE);
    let limit = parse("limit", limit, DEFAULT_LIMIT);

    if issues.is_empty() {
        Ok((page, limit))
    } else {
        Err(AcervoError::Validation(issues))
    }
}
