use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use crate::models::Listing;

/// One page of an already-fetched collection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageResult<'a> {
    pub items: &'a [Listing],
    pub total_pages: usize,
}

pub fn total_pages(len: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    len.div_ceil(page_size)
}

/// Slice `listings` down to the 1-based `page`. Pages outside
/// `1..=total_pages` give an empty slice rather than an error.
pub fn paginate(listings: &[Listing], page: usize, page_size: usize) -> PageResult<'_> {
    let total_pages = total_pages(listings.len(), page_size);
    if page == 0 || page > total_pages {
        return PageResult {
            items: &[],
            total_pages,
        };
    }

    let start = (page - 1) * page_size;
    let end = start.saturating_add(page_size).min(listings.len());
    PageResult {
        items: &listings[start..end],
        total_pages,
    }
}

/// Page numbers shown in the pagination bar: `delta` on either side of
/// `current`, clipped to `1..=total_pages`.
pub fn page_window(current: usize, total_pages: usize, delta: usize) -> RangeInclusive<usize> {
    if total_pages == 0 {
        return RangeInclusive::new(1, 0);
    }
    let start = current.saturating_sub(delta).max(1);
    let end = current.saturating_add(delta).min(total_pages);
    start..=end
}

/// Distinct non-empty categories, sorted ascending (case-sensitive).
pub fn extract_categories(listings: &[Listing]) -> Vec<String> {
    listings
        .iter()
        .filter_map(|l| l.category.as_deref())
        .filter(|c| !c.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
