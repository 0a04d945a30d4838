use tracing::{debug, info, warn};

use crate::client::{FetchError, ListingSource};
use crate::models::{Fetched, Listing};
use crate::paging::{self, PageResult};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// A search the caller must run against a `ListingSource` and hand back to
/// `Controller::complete` together with its generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub generation: u64,
    pub term: String,
    pub category: Option<String>,
}

impl FetchRequest {
    pub fn run(&self, source: &dyn ListingSource) -> Result<Fetched, FetchError> {
        source.search(&self.term, self.category.as_deref())
    }

    fn is_unfiltered(&self) -> bool {
        self.term.trim().is_empty() && self.category.is_none()
    }
}

/// State of one board view: query, fetched collection, current page and the
/// detail selection. Network I/O happens outside; this type only decides
/// when a fetch is needed and what to show once it returns.
#[derive(Debug)]
pub struct Controller {
    page_size: usize,
    term: String,
    category: Option<String>,
    page: usize,
    cursor: usize,
    listings: Vec<Listing>,
    rejected: usize,
    categories: Vec<String>,
    phase: Phase,
    generation: u64,
    pending: Option<FetchRequest>,
    selected: Option<Listing>,
}

impl Controller {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            term: String::new(),
            category: None,
            page: 1,
            cursor: 0,
            listings: Vec::new(),
            rejected: 0,
            categories: Vec::new(),
            phase: Phase::Idle,
            generation: 0,
            pending: None,
            selected: None,
        }
    }

    /// Seed the query before mounting, e.g. from command-line flags.
    pub fn with_query(mut self, term: &str, category: Option<&str>) -> Self {
        self.term = term.trim().to_string();
        self.category = category.map(str::to_string).filter(|c| !c.is_empty());
        self
    }

    /// First load of the view.
    pub fn mount(&mut self) -> FetchRequest {
        self.page = 1;
        self.issue()
    }

    pub fn submit_search(&mut self, term: &str) -> FetchRequest {
        self.term = term.trim().to_string();
        self.page = 1;
        self.issue()
    }

    pub fn select_category(&mut self, category: Option<&str>) -> FetchRequest {
        self.category = category.map(str::to_string).filter(|c| !c.is_empty());
        self.page = 1;
        self.issue()
    }

    /// Step through "All Categories" followed by each known category.
    pub fn cycle_category(&mut self, forward: bool) -> FetchRequest {
        let slots = self.categories.len() + 1;
        let current = match &self.category {
            Some(cat) => self
                .categories
                .iter()
                .position(|c| c == cat)
                .map_or(0, |i| i + 1),
            None => 0,
        };
        let next = if forward {
            (current + 1) % slots
        } else {
            (current + slots - 1) % slots
        };
        let category = next.checked_sub(1).map(|i| self.categories[i].clone());
        self.select_category(category.as_deref())
    }

    /// Re-run the current query, keeping the page where possible.
    pub fn refresh(&mut self) -> FetchRequest {
        self.issue()
    }

    fn issue(&mut self) -> FetchRequest {
        self.generation += 1;
        self.phase = Phase::Loading;
        let request = FetchRequest {
            generation: self.generation,
            term: self.term.clone(),
            category: self.category.clone(),
        };
        debug!(generation = request.generation, term = %request.term, category = ?request.category, "issuing fetch");
        self.pending = Some(request.clone());
        request
    }

    /// Apply the outcome of a fetch. Returns `false` when the response
    /// belongs to a superseded request and was dropped.
    pub fn complete(&mut self, generation: u64, result: Result<Fetched, FetchError>) -> bool {
        let Some(request) = self.pending.take_if(|p| p.generation == generation) else {
            debug!(generation, latest = self.generation, "discarding stale response");
            return false;
        };

        match result {
            Ok(fetched) => {
                info!(
                    generation,
                    listings = fetched.listings.len(),
                    rejected = fetched.rejected,
                    "fetch complete"
                );
                if self.categories.is_empty() && request.is_unfiltered() {
                    self.categories = paging::extract_categories(&fetched.listings);
                }
                self.listings = fetched.listings;
                self.rejected = fetched.rejected;
                self.page = self.page.clamp(1, self.total_pages().max(1));
                self.cursor = 0;
                self.phase = Phase::Loaded;
            }
            Err(err) => {
                warn!(generation, error = %err, "fetch failed");
                self.phase = Phase::Error(err.to_string());
            }
        }
        true
    }

    pub fn go_to_page(&mut self, page: usize) -> bool {
        if page < 1 || page > self.total_pages() || page == self.page {
            return false;
        }
        self.page = page;
        self.cursor = 0;
        true
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.page + 1)
    }

    pub fn prev_page(&mut self) -> bool {
        self.go_to_page(self.page.saturating_sub(1))
    }

    pub fn first_page(&mut self) -> bool {
        self.go_to_page(1)
    }

    pub fn last_page(&mut self) -> bool {
        self.go_to_page(self.total_pages())
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.page_result().items.len();
        if len == 0 {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.saturating_add_signed(delta).min(len - 1);
    }

    pub fn open_detail(&mut self) -> bool {
        self.open_detail_at(self.cursor)
    }

    pub fn open_detail_at(&mut self, index: usize) -> bool {
        self.selected = self.page_result().items.get(index).cloned();
        self.selected.is_some()
    }

    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&Listing> {
        self.selected.as_ref()
    }

    pub fn page_result(&self) -> PageResult<'_> {
        paging::paginate(&self.listings, self.page, self.page_size)
    }

    pub fn total_pages(&self) -> usize {
        paging::total_pages(self.listings.len(), self.page_size)
    }

    pub fn window(&self, delta: usize) -> RangeInclusive<usize> {
        paging::page_window(self.page, self.total_pages(), delta)
    }

    /// Loaded successfully and nothing matched. Not an error.
    pub fn is_empty_result(&self) -> bool {
        self.phase == Phase::Loaded && self.listings.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn term(&self) -> &str {
        &self.term
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::tests::{listing, listings};
    use std::sync::Mutex;

    /// Canned source: answers with the listings whose category matches, or
    /// fails when `fail` is set.
    struct StubSource {
        listings: Vec<Listing>,
        fail: Mutex<bool>,
        calls: Mutex<Vec<(String, Option<String>)>>,
    }

    impl StubSource {
        fn new(listings: Vec<Listing>) -> Self {
            Self {
                listings,
                fail: Mutex::new(false),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn set_failing(&self, fail: bool) {
            *self.fail.lock().unwrap() = fail;
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ListingSource for StubSource {
        fn search(&self, term: &str, category: Option<&str>) -> Result<Fetched, FetchError> {
            self.calls
                .lock()
                .unwrap()
                .push((term.to_string(), category.map(str::to_string)));
            if *self.fail.lock().unwrap() {
                return Err(FetchError::Status {
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            let listings = self
                .listings
                .iter()
                .filter(|l| category.is_none() || l.category.as_deref() == category)
                .filter(|l| term.is_empty() || l.title.contains(term))
                .cloned()
                .collect();
            Ok(Fetched {
                listings,
                rejected: 0,
            })
        }
    }

    fn run(controller: &mut Controller, source: &StubSource, request: FetchRequest) -> bool {
        let result = request.run(source);
        controller.complete(request.generation, result)
    }

    fn mixed() -> Vec<Listing> {
        let mut all = listings(13);
        all.push(listing(100, Some("Writing")));
        all.push(listing(101, Some("")));
        all.push(listing(102, None));
        all
    }

    #[test]
    fn test_mount_starts_loading_then_loaded() {
        let source = StubSource::new(listings(13));
        let mut controller = Controller::new(12);
        assert_eq!(controller.phase(), &Phase::Idle);

        let request = controller.mount();
        assert_eq!(controller.phase(), &Phase::Loading);
        assert_eq!(request.term, "");
        assert_eq!(request.category, None);

        assert!(run(&mut controller, &source, request));
        assert_eq!(controller.phase(), &Phase::Loaded);
        assert_eq!(controller.page(), 1);
        assert_eq!(controller.page_result().items.len(), 12);
        assert_eq!(controller.total_pages(), 2);
    }

    #[test]
    fn test_page_change_does_not_refetch() {
        let source = StubSource::new(listings(13));
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);

        assert!(controller.next_page());
        assert_eq!(controller.page(), 2);
        assert_eq!(controller.page_result().items.len(), 1);
        assert_eq!(source.call_count(), 1);

        assert!(!controller.next_page());
        assert!(!controller.go_to_page(0));
        assert!(!controller.go_to_page(3));
        assert_eq!(controller.page(), 2);

        assert!(controller.first_page());
        assert_eq!(controller.page(), 1);
        assert!(controller.last_page());
        assert_eq!(controller.page(), 2);
    }

    #[test]
    fn test_filter_change_resets_page() {
        let source = StubSource::new(mixed());
        let mut controller = Controller::new(5);
        let request = controller.mount();
        run(&mut controller, &source, request);

        controller.go_to_page(3);
        assert_eq!(controller.page(), 3);
        let request = controller.select_category(Some("Dev"));
        assert_eq!(controller.page(), 1);
        assert_eq!(request.category.as_deref(), Some("Dev"));
        run(&mut controller, &source, request);
        assert_eq!(controller.page(), 1);

        controller.go_to_page(2);
        let request = controller.submit_search("Job 1");
        assert_eq!(controller.page(), 1);
        run(&mut controller, &source, request);
        assert_eq!(controller.page(), 1);
        assert_eq!(source.call_count(), 3);
    }

    #[test]
    fn test_categories_come_from_unfiltered_load() {
        let source = StubSource::new(mixed());
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);
        assert_eq!(controller.categories(), ["Dev", "Writing"]);

        let request = controller.select_category(Some("Writing"));
        run(&mut controller, &source, request);
        assert_eq!(controller.listings().len(), 1);
        assert_eq!(controller.categories(), ["Dev", "Writing"]);
    }

    #[test]
    fn test_filtered_first_load_does_not_populate_categories() {
        let source = StubSource::new(mixed());
        let mut controller = Controller::new(12).with_query("", Some("Writing"));
        let request = controller.mount();
        run(&mut controller, &source, request);
        assert!(controller.categories().is_empty());

        let request = controller.select_category(None);
        run(&mut controller, &source, request);
        assert_eq!(controller.categories(), ["Dev", "Writing"]);
    }

    #[test]
    fn test_empty_category_listing_still_listed() {
        let source = StubSource::new(mixed());
        let mut controller = Controller::new(50);
        let request = controller.mount();
        run(&mut controller, &source, request);
        assert!(!controller.categories().iter().any(|c| c.is_empty()));
        assert!(controller.page_result().items.iter().any(|l| l.id == 101));
    }

    #[test]
    fn test_failure_keeps_previous_listings() {
        let source = StubSource::new(listings(13));
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);

        source.set_failing(true);
        let request = controller.submit_search("Job");
        assert!(run(&mut controller, &source, request));

        assert!(matches!(controller.phase(), Phase::Error(msg) if msg.contains("502")));
        assert_eq!(controller.page_result().items.len(), 12);
        assert!(!controller.is_empty_result());

        source.set_failing(false);
        let request = controller.refresh();
        run(&mut controller, &source, request);
        assert_eq!(controller.phase(), &Phase::Loaded);
    }

    #[test]
    fn test_empty_result_is_not_error() {
        let source = StubSource::new(Vec::new());
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);

        assert_eq!(controller.phase(), &Phase::Loaded);
        assert!(controller.is_empty_result());
        assert_eq!(controller.total_pages(), 0);
        assert!(controller.page_result().items.is_empty());
        assert!(controller.window(2).is_empty());
    }

    #[test]
    fn test_stale_response_is_discarded() {
        let source = StubSource::new(mixed());
        let mut controller = Controller::new(12);
        let first = controller.mount();
        let second = controller.select_category(Some("Writing"));

        let second_result = second.run(&source);
        assert!(controller.complete(second.generation, second_result));
        assert_eq!(controller.listings().len(), 1);

        let first_result = first.run(&source);
        assert!(!controller.complete(first.generation, first_result));
        assert_eq!(controller.listings().len(), 1);
        assert_eq!(controller.phase(), &Phase::Loaded);
    }

    #[test]
    fn test_stale_failure_does_not_flag_error() {
        let source = StubSource::new(listings(3));
        let mut controller = Controller::new(12);
        let first = controller.mount();
        let second = controller.refresh();

        let result = second.run(&source);
        controller.complete(second.generation, result);

        let stale = Err(FetchError::Status {
            status: 500,
            body: String::new(),
        });
        assert!(!controller.complete(first.generation, stale));
        assert_eq!(controller.phase(), &Phase::Loaded);
    }

    #[test]
    fn test_refresh_clamps_page_when_collection_shrinks() {
        let mut all = listings(30);
        let mut controller = Controller::new(10);
        let request = controller.mount();
        controller.complete(
            request.generation,
            Ok(Fetched {
                listings: all.clone(),
                rejected: 0,
            }),
        );
        controller.go_to_page(3);

        all.truncate(12);
        let request = controller.refresh();
        controller.complete(
            request.generation,
            Ok(Fetched {
                listings: all,
                rejected: 2,
            }),
        );
        assert_eq!(controller.page(), 2);
        assert_eq!(controller.page_result().items.len(), 2);
        assert_eq!(controller.rejected_count(), 2);
    }

    #[test]
    fn test_cycle_category() {
        let source = StubSource::new(mixed());
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);

        assert_eq!(controller.cycle_category(true).category.as_deref(), Some("Dev"));
        assert_eq!(controller.cycle_category(true).category.as_deref(), Some("Writing"));
        assert_eq!(controller.cycle_category(true).category, None);
        assert_eq!(controller.cycle_category(false).category.as_deref(), Some("Writing"));
    }

    #[test]
    fn test_cycle_category_without_categories_stays_on_all() {
        let mut controller = Controller::new(12);
        assert_eq!(controller.cycle_category(true).category, None);
        assert_eq!(controller.cycle_category(false).category, None);
    }

    #[test]
    fn test_detail_selection() {
        let source = StubSource::new(listings(13));
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);

        controller.move_cursor(3);
        assert!(controller.open_detail());
        assert_eq!(controller.selected().map(|l| l.id), Some(3));

        let request = controller.submit_search("nothing matches");
        run(&mut controller, &source, request);
        assert_eq!(controller.selected().map(|l| l.id), Some(3));

        controller.close_detail();
        assert!(controller.selected().is_none());
        assert!(!controller.open_detail_at(0));
    }

    #[test]
    fn test_cursor_stays_on_page() {
        let source = StubSource::new(listings(13));
        let mut controller = Controller::new(12);
        let request = controller.mount();
        run(&mut controller, &source, request);

        controller.move_cursor(-5);
        assert_eq!(controller.cursor(), 0);
        controller.move_cursor(50);
        assert_eq!(controller.cursor(), 11);
        controller.next_page();
        assert_eq!(controller.cursor(), 0);
        controller.move_cursor(1);
        assert_eq!(controller.cursor(), 0);
    }
}
