//! Backward pagination bookkeeping.

use tracing::debug;

/// Cursor over a conversation's older history.
///
/// `page` counts from 1 (the initially loaded page) and advances only when
/// a fetch contributed at least one new message after dedup. `has_more`
/// latches false once the backend is exhausted. The `in_flight` flag is the
/// re-entrancy guard: only one older-history fetch per conversation at a
/// time.
#[derive(Debug, Clone)]
pub struct PageCursor {
    page: u32,
    has_more: bool,
    in_flight: bool,
}

impl PageCursor {
    /// Cursor for a freshly materialized conversation whose initial load was
    /// page 1 of `last_page`.
    pub fn from_initial(last_page: u32) -> Self {
        Self {
            page: 1,
            has_more: last_page > 1,
            in_flight: false,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    /// Claim the next page to fetch. `None` when exhausted or a load is
    /// already in flight.
    pub fn begin(&mut self) -> Option<u32> {
        if !self.has_more || self.in_flight {
            debug!(
                "pagination skipped: has_more={} in_flight={}",
                self.has_more, self.in_flight
            );
            return None;
        }
        self.in_flight = true;
        Some(self.page + 1)
    }

    /// Settle a successful fetch. `added` is the number of messages that
    /// survived dedup; zero means the history is exhausted regardless of
    /// what the page arithmetic says.
    pub fn complete(&mut self, fetched_page: u32, last_page: u32, added: usize) {
        self.in_flight = false;
        if added == 0 {
            self.has_more = false;
            return;
        }
        self.page = fetched_page;
        self.has_more = fetched_page < last_page;
    }

    /// A failed fetch releases the guard and leaves everything else
    /// untouched so scrolling up again retries the same page.
    pub fn fail(&mut self) {
        self.in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let cursor = PageCursor::from_initial(4);
        assert_eq!(cursor.page(), 1);
        assert!(cursor.has_more());
        assert!(!cursor.is_loading());

        let cursor = PageCursor::from_initial(1);
        assert!(!cursor.has_more());
    }

    #[test]
    fn test_begin_guards_reentry() {
        let mut cursor = PageCursor::from_initial(3);
        assert_eq!(cursor.begin(), Some(2));
        // a second call while the first is in flight is refused
        assert_eq!(cursor.begin(), None);

        cursor.complete(2, 3, 20);
        assert_eq!(cursor.page(), 2);
        assert!(cursor.has_more());
        assert_eq!(cursor.begin(), Some(3));
    }

    #[test]
    fn test_last_page_exhausts() {
        let mut cursor = PageCursor::from_initial(2);
        assert_eq!(cursor.begin(), Some(2));
        cursor.complete(2, 2, 15);
        assert!(!cursor.has_more());
        assert_eq!(cursor.begin(), None);
    }

    #[test]
    fn test_zero_new_latches_exhausted() {
        let mut cursor = PageCursor::from_initial(5);
        assert_eq!(cursor.begin(), Some(2));
        cursor.complete(2, 5, 0);
        assert!(!cursor.has_more());
        // page did not advance on an empty result
        assert_eq!(cursor.page(), 1);
    }

    #[test]
    fn test_failure_is_retryable() {
        let mut cursor = PageCursor::from_initial(3);
        assert_eq!(cursor.begin(), Some(2));
        cursor.fail();
        assert!(cursor.has_more());
        assert!(!cursor.is_loading());
        // retry claims the same page
        assert_eq!(cursor.begin(), Some(2));
    }
}
