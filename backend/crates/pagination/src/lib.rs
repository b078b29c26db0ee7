//! Time-cursor pagination primitives shared by timeline endpoints.
//!
//! Pages are keyed by the `created_at` of the last returned row rather than an
//! offset, so deep pages cost the same as the first one. The cursor is the
//! timestamp itself; a page is "full" when it holds exactly the requested
//! number of rows, and only full pages advertise a next cursor.
//!
//! Time-cursor paging is not stable under concurrent inserts: a row created
//! between two page fetches can shift the window. Callers must treat pages as
//! a best-effort snapshot, not a consistent scan.

use chrono::{DateTime, Utc};

/// Page size applied when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Hard ceiling on the page size a client may request.
pub const MAX_PAGE_SIZE: usize = 50;

/// Clamp a client-requested page size into `1..=MAX_PAGE_SIZE`.
///
/// `None` and `Some(0)` both fall back to [`DEFAULT_PAGE_SIZE`].
///
/// # Examples
/// ```
/// use pagination::{clamp_page_size, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
///
/// assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
/// assert_eq!(clamp_page_size(Some(0)), DEFAULT_PAGE_SIZE);
/// assert_eq!(clamp_page_size(Some(7)), 7);
/// assert_eq!(clamp_page_size(Some(9_999)), MAX_PAGE_SIZE);
/// ```
#[must_use]
pub fn clamp_page_size(requested: Option<usize>) -> usize {
    match requested {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(size) => size.min(MAX_PAGE_SIZE),
    }
}

/// Rows that can act as a pagination cursor.
pub trait TimeCursored {
    /// Timestamp used as the sort key and the next-page cursor.
    fn cursor_at(&self) -> DateTime<Utc>;
}

/// One page of newest-first rows plus the cursor for the following page.
///
/// `next_cursor` is `Some` only when the page is full; a short page signals
/// the end of the data and carries no cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorPage<T> {
    /// Rows in newest-first order, at most the requested page size.
    pub items: Vec<T>,
    /// Cursor for the next page: the `created_at` of the last row, when full.
    pub next_cursor: Option<DateTime<Utc>>,
    /// Whether a further page may exist.
    pub has_more: bool,
}

impl<T> CursorPage<T> {
    /// Build a page from newest-first rows already truncated to `page_size`.
    ///
    /// # Examples
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use pagination::{CursorPage, TimeCursored};
    ///
    /// struct Row(chrono::DateTime<Utc>);
    /// impl TimeCursored for Row {
    ///     fn cursor_at(&self) -> chrono::DateTime<Utc> {
    ///         self.0
    ///     }
    /// }
    ///
    /// let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single().expect("valid");
    /// let page = CursorPage::from_newest_first(vec![Row(ts)], 1);
    /// assert_eq!(page.next_cursor, Some(ts));
    /// assert!(page.has_more);
    /// ```
    #[must_use]
    pub fn from_newest_first(items: Vec<T>, page_size: usize) -> Self
    where
        T: TimeCursored,
    {
        let has_more = page_size > 0 && items.len() >= page_size;
        let next_cursor = if has_more {
            items.last().map(TimeCursored::cursor_at)
        } else {
            None
        };
        Self {
            items,
            next_cursor,
            has_more,
        }
    }

    /// An empty terminal page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }

    /// Convert the row type while keeping cursor and page state intact.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> CursorPage<U>
    where
        F: FnMut(T) -> U,
    {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            has_more: self.has_more,
        }
    }
}
