//! # Page Window
//!
//! Maps `(total, page_size, page_num)` onto a descending window of the
//! per-source sequence space `[0, total)`. Page 1 holds the most recent
//! blocks.
//!
//! The window end is derived from the *unclamped* start
//! (`total - page_num * page_size + page_size`), so a page that lies entirely
//! past the oldest block comes back empty instead of repeating page `n`.

/// A resolved page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// First sequence number in the window (inclusive).
    pub start: u64,
    /// One past the last sequence number in the window.
    pub end: u64,
    pub page_size: u64,
    pub page_num: u64,
    pub has_more: bool,
}

impl PageWindow {
    /// Resolve a window over `total` contiguous blocks.
    ///
    /// `page_size` and `page_num` must already be normalized to `>= 1`.
    pub fn compute(total: u64, page_size: u64, page_num: u64) -> Self {
        let start = total.saturating_sub(page_num.saturating_mul(page_size));
        let end = total
            .saturating_sub(page_num.saturating_sub(1).saturating_mul(page_size))
            .max(start);

        Self {
            start,
            end,
            page_size,
            page_num,
            has_more: start > 0,
        }
    }

    /// Sequence numbers in the window, most recent first.
    pub fn descending(&self) -> impl Iterator<Item = u64> {
        (self.start..self.end).rev()
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Apply defaults for zero values. Any other size is honoured as given.
pub fn normalize_request(page_size: u64, page_num: u64, default_page_size: u64) -> (u64, u64) {
    let size = if page_size == 0 {
        default_page_size.max(1)
    } else {
        page_size
    };
    (size, page_num.max(1))
}
