//! Selection index space of the thumbnail grid.
//!
//! Indices `0..sequence_count` are sequences. After them come up to three
//! synthetic slots: previous page (when `page > 1`), next page (when
//! `page < max_page`) and the account slot (always). Positions are
//! recomputed from the current counts on every query.

/// Cells visible at once (3x3 grid).
pub const VISIBLE_CELLS: usize = 9;
/// Cells per grid row.
pub const COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Sequence(usize),
    PrevPage,
    NextPage,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotLayout {
    pub sequence_count: usize,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
    pub account: usize,
}

impl SlotLayout {
    pub fn new(sequence_count: usize, page: u32, max_page: u32) -> Self {
        let mut next_index = sequence_count;
        let prev_page = (page > 1).then(|| {
            let index = next_index;
            next_index += 1;
            index
        });
        let next_page = (page < max_page).then(|| {
            let index = next_index;
            next_index += 1;
            index
        });
        Self {
            sequence_count,
            prev_page,
            next_page,
            account: next_index,
        }
    }

    /// Total selectable cells, synthetic slots included.
    pub fn slot_count(&self) -> usize {
        self.account + 1
    }

    pub fn slot(&self, index: usize) -> Option<Slot> {
        if index < self.sequence_count {
            Some(Slot::Sequence(index))
        } else if Some(index) == self.prev_page {
            Some(Slot::PrevPage)
        } else if Some(index) == self.next_page {
            Some(Slot::NextPage)
        } else if index == self.account {
            Some(Slot::Account)
        } else {
            None
        }
    }
}

/// Moves `index` by `delta`, wrapping modulo `len`.
pub fn wrap_index(index: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (index as isize + delta).rem_euclid(len as isize) as usize
}

/// First visible cell of the grid, moved a row at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub start: usize,
}

impl Viewport {
    /// Scrolls by whole rows until `selected` is visible.
    pub fn ensure_visible(&mut self, selected: usize) {
        while selected < self.start {
            self.start = self.start.saturating_sub(COLUMNS);
        }
        while selected >= self.start + VISIBLE_CELLS {
            self.start += COLUMNS;
        }
    }

    pub fn range(&self, slot_count: usize) -> std::ops::Range<usize> {
        self.start.min(slot_count)..(self.start + VISIBLE_CELLS).min(slot_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_has_next_and_account() {
        let layout = SlotLayout::new(5, 1, 3);
        assert_eq!(layout.prev_page, None);
        assert_eq!(layout.next_page, Some(5));
        assert_eq!(layout.account, 6);
        assert_eq!(layout.slot_count(), 7);
        assert_eq!(layout.slot(4), Some(Slot::Sequence(4)));
        assert_eq!(layout.slot(5), Some(Slot::NextPage));
        assert_eq!(layout.slot(6), Some(Slot::Account));
        assert_eq!(layout.slot(7), None);
    }

    #[test]
    fn test_middle_page_has_both_page_slots() {
        let layout = SlotLayout::new(2, 2, 3);
        assert_eq!(layout.slot(2), Some(Slot::PrevPage));
        assert_eq!(layout.slot(3), Some(Slot::NextPage));
        assert_eq!(layout.slot(4), Some(Slot::Account));
    }

    #[test]
    fn test_last_page_has_prev_only() {
        let layout = SlotLayout::new(3, 3, 3);
        assert_eq!(layout.prev_page, Some(3));
        assert_eq!(layout.next_page, None);
        assert_eq!(layout.account, 4);
    }

    #[test]
    fn test_empty_single_page_is_account_only() {
        let layout = SlotLayout::new(0, 1, 1);
        assert_eq!(layout.slot_count(), 1);
        assert_eq!(layout.slot(0), Some(Slot::Account));
    }

    #[test]
    fn test_wrap_index() {
        assert_eq!(wrap_index(0, -1, 7), 6);
        assert_eq!(wrap_index(6, 1, 7), 0);
        assert_eq!(wrap_index(5, 3, 7), 1);
        assert_eq!(wrap_index(3, 1, 0), 0);
    }

    #[test]
    fn test_viewport_scrolls_by_rows() {
        let mut viewport = Viewport::default();
        viewport.ensure_visible(8);
        assert_eq!(viewport.start, 0);
        viewport.ensure_visible(9);
        assert_eq!(viewport.start, 3);
        viewport.ensure_visible(16);
        assert_eq!(viewport.start, 9);
        viewport.ensure_visible(0);
        assert_eq!(viewport.start, 0);
        assert_eq!(viewport.range(4), 0..4);
    }
}
