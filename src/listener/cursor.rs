use serde::Serialize;

/// Inclusive block interval scanned in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanRange {
    pub from: u64,
    pub to: u64,
}

impl ScanRange {
    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}

/// Tracks the first block not yet scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockCursor {
    next_from_block: u64,
}

impl BlockCursor {
    pub fn new(next_from_block: u64) -> Self {
        Self { next_from_block }
    }

    /// Start `offset` blocks behind the head, clamped at genesis
    pub fn initial(latest_block: u64, offset: u64) -> Self {
        Self::new(latest_block.saturating_sub(offset))
    }

    pub fn next_from_block(&self) -> u64 {
        self.next_from_block
    }

    /// `None` when the chain has not produced a block past the cursor yet
    pub fn next_range(&self, current_height: u64) -> Option<ScanRange> {
        if self.next_from_block > current_height {
            return None;
        }
        Some(ScanRange {
            from: self.next_from_block,
            to: current_height,
        })
    }

    /// Cursor value after `range` has been fully processed
    pub fn after(&self, range: ScanRange) -> Self {
        Self::new(self.next_from_block.max(range.to.saturating_add(1)))
    }

    pub fn advance(&mut self, range: ScanRange) {
        *self = self.after(range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_cursor() {
        assert_eq!(BlockCursor::initial(1_000, 100).next_from_block(), 900);
        assert_eq!(BlockCursor::initial(50, 100).next_from_block(), 0);
        assert_eq!(BlockCursor::initial(100, 100).next_from_block(), 0);
    }

    #[test]
    fn test_idle_when_cursor_past_head() {
        let cursor = BlockCursor::new(1_001);
        assert_eq!(cursor.next_range(1_000), None);
    }

    #[test]
    fn test_range_is_inclusive_to_head() {
        let cursor = BlockCursor::new(900);
        let range = cursor.next_range(1_000).unwrap();

        assert_eq!(range, ScanRange { from: 900, to: 1_000 });
        assert_eq!(range.block_count(), 101);

        let single = BlockCursor::new(1_000).next_range(1_000).unwrap();
        assert_eq!(single.block_count(), 1);
    }

    #[test]
    fn test_consecutive_ranges_are_contiguous() {
        let mut cursor = BlockCursor::initial(1_000, 100);
        let mut previous: Option<ScanRange> = None;

        for head in [1_000, 1_000, 1_004, 1_010, 1_010, 1_011] {
            if let Some(range) = cursor.next_range(head) {
                if let Some(prev) = previous {
                    assert_eq!(range.from, prev.to + 1);
                }
                cursor.advance(range);
                assert_eq!(cursor.next_from_block(), head + 1);
                previous = Some(range);
            }
        }

        assert_eq!(cursor.next_from_block(), 1_012);
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let mut cursor = BlockCursor::new(500);
        cursor.advance(ScanRange { from: 10, to: 20 });
        assert_eq!(cursor.next_from_block(), 500);
    }
}
