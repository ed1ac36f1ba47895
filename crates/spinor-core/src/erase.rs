//! Erase planning
//!
//! Picks, for a position inside an erase request, the largest supported
//! erase that is aligned to the position and fits in what is left. The
//! sequencer re-plans after every erase, so one request can mix
//! granularities (4 KiB head, 64 KiB middle, 4 KiB tail).

use crate::sfdp::EraseType;

/// Sector size assumed for the page layout when no erase type is known
pub const DEFAULT_SECTOR_SIZE: u32 = 4096;

/// No present erase type is aligned to `offset` and fits in `remaining`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoErasePossible {
    /// Position the planner was asked about
    pub offset: u32,
    /// Bytes left in the request at that position
    pub remaining: u32,
}

/// Select the erase to issue at `offset` with `remaining` bytes to go
///
/// Among the present types with `offset % size == 0` and
/// `size <= remaining`, returns the one with the largest size.
pub fn plan_erase(
    erase_types: &[EraseType],
    offset: u32,
    remaining: u32,
) -> Result<EraseType, NoErasePossible> {
    erase_types
        .iter()
        .filter(|et| et.is_present())
        .filter(|et| offset % et.size() == 0 && et.size() <= remaining)
        .max_by_key(|et| et.size())
        .copied()
        .ok_or(NoErasePossible { offset, remaining })
}

/// Smallest present erase type
pub fn smallest_erase(erase_types: &[EraseType]) -> Option<EraseType> {
    erase_types
        .iter()
        .filter(|et| et.is_present())
        .min_by_key(|et| et.size())
        .copied()
}

/// Walk a whole request, yielding `(offset, erase)` steps
///
/// Stops after the first step that cannot be planned.
pub fn plan_region(erase_types: &[EraseType], offset: u32, len: u32) -> EraseSteps<'_> {
    EraseSteps {
        erase_types,
        offset,
        remaining: len,
        failed: false,
    }
}

/// Iterator returned by [`plan_region`]
#[derive(Debug, Clone)]
pub struct EraseSteps<'a> {
    erase_types: &'a [EraseType],
    offset: u32,
    remaining: u32,
    failed: bool,
}

impl Iterator for EraseSteps<'_> {
    type Item = Result<(u32, EraseType), NoErasePossible>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.failed {
            return None;
        }
        match plan_erase(self.erase_types, self.offset, self.remaining) {
            Ok(et) => {
                let at = self.offset;
                self.offset = self.offset.wrapping_add(et.size());
                self.remaining -= et.size();
                Some(Ok((at, et)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Uniform page layout exposed to flash page layout consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    /// Number of layout pages
    pub pages_count: u32,
    /// Size of each layout page in bytes
    pub pages_size: u32,
}

/// Derive the layout page from the program page and the erase types
///
/// The program page size is used when it is a multiple of the smallest
/// erase size, otherwise the smallest erase size is.
pub fn page_layout(erase_types: &[EraseType], page_size: u32, flash_size: u32) -> PageLayout {
    let erase_size = smallest_erase(erase_types).map_or(DEFAULT_SECTOR_SIZE, |et| et.size());

    let mut pages_size = page_size;
    if pages_size == 0 || pages_size % erase_size != 0 {
        log::debug!(
            "layout page {} not compatible with erase size {}, using erase size",
            pages_size,
            erase_size
        );
        pages_size = erase_size;
    }
    if flash_size % pages_size != 0 {
        log::debug!(
            "layout page {} wastes space with device size {}",
            pages_size,
            flash_size
        );
    }

    let layout = PageLayout {
        pages_count: flash_size / pages_size,
        pages_size,
    };
    log::debug!("layout {} x {} By pages", layout.pages_count, layout.pages_size);
    layout
}

#[cfg(test)]
mod tests {
    use super::*;

    const K4: EraseType = EraseType::new(12, 0x20);
    const K32: EraseType = EraseType::new(15, 0x52);
    const K64: EraseType = EraseType::new(16, 0xD8);

    fn table() -> [EraseType; 4] {
        [K4, K32, K64, EraseType::ABSENT]
    }

    #[test]
    fn largest_fitting_aligned_type_wins() {
        assert_eq!(plan_erase(&table(), 0, 65536), Ok(K64));
        assert_eq!(plan_erase(&table(), 0, 65535), Ok(K32));
        assert_eq!(plan_erase(&table(), 0x8000, 0x20000), Ok(K32));
        assert_eq!(plan_erase(&table(), 0x1000, 0x20000), Ok(K4));
    }

    #[test]
    fn absent_and_unaligned_fail() {
        assert_eq!(
            plan_erase(&table(), 0x800, 0x1000),
            Err(NoErasePossible {
                offset: 0x800,
                remaining: 0x1000
            })
        );
        assert_eq!(
            plan_erase(&[EraseType::ABSENT; 4], 0, 0x10000),
            Err(NoErasePossible {
                offset: 0,
                remaining: 0x10000
            })
        );
        assert!(plan_erase(&table(), 0, 0x800).is_err());
    }

    #[test]
    fn steps_cover_the_region_exactly() {
        for &(start, len) in &[
            (0u32, 0x10000u32),
            (0x1000, 0x1F000),
            (0x3000, 0x2D000),
            (0xF000, 0x12000),
            (0x7000, 0x1000),
        ] {
            let mut next = start;
            for step in plan_region(&table(), start, len) {
                let (at, et) = step.unwrap();
                assert_eq!(at, next);
                assert_eq!(at % et.size(), 0, "unaligned {:?} at 0x{:x}", et, at);
                assert!(et.size() <= start + len - at);
                next = at + et.size();
            }
            assert_eq!(next, start + len);
        }

        // Every 4 KiB aligned region of a 256 KiB window
        const WINDOW: u32 = 0x40000;
        for start in (0..WINDOW).step_by(0x1000) {
            for end in (start + 0x1000..=WINDOW).step_by(0x1000) {
                let mut next = start;
                for step in plan_region(&table(), start, end - start) {
                    let (at, et) = step.unwrap();
                    assert_eq!(at, next, "region 0x{:x}..0x{:x}", start, end);
                    assert_eq!(at % et.size(), 0, "unaligned {:?} at 0x{:x}", et, at);
                    assert!(at + et.size() <= end, "{:?} at 0x{:x} overruns 0x{:x}", et, at, end);
                    // No larger type was usable at this step
                    for other in table().iter().filter(|o| o.is_present() && o.size() > et.size()) {
                        assert!(at % other.size() != 0 || at + other.size() > end);
                    }
                    next = at + et.size();
                }
                assert_eq!(next, end, "region 0x{:x}..0x{:x}", start, end);
            }
        }
    }

    #[test]
    fn mixed_granularities() {
        let steps: std::vec::Vec<u32> = plan_region(&table(), 0xF000, 0x12000)
            .map(|s| s.unwrap().1.size())
            .collect();
        assert_eq!(steps, [0x1000, 0x10000, 0x1000]);
    }

    #[test]
    fn region_stops_at_first_failure() {
        let mut steps = plan_region(&[K64, EraseType::ABSENT, EraseType::ABSENT, EraseType::ABSENT], 0, 0x18000);
        assert_eq!(steps.next(), Some(Ok((0, K64))));
        assert!(matches!(steps.next(), Some(Err(_))));
        assert_eq!(steps.next(), None);
    }

    #[test]
    fn smallest_skips_absent_slots() {
        let types = [EraseType::ABSENT, K64, EraseType::new(40, 0xAA), K4];
        assert_eq!(smallest_erase(&types), Some(K4));
        assert_eq!(smallest_erase(&[EraseType::ABSENT; 4]), None);
    }

    #[test]
    fn layout_page_follows_erase_size() {
        let layout = page_layout(&table(), 256, 16 * 1024 * 1024);
        assert_eq!(
            layout,
            PageLayout {
                pages_count: 4096,
                pages_size: 4096
            }
        );
        let layout = page_layout(&[EraseType::ABSENT; 4], 256, 1024 * 1024);
        assert_eq!(layout.pages_size, DEFAULT_SECTOR_SIZE);
        let layout = page_layout(&[EraseType::new(8, 0x81), K4, K64, EraseType::ABSENT], 512, 1 << 20);
        assert_eq!(layout.pages_size, 512);
    }
}
