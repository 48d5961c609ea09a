//! Stage ranges of overall job progress

/// Slice of the 0-100 progress scale owned by one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRange {
    pub start: u8,
    pub end: u8,
}

impl StageRange {
    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Overall percentage after `done` of `total` steps of this stage
    ///
    /// Monotonic in `done`; an empty stage is complete.
    pub fn at(&self, done: usize, total: usize) -> i64 {
        let span = (self.end - self.start) as usize;
        if total == 0 {
            return self.end as i64;
        }
        let done = done.min(total);
        (self.start as usize + span * done / total) as i64
    }
}

pub const EXTRACTION: StageRange = StageRange::new(0, 10);
/// Text detection in pictures, the tail of extraction
pub const OCR_DETECTION: StageRange = StageRange::new(5, 10);
pub const TRANSLATION: StageRange = StageRange::new(10, 90);
pub const REASSEMBLY: StageRange = StageRange::new(90, 100);
