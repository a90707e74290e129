//! Byte-count progress reported while a body moves over the wire.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub direction: Direction,
    pub loaded: u64,
    /// Absent when the length is unknown.
    pub total: Option<u64>,
    pub percent: Option<f64>,
}

impl ProgressEvent {
    pub fn new(direction: Direction, loaded: u64, total: Option<u64>) -> Self {
        let percent = total
            .filter(|total| *total > 0)
            .map(|total| loaded as f64 / total as f64 * 100.0);
        Self {
            direction,
            loaded,
            total,
            percent,
        }
    }
}
