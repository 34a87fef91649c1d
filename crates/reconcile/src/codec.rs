use chrono::{DateTime, Utc};
use shared::domain::BOARD_SIZE;
use thiserror::Error;

/// One sensor cell per board cell, row-major.
pub const RAW_SNAPSHOT_LEN: usize = BOARD_SIZE * BOARD_SIZE;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SnapshotFormatError {
    #[error("raw snapshot must be {RAW_SNAPSHOT_LEN} cells, got {actual}")]
    Length { actual: usize },
    #[error("raw snapshot cell {index} is {found:?}, expected '0' or '1'")]
    InvalidCell { index: usize, found: char },
}

/// Presence-only reading of the physical board, oriented like the logical
/// grid: row 0 = rank 6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancySnapshot {
    pub cells: [[bool; BOARD_SIZE]; BOARD_SIZE],
    pub captured_at: DateTime<Utc>,
}

impl OccupancySnapshot {
    pub fn from_grid(cells: [[bool; BOARD_SIZE]; BOARD_SIZE]) -> Self {
        Self {
            cells,
            captured_at: Utc::now(),
        }
    }

    pub fn occupied(&self, rank: usize, file: usize) -> bool {
        self.cells[rank][file]
    }
}

/// Decodes a raw sensor line. The sensor array emits rows rank-ascending
/// from its origin corner, so the parse is flipped vertically to land in
/// the board orientation. This is the single place that mapping lives.
pub fn decode(raw: &str) -> Result<OccupancySnapshot, SnapshotFormatError> {
    let count = raw.chars().count();
    if count != RAW_SNAPSHOT_LEN {
        return Err(SnapshotFormatError::Length { actual: count });
    }

    let mut cells = [[false; BOARD_SIZE]; BOARD_SIZE];
    for (index, found) in raw.chars().enumerate() {
        let occupied = match found {
            '0' => false,
            '1' => true,
            _ => return Err(SnapshotFormatError::InvalidCell { index, found }),
        };
        let sensor_row = index / BOARD_SIZE;
        let file = index % BOARD_SIZE;
        cells[BOARD_SIZE - 1 - sensor_row][file] = occupied;
    }
    Ok(OccupancySnapshot::from_grid(cells))
}

/// Inverse of [`decode`]; produces the raw line a sensor read of `cells`
/// would yield. Used by tests and board-bridge simulators.
pub fn encode(cells: &[[bool; BOARD_SIZE]; BOARD_SIZE]) -> String {
    let mut raw = String::with_capacity(RAW_SNAPSHOT_LEN);
    for sensor_row in 0..BOARD_SIZE {
        for file in 0..BOARD_SIZE {
            let occupied = cells[BOARD_SIZE - 1 - sensor_row][file];
            raw.push(if occupied { '1' } else { '0' });
        }
    }
    raw
}
