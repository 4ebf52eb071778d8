use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of files ('a'..='h') addressable by the two-character notation.
pub const GRID_FILES: u8 = 8;
/// Number of ranks ('1'..='8') addressable by the two-character notation.
pub const GRID_RANKS: u8 = 8;

/// Errors produced when parsing a board address.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("board address {text:?} is not two characters")]
    Length { text: String },
    #[error("file {file:?} outside 'a'..='h'")]
    FileRange { file: char },
    #[error("rank {rank:?} outside '1'..='8'")]
    RankRange { rank: char },
}

/// Board-local cell identifier: a (file, rank) pair, each in `0..8`.
///
/// Parsed from the usual two-character notation: `"a1"` is (0, 0),
/// `"h8"` is (7, 7).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BoardAddress {
    pub file: u8,
    pub rank: u8,
}

impl BoardAddress {
    /// Build an address from zero-based indices; `None` if either is out of
    /// the 0..8 range.
    pub fn new(file: u8, rank: u8) -> Option<Self> {
        (file < GRID_FILES && rank < GRID_RANKS).then_some(Self { file, rank })
    }

    /// Parse two-character notation such as `"e4"`.
    pub fn parse(text: &str) -> Result<Self, AddressError> {
        let mut chars = text.chars();
        let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(AddressError::Length {
                text: text.to_owned(),
            });
        };
        if !('a'..='h').contains(&file) {
            return Err(AddressError::FileRange { file });
        }
        if !('1'..='8').contains(&rank) {
            return Err(AddressError::RankRange { rank });
        }
        Ok(Self {
            file: file as u8 - b'a',
            rank: rank as u8 - b'1',
        })
    }

    /// Board-local offset of this cell's center from the board center, for a
    /// `grid`-cell board of total extent `board_size`.
    ///
    /// The offsets of `"a1"` and `"h8"` are symmetric about zero on the
    /// default 8×8 grid.
    pub fn cell_offset(self, grid: u32, board_size: f32) -> (f32, f32) {
        let cell = board_size / grid as f32;
        let half = board_size * 0.5;
        let dx = (self.file as f32 + 0.5) * cell - half;
        let dy = (self.rank as f32 + 0.5) * cell - half;
        (dx, dy)
    }
}

impl FromStr for BoardAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for BoardAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file) as char,
            (b'1' + self.rank) as char
        )
    }
}
