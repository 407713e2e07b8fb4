use std::fmt;

use serde::{Deserialize, Serialize};

/// A learner's location inside one course.
///
/// Field order matters: the derived `Ord` compares `level_rank` first and
/// falls back to `lesson_rank`, which is exactly the lexicographic order
/// used for progress gating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub level_rank: u32,
    pub lesson_rank: u32,
}

impl Position {
    /// Where a learner with no recorded progress sits.
    pub const ORIGIN: Position = Position {
        level_rank: 0,
        lesson_rank: 0,
    };

    pub const fn new(level_rank: u32, lesson_rank: u32) -> Self {
        Self {
            level_rank,
            lesson_rank,
        }
    }

    /// True when `self` is at the same place as `other` or behind it.
    pub fn is_at_or_before(&self, other: &Position) -> bool {
        self <= other
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.level_rank, self.lesson_rank)
    }
}
