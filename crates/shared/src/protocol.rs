use serde::{Deserialize, Serialize};

use crate::domain::{Color, MoveRecord};

/// Last committed move as shown to viewers, squares in `"<file><rank>"`
/// notation and pieces in letter encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    pub from: String,
    pub to: String,
    pub piece: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured: Option<String>,
}

impl From<MoveRecord> for LastMove {
    fn from(record: MoveRecord) -> Self {
        Self {
            from: record.from.notation(),
            to: record.to.notation(),
            piece: record.piece.letter().to_string(),
            captured: record.captured.map(|piece| piece.letter().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Sent on every successful commit and to every newly attached viewer.
    /// `board` rows run from rank 6 down to rank 1; cells hold piece letters
    /// (uppercase white, lowercase black) or `"."` when empty.
    BoardUpdated {
        board: Vec<Vec<String>>,
        turn: Color,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_move: Option<LastMove>,
    },
    MoveRejected {
        message: String,
    },
    /// The reconciliation loop gave up waiting for a physical move; the turn
    /// is unchanged and needs operator intervention.
    PhysicalMoveTimedOut {
        color: Color,
    },
}
