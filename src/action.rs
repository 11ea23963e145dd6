//! Action Mapper: native engine actions to stable wire codes

use serde::{Deserialize, Serialize};

use crate::traits::NativeAction;

/// Kind of change carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Created,
    Deleted,
    Modified,
    Moved,
    Unknown,
}

impl ActionKind {
    /// Wire code: `Created=0, Deleted=1, Modified=2, Moved=3, Unknown=-1`
    pub fn code(self) -> i32 {
        match self {
            ActionKind::Created => 0,
            ActionKind::Deleted => 1,
            ActionKind::Modified => 2,
            ActionKind::Moved => 3,
            ActionKind::Unknown => -1,
        }
    }

    /// Inverse of [`ActionKind::code`]; unrecognized codes are `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ActionKind::Created,
            1 => ActionKind::Deleted,
            2 => ActionKind::Modified,
            3 => ActionKind::Moved,
            _ => ActionKind::Unknown,
        }
    }
}

/// Map a native action onto the wire vocabulary. Total; never fails.
pub fn map(action: NativeAction) -> ActionKind {
    match action {
        NativeAction::CREATE => ActionKind::Created,
        NativeAction::DELETE => ActionKind::Deleted,
        NativeAction::MODIFY => ActionKind::Modified,
        NativeAction::MOVE => ActionKind::Moved,
        _ => ActionKind::Unknown,
    }
}

impl From<NativeAction> for ActionKind {
    fn from(action: NativeAction) -> Self {
        map(action)
    }
}
