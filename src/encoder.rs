//! Event Encoder: builds the wire message for one filesystem change
//!
//! A [`WireMessage`] serializes as a 3-element array
//! `[action_code, full_path, old_full_path | null]`. Field order and arity are
//! the contract with the consumer on the other side of the port.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{self, ActionKind};
use crate::debug_log;
use crate::traits::RawEvent;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Out of memory while copying event path")]
    OutOfMemory,
    #[error("Missing callback parameter: {0}")]
    MissingParameter(&'static str),
}

/// The only payload shape that crosses the port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, String, Option<String>)", into = "(i32, String, Option<String>)")]
pub struct WireMessage {
    pub action_code: i32,
    pub path: String,
    pub old_path: Option<String>,
}

impl WireMessage {
    pub fn action(&self) -> ActionKind {
        ActionKind::from_code(self.action_code)
    }

    /// Compact JSON array form, e.g. `[0,"/tmp/w/a.txt",null]`
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<(i32, String, Option<String>)> for WireMessage {
    fn from((action_code, path, old_path): (i32, String, Option<String>)) -> Self {
        Self {
            action_code,
            path,
            old_path,
        }
    }
}

impl From<WireMessage> for (i32, String, Option<String>) {
    fn from(message: WireMessage) -> Self {
        (message.action_code, message.path, message.old_path)
    }
}

/// One resolved change, alive only for the duration of a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub action: ActionKind,
    pub full_path: String,
    pub old_full_path: Option<String>,
}

impl ChangeEvent {
    /// Resolve absolute paths from a raw engine event.
    ///
    /// Paths are the exact concatenation `root_dir + path`; nothing is
    /// normalized or truncated.
    pub fn resolve(raw: &RawEvent<'_>) -> Result<Self, EncodeError> {
        let root = raw.root_dir.ok_or(EncodeError::MissingParameter("root_dir"))?;
        let path = raw.path.ok_or(EncodeError::MissingParameter("path"))?;

        let full_path = concat(root, path)?;
        let old_full_path = match raw.old_path {
            Some(old) => Some(concat(root, old)?),
            None => None,
        };

        Ok(Self {
            action: action::map(raw.action),
            full_path,
            old_full_path,
        })
    }

    pub fn encode(&self) -> Result<WireMessage, EncodeError> {
        encode(self.action, &self.full_path, self.old_full_path.as_deref())
    }
}

/// Build an independently owned message from borrowed path strings.
///
/// `old_full_path` survives only for [`ActionKind::Moved`]; for every other
/// kind it is dropped so the wire carries `null`.
pub fn encode(
    action: ActionKind,
    full_path: &str,
    old_full_path: Option<&str>,
) -> Result<WireMessage, EncodeError> {
    let old_full_path = match (action, old_full_path) {
        (ActionKind::Moved, old) => old,
        (_, Some(old)) => {
            debug_log!(
                action = ?action,
                old_path = %old,
                "Dropping old path supplied for non-move event"
            );
            None
        }
        (_, None) => None,
    };

    let path = duplicate(full_path)?;
    let old_path = match old_full_path {
        Some(old) => Some(duplicate(old)?),
        None => None,
    };

    Ok(WireMessage {
        action_code: action.code(),
        path,
        old_path,
    })
}

// Sole source of `OutOfMemory`: every owned copy is reserved here first.
fn reserve(buf: &mut String, additional: usize) -> Result<(), EncodeError> {
    buf.try_reserve_exact(additional).map_err(|_| EncodeError::OutOfMemory)
}

fn duplicate(s: &str) -> Result<String, EncodeError> {
    let mut owned = String::new();
    reserve(&mut owned, s.len())?;
    owned.push_str(s);
    Ok(owned)
}

fn concat(root: &str, relative: &str) -> Result<String, EncodeError> {
    let mut joined = String::new();
    reserve(&mut joined, root.len().saturating_add(relative.len()))?;
    joined.push_str(root);
    joined.push_str(relative);
    Ok(joined)
}
