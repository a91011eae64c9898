//! Shared verification result shape.
//!
//! Upload/download verification and archive member verification report the
//! same structure: either everything expected was observed, or the missing
//! paths are listed.

use serde::{Deserialize, Serialize};

/// Outcome of comparing an expected path list against what was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    pub ok: bool,
    pub missing: Vec<String>,
}

impl Verification {
    /// Build a result from the paths that were not observed. `ok` is true
    /// exactly when `missing` is empty.
    pub fn from_missing(missing: Vec<String>) -> Self {
        Self {
            ok: missing.is_empty(),
            missing,
        }
    }

    pub fn ok() -> Self {
        Self {
            ok: true,
            missing: Vec::new(),
        }
    }
}
