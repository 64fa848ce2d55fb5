use serde::{Deserialize, Serialize};

/// Cross-reference identifier of a record, unique within one tree.
pub type Xref = String;

/// Primary key of a tree (the `gedcom_id` column).
pub type TreeId = i64;

/// One row of a bulk record query: the xref and its committed GEDCOM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordRow {
    pub xref: Xref,
    pub gedcom: String,
}

impl RecordRow {
    pub fn new(xref: impl Into<Xref>, gedcom: impl Into<String>) -> Self {
        Self {
            xref: xref.into(),
            gedcom: gedcom.into(),
        }
    }
}
