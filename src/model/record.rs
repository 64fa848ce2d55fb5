use crate::gedcom::{merge_facts, parse_facts, parse_header, Fact};
use crate::model::{Tree, UserContext, Xref};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};

/// The record types with a dedicated factory, plus the catch-all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Family,
    Individual,
    Media,
    Note,
    Repository,
    Source,
    Submitter,
    Generic,
}

impl RecordKind {
    /// Typed kinds in the order a generic lookup tries them.
    pub const TYPED: [RecordKind; 7] = [
        RecordKind::Family,
        RecordKind::Individual,
        RecordKind::Media,
        RecordKind::Note,
        RecordKind::Repository,
        RecordKind::Source,
        RecordKind::Submitter,
    ];

    /// Kinds kept in the `other` table but served by their own factory.
    pub const OTHER_TABLE_TYPED: [RecordKind; 3] =
        [RecordKind::Note, RecordKind::Repository, RecordKind::Submitter];

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "FAM" => RecordKind::Family,
            "INDI" => RecordKind::Individual,
            "OBJE" => RecordKind::Media,
            "NOTE" => RecordKind::Note,
            "REPO" => RecordKind::Repository,
            "SOUR" => RecordKind::Source,
            "SUBM" => RecordKind::Submitter,
            _ => RecordKind::Generic,
        }
    }

    /// The level-0 tag, `None` for generic records whose tag varies.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            RecordKind::Family => Some("FAM"),
            RecordKind::Individual => Some("INDI"),
            RecordKind::Media => Some("OBJE"),
            RecordKind::Note => Some("NOTE"),
            RecordKind::Repository => Some("REPO"),
            RecordKind::Source => Some("SOUR"),
            RecordKind::Submitter => Some("SUBM"),
            RecordKind::Generic => None,
        }
    }

    pub fn route_segment(&self) -> &'static str {
        match self {
            RecordKind::Family => "family",
            RecordKind::Individual => "individual",
            RecordKind::Media => "media",
            RecordKind::Note => "note",
            RecordKind::Repository => "repository",
            RecordKind::Source => "source",
            RecordKind::Submitter => "submitter",
            RecordKind::Generic => "record",
        }
    }

    pub fn from_route_segment(segment: &str) -> Option<Self> {
        RecordKind::TYPED
            .into_iter()
            .chain(std::iter::once(RecordKind::Generic))
            .find(|kind| kind.route_segment() == segment)
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordKind::Family => "Family",
            RecordKind::Individual => "Individual",
            RecordKind::Media => "Media object",
            RecordKind::Note => "Note",
            RecordKind::Repository => "Repository",
            RecordKind::Source => "Source",
            RecordKind::Submitter => "Submitter",
            RecordKind::Generic => "Record",
        }
    }
}

/// A resolved genealogical record: committed GEDCOM plus any pending edit.
#[derive(Debug)]
pub struct GedcomRecord {
    kind: RecordKind,
    xref: Xref,
    tree: Arc<Tree>,
    gedcom: String,
    /// `None` when there is no pending edit, `Some("")` for a pending deletion.
    pending: Option<String>,
    facts: OnceLock<Vec<Fact>>,
}

impl GedcomRecord {
    pub fn new(
        kind: RecordKind,
        xref: impl Into<Xref>,
        gedcom: impl Into<String>,
        pending: Option<String>,
        tree: Arc<Tree>,
    ) -> Self {
        Self {
            kind,
            xref: xref.into(),
            tree,
            gedcom: gedcom.into(),
            pending,
            facts: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn xref(&self) -> &str {
        &self.xref
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    /// Committed GEDCOM, empty for records that only exist as pending changes.
    pub fn gedcom(&self) -> &str {
        &self.gedcom
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    /// What the record looks like once its pending edit is accepted; a
    /// pending deletion still shows the committed version.
    pub fn effective_gedcom(&self) -> &str {
        match self.pending.as_deref() {
            Some(pending) if !pending.is_empty() => pending,
            _ => &self.gedcom,
        }
    }

    pub fn has_pending_change(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_pending_deletion(&self) -> bool {
        self.pending.as_deref() == Some("") && !self.gedcom.is_empty()
    }

    pub fn is_pending_addition(&self) -> bool {
        self.gedcom.is_empty() && self.pending.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Level-0 tag. Typed records report their kind's tag; generic records
    /// read it from their GEDCOM.
    pub fn tag(&self) -> &str {
        match self.kind.tag() {
            Some(tag) => tag,
            None => parse_header(self.effective_gedcom())
                .map(|header| header.tag)
                .unwrap_or(""),
        }
    }

    pub fn facts(&self) -> &[Fact] {
        self.facts
            .get_or_init(|| merge_facts(&self.gedcom, self.pending.as_deref()))
    }

    pub fn fact(&self, id: &str) -> Option<&Fact> {
        self.facts().iter().find(|fact| fact.id == id)
    }

    pub fn full_name(&self) -> String {
        record_name(self.kind, &self.xref, self.effective_gedcom())
    }

    /// Name to show to `user`, which is a placeholder for hidden records.
    pub fn display_name(&self, user: &UserContext) -> String {
        if self.can_show(user) {
            self.full_name()
        } else {
            record_name(self.kind, &self.xref, &self.private_gedcom())
        }
    }

    pub fn url(&self) -> String {
        format!(
            "/tree/{}/{}/{}",
            self.tree.name,
            self.kind.route_segment(),
            self.xref
        )
    }

    /// Lower-cased `RESN` value, if the record carries one.
    pub fn restriction(&self) -> Option<String> {
        parse_facts(self.effective_gedcom())
            .into_iter()
            .find(|fact| fact.tag == "RESN")
            .map(|fact| fact.value.trim().to_lowercase())
    }

    pub fn can_show(&self, user: &UserContext) -> bool {
        match self.restriction().as_deref() {
            Some("confidential") | Some("privacy") => user.is_manager(),
            _ => true,
        }
    }

    pub fn can_edit(&self, user: &UserContext) -> bool {
        if !user.can_edit() || !self.can_show(user) {
            return false;
        }
        self.restriction().as_deref() != Some("locked") || user.is_manager()
    }

    /// Facts marked for deletion and server-maintained facts are read-only.
    pub fn can_edit_fact(&self, fact: &Fact, user: &UserContext) -> bool {
        self.can_edit(user) && fact.is_editable_tag() && !fact.pending_deletion
    }

    /// Stand-in GEDCOM shown in place of a record the user may not see.
    pub fn private_gedcom(&self) -> String {
        let xref = &self.xref;
        match self.kind {
            RecordKind::Individual => format!("0 @{xref}@ INDI\n1 NAME Private //"),
            RecordKind::Family => format!("0 @{xref}@ FAM"),
            RecordKind::Media => format!("0 @{xref}@ OBJE\n1 TITL Private"),
            RecordKind::Note => format!("0 @{xref}@ NOTE Private"),
            RecordKind::Repository => format!("0 @{xref}@ REPO\n1 NAME Private"),
            RecordKind::Source => format!("0 @{xref}@ SOUR\n1 TITL Private"),
            RecordKind::Submitter => format!("0 @{xref}@ SUBM\n1 NAME Private"),
            RecordKind::Generic => format!("0 @{xref}@ {}", self.tag()),
        }
    }
}

fn record_name(kind: RecordKind, xref: &str, gedcom: &str) -> String {
    let name = match kind {
        RecordKind::Note => note_text(gedcom),
        RecordKind::Source | RecordKind::Media => first_value(gedcom, "TITL"),
        RecordKind::Family => None,
        _ => first_value(gedcom, "NAME").map(|name| clean_name(&name)),
    };

    name.filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{} {}", kind.label(), xref))
}

fn first_value(gedcom: &str, tag: &str) -> Option<String> {
    let facts = parse_facts(gedcom);
    facts
        .iter()
        .find(|fact| fact.tag == tag)
        .map(|fact| fact.value.clone())
        .or_else(|| {
            // Media titles usually sit under FILE.
            facts
                .iter()
                .find_map(|fact| fact.attribute(tag))
                .map(str::to_string)
        })
}

fn note_text(gedcom: &str) -> Option<String> {
    let first = gedcom.lines().next()?.trim_end_matches('\r');
    let (_, text) = first.split_once(" NOTE ")?;
    Some(text.trim().to_string())
}

/// GEDCOM surnames are wrapped in slashes: `John /Smith/`.
fn clean_name(name: &str) -> String {
    name.replace('/', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
