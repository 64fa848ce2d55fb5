use crate::gedcom::header::REGEX_TAG;
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::LazyLock;

static LEVEL_ONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^1 ({REGEX_TAG})(?: (.*))?$")).expect("level-1 pattern is a valid regex")
});

/// A level-1 sub-record of a GEDCOM record, such as a NAME or BIRT.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    /// Stable identifier derived from the fact's lines.
    pub id: String,
    pub tag: String,
    pub value: String,
    pub gedcom: String,
    pub pending_addition: bool,
    pub pending_deletion: bool,
}

impl Fact {
    fn from_lines(lines: &[&str]) -> Option<Self> {
        let first = lines.first()?;
        let captures = LEVEL_ONE.captures(first)?;
        let gedcom = lines.join("\n");

        Some(Self {
            id: fact_id(&gedcom),
            tag: captures.get(1)?.as_str().to_string(),
            value: captures
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
            gedcom,
            pending_addition: false,
            pending_deletion: false,
        })
    }

    /// Value of a level-2 attribute, e.g. `DATE` or `PLAC`.
    pub fn attribute(&self, tag: &str) -> Option<&str> {
        let prefix = format!("2 {tag}");
        self.gedcom.lines().skip(1).find_map(|line| {
            let rest = line.strip_prefix(&prefix)?;
            match rest.strip_prefix(' ') {
                Some(value) => Some(value),
                None if rest.is_empty() => Some(""),
                None => None,
            }
        })
    }

    /// Change records are maintained by the server, never by hand.
    pub fn is_editable_tag(&self) -> bool {
        self.tag != "CHAN"
    }
}

pub fn fact_id(gedcom: &str) -> String {
    hex::encode(Sha256::digest(gedcom.as_bytes()))
}

/// Split a record into its level-1 facts.
pub fn parse_facts(gedcom: &str) -> Vec<Fact> {
    let lines: Vec<&str> = gedcom
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .collect();

    let mut facts = Vec::new();
    let mut start = None;

    for (index, line) in lines.iter().enumerate() {
        if line.starts_with("1 ") {
            if let Some(from) = start {
                facts.extend(Fact::from_lines(&lines[from..index]));
            }
            start = Some(index);
        } else if line.starts_with("0 ") {
            start = None;
        }
    }
    if let Some(from) = start {
        facts.extend(Fact::from_lines(&lines[from..]));
    }

    facts
}

/// Facts of a record with its pending edit applied. Facts missing from the
/// pending version are marked for deletion, new ones for addition.
pub fn merge_facts(base: &str, pending: Option<&str>) -> Vec<Fact> {
    let Some(pending) = pending else {
        return parse_facts(base);
    };

    let base_facts = parse_facts(base);
    let pending_facts = parse_facts(pending);

    let base_ids: HashSet<&str> = base_facts.iter().map(|f| f.id.as_str()).collect();
    let pending_ids: HashSet<&str> = pending_facts.iter().map(|f| f.id.as_str()).collect();

    let mut merged: Vec<Fact> = base_facts
        .iter()
        .cloned()
        .map(|mut fact| {
            fact.pending_deletion = !pending_ids.contains(fact.id.as_str());
            fact
        })
        .collect();

    merged.extend(
        pending_facts
            .iter()
            .filter(|fact| !base_ids.contains(fact.id.as_str()))
            .cloned()
            .map(|mut fact| {
                fact.pending_addition = true;
                fact
            }),
    );

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDI: &str = "0 @I1@ INDI\n1 NAME John /Smith/\n2 GIVN John\n1 BIRT\n2 DATE 1 JAN 1900\n2 PLAC London\n1 CHAN\n2 DATE 1 JAN 2020";

    #[test]
    fn test_parse_facts() {
        let facts = parse_facts(INDI);
        let tags: Vec<&str> = facts.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["NAME", "BIRT", "CHAN"]);

        assert_eq!(facts[0].value, "John /Smith/");
        assert_eq!(facts[0].gedcom, "1 NAME John /Smith/\n2 GIVN John");
        assert_eq!(facts[1].value, "");
        assert_eq!(facts[1].attribute("DATE"), Some("1 JAN 1900"));
        assert_eq!(facts[1].attribute("PLAC"), Some("London"));
        assert_eq!(facts[1].attribute("NOTE"), None);
        assert!(!facts[2].is_editable_tag());
    }

    #[test]
    fn test_fact_ids_are_stable() {
        let first = parse_facts(INDI);
        let second = parse_facts(&INDI.replace('\n', "\r\n"));
        assert_eq!(first[0].id, second[0].id);
        assert_ne!(first[0].id, first[1].id);
    }

    #[test]
    fn test_merge_facts_flags_changes() {
        let base = "0 @I1@ INDI\n1 NAME Old\n1 SEX M";
        let pending = "0 @I1@ INDI\n1 NAME New\n1 SEX M";

        let merged = merge_facts(base, Some(pending));
        assert_eq!(merged.len(), 3);

        let old_name = &merged[0];
        assert_eq!(old_name.value, "Old");
        assert!(old_name.pending_deletion);

        let sex = &merged[1];
        assert!(!sex.pending_deletion && !sex.pending_addition);

        let new_name = &merged[2];
        assert_eq!(new_name.value, "New");
        assert!(new_name.pending_addition);
    }

    #[test]
    fn test_merge_facts_record_deletion() {
        let merged = merge_facts("0 @I1@ INDI\n1 NAME Gone", Some(""));
        assert_eq!(merged.len(), 1);
        assert!(merged[0].pending_deletion);
    }
}
