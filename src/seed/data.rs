use crate::model::{NewPendingChange, Tree, TreeId, PREF_SHOW_GEDCOM_RECORD};
use crate::store::traits::{PendingChangeStore, RecordStore, Store, TreeStore};
use anyhow::{Context, Result};
use log::info;

pub const DEMO_TREE_ID: TreeId = 1;
pub const DEMO_TREE_NAME: &str = "demo";

/// Committed records of the demo tree, one of every kind.
const DEMO_RECORDS: &[(&str, &str)] = &[
    (
        "I1",
        "0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE 12 MAR 1850\n2 PLAC Leeds, Yorkshire, England\n1 FAMS @F1@\n1 SOUR @S1@",
    ),
    (
        "I2",
        "0 @I2@ INDI\n1 NAME Mary /Jones/\n1 SEX F\n1 BIRT\n2 DATE 1852\n1 FAMS @F1@",
    ),
    (
        "I3",
        "0 @I3@ INDI\n1 NAME William /Smith/\n1 SEX M\n1 BIRT\n2 DATE 1875\n1 FAMC @F1@\n1 RESN privacy",
    ),
    (
        "F1",
        "0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n1 MARR\n2 DATE 1874\n2 PLAC Leeds",
    ),
    (
        "S1",
        "0 @S1@ SOUR\n1 TITL 1881 England Census\n1 REPO @R1@",
    ),
    ("R1", "0 @R1@ REPO\n1 NAME West Yorkshire Archive Service"),
    ("N1", "0 @N1@ NOTE The Smiths moved to Leeds around 1870."),
    (
        "M1",
        "0 @M1@ OBJE\n1 FILE smith-family.jpg\n2 FORM jpg\n2 TITL The Smith family",
    ),
    ("U1", "0 @U1@ SUBM\n1 NAME Demo Submitter"),
    ("L1", "0 @L1@ _LOC\n1 NAME Leeds"),
];

pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    if store.get_tree_by_name(DEMO_TREE_NAME).await?.is_some() {
        info!("Demo tree already present, skipping seed data");
        return Ok(());
    }

    let tree = Tree::new(DEMO_TREE_ID, DEMO_TREE_NAME, "Demonstration family tree")
        .with_preference(PREF_SHOW_GEDCOM_RECORD, "1");
    store.upsert_tree(tree).await.context("Failed to create demo tree")?;

    for (xref, gedcom) in DEMO_RECORDS {
        store
            .save_record(DEMO_TREE_ID, xref, gedcom)
            .await
            .with_context(|| format!("Failed to save demo record {}", xref))?;
    }

    load_pending_changes(store).await?;

    info!("Loaded demo tree with {} records", DEMO_RECORDS.len());
    Ok(())
}

/// An edit waiting for moderation and a record that exists only as a
/// pending creation.
async fn load_pending_changes<S: Store>(store: &S) -> Result<()> {
    let (_, old_gedcom) = DEMO_RECORDS
        .iter()
        .find(|(xref, _)| *xref == "I2")
        .context("Demo record I2 missing")?;

    store
        .add_pending_change(NewPendingChange {
            tree_id: DEMO_TREE_ID,
            xref: "I2".to_string(),
            old_gedcom: old_gedcom.to_string(),
            new_gedcom: format!("{}\n1 DEAT\n2 DATE 1920", old_gedcom),
            user_name: "editor".to_string(),
            real_name: Some("Demo Editor".to_string()),
        })
        .await?;

    store
        .add_pending_change(NewPendingChange {
            tree_id: DEMO_TREE_ID,
            xref: "S2".to_string(),
            old_gedcom: String::new(),
            new_gedcom: "0 @S2@ SOUR\n1 TITL Parish register of St Peter, Leeds".to_string(),
            user_name: "editor".to_string(),
            real_name: Some("Demo Editor".to_string()),
        })
        .await?;

    Ok(())
}
