//! Record resolution across the factory chain, storage and pending changes.

use gedtree::factory::{Factories, ResolveError};
use gedtree::model::{NewPendingChange, RecordKind, RecordRow, Tree};
use gedtree::store::{MemoryStore, PendingChangeStore, RecordStore, TreeStore};
use std::sync::Arc;

async fn store_with_trees() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.upsert_tree(Tree::new(1, "family1", "Family One")).await.unwrap();
    store.upsert_tree(Tree::new(2, "family2", "Family Two")).await.unwrap();
    store
}

async fn tree(store: &MemoryStore, name: &str) -> Arc<Tree> {
    Arc::new(store.get_tree_by_name(name).await.unwrap().unwrap())
}

fn change(tree_id: i64, xref: &str, old_gedcom: &str, new_gedcom: &str) -> NewPendingChange {
    NewPendingChange {
        tree_id,
        xref: xref.to_string(),
        old_gedcom: old_gedcom.to_string(),
        new_gedcom: new_gedcom.to_string(),
        user_name: "editor".to_string(),
        real_name: None,
    }
}

#[tokio::test]
async fn test_family_resolves_end_to_end() {
    let store = store_with_trees().await;
    store
        .save_record(1, "X500", "0 @X500@ FAM\n1 HUSB @X1@\n1 WIFE @X2@")
        .await
        .unwrap();
    let family1 = tree(&store, "family1").await;

    let mut factories = Factories::new(store.clone());
    let record = factories.make("X500", &family1, None).await.unwrap().unwrap();

    assert_eq!(record.kind(), RecordKind::Family);
    assert_eq!(record.xref(), "X500");
    assert!(!record.is_pending_deletion());
    assert!(!record.is_pending_addition());
    assert_eq!(record.url(), "/tree/family1/family/X500");

    let again = factories.make("X500", &family1, None).await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&record, &again));
}

#[tokio::test]
async fn test_each_request_gets_fresh_records() {
    let store = store_with_trees().await;
    store.save_record(1, "I1", "0 @I1@ INDI\n1 NAME Old /Name/").await.unwrap();
    let family1 = tree(&store, "family1").await;

    let mut first_request = Factories::new(store.clone());
    let before = first_request.make("I1", &family1, None).await.unwrap().unwrap();

    store
        .add_pending_change(change(
            1,
            "I1",
            "0 @I1@ INDI\n1 NAME Old /Name/",
            "0 @I1@ INDI\n1 NAME New /Name/",
        ))
        .await
        .unwrap();

    let mut second_request = Factories::new(store.clone());
    let after = second_request.make("I1", &family1, None).await.unwrap().unwrap();

    assert_eq!(before.full_name(), "Old Name");
    assert_eq!(after.full_name(), "New Name");
    assert!(!Arc::ptr_eq(&before, &after));
}

#[tokio::test]
async fn test_every_kind_resolves_through_make() {
    let store = store_with_trees().await;
    let records = [
        ("F1", "0 @F1@ FAM", RecordKind::Family),
        ("I1", "0 @I1@ INDI", RecordKind::Individual),
        ("M1", "0 @M1@ OBJE\n1 FILE a.jpg", RecordKind::Media),
        ("N1", "0 @N1@ NOTE Some text", RecordKind::Note),
        ("R1", "0 @R1@ REPO\n1 NAME Archive", RecordKind::Repository),
        ("S1", "0 @S1@ SOUR\n1 TITL Census", RecordKind::Source),
        ("U1", "0 @U1@ SUBM\n1 NAME Me", RecordKind::Submitter),
        ("C1", "0 @C1@ _CUSTOM_TAG", RecordKind::Generic),
    ];
    for (xref, gedcom, _) in &records {
        store.save_record(1, xref, gedcom).await.unwrap();
    }
    let family1 = tree(&store, "family1").await;
    let mut factories = Factories::new(store.clone());

    for (xref, _, kind) in &records {
        let record = factories.make(xref, &family1, None).await.unwrap().unwrap();
        assert_eq!(record.kind(), *kind, "{} resolved as {:?}", xref, record.kind());
    }
}

#[tokio::test]
async fn test_xrefs_are_scoped_to_their_tree() {
    let store = store_with_trees().await;
    store.save_record(1, "I1", "0 @I1@ INDI\n1 NAME In /One/").await.unwrap();
    store.save_record(2, "I1", "0 @I1@ INDI\n1 NAME In /Two/").await.unwrap();
    let family1 = tree(&store, "family1").await;
    let family2 = tree(&store, "family2").await;

    let mut factories = Factories::new(store.clone());
    let one = factories.make("I1", &family1, None).await.unwrap().unwrap();
    let two = factories.make("I1", &family2, None).await.unwrap().unwrap();

    assert_eq!(one.full_name(), "In One");
    assert_eq!(two.full_name(), "In Two");
}

#[tokio::test]
async fn test_committed_table_wins_over_disagreeing_pending_type() {
    let store = store_with_trees().await;
    store.save_record(1, "N1", "0 @N1@ NOTE Original").await.unwrap();
    store
        .add_pending_change(change(1, "N1", "0 @N1@ NOTE Original", "0 @N1@ SOUR\n1 TITL Now a source"))
        .await
        .unwrap();
    let family1 = tree(&store, "family1").await;

    let mut factories = Factories::new(store.clone());
    let record = factories.make("N1", &family1, None).await.unwrap().unwrap();

    assert_eq!(record.kind(), RecordKind::Note);
    assert!(record.has_pending_change());
    assert!(record.effective_gedcom().contains("SOUR"));
}

#[tokio::test]
async fn test_pending_type_of_earlier_factory_does_not_claim_committed_record() {
    let store = store_with_trees().await;
    store.save_record(1, "S1", "0 @S1@ SOUR\n1 TITL Census").await.unwrap();
    store
        .add_pending_change(change(1, "S1", "0 @S1@ SOUR\n1 TITL Census", "0 @S1@ NOTE Now a note"))
        .await
        .unwrap();
    let family1 = tree(&store, "family1").await;

    let mut factories = Factories::new(store.clone());
    let record = factories.make("S1", &family1, None).await.unwrap().unwrap();

    assert_eq!(record.kind(), RecordKind::Source);
    assert_eq!(record.gedcom(), "0 @S1@ SOUR\n1 TITL Census");
    assert!(!record.is_pending_addition());
}

#[tokio::test]
async fn test_accepting_changes_updates_storage() {
    let store = store_with_trees().await;
    store.save_record(1, "I1", "0 @I1@ INDI\n1 NAME A /B/").await.unwrap();
    let first = store
        .add_pending_change(change(1, "I1", "0 @I1@ INDI\n1 NAME A /B/", "0 @I1@ INDI\n1 NAME C /D/"))
        .await
        .unwrap();
    let second = store
        .add_pending_change(change(1, "I1", "0 @I1@ INDI\n1 NAME C /D/", ""))
        .await
        .unwrap();
    let family1 = tree(&store, "family1").await;

    let mut factories = Factories::new(store.clone());
    let pending = factories.make("I1", &family1, None).await.unwrap().unwrap();
    assert!(pending.is_pending_deletion());

    assert_eq!(store.reject_change(second.change_id).await.unwrap(), 1);
    assert_eq!(store.accept_change(first.change_id).await.unwrap(), 1);
    factories.forget("I1", family1.id);

    let accepted = factories.make("I1", &family1, None).await.unwrap().unwrap();
    assert!(!accepted.has_pending_change());
    assert_eq!(accepted.full_name(), "C D");

    let rows = store.list_records(RecordKind::Individual, 1).await.unwrap();
    assert_eq!(rows, vec![RecordRow::new("I1", "0 @I1@ INDI\n1 NAME C /D/")]);
    let mapped = factories.map_row(&family1, &rows[0]).await.unwrap();
    assert_eq!(mapped.kind(), RecordKind::Individual);
}

#[tokio::test]
async fn test_malformed_stored_record_is_an_error() {
    let store = store_with_trees().await;
    store
        .add_pending_change(change(1, "Z1", "", "not gedcom"))
        .await
        .unwrap();
    let family1 = tree(&store, "family1").await;

    let mut factories = Factories::new(store.clone());
    let result = factories.make("Z1", &family1, None).await;
    assert!(matches!(result, Err(ResolveError::Malformed(_))));
}
