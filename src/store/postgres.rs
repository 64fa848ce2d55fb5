use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Postgres, Row, Transaction};
use std::collections::HashMap;

use crate::gedcom::extract_type;
use crate::model::{
    ChangeStatus, NewPendingChange, PendingChange, PendingOverlay, RecordKind, RecordRow, Tree,
    TreeId,
};
use crate::store::traits::{PendingChangeStore, RecordStore, TreeStore};

/// Column layout of one record table.
struct RecordTable {
    name: &'static str,
    id: &'static str,
    file: &'static str,
    gedcom: &'static str,
}

const INDIVIDUALS: RecordTable = RecordTable { name: "individuals", id: "i_id", file: "i_file", gedcom: "i_gedcom" };
const FAMILIES: RecordTable = RecordTable { name: "families", id: "f_id", file: "f_file", gedcom: "f_gedcom" };
const MEDIA: RecordTable = RecordTable { name: "media", id: "m_id", file: "m_file", gedcom: "m_gedcom" };
const SOURCES: RecordTable = RecordTable { name: "sources", id: "s_id", file: "s_file", gedcom: "s_gedcom" };
const OTHER: RecordTable = RecordTable { name: "other", id: "o_id", file: "o_file", gedcom: "o_gedcom" };

const ALL_TABLES: [&RecordTable; 5] = [&INDIVIDUALS, &FAMILIES, &MEDIA, &SOURCES, &OTHER];

fn table_for(kind: RecordKind) -> &'static RecordTable {
    match kind {
        RecordKind::Individual => &INDIVIDUALS,
        RecordKind::Family => &FAMILIES,
        RecordKind::Media => &MEDIA,
        RecordKind::Source => &SOURCES,
        RecordKind::Note | RecordKind::Repository | RecordKind::Submitter | RecordKind::Generic => &OTHER,
    }
}

/// Tags of the `other` table rows that belong to a typed factory.
fn other_typed_tags() -> Vec<String> {
    RecordKind::OTHER_TABLE_TYPED
        .iter()
        .filter_map(|kind| kind.tag())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn tree_preferences(&self, tree_id: TreeId) -> Result<HashMap<String, String>> {
        let rows = sqlx::query("SELECT setting_name, setting_value FROM gedcom_setting WHERE gedcom_id = $1")
            .bind(tree_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch tree preferences")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("setting_name"), row.get("setting_value")))
            .collect())
    }

    async fn tree_from_row(&self, row: PgRow) -> Result<Tree> {
        let id: TreeId = row.get("gedcom_id");
        Ok(Tree {
            id,
            name: row.get("gedcom_name"),
            title: row.get("title"),
            preferences: self.tree_preferences(id).await?,
        })
    }

    async fn write_record(tx: &mut Transaction<'_, Postgres>, tree_id: TreeId, xref: &str, gedcom: &str) -> Result<()> {
        let tag = extract_type(gedcom)?;
        Self::remove_record(tx, tree_id, xref).await?;

        let kind = RecordKind::from_tag(&tag);
        let table = table_for(kind);
        if table.name == OTHER.name {
            sqlx::query("INSERT INTO other (o_id, o_file, o_type, o_gedcom) VALUES ($1, $2, $3, $4)")
                .bind(xref)
                .bind(tree_id)
                .bind(&tag)
                .bind(gedcom)
                .execute(&mut **tx)
                .await
                .context("Failed to insert record")?;
        } else {
            let sql = format!(
                "INSERT INTO {} ({}, {}, {}) VALUES ($1, $2, $3)",
                table.name, table.id, table.file, table.gedcom
            );
            sqlx::query(&sql)
                .bind(xref)
                .bind(tree_id)
                .bind(gedcom)
                .execute(&mut **tx)
                .await
                .context("Failed to insert record")?;
        }

        Ok(())
    }

    async fn remove_record(tx: &mut Transaction<'_, Postgres>, tree_id: TreeId, xref: &str) -> Result<bool> {
        let mut removed = false;
        for table in ALL_TABLES {
            let sql = format!("DELETE FROM {} WHERE {} = $1 AND {} = $2", table.name, table.id, table.file);
            let result = sqlx::query(&sql)
                .bind(xref)
                .bind(tree_id)
                .execute(&mut **tx)
                .await
                .context("Failed to delete record")?;
            removed |= result.rows_affected() > 0;
        }
        Ok(removed)
    }

    /// Lock every change to the record `change_id` belongs to, oldest first,
    /// for the rest of `tx`. `None` unless the change is still pending once
    /// the locks are held.
    async fn lock_pending_change(tx: &mut Transaction<'_, Postgres>, change_id: i64) -> Result<Option<PendingChange>> {
        let Some(row) = sqlx::query("SELECT gedcom_id, xref FROM change WHERE change_id = $1")
            .bind(change_id)
            .fetch_optional(&mut **tx)
            .await
            .context("Failed to fetch change")?
        else {
            return Ok(None);
        };
        let tree_id: TreeId = row.get("gedcom_id");
        let xref: String = row.get("xref");

        let sql = format!(
            "SELECT {CHANGE_COLUMNS} FROM change c JOIN gedcom g ON g.gedcom_id = c.gedcom_id \
             WHERE c.gedcom_id = $1 AND c.xref = $2 ORDER BY c.change_id FOR UPDATE OF c"
        );
        let rows = sqlx::query(&sql)
            .bind(tree_id)
            .bind(&xref)
            .fetch_all(&mut **tx)
            .await
            .context("Failed to lock changes")?;

        Ok(rows
            .iter()
            .map(change_from_row)
            .find(|change| change.change_id == change_id)
            .filter(|change| change.status == ChangeStatus::Pending))
    }
}

const CHANGE_COLUMNS: &str = "c.change_id, c.change_time, c.status, c.gedcom_id, g.gedcom_name, c.xref, c.old_gedcom, c.new_gedcom, c.user_name, c.real_name";

fn change_from_row(row: &PgRow) -> PendingChange {
    let status: String = row.get("status");
    PendingChange {
        change_id: row.get("change_id"),
        tree_id: row.get("gedcom_id"),
        tree_name: row.get("gedcom_name"),
        xref: row.get("xref"),
        old_gedcom: row.get("old_gedcom"),
        new_gedcom: row.get("new_gedcom"),
        status: ChangeStatus::parse(&status),
        user_name: row.get("user_name"),
        real_name: row.get("real_name"),
        change_time: row.get("change_time"),
    }
}

#[async_trait::async_trait]
impl TreeStore for PostgresStore {
    async fn get_tree(&self, id: TreeId) -> Result<Option<Tree>> {
        let row = sqlx::query("SELECT gedcom_id, gedcom_name, title FROM gedcom WHERE gedcom_id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch tree")?;

        match row {
            Some(row) => Ok(Some(self.tree_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn get_tree_by_name(&self, name: &str) -> Result<Option<Tree>> {
        let row = sqlx::query("SELECT gedcom_id, gedcom_name, title FROM gedcom WHERE gedcom_name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch tree")?;

        match row {
            Some(row) => Ok(Some(self.tree_from_row(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_trees(&self) -> Result<Vec<Tree>> {
        let rows = sqlx::query("SELECT gedcom_id, gedcom_name, title FROM gedcom ORDER BY gedcom_id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list trees")?;

        let mut trees = Vec::with_capacity(rows.len());
        for row in rows {
            trees.push(self.tree_from_row(row).await?);
        }
        Ok(trees)
    }

    async fn upsert_tree(&self, tree: Tree) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO gedcom (gedcom_id, gedcom_name, title)
            VALUES ($1, $2, $3)
            ON CONFLICT (gedcom_id) DO UPDATE SET
                gedcom_name = EXCLUDED.gedcom_name,
                title = EXCLUDED.title
            "#,
        )
        .bind(tree.id)
        .bind(&tree.name)
        .bind(&tree.title)
        .execute(&mut *tx)
        .await
        .context("Failed to upsert tree")?;

        sqlx::query("DELETE FROM gedcom_setting WHERE gedcom_id = $1")
            .bind(tree.id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear tree preferences")?;

        for (name, value) in &tree.preferences {
            sqlx::query("INSERT INTO gedcom_setting (gedcom_id, setting_name, setting_value) VALUES ($1, $2, $3)")
                .bind(tree.id)
                .bind(name)
                .bind(value)
                .execute(&mut *tx)
                .await
                .context("Failed to save tree preference")?;
        }

        tx.commit().await.context("Failed to commit tree")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for PostgresStore {
    async fn typed_gedcom(&self, kind: RecordKind, xref: &str, tree_id: TreeId) -> Result<Option<String>> {
        let Some(tag) = kind.tag() else {
            return self.other_gedcom(xref, tree_id, &[]).await;
        };

        let table = table_for(kind);
        let row = if table.name == OTHER.name {
            sqlx::query("SELECT o_gedcom AS gedcom FROM other WHERE o_id = $1 AND o_file = $2 AND o_type = $3")
                .bind(xref)
                .bind(tree_id)
                .bind(tag)
                .fetch_optional(&self.pool)
                .await
        } else {
            let sql = format!(
                "SELECT {} AS gedcom FROM {} WHERE {} = $1 AND {} = $2",
                table.gedcom, table.name, table.id, table.file
            );
            sqlx::query(&sql)
                .bind(xref)
                .bind(tree_id)
                .fetch_optional(&self.pool)
                .await
        }
        .context("Failed to fetch record")?;

        Ok(row.map(|row| row.get("gedcom")))
    }

    async fn other_gedcom(&self, xref: &str, tree_id: TreeId, excluded_tags: &[&str]) -> Result<Option<String>> {
        let excluded: Vec<String> = excluded_tags.iter().map(|tag| tag.to_string()).collect();

        let gedcom = sqlx::query_scalar::<_, String>(
            "SELECT o_gedcom FROM other WHERE o_id = $1 AND o_file = $2 AND o_type <> ALL($3)",
        )
        .bind(xref)
        .bind(tree_id)
        .bind(excluded)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch record")?;

        Ok(gedcom)
    }

    async fn list_records(&self, kind: RecordKind, tree_id: TreeId) -> Result<Vec<RecordRow>> {
        let table = table_for(kind);
        let rows = match (table.name == OTHER.name, kind.tag()) {
            (true, Some(tag)) => {
                sqlx::query("SELECT o_id AS xref, o_gedcom AS gedcom FROM other WHERE o_file = $1 AND o_type = $2 ORDER BY o_id")
                    .bind(tree_id)
                    .bind(tag)
                    .fetch_all(&self.pool)
                    .await
            }
            (true, None) => {
                sqlx::query("SELECT o_id AS xref, o_gedcom AS gedcom FROM other WHERE o_file = $1 AND o_type <> ALL($2) ORDER BY o_id")
                    .bind(tree_id)
                    .bind(other_typed_tags())
                    .fetch_all(&self.pool)
                    .await
            }
            (false, _) => {
                let sql = format!(
                    "SELECT {} AS xref, {} AS gedcom FROM {} WHERE {} = $1 ORDER BY {}",
                    table.id, table.gedcom, table.name, table.file, table.id
                );
                sqlx::query(&sql).bind(tree_id).fetch_all(&self.pool).await
            }
        }
        .context("Failed to list records")?;

        Ok(rows
            .into_iter()
            .map(|row| RecordRow {
                xref: row.get("xref"),
                gedcom: row.get("gedcom"),
            })
            .collect())
    }

    async fn save_record(&self, tree_id: TreeId, xref: &str, gedcom: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        Self::write_record(&mut tx, tree_id, xref, gedcom).await?;
        tx.commit().await.context("Failed to commit record")?;
        Ok(())
    }

    async fn delete_record(&self, tree_id: TreeId, xref: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let removed = Self::remove_record(&mut tx, tree_id, xref).await?;
        tx.commit().await.context("Failed to commit deletion")?;
        Ok(removed)
    }
}

#[async_trait::async_trait]
impl PendingChangeStore for PostgresStore {
    async fn pending_overlay(&self, xref: &str, tree_id: TreeId) -> Result<Option<PendingOverlay>> {
        let sql = format!(
            "SELECT {CHANGE_COLUMNS} FROM change c JOIN gedcom g ON g.gedcom_id = c.gedcom_id \
             WHERE c.xref = $1 AND c.gedcom_id = $2 AND c.status = 'pending' ORDER BY c.change_id"
        );
        let rows = sqlx::query(&sql)
            .bind(xref)
            .bind(tree_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch pending changes")?;

        let changes: Vec<PendingChange> = rows.iter().map(change_from_row).collect();
        Ok(PendingOverlay::from_changes(&changes))
    }

    async fn list_pending_changes(&self) -> Result<Vec<PendingChange>> {
        let sql = format!(
            "SELECT {CHANGE_COLUMNS} FROM change c JOIN gedcom g ON g.gedcom_id = c.gedcom_id \
             WHERE c.status = 'pending' ORDER BY c.gedcom_id, c.xref, c.change_id"
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list pending changes")?;

        Ok(rows.iter().map(change_from_row).collect())
    }

    async fn get_change(&self, change_id: i64) -> Result<Option<PendingChange>> {
        let sql = format!(
            "SELECT {CHANGE_COLUMNS} FROM change c JOIN gedcom g ON g.gedcom_id = c.gedcom_id WHERE c.change_id = $1"
        );
        let row = sqlx::query(&sql)
            .bind(change_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch change")?;

        Ok(row.as_ref().map(change_from_row))
    }

    async fn add_pending_change(&self, change: NewPendingChange) -> Result<PendingChange> {
        let change_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO change (gedcom_id, xref, old_gedcom, new_gedcom, user_name, real_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING change_id
            "#,
        )
        .bind(change.tree_id)
        .bind(&change.xref)
        .bind(&change.old_gedcom)
        .bind(&change.new_gedcom)
        .bind(&change.user_name)
        .bind(&change.real_name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to add pending change")?;

        self.get_change(change_id)
            .await?
            .context("Pending change vanished after insert")
    }

    async fn accept_change(&self, change_id: i64) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let Some(change) = Self::lock_pending_change(&mut tx, change_id).await? else {
            return Ok(0);
        };

        if change.new_gedcom.is_empty() {
            Self::remove_record(&mut tx, change.tree_id, &change.xref).await?;
        } else {
            Self::write_record(&mut tx, change.tree_id, &change.xref, &change.new_gedcom).await?;
        }

        let result = sqlx::query(
            "UPDATE change SET status = 'accepted' WHERE gedcom_id = $1 AND xref = $2 AND change_id <= $3 AND status = 'pending'",
        )
        .bind(change.tree_id)
        .bind(&change.xref)
        .bind(change_id)
        .execute(&mut *tx)
        .await
        .context("Failed to accept change")?;

        tx.commit().await.context("Failed to commit acceptance")?;
        Ok(result.rows_affected() as usize)
    }

    async fn reject_change(&self, change_id: i64) -> Result<usize> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let Some(change) = Self::lock_pending_change(&mut tx, change_id).await? else {
            return Ok(0);
        };

        let result = sqlx::query(
            "UPDATE change SET status = 'rejected' WHERE gedcom_id = $1 AND xref = $2 AND change_id >= $3 AND status = 'pending'",
        )
        .bind(change.tree_id)
        .bind(&change.xref)
        .bind(change_id)
        .execute(&mut *tx)
        .await
        .context("Failed to reject change")?;

        tx.commit().await.context("Failed to commit rejection")?;
        Ok(result.rows_affected() as usize)
    }
}
