#![forbid(unsafe_code)]

use fstop_core::{HistoryDraft, HistoryEntry, ImageId, MaskShape};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};

mod collab;
mod delete;
mod paste;
mod reader;
mod sidecar;

pub use collab::{
    Collaborators, EditSession, ImageCache, MetadataSync, PreviewCache, STYLE_TAG_PATTERN, TagStore,
};
pub use paste::{CopyPasteRequest, PasteSelectionRequest};
pub use reader::HistoryItem;
pub use sidecar::{SIDECAR_VERSION, SidecarDoc, SidecarEntry, SidecarMask};

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Sql(rusqlite::Error),
    InvalidArgument(&'static str),
    NothingToPaste,
    NothingSelected,
    SourceRead(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "io: {err}"),
            Self::Sql(err) => write!(f, "sqlite: {err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NothingToPaste => write!(f, "no image selected as copy source"),
            Self::NothingSelected => write!(f, "no image to paste onto"),
            Self::SourceRead(message) => write!(f, "cannot read history source: {message}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql(value)
    }
}

/// Outcome of an operation repeated over an image selection. Per-image
/// failures are counted, not propagated; the batch runs to the end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.applied += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    storage_dir: PathBuf,
    conn: Connection,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;
        let db_path = storage_dir.join("fstop.db");
        let conn = Connection::open(db_path)?;
        let store = Self { storage_dir, conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA busy_timeout=5000;

            CREATE TABLE IF NOT EXISTS meta (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
              id INTEGER PRIMARY KEY,
              history_end INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS history (
              image_id INTEGER NOT NULL,
              num INTEGER NOT NULL,
              operation TEXT NOT NULL,
              module_version INTEGER NOT NULL DEFAULT 0,
              op_params BLOB,
              enabled INTEGER NOT NULL DEFAULT 0,
              blendop_params BLOB,
              blendop_version INTEGER NOT NULL DEFAULT 1,
              multi_priority INTEGER NOT NULL DEFAULT 0,
              multi_name TEXT NOT NULL DEFAULT '',
              PRIMARY KEY (image_id, num)
            );

            CREATE TABLE IF NOT EXISTS masks (
              image_id INTEGER NOT NULL,
              form_id INTEGER NOT NULL,
              form_type INTEGER NOT NULL,
              name TEXT NOT NULL DEFAULT '',
              version INTEGER NOT NULL DEFAULT 1,
              points BLOB NOT NULL,
              points_count INTEGER NOT NULL DEFAULT 0,
              source BLOB NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_history_image_op
              ON history(image_id, operation, multi_priority);
            CREATE INDEX IF NOT EXISTS idx_masks_image ON masks(image_id);
            "#,
        )?;
        self.conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
            params!["schema_version", "v1"],
        )?;
        Ok(())
    }

    /// Appends drafts at the end of the image's stack; sequence numbers
    /// continue from the current maximum. The active height is not touched.
    pub fn history_append(
        &mut self,
        image: ImageId,
        drafts: &[HistoryDraft],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        ensure_image(&tx, image)?;
        let offset = next_num(&tx, image)?;
        append_drafts(&tx, image, offset, drafts)?;
        tx.commit()?;
        Ok(())
    }

    /// Drops the image's whole stack, mask shapes included, and appends the
    /// drafts from sequence number 0.
    pub fn history_replace_all(
        &mut self,
        image: ImageId,
        drafts: &[HistoryDraft],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        ensure_image(&tx, image)?;
        delete_history_and_masks(&tx, image)?;
        append_drafts(&tx, image, 0, drafts)?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes the redo tail: every entry at or above the active height.
    /// A no-op for an unknown image.
    pub fn history_truncate_to_end(&mut self, image: ImageId) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        truncate_to_end(&tx, image)?;
        tx.commit()?;
        Ok(())
    }

    /// The winning entry of every `(operation, multi_priority)` instance,
    /// newest first.
    pub fn history_active_entries(&self, image: ImageId) -> Result<Vec<HistoryEntry>, StoreError> {
        active_entries(&self.conn, image)
    }

    /// Every entry of the stack in order of application.
    pub fn history_entries(&self, image: ImageId) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT image_id, num, operation, module_version, op_params, enabled,
                   blendop_params, blendop_version, multi_priority, multi_name
            FROM history
            WHERE image_id = ?1
            ORDER BY num ASC
            "#,
        )?;
        let rows = stmt.query_map(params![image.get()], entry_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn set_history_end(&mut self, image: ImageId, end: i64) -> Result<(), StoreError> {
        self.conn.execute(
            "UPDATE images SET history_end = ?2 WHERE id = ?1",
            params![image.get(), end],
        )?;
        Ok(())
    }

    pub fn history_end(&self, image: ImageId) -> Result<Option<i64>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT history_end FROM images WHERE id = ?1",
                params![image.get()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?)
    }

    pub fn mask_shapes(&self, image: ImageId) -> Result<Vec<MaskShape>, StoreError> {
        mask_shapes(&self.conn, image)
    }

    /// Stores shapes under the given image, whatever `image_id` their
    /// structs carry. The masks table enforces no uniqueness on
    /// `(image_id, form_id)`; callers own collision handling.
    pub fn add_mask_shapes(
        &mut self,
        image: ImageId,
        shapes: &[MaskShape],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for shape in shapes {
            tx.execute(
                r#"
                INSERT INTO masks(image_id, form_id, form_type, name, version,
                                  points, points_count, source)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    image.get(),
                    shape.form_id,
                    shape.form_type,
                    shape.name,
                    shape.version,
                    shape.points,
                    shape.points_count,
                    shape.source
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let image_id: i64 = row.get(0)?;
    let image_id = ImageId::try_new(image_id).map_err(|_| {
        rusqlite::Error::IntegralValueOutOfRange(0, image_id)
    })?;
    Ok(HistoryEntry {
        image_id,
        num: row.get(1)?,
        operation: row.get(2)?,
        module_version: row.get(3)?,
        op_params: row.get(4)?,
        enabled: row.get(5)?,
        blendop_params: row.get(6)?,
        blendop_version: row.get(7)?,
        multi_priority: row.get(8)?,
        multi_name: row.get(9)?,
    })
}

fn ensure_image(conn: &Connection, image: ImageId) -> Result<(), StoreError> {
    conn.execute(
        "INSERT OR IGNORE INTO images(id, history_end) VALUES (?1, 0)",
        params![image.get()],
    )?;
    Ok(())
}

fn next_num(conn: &Connection, image: ImageId) -> Result<i64, StoreError> {
    Ok(conn.query_row(
        "SELECT IFNULL(MAX(num), -1) + 1 FROM history WHERE image_id = ?1",
        params![image.get()],
        |row| row.get::<_, i64>(0),
    )?)
}

fn append_drafts(
    conn: &Connection,
    image: ImageId,
    offset: i64,
    drafts: &[HistoryDraft],
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO history(image_id, num, operation, module_version, op_params,
                            enabled, blendop_params, blendop_version,
                            multi_priority, multi_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )?;
    for (index, draft) in drafts.iter().enumerate() {
        stmt.execute(params![
            image.get(),
            offset + index as i64,
            draft.operation,
            draft.module_version,
            draft.op_params,
            draft.enabled,
            draft.blendop_params,
            draft.blendop_version,
            draft.multi_priority,
            draft.multi_name
        ])?;
    }
    Ok(())
}

fn delete_history_and_masks(conn: &Connection, image: ImageId) -> Result<(), StoreError> {
    conn.execute("DELETE FROM history WHERE image_id = ?1", params![image.get()])?;
    conn.execute("DELETE FROM masks WHERE image_id = ?1", params![image.get()])?;
    Ok(())
}

// The subquery is NULL for an unknown image, so nothing matches.
fn truncate_to_end(conn: &Connection, image: ImageId) -> Result<(), StoreError> {
    conn.execute(
        r#"
        DELETE FROM history
        WHERE image_id = ?1
          AND num >= (SELECT history_end FROM images WHERE id = ?1)
        "#,
        params![image.get()],
    )?;
    Ok(())
}

// Bare columns resolve against the MAX(num) row, which is exactly the
// winning entry of each instance group.
fn active_entries(conn: &Connection, image: ImageId) -> Result<Vec<HistoryEntry>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT image_id, MAX(num) AS num, operation, module_version, op_params,
               enabled, blendop_params, blendop_version, multi_priority, multi_name
        FROM history
        WHERE image_id = ?1
        GROUP BY operation, multi_priority
        ORDER BY num DESC
        "#,
    )?;
    let rows = stmt.query_map(params![image.get()], entry_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn mask_shapes(conn: &Connection, image: ImageId) -> Result<Vec<MaskShape>, StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT image_id, form_id, form_type, name, version, points, points_count, source
        FROM masks
        WHERE image_id = ?1
        ORDER BY form_id ASC
        "#,
    )?;
    let rows = stmt.query_map(params![image.get()], |row| {
        let image_id: i64 = row.get(0)?;
        let image_id = ImageId::try_new(image_id).map_err(|_| {
            rusqlite::Error::IntegralValueOutOfRange(0, image_id)
        })?;
        Ok(MaskShape {
            image_id,
            form_id: row.get(1)?,
            form_type: row.get(2)?,
            name: row.get(3)?,
            version: row.get(4)?,
            points: row.get(5)?,
            points_count: row.get(6)?,
            source: row.get(7)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
