#![forbid(unsafe_code)]

use crate::collab::Collaborators;
use crate::{BatchOutcome, SqliteStore, StoreError};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use fstop_core::{HistoryDraft, ImageId, MaskShape};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SIDECAR_VERSION: u32 = 1;

/// External mirror of one image's stack: the entries in order of
/// application (their position implies the sequence number), the mask
/// shapes, and the active height. Parameter blobs travel base64-encoded.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SidecarDoc {
    pub version: u32,
    pub history_end: i64,
    pub entries: Vec<SidecarEntry>,
    pub masks: Vec<SidecarMask>,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SidecarEntry {
    pub operation: String,
    pub module_version: i64,
    pub op_params: Option<String>,
    pub enabled: bool,
    pub blendop_params: Option<String>,
    pub blendop_version: i64,
    pub multi_priority: i64,
    pub multi_name: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
pub struct SidecarMask {
    pub form_id: i64,
    pub form_type: i64,
    pub name: String,
    pub version: i64,
    pub points: String,
    pub points_count: i64,
    pub source: String,
}

impl SqliteStore {
    pub fn sidecar_export(&self, image: ImageId) -> Result<SidecarDoc, StoreError> {
        let entries = self
            .history_entries(image)?
            .into_iter()
            .map(|entry| SidecarEntry {
                operation: entry.operation,
                module_version: entry.module_version,
                op_params: entry.op_params.map(|blob| STANDARD.encode(blob)),
                enabled: entry.enabled,
                blendop_params: entry.blendop_params.map(|blob| STANDARD.encode(blob)),
                blendop_version: entry.blendop_version,
                multi_priority: entry.multi_priority,
                multi_name: entry.multi_name,
            })
            .collect();
        let masks = self
            .mask_shapes(image)?
            .into_iter()
            .map(|shape| SidecarMask {
                form_id: shape.form_id,
                form_type: shape.form_type,
                name: shape.name,
                version: shape.version,
                points: STANDARD.encode(shape.points),
                points_count: shape.points_count,
                source: STANDARD.encode(shape.source),
            })
            .collect();
        Ok(SidecarDoc {
            version: SIDECAR_VERSION,
            history_end: self.history_end(image)?.unwrap_or(0),
            entries,
            masks,
        })
    }

    pub fn sidecar_write(&self, image: ImageId, path: &Path) -> Result<(), StoreError> {
        let doc = self.sidecar_export(image)?;
        let json = serde_json::to_string_pretty(&doc).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Replaces the image's stack with the one read from a sidecar file.
    /// Any read, parse, decode, or version problem fails with
    /// [`StoreError::SourceRead`] before the image is touched; the stored
    /// `history_end` is clamped to the entry count.
    pub fn history_load_and_apply(
        &mut self,
        image: ImageId,
        path: &Path,
        collab: &mut Collaborators<'_>,
    ) -> Result<(), StoreError> {
        let json = std::fs::read_to_string(path)
            .map_err(|err| StoreError::SourceRead(format!("{}: {err}", path.display())))?;
        let doc: SidecarDoc = serde_json::from_str(&json)
            .map_err(|err| StoreError::SourceRead(format!("{}: {err}", path.display())))?;
        if doc.version != SIDECAR_VERSION {
            return Err(StoreError::SourceRead(format!(
                "unsupported sidecar version {}",
                doc.version
            )));
        }
        let drafts = doc
            .entries
            .iter()
            .map(draft_from_sidecar)
            .collect::<Result<Vec<_>, _>>()?;
        let shapes = doc
            .masks
            .iter()
            .map(|mask| shape_from_sidecar(image, mask))
            .collect::<Result<Vec<_>, _>>()?;
        let end = doc.history_end.clamp(0, drafts.len() as i64);

        let tx = self.conn.transaction()?;
        crate::ensure_image(&tx, image)?;
        crate::delete_history_and_masks(&tx, image)?;
        crate::append_drafts(&tx, image, 0, &drafts)?;
        for shape in &shapes {
            tx.execute(
                r#"
                INSERT INTO masks(image_id, form_id, form_type, name, version,
                                  points, points_count, source)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                rusqlite::params![
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
        tx.execute(
            "UPDATE images SET history_end = ?2 WHERE id = ?1",
            rusqlite::params![image.get(), end],
        )?;
        tx.commit()?;

        if collab.edit_session.is_showing(image) {
            collab.edit_session.reload_history();
        }
        collab.preview_cache.invalidate(image);
        Ok(())
    }

    /// Applies one sidecar file to every selected image. Per-image failures
    /// are counted; the batch keeps going.
    pub fn history_load_and_apply_on_selection(
        &mut self,
        path: &Path,
        selection: &[ImageId],
        collab: &mut Collaborators<'_>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut outcome = BatchOutcome::default();
        for &image in selection {
            outcome.record(self.history_load_and_apply(image, path, collab).is_ok());
        }
        Ok(outcome)
    }
}

fn decode_blob(field: &str, value: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(value)
        .map_err(|err| StoreError::SourceRead(format!("bad base64 in {field}: {err}")))
}

fn draft_from_sidecar(entry: &SidecarEntry) -> Result<HistoryDraft, StoreError> {
    let op_params = entry
        .op_params
        .as_deref()
        .map(|value| decode_blob("op_params", value))
        .transpose()?;
    let blendop_params = entry
        .blendop_params
        .as_deref()
        .map(|value| decode_blob("blendop_params", value))
        .transpose()?;
    Ok(HistoryDraft {
        operation: entry.operation.clone(),
        module_version: entry.module_version,
        op_params,
        enabled: entry.enabled,
        blendop_params,
        blendop_version: entry.blendop_version,
        multi_priority: entry.multi_priority,
        multi_name: entry.multi_name.clone(),
    })
}

fn shape_from_sidecar(image: ImageId, mask: &SidecarMask) -> Result<MaskShape, StoreError> {
    Ok(MaskShape {
        image_id: image,
        form_id: mask.form_id,
        form_type: mask.form_type,
        name: mask.name.clone(),
        version: mask.version,
        points: decode_blob("points", &mask.points)?,
        points_count: mask.points_count,
        source: decode_blob("source", &mask.source)?,
    })
}
