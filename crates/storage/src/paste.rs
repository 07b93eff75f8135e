#![forbid(unsafe_code)]

use crate::collab::Collaborators;
use crate::{BatchOutcome, SqliteStore, StoreError};
use fstop_core::{
    DestinationInstance, ImageId, MergePlan, ModuleRegistry, PasteMode, StagedEntry, StagingBuffer,
    plan_merge,
};
use rusqlite::{Connection, params};
use std::collections::{BTreeMap, BTreeSet};

/// One paste of a source image's stack onto a destination.
///
/// `source == None` means no copy source has been picked yet; pasting then
/// fails with [`StoreError::NothingToPaste`]. `entry_nums`, when set, limits
/// the copy to the source rows with those sequence numbers.
#[derive(Clone, Debug)]
pub struct CopyPasteRequest {
    pub source: Option<ImageId>,
    pub dest: ImageId,
    pub mode: PasteMode,
    pub entry_nums: Option<BTreeSet<i64>>,
}

/// A paste repeated over every image of a selection. The source itself is
/// skipped when it is part of the selection.
#[derive(Clone, Debug)]
pub struct PasteSelectionRequest {
    pub source: Option<ImageId>,
    pub selection: Vec<ImageId>,
    pub mode: PasteMode,
    pub entry_nums: Option<BTreeSet<i64>>,
}

impl SqliteStore {
    /// Transplants the source stack onto the destination under the requested
    /// mode. Replace drops the destination stack (masks included) and takes
    /// over the source rows one to one; merge keeps the destination stack,
    /// overwrites same-named instances in place and appends the rest with
    /// renumbered, gap-free priorities.
    ///
    /// The whole mutation runs in one transaction; on failure the
    /// destination is left exactly as it was.
    pub fn history_paste(
        &mut self,
        request: &CopyPasteRequest,
        registry: &dyn ModuleRegistry,
        collab: &mut Collaborators<'_>,
    ) -> Result<(), StoreError> {
        let Some(source) = request.source else {
            return Err(StoreError::NothingToPaste);
        };
        if source == request.dest {
            return Err(StoreError::InvalidArgument(
                "cannot paste a history stack onto its own image",
            ));
        }

        // A live editor may hold edits that are not in the store yet; they
        // have to land before the stack is copied out from underneath it.
        collab.edit_session.flush_edits();

        let dest = request.dest;
        let tx = self.conn.transaction()?;

        let mut staging = StagingBuffer::new();
        let collapse = request.mode == PasteMode::Merge && request.entry_nums.is_none();
        if collapse {
            load_staging_winning(&tx, source, &mut staging)?;
        } else {
            load_staging_explicit(&tx, source, request.entry_nums.as_ref(), &mut staging)?;
        }

        crate::ensure_image(&tx, dest)?;
        match request.mode {
            PasteMode::Replace => {
                crate::delete_history_and_masks(&tx, dest)?;
                append_staged(&tx, dest, 0, &staging)?;
            }
            PasteMode::Merge => {
                crate::truncate_to_end(&tx, dest)?;
                let offset = crate::next_num(&tx, dest)?;
                staging.compact_multi_priorities(registry);
                let groups = destination_groups(&tx, dest)?;
                let plan = plan_merge(&staging, &groups, registry);
                apply_rewrites(&tx, dest, &plan)?;
                append_staged(&tx, dest, offset, &staging)?;
            }
        }
        // Union, not merge: a form_id present on both sides ends up twice.
        copy_masks(&tx, source, dest)?;
        set_end_to_stack_top(&tx, dest)?;
        tx.commit()?;

        if collab.edit_session.is_showing(dest) {
            collab.edit_session.reload_history();
        }
        collab.metadata_sync.write_sidecar(dest);
        collab.preview_cache.invalidate(dest);
        collab.image_cache.recompute_aspect_ratio(dest);
        Ok(())
    }

    /// Pastes onto every selected image in turn. Each image gets its own
    /// transaction; one failing image does not stop the rest.
    pub fn history_paste_on_selection(
        &mut self,
        request: &PasteSelectionRequest,
        registry: &dyn ModuleRegistry,
        collab: &mut Collaborators<'_>,
    ) -> Result<BatchOutcome, StoreError> {
        let Some(source) = request.source else {
            return Err(StoreError::NothingToPaste);
        };
        let targets: Vec<ImageId> = request
            .selection
            .iter()
            .copied()
            .filter(|&image| image != source)
            .collect();
        if targets.is_empty() {
            return Err(StoreError::NothingSelected);
        }

        let mut outcome = BatchOutcome::default();
        for dest in targets {
            let per_image = CopyPasteRequest {
                source: Some(source),
                dest,
                mode: request.mode,
                entry_nums: request.entry_nums.clone(),
            };
            outcome.record(self.history_paste(&per_image, registry, collab).is_ok());
        }
        Ok(outcome)
    }
}

/// Merge-all load: only the winning row of each `(operation, multi_priority)`
/// instance, in ascending order of the winning sequence numbers. Merge cares
/// about an instance's current parameters, not how it got there.
fn load_staging_winning(
    conn: &Connection,
    source: ImageId,
    staging: &mut StagingBuffer,
) -> Result<(), StoreError> {
    for entry in crate::active_entries(conn, source)?.into_iter().rev() {
        staging.push(StagedEntry::from_entry(&entry));
    }
    Ok(())
}

/// Replace or subset load: the chosen rows as they are, in stack order, so a
/// full replace carries the complete undo history over to the destination.
fn load_staging_explicit(
    conn: &Connection,
    source: ImageId,
    entry_nums: Option<&BTreeSet<i64>>,
    staging: &mut StagingBuffer,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        SELECT image_id, num, operation, module_version, op_params, enabled,
               blendop_params, blendop_version, multi_priority, multi_name
        FROM history
        WHERE image_id = ?1
        ORDER BY num ASC
        "#,
    )?;
    let rows = stmt.query_map(params![source.get()], crate::entry_from_row)?;
    for row in rows {
        let entry = row?;
        if entry_nums.is_none_or(|nums| nums.contains(&entry.num)) {
            staging.push(StagedEntry::from_entry(&entry));
        }
    }
    Ok(())
}

/// Snapshots the destination's instance groups in ascending
/// `(operation, multi_priority)` order, each with the winning row's
/// `multi_name` and the sequence numbers of all its rows.
fn destination_groups(
    conn: &Connection,
    image: ImageId,
) -> Result<Vec<DestinationInstance>, StoreError> {
    let mut groups: BTreeMap<(String, i64), (i64, String, Vec<i64>)> = BTreeMap::new();
    let mut stmt = conn.prepare(
        r#"
        SELECT num, operation, multi_priority, multi_name
        FROM history
        WHERE image_id = ?1
        ORDER BY num ASC
        "#,
    )?;
    let rows = stmt.query_map(params![image.get()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;
    for row in rows {
        let (num, operation, multi_priority, multi_name) = row?;
        let group = groups
            .entry((operation, multi_priority))
            .or_insert_with(|| (num, multi_name.clone(), Vec::new()));
        if num >= group.0 {
            group.0 = num;
            group.1 = multi_name;
        }
        group.2.push(num);
    }
    Ok(groups
        .into_iter()
        .map(
            |((operation, multi_priority), (_, multi_name, entry_nums))| DestinationInstance {
                operation,
                multi_priority,
                multi_name,
                entry_nums,
            },
        )
        .collect())
}

// Rewrites are addressed by sequence number, so two groups swapping
// priorities cannot clobber each other.
fn apply_rewrites(conn: &Connection, image: ImageId, plan: &MergePlan) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        "UPDATE history SET multi_priority = ?3 WHERE image_id = ?1 AND num = ?2",
    )?;
    for rewrite in &plan.rewrites {
        for &num in &rewrite.entry_nums {
            stmt.execute(params![image.get(), num, rewrite.new_multi_priority])?;
        }
    }
    Ok(())
}

fn append_staged(
    conn: &Connection,
    image: ImageId,
    offset: i64,
    staging: &StagingBuffer,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare(
        r#"
        INSERT INTO history(image_id, num, operation, module_version, op_params,
                            enabled, blendop_params, blendop_version,
                            multi_priority, multi_name)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )?;
    for (index, entry) in staging.entries().iter().enumerate() {
        stmt.execute(params![
            image.get(),
            offset + index as i64,
            entry.operation,
            entry.module_version,
            entry.op_params,
            entry.enabled,
            entry.blendop_params,
            entry.blendop_version,
            entry.multi_priority,
            entry.multi_name
        ])?;
    }
    Ok(())
}

fn copy_masks(conn: &Connection, source: ImageId, dest: ImageId) -> Result<(), StoreError> {
    conn.execute(
        r#"
        INSERT INTO masks(image_id, form_id, form_type, name, version,
                          points, points_count, source)
        SELECT ?2, form_id, form_type, name, version, points, points_count, source
        FROM masks
        WHERE image_id = ?1
        "#,
        params![source.get(), dest.get()],
    )?;
    Ok(())
}

/// After a paste the full stack, old rows and new, is live.
fn set_end_to_stack_top(conn: &Connection, image: ImageId) -> Result<(), StoreError> {
    conn.execute(
        r#"
        UPDATE images
        SET history_end = IFNULL((SELECT MAX(num) + 1 FROM history WHERE image_id = ?1), 0)
        WHERE id = ?1
        "#,
        params![image.get()],
    )?;
    Ok(())
}
