#![forbid(unsafe_code)]

use crate::collab::{Collaborators, STYLE_TAG_PATTERN};
use crate::{BatchOutcome, SqliteStore, StoreError};
use fstop_core::ImageId;
use rusqlite::params;

impl SqliteStore {
    /// Discards the image's whole stack: history rows, mask shapes, and the
    /// active height. Derived style tags and the auto-presets flag are
    /// cleaned up through the collaborators once the delete has committed.
    pub fn history_delete(
        &mut self,
        image: ImageId,
        collab: &mut Collaborators<'_>,
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        crate::delete_history_and_masks(&tx, image)?;
        tx.execute(
            "UPDATE images SET history_end = 0 WHERE id = ?1",
            params![image.get()],
        )?;
        tx.commit()?;

        collab.image_cache.clear_auto_presets_flag(image);
        if collab.edit_session.is_showing(image) {
            collab.edit_session.reload_history();
        }
        collab.preview_cache.invalidate(image);
        collab.tag_store.detach_matching(STYLE_TAG_PATTERN, image);
        Ok(())
    }

    /// Deletes the stack of every selected image. Failures are counted and
    /// the batch keeps going; an empty selection is an empty outcome, not an
    /// error.
    pub fn history_delete_on_selection(
        &mut self,
        selection: &[ImageId],
        collab: &mut Collaborators<'_>,
    ) -> Result<BatchOutcome, StoreError> {
        let mut outcome = BatchOutcome::default();
        for &image in selection {
            let ok = self.history_delete(image, collab).is_ok();
            if ok {
                collab.image_cache.recompute_aspect_ratio(image);
            }
            outcome.record(ok);
        }
        Ok(outcome)
    }
}
