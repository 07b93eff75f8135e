#![forbid(unsafe_code)]

use fstop_core::ImageId;

/// Tag pattern of the derived style tags detached after a history delete.
pub const STYLE_TAG_PATTERN: &str = "fstop|style%";

/// Image-level flags and derived values kept outside the history store.
pub trait ImageCache {
    fn clear_auto_presets_flag(&mut self, image: ImageId);
    fn recompute_aspect_ratio(&mut self, image: ImageId);
}

/// The live editing session, if one is open. Its pending edits are flushed
/// before a paste mutates the store, and its view is reloaded when the stack
/// changed underneath it.
pub trait EditSession {
    fn is_showing(&self, image: ImageId) -> bool;
    fn reload_history(&mut self);
    fn flush_edits(&mut self);
}

pub trait PreviewCache {
    fn invalidate(&mut self, image: ImageId);
}

pub trait TagStore {
    fn detach_matching(&mut self, pattern: &str, image: ImageId);
}

pub trait MetadataSync {
    fn write_sidecar(&mut self, image: ImageId);
}

/// The collaborators notified after a history mutation commits. All of them
/// are plain side channels; none can veto or roll back the mutation.
pub struct Collaborators<'a> {
    pub image_cache: &'a mut dyn ImageCache,
    pub edit_session: &'a mut dyn EditSession,
    pub preview_cache: &'a mut dyn PreviewCache,
    pub tag_store: &'a mut dyn TagStore,
    pub metadata_sync: &'a mut dyn MetadataSync,
}
