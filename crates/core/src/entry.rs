#![forbid(unsafe_code)]

use crate::ids::ImageId;

/// One row of an image's history stack. `num` is the position in the stack
/// and defines the order of application; for a fixed `(operation,
/// multi_priority)` pair the row with the highest `num` carries the
/// parameters that are actually in effect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryEntry {
    pub image_id: ImageId,
    pub num: i64,
    pub operation: String,
    pub module_version: i64,
    pub op_params: Option<Vec<u8>>,
    pub enabled: bool,
    pub blendop_params: Option<Vec<u8>>,
    pub blendop_version: i64,
    pub multi_priority: i64,
    pub multi_name: String,
}

impl HistoryEntry {
    pub fn draft(&self) -> HistoryDraft {
        HistoryDraft {
            operation: self.operation.clone(),
            module_version: self.module_version,
            op_params: self.op_params.clone(),
            enabled: self.enabled,
            blendop_params: self.blendop_params.clone(),
            blendop_version: self.blendop_version,
            multi_priority: self.multi_priority,
            multi_name: self.multi_name.clone(),
        }
    }
}

/// A history entry that has not been assigned an image or a stack position
/// yet. Appending a draft gives it the next free `num` of the target image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryDraft {
    pub operation: String,
    pub module_version: i64,
    pub op_params: Option<Vec<u8>>,
    pub enabled: bool,
    pub blendop_params: Option<Vec<u8>>,
    pub blendop_version: i64,
    pub multi_priority: i64,
    pub multi_name: String,
}

/// An entry lifted out of a source image during a copy operation.
/// `origin_num` remembers the source stack position (the winning position
/// for collapsed loads); the final position on the destination is assigned
/// at commit time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedEntry {
    pub origin_num: i64,
    pub operation: String,
    pub module_version: i64,
    pub op_params: Option<Vec<u8>>,
    pub enabled: bool,
    pub blendop_params: Option<Vec<u8>>,
    pub blendop_version: i64,
    pub multi_priority: i64,
    pub multi_name: String,
}

impl StagedEntry {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            origin_num: entry.num,
            operation: entry.operation.clone(),
            module_version: entry.module_version,
            op_params: entry.op_params.clone(),
            enabled: entry.enabled,
            blendop_params: entry.blendop_params.clone(),
            blendop_version: entry.blendop_version,
            multi_priority: entry.multi_priority,
            multi_name: entry.multi_name.clone(),
        }
    }

    pub fn draft(&self) -> HistoryDraft {
        HistoryDraft {
            operation: self.operation.clone(),
            module_version: self.module_version,
            op_params: self.op_params.clone(),
            enabled: self.enabled,
            blendop_params: self.blendop_params.clone(),
            blendop_version: self.blendop_version,
            multi_priority: self.multi_priority,
            multi_name: self.multi_name.clone(),
        }
    }
}

/// Geometric mask data referenced by masking modules. Shapes travel with the
/// history on copy but are never merged; a merge-paste unions the source
/// shapes into the destination without touching `form_id` collisions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskShape {
    pub image_id: ImageId,
    pub form_id: i64,
    pub form_type: i64,
    pub name: String,
    pub version: i64,
    pub points: Vec<u8>,
    pub points_count: i64,
    pub source: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PasteMode {
    /// Discard the destination stack and take over the source stack row by
    /// row.
    Replace,
    /// Keep the destination stack; incoming instances overwrite same-named
    /// peers and append after everything else.
    Merge,
}
