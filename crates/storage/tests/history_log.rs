#![forbid(unsafe_code)]

use fstop_core::{HistoryDraft, ImageId, MaskShape};
use fstop_storage::SqliteStore;
use std::path::PathBuf;

fn temp_dir(test_name: &str) -> PathBuf {
    let base = std::env::temp_dir();
    let pid = std::process::id();
    let nonce = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let dir = base.join(format!("fstop_storage_{test_name}_{pid}_{nonce}"));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn image(id: i64) -> ImageId {
    ImageId::try_new(id).expect("image id")
}

fn draft(operation: &str, multi_priority: i64, multi_name: &str, param: u8) -> HistoryDraft {
    HistoryDraft {
        operation: operation.to_string(),
        module_version: 1,
        op_params: Some(vec![param]),
        enabled: true,
        blendop_params: None,
        blendop_version: 1,
        multi_priority,
        multi_name: multi_name.to_string(),
    }
}

fn shape(img: ImageId, form_id: i64) -> MaskShape {
    MaskShape {
        image_id: img,
        form_id,
        form_type: 4,
        name: format!("shape {form_id}"),
        version: 1,
        points: vec![1, 2, 3, 4],
        points_count: 1,
        source: vec![0, 0],
    }
}

#[test]
fn append_assigns_consecutive_sequence_numbers() {
    let storage_dir = temp_dir("append_assigns_consecutive_sequence_numbers");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let img = image(1);

    store
        .history_append(img, &[draft("exposure", 0, "0", 1), draft("sharpen", 0, "0", 2)])
        .expect("first append");
    store
        .history_append(img, &[draft("sharpen", 0, "0", 3)])
        .expect("second append");

    let entries = store.history_entries(img).expect("entries");
    let nums: Vec<i64> = entries.iter().map(|entry| entry.num).collect();
    assert_eq!(nums, vec![0, 1, 2]);
    assert_eq!(entries[2].op_params, Some(vec![3]));
}

#[test]
fn active_entries_yields_winning_rows_newest_first() {
    let storage_dir = temp_dir("active_entries_yields_winning_rows_newest_first");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let img = image(1);

    // The sharpen instance is edited twice; only the later row wins.
    store
        .history_append(
            img,
            &[
                draft("sharpen", 0, "0", 1),
                draft("exposure", 0, "0", 2),
                draft("sharpen", 0, "0", 3),
            ],
        )
        .expect("append");

    let active = store.history_active_entries(img).expect("active entries");
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].operation, "sharpen");
    assert_eq!(active[0].num, 2);
    assert_eq!(active[0].op_params, Some(vec![3]));
    assert_eq!(active[1].operation, "exposure");
    assert_eq!(active[1].num, 1);
}

#[test]
fn replace_all_drops_history_and_masks() {
    let storage_dir = temp_dir("replace_all_drops_history_and_masks");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let img = image(1);

    store
        .history_append(img, &[draft("exposure", 0, "0", 1)])
        .expect("append");
    store
        .add_mask_shapes(img, &[shape(img, 10)])
        .expect("add mask");

    store
        .history_replace_all(img, &[draft("sharpen", 0, "0", 9)])
        .expect("replace all");

    let entries = store.history_entries(img).expect("entries");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].num, 0);
    assert_eq!(entries[0].operation, "sharpen");
    assert!(store.mask_shapes(img).expect("masks").is_empty());
}

#[test]
fn truncate_to_end_removes_the_redo_tail() {
    let storage_dir = temp_dir("truncate_to_end_removes_the_redo_tail");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let img = image(1);

    store
        .history_append(
            img,
            &[
                draft("exposure", 0, "0", 1),
                draft("sharpen", 0, "0", 2),
                draft("grain", 0, "0", 3),
            ],
        )
        .expect("append");
    store.set_history_end(img, 2).expect("set history end");

    store.history_truncate_to_end(img).expect("truncate");

    let nums: Vec<i64> = store
        .history_entries(img)
        .expect("entries")
        .iter()
        .map(|entry| entry.num)
        .collect();
    assert_eq!(nums, vec![0, 1]);
}

#[test]
fn unknown_images_are_silent_noops() {
    let storage_dir = temp_dir("unknown_images_are_silent_noops");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let img = image(99);

    store.history_truncate_to_end(img).expect("truncate unknown");
    store.set_history_end(img, 5).expect("set end on unknown");

    assert_eq!(store.history_end(img).expect("history end"), None);
    assert!(store.history_entries(img).expect("entries").is_empty());
    assert!(store.history_active_entries(img).expect("active").is_empty());
}

#[test]
fn history_end_round_trips() {
    let storage_dir = temp_dir("history_end_round_trips");
    let mut store = SqliteStore::open(&storage_dir).expect("open store");
    let img = image(1);

    store
        .history_append(img, &[draft("exposure", 0, "0", 1)])
        .expect("append");
    assert_eq!(store.history_end(img).expect("default end"), Some(0));

    store.set_history_end(img, 1).expect("set end");
    assert_eq!(store.history_end(img).expect("end"), Some(1));
}
