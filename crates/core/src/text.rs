#![forbid(unsafe_code)]

/// Label of the unnamed default instance of a module.
pub const DEFAULT_MULTI_NAME: &str = "0";

/// True for the spellings that all mean "the default instance": the empty
/// string, a lone space, and `"0"`.
pub fn is_default_multi_name(value: &str) -> bool {
    value.is_empty() || value == " " || value == DEFAULT_MULTI_NAME
}

/// Composes the user-facing line for one history row:
/// `"<name> [multi_name] [(on|off)]"`. The instance label is skipped for
/// default instances; the marker is skipped when the caller only shows
/// enabled rows.
pub fn display_label(
    localized_name: &str,
    multi_name: &str,
    enabled: bool,
    with_marker: bool,
) -> String {
    let mut label = String::from(localized_name);
    if !is_default_multi_name(multi_name) {
        label.push(' ');
        label.push_str(multi_name);
    }
    if with_marker {
        label.push_str(if enabled { " (on)" } else { " (off)" });
    }
    label
}
