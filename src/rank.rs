use crate::types::CapInfo;

/// Default number of suggestions handed to the UI
pub const DEFAULT_CAP: usize = 500;

/// Pipeline stage where the default flow truncates
pub const RENDER_STAGE: &str = "render";

/// First `min(cap, list.len())` suggestions, order preserved
pub fn build_visible_suggestions<T: Clone>(list: &[T], cap: usize) -> Vec<T> {
    list[..cap.min(list.len())].to_vec()
}

/// Visible suggestions for `list`, plus a description of the cut made at `stage`
pub fn apply_cap<T: Clone>(list: &[T], cap: usize, stage: &str) -> (Vec<T>, CapInfo) {
    let info = CapInfo {
        applied: list.len() > cap,
        limit: cap,
        stage: stage.to_string(),
    };
    (build_visible_suggestions(list, cap), info)
}
