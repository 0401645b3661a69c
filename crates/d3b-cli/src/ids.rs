//! Conversions between Kids First IDs (`SD_ABC12345`) and Dewrangle global
//! IDs (`sd-abc12345`)

/// `SD_ABC12345` → `sd-abc12345`.  Only the first underscore separates the
/// prefix; anything after it is kept as-is apart from case.
pub(crate) fn kf_id_to_global_id(kf_id: &str) -> String {
    let lower = kf_id.to_lowercase();
    match lower.split_once('_') {
        Some((prefix, rest)) => format!("{prefix}-{rest}"),
        None => lower,
    }
}

/// `sd-abc12345` → `SD_ABC12345`
pub(crate) fn global_id_to_kf_id(global_id: &str) -> String {
    global_id.replace('-', "_").to_uppercase()
}

/// Whether `study_id` looks like a Kids First study ID rather than a
/// Dewrangle global ID
pub(crate) fn is_kf_study_id(study_id: &str) -> bool {
    study_id.starts_with("SD_")
}

/// Normalize a study ID given in either form to a global ID
pub(crate) fn study_global_id(study_id: &str) -> String {
    if is_kf_study_id(study_id) {
        kf_id_to_global_id(study_id)
    } else {
        study_id.to_owned()
    }
}
