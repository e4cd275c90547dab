use log::debug;
use std::collections::HashSet;
use std::path::PathBuf;

use crate::host::{ActivationRecord, RoutineId};

/// The record execution should pause in after stepping out of `frame`.
///
/// Out of a template frame this lands just above the nearest enclosing render
/// of a *different* template, skipping renders of the same file (recursive
/// includes). Markers that cannot be translated are walked past. Host frames
/// step out to their caller.
pub fn step_out_target<'a, F>(
    frame: &'a dyn ActivationRecord,
    is_sub_language: bool,
    markers: &HashSet<RoutineId>,
    filename_of: F,
) -> Option<&'a dyn ActivationRecord>
where
    F: Fn(&dyn ActivationRecord) -> Option<PathBuf>,
{
    if !is_sub_language {
        return frame.caller();
    }

    let current_file = filename_of(frame);
    debug!("step out of {:?}", current_file);

    let mut last_marker = None;
    let mut current = frame.caller();
    while let Some(f) = current {
        if markers.contains(&f.routine()) {
            last_marker = Some(f);
            if let Some(marker_file) = filename_of(f) {
                if current_file.as_ref() != Some(&marker_file) {
                    debug!("step out lands above render of {}", marker_file.display());
                    return f.caller();
                }
            }
        }
        current = f.caller();
    }

    last_marker.unwrap_or(frame).caller()
}
