use std::collections::HashSet;
use std::path::PathBuf;

use crate::host::{ActivationRecord, RoutineId};

/// Whether the sub-language frame at `idx` of an innermost-first `stack`
/// should be shown.
///
/// Recursive evaluation of one template leaves several records for the same
/// file on the stack; only the innermost one on each side of a marker
/// (a fresh top-level render) is kept. The scan runs from `idx` toward the
/// innermost record.
pub fn is_visible<F>(
    stack: &[&dyn ActivationRecord],
    idx: usize,
    markers: &HashSet<RoutineId>,
    filename_of: F,
) -> bool
where
    F: Fn(&dyn ActivationRecord) -> Option<PathBuf>,
{
    let Some(frame) = stack.get(idx) else {
        return false;
    };
    let Some(filename) = filename_of(*frame) else {
        return false;
    };

    for inner in stack[..idx].iter().rev() {
        match filename_of(*inner) {
            None if markers.contains(&inner.routine()) => return true,
            None => continue,
            Some(inner_filename) if inner_filename == filename => return false,
            Some(_) => continue,
        }
    }
    true
}
