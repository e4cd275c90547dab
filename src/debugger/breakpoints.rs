use log::info;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Line breakpoints in template files.
///
/// A breakpoint path matches a template when it is equal to the template's
/// filename or a trailing part of it, so `page.tmpl` matches
/// `/srv/site/templates/page.tmpl`.
#[derive(Debug, Default, Clone)]
pub struct Breakpoints {
    points: BTreeMap<PathBuf, BTreeSet<usize>>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, file: impl Into<PathBuf>, line: usize) {
        let file = file.into();
        info!("breakpoint set at {}:{}", file.display(), line);
        self.points.entry(file).or_default().insert(line);
    }

    /// Returns whether a breakpoint was removed.
    pub fn remove(&mut self, file: &Path, line: usize) -> bool {
        let Some(lines) = self.points.get_mut(file) else {
            return false;
        };
        let removed = lines.remove(&line);
        if lines.is_empty() {
            self.points.remove(file);
        }
        if removed {
            info!("breakpoint removed from {}:{}", file.display(), line);
        }
        removed
    }

    pub fn contains(&self, filename: &Path, line: usize) -> bool {
        self.points
            .iter()
            .any(|(file, lines)| filename.ends_with(file) && lines.contains(&line))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, usize)> {
        self.points
            .iter()
            .flat_map(|(file, lines)| lines.iter().map(move |line| (file.as_path(), *line)))
    }
}
