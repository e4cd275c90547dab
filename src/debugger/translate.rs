//! Translation of node-evaluation frames into template source locations.

use log::debug;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

use super::shapes::ExceptionBinding;
use crate::host::{ActivationRecord, HostType, Value};

/// Where a node came from, as recorded by the engine.
///
/// Offsets refer to the newline-normalized template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeLocation {
    pub filename: PathBuf,
    pub start: usize,
    pub end: usize,
    pub display_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Location {
    /// Byte offsets into the template file as stored on disk
    Span { start: usize, end: usize },
    /// 1-based line number
    Line(usize),
}

impl Location {
    pub fn line(&self) -> Option<usize> {
        match self {
            Location::Line(line) => Some(*line),
            Location::Span { .. } => None,
        }
    }
}

/// A template-level stack entry synthesized from a host activation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualFrame {
    pub filename: PathBuf,
    pub location: Location,
    pub source_snippet: String,
    pub display_name: String,
}

/// Find the node a frame is evaluating and where it came from.
///
/// `template_type` is the engine's compiled template type, used to recover the
/// filename from an enclosing render call when the node has no usable origin.
pub fn locate(
    frame: &dyn ActivationRecord,
    binding: Option<&ExceptionBinding>,
    template_type: Option<&HostType>,
    case_insensitive: bool,
) -> Option<NodeLocation> {
    let (context, node) = match binding.filter(|b| b.routine() == frame.routine()) {
        Some(binding) => binding.extract(frame),
        None => {
            let node = frame.local("self");
            let context = match &node {
                Some(n) if n.has_attr("token") => frame.local("context"),
                _ => None,
            };
            (context, node)
        }
    };

    let node = node?;
    let (filename, start, end) = if context.is_some() {
        let filename = node
            .attr_path(&["origin", "name"])
            .and_then(|v| v.as_str().map(PathBuf::from))
            .filter(|path| path.exists())
            .or_else(|| {
                debug!("node origin unusable, searching enclosing templates");
                template_filename_from_callers(frame, template_type)
            });
        let (start, end) = offsets(&node.attr_path(&["token", "position"])?)?;
        (filename?, start, end)
    } else {
        let source = node.attr("source")?;
        let parts = source.as_list()?;
        let filename = parts.first()?.attr("name")?.as_str().map(PathBuf::from)?;
        let (start, end) = offsets(parts.get(1)?)?;
        (filename, start, end)
    };

    let display_name: String = node
        .to_string()
        .chars()
        .filter(|c| *c != '\n' && *c != '\r')
        .collect();

    Some(NodeLocation {
        filename: normalize_filename(filename, case_insensitive),
        start,
        end,
        display_name,
    })
}

/// Read the template and turn `location` into a virtual frame.
///
/// The engine reports offsets on text with `\r\n` and `\r` folded to `\n`;
/// positions returned here are shifted back onto the file as stored.
pub fn translate(location: NodeLocation, use_positions: bool) -> Option<VirtualFrame> {
    let raw = match fs::read(&location.filename) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("could not read {}: {}", location.filename.display(), e);
            return None;
        }
    };
    let normalized = normalize_newlines(&raw);

    let end = location.end;
    let mut start = location.start;
    if start > normalized.len() {
        debug!(
            "offset {} beyond end of {}",
            start,
            location.filename.display()
        );
        return None;
    }
    while start + 1 < end && normalized.get(start) == Some(&b'\n') {
        start += 1;
    }
    let snippet = normalized
        .get(start..end.min(normalized.len()))
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();

    let location_value = if use_positions {
        Location::Span {
            start: raw_offset(&raw, start),
            end: raw_offset(&raw, end),
        }
    } else {
        Location::Line(1 + normalized[..start].iter().filter(|b| **b == b'\n').count())
    };

    Some(VirtualFrame {
        filename: location.filename,
        location: location_value,
        source_snippet: snippet,
        display_name: location.display_name,
    })
}

/// Offset in `raw` of the byte at `offset` in its normalized text. Each
/// `\r\n` pair is one normalized byte; offsets past the end carry over.
fn raw_offset(raw: &[u8], offset: usize) -> usize {
    let mut raw_idx = 0;
    let mut normalized_idx = 0;
    while normalized_idx < offset && raw_idx < raw.len() {
        raw_idx += if raw[raw_idx..].starts_with(b"\r\n") { 2 } else { 1 };
        normalized_idx += 1;
    }
    raw_idx + (offset - normalized_idx)
}

pub fn normalize_newlines(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().peekable();
    while let Some(&b) = iter.next() {
        if b == b'\r' {
            if iter.peek() == Some(&&b'\n') {
                iter.next();
            }
            out.push(b'\n');
        } else {
            out.push(b);
        }
    }
    out
}

pub fn normalize_filename(filename: PathBuf, case_insensitive: bool) -> PathBuf {
    if case_insensitive {
        PathBuf::from(filename.to_string_lossy().to_lowercase())
    } else {
        filename
    }
}

/// Walk outward for a compiled template's render call and take its origin.
/// Composition through "extends" leaves no such record, so this can miss.
fn template_filename_from_callers(
    frame: &dyn ActivationRecord,
    template_type: Option<&HostType>,
) -> Option<PathBuf> {
    let template_type = template_type?;
    let mut current = Some(frame);
    while let Some(f) = current {
        if let Some(template) = f.local("self").filter(|v| v.is_instance(template_type)) {
            return template
                .attr_path(&["origin", "name"])
                .and_then(|v| v.as_str().map(PathBuf::from));
        }
        current = f.caller();
    }
    None
}

fn offsets(value: &Value) -> Option<(usize, usize)> {
    match value.as_list()? {
        [start, end] => Some((
            usize::try_from(start.as_int()?).ok()?,
            usize::try_from(end.as_int()?).ok()?,
        )),
        _ => None,
    }
}
