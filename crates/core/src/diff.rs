//! Line and token alignment between two text blobs.
//!
//! The edit script comes from `diffy` (Myers). On top of it this module
//! detects moved blocks and separates whitespace-only edits from real ones.
//! Line indices are 0-based internally; [`line_span`] renders them 1-based.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;

use diffy::{DiffOptions, Line};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::AnalysisError;
use crate::models::ChangeStats;

/// Minimum number of lines a relocated run needs to count as a moved block.
pub const DEFAULT_MIN_MOVED_LINES: usize = 3;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One step of the edit script. Every variant carries both ranges; the
/// range on the untouched side is empty and marks the position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffOp {
    Equal { old: Range<usize>, new: Range<usize> },
    Delete { old: Range<usize>, new: Range<usize> },
    Insert { old: Range<usize>, new: Range<usize> },
    Replace { old: Range<usize>, new: Range<usize> },
}

impl DiffOp {
    pub fn old_range(&self) -> Range<usize> {
        match self {
            Self::Equal { old, .. }
            | Self::Delete { old, .. }
            | Self::Insert { old, .. }
            | Self::Replace { old, .. } => old.clone(),
        }
    }

    pub fn new_range(&self) -> Range<usize> {
        match self {
            Self::Equal { new, .. }
            | Self::Delete { new, .. }
            | Self::Insert { new, .. }
            | Self::Replace { new, .. } => new.clone(),
        }
    }

    pub fn is_equal(&self) -> bool {
        matches!(self, Self::Equal { .. })
    }
}

/// A run of lines present verbatim on both sides at different offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovedBlock {
    pub old: Range<usize>,
    pub new: Range<usize>,
}

/// Whether a residual edit changes content or only whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeNature {
    Semantic,
    Whitespace,
}

/// The part of a non-equal op left over after moved lines are removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineChange {
    /// Removed line indices (before side).
    pub old_lines: Vec<usize>,
    /// Added line indices (after side).
    pub new_lines: Vec<usize>,
    pub nature: ChangeNature,
}

/// Full alignment of two texts.
#[derive(Debug, Clone, Default)]
pub struct LineDiff {
    pub ops: Vec<DiffOp>,
    pub moved: Vec<MovedBlock>,
    pub changes: Vec<LineChange>,
    /// The texts differ only in line endings or the trailing newline.
    pub line_endings_only: bool,
}

impl LineDiff {
    /// Align `before` and `after`, treating runs of at least `min_moved`
    /// lines as move candidates.
    pub fn compute(before: &str, after: &str, min_moved: usize) -> Self {
        let old: Vec<&str> = before.lines().collect();
        let new: Vec<&str> = after.lines().collect();
        let ops = edit_script(&old, &new);

        let line_endings_only = before != after && ops.iter().all(DiffOp::is_equal);
        let mut old_moved = vec![false; old.len()];
        let mut new_moved = vec![false; new.len()];
        let min_moved = min_moved.max(1);

        let mut moved = match_moved_windows(&old, &new, &ops, min_moved, &mut old_moved, &mut new_moved);
        moved.extend(match_displaced_runs(&old, &new, &ops, min_moved, &mut old_moved, &mut new_moved));
        moved.sort_by_key(|m| (m.old.start, m.new.start));

        let changes = residual_changes(&old, &new, &ops, &old_moved, &new_moved);
        debug!(
            ops = ops.len(),
            moved = moved.len(),
            changes = changes.len(),
            "line diff computed"
        );

        Self {
            ops,
            moved,
            changes,
            line_endings_only,
        }
    }

    /// Added and deleted line counts over every non-equal op, moved lines
    /// included.
    pub fn stats(&self) -> ChangeStats {
        let (additions, deletions) = self
            .ops
            .iter()
            .filter(|op| !op.is_equal())
            .fold((0, 0), |(a, d), op| (a + op.new_range().len(), d + op.old_range().len()));
        ChangeStats::new(additions, deletions)
    }

    /// No op other than `Equal` was produced.
    pub fn is_unchanged(&self) -> bool {
        self.ops.iter().all(DiffOp::is_equal)
    }
}

// ---------------------------------------------------------------------------
// Edit script
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Step {
    Equal,
    Delete,
    Insert,
}

/// Line-level edit script between two sequences of single-line items.
pub fn edit_script(old: &[&str], new: &[&str]) -> Vec<DiffOp> {
    let mut steps = Vec::with_capacity(old.len().max(new.len()));

    if old != new {
        let old_text = as_text(old);
        let new_text = as_text(new);
        // Context wide enough to fold every change into a single hunk that
        // spans both files from the first line.
        let mut options = DiffOptions::new();
        options.set_context_len(old.len() + new.len() + 1);
        let patch = options.create_patch(&old_text, &new_text);

        let mut consumed_old = 0;
        for hunk in patch.hunks() {
            let hunk_start = hunk.old_range().start().saturating_sub(1);
            while consumed_old < hunk_start {
                steps.push(Step::Equal);
                consumed_old += 1;
            }
            for line in hunk.lines() {
                match line {
                    Line::Context(_) => {
                        steps.push(Step::Equal);
                        consumed_old += 1;
                    }
                    Line::Delete(_) => {
                        steps.push(Step::Delete);
                        consumed_old += 1;
                    }
                    Line::Insert(_) => steps.push(Step::Insert),
                }
            }
        }
        while consumed_old < old.len() {
            steps.push(Step::Equal);
            consumed_old += 1;
        }
    } else {
        steps.resize(old.len(), Step::Equal);
    }

    group_steps(&steps)
}

fn as_text(items: &[&str]) -> String {
    let mut text = String::with_capacity(items.iter().map(|l| l.len() + 1).sum());
    for item in items {
        text.push_str(item);
        text.push('\n');
    }
    text
}

/// Collapse single-line steps into ranged ops.
fn group_steps(steps: &[Step]) -> Vec<DiffOp> {
    let mut ops = Vec::new();
    let (mut o, mut n) = (0usize, 0usize);
    let mut i = 0;

    while i < steps.len() {
        if steps[i] == Step::Equal {
            let (o0, n0) = (o, n);
            while i < steps.len() && steps[i] == Step::Equal {
                o += 1;
                n += 1;
                i += 1;
            }
            ops.push(DiffOp::Equal { old: o0..o, new: n0..n });
            continue;
        }

        let (o0, n0) = (o, n);
        while i < steps.len() && steps[i] != Step::Equal {
            match steps[i] {
                Step::Delete => o += 1,
                Step::Insert => n += 1,
                Step::Equal => unreachable!(),
            }
            i += 1;
        }
        let (old, new) = (o0..o, n0..n);
        ops.push(match (old.is_empty(), new.is_empty()) {
            (false, true) => DiffOp::Delete { old, new },
            (true, false) => DiffOp::Insert { old, new },
            _ => DiffOp::Replace { old, new },
        });
    }

    ops
}

// ---------------------------------------------------------------------------
// Move detection
// ---------------------------------------------------------------------------

fn window_hash(lines: &[&str]) -> u64 {
    let mut hasher = DefaultHasher::new();
    lines.hash(&mut hasher);
    hasher.finish()
}

fn is_blank_run(lines: &[&str]) -> bool {
    lines.iter().all(|l| l.trim().is_empty())
}

/// Match `min`-line windows of deleted runs against inserted runs and extend
/// each hit as far as the surrounding runs allow.
fn match_moved_windows(
    old: &[&str],
    new: &[&str],
    ops: &[DiffOp],
    min: usize,
    old_moved: &mut [bool],
    new_moved: &mut [bool],
) -> Vec<MovedBlock> {
    let deleted: Vec<Range<usize>> = ops
        .iter()
        .filter(|op| !op.is_equal())
        .map(DiffOp::old_range)
        .filter(|r| r.len() >= min)
        .collect();
    let inserted: Vec<Range<usize>> = ops
        .iter()
        .filter(|op| !op.is_equal())
        .map(DiffOp::new_range)
        .filter(|r| r.len() >= min)
        .collect();
    if deleted.is_empty() || inserted.is_empty() {
        return Vec::new();
    }

    let mut segment_end = vec![0usize; new.len()];
    let mut index: HashMap<u64, Vec<usize>> = HashMap::new();
    for seg in &inserted {
        for k in seg.clone() {
            segment_end[k] = seg.end;
        }
        for start in seg.start..=seg.end - min {
            index.entry(window_hash(&new[start..start + min])).or_default().push(start);
        }
    }

    let mut blocks = Vec::new();
    for seg in &deleted {
        let mut s = seg.start;
        while s + min <= seg.end {
            let window = &old[s..s + min];
            if old_moved[s] || is_blank_run(window) {
                s += 1;
                continue;
            }
            let hit = index.get(&window_hash(window)).and_then(|starts| {
                starts.iter().copied().find(|&t| {
                    (t..t + min).all(|k| !new_moved[k]) && &new[t..t + min] == window
                })
            });
            let Some(t) = hit else {
                s += 1;
                continue;
            };

            let mut len = min;
            while s + len < seg.end
                && t + len < segment_end[t]
                && !old_moved[s + len]
                && !new_moved[t + len]
                && old[s + len] == new[t + len]
            {
                len += 1;
            }
            old_moved[s..s + len].iter_mut().for_each(|m| *m = true);
            new_moved[t..t + len].iter_mut().for_each(|m| *m = true);
            blocks.push(MovedBlock {
                old: s..s + len,
                new: t..t + len,
            });
            s += len;
        }
    }
    blocks
}

/// A short run deleted on one side of an equal run and re-inserted verbatim
/// on the other means the equal run itself was relocated.
fn match_displaced_runs(
    old: &[&str],
    new: &[&str],
    ops: &[DiffOp],
    min: usize,
    old_moved: &mut [bool],
    new_moved: &mut [bool],
) -> Vec<MovedBlock> {
    let mut blocks = Vec::new();
    for (i, op) in ops.iter().enumerate() {
        let DiffOp::Delete { old: del, .. } = op else {
            continue;
        };
        if del.clone().any(|k| old_moved[k]) {
            continue;
        }
        let candidates = [i.checked_sub(2), i.checked_add(2)];
        for j in candidates.into_iter().flatten() {
            let (Some(DiffOp::Insert { new: ins, .. }), Some(DiffOp::Equal { old: eq_old, new: eq_new })) =
                (ops.get(j), ops.get((i + j) / 2))
            else {
                continue;
            };
            if eq_old.len() < min
                || is_blank_run(&old[del.clone()])
                || ins.clone().any(|k| new_moved[k])
                || old[del.clone()] != new[ins.clone()]
            {
                continue;
            }
            old_moved[del.clone()].iter_mut().for_each(|m| *m = true);
            new_moved[ins.clone()].iter_mut().for_each(|m| *m = true);
            blocks.push(MovedBlock {
                old: eq_old.clone(),
                new: eq_new.clone(),
            });
            break;
        }
    }
    blocks
}

// ---------------------------------------------------------------------------
// Residual edits
// ---------------------------------------------------------------------------

fn residual_changes(
    old: &[&str],
    new: &[&str],
    ops: &[DiffOp],
    old_moved: &[bool],
    new_moved: &[bool],
) -> Vec<LineChange> {
    ops.iter()
        .filter(|op| !op.is_equal())
        .filter_map(|op| {
            let old_lines: Vec<usize> = op.old_range().filter(|&k| !old_moved[k]).collect();
            let new_lines: Vec<usize> = op.new_range().filter(|&k| !new_moved[k]).collect();
            if old_lines.is_empty() && new_lines.is_empty() {
                return None;
            }
            let blank_only = old_lines
                .iter()
                .map(|&a| old[a])
                .chain(new_lines.iter().map(|&b| new[b]))
                .all(|l| l.trim().is_empty());
            let whitespace_only = blank_only
                || (old_lines.len() == new_lines.len()
                    && old_lines
                        .iter()
                        .zip(&new_lines)
                        .all(|(&a, &b)| same_tokens(old[a], new[b])));
            Some(LineChange {
                old_lines,
                new_lines,
                nature: if whitespace_only {
                    ChangeNature::Whitespace
                } else {
                    ChangeNature::Semantic
                },
            })
        })
        .collect()
}

/// Two texts that differ only in whitespace. Applied to whole files this
/// also accepts reflowed lines.
pub fn same_tokens(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

// ---------------------------------------------------------------------------
// Token alignment
// ---------------------------------------------------------------------------

/// Split a line into identifier/number runs and single punctuation marks.
pub fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start: Option<usize> = None;
    for (i, ch) in line.char_indices() {
        let is_word = ch.is_alphanumeric() || ch == '_';
        if is_word {
            start.get_or_insert(i);
            continue;
        }
        if let Some(s) = start.take() {
            tokens.push(&line[s..i]);
        }
        if !ch.is_whitespace() {
            tokens.push(&line[i..i + ch.len_utf8()]);
        }
    }
    if let Some(s) = start {
        tokens.push(&line[s..]);
    }
    tokens
}

/// Tokens removed from `old` and added in `new`, in order.
pub fn token_diff<'a>(old: &'a str, new: &'a str) -> (Vec<&'a str>, Vec<&'a str>) {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);
    let mut removed = Vec::new();
    let mut added = Vec::new();
    for op in edit_script(&old_tokens, &new_tokens) {
        if op.is_equal() {
            continue;
        }
        removed.extend(op.old_range().map(|k| old_tokens[k]));
        added.extend(op.new_range().map(|k| new_tokens[k]));
    }
    (removed, added)
}

// ---------------------------------------------------------------------------
// Content helpers
// ---------------------------------------------------------------------------

/// Decode raw file content as text, rejecting binary data.
pub fn decode<'a>(bytes: &'a [u8], side: &'static str) -> Result<&'a str, AnalysisError> {
    if let Some(offset) = bytes.iter().position(|b| *b == 0) {
        return Err(AnalysisError::UnsupportedContent {
            side,
            detail: format!("NUL byte at offset {offset}"),
        });
    }
    std::str::from_utf8(bytes).map_err(|e| AnalysisError::UnsupportedContent {
        side,
        detail: format!("invalid UTF-8 after byte {}", e.valid_up_to()),
    })
}

/// Hex SHA-256 of raw content.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Render 0-based line indices as a 1-based `line N` / `lines N-M` label.
pub fn line_span(lines: &[usize]) -> String {
    match (lines.iter().min(), lines.iter().max()) {
        (Some(a), Some(b)) if a == b => format!("line {}", a + 1),
        (Some(a), Some(b)) => format!("lines {}-{}", a + 1, b + 1),
        _ => "(none)".to_string(),
    }
}

/// Render a 0-based half-open range as a 1-based label.
pub fn range_label(range: &Range<usize>) -> String {
    let lines: Vec<usize> = range.clone().collect();
    line_span(&lines)
}
