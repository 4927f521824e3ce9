pub const DEFAULT_DIFF_CONTEXT_LINES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditKind {
    Keep,
    Delete,
    Insert,
}

#[derive(Debug)]
struct Edit<'a> {
    kind: EditKind,
    text: &'a str,
}

/// Renders the change from `old_text` to `new_text` as unified-diff hunks
/// with `context_lines` of surrounding context. Used for edit-tool headers.
pub fn format_unified_diff(old_text: &str, new_text: &str, context_lines: usize) -> String {
    let old_lines: Vec<&str> = split_lines(old_text);
    let new_lines: Vec<&str> = split_lines(new_text);
    let edits = diff_lines(&old_lines, &new_lines);

    if !edits.iter().any(|e| e.kind != EditKind::Keep) {
        return "(no changes)\n".to_string();
    }

    let mut out = String::new();
    for (start, end) in hunk_ranges(&edits, context_lines) {
        let (old_start, new_start) = hunk_origin(&edits, start);
        let old_count = edits[start..end]
            .iter()
            .filter(|e| e.kind != EditKind::Insert)
            .count();
        let new_count = edits[start..end]
            .iter()
            .filter(|e| e.kind != EditKind::Delete)
            .count();
        out.push_str(&format!(
            "@@ -{old_start},{old_count} +{new_start},{new_count} @@\n"
        ));
        for edit in &edits[start..end] {
            let prefix = match edit.kind {
                EditKind::Keep => ' ',
                EditKind::Delete => '-',
                EditKind::Insert => '+',
            };
            out.push(prefix);
            out.push_str(edit.text);
            out.push('\n');
        }
    }
    out
}

fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.lines().collect()
    }
}

/// Longest-common-subsequence line diff. The matched prefix and suffix are
/// peeled off first so the quadratic table only covers the changed middle.
fn diff_lines<'a>(old_lines: &[&'a str], new_lines: &[&'a str]) -> Vec<Edit<'a>> {
    let common_prefix = old_lines
        .iter()
        .zip(new_lines.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let max_suffix = old_lines.len().min(new_lines.len()) - common_prefix;
    let common_suffix = old_lines
        .iter()
        .rev()
        .zip(new_lines.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old_lines[common_prefix..old_lines.len() - common_suffix];
    let new_mid = &new_lines[common_prefix..new_lines.len() - common_suffix];

    let mut edits: Vec<Edit<'a>> = old_lines[..common_prefix]
        .iter()
        .map(|text| Edit {
            kind: EditKind::Keep,
            text,
        })
        .collect();
    edits.extend(diff_middle(old_mid, new_mid));
    edits.extend(old_lines[old_lines.len() - common_suffix..].iter().map(
        |text| Edit {
            kind: EditKind::Keep,
            text,
        },
    ));
    edits
}

fn diff_middle<'a>(old_mid: &[&'a str], new_mid: &[&'a str]) -> Vec<Edit<'a>> {
    let rows = old_mid.len();
    let cols = new_mid.len();
    let mut table = vec![vec![0usize; cols + 1]; rows + 1];
    for i in (0..rows).rev() {
        for j in (0..cols).rev() {
            table[i][j] = if old_mid[i] == new_mid[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(rows + cols);
    let (mut i, mut j) = (0, 0);
    while i < rows && j < cols {
        if old_mid[i] == new_mid[j] {
            edits.push(Edit {
                kind: EditKind::Keep,
                text: old_mid[i],
            });
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            edits.push(Edit {
                kind: EditKind::Delete,
                text: old_mid[i],
            });
            i += 1;
        } else {
            edits.push(Edit {
                kind: EditKind::Insert,
                text: new_mid[j],
            });
            j += 1;
        }
    }
    for text in &old_mid[i..] {
        edits.push(Edit {
            kind: EditKind::Delete,
            text,
        });
    }
    for text in &new_mid[j..] {
        edits.push(Edit {
            kind: EditKind::Insert,
            text,
        });
    }
    edits
}

fn hunk_ranges(edits: &[Edit<'_>], context_lines: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (index, edit) in edits.iter().enumerate() {
        if edit.kind == EditKind::Keep {
            continue;
        }
        let start = index.saturating_sub(context_lines);
        let end = (index + context_lines + 1).min(edits.len());
        match ranges.last_mut() {
            Some((_, prev_end)) if start <= *prev_end => *prev_end = (*prev_end).max(end),
            _ => ranges.push((start, end)),
        }
    }
    ranges
}

/// 1-based old/new line numbers at which a hunk begins.
fn hunk_origin(edits: &[Edit<'_>], start: usize) -> (usize, usize) {
    let mut old_line = 1usize;
    let mut new_line = 1usize;
    for edit in &edits[..start] {
        match edit.kind {
            EditKind::Keep => {
                old_line += 1;
                new_line += 1;
            }
            EditKind::Delete => old_line += 1,
            EditKind::Insert => new_line += 1,
        }
    }
    (old_line, new_line)
}
