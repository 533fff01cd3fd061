//! Unified diff generation. A small line-based LCS diff, framed as
//! `---`/`+++`/`@@` hunks with 3 lines of context, matching the shape
//! produced by standard `diff -u`.

const CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

fn lcs_ops(old: &[&str], new: &[&str]) -> Vec<(Op, usize, usize)> {
    let n = old.len();
    let m = new.len();
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if old[i] == new[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut ops = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push((Op::Equal, i, j));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            ops.push((Op::Delete, i, j));
            i += 1;
        } else {
            ops.push((Op::Insert, i, j));
            j += 1;
        }
    }
    while i < n {
        ops.push((Op::Delete, i, j));
        i += 1;
    }
    while j < m {
        ops.push((Op::Insert, i, j));
        j += 1;
    }
    ops
}

/// Produces a unified diff of `old_content` -> `new_content` for display
/// under `path`. Returns an empty string if the contents are identical.
pub fn unified_diff(path: &str, old_content: &str, new_content: &str) -> String {
    if old_content == new_content {
        return String::new();
    }

    let old_lines: Vec<&str> = old_content.lines().collect();
    let new_lines: Vec<&str> = new_content.lines().collect();
    let ops = lcs_ops(&old_lines, &new_lines);

    let mut hunks: Vec<Vec<(Op, usize, usize)>> = Vec::new();
    let mut current: Vec<(Op, usize, usize)> = Vec::new();
    let mut gap_since_change = 0usize;

    for op in ops {
        match op.0 {
            Op::Equal => {
                if !current.is_empty() {
                    current.push(op);
                    gap_since_change += 1;
                    if gap_since_change > CONTEXT * 2 {
                        let trim = gap_since_change - CONTEXT;
                        current.truncate(current.len() - trim);
                        hunks.push(std::mem::take(&mut current));
                        gap_since_change = 0;
                    }
                }
            }
            _ => {
                gap_since_change = 0;
                current.push(op);
            }
        }
    }
    if current.iter().any(|(op, _, _)| *op != Op::Equal) {
        hunks.push(current);
    }

    let mut out = format!("--- a/{path}\n+++ b/{path}\n");
    for hunk in hunks {
        out.push_str(&render_hunk(&hunk, &old_lines, &new_lines));
    }
    out
}

fn render_hunk(hunk: &[(Op, usize, usize)], old_lines: &[&str], new_lines: &[&str]) -> String {
    // Trim leading pure-equal context beyond CONTEXT lines.
    let first_change = hunk.iter().position(|(op, _, _)| *op != Op::Equal).unwrap_or(0);
    let start = first_change.saturating_sub(CONTEXT);
    let body = &hunk[start..];

    let old_start = body.iter().find_map(|(op, i, _)| {
        if *op != Op::Insert {
            Some(*i)
        } else {
            None
        }
    });
    let new_start = body.iter().find_map(|(op, _, j)| {
        if *op != Op::Delete {
            Some(*j)
        } else {
            None
        }
    });

    let old_start = old_start.unwrap_or(0);
    let new_start = new_start.unwrap_or(0);
    let old_count = body.iter().filter(|(op, _, _)| *op != Op::Insert).count();
    let new_count = body.iter().filter(|(op, _, _)| *op != Op::Delete).count();

    let mut out = format!(
        "@@ -{},{} +{},{} @@\n",
        old_start + 1,
        old_count,
        new_start + 1,
        new_count
    );
    for (op, i, j) in body {
        match op {
            Op::Equal => out.push_str(&format!(" {}\n", old_lines[*i])),
            Op::Delete => out.push_str(&format!("-{}\n", old_lines[*i])),
            Op::Insert => out.push_str(&format!("+{}\n", new_lines[*j])),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_has_no_diff() {
        assert_eq!(unified_diff("a.txt", "same\n", "same\n"), "");
    }

    #[test]
    fn single_line_change_is_framed_correctly() {
        let diff = unified_diff("a.txt", "one\ntwo\nthree\n", "one\nTWO\nthree\n");
        assert!(diff.starts_with("--- a/a.txt\n+++ b/a.txt\n"));
        assert!(diff.contains("@@"));
        assert!(diff.contains("-two"));
        assert!(diff.contains("+TWO"));
    }
}
