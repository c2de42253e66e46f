// Line diff for failure output. LCS over lines; no hunk headers.

/// Above this many line pairs the LCS table is skipped and both sides are
/// printed whole.
const MAX_CELLS: usize = 1_000_000;

pub fn unified(expected: &str, actual: &str) -> String {
    let left: Vec<&str> = expected.lines().collect();
    let right: Vec<&str> = actual.lines().collect();

    let mut out = String::from("--- expected\n+++ actual\n");
    for (tag, line) in diff_lines(&left, &right) {
        out.push(tag);
        out.push_str(line);
        out.push('\n');
    }
    out
}

fn diff_lines<'a>(left: &[&'a str], right: &[&'a str]) -> Vec<(char, &'a str)> {
    let (n, m) = (left.len(), right.len());
    if n.saturating_mul(m) > MAX_CELLS {
        let mut ops: Vec<(char, &str)> = left.iter().map(|l| ('-', *l)).collect();
        ops.extend(right.iter().map(|r| ('+', *r)));
        return ops;
    }

    // lcs[i][j] = LCS length of left[i..] and right[j..]
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if left[i] == right[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if left[i] == right[j] {
            ops.push((' ', left[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push(('-', left[i]));
            i += 1;
        } else {
            ops.push(('+', right[j]));
            j += 1;
        }
    }
    ops.extend(left[i..].iter().map(|l| ('-', *l)));
    ops.extend(right[j..].iter().map(|r| ('+', *r)));
    ops
}
