//! Character-level diff-then-delta codec compatible with the `diff-match-patch`
//! delta family: a semicolon-separated sequence of `=N` (keep), `-N` (delete),
//! and `+text` (insert, URL-percent-encoded) operations.
//!
//! The codec is a pure module with no hidden state, per design: [`diff`]
//! produces a [`Delta`] from a base and target string; [`apply`] reproduces
//! the target from the base and the delta, or reports [`DeltaMismatch`] on
//! any parse error or length mismatch.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

const DELTA_ENCODE_SET: &AsciiSet = &CONTROLS.add(b';').add(b'%');

/// An opaque transformation from a base text to a target text. Meaningful
/// only relative to the base it was produced against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta(String);

impl Delta {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Delta {
    fn from(s: String) -> Self {
        Delta(s)
    }
}

/// Delta could not be applied cleanly: a parse error or a length mismatch
/// against the base it was supposedly computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaMismatch;

#[derive(Debug, Clone)]
enum Op {
    Keep(usize),
    Delete(usize),
    Insert(String),
}

/// Computes the delta that transforms `base` into `target`.
pub fn diff(base: &str, target: &str) -> Delta {
    let ops = diff_ops(base, target);
    encode(&ops)
}

/// Applies `delta` to `base`, reproducing the target text it was computed
/// against. Fails with [`DeltaMismatch`] on a malformed delta or one whose
/// keep/delete counts run past the end of `base`.
pub fn apply(base: &str, delta: &Delta) -> Result<String, DeltaMismatch> {
    let base_chars: Vec<char> = base.chars().collect();
    let mut pos = 0usize;
    let mut out = String::new();

    // An empty delta string encodes zero ops (valid only when `base` is
    // itself empty); `"".split(';')` would otherwise yield one spurious
    // empty token, so the loop is skipped entirely and the final length
    // check below rejects a non-empty base on its own.
    if !delta.as_str().is_empty() {
        for token in delta.as_str().split(';') {
            if token.is_empty() {
                return Err(DeltaMismatch);
            }
            let (tag, rest) = token.split_at(1);
            match tag {
                "=" => {
                    let n: usize = rest.parse().map_err(|_| DeltaMismatch)?;
                    let end = pos.checked_add(n).ok_or(DeltaMismatch)?;
                    if end > base_chars.len() {
                        return Err(DeltaMismatch);
                    }
                    out.extend(&base_chars[pos..end]);
                    pos = end;
                }
                "-" => {
                    let n: usize = rest.parse().map_err(|_| DeltaMismatch)?;
                    let end = pos.checked_add(n).ok_or(DeltaMismatch)?;
                    if end > base_chars.len() {
                        return Err(DeltaMismatch);
                    }
                    pos = end;
                }
                "+" => {
                    let decoded = percent_decode_str(rest)
                        .decode_utf8()
                        .map_err(|_| DeltaMismatch)?;
                    out.push_str(&decoded);
                }
                _ => return Err(DeltaMismatch),
            }
        }
    }

    if pos != base_chars.len() {
        return Err(DeltaMismatch);
    }

    Ok(out)
}

fn encode(ops: &[Op]) -> Delta {
    let mut parts = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            Op::Keep(n) => parts.push(format!("={n}")),
            Op::Delete(n) => parts.push(format!("-{n}")),
            Op::Insert(text) => {
                let encoded = utf8_percent_encode(text, DELTA_ENCODE_SET).to_string();
                parts.push(format!("+{encoded}"));
            }
        }
    }
    Delta(parts.join(";"))
}

/// Diffs `base` against `target` at the character level, trimming the
/// common prefix and suffix first and running a classic LCS backtrace over
/// the remaining middle section.
fn diff_ops(base: &str, target: &str) -> Vec<Op> {
    let a: Vec<char> = base.chars().collect();
    let b: Vec<char> = target.chars().collect();

    let mut prefix = 0usize;
    while prefix < a.len() && prefix < b.len() && a[prefix] == b[prefix] {
        prefix += 1;
    }

    let mut suffix = 0usize;
    while suffix < a.len() - prefix
        && suffix < b.len() - prefix
        && a[a.len() - 1 - suffix] == b[b.len() - 1 - suffix]
    {
        suffix += 1;
    }

    let mut ops = Vec::new();
    if prefix > 0 {
        ops.push(Op::Keep(prefix));
    }

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];
    ops.extend(diff_middle(a_mid, b_mid));

    if suffix > 0 {
        ops.push(Op::Keep(suffix));
    }

    coalesce(ops)
}

/// LCS dynamic-programming table, backtraced into a run of Delete/Insert/Keep.
fn diff_middle(a: &[char], b: &[char]) -> Vec<Op> {
    if a.is_empty() && b.is_empty() {
        return Vec::new();
    }
    if a.is_empty() {
        return vec![Op::Insert(b.iter().collect())];
    }
    if b.is_empty() {
        return vec![Op::Delete(a.len())];
    }

    let n = a.len();
    let m = b.len();
    let mut table = vec![0u32; (n + 1) * (m + 1)];
    let idx = |i: usize, j: usize| i * (m + 1) + j;

    for i in 1..=n {
        for j in 1..=m {
            table[idx(i, j)] = if a[i - 1] == b[j - 1] {
                table[idx(i - 1, j - 1)] + 1
            } else {
                table[idx(i - 1, j)].max(table[idx(i, j - 1)])
            };
        }
    }

    // Backtrace from (n, m) to (0, 0), then reverse.
    let mut raw = Vec::new();
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 && a[i - 1] == b[j - 1] {
            raw.push(Op::Keep(1));
            i -= 1;
            j -= 1;
        } else if j > 0 && (i == 0 || table[idx(i, j - 1)] >= table[idx(i - 1, j)]) {
            raw.push(Op::Insert(b[j - 1].to_string()));
            j -= 1;
        } else {
            raw.push(Op::Delete(1));
            i -= 1;
        }
    }
    raw.reverse();
    coalesce(raw)
}

/// Merges adjacent ops of the same kind so the encoded delta stays compact.
fn coalesce(ops: Vec<Op>) -> Vec<Op> {
    let mut out: Vec<Op> = Vec::with_capacity(ops.len());
    for op in ops {
        match (out.last_mut(), op) {
            (Some(Op::Keep(n)), Op::Keep(m)) => *n += m,
            (Some(Op::Delete(n)), Op::Delete(m)) => *n += m,
            (Some(Op::Insert(s)), Op::Insert(t)) => s.push_str(&t),
            (_, op) => out.push(op),
        }
    }
    out
}
