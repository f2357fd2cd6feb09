//! Detection of queries that need precise computation
//!
//! The query pipeline calls this before synthesizing any code; a query that
//! does not need computation is answered by retrieval alone. Code synthesis
//! itself happens upstream and is not part of this crate.

/// Keywords that signal a request for exact calculation
const COMPUTE_KEYWORDS: &[&str] = &[
    "calculate",
    "compute",
    "computation",
    "exact result",
    "exact number",
    "numeric precision",
    "run code",
    "execute",
    "python",
    "algorithm",
    "decimal",
    "statistics",
    "formula",
    "equation",
    "factorial",
    "square root",
    "logarithm",
    "average",
    "mean",
    "median",
    "mode",
    "standard deviation",
    "probability",
    "percentage",
];

/// Decide whether a natural-language query requires code execution
pub fn needs_computation(query: &str) -> bool {
    let lower = query.to_lowercase();

    if COMPUTE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return true;
    }

    has_arithmetic_expression(&lower)
}

/// Scan for `<number> <operator> <number>` or `<number>%` patterns
fn has_arithmetic_expression(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let mut j = i;
            while j < chars.len() && chars[j] == ' ' {
                j += 1;
            }
            if j < chars.len() {
                let op = chars[j];
                if op == '%' {
                    return true;
                }
                if matches!(op, '+' | '-' | '*' | '/' | '^') {
                    let mut k = j + 1;
                    while k < chars.len() && chars[k] == ' ' {
                        k += 1;
                    }
                    if k < chars.len() && chars[k].is_ascii_digit() {
                        return true;
                    }
                }
            }
        } else {
            i += 1;
        }
    }

    false
}
