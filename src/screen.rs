//! Static safety screen applied before execution
//!
//! Scans submitted code for imports and calls that would let it reach
//! outside the sandbox. The screen is a cheap first gate, not the isolation
//! boundary itself; anything it misses is still confined by the process
//! sandbox. A rejected request never creates a session.

/// Modules that allow process or host escape, always denied
const DENIED_MODULES: &[&str] = &["os", "subprocess", "sys", "shutil", "ctypes"];

/// Modules that reach the network, denied unless the request grants the
/// network capability
const NETWORK_MODULES: &[&str] = &[
    "socket",
    "requests",
    "urllib",
    "ftplib",
    "telnetlib",
    "smtplib",
    "http",
    "socketserver",
];

/// Builtins that defeat static inspection
const DENIED_FUNCTIONS: &[&str] = &[
    "eval", "exec", "compile", "globals", "locals", "getattr", "setattr", "delattr", "input",
];

/// Check code text against the deny lists.
///
/// Returns `Err(reason)` when the code must be rejected.
pub fn check(code: &str, allow_network: bool) -> Result<(), String> {
    for line in code.lines() {
        for module in imported_roots(line) {
            if is_denied_module(module, allow_network) {
                return Err(format!("import of denied module: {}", module));
            }
        }
    }

    for (word, prev, next) in identifiers(code) {
        if word.starts_with("__") && word.ends_with("__") && word.len() > 4 {
            return Err(format!("dunder access: {}", word));
        }

        if next == Some('(') && DENIED_FUNCTIONS.contains(&word) {
            return Err(format!("call to denied builtin: {}", word));
        }

        if next == Some('.') && prev != Some('.') && is_denied_module(word, allow_network) {
            return Err(format!("use of denied module: {}", word));
        }
    }

    Ok(())
}

fn is_denied_module(name: &str, allow_network: bool) -> bool {
    if DENIED_MODULES.contains(&name) {
        return true;
    }
    !allow_network && NETWORK_MODULES.contains(&name)
}

/// Extract the root module names from an `import`/`from` statement
fn imported_roots(line: &str) -> Vec<&str> {
    let trimmed = line.trim_start();

    let rest = if let Some(rest) = trimmed.strip_prefix("import ") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("from ") {
        rest
    } else {
        return Vec::new();
    };

    // "import a.b as x, c" names the roots a and c; "from a.b import x"
    // names only a
    rest.split(',')
        .filter_map(|segment| {
            let first = segment.trim().split([' ', '\t']).next()?;
            let root = first.split('.').next()?;
            if root.is_empty() {
                None
            } else {
                Some(root)
            }
        })
        .collect()
}

/// Iterate identifiers with the characters immediately before and after
fn identifiers(code: &str) -> Vec<(&str, Option<char>, Option<char>)> {
    let bytes = code.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len() {
                let c = bytes[i] as char;
                if c.is_ascii_alphanumeric() || c == '_' {
                    i += 1;
                } else {
                    break;
                }
            }
            let prev = if start > 0 {
                Some(bytes[start - 1] as char)
            } else {
                None
            };
            let next = code[i..].chars().find(|c| !c.is_whitespace());
            out.push((&code[start..i], prev, next));
        } else {
            i += 1;
        }
    }

    out
}
