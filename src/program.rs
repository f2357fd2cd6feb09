//! Assembly of the Python program executed inside a session
//!
//! The submitted snippet is prepended with a preamble of pre-approved
//! imports plus a `set_result` helper that serializes a value to the
//! return channel, a well-known file in the scratch directory.

/// File name of the script written into the scratch directory
pub const SOURCE_FILE: &str = "main.py";

/// File name of the return channel inside the scratch directory
pub const RESULT_FILE: &str = "__result__.json";

/// Imports every snippet may assume, mirroring the toolkit generated code
/// is told it can use
pub const DEFAULT_IMPORTS: &[&str] = &[
    "math",
    "random",
    "statistics",
    "re",
    "collections",
    "datetime",
    "json",
];

/// Build the full program text: preamble, return-channel helper, user code
pub fn assemble(code: &str, imports: &[String]) -> String {
    let mut program = String::new();

    for module in imports {
        program.push_str("import ");
        program.push_str(module);
        program.push('\n');
    }

    program.push_str("import json as _json\n");
    program.push('\n');
    program.push_str("def set_result(value):\n");
    program.push_str(&format!(
        "    with open(\"{}\", \"w\") as _f:\n",
        RESULT_FILE
    ));
    program.push_str("        _json.dump(value, _f)\n");
    program.push('\n');
    program.push_str(code);
    program.push('\n');

    program
}

/// The default import list as owned strings, for configuration defaults
pub fn default_imports() -> Vec<String> {
    DEFAULT_IMPORTS.iter().map(|s| s.to_string()).collect()
}
