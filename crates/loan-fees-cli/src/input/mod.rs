pub mod file;
pub mod stdin;

use serde::de::DeserializeOwned;

/// Read a typed document from `--input <file>`, falling back to piped stdin.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_document(path);
    }
    stdin::read_stdin()?
        .ok_or_else(|| format!("{what} is required (provide --input or pipe JSON on stdin)").into())
}
