pub mod file;

use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Deserialise command input from `--input <file>` or, failing that, piped
/// stdin. `what` names the computation in the error when neither is given.
pub fn read_input<T: DeserializeOwned>(
    path: Option<&str>,
    what: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return file::read_json(path);
    }
    match read_piped_stdin()? {
        Some(body) => Ok(serde_json::from_str(&body)
            .map_err(|e| format!("Failed to parse {what} input from stdin: {e}"))?),
        None => Err(format!("--input <file.json> or stdin required for {what}").into()),
    }
}

/// Piped stdin, or `None` when stdin is a terminal or blank.
fn read_piped_stdin() -> io::Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    tracing::debug!(bytes = trimmed.len(), "read input from stdin");
    Ok(Some(trimmed.to_owned()))
}
