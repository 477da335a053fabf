//! Content platform tools.

use std::io::Write;

use threadline_core::cms::SCHEMA;

use super::CommandError;

/// Print the document schema descriptor as pretty JSON on stdout.
///
/// # Errors
///
/// Returns `CommandError` if stdout cannot be written.
pub fn schema() -> Result<(), CommandError> {
    let json = serde_json::to_string_pretty(SCHEMA)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").map_err(|source| CommandError::Io {
        path: "stdout".to_string(),
        source,
    })?;
    Ok(())
}
