//! Input validation and JSON output shared by the commands.

use std::io::Write;

use camino::Utf8Path;
use serde::Serialize;

use crate::CliError;

/// Fail unless `path` names an existing regular file.
pub(crate) fn require_file(path: &Utf8Path, field: &'static str) -> Result<(), CliError> {
    match waypost_fs::file_is_file(path) {
        Ok(true) => Ok(()),
        Ok(false) => Err(CliError::SourcePathNotFile {
            field,
            path: path.to_path_buf(),
        }),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
            Err(CliError::MissingSourceFile {
                field,
                path: path.to_path_buf(),
            })
        }
        Err(source) => Err(CliError::InspectSourcePath {
            field,
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Read a UTF-8 input file.
pub(crate) fn read_input(path: &Utf8Path) -> Result<String, CliError> {
    waypost_fs::read_to_string(path).map_err(|source| CliError::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `value` as pretty JSON to `output` when given, else to `writer`.
pub(crate) fn emit_json<T: Serialize>(
    value: &T,
    output: Option<&Utf8Path>,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let mut payload = serde_json::to_vec_pretty(value).map_err(CliError::SerialiseOutput)?;
    payload.push(b'\n');
    match output {
        Some(path) => waypost_fs::write_file(path, &payload).map_err(CliError::WriteOutput),
        None => writer.write_all(&payload).map_err(CliError::WriteOutput),
    }
}
