use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CliError;

pub fn read_opt_value(
    val: Option<String>,
    file: Option<PathBuf>,
) -> Result<Option<String>, CliError> {
    if let Some(path) = file {
        let data = fs::read_to_string(&path).map_err(|source| CliError::InputFile {
            path: path.display().to_string(),
            source,
        })?;
        return Ok(Some(data));
    }
    Ok(val)
}

pub fn read_token(path: &Path) -> Result<String, CliError> {
    let token = fs::read_to_string(path).map_err(CliError::TokenFile)?;
    Ok(token.trim().to_string())
}

pub fn write_token(path: &Path, token: &str) -> Result<(), CliError> {
    fs::write(path, format!("{token}\n")).map_err(CliError::TokenFile)
}
