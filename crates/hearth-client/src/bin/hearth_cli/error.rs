use hearth_client::ClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("server URL is required (use --server or HEARTH_SERVER_URL)")]
    MissingServer,
    #[error("failed to access token file: {0}")]
    TokenFile(std::io::Error),
    #[error("failed to read input file {path}: {source}")]
    InputFile {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to render output: {0}")]
    Render(serde_json::Error),
    #[error(transparent)]
    Client(#[from] ClientError),
}
