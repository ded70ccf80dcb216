use camino::Utf8PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TrackerError {
    #[error("invalid thing id: {0}")]
    InvalidThingId(String),

    #[error("could not read: {0}")]
    InputRead(Utf8PathBuf),

    #[error("could not parse as JSON: {path}: {message}")]
    InputSyntax { path: Utf8PathBuf, message: String },

    #[error("JSON is not valid: {path}\n{}", .violations.join("\n"))]
    #[diagnostic(help("fix the listed fields and re-run"))]
    InputSchema {
        path: Utf8PathBuf,
        violations: Vec<String>,
    },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("unable to guess base URL for {0}")]
    #[diagnostic(help("pass --base with the URL that thing-local paths live under"))]
    BaseUnresolved(String),

    #[error("failed to stage {reference}: {message}")]
    AssetCopy { reference: String, message: String },

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("thumbnail render failed for {source_path}: {message}")]
    Render {
        source_path: Utf8PathBuf,
        message: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
