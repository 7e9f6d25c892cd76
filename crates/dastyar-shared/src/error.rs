use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedError {
    #[error("Unsupported language: {0}")]
    UnknownLanguage(String),

    #[error("Unsupported theme: {0}")]
    UnknownTheme(String),

    #[error("Unsupported message role: {0}")]
    UnknownRole(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}
