use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LyricsError {
    /// Text carries timestamp markers but no line could be parsed.
    #[error("Malformed lyrics: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, LyricsError>;
