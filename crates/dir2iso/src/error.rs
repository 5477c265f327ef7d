use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
  #[error("walkdir error: {0}")]
  WalkDir(#[from] walkdir::Error),
  #[error("Failed to read source entry {}: {source}", .path.display())]
  SourceRead {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("Directory record for {identifier:?} would be {length} bytes long (maximum is 255)")]
  RecordTooLong { identifier: String, length: usize },
  #[error("{field} {value:?} does not fit in {width} bytes")]
  IdentifierTooLong {
    field: &'static str,
    value: String,
    width: usize,
  },
  #[error("Invalid date: {0}")]
  InvalidDate(String),
  #[error("Layout error: {0}")]
  Layout(String),
  #[error("Conversion cancelled")]
  Cancelled,
}

impl Error {
  pub(crate) fn source_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::SourceRead {
      path: path.into(),
      source,
    }
  }

  pub(crate) fn layout(message: impl Into<String>) -> Self {
    Self::Layout(message.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
