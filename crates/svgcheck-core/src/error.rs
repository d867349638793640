use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: XML parse error: {message}")]
    Xml { file: String, message: String },

    #[error("{file}:{line}: unable to include '{href}': {reason}")]
    Include {
        file: String,
        line: u32,
        href: String,
        reason: String,
    },

    #[error("{file}:{line}: include loop detected through '{href}'")]
    IncludeLoop { file: String, line: u32, href: String },

    #[error("invalid repair policy: {0}")]
    Policy(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
