use crate::Step;

#[derive(thiserror::Error)]
pub enum Error {
    // std errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    // crate errors
    #[error("io error: {0}")]
    FileIo(#[source] std::io::Error),

    #[error("{step} failed: {reason}")]
    Transform { step: Step, reason: String },

    #[error("{0} is not supported by the installed transforms")]
    Unsupported(Step),

    #[error("cannot derive an MD5 key for \"{0}\" (name is not MD5-shaped and path has no data directory)")]
    Md5KeyUnavailable(String),

    #[error("Attempted to write to \"{0}\" which outside of output directory")]
    WriteOutsideOutput(String),

    #[error("Input does not exist: \"{0}\"")]
    MissingInput(String),

    #[error("{path}: {source}")]
    File {
        path: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Whether the error is confined to the file that raised it. Contained errors
    /// skip the file and the batch carries on, anything else aborts the run.
    pub fn is_contained(&self) -> bool {
        match self {
            Error::Transform { .. }
            | Error::Unsupported(_)
            | Error::Md5KeyUnavailable(_)
            | Error::WriteOutsideOutput(_)
            | Error::FileIo(_) => true,
            Error::File { source, .. } => source.is_contained(),
            Error::Io(_) | Error::MissingInput(_) => false,
        }
    }

    pub(crate) fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            e @ Error::File { .. } => e,
            e => Error::File {
                path: path.to_string_lossy().into_owned(),
                source: Box::new(e),
            },
        }
    }
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
