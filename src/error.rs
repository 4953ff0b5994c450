use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// The content could not be turned into a document tree.
    Html(String),
    /// A drawing strategy gave up on the document.
    Render(String),
    /// Bitmap capture failed (no usable font, zero-sized canvas, ...).
    Raster(String),
    Docx(String),
    /// The caller passed no content to export.
    MissingContent,
    /// The print host refused to open a window (pop-up blocker).
    PrintBlocked,
    /// Every strategy in a fallback chain failed.
    Exhausted(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::Html(msg) => write!(f, "HTML error: {msg}"),
            Error::Render(msg) => write!(f, "render error: {msg}"),
            Error::Raster(msg) => write!(f, "rasterization error: {msg}"),
            Error::Docx(msg) => write!(f, "DOCX error: {msg}"),
            Error::MissingContent => write!(f, "no document content to export"),
            Error::PrintBlocked => {
                write!(f, "print window was blocked; allow pop-ups and try again")
            }
            Error::Exhausted(format) => write!(f, "all {format} export strategies failed"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Docx(e.to_string())
    }
}
