use std::fmt;

/// A convenient result type wrapping [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Flat classification of [`Error`] values, handy for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProtocolCorruption,
    InvalidGeometry,
    Lookup,
    Slot,
    Loading,
}

#[derive(Debug)]
pub struct SlotError {}

#[derive(Debug)]
pub struct LookupError {
    pub entry: String,
}

#[derive(Debug)]
pub struct LoadingError {
    pub entry: String,
    pub path: String,
}

/// Network terrain data that cannot be applied. The session that produced it
/// should be treated as compromised.
#[derive(Debug)]
pub struct ProtocolCorruption {
    pub reason: String,
}

/// Surface construction parameters that would break patch indexing.
#[derive(Debug)]
pub struct GeometryError {
    pub grids_per_edge: u32,
    pub grids_per_patch_edge: u32,
    pub reason: &'static str,
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ran out of surface slots!")
    }
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Could not find requested entry {} in terrain!", self.entry)
    }
}

impl fmt::Display for LoadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to load requested entry {}! Reason: {}",
            self.entry, self.path
        )
    }
}

impl fmt::Display for ProtocolCorruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Received corrupt terrain data: {}", self.reason)
    }
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid surface geometry ({} grids per edge, {} grids per patch edge): {}",
            self.grids_per_edge, self.grids_per_patch_edge, self.reason
        )
    }
}

impl std::error::Error for SlotError {}

impl std::error::Error for LookupError {}

impl std::error::Error for LoadingError {}

impl std::error::Error for ProtocolCorruption {}

impl std::error::Error for GeometryError {}

#[derive(Debug)]
pub enum Error {
    ProtocolCorruption(ProtocolCorruption),
    InvalidGeometry(GeometryError),
    LookupError(LookupError),
    LoadingError(LoadingError),
    SlotError(),
}

impl Error {
    pub fn protocol(reason: impl Into<String>) -> Self {
        Error::ProtocolCorruption(ProtocolCorruption {
            reason: reason.into(),
        })
    }

    pub fn lookup(entry: impl Into<String>) -> Self {
        Error::LookupError(LookupError {
            entry: entry.into(),
        })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ProtocolCorruption(_) => ErrorKind::ProtocolCorruption,
            Error::InvalidGeometry(_) => ErrorKind::InvalidGeometry,
            Error::LookupError(_) => ErrorKind::Lookup,
            Error::LoadingError(_) => ErrorKind::Loading,
            Error::SlotError() => ErrorKind::Slot,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ProtocolCorruption(err) => err.fmt(f),
            Error::InvalidGeometry(err) => err.fmt(f),
            Error::LookupError(err) => err.fmt(f),
            Error::LoadingError(err) => err.fmt(f),
            Error::SlotError() => SlotError {}.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ProtocolCorruption(err) => Some(err),
            Error::InvalidGeometry(err) => Some(err),
            Error::LookupError(err) => Some(err),
            Error::LoadingError(err) => Some(err),
            Error::SlotError() => None,
        }
    }
}

impl From<GeometryError> for Error {
    fn from(value: GeometryError) -> Self {
        return Error::InvalidGeometry(value);
    }
}

impl From<image::ImageError> for Error {
    fn from(value: image::ImageError) -> Self {
        return Error::LoadingError(LoadingError {
            entry: "[IMAGE]".to_string(),
            path: value.to_string(),
        });
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        return Error::LoadingError(LoadingError {
            entry: "IO Loading Error".to_string(),
            path: value.to_string(),
        });
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        return Error::LoadingError(LoadingError {
            entry: "JSON FILE".to_string(),
            path: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_errors_are_classified() {
        let err = Error::protocol("patch id out of range");
        assert_eq!(err.kind(), ErrorKind::ProtocolCorruption);
        assert!(err.to_string().contains("patch id out of range"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn json_errors_become_loading_errors() {
        let parse = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        let err: Error = parse.into();
        assert_eq!(err.kind(), ErrorKind::Loading);
    }
}
