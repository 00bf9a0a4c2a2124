use std::{error, fmt, io, path::PathBuf};

/// Errors produced while decoding a Tiled map file into its canonical form.
#[derive(Debug)]
pub enum MapError {
    /// The map or one of its referenced files could not be read.
    Io {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
    /// A JSON map or tileset is malformed.
    Json {
        /// Offending file.
        path: PathBuf,
        /// serde_json diagnostic.
        source: serde_json::Error,
    },
    /// A TMX map or TSX tileset is malformed.
    Tmx {
        /// Offending file.
        path: PathBuf,
        /// Context chain collected while walking the XML.
        source: anyhow::Error,
    },
    /// The file parsed but does not describe a usable map.
    InvalidMap(String),
    /// A tile layer references a gid no tileset covers.
    InvalidTileGid {
        /// Layer name.
        layer: String,
        /// Masked gid.
        gid: u32,
        /// Highest gid covered by the tilesets.
        max_gid: u32,
    },
    /// A custom property declares a type we cannot bind.
    UnsupportedPropertyType {
        /// Property name.
        name: String,
        /// Declared type.
        kind: String,
    },
    /// Layer data uses an encoding other than CSV / plain XML / JSON array.
    UnsupportedEncoding(String),
    /// The file extension does not select any decoder.
    UnsupportedFormat(PathBuf),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapError::Io { path, source } => {
                write!(f, "I/O error reading {}: {}", path.display(), source)
            }
            MapError::Json { path, source } => {
                write!(f, "failed to parse JSON {}: {}", path.display(), source)
            }
            MapError::Tmx { path, source } => {
                write!(f, "failed to parse TMX {}: {:#}", path.display(), source)
            }
            MapError::InvalidMap(msg) => write!(f, "invalid map: {}", msg),
            MapError::InvalidTileGid {
                layer,
                gid,
                max_gid,
            } => write!(
                f,
                "layer '{}' references gid {} but tilesets only cover 1..={}",
                layer, gid, max_gid
            ),
            MapError::UnsupportedPropertyType { name, kind } => {
                write!(f, "property '{}' has unsupported type '{}'", name, kind)
            }
            MapError::UnsupportedEncoding(enc) => {
                write!(f, "unsupported layer data encoding: {}", enc)
            }
            MapError::UnsupportedFormat(path) => {
                write!(f, "unsupported map format: {}", path.display())
            }
        }
    }
}

impl error::Error for MapError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            MapError::Io { source, .. } => Some(source),
            MapError::Json { source, .. } => Some(source),
            MapError::Tmx { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Numeric status handed back to hosts that drive the engine through codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    /// Operation succeeded.
    Ok = 0,
    /// Abort the frame loop.
    ErrorCritical = -1,
    /// Recoverable; the engine is still runnable.
    Warning = -2,
}

/// Failure of an engine operation, split by how the host should react.
#[derive(Debug)]
pub enum EngineError {
    /// Renderer or GPU failure. The frame loop should stop.
    Critical(anyhow::Error),
    /// The operation was rolled back; the engine keeps running.
    Warning(anyhow::Error),
}

impl EngineError {
    pub(crate) fn critical(err: impl Into<anyhow::Error>) -> Self {
        EngineError::Critical(err.into())
    }

    pub(crate) fn warning(err: impl Into<anyhow::Error>) -> Self {
        EngineError::Warning(err.into())
    }

    /// Status code matching this error.
    pub fn status(&self) -> Status {
        match self {
            EngineError::Critical(_) => Status::ErrorCritical,
            EngineError::Warning(_) => Status::Warning,
        }
    }

    /// Whether the host should leave its frame loop.
    pub fn is_critical(&self) -> bool {
        matches!(self, EngineError::Critical(_))
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Critical(err) => write!(f, "critical: {:#}", err),
            EngineError::Warning(err) => write!(f, "warning: {:#}", err),
        }
    }
}

impl error::Error for EngineError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            EngineError::Critical(err) | EngineError::Warning(err) => Some(err.as_ref()),
        }
    }
}

impl<T> From<&Result<T, EngineError>> for Status {
    fn from(result: &Result<T, EngineError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.status(),
        }
    }
}

impl<T> From<Result<T, EngineError>> for Status {
    fn from(result: Result<T, EngineError>) -> Self {
        Status::from(&result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_host_contract() {
        assert_eq!(Status::Ok as i32, 0);
        assert_eq!(Status::ErrorCritical as i32, -1);
        assert_eq!(Status::Warning as i32, -2);
    }

    #[test]
    fn result_maps_to_status() {
        let ok: Result<(), EngineError> = Ok(());
        let warn: Result<(), EngineError> = Err(EngineError::warning(anyhow::anyhow!("map missing")));
        let crit: Result<(), EngineError> = Err(EngineError::critical(anyhow::anyhow!("no target")));

        assert_eq!(Status::from(&ok), Status::Ok);
        assert_eq!(Status::from(&warn), Status::Warning);
        assert_eq!(Status::from(&crit), Status::ErrorCritical);
        assert!(crit.err().map(|e| e.is_critical()).unwrap_or(false));
    }

    #[test]
    fn map_error_display_names_the_file() {
        let err = MapError::UnsupportedFormat(PathBuf::from("level.txt"));
        assert!(err.to_string().contains("level.txt"));
    }
}
