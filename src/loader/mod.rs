//! Tiled decoders. Each one turns a file into an [`IrMap`]; the engine only
//! ever consumes that form.

pub mod json_loader;
pub mod tmx_loader;

use crate::error::MapError;
use crate::ir_map::IrMap;
use std::path::{Path, PathBuf};

/// Which decoder a core uses. Chosen once, when the core is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MapFormat {
    /// Tiled JSON (`.json`, `.tmj`).
    Json,
    /// Tiled XML (`.tmx`).
    Tmx,
    /// Pick by file extension.
    #[default]
    Auto,
}

impl MapFormat {
    fn for_path(self, path: &Path) -> Result<MapFormat, MapError> {
        match self {
            MapFormat::Auto => match path.extension().and_then(|e| e.to_str()) {
                Some("json") | Some("tmj") => Ok(MapFormat::Json),
                Some("tmx") => Ok(MapFormat::Tmx),
                _ => Err(MapError::UnsupportedFormat(path.to_path_buf())),
            },
            fixed => Ok(fixed),
        }
    }

    /// Decodes `path` into the canonical map plus the map's directory.
    pub fn decode(self, path: &Path) -> Result<(IrMap, PathBuf), MapError> {
        match self.for_path(path)? {
            MapFormat::Json => json_loader::decode_map_file_to_ir(path),
            MapFormat::Tmx => tmx_loader::decode_map_file_to_ir(path),
            MapFormat::Auto => Err(MapError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_selects_by_extension() {
        assert_eq!(MapFormat::Auto.for_path(Path::new("a/b.tmx")).ok(), Some(MapFormat::Tmx));
        assert_eq!(MapFormat::Auto.for_path(Path::new("a/b.tmj")).ok(), Some(MapFormat::Json));
        assert!(matches!(
            MapFormat::Auto.for_path(Path::new("a/b.txt")),
            Err(MapError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn fixed_format_ignores_extension() {
        assert_eq!(MapFormat::Tmx.for_path(Path::new("level.xml")).ok(), Some(MapFormat::Tmx));
    }
}
