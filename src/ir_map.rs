use crate::hash;
use macroquad::prelude::*;
use std::path::PathBuf;

pub const FLIP_H: u32 = 0x8000_0000; // bit 31
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
pub const GID_MASK: u32 = 0x1FFF_FFFF;

/// Raw global tile id as stored in a layer, flip flags included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gid(pub u32);

impl Gid {
    #[inline] pub fn clean(self) -> u32 { self.0 & GID_MASK }
    #[inline] pub fn flip_h(self) -> bool { (self.0 & FLIP_H) != 0 }
    #[inline] pub fn flip_v(self) -> bool { (self.0 & FLIP_V) != 0 }
    #[inline] pub fn is_empty(self) -> bool { self.clean() == 0 }
}

/// Typed value of a Tiled custom property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    /// djb2 of `name`, computed once at decode time.
    pub hash: u64,
    pub value: PropertyValue,
}

/// Custom properties in file order.
///
/// Lookups are linear; lists are short and the loader compares hashes, not
/// strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    entries: Vec<Property>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        let hash = hash::hash(&name);
        if let Some(existing) = self.entries.iter_mut().find(|p| p.hash == hash && p.name == name) {
            existing.value = value;
        } else {
            self.entries.push(Property { name, hash, value });
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.find_hash(hash::hash(name))
    }

    pub fn find_hash(&self, hash: u64) -> Option<&PropertyValue> {
        self.entries.iter().find(|p| p.hash == hash).map(|p| &p.value)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            PropertyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

/// Canonical, format-agnostic map. Both decoders produce this; the engine
/// never sees JSON or XML.
#[derive(Debug, Clone)]
pub struct IrMap {
    /// Size in tiles.
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    /// `0xRRGGBB`; alpha is dropped.
    pub background_color: u32,
    pub properties: Properties,
    pub tilesets: Vec<IrTileset>, // must be sorted by first_gid
    pub layers: Vec<IrLayer>,     // draw order: array order
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrFrame {
    pub tile_id: u32,
    pub duration_ms: u32,
}

#[derive(Debug, Clone)]
pub struct IrTileMetadata {
    pub id: u32,
    pub properties: Properties,
    pub animation: Vec<IrFrame>,
}

/// One image atlas with a regular grid.
#[derive(Debug, Clone)]
pub struct IrTileset {
    pub first_gid: u32,
    pub name: String,
    /// Directory of an external tileset file relative to the map directory.
    /// `None` for tilesets embedded in the map.
    pub source_dir: Option<PathBuf>,
    /// Image file name relative to the tileset's own directory.
    pub image: String,
    pub tile_w: u32,
    pub tile_h: u32,
    pub tilecount: u32,
    pub columns: u32,
    pub spacing: u32, // 0 if not used
    pub margin: u32,  // 0 if not used
    pub properties: Properties,
    pub tiles: Vec<IrTileMetadata>,
}

impl IrTileset {
    pub fn last_gid(&self) -> u32 {
        self.first_gid + self.tilecount.saturating_sub(1)
    }

    pub fn contains(&self, gid: u32) -> bool {
        gid >= self.first_gid && gid < self.first_gid + self.tilecount
    }

    pub fn tile(&self, local_id: u32) -> Option<&IrTileMetadata> {
        self.tiles.iter().find(|t| t.id == local_id)
    }
}

#[derive(Debug, Clone)]
pub struct IrObject {
    pub id: u32,
    pub name: String,
    /// `type` (Tiled < 1.9) or `class`.
    pub class_name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub visible: bool,
    pub properties: Properties,
}

#[derive(Debug, Clone)]
pub enum IrLayerKind {
    Tiles {
        width: usize,
        height: usize,
        data: Vec<u32>, // raw GIDs (including flip flags ok)
    },
    Objects {
        objects: Vec<IrObject>,
    },
}

#[derive(Debug, Clone)]
pub struct IrLayer {
    pub name: String,
    pub visible: bool,
    pub offset: Vec2, // world offset for this layer
    pub properties: Properties,
    pub kind: IrLayerKind,
}

/// One non-empty cell of a tile layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub gid: Gid,
    pub x: usize,
    pub y: usize,
}

impl IrLayer {
    pub fn is_tile_layer(&self) -> bool {
        matches!(self.kind, IrLayerKind::Tiles { .. })
    }

    pub fn is_object_layer(&self) -> bool {
        matches!(self.kind, IrLayerKind::Objects { .. })
    }

    /// Non-empty cells in row-major order. Empty for non-tile layers.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        let (width, data): (usize, &[u32]) = match &self.kind {
            IrLayerKind::Tiles { width, data, .. } => (*width, data.as_slice()),
            IrLayerKind::Objects { .. } => (1, &[]),
        };
        let width = width.max(1);
        data.iter().enumerate().filter_map(move |(idx, &raw)| {
            let gid = Gid(raw);
            (!gid.is_empty()).then(|| Cell {
                gid,
                x: idx % width,
                y: idx / width,
            })
        })
    }

    pub fn objects(&self) -> &[IrObject] {
        match &self.kind {
            IrLayerKind::Objects { objects } => objects,
            IrLayerKind::Tiles { .. } => &[],
        }
    }
}

impl IrMap {
    pub fn pixel_width(&self) -> u32 {
        self.width * self.tile_w
    }

    pub fn pixel_height(&self) -> u32 {
        self.height * self.tile_h
    }

    pub fn tile_layers(&self) -> impl Iterator<Item = &IrLayer> {
        self.layers.iter().filter(|l| l.is_tile_layer())
    }

    pub fn object_layers(&self) -> impl Iterator<Item = &IrLayer> {
        self.layers.iter().filter(|l| l.is_object_layer())
    }

    pub fn objects(&self) -> impl Iterator<Item = &IrObject> {
        self.object_layers().flat_map(|l| l.objects().iter())
    }

    pub fn max_gid(&self) -> u32 {
        self.tilesets.iter().map(IrTileset::last_gid).max().unwrap_or(0)
    }

    /// Index of the tileset covering `gid` plus the tile's local id.
    pub fn tileset_for_gid(&self, gid: Gid) -> Option<(usize, u32)> {
        let clean = gid.clean();
        self.tilesets
            .iter()
            .rposition(|ts| ts.contains(clean))
            .map(|i| (i, clean - self.tilesets[i].first_gid))
    }
}

/// Parses Tiled's `#RRGGBB` / `#AARRGGBB` into `0xRRGGBB`.
pub fn parse_color(text: &str) -> Option<u32> {
    let hex = text.trim().trim_start_matches('#');
    let value = u32::from_str_radix(hex, 16).ok()?;
    match hex.len() {
        6 => Some(value),
        8 => Some(value & 0x00FF_FFFF),
        _ => None,
    }
}
