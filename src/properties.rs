//! Typed reads of Tiled custom properties by pre-hashed name.

use crate::ir_map::{IrMap, Properties, PropertyValue};

/// Scratch slots the loader reads typed property values through.
///
/// Every accessor zeroes its slot before walking the list, so a miss reads
/// back as `false`, `0`, `0.0` or `""`.
#[derive(Debug, Default)]
pub struct PropertyBinder {
    boolean: bool,
    decimal: f64,
    integer: i64,
    string: String,
}

impl PropertyBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boolean_property(&mut self, name_hash: u64, properties: &Properties) -> bool {
        self.boolean = false;
        if let Some(PropertyValue::Bool(v)) = properties.find_hash(name_hash) {
            self.boolean = *v;
        }
        self.boolean
    }

    /// Integer-typed properties are widened; Tiled writes `3` for a float
    /// property left at a whole value in older versions.
    pub fn decimal_property(&mut self, name_hash: u64, properties: &Properties) -> f64 {
        self.decimal = 0.0;
        match properties.find_hash(name_hash) {
            Some(PropertyValue::Float(v)) => self.decimal = *v,
            Some(PropertyValue::Int(v)) => self.decimal = *v as f64,
            _ => {}
        }
        self.decimal
    }

    pub fn integer_property(&mut self, name_hash: u64, properties: &Properties) -> i64 {
        self.integer = 0;
        if let Some(PropertyValue::Int(v)) = properties.find_hash(name_hash) {
            self.integer = *v;
        }
        self.integer
    }

    pub fn string_property(&mut self, name_hash: u64, properties: &Properties) -> &str {
        self.string.clear();
        if let Some(PropertyValue::String(v)) = properties.find_hash(name_hash) {
            self.string.push_str(v);
        }
        &self.string
    }
}

/// Which custom-property list a lookup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    Map,
    /// Layer by index in file order.
    Layer(usize),
    /// Object by layer index and position within that layer.
    Object { layer: usize, index: usize },
    /// Tileset tile addressed by global id.
    Tile(u32),
}

impl PropertySource {
    /// Resolves the source against a decoded map.
    pub fn resolve(self, map: &IrMap) -> Option<&Properties> {
        match self {
            PropertySource::Map => Some(&map.properties),
            PropertySource::Layer(i) => map.layers.get(i).map(|l| &l.properties),
            PropertySource::Object { layer, index } => map
                .layers
                .get(layer)
                .and_then(|l| l.objects().get(index))
                .map(|o| &o.properties),
            PropertySource::Tile(gid) => {
                let (ts, local) = map.tileset_for_gid(crate::ir_map::Gid(gid))?;
                map.tilesets[ts].tile(local).map(|t| &t.properties)
            }
        }
    }
}
