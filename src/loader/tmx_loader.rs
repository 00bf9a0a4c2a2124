// src/loader/tmx_loader.rs
use crate::error::MapError;
use crate::ir_map::*;
use anyhow::{Context, Result};
use macroquad::prelude::*;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

/// Element whose `<properties>` block is currently being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Map,
    Tileset,
    Tile,
    Layer,
    Object,
    /// Groups, image layers and other elements whose properties are
    /// not read.
    Skipped,
}

#[derive(Default)]
struct PendingProperty {
    name: String,
    kind: Option<String>,
    value: Option<String>,
}

/// Collects one TMX or TSX document. A TSX file is just a `<tileset>` root,
/// so the same walker reads both.
struct Document {
    map_dir: PathBuf,
    map: IrMap,
    owners: Vec<Owner>,
    tileset: Option<IrTileset>,
    tile: Option<IrTileMetadata>,
    layer: Option<IrLayer>,
    object: Option<IrObject>,
    property: Option<PendingProperty>,
    data_csv: bool,
    in_data: bool,
}

fn attr<'a>(attributes: &'a [OwnedAttribute], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.local_name == name)
        .map(|a| a.value.as_str())
}

fn parse_attr<T>(attributes: &[OwnedAttribute], name: &str, element: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    attr(attributes, name)
        .map(|v| {
            v.trim().parse::<T>().with_context(|| {
                format!("Expected to parse '{}' attr of <{}>, got '{}'", name, element, v)
            })
        })
        .transpose()
}

fn property_value(p: PendingProperty) -> Result<Option<(String, PropertyValue)>> {
    let PendingProperty { name, kind, value } = p;
    let value = value.unwrap_or_default();
    let parsed = match kind.as_deref().unwrap_or("string") {
        "bool" => Some(PropertyValue::Bool(value.trim() == "true")),
        "int" | "object" => Some(PropertyValue::Int(value.trim().parse().with_context(|| {
            format!("Expected to parse int property '{}', got '{}'", name, value)
        })?)),
        "float" => Some(PropertyValue::Float(value.trim().parse().with_context(|| {
            format!("Expected to parse float property '{}', got '{}'", name, value)
        })?)),
        "string" | "file" | "color" => Some(PropertyValue::String(value)),
        "class" => None,
        other => {
            return Err(MapError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            }
            .into())
        }
    };
    Ok(parsed.map(|v| (name, v)))
}

impl Document {
    fn new(map_dir: PathBuf) -> Self {
        Self {
            map_dir,
            map: IrMap {
                width: 0,
                height: 0,
                tile_w: 0,
                tile_h: 0,
                background_color: 0,
                properties: Properties::new(),
                tilesets: Vec::new(),
                layers: Vec::new(),
            },
            owners: Vec::new(),
            tileset: None,
            tile: None,
            layer: None,
            object: None,
            property: None,
            data_csv: false,
            in_data: false,
        }
    }

    fn properties_of(&mut self, owner: Owner) -> Option<&mut Properties> {
        match owner {
            Owner::Map => Some(&mut self.map.properties),
            Owner::Tileset => self.tileset.as_mut().map(|t| &mut t.properties),
            Owner::Tile => self.tile.as_mut().map(|t| &mut t.properties),
            Owner::Layer => self.layer.as_mut().map(|l| &mut l.properties),
            Owner::Object => self.object.as_mut().map(|o| &mut o.properties),
            Owner::Skipped => None,
        }
    }

    fn start(&mut self, element: &str, attributes: Vec<OwnedAttribute>) -> Result<()> {
        match element {
            //
            // Handle the <map> block
            //
            "map" => {
                self.map.width = parse_attr(&attributes, "width", "map")?
                    .context("<map> element missing a 'width' attribute.")?;
                self.map.height = parse_attr(&attributes, "height", "map")?
                    .context("<map> element missing a 'height' attribute.")?;
                self.map.tile_w = parse_attr(&attributes, "tilewidth", "map")?
                    .context("<map> element missing a 'tilewidth' attribute.")?;
                self.map.tile_h = parse_attr(&attributes, "tileheight", "map")?
                    .context("<map> element missing a 'tileheight' attribute.")?;
                if let Some(color) = attr(&attributes, "backgroundcolor") {
                    self.map.background_color = parse_color(color)
                        .with_context(|| format!("Unreadable backgroundcolor '{}'", color))?;
                }
                self.owners.push(Owner::Map);
            }

            //
            // Handle the <tileset> block, embedded or external
            //
            "tileset" => {
                let first_gid = parse_attr(&attributes, "firstgid", "tileset")?.unwrap_or(1);
                if let Some(source) = attr(&attributes, "source") {
                    let tsx_path = self.map_dir.join(source);
                    let mut ts = decode_tsx(&tsx_path).with_context(|| {
                        format!(
                            "Expected to load referenced <tileset> from {}",
                            tsx_path.display()
                        )
                    })?;
                    ts.first_gid = first_gid;
                    ts.source_dir = Path::new(source)
                        .parent()
                        .map(Path::to_path_buf)
                        .filter(|d| !d.as_os_str().is_empty());
                    self.map.tilesets.push(ts);
                    // Nothing nested follows a source reference; keep the
                    // owner stack balanced for the matching end tag.
                    self.owners.push(Owner::Tileset);
                    self.tileset = None;
                    return Ok(());
                }
                self.tileset = Some(IrTileset {
                    first_gid,
                    name: attr(&attributes, "name").unwrap_or_default().to_owned(),
                    source_dir: None,
                    image: String::new(),
                    tile_w: parse_attr(&attributes, "tilewidth", "tileset")?.unwrap_or(0),
                    tile_h: parse_attr(&attributes, "tileheight", "tileset")?.unwrap_or(0),
                    tilecount: parse_attr(&attributes, "tilecount", "tileset")?.unwrap_or(0),
                    columns: parse_attr(&attributes, "columns", "tileset")?.unwrap_or(0),
                    spacing: parse_attr(&attributes, "spacing", "tileset")?.unwrap_or(0),
                    margin: parse_attr(&attributes, "margin", "tileset")?.unwrap_or(0),
                    properties: Properties::new(),
                    tiles: Vec::new(),
                });
                self.owners.push(Owner::Tileset);
            }
            "image" => {
                if let Some(ts) = self.tileset.as_mut() {
                    ts.image = attr(&attributes, "source")
                        .context("<image> element missing a 'source' attribute.")?
                        .to_owned();
                }
            }
            "tile" if self.in_data => {
                // <data> without encoding lists one <tile gid=".."/> per cell
                let gid = parse_attr(&attributes, "gid", "tile")?.unwrap_or(0u32);
                if let Some(IrLayer {
                    kind: IrLayerKind::Tiles { data, .. },
                    ..
                }) = self.layer.as_mut()
                {
                    data.push(gid);
                }
            }
            "tile" => {
                self.tile = Some(IrTileMetadata {
                    id: parse_attr(&attributes, "id", "tile")?
                        .context("<tile> element missing an 'id' attribute.")?,
                    properties: Properties::new(),
                    animation: Vec::new(),
                });
                self.owners.push(Owner::Tile);
            }
            "frame" => {
                let frame = IrFrame {
                    tile_id: parse_attr(&attributes, "tileid", "frame")?
                        .context("<frame> element missing a 'tileid' attribute.")?,
                    duration_ms: parse_attr(&attributes, "duration", "frame")?.unwrap_or(0),
                };
                if let Some(tile) = self.tile.as_mut() {
                    tile.animation.push(frame);
                }
            }

            //
            // Handle the <layer> block
            //
            "layer" => {
                let width = parse_attr(&attributes, "width", "layer")?
                    .context("<layer> element missing a 'width' attribute.")?;
                let height = parse_attr(&attributes, "height", "layer")?
                    .context("<layer> element missing a 'height' attribute.")?;
                self.layer = Some(IrLayer {
                    name: attr(&attributes, "name").unwrap_or_default().to_owned(),
                    visible: attr(&attributes, "visible") != Some("0"),
                    offset: vec2(
                        parse_attr(&attributes, "offsetx", "layer")?.unwrap_or(0.0),
                        parse_attr(&attributes, "offsety", "layer")?.unwrap_or(0.0),
                    ),
                    properties: Properties::new(),
                    kind: IrLayerKind::Tiles {
                        width,
                        height,
                        data: Vec::with_capacity(width * height),
                    },
                });
                self.owners.push(Owner::Layer);
            }
            "data" => {
                match attr(&attributes, "encoding") {
                    None => self.data_csv = false,
                    Some("csv") => self.data_csv = true,
                    Some(other) => return Err(MapError::UnsupportedEncoding(other.to_owned()).into()),
                }
                if attr(&attributes, "compression").is_some() {
                    return Err(MapError::UnsupportedEncoding("compressed data".into()).into());
                }
                self.in_data = true;
            }
            "group" | "imagelayer" | "wangset" | "wangcolor" => {
                self.owners.push(Owner::Skipped);
            }
            // Collision shapes of a tileset tile.
            "objectgroup" if self.tile.is_some() => {
                self.owners.push(Owner::Skipped);
            }
            "objectgroup" => {
                self.layer = Some(IrLayer {
                    name: attr(&attributes, "name").unwrap_or_default().to_owned(),
                    visible: attr(&attributes, "visible") != Some("0"),
                    offset: vec2(
                        parse_attr(&attributes, "offsetx", "objectgroup")?.unwrap_or(0.0),
                        parse_attr(&attributes, "offsety", "objectgroup")?.unwrap_or(0.0),
                    ),
                    properties: Properties::new(),
                    kind: IrLayerKind::Objects {
                        objects: Vec::new(),
                    },
                });
                self.owners.push(Owner::Layer);
            }
            "object" => {
                let class_name = attr(&attributes, "class")
                    .or_else(|| attr(&attributes, "type"))
                    .unwrap_or_default()
                    .to_owned();
                self.object = Some(IrObject {
                    id: parse_attr(&attributes, "id", "object")?.unwrap_or(0),
                    name: attr(&attributes, "name").unwrap_or_default().to_owned(),
                    class_name,
                    x: parse_attr(&attributes, "x", "object")?.unwrap_or(0.0),
                    y: parse_attr(&attributes, "y", "object")?.unwrap_or(0.0),
                    width: parse_attr(&attributes, "width", "object")?.unwrap_or(0.0),
                    height: parse_attr(&attributes, "height", "object")?.unwrap_or(0.0),
                    visible: attr(&attributes, "visible") != Some("0"),
                    properties: Properties::new(),
                });
                self.owners.push(Owner::Object);
            }
            "property" => {
                self.property = Some(PendingProperty {
                    name: attr(&attributes, "name")
                        .context("<property> element missing a 'name' attribute.")?
                        .to_owned(),
                    kind: attr(&attributes, "type").map(str::to_owned),
                    value: attr(&attributes, "value").map(str::to_owned),
                });
            }
            _ => {}
        }
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        if let Some(p) = self.property.as_mut() {
            // multi-line string properties carry their value as text
            if p.value.is_none() {
                p.value = Some(text.to_owned());
            }
            return Ok(());
        }
        if !(self.in_data && self.data_csv) {
            return Ok(());
        }
        let Some(IrLayer {
            kind: IrLayerKind::Tiles { data, .. },
            ..
        }) = self.layer.as_mut()
        else {
            anyhow::bail!("Entered a <data> character section without an active <layer>.");
        };
        for index in text.split(',') {
            let index = index.trim();
            if !index.is_empty() {
                let gid = index
                    .parse::<u32>()
                    .with_context(|| format!("Expected to parse '{}' to u32", index))?;
                data.push(gid);
            }
        }
        Ok(())
    }

    fn end(&mut self, element: &str) -> Result<()> {
        match element {
            "property" => {
                let pending = self
                    .property
                    .take()
                    .context("Closing <property> without an open one.")?;
                let owner = *self
                    .owners
                    .last()
                    .context("<property> outside of any element that owns properties.")?;
                if let Some((name, value)) = property_value(pending)? {
                    if let Some(props) = self.properties_of(owner) {
                        props.insert(name, value);
                    }
                }
            }
            "data" => self.in_data = false,
            "group" | "imagelayer" | "wangset" | "wangcolor" => {
                self.owners.pop();
            }
            "objectgroup" if self.owners.last() == Some(&Owner::Skipped) => {
                self.owners.pop();
            }
            "tile" if self.in_data => {}
            "tile" => {
                self.owners.pop();
                let tile = self.tile.take().context("Closing <tile> without an open one.")?;
                if let Some(ts) = self.tileset.as_mut() {
                    ts.tiles.push(tile);
                }
            }
            "tileset" => {
                self.owners.pop();
                if let Some(ts) = self.tileset.take() {
                    self.map.tilesets.push(ts);
                }
            }
            "object" => {
                self.owners.pop();
                let object = self.object.take().context("Closing <object> without an open one.")?;
                if let Some(IrLayer {
                    kind: IrLayerKind::Objects { objects },
                    ..
                }) = self.layer.as_mut()
                {
                    objects.push(object);
                }
            }
            "layer" | "objectgroup" => {
                self.owners.pop();
                let layer = self
                    .layer
                    .take()
                    .context("Expected current layer to have been populated when finishing it.")?;
                if let IrLayerKind::Tiles {
                    width,
                    height,
                    data,
                } = &layer.kind
                {
                    let expected_count = width * height;
                    if data.len() != expected_count {
                        anyhow::bail!(
                            "Expected layer '{}' to have {} entries, but got {}",
                            layer.name,
                            expected_count,
                            data.len()
                        );
                    }
                }
                self.map.layers.push(layer);
            }
            "map" => {
                self.owners.pop();
            }
            _ => {}
        }
        Ok(())
    }
}

fn walk(path: &Path, map_dir: PathBuf) -> Result<IrMap> {
    let file =
        File::open(path).with_context(|| format!("Unable to open {}", path.display()))?;
    let parser = EventReader::new(BufReader::new(file));
    let mut doc = Document::new(map_dir);

    for e in parser {
        match e.with_context(|| format!("Malformed XML in {}", path.display()))? {
            XmlEvent::StartElement {
                name, attributes, ..
            } => doc.start(&name.local_name, attributes)?,
            XmlEvent::Characters(text) | XmlEvent::CData(text) => doc.characters(&text)?,
            XmlEvent::EndElement { name } => doc.end(&name.local_name)?,
            _ => {}
        }
    }
    Ok(doc.map)
}

fn decode_tsx(path: &Path) -> Result<IrTileset> {
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    walk(path, dir)?
        .tilesets
        .into_iter()
        .next()
        .context("Expected a <tileset> root element.")
}

/// Decodes a Tiled TMX map with CSV or plain-XML layer data, plus any TSX
/// tilesets it references. Returns the map plus the directory it was read
/// from.
pub fn decode_map_file_to_ir(path: &Path) -> Result<(IrMap, PathBuf), MapError> {
    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));

    if let Err(source) = File::open(path) {
        return Err(MapError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    let mut map = walk(path, map_dir.clone()).map_err(|source| {
        // Surface typed errors raised inside the walker as themselves.
        match source.downcast::<MapError>() {
            Ok(typed) => typed,
            Err(source) => MapError::Tmx {
                path: path.to_path_buf(),
                source,
            },
        }
    })?;

    map.tilesets.sort_by_key(|t| t.first_gid);
    let max_gid = map.max_gid();
    for layer in &map.layers {
        for cell in layer.cells() {
            if cell.gid.clean() > max_gid {
                return Err(MapError::InvalidTileGid {
                    layer: layer.name.clone(),
                    gid: cell.gid.clean(),
                    max_gid,
                });
            }
        }
    }

    Ok((map, map_dir))
}
