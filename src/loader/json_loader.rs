// src/loader/json_loader.rs
use crate::error::MapError;
use crate::ir_map::*;
use macroquad::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(default)]
    data: Option<JsonValue>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    offsetx: f32,
    #[serde(default)]
    offsety: f32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>, // "tilelayer" | "objectgroup" | ...
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    objects: Vec<JsonObject>,
    /// Children of a `group` layer.
    #[serde(default)]
    layers: Vec<JsonLayer>,
}

fn default_true() -> bool {
    true
}

/// Either a reference to an external tileset (`source`) or a tileset
/// embedded in the map.
#[derive(Deserialize)]
struct JsonTilesetRef {
    firstgid: u32,
    #[serde(default)]
    source: Option<String>,
    #[serde(flatten)]
    embedded: JsonTileset,
}

#[derive(Deserialize, Default)]
struct JsonTileset {
    #[serde(default)]
    name: String,
    #[serde(default)]
    tilewidth: u32,
    #[serde(default)]
    tileheight: u32,
    #[serde(default)]
    tilecount: u32,
    #[serde(default)]
    columns: u32,
    #[serde(default)]
    image: String,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    tiles: Vec<JsonTile>,
}

#[derive(Deserialize)]
struct JsonMap {
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    backgroundcolor: Option<String>,
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonTilesetRef>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: JsonValue,
}

#[derive(Deserialize)]
struct JsonObject {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    x: f64,
    #[serde(default)]
    y: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonFrame {
    tileid: u32,
    #[serde(default)]
    duration: u32,
}

#[derive(Deserialize)]
struct JsonTile {
    id: u32,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    animation: Vec<JsonFrame>,
}

fn json_property_to_ir(prop: JsonProperty) -> Result<Option<(String, PropertyValue)>, MapError> {
    let JsonProperty { name, kind, value } = prop;

    let parsed = match kind.as_deref() {
        Some("bool") => value.as_bool().map(PropertyValue::Bool),
        Some("int") | Some("object") => value.as_i64().map(PropertyValue::Int),
        Some("float") => value.as_f64().map(PropertyValue::Float),
        Some("string") | Some("file") | Some("color") => {
            value.as_str().map(|s| PropertyValue::String(s.to_owned()))
        }
        // Class-typed values are nested objects; nothing in the engine reads them.
        Some("class") => None,
        Some(other) => {
            return Err(MapError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            });
        }
        None => {
            if let Some(v) = value.as_bool() {
                Some(PropertyValue::Bool(v))
            } else if let Some(v) = value.as_i64() {
                Some(PropertyValue::Int(v))
            } else if let Some(v) = value.as_f64() {
                Some(PropertyValue::Float(v))
            } else {
                value.as_str().map(|s| PropertyValue::String(s.to_owned()))
            }
        }
    };

    Ok(parsed.map(|value| (name, value)))
}

fn properties_from_json(props: Vec<JsonProperty>) -> Result<Properties, MapError> {
    let mut out = Properties::new();
    for p in props {
        if let Some((name, value)) = json_property_to_ir(p)? {
            out.insert(name, value);
        }
    }
    Ok(out)
}

fn object_to_ir(obj: JsonObject) -> Result<IrObject, MapError> {
    let class_name = if !obj.class.is_empty() {
        obj.class
    } else {
        obj.kind
    };

    Ok(IrObject {
        id: obj.id,
        name: obj.name,
        class_name,
        x: obj.x,
        y: obj.y,
        width: obj.width,
        height: obj.height,
        visible: obj.visible,
        properties: properties_from_json(obj.properties)?,
    })
}

fn tileset_to_ir(
    first_gid: u32,
    source_dir: Option<PathBuf>,
    ts: JsonTileset,
) -> Result<IrTileset, MapError> {
    let tiles = ts
        .tiles
        .into_iter()
        .map(|tile| -> Result<IrTileMetadata, MapError> {
            Ok(IrTileMetadata {
                id: tile.id,
                properties: properties_from_json(tile.properties)?,
                animation: tile
                    .animation
                    .into_iter()
                    .map(|f| IrFrame {
                        tile_id: f.tileid,
                        duration_ms: f.duration,
                    })
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(IrTileset {
        first_gid,
        name: ts.name,
        source_dir,
        image: ts.image,
        tile_w: ts.tilewidth,
        tile_h: ts.tileheight,
        tilecount: ts.tilecount,
        columns: ts.columns,
        spacing: ts.spacing,
        margin: ts.margin,
        properties: properties_from_json(ts.properties)?,
        tiles,
    })
}

fn layer_data(layer: &JsonLayer) -> Result<Vec<u32>, MapError> {
    if let Some(enc) = layer.encoding.as_deref() {
        if enc != "csv" {
            return Err(MapError::UnsupportedEncoding(format!(
                "{} (layer '{}')",
                enc, layer.name
            )));
        }
    }
    let Some(JsonValue::Array(values)) = &layer.data else {
        return Ok(Vec::new());
    };
    values
        .iter()
        .map(|v| {
            v.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| {
                    MapError::InvalidMap(format!("layer '{}' has a non-gid entry: {}", layer.name, v))
                })
        })
        .collect()
}

fn tile_layer_to_ir(l: &JsonLayer, max_gid: u32) -> Result<IrLayerKind, MapError> {
    let data = layer_data(l)?;
    for &raw_gid in &data {
        let gid = raw_gid & GID_MASK;
        if gid != 0 && gid > max_gid {
            return Err(MapError::InvalidTileGid {
                layer: l.name.clone(),
                gid,
                max_gid,
            });
        }
    }
    if data.len() != l.width * l.height {
        return Err(MapError::InvalidMap(format!(
            "layer '{}' has {} cells, expected {}x{}",
            l.name,
            data.len(),
            l.width,
            l.height
        )));
    }
    Ok(IrLayerKind::Tiles {
        width: l.width,
        height: l.height,
        data,
    })
}

/// Image layers are skipped; group properties are not read.
fn layers_to_ir(layers: Vec<JsonLayer>, max_gid: u32, out: &mut Vec<IrLayer>) -> Result<(), MapError> {
    for mut l in layers {
        let kind = match l.kind.as_deref().unwrap_or("tilelayer") {
            "tilelayer" => tile_layer_to_ir(&l, max_gid)?,
            "objectgroup" => IrLayerKind::Objects {
                objects: std::mem::take(&mut l.objects)
                    .into_iter()
                    .map(object_to_ir)
                    .collect::<Result<Vec<_>, _>>()?,
            },
            "group" => {
                layers_to_ir(std::mem::take(&mut l.layers), max_gid, out)?;
                continue;
            }
            _ => continue,
        };
        out.push(IrLayer {
            properties: properties_from_json(std::mem::take(&mut l.properties))?,
            name: l.name,
            visible: l.visible,
            offset: vec2(l.offsetx, l.offsety),
            kind,
        });
    }
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, MapError> {
    let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&txt).map_err(|source| MapError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Decodes a Tiled JSON map (`.json` / `.tmj`) and every external tileset it
/// references. Returns the map plus the directory it was read from.
pub fn decode_map_file_to_ir(path: &Path) -> Result<(IrMap, PathBuf), MapError> {
    let j: JsonMap = read_json(path)?;

    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));

    // Build IR tilesets
    let mut ir_tilesets = Vec::with_capacity(j.tilesets.len());
    for ts in j.tilesets {
        let ir = match ts.source {
            Some(source) => {
                if !(source.ends_with(".json") || source.ends_with(".tsj")) {
                    return Err(MapError::InvalidMap(format!(
                        "External tileset must be JSON: {}",
                        source
                    )));
                }
                let ext: JsonTileset = read_json(&map_dir.join(&source))?;
                let sub_dir = Path::new(&source)
                    .parent()
                    .map(Path::to_path_buf)
                    .filter(|d| !d.as_os_str().is_empty());
                tileset_to_ir(ts.firstgid, sub_dir, ext)?
            }
            None => tileset_to_ir(ts.firstgid, None, ts.embedded)?,
        };
        ir_tilesets.push(ir);
    }

    // Sort by first_gid to make lookups trivial
    ir_tilesets.sort_by_key(|t| t.first_gid);

    let max_gid = ir_tilesets.iter().map(IrTileset::last_gid).max().unwrap_or(0);

    // Build IR layers, with group children flattened in document order
    let mut ir_layers = Vec::with_capacity(j.layers.len());
    layers_to_ir(j.layers, max_gid, &mut ir_layers)?;

    let background_color = j
        .backgroundcolor
        .as_deref()
        .and_then(parse_color)
        .unwrap_or(0);

    Ok((
        IrMap {
            width: j.width,
            height: j.height,
            tile_w: j.tilewidth,
            tile_h: j.tileheight,
            background_color,
            properties: properties_from_json(j.properties)?,
            tilesets: ir_tilesets,
            layers: ir_layers,
        },
        map_dir,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock went backwards")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("tilescroll_json_{nanos}"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn parses_properties_for_map_layer_object_tileset_and_tile() {
        let dir = temp_dir();
        fs::create_dir_all(dir.join("tilesets")).expect("mkdir");
        let map_path = dir.join("map.json");
        let ts_path = dir.join("tilesets/tileset.json");

        let map_json = r##"{
          "width": 2,
          "height": 2,
          "tilewidth": 16,
          "tileheight": 16,
          "backgroundcolor": "#336699",
          "properties": [
            {"name":"gravitation","type":"float","value":9.81},
            {"name":"meter_in_pixel","type":"int","value":32},
            {"name":"sprite_sheet_1","type":"file","value":"hero.png"}
          ],
          "layers": [
            {
              "type":"tilelayer",
              "name":"ground",
              "width":2,
              "height":2,
              "data":[1,0,0,2],
              "properties":[
                {"name":"is_in_foreground","type":"bool","value":true}
              ]
            },
            {
              "type":"objectgroup",
              "name":"actors",
              "objects":[
                {
                  "id": 7,
                  "name":"joe",
                  "type":"actor",
                  "x": 32, "y": 48,
                  "properties":[{"name":"is_player","type":"bool","value":true}]
                }
              ]
            }
          ],
          "tilesets":[{"firstgid":1,"source":"tilesets/tileset.json"}]
        }"##;

        let tileset_json = r#"{
          "tilewidth":16,
          "tileheight":16,
          "tilecount":4,
          "columns":2,
          "image":"tiles.png",
          "tiles":[
            {
              "id":1,
              "properties":[{"name":"solid_above","type":"bool","value":true}],
              "animation":[{"tileid":1,"duration":100},{"tileid":3,"duration":100}]
            }
          ]
        }"#;

        fs::write(&map_path, map_json).expect("failed to write map");
        fs::write(&ts_path, tileset_json).expect("failed to write tileset");

        let (ir, base) = decode_map_file_to_ir(&map_path).expect("decode");

        assert_eq!(base, dir);
        assert_eq!((ir.width, ir.height), (2, 2));
        assert_eq!(ir.background_color, 0x336699);
        assert_eq!(ir.properties.get_f64("gravitation"), Some(9.81));
        assert_eq!(ir.properties.get_i32("meter_in_pixel"), Some(32));
        assert_eq!(ir.properties.get_string("sprite_sheet_1"), Some("hero.png"));
        assert_eq!(ir.layers[0].properties.get_bool("is_in_foreground"), Some(true));

        let objects = ir.layers[1].objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].class_name, "actor");
        assert_eq!((objects[0].x, objects[0].y), (32.0, 48.0));
        assert_eq!(objects[0].properties.get_bool("is_player"), Some(true));

        let ts = &ir.tilesets[0];
        assert_eq!(ts.source_dir.as_deref(), Some(Path::new("tilesets")));
        assert_eq!(ts.image, "tiles.png");
        let tile = ts.tile(1).expect("tile 1 metadata");
        assert_eq!(tile.properties.get_bool("solid_above"), Some(true));
        assert_eq!(tile.animation.len(), 2);
        assert_eq!(tile.animation[1].tile_id, 3);
    }

    #[test]
    fn reads_embedded_tilesets() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
          "layers": [{"type":"tilelayer","name":"l","width":1,"height":1,"data":[3]}],
          "tilesets":[{"firstgid":1,"name":"inline","tilewidth":8,"tileheight":8,
                       "tilecount":4,"columns":2,"image":"inline.png"}]
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let (ir, _) = decode_map_file_to_ir(&map_path).expect("decode");
        assert_eq!(ir.tilesets[0].name, "inline");
        assert!(ir.tilesets[0].source_dir.is_none());
        assert_eq!(ir.tileset_for_gid(Gid(3)), Some((0, 2)));
    }

    #[test]
    fn flattens_group_layers_in_document_order() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
          "properties": [{"name":"gravitation","type":"float","value":9.81}],
          "layers": [
            {"type":"tilelayer","name":"sky","width":1,"height":1,"data":[1]},
            {"type":"group","name":"world",
             "properties":[{"name":"gravitation","type":"float","value":0}],
             "layers":[
               {"type":"imagelayer","name":"hills","image":"hills.png"},
               {"type":"group","name":"cast","layers":[
                 {"type":"objectgroup","name":"actors",
                  "objects":[{"id":3,"name":"joe","type":"actor","x":4,"y":4}]}
               ]}
             ]},
            {"type":"tilelayer","name":"canopy","width":1,"height":1,"data":[0],
             "properties":[{"name":"is_in_foreground","type":"bool","value":true}]}
          ],
          "tilesets":[{"firstgid":1,"name":"t","tilewidth":8,"tileheight":8,
                       "tilecount":1,"columns":1,"image":"t.png"}]
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let (ir, _) = decode_map_file_to_ir(&map_path).expect("decode");
        let names: Vec<&str> = ir.layers.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["sky", "actors", "canopy"]);
        assert_eq!(ir.layers[1].objects()[0].name, "joe");
        assert_eq!(ir.layers[2].properties.get_bool("is_in_foreground"), Some(true));
        assert_eq!(ir.properties.get_f64("gravitation"), Some(9.81));
    }

    #[test]
    fn returns_typed_error_for_malformed_json() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        fs::write(&map_path, "{ not json").expect("failed to write map");

        let err = decode_map_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::Json { .. }));
    }

    #[test]
    fn returns_typed_error_for_missing_tileset_file() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "tilewidth": 16,
          "tileheight": 16,
          "layers": [],
          "tilesets":[{"firstgid":1,"source":"missing_tileset.json"}]
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let err = decode_map_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::Io { .. }));
    }

    #[test]
    fn returns_typed_error_for_invalid_gid_reference() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
          "layers": [{"type":"tilelayer","name":"ground","width":1,"height":1,"data":[99]}],
          "tilesets":[{"firstgid":1,"tilewidth":16,"tileheight":16,"tilecount":1,
                       "columns":1,"image":"tiles.png"}]
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let err = decode_map_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::InvalidTileGid { gid: 99, .. }));
    }

    #[test]
    fn rejects_base64_layer_data() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "width": 1, "height": 1, "tilewidth": 16, "tileheight": 16,
          "layers": [{"type":"tilelayer","name":"ground","width":1,"height":1,
                      "encoding":"base64","data":"AQAAAA=="}],
          "tilesets": []
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let err = decode_map_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::UnsupportedEncoding(_)));
    }

    #[test]
    fn returns_typed_error_for_unknown_property_type() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "tilewidth": 16,
          "tileheight": 16,
          "properties": [
            {"name":"mystery","type":"not_supported","value":"x"}
          ],
          "layers": []
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let err = decode_map_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::UnsupportedPropertyType { .. }));
    }
}
