//! The tagged-property decoder for export bodies.
//!
//! A property stream is a sequence of tags, each carrying a name-table index
//! for its name, another for its type, and a byte size for its value. A tag
//! named `None` terminates the stream. Containers (structs, arrays, maps)
//! nest recursively; array element types and map key/value types are not
//! stored on disk and come from closed per-name classification tables.

use crate::enums::{EnumTable, MK11};
use crate::names::NameTable;
use mk11_archive::{Error, GuidLe, Parser, Result};
use std::collections::BTreeSet;
use tracing::warn;

/// A decoded property value.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    /// `StrProperty`.
    Str(String),
    /// `NameProperty`: a name-table string.
    Name(String),
    /// `IntProperty`, any width.
    Int(i64),
    /// `FloatProperty`.
    Float(f32),
    /// `BoolProperty`.
    Bool(bool),
    /// `DWordProperty` / `QWordProperty`, any width.
    UInt(u64),
    /// `EnumProperty`, rendered as `scope::value`.
    Enum {
        /// Enum type name, or the field name when unmapped.
        scope: String,
        /// Variant name, or the numeric value when unmapped.
        value: String,
    },
    /// `StructProperty`: nested fields in stream order.
    Struct(Vec<(String, PropertyValue)>),
    /// `ArrayProperty`.
    Array(Vec<PropertyValue>),
    /// `MapProperty`: pairs in stream order; multimap values are arrays.
    Map(Vec<(MapKey, PropertyValue)>),
}

/// A map key. Only hashable scalar shapes are allowed to key a map.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MapKey {
    /// A name-table string.
    Name(String),
    /// A literal string.
    Str(String),
    /// An unsigned value.
    UInt(u64),
}

impl std::fmt::Display for MapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapKey::Name(s) | MapKey::Str(s) => f.write_str(s),
            MapKey::UInt(v) => write!(f, "{v}"),
        }
    }
}

impl MapKey {
    fn from_value(value: PropertyValue, map: &str) -> Result<Self> {
        match value {
            PropertyValue::Name(s) => Ok(MapKey::Name(s)),
            PropertyValue::Str(s) => Ok(MapKey::Str(s)),
            PropertyValue::UInt(v) => Ok(MapKey::UInt(v)),
            PropertyValue::Int(v) => Ok(MapKey::UInt(v as u64)),
            _ => Err(Error::UnsupportedMapKind { map: map.into() }),
        }
    }
}

/// Array property names known to hold headerless struct streams. Names
/// outside this set still decode that way, but warn once per decode run.
const KNOWN_STRUCT_ARRAYS: &[&str] = &[
    "mUnlockPages",
    "mUnlocks",
    "mItems",
    "mAudioMapping",
    "Characters",
    "Sockets",
    "DefaultItems",
    "DefaultCharacterLoadouts",
    "States",
    "Challenges",
    "Attributes",
    "Slots",
    "ItemSequences",
    "Items",
    "Parameters",
    "ItemPrerequisites",
    "VisualAssets",
    "PlayerStatChallenges",
];

/// Decodes one export body's property stream.
pub struct PropertyReader<'a> {
    p: Parser<'a>,
    names: &'a NameTable,
    enums: &'a EnumTable,
    /// Array names already warned about, scoped to this decode run.
    warned: BTreeSet<String>,
}

impl<'a> PropertyReader<'a> {
    /// Starts a reader over an export body with the MK11 enum table.
    pub fn new(data: &'a [u8], names: &'a NameTable) -> Self {
        Self::with_enums(data, names, &MK11)
    }

    /// Starts a reader with a caller-supplied enum table.
    pub fn with_enums(data: &'a [u8], names: &'a NameTable, enums: &'a EnumTable) -> Self {
        Self {
            p: Parser::new(data),
            names,
            enums,
            warned: BTreeSet::new(),
        }
    }

    /// Offset within the body.
    pub fn position(&self) -> u64 {
        self.p.position()
    }

    /// Returns `true` once the body is exhausted.
    pub fn is_empty(&self) -> bool {
        self.p.is_empty()
    }

    /// Reads properties until the terminating `None` tag or the end of the
    /// body.
    pub fn parse_all(&mut self) -> Result<Vec<(String, PropertyValue)>> {
        let mut out = Vec::new();
        while !self.p.is_empty() {
            match self.parse_once()? {
                Some(field) => out.push(field),
                None => break,
            }
        }
        Ok(out)
    }

    /// Reads one tag. Returns `None` on the terminating tag.
    pub fn parse_once(&mut self) -> Result<Option<(String, PropertyValue)>> {
        let name = self.read_name()?;
        if name == "None" {
            return Ok(None);
        }
        let type_name = self.read_name()?;
        let mut size = self.p.u64()?;
        if size == 0 {
            // Cooked bools legitimately declare a zero size; everything else
            // with one is corrupt.
            if type_name == "BoolProperty" {
                size = 4;
            } else {
                return Err(Error::ZeroSizedProperty {
                    name,
                    type_name,
                });
            }
        }

        let value = self.read_value(&name, &type_name, size)?;
        Ok(Some((name, value)))
    }

    fn read_name(&mut self) -> Result<String> {
        let index = self.p.u64()?;
        Ok(self.names.get(index)?.to_string())
    }

    fn check_size(&self, name: &str, size: u64, start: u64) -> Result<()> {
        let consumed = self.p.position() - start;
        if consumed != size {
            return Err(Error::PropertySizeMismatch {
                name: name.to_string(),
                expected: size,
                actual: consumed,
            });
        }
        Ok(())
    }

    fn read_value(&mut self, name: &str, type_name: &str, size: u64) -> Result<PropertyValue> {
        // Struct headers precede the counted region.
        if type_name == "StructProperty" {
            let struct_type = self.read_name()?;
            let start = self.p.position();
            let value = if struct_type == "FGuid" {
                let guid: GuidLe = self.p.record()?;
                PropertyValue::Str(guid.to_string())
            } else {
                PropertyValue::Struct(self.read_struct_body()?)
            };
            self.check_size(name, size, start)?;
            return Ok(value);
        }

        let start = self.p.position();
        let value = match type_name {
            "StrProperty" => {
                let len = self.p.u32()?;
                PropertyValue::Str(self.p.ascii(len as usize)?)
            }
            "NameProperty" => PropertyValue::Name(self.read_name()?),
            "IntProperty" => PropertyValue::Int(self.p.int(size as usize)?),
            "FloatProperty" => PropertyValue::Float(self.p.f32()?),
            "BoolProperty" => PropertyValue::Bool(self.p.u32()? == 1),
            "DWordProperty" | "QWordProperty" => PropertyValue::UInt(self.p.uint(size as usize)?),
            "EnumProperty" => {
                let raw = self.p.uint(size as usize)?;
                self.render_enum(name, raw)
            }
            "ArrayProperty" => self.read_array(name)?,
            "MapProperty" => self.read_map(name)?,
            _ => {
                return Err(Error::UnsupportedPropertyType {
                    type_name: type_name.to_string(),
                })
            }
        };
        self.check_size(name, size, start)?;
        Ok(value)
    }

    fn render_enum(&self, field: &str, raw: u64) -> PropertyValue {
        match self.enums.lookup(field) {
            Some(def) => match def.variant(raw) {
                Some(variant) => PropertyValue::Enum {
                    scope: def.name.to_string(),
                    value: variant.to_string(),
                },
                None => {
                    warn!(field, value = raw, enum_name = def.name, "unknown enum variant");
                    PropertyValue::Enum {
                        scope: def.name.to_string(),
                        value: raw.to_string(),
                    }
                }
            },
            None => PropertyValue::Enum {
                scope: field.to_string(),
                value: raw.to_string(),
            },
        }
    }

    /// A nested tag stream terminated by a `None` tag.
    fn read_struct_body(&mut self) -> Result<Vec<(String, PropertyValue)>> {
        let mut fields = Vec::new();
        while let Some(field) = self.parse_once()? {
            fields.push(field);
        }
        Ok(fields)
    }

    fn read_array(&mut self, name: &str) -> Result<PropertyValue> {
        let count = self.p.u32()?;
        let mut values = Vec::with_capacity(count as usize);
        match name {
            "mUnlockPagesSentForOnline" => {
                for _ in 0..count {
                    values.push(PropertyValue::UInt(self.p.u32()? as u64));
                }
            }
            "mUnlockedByDefault" | "mUnlockedForDev" => {
                for _ in 0..count {
                    values.push(PropertyValue::Name(self.read_name()?));
                }
            }
            _ => {
                if !KNOWN_STRUCT_ARRAYS.contains(&name) && self.warned.insert(name.to_string()) {
                    warn!(name, "array element type is not officially known, decoding as struct stream");
                }
                for _ in 0..count {
                    values.push(PropertyValue::Struct(self.read_struct_body()?));
                }
            }
        }
        Ok(PropertyValue::Array(values))
    }

    fn read_map(&mut self, name: &str) -> Result<PropertyValue> {
        // The key/value shapes come from the closed per-name table; an
        // unknown map is fatal before any element is touched.
        let kind = match name {
            "mUnlockNameMap" => MapKind::UnlockName,
            "mUnlockTypeMap" => MapKind::UnlockType,
            "DefaultUnlocks" => MapKind::DefaultUnlocks,
            "NameToItemHandleLookup" => MapKind::NameToHandle,
            _ => return Err(Error::UnsupportedMapKind { map: name.into() }),
        };

        let count = self.p.u32()?;
        let mut entries: Vec<(MapKey, PropertyValue)> = Vec::with_capacity(count as usize);

        for _ in 0..count {
            match kind {
                // TMap<FName, int64>: the value is a pair of 32-bit slots.
                MapKind::UnlockName => {
                    let key = MapKey::Name(self.read_name()?);
                    let slot_key = self.p.u32()? as u64;
                    let slot_value = self.p.u32()? as u64;
                    let value = PropertyValue::Map(vec![(
                        MapKey::UInt(slot_key),
                        PropertyValue::UInt(slot_value),
                    )]);
                    insert_unique(&mut entries, key, value, name)?;
                }
                // TMultiMap<uchar, FName>: values accumulate into lists.
                MapKind::UnlockType => {
                    let key = MapKey::UInt(self.p.u8()? as u64);
                    let value = PropertyValue::Name(self.read_name()?);
                    insert_multi(&mut entries, key, value);
                }
                // TMap<FItemDefinitionHandle, int32>: the struct key must
                // collapse to its single field.
                MapKind::DefaultUnlocks => {
                    let fields = self.read_struct_body()?;
                    if fields.len() != 1 {
                        return Err(Error::UnsupportedMapKind { map: name.into() });
                    }
                    let key = MapKey::from_value(fields.into_iter().next().unwrap().1, name)?;
                    let value = PropertyValue::UInt(self.p.u8()? as u64);
                    insert_unique(&mut entries, key, value, name)?;
                }
                // TMap<FString, FItemDefinitionHandle>.
                MapKind::NameToHandle => {
                    let len = self.p.u32()?;
                    let key = MapKey::Str(self.p.ascii(len as usize)?);
                    let value = PropertyValue::Struct(self.read_struct_body()?);
                    insert_unique(&mut entries, key, value, name)?;
                }
            }
        }

        Ok(PropertyValue::Map(entries))
    }
}

#[derive(Clone, Copy)]
enum MapKind {
    UnlockName,
    UnlockType,
    DefaultUnlocks,
    NameToHandle,
}

fn insert_unique(
    entries: &mut Vec<(MapKey, PropertyValue)>,
    key: MapKey,
    value: PropertyValue,
    map: &str,
) -> Result<()> {
    if entries.iter().any(|(k, _)| *k == key) {
        return Err(Error::DuplicateMapKey {
            map: map.to_string(),
            key: key.to_string(),
        });
    }
    entries.push((key, value));
    Ok(())
}

fn insert_multi(entries: &mut Vec<(MapKey, PropertyValue)>, key: MapKey, value: PropertyValue) {
    if let Some((_, existing)) = entries.iter_mut().find(|(k, _)| *k == key) {
        if let PropertyValue::Array(list) = existing {
            list.push(value);
            return;
        }
    }
    entries.push((key, PropertyValue::Array(vec![value])));
}
