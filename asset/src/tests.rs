use crate::coverage::Diags;
use crate::names::NameTable;
use crate::objects::{ExportRecord, ImportRecord, ObjectRef};
use crate::properties::{MapKey, PropertyReader, PropertyValue};
use crate::MidwayAsset;
use mk11_archive::tables::{serialize_table_group, EntryLocation, ExternalEntry, ExternalTable};
use mk11_archive::{
    ByteSource, Error, FileSummary, NEG_OFFSET, RESERVED_GAP, SUMMARY_LEN, SUMMARY_MAGIC,
};
use zerocopy::{FromZeros, IntoBytes};

#[static_init::dynamic]
static INIT_LOGGER: () = {
    tracing_subscriber::fmt::fmt()
        .compact()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .with_test_writer()
        .without_time()
        .with_ansi(false)
        .init();
};

fn export_record(
    class: i32,
    outer: i32,
    name_idx: i32,
    suffix: u32,
    super_: i32,
    package_idx: u32,
    rel_offset: u64,
    size: u32,
) -> ExportRecord {
    let mut r = ExportRecord::new_zeroed();
    r.object_class.set(class);
    r.object_outer_class.set(outer);
    r.object_name.set(name_idx);
    r.object_name_suffix.set(suffix);
    r.object_super.set(super_);
    r.object_main_package.set(package_idx);
    r.object_offset.set(rel_offset);
    r.object_size.set(size);
    r
}

fn import_record(package: i32, name_idx: i32, suffix: i32, outer: i32, unknown: i32) -> ImportRecord {
    let mut r = ImportRecord::new_zeroed();
    r.import_class_package.set(package);
    r.import_name.set(name_idx);
    r.import_name_suffix.set(suffix);
    r.import_outer_class.set(outer);
    r.object_name.set(unknown);
    r
}

fn bulk_table(key: u64, name: &str, entries: &[(u64, u64)]) -> ExternalTable {
    ExternalTable {
        reference_key: key,
        name: name.to_string(),
        name_len: name.len() as u32,
        entries: entries
            .iter()
            .map(|&(d_off, d_size)| ExternalEntry {
                decompressed_size: d_size,
                compressed_size: NEG_OFFSET,
                decompressed_offset: d_off,
                compressed_offset: NEG_OFFSET,
                location: EntryLocation::Bulk,
            })
            .collect(),
        compression_flag: 0,
    }
}

/// Builds a midway image laid out the way the archive rebuilder emits it:
/// meta, name table, import table, export table, export bodies, bulk tail.
///
/// `object_offset` on the given export records is relative to the export
/// body region and gets rebased during the build. Bulk entry offsets are
/// relative to the bulk tail and get rebased the same way.
struct ImageBuilder {
    file_name: String,
    names: Vec<String>,
    exports: Vec<ExportRecord>,
    imports: Vec<ImportRecord>,
    psf_tables: Vec<ExternalTable>,
    bulk_tables: Vec<ExternalTable>,
    export_data: Vec<u8>,
    bulk_data: Vec<u8>,
    set_bulk_offset: bool,
}

impl ImageBuilder {
    fn new(file_name: &str, names: &[&str]) -> Self {
        Self {
            file_name: file_name.to_string(),
            names: names.iter().map(|s| s.to_string()).collect(),
            exports: Vec::new(),
            imports: Vec::new(),
            psf_tables: Vec::new(),
            bulk_tables: Vec::new(),
            export_data: Vec::new(),
            bulk_data: Vec::new(),
            set_bulk_offset: false,
        }
    }

    fn build(mut self) -> Vec<u8> {
        let mut name_bytes = Vec::new();
        for name in &self.names {
            name_bytes.extend_from_slice(&(name.len() as u32).to_le_bytes());
            name_bytes.extend_from_slice(name.as_bytes());
        }

        let mut groups = Vec::new();
        serialize_table_group(&self.psf_tables, &mut groups);

        let meta_len_before_bulk = SUMMARY_LEN + 8 + RESERVED_GAP + 4 + self.file_name.len() + 1;

        // Two passes: the bulk group references offsets that depend on the
        // total meta length, which depends on the group's own (fixed) size.
        let mut bulk_groups_probe = Vec::new();
        serialize_table_group(&self.bulk_tables, &mut bulk_groups_probe);
        let meta_len = meta_len_before_bulk + groups.len() + bulk_groups_probe.len();

        let name_off = meta_len as u64;
        let import_off = name_off + name_bytes.len() as u64;
        let export_off = import_off + (self.imports.len() * 20) as u64;
        let exports_location = export_off + (self.exports.len() * 76) as u64;
        let bulk_start = exports_location + self.export_data.len() as u64;

        for e in &mut self.exports {
            let rel = e.object_offset.get();
            e.object_offset.set(exports_location + rel);
        }
        for t in &mut self.bulk_tables {
            for entry in &mut t.entries {
                entry.decompressed_offset += bulk_start;
            }
        }
        let mut bulk_groups = Vec::new();
        serialize_table_group(&self.bulk_tables, &mut bulk_groups);
        assert_eq!(bulk_groups.len(), bulk_groups_probe.len());

        let mut summary = FileSummary::new_zeroed();
        summary.magic.set(SUMMARY_MAGIC);
        summary.midway_four_cc = *b"MK11";
        summary.main_package = *b"MAIN";
        summary.exports_location.set(exports_location as u32);
        summary.name_table.entries.set(self.names.len() as u32);
        summary.name_table.offset.set(name_off);
        summary.import_table.entries.set(self.imports.len() as u32);
        summary.import_table.offset.set(import_off);
        summary.export_table.entries.set(self.exports.len() as u32);
        summary.export_table.offset.set(export_off);
        if self.set_bulk_offset {
            summary.bulk_data_offset.set(bulk_start);
        }

        let mut out = Vec::new();
        out.extend_from_slice(summary.as_bytes());
        out.extend_from_slice(&[0u8; 8]);
        out.extend_from_slice(&[0u8; RESERVED_GAP]);
        out.extend_from_slice(&(self.file_name.len() as u32 + 1).to_le_bytes());
        out.extend_from_slice(self.file_name.as_bytes());
        out.push(0);
        out.extend_from_slice(&groups);
        out.extend_from_slice(&bulk_groups);
        assert_eq!(out.len(), meta_len);
        out.extend_from_slice(&name_bytes);
        for i in &self.imports {
            out.extend_from_slice(i.as_bytes());
        }
        for e in &self.exports {
            out.extend_from_slice(e.as_bytes());
        }
        out.extend_from_slice(&self.export_data);
        out.extend_from_slice(&self.bulk_data);
        out
    }
}

fn minimal_image() -> Vec<u8> {
    let mut b = ImageBuilder::new("DB", &["Core", "Package"]);
    b.export_data = b"hello".to_vec();
    b.exports.push(export_record(0, 0, 0, 0, 0, 1, 0, 5));
    b.build()
}

#[test]
fn parses_minimal_asset() {
    let asset = MidwayAsset::parse(minimal_image(), None).unwrap();
    assert_eq!(asset.file_name, "DB");
    assert_eq!(asset.names.len(), 2);
    assert_eq!(asset.exports.len(), 1);
    assert!(asset.imports.is_empty());

    let export = &asset.exports[0];
    assert_eq!(export.name, "Core");
    assert_eq!(export.package, "Package");
    // A None class adds no extension.
    assert_eq!(export.file_name, "Core");
    assert_eq!(export.file_dir, "/Package/");
    assert_eq!(export.full_name, "/Package/Core");

    assert_eq!(asset.export_data(export).unwrap(), b"hello");
    assert!(!asset.diags.has_errors(), "{}", asset.diags);
}

#[test]
fn meta_size_mismatch_is_fatal() {
    let mut image = minimal_image();
    // name_table.offset lives at summary offset 44.
    let bad = u64::from_le_bytes(image[44..52].try_into().unwrap()) + 1;
    image[44..52].copy_from_slice(&bad.to_le_bytes());
    assert!(matches!(
        MidwayAsset::parse(image, None),
        Err(Error::InvalidMidwayHeader { .. })
    ));
}

#[test]
fn nonzero_compression_flag_is_rejected() {
    let mut image = minimal_image();
    image[SUMMARY_LEN - 4..SUMMARY_LEN].copy_from_slice(&0x0100u32.to_le_bytes());
    assert!(matches!(
        MidwayAsset::parse(image, None),
        Err(Error::InvalidMidwayHeader { .. })
    ));
}

#[test]
fn nonzero_package_counts_are_rejected() {
    let mut image = minimal_image();
    image[SUMMARY_LEN..SUMMARY_LEN + 4].copy_from_slice(&1u32.to_le_bytes());
    assert!(matches!(
        MidwayAsset::parse(image, None),
        Err(Error::InvalidMidwayHeader { .. })
    ));
}

#[test]
fn bad_magic_is_rejected() {
    let mut image = minimal_image();
    image[0] = 0;
    assert!(matches!(
        MidwayAsset::parse(image, None),
        Err(Error::InvalidMidwayHeader { .. })
    ));
}

#[test]
fn reference_index_law() {
    assert_eq!(ObjectRef::resolve(0, 4, 4).unwrap(), ObjectRef::None);
    assert_eq!(ObjectRef::resolve(1, 4, 4).unwrap(), ObjectRef::Export(0));
    assert_eq!(ObjectRef::resolve(4, 4, 4).unwrap(), ObjectRef::Export(3));
    assert_eq!(ObjectRef::resolve(-1, 4, 4).unwrap(), ObjectRef::Import(0));
    assert_eq!(ObjectRef::resolve(-4, 4, 4).unwrap(), ObjectRef::Import(3));
    assert!(matches!(
        ObjectRef::resolve(5, 4, 4),
        Err(Error::BadObjectReference { index: 5, .. })
    ));
    assert!(matches!(
        ObjectRef::resolve(-5, 4, 4),
        Err(Error::BadObjectReference { index: -5, .. })
    ));
    assert!(matches!(
        ObjectRef::resolve(i32::MIN, 4, 4),
        Err(Error::BadObjectReference { .. })
    ));
}

#[test]
fn export_outer_chains_build_paths() {
    let names = ["A", "B", "C", "Pkg", "Texture2D", "Engine"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 3];
    // A at the root, B inside A, C inside B.
    b.exports.push(export_record(0, 0, 0, 0, 0, 3, 0, 1));
    b.exports.push(export_record(-1, 1, 1, 0, 0, 3, 1, 1));
    b.exports.push(export_record(0, 2, 2, 7, 0, 3, 2, 1));
    // The import supplies B's class name.
    b.imports.push(import_record(0, 4, 0, 0, 0));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();

    let a = &asset.exports[0];
    assert_eq!(a.path, "");
    assert_eq!(a.full_name, "/Pkg/A");

    let b_ = &asset.exports[1];
    assert_eq!(b_.path, "A/");
    assert_eq!(b_.class_name.as_deref(), Some("Texture2D"));
    assert_eq!(b_.file_name, "B.Texture2D");
    assert_eq!(b_.full_name, "/Pkg/A/B.Texture2D");

    let c = &asset.exports[2];
    assert_eq!(c.path, "A/B/");
    // The numeric suffix lands before the class extension.
    assert_eq!(c.file_name, "C.7");
    assert_eq!(c.full_name, "/Pkg/A/B/C.7");
}

#[test]
fn import_package_chains_build_paths() {
    let names = ["Engine", "Texture2D", "Core"];
    let mut b = ImageBuilder::new("DB", &names);
    // Root import, then one nested under it.
    b.imports.push(import_record(0, 0, 0, 0, 0));
    b.imports.push(import_record(-1, 1, 0, -1, 0));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();

    let root = &asset.imports[0];
    assert_eq!(root.path, "/");
    assert_eq!(root.full_name, "/Engine");

    let nested = &asset.imports[1];
    assert_eq!(nested.path, "/Engine/");
    assert_eq!(nested.full_name, "/Engine/Texture2D");
    assert_eq!(nested.outer_class_name.as_deref(), Some("Engine"));
}

#[test]
fn cyclic_outer_chain_terminates() {
    let names = ["Loop", "Pkg"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 1];
    // The export's outer chain points back at itself.
    b.exports.push(export_record(0, 1, 0, 0, 0, 1, 0, 1));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    // The walk is capped at the table sizes instead of hanging.
    assert_eq!(asset.exports[0].path, "Loop/");
}

#[test]
fn coverage_reports_gaps_and_overlaps() {
    let names = ["A", "B", "Pkg"];

    // A gap between the two bodies.
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 12];
    b.exports.push(export_record(0, 0, 0, 0, 0, 2, 0, 4));
    b.exports.push(export_record(0, 0, 1, 0, 0, 2, 8, 4));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert_eq!(asset.diags.num_errors, 1);
    assert!(asset.diags.diags[0].message.contains("gap"));

    // Overlapping bodies.
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 12];
    b.exports.push(export_record(0, 0, 0, 0, 0, 2, 0, 8));
    b.exports.push(export_record(0, 0, 1, 0, 0, 2, 4, 8));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert!(asset
        .diags
        .diags
        .iter()
        .any(|d| d.message.contains("overlaps")));

    // Adjacent bodies are silent.
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 12];
    b.exports.push(export_record(0, 0, 0, 0, 0, 2, 0, 6));
    b.exports.push(export_record(0, 0, 1, 0, 0, 2, 6, 6));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert!(!asset.diags.has_errors(), "{}", asset.diags);
}

#[test]
fn bulk_owned_tail_is_not_an_error() {
    let names = ["A", "Pkg"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 4];
    b.bulk_data = vec![0x5Au8; 8];
    b.exports.push(export_record(0, 0, 0, 0, 0, 1, 0, 4));
    // One bulk entry owning the whole tail, starting exactly at the end of
    // the export region.
    b.bulk_tables.push(bulk_table(0xCAFE, "BulkPack", &[(0, 8)]));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert!(!asset.diags.has_errors(), "{}", asset.diags);
    assert_eq!(asset.bulk_map.get(&0xCAFE), Some(&0));
}

#[test]
fn bulk_data_offset_bounds_the_export_region() {
    let names = ["A", "Pkg"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 4];
    b.bulk_data = vec![0u8; 16];
    b.exports.push(export_record(0, 0, 0, 0, 0, 1, 0, 4));
    // With the summary's bulk offset set, exports only have to cover up to
    // it; the tail after it is not theirs.
    b.bulk_tables.push(bulk_table(0xCAFE, "BulkPack", &[(0, 16)]));
    b.set_bulk_offset = true;
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert!(!asset.diags.has_errors(), "{}", asset.diags);
    assert_ne!(asset.summary.bulk_data_offset.get(), 0);
}

#[test]
fn missing_bulk_tail_reports_ends_early() {
    let names = ["A", "Pkg"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 4];
    b.bulk_data = vec![0u8; 8];
    b.exports.push(export_record(0, 0, 0, 0, 0, 1, 0, 4));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert!(asset
        .diags
        .diags
        .iter()
        .any(|d| d.message.contains("ends early")));
}

#[test]
fn export_data_out_of_bounds_is_eof() {
    let names = ["A", "Pkg"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 4];
    b.exports.push(export_record(0, 0, 0, 0, 0, 1, 0, 64));
    let asset = MidwayAsset::parse(b.build(), None).unwrap();
    assert!(matches!(
        asset.export_data(&asset.exports[0]),
        Err(Error::Eof { .. })
    ));
}

// ---- property stream tests -------------------------------------------------

/// Builds a property stream and its name table together, interning names on
/// first use.
struct PropStream {
    names: Vec<String>,
    buf: Vec<u8>,
}

impl PropStream {
    fn new() -> Self {
        Self {
            names: vec!["None".to_string()],
            buf: Vec::new(),
        }
    }

    fn idx(&mut self, name: &str) -> u64 {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return i as u64;
        }
        self.names.push(name.to_string());
        (self.names.len() - 1) as u64
    }

    fn name(&mut self, name: &str) -> &mut Self {
        let i = self.idx(name);
        self.buf.extend_from_slice(&i.to_le_bytes());
        self
    }

    fn tag(&mut self, name: &str, type_name: &str, size: u64) -> &mut Self {
        self.name(name);
        self.name(type_name);
        self.buf.extend_from_slice(&size.to_le_bytes());
        self
    }

    fn u8v(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    fn u32v(&mut self, v: u32) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn u64v(&mut self, v: u64) -> &mut Self {
        self.buf.extend_from_slice(&v.to_le_bytes());
        self
    }

    fn bytes(&mut self, b: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(b);
        self
    }

    fn none(&mut self) -> &mut Self {
        self.name("None")
    }

    fn table(&self) -> NameTable {
        NameTable::new(self.names.clone())
    }
}

#[test]
fn scalar_properties_decode() {
    let mut s = PropStream::new();
    s.tag("Count", "IntProperty", 4).u32v(0xFFFF_FFFE);
    s.tag("Scale", "FloatProperty", 4)
        .bytes(&1.5f32.to_le_bytes());
    s.tag("Enabled", "BoolProperty", 4).u32v(1);
    s.tag("Hash", "QWordProperty", 8).u64v(0xDEAD_BEEF);
    s.tag("Label", "StrProperty", 9).u32v(5).bytes(b"hello");
    s.tag("Ref", "NameProperty", 8);
    let i = s.idx("Target");
    s.u64v(i);
    s.none();

    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    let props = r.parse_all().unwrap();

    assert_eq!(props.len(), 6);
    assert_eq!(props[0], ("Count".into(), PropertyValue::Int(-2)));
    assert_eq!(props[1], ("Scale".into(), PropertyValue::Float(1.5)));
    assert_eq!(props[2], ("Enabled".into(), PropertyValue::Bool(true)));
    assert_eq!(props[3], ("Hash".into(), PropertyValue::UInt(0xDEAD_BEEF)));
    assert_eq!(props[4], ("Label".into(), PropertyValue::Str("hello".into())));
    assert_eq!(props[5], ("Ref".into(), PropertyValue::Name("Target".into())));
}

#[test]
fn stream_consumes_exactly_to_terminator() {
    let mut s = PropStream::new();
    s.tag("Count", "IntProperty", 4).u32v(7);
    s.none();
    let end = s.buf.len() as u64;
    s.bytes(&[0xAA; 16]);

    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    r.parse_all().unwrap();
    assert_eq!(r.position(), end);
}

#[test]
fn enum_property_renders_through_the_field_table() {
    // A Texture2D `Format` of 22 is PF_BC7.
    let mut s = PropStream::new();
    s.tag("Format", "EnumProperty", 1).u8v(22);
    s.none();

    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    let props = r.parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Enum {
            scope: "EPixelFormat".into(),
            value: "PF_BC7".into()
        }
    );
}

#[test]
fn unmapped_enum_renders_numerically() {
    let mut s = PropStream::new();
    s.tag("SomeField", "EnumProperty", 4).u32v(9);
    s.none();

    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    let props = r.parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Enum {
            scope: "SomeField".into(),
            value: "9".into()
        }
    );
}

#[test]
fn zero_size_is_legal_only_for_bool() {
    let mut s = PropStream::new();
    s.tag("Enabled", "BoolProperty", 0).u32v(0);
    s.none();
    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    let props = r.parse_all().unwrap();
    assert_eq!(props[0].1, PropertyValue::Bool(false));

    let mut s = PropStream::new();
    s.tag("Count", "IntProperty", 0);
    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    assert!(matches!(
        r.parse_all(),
        Err(Error::ZeroSizedProperty { .. })
    ));
}

#[test]
fn declared_size_must_match_consumption() {
    let mut s = PropStream::new();
    s.tag("Count", "IntProperty", 8).u32v(7).u32v(0);
    s.none();
    let table = s.table();
    // 8 bytes declared and 8 read: fine.
    let mut r = PropertyReader::new(&s.buf, &table);
    r.parse_all().unwrap();

    let mut s = PropStream::new();
    s.tag("Label", "StrProperty", 20).u32v(5).bytes(b"hello");
    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    assert!(matches!(
        r.parse_all(),
        Err(Error::PropertySizeMismatch { expected: 20, actual: 9, .. })
    ));
}

#[test]
fn guid_struct_decodes_canonically() {
    let mut s = PropStream::new();
    s.tag("Id", "StructProperty", 16);
    s.name("FGuid");
    s.bytes(&[
        0x78, 0x56, 0x34, 0x12, 0xCD, 0xAB, 0xF0, 0xDE, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07,
        0x08,
    ]);
    s.none();

    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    let props = r.parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Str("12345678-ABCD-DEF0-0102-030405060708".into())
    );
}

#[test]
fn nested_struct_decodes_until_terminator() {
    let mut s = PropStream::new();
    // Outer struct holds one int and the terminator; the struct-type name
    // precedes the counted region.
    let inner_len = 8 + 8 + 8 + 4 + 8;
    s.tag("Handle", "StructProperty", inner_len as u64);
    s.name("FItemDefinitionHandle");
    s.tag("mValue", "IntProperty", 4).u32v(42);
    s.none();
    s.none();

    let table = s.table();
    let mut r = PropertyReader::new(&s.buf, &table);
    let props = r.parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Struct(vec![("mValue".into(), PropertyValue::Int(42))])
    );
}

#[test]
fn array_element_types_come_from_the_name() {
    // u32 elements.
    let mut s = PropStream::new();
    s.tag("mUnlockPagesSentForOnline", "ArrayProperty", 4 + 8)
        .u32v(2)
        .u32v(10)
        .u32v(20);
    s.none();
    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Array(vec![PropertyValue::UInt(10), PropertyValue::UInt(20)])
    );

    // Name elements.
    let mut s = PropStream::new();
    let a = s.idx("UnlockA");
    let b = s.idx("UnlockB");
    s.tag("mUnlockedByDefault", "ArrayProperty", 4 + 16)
        .u32v(2)
        .u64v(a)
        .u64v(b);
    s.none();
    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Array(vec![
            PropertyValue::Name("UnlockA".into()),
            PropertyValue::Name("UnlockB".into())
        ])
    );

    // Anything else is a headerless struct stream per element.
    let mut s = PropStream::new();
    let body = 4 + (8 + 8 + 8 + 4) + 8;
    s.tag("mUnlocks", "ArrayProperty", body as u64).u32v(1);
    s.tag("mCount", "IntProperty", 4).u32v(3);
    s.none();
    s.none();
    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    assert_eq!(
        props[0].1,
        PropertyValue::Array(vec![PropertyValue::Struct(vec![(
            "mCount".into(),
            PropertyValue::Int(3)
        )])])
    );
}

#[test]
fn multimap_accumulates_values_per_key() {
    let mut s = PropStream::new();
    let a = s.idx("UnlockA");
    let b = s.idx("UnlockB");
    let c = s.idx("UnlockC");
    let body = 4 + 3 * (1 + 8);
    s.tag("mUnlockTypeMap", "MapProperty", body as u64).u32v(3);
    s.u8v(1).u64v(a);
    s.u8v(1).u64v(b);
    s.u8v(2).u64v(c);
    s.none();

    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    let PropertyValue::Map(entries) = &props[0].1 else {
        panic!("expected a map");
    };
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].0, MapKey::UInt(1));
    assert_eq!(
        entries[0].1,
        PropertyValue::Array(vec![
            PropertyValue::Name("UnlockA".into()),
            PropertyValue::Name("UnlockB".into())
        ])
    );
    assert_eq!(entries[1].0, MapKey::UInt(2));
}

#[test]
fn unlock_name_map_pairs_slots() {
    let mut s = PropStream::new();
    let k = s.idx("UnlockA");
    let body = 4 + (8 + 4 + 4);
    s.tag("mUnlockNameMap", "MapProperty", body as u64).u32v(1);
    s.u64v(k).u32v(3).u32v(9);
    s.none();

    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    let PropertyValue::Map(entries) = &props[0].1 else {
        panic!("expected a map");
    };
    assert_eq!(entries[0].0, MapKey::Name("UnlockA".into()));
    assert_eq!(
        entries[0].1,
        PropertyValue::Map(vec![(MapKey::UInt(3), PropertyValue::UInt(9))])
    );
}

#[test]
fn duplicate_key_in_plain_map_is_fatal() {
    let mut s = PropStream::new();
    let k = s.idx("UnlockA");
    let body = 4 + 2 * (8 + 4 + 4);
    s.tag("mUnlockNameMap", "MapProperty", body as u64).u32v(2);
    s.u64v(k).u32v(1).u32v(1);
    s.u64v(k).u32v(2).u32v(2);
    s.none();

    let table = s.table();
    assert!(matches!(
        PropertyReader::new(&s.buf, &table).parse_all(),
        Err(Error::DuplicateMapKey { .. })
    ));
}

#[test]
fn struct_keyed_map_unwraps_single_field_keys() {
    let mut s = PropStream::new();
    let handle = s.idx("HandleA");
    // Key struct: one NameProperty plus the terminator, then a u8 value.
    let key_len = (8 + 8 + 8 + 8) + 8;
    let body = 4 + key_len + 1;
    s.tag("DefaultUnlocks", "MapProperty", body as u64).u32v(1);
    s.tag("mName", "NameProperty", 8).u64v(handle);
    s.none();
    s.u8v(5);
    s.none();

    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    let PropertyValue::Map(entries) = &props[0].1 else {
        panic!("expected a map");
    };
    assert_eq!(entries[0].0, MapKey::Name("HandleA".into()));
    assert_eq!(entries[0].1, PropertyValue::UInt(5));
}

#[test]
fn string_keyed_map_holds_struct_values() {
    let mut s = PropStream::new();
    let value_len = (8 + 8 + 8 + 4) + 8;
    let body = 4 + (4 + 3) + value_len;
    s.tag("NameToItemHandleLookup", "MapProperty", body as u64)
        .u32v(1);
    s.u32v(3).bytes(b"key");
    s.tag("mId", "IntProperty", 4).u32v(1);
    s.none();
    s.none();

    let table = s.table();
    let props = PropertyReader::new(&s.buf, &table).parse_all().unwrap();
    let PropertyValue::Map(entries) = &props[0].1 else {
        panic!("expected a map");
    };
    assert_eq!(entries[0].0, MapKey::Str("key".into()));
    assert_eq!(
        entries[0].1,
        PropertyValue::Struct(vec![("mId".into(), PropertyValue::Int(1))])
    );
}

#[test]
fn unknown_map_and_type_tags_are_fatal() {
    let mut s = PropStream::new();
    s.tag("mMysteryMap", "MapProperty", 4).u32v(0);
    let table = s.table();
    assert!(matches!(
        PropertyReader::new(&s.buf, &table).parse_all(),
        Err(Error::UnsupportedMapKind { .. })
    ));

    let mut s = PropStream::new();
    s.tag("Weird", "VectorProperty", 4).u32v(0);
    let table = s.table();
    assert!(matches!(
        PropertyReader::new(&s.buf, &table).parse_all(),
        Err(Error::UnsupportedPropertyType { .. })
    ));
}

#[test]
fn psf_coverage_reads_the_companion_stream() {
    let names = ["Core", "Package"];
    let mut b = ImageBuilder::new("DB", &names);
    b.export_data = vec![0u8; 4];
    b.exports.push(export_record(0, 0, 0, 0, 0, 1, 0, 4));
    b.psf_tables.push(ExternalTable {
        reference_key: 0xFEED,
        name: "CharPack".into(),
        name_len: 8,
        entries: vec![ExternalEntry {
            decompressed_size: 0x20,
            compressed_size: 0x20,
            decompressed_offset: 0,
            compressed_offset: 0,
            location: EntryLocation::Psf,
        }],
        compression_flag: 0,
    });
    let image = b.build();

    // A companion stream exactly covered by the single entry.
    let psf = ByteSource::from_vec(vec![0x11u8; 0x20]);
    let asset = MidwayAsset::parse(image.clone(), Some(psf)).unwrap();
    assert!(!asset.diags.has_errors(), "{}", asset.diags);
    assert_eq!(asset.psf_map.get(&0xFEED), Some(&0));

    // A longer stream leaves an uncovered tail.
    let psf = ByteSource::from_vec(vec![0x11u8; 0x40]);
    let asset = MidwayAsset::parse(image.clone(), Some(psf)).unwrap();
    assert!(asset.diags.has_errors());

    // No stream at all only warns.
    let asset = MidwayAsset::parse(image, None).unwrap();
    assert!(!asset.diags.has_errors());
    assert_eq!(asset.diags.num_warnings, 1);
}

#[test]
fn diags_format_and_count() {
    let mut diags = Diags::new();
    diags.error("broken");
    diags.warning("suspicious");
    assert!(diags.has_errors());
    assert_eq!(diags.num_errors, 1);
    assert_eq!(diags.num_warnings, 1);
    let rendered = diags.to_string();
    assert!(rendered.contains("error: broken"));
    assert!(rendered.contains("warning: suspicious"));
}
