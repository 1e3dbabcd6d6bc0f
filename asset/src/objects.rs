//! Export and import table records, signed table references, and the
//! resolver that turns them into fully-qualified object paths.

use crate::names::NameTable;
use core::mem::size_of;
use mk11_archive::{Error, GuidLe, Result};
use static_assertions::const_assert_eq;
use tracing::{debug, warn};
use zerocopy::byteorder::{I32, LE, U32, U64};
use zerocopy_derive::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// On-disk export table record.
///
/// The `unk_*` fields are preserved but undocumented.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[allow(missing_docs)]
pub struct ExportRecord {
    /// Signed reference to the object's class.
    pub object_class: I32<LE>,
    /// Signed reference to the containing object.
    pub object_outer_class: I32<LE>,
    /// Name-table index.
    pub object_name: I32<LE>,
    pub object_name_suffix: U32<LE>,
    /// Signed reference to the superclass.
    pub object_super: I32<LE>,
    pub object_flags: U64<LE>,
    pub object_guid: GuidLe,
    /// Name-table index of the owning package.
    pub object_main_package: U32<LE>,
    pub unk_1: U32<LE>,
    /// Size in bytes of the export body.
    pub object_size: U32<LE>,
    /// Absolute offset of the export body within the image.
    pub object_offset: U64<LE>,
    pub unk_2: U64<LE>,
    pub unk_3: U32<LE>,
}

const_assert_eq!(size_of::<ExportRecord>(), 76);

/// On-disk import table record.
#[repr(C)]
#[derive(Clone, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[allow(missing_docs)]
pub struct ImportRecord {
    /// Signed reference to the package or outer object.
    pub import_class_package: I32<LE>,
    /// Name-table index.
    pub import_name: I32<LE>,
    pub import_name_suffix: I32<LE>,
    /// Signed reference to the outer class.
    pub import_outer_class: I32<LE>,
    /// Signed reference; 1 on root entries, 0 otherwise.
    pub object_name: I32<LE>,
}

const_assert_eq!(size_of::<ImportRecord>(), 20);

/// A resolved table reference.
///
/// The signed index convention is: `0` is the None sentinel, positive values
/// reference exports at `v - 1`, negative values reference imports at
/// `-v - 1`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObjectRef {
    /// The sentinel None entry.
    None,
    /// Index into the import table.
    Import(u32),
    /// Index into the export table.
    Export(u32),
}

impl ObjectRef {
    /// Applies the signed index convention, range-checking against the
    /// table lengths.
    pub fn resolve(index: i32, imports: usize, exports: usize) -> Result<Self> {
        let out_of_range = || Error::BadObjectReference {
            index,
            imports,
            exports,
        };
        match index {
            0 => Ok(ObjectRef::None),
            v if v > 0 => {
                let i = (v - 1) as usize;
                if i < exports {
                    Ok(ObjectRef::Export(i as u32))
                } else {
                    Err(out_of_range())
                }
            }
            v => {
                let i = (-(v as i64) - 1) as usize;
                if i < imports {
                    Ok(ObjectRef::Import(i as u32))
                } else {
                    Err(out_of_range())
                }
            }
        }
    }

    /// Returns `true` for the None sentinel.
    pub fn is_none(self) -> bool {
        self == ObjectRef::None
    }
}

/// A resolved export: the raw record plus its names and computed paths.
#[derive(Clone, Debug)]
pub struct Export {
    /// The on-disk record, preserved verbatim.
    pub record: ExportRecord,
    /// Object name from the name table.
    pub name: String,
    /// Numeric name suffix; zero means none.
    pub suffix: u32,
    /// Owning package name.
    pub package: String,
    /// The object's class; its name becomes the file extension.
    pub class: ObjectRef,
    /// The containing object.
    pub outer: ObjectRef,
    /// The superclass.
    pub super_: ObjectRef,
    /// Name of the class object, when `class` is not None.
    pub class_name: Option<String>,
    /// Name of the superclass object, when `super_` is not None.
    pub super_name: Option<String>,
    /// Outer-chain path, empty or `a/b/`.
    pub path: String,
    /// `name[.suffix][.class]`.
    pub file_name: String,
    /// `/package/` + path.
    pub file_dir: String,
    /// `file_dir` + `file_name`.
    pub full_name: String,
}

/// A resolved import.
#[derive(Clone, Debug)]
pub struct Import {
    /// The on-disk record, preserved verbatim.
    pub record: ImportRecord,
    /// Object name from the name table.
    pub name: String,
    /// Numeric name suffix; zero means none.
    pub suffix: i32,
    /// The package chain head.
    pub package: ObjectRef,
    /// The outer class reference.
    pub outer_class: ObjectRef,
    /// Undocumented reference; 1-rooted entries resolve to an export.
    pub unknown: ObjectRef,
    /// Name of the outer class, when present.
    pub outer_class_name: Option<String>,
    /// Package-chain path, `/` or `/a/b/`.
    pub path: String,
    /// `path` + `name[.suffix]`.
    pub full_name: String,
}

/// Node view used by the path walks: every referenced object contributes its
/// name and the next link (outer for exports, package for imports).
struct Nodes<'a> {
    export_names: Vec<&'a str>,
    export_next: Vec<ObjectRef>,
    import_names: Vec<&'a str>,
    import_next: Vec<ObjectRef>,
}

impl<'a> Nodes<'a> {
    fn name(&self, r: ObjectRef) -> Option<&'a str> {
        match r {
            ObjectRef::None => None,
            ObjectRef::Export(i) => Some(self.export_names[i as usize]),
            ObjectRef::Import(i) => Some(self.import_names[i as usize]),
        }
    }

    fn next(&self, r: ObjectRef) -> ObjectRef {
        match r {
            ObjectRef::None => ObjectRef::None,
            ObjectRef::Export(i) => self.export_next[i as usize],
            ObjectRef::Import(i) => self.import_next[i as usize],
        }
    }

    /// Collects chain names from `start`, iteratively, bounded by the table
    /// sizes so a malformed cyclic input cannot hang the walk.
    fn walk(&self, start: ObjectRef) -> Vec<&'a str> {
        let cap = self.export_names.len() + self.import_names.len();
        let mut out = Vec::new();
        let mut current = start;
        while let Some(name) = self.name(current) {
            if out.len() >= cap {
                warn!("reference chain exceeds table sizes, truncating (cyclic input?)");
                break;
            }
            out.push(name);
            current = self.next(current);
        }
        out
    }
}

fn joined(names: &[&str]) -> String {
    let mut parts: Vec<&str> = names.to_vec();
    parts.reverse();
    let mut s = parts.join("/");
    s.push('/');
    s
}

/// Resolves both tables: references, names, and the computed path fields.
pub fn resolve_tables(
    names: &NameTable,
    export_records: &[ExportRecord],
    import_records: &[ImportRecord],
) -> Result<(Vec<Export>, Vec<Import>)> {
    let n_exports = export_records.len();
    let n_imports = import_records.len();

    let mut exports = Vec::with_capacity(n_exports);
    for r in export_records {
        let class = ObjectRef::resolve(r.object_class.get(), n_imports, n_exports)?;
        let outer = ObjectRef::resolve(r.object_outer_class.get(), n_imports, n_exports)?;
        let super_ = ObjectRef::resolve(r.object_super.get(), n_imports, n_exports)?;
        let name = names.get(r.object_name.get() as u32 as u64)?.to_string();
        let package = names.get(r.object_main_package.get() as u64)?.to_string();
        exports.push(Export {
            record: r.clone(),
            name,
            suffix: r.object_name_suffix.get(),
            package,
            class,
            outer,
            super_,
            class_name: None,
            super_name: None,
            path: String::new(),
            file_name: String::new(),
            file_dir: String::new(),
            full_name: String::new(),
        });
    }

    let mut imports = Vec::with_capacity(n_imports);
    for r in import_records {
        let package = ObjectRef::resolve(r.import_class_package.get(), n_imports, n_exports)?;
        let outer_class = ObjectRef::resolve(r.import_outer_class.get(), n_imports, n_exports)?;
        let unknown = ObjectRef::resolve(r.object_name.get(), n_imports, n_exports)?;
        let name = names.get(r.import_name.get() as u32 as u64)?.to_string();
        imports.push(Import {
            record: r.clone(),
            name,
            suffix: r.import_name_suffix.get(),
            package,
            outer_class,
            unknown,
            outer_class_name: None,
            path: String::new(),
            full_name: String::new(),
        });
    }

    let nodes = Nodes {
        export_names: exports.iter().map(|e| e.name.as_str()).collect(),
        export_next: exports.iter().map(|e| e.outer).collect(),
        import_names: imports.iter().map(|i| i.name.as_str()).collect(),
        import_next: imports.iter().map(|i| i.package).collect(),
    };

    struct Computed {
        path: String,
        file_name: String,
        file_dir: String,
        full_name: String,
        class_name: Option<String>,
        super_name: Option<String>,
    }

    let export_computed: Vec<Computed> = exports
        .iter()
        .map(|e| {
            let chain = nodes.walk(e.outer);
            let path = if chain.is_empty() {
                String::new()
            } else {
                joined(&chain)
            };
            let class_name = nodes.name(e.class).map(str::to_string);
            let super_name = nodes.name(e.super_).map(str::to_string);

            let mut file_name = e.name.clone();
            if e.suffix != 0 {
                file_name.push_str(&format!(".{}", e.suffix));
            }
            if let Some(class) = &class_name {
                file_name.push_str(&format!(".{class}"));
            }
            let file_dir = format!("/{}/{}", e.package, path);
            let full_name = format!("{file_dir}{file_name}");
            Computed {
                path,
                file_name,
                file_dir,
                full_name,
                class_name,
                super_name,
            }
        })
        .collect();

    struct ImportComputed {
        path: String,
        full_name: String,
        outer_class_name: Option<String>,
    }

    let import_computed: Vec<ImportComputed> = imports
        .iter()
        .map(|i| {
            let chain = nodes.walk(i.package);
            let path = if chain.is_empty() {
                "/".to_string()
            } else {
                format!("/{}", joined(&chain))
            };
            let mut full_name = format!("{path}{}", i.name);
            if i.suffix != 0 {
                full_name.push_str(&format!(".{}", i.suffix));
            }
            ImportComputed {
                path,
                full_name,
                outer_class_name: nodes.name(i.outer_class).map(str::to_string),
            }
        })
        .collect();

    for (e, c) in exports.iter_mut().zip(export_computed) {
        e.path = c.path;
        e.file_name = c.file_name;
        e.file_dir = c.file_dir;
        e.full_name = c.full_name;
        e.class_name = c.class_name;
        e.super_name = c.super_name;
        debug!(full_name = %e.full_name, "resolved export");
    }
    for (i, c) in imports.iter_mut().zip(import_computed) {
        i.path = c.path;
        i.full_name = c.full_name;
        i.outer_class_name = c.outer_class_name;
        debug!(full_name = %i.full_name, "resolved import");
    }

    Ok((exports, imports))
}
