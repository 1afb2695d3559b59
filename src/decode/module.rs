//! The immutable parsed module representation (spec.md §3 `Module`).

use crate::types::{
    CompositeType, FuncIndex, GlobalIndex, MemIndex, TableIndex, TypeIndex, ValueType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Func,
    Table,
    Memory,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableType {
    pub element_type: ValueType,
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub min: u64,
    pub max: Option<u64>,
    pub is_memory64: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    Func(TypeIndex),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub field: String,
    pub desc: ImportDesc,
}

impl Import {
    pub fn kind(&self) -> ImportKind {
        match self.desc {
            ImportDesc::Func(_) => ImportKind::Func,
            ImportDesc::Table(_) => ImportKind::Table,
            ImportDesc::Memory(_) => ImportKind::Memory,
            ImportDesc::Global(_) => ImportKind::Global,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExportKind,
    pub index: u32,
}

/// A defined global: its type plus the raw, unparsed bytes of its init
/// expression (spec.md §4.1: "Init expressions are not interpreted; their
/// raw bytes are stored").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Global {
    pub ty: GlobalType,
    pub init_expr: Vec<u8>,
}

/// A function body as decoded from the code section: declared locals plus
/// the unparsed instruction bytes (spec.md §3 "Leaves instruction bodies
/// unparsed").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBody {
    /// `(count, type)` run-length-encoded local group declarations.
    pub local_groups: Vec<(u32, ValueType)>,
    pub code: Vec<u8>,
}

impl FunctionBody {
    /// Expand the run-length-encoded groups into one [`ValueType`] per
    /// declared local (excluding parameters, which come from the function's
    /// signature).
    pub fn expand_locals(&self) -> Vec<ValueType> {
        let mut out = Vec::new();
        for &(count, ty) in &self.local_groups {
            out.extend(std::iter::repeat(ty).take(count as usize));
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementMode {
    /// Active segment targeting `table_idx` at the offset given by the
    /// init expression.
    Active { table_idx: TableIndex },
    Passive,
    Declarative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSegment {
    pub mode: ElementMode,
    pub element_type: ValueType,
    pub offset_expr: Vec<u8>,
    pub func_indices: Vec<FuncIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Active { mem_idx: MemIndex },
    Passive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub mode: DataMode,
    pub offset_expr: Vec<u8>,
    pub bytes: Vec<u8>,
}

/// The fully decoded, read-only module (spec.md §3). Instruction bodies are
/// left as raw byte slices; the validator and code generator each walk them
/// independently via [`crate::opcode::InstrReader`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Module {
    pub types: Vec<CompositeType>,
    pub imports: Vec<Import>,
    /// Type indices of *defined* (non-imported) functions, in function-index
    /// order starting right after the imported functions.
    pub func_types: Vec<TypeIndex>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub elements: Vec<ElementSegment>,
    pub code: Vec<FunctionBody>,
    pub data: Vec<DataSegment>,
    pub data_count: Option<u32>,
    pub start: Option<FuncIndex>,
    /// Debug names harvested from the `name` custom section, keyed by
    /// absolute function index (imports included).
    pub func_names: std::collections::BTreeMap<FuncIndex, String>,
    /// Debug names for locals, keyed by `(func_idx, local_idx)` — a
    /// diagnostics-only enrichment (SPEC_FULL.md §E.4).
    pub local_names: std::collections::BTreeMap<(FuncIndex, u32), String>,
}

impl Module {
    pub fn num_imported_funcs(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| i.kind() == ImportKind::Func)
            .count() as u32
    }

    pub fn num_imported_globals(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| i.kind() == ImportKind::Global)
            .count() as u32
    }

    pub fn num_imported_tables(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| i.kind() == ImportKind::Table)
            .count() as u32
    }

    pub fn num_imported_memories(&self) -> u32 {
        self.imports
            .iter()
            .filter(|i| i.kind() == ImportKind::Memory)
            .count() as u32
    }

    /// Total number of functions in the function index space: imports then
    /// defined functions (spec.md §3 invariant).
    pub fn total_funcs(&self) -> u32 {
        self.num_imported_funcs() + self.func_types.len() as u32
    }

    /// Resolve a function index (import or defined) to its type index.
    pub fn func_type_index(&self, func_idx: FuncIndex) -> Option<TypeIndex> {
        let num_imported = self.num_imported_funcs();
        if func_idx < num_imported {
            let mut seen = 0u32;
            for import in &self.imports {
                if let ImportDesc::Func(ty) = &import.desc {
                    if seen == func_idx {
                        return Some(*ty);
                    }
                    seen += 1;
                }
            }
            None
        } else {
            self.func_types
                .get((func_idx - num_imported) as usize)
                .copied()
        }
    }

    /// Resolve a global index (import or defined) to its [`GlobalType`].
    pub fn global_type(&self, global_idx: GlobalIndex) -> Option<GlobalType> {
        let num_imported = self.num_imported_globals();
        if global_idx < num_imported {
            let mut seen = 0u32;
            for import in &self.imports {
                if let ImportDesc::Global(ty) = &import.desc {
                    if seen == global_idx {
                        return Some(*ty);
                    }
                    seen += 1;
                }
            }
            None
        } else {
            self.globals
                .get((global_idx - num_imported) as usize)
                .map(|g| g.ty)
        }
    }

    /// Resolve a table index (import or defined) to its [`TableType`].
    pub fn table_type(&self, table_idx: TableIndex) -> Option<&TableType> {
        let num_imported = self.num_imported_tables();
        if table_idx < num_imported {
            let mut seen = 0u32;
            for import in &self.imports {
                if let ImportDesc::Table(ty) = &import.desc {
                    if seen == table_idx {
                        return Some(ty);
                    }
                    seen += 1;
                }
            }
            None
        } else {
            self.tables.get((table_idx - num_imported) as usize)
        }
    }

    /// Resolve a memory index (import or defined) to its [`MemoryType`].
    pub fn memory_type(&self, mem_idx: MemIndex) -> Option<MemoryType> {
        let num_imported = self.num_imported_memories();
        if mem_idx < num_imported {
            let mut seen = 0u32;
            for import in &self.imports {
                if let ImportDesc::Memory(ty) = &import.desc {
                    if seen == mem_idx {
                        return Some(*ty);
                    }
                    seen += 1;
                }
            }
            None
        } else {
            self.memories
                .get((mem_idx - num_imported) as usize)
                .copied()
        }
    }
}
