//! The closed value-type and composite-type sum types (spec.md §3).

use std::fmt;

/// Index into the module's type vector (spec.md §3: "identified by an
/// integer type index").
pub type TypeIndex = u32;
pub type FuncIndex = u32;
pub type TableIndex = u32;
pub type MemIndex = u32;
pub type GlobalIndex = u32;
pub type LocalIndex = u32;
pub type TagIndex = u32;
pub type ElemIndex = u32;
pub type DataIndex = u32;

/// A WebAssembly value type, including packed storage-only kinds and the GC
/// reference-type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    /// Packed 8-bit storage type; only valid as a struct/array field.
    I8,
    /// Packed 16-bit storage type; only valid as a struct/array field.
    I16,
    FuncRef,
    ExternRef,
    AnyRef,
    EqRef,
    I31Ref,
    StructRef,
    ArrayRef,
    NullFuncRef,
    NullExternRef,
    NullRef,
}

impl ValueType {
    pub fn is_reference(self) -> bool {
        matches!(
            self,
            ValueType::FuncRef
                | ValueType::ExternRef
                | ValueType::AnyRef
                | ValueType::EqRef
                | ValueType::I31Ref
                | ValueType::StructRef
                | ValueType::ArrayRef
                | ValueType::NullFuncRef
                | ValueType::NullExternRef
                | ValueType::NullRef
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ValueType::I32 | ValueType::I64 | ValueType::F32 | ValueType::F64
        )
    }

    /// Packed kinds only ever appear as struct/array field storage types
    /// (spec.md §3), never on the value stack.
    pub fn is_packed(self) -> bool {
        matches!(self, ValueType::I8 | ValueType::I16)
    }

    /// Size in bytes of a stack slot holding this type: 4 for i32/f32, 8 for
    /// i64/f64/any reference (spec.md §3's `CompileState.local_slots`).
    pub fn slot_size(self) -> u32 {
        match self {
            ValueType::I32 | ValueType::F32 => 4,
            ValueType::I64 | ValueType::F64 => 8,
            r if r.is_reference() => 8,
            ValueType::I8 => 1,
            ValueType::I16 => 2,
            _ => 8,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::I8 => "i8",
            ValueType::I16 => "i16",
            ValueType::FuncRef => "funcref",
            ValueType::ExternRef => "externref",
            ValueType::AnyRef => "anyref",
            ValueType::EqRef => "eqref",
            ValueType::I31Ref => "i31ref",
            ValueType::StructRef => "structref",
            ValueType::ArrayRef => "arrayref",
            ValueType::NullFuncRef => "nullfuncref",
            ValueType::NullExternRef => "nullexternref",
            ValueType::NullRef => "nullref",
        };
        f.write_str(name)
    }
}

/// The storage type of a struct/array field: either an unpacked value type
/// or a packed storage kind, plus mutability (spec.md §3 `FieldType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldType {
    pub storage: ValueType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructType {
    pub fields: Vec<FieldType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayType {
    pub element: FieldType,
}

/// A type-section entry: one of the three composite type shapes the decoder
/// recognizes by tag byte (spec.md §3, §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeType {
    Func(FuncType),
    Struct(StructType),
    Array(ArrayType),
}

impl CompositeType {
    pub fn as_func(&self) -> Option<&FuncType> {
        match self {
            CompositeType::Func(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructType> {
        match self {
            CompositeType::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self {
            CompositeType::Array(a) => Some(a),
            _ => None,
        }
    }
}

/// A parsed block type: no results, one inline result type, or a reference
/// to a (possibly multi-value) function type (spec.md §4.1 "Block types").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
    FuncType(TypeIndex),
}

impl BlockType {
    /// Resolve to `(params, results)` given the module's type vector.
    pub fn params_results<'a>(
        &'a self,
        types: &'a [CompositeType],
    ) -> Result<(&'a [ValueType], &'a [ValueType]), String> {
        match self {
            BlockType::Empty => Ok((&[], &[])),
            BlockType::Value(v) => Ok((&[], std::slice::from_ref(v))),
            BlockType::FuncType(idx) => {
                let func = types
                    .get(*idx as usize)
                    .and_then(CompositeType::as_func)
                    .ok_or_else(|| format!("block type index {idx} is not a func type"))?;
                Ok((&func.params, &func.results))
            }
        }
    }
}
