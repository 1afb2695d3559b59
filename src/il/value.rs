//! The typed value DSL values flow through in the emitted IL (spec.md §4.4).

use std::fmt;

/// One of QBE's base types: `w`/`l` integers, `s`/`d` floats, plus `b`/`h`
/// which only ever appear as the *width* tag of a memory access, never as a
/// temporary's own type (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IlType {
    W,
    L,
    S,
    D,
}

impl fmt::Display for IlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            IlType::W => 'w',
            IlType::L => 'l',
            IlType::S => 's',
            IlType::D => 'd',
        };
        write!(f, "{c}")
    }
}

impl IlType {
    /// WASM value type → IL type mapping (spec.md §4.3): `i32→w`, `i64→l`,
    /// `f32→s`, `f64→d`, any reference kind → `l`.
    pub fn from_value_type(ty: crate::types::ValueType) -> Self {
        use crate::types::ValueType::*;
        match ty {
            I32 | I8 | I16 => IlType::W,
            I64 => IlType::L,
            F32 => IlType::S,
            F64 => IlType::D,
            r if r.is_reference() => IlType::L,
            _ => IlType::L,
        }
    }
}

/// A memory-access width, distinct from [`IlType`] because loads/stores can
/// narrow/widen (`loadsb`, `storeh`, …) independently of the destination
/// temporary's type (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemType {
    W,
    L,
    S,
    D,
    B,
    H,
}

impl fmt::Display for MemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            MemType::W => 'w',
            MemType::L => 'l',
            MemType::S => 's',
            MemType::D => 'd',
            MemType::B => 'b',
            MemType::H => 'h',
        };
        write!(f, "{c}")
    }
}

/// An SSA-form temporary, a dense integer id paired with a debug-friendly
/// rendered name (spec.md §9: "these should be dense integer identifiers
/// with an optional side-map to readable names").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Temporary(pub u32);

impl fmt::Display for Temporary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@L{}", self.0)
    }
}

/// A reference to a named global symbol (a function or a data definition).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Global(pub String);

impl fmt::Display for Global {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

/// Any value an instruction operand can be: a computed temporary, a named
/// global, or a literal constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Temp(Temporary),
    Global(Global),
    IntConst(i64),
    FloatConst(f64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Temp(t) => write!(f, "{t}"),
            Value::Global(g) => write!(f, "{g}"),
            Value::IntConst(v) => write!(f, "{v}"),
            Value::FloatConst(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<Temporary> for Value {
    fn from(t: Temporary) -> Self {
        Value::Temp(t)
    }
}
