//! A lazily-decoded, tagged-variant view of function-body bytecode.
//!
//! Both the validator (`validate::func`) and the code generator
//! (`codegen::state`) walk a function body byte-by-byte. Rather than each
//! hand-rolling its own opcode dispatch (the "source uses long chains of
//! opcode comparisons" design note in spec.md §9), both walk the same
//! [`InstrReader`], which decodes one instruction at a time into a single
//! tagged-variant [`Instr`] and advances a monotonic byte cursor — the
//! densely-indexed-dispatch alternative spec.md §9 allows either shape for.

use crate::error::ParseError;
use crate::leb;
use crate::types::{BlockType, DataIndex, ElemIndex, FuncIndex, GlobalIndex, LocalIndex,
    MemIndex, TableIndex, TagIndex, TypeIndex, ValueType};
use std::io::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    pub align: u32,
    pub offset: u64,
    pub mem_idx: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    // --- Control ---
    Unreachable,
    Nop,
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else,
    End,
    Try(BlockType),
    Catch(TagIndex),
    CatchAll,
    Delegate(u32),
    Throw(TagIndex),
    Rethrow(u32),
    Br(u32),
    BrIf(u32),
    BrTable(Vec<u32>, u32),
    Return,
    Call(FuncIndex),
    CallIndirect(TypeIndex, TableIndex),
    ReturnCall(FuncIndex),
    ReturnCallIndirect(TypeIndex, TableIndex),
    CallRef(TypeIndex),
    ReturnCallRef(TypeIndex),

    // --- Reference ---
    RefNull(ValueType),
    RefIsNull,
    RefFunc(FuncIndex),
    RefEq,
    RefAsNonNull,
    BrOnNull(u32),
    BrOnNonNull(u32),

    // --- Parametric ---
    Drop,
    Select,
    SelectTyped(Vec<ValueType>),

    // --- Variable ---
    LocalGet(LocalIndex),
    LocalSet(LocalIndex),
    LocalTee(LocalIndex),
    GlobalGet(GlobalIndex),
    GlobalSet(GlobalIndex),

    // --- Table ---
    TableGet(TableIndex),
    TableSet(TableIndex),
    TableInit(ElemIndex, TableIndex),
    ElemDrop(ElemIndex),
    TableCopy(TableIndex, TableIndex),
    TableGrow(TableIndex),
    TableSize(TableIndex),
    TableFill(TableIndex),

    // --- Memory ---
    Load(NumType, MemArg),
    Load8S(IntType, MemArg),
    Load8U(IntType, MemArg),
    Load16S(IntType, MemArg),
    Load16U(IntType, MemArg),
    Load32S(MemArg),
    Load32U(MemArg),
    Store(NumType, MemArg),
    Store8(IntType, MemArg),
    Store16(IntType, MemArg),
    Store32(MemArg),
    MemorySize(MemIndex),
    MemoryGrow(MemIndex),
    MemoryInit(DataIndex, MemIndex),
    DataDrop(DataIndex),
    MemoryCopy(MemIndex, MemIndex),
    MemoryFill(MemIndex),

    // --- Numeric constants ---
    I32Const(i32),
    I64Const(i64),
    F32Const(f32),
    F64Const(f64),

    // --- Numeric ops ---
    UnOp(NumType, UnOp),
    BinOp(NumType, BinOp),
    TestOp(IntType, TestOp),
    RelOp(NumType, RelOp),
    Convert(ConvertOp),
    SatConvert(SatConvertOp),
    Extend8S(IntType),
    Extend16S(IntType),
    Extend32S,

    // --- GC ---
    StructNew(TypeIndex),
    StructNewDefault(TypeIndex),
    StructGet(TypeIndex, u32),
    StructGetS(TypeIndex, u32),
    StructGetU(TypeIndex, u32),
    StructSet(TypeIndex, u32),
    ArrayNew(TypeIndex),
    ArrayNewDefault(TypeIndex),
    ArrayNewFixed(TypeIndex, u32),
    ArrayGet(TypeIndex),
    ArrayGetS(TypeIndex),
    ArrayGetU(TypeIndex),
    ArraySet(TypeIndex),
    ArrayLen,
    RefI31,
    I31GetS,
    I31GetU,
    RefTest(TypeIndex, bool),
    RefCast(TypeIndex, bool),
    AnyConvertExtern,
    ExternConvertAny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumType {
    I32,
    I64,
    F32,
    F64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntType {
    I32,
    I64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Clz,
    Ctz,
    Popcnt,
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
    Div,
    Min,
    Max,
    Copysign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOp {
    Eqz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelOp {
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
    Lt,
    Gt,
    Le,
    Ge,
}

/// Non-saturating numeric conversions: every `{src}.{op}_{dst}` combination
/// the core supports, keyed by (from, to, signedness-where-relevant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertOp {
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64ConvertI64S,
    F64ConvertI64U,
    F32DemoteF64,
    F64PromoteF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SatConvertOp {
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    I64TruncSatF32S,
    I64TruncSatF32U,
    I64TruncSatF64S,
    I64TruncSatF64U,
}

/// Decodes one [`Instr`] at a time from a function body, tracking a
/// monotonic byte offset for diagnostics (spec.md §5: "every loop... advances
/// a byte cursor monotonically").
pub struct InstrReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> InstrReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        InstrReader {
            cursor: Cursor::new(bytes),
        }
    }

    /// Byte offset of the next instruction to be decoded, relative to the
    /// start of the body this reader was constructed over.
    pub fn offset(&self) -> usize {
        self.cursor.position() as usize
    }

    pub fn at_end(&self) -> bool {
        self.offset() >= self.cursor.get_ref().len()
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.offset(), message)
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> {
        use std::io::Read;
        let mut byte = [0u8; 1];
        self.cursor
            .read_exact(&mut byte)
            .map_err(|_| self.err("unexpected end of function body"))?;
        Ok(byte[0])
    }

    fn read_u32(&mut self) -> Result<u32, ParseError> {
        leb::read_u32(&mut self.cursor)
    }

    fn read_u64(&mut self) -> Result<u64, ParseError> {
        leb::read_u64(&mut self.cursor)
    }

    fn read_i32(&mut self) -> Result<i32, ParseError> {
        leb::read_i32(&mut self.cursor)
    }

    fn read_i64(&mut self) -> Result<i64, ParseError> {
        leb::read_i64(&mut self.cursor)
    }

    fn read_f32(&mut self) -> Result<f32, ParseError> {
        use std::io::Read;
        let mut buf = [0u8; 4];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.err("unexpected end of function body reading f32"))?;
        Ok(f32::from_le_bytes(buf))
    }

    fn read_f64(&mut self) -> Result<f64, ParseError> {
        use std::io::Read;
        let mut buf = [0u8; 8];
        self.cursor
            .read_exact(&mut buf)
            .map_err(|_| self.err("unexpected end of function body reading f64"))?;
        Ok(f64::from_le_bytes(buf))
    }

    /// The multi-memory proposal steals bit 6 of the align field as a flag:
    /// when set, a memory-index LEB128 immediately follows the align field
    /// and precedes the offset (spec.md §4.1, multi-memory addressing).
    fn read_memarg(&mut self) -> Result<MemArg, ParseError> {
        const MULTI_MEMORY_FLAG: u32 = 0x40;
        let flags = self.read_u32()?;
        let mem_idx = if flags & MULTI_MEMORY_FLAG != 0 {
            self.read_u32()?
        } else {
            0
        };
        let align = flags & !MULTI_MEMORY_FLAG;
        let offset = self.read_u64()?;
        Ok(MemArg { align, offset, mem_idx })
    }

    /// `0x40`, a single value type byte, or a signed LEB128 type index
    /// (spec.md §4.1 "Block types").
    fn read_block_type(&mut self) -> Result<BlockType, ParseError> {
        let offset = self.offset();
        let byte = self.read_u8()?;
        if byte == 0x40 {
            return Ok(BlockType::Empty);
        }
        if let Some(vt) = value_type_from_byte(byte) {
            return Ok(BlockType::Value(vt));
        }
        // Not an empty/value marker: re-read as a signed LEB128 type index.
        self.cursor.set_position(offset as u64);
        let idx = self.read_i32()?;
        if idx < 0 {
            return Err(self.err("negative block type index"));
        }
        Ok(BlockType::FuncType(idx as u32))
    }

    fn read_value_type(&mut self) -> Result<ValueType, ParseError> {
        let byte = self.read_u8()?;
        value_type_from_byte(byte).ok_or_else(|| self.err("invalid value type byte"))
    }

    /// Decode the next instruction, or `None` at end of body.
    pub fn next(&mut self) -> Result<Option<(usize, Instr)>, ParseError> {
        if self.at_end() {
            return Ok(None);
        }
        let start = self.offset();
        let opcode = self.read_u8()?;
        let instr = self.decode_opcode(opcode)?;
        Ok(Some((start, instr)))
    }

    fn decode_opcode(&mut self, opcode: u8) -> Result<Instr, ParseError> {
        use Instr::*;
        Ok(match opcode {
            0x00 => Unreachable,
            0x01 => Nop,
            0x02 => Block(self.read_block_type()?),
            0x03 => Loop(self.read_block_type()?),
            0x04 => If(self.read_block_type()?),
            0x05 => Else,
            0x06 => Try(self.read_block_type()?),
            0x07 => Catch(self.read_u32()?),
            0x0B => End,
            0x0C => Br(self.read_u32()?),
            0x0D => BrIf(self.read_u32()?),
            0x0E => {
                let count = self.read_u32()?;
                let mut targets = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    targets.push(self.read_u32()?);
                }
                let default = self.read_u32()?;
                BrTable(targets, default)
            }
            0x0F => Return,
            0x10 => Call(self.read_u32()?),
            0x11 => {
                let ty = self.read_u32()?;
                let table = self.read_u32()?;
                CallIndirect(ty, table)
            }
            0x12 => ReturnCall(self.read_u32()?),
            0x13 => {
                let ty = self.read_u32()?;
                let table = self.read_u32()?;
                ReturnCallIndirect(ty, table)
            }
            0x14 => CallRef(self.read_u32()?),
            0x15 => ReturnCallRef(self.read_u32()?),
            0x18 => Delegate(self.read_u32()?),
            0x19 => CatchAll,
            0x08 => Throw(self.read_u32()?),
            0x09 => Rethrow(self.read_u32()?),

            0x1A => Drop,
            0x1B => Select,
            0x1C => {
                let count = self.read_u32()?;
                let mut types = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    types.push(self.read_value_type()?);
                }
                SelectTyped(types)
            }

            0x20 => LocalGet(self.read_u32()?),
            0x21 => LocalSet(self.read_u32()?),
            0x22 => LocalTee(self.read_u32()?),
            0x23 => GlobalGet(self.read_u32()?),
            0x24 => GlobalSet(self.read_u32()?),
            0x25 => TableGet(self.read_u32()?),
            0x26 => TableSet(self.read_u32()?),

            0x28 => Load(NumType::I32, self.read_memarg()?),
            0x29 => Load(NumType::I64, self.read_memarg()?),
            0x2A => Load(NumType::F32, self.read_memarg()?),
            0x2B => Load(NumType::F64, self.read_memarg()?),
            0x2C => Load8S(IntType::I32, self.read_memarg()?),
            0x2D => Load8U(IntType::I32, self.read_memarg()?),
            0x2E => Load16S(IntType::I32, self.read_memarg()?),
            0x2F => Load16U(IntType::I32, self.read_memarg()?),
            0x30 => Load8S(IntType::I64, self.read_memarg()?),
            0x31 => Load8U(IntType::I64, self.read_memarg()?),
            0x32 => Load16S(IntType::I64, self.read_memarg()?),
            0x33 => Load16U(IntType::I64, self.read_memarg()?),
            0x34 => Load32S(self.read_memarg()?),
            0x35 => Load32U(self.read_memarg()?),
            0x36 => Store(NumType::I32, self.read_memarg()?),
            0x37 => Store(NumType::I64, self.read_memarg()?),
            0x38 => Store(NumType::F32, self.read_memarg()?),
            0x39 => Store(NumType::F64, self.read_memarg()?),
            0x3A => Store8(IntType::I32, self.read_memarg()?),
            0x3B => Store16(IntType::I32, self.read_memarg()?),
            0x3C => Store8(IntType::I64, self.read_memarg()?),
            0x3D => Store16(IntType::I64, self.read_memarg()?),
            0x3E => Store32(self.read_memarg()?),
            0x3F => MemorySize(self.read_u32()?),
            0x40 => MemoryGrow(self.read_u32()?),

            0x41 => I32Const(self.read_i32()?),
            0x42 => I64Const(self.read_i64()?),
            0x43 => F32Const(self.read_f32()?),
            0x44 => F64Const(self.read_f64()?),

            0x45 => TestOp(IntType::I32, TestOp::Eqz),
            0x46 => RelOp(NumType::I32, RelOp::Eq),
            0x47 => RelOp(NumType::I32, RelOp::Ne),
            0x48 => RelOp(NumType::I32, RelOp::LtS),
            0x49 => RelOp(NumType::I32, RelOp::LtU),
            0x4A => RelOp(NumType::I32, RelOp::GtS),
            0x4B => RelOp(NumType::I32, RelOp::GtU),
            0x4C => RelOp(NumType::I32, RelOp::LeS),
            0x4D => RelOp(NumType::I32, RelOp::LeU),
            0x4E => RelOp(NumType::I32, RelOp::GeS),
            0x4F => RelOp(NumType::I32, RelOp::GeU),

            0x50 => TestOp(IntType::I64, TestOp::Eqz),
            0x51 => RelOp(NumType::I64, RelOp::Eq),
            0x52 => RelOp(NumType::I64, RelOp::Ne),
            0x53 => RelOp(NumType::I64, RelOp::LtS),
            0x54 => RelOp(NumType::I64, RelOp::LtU),
            0x55 => RelOp(NumType::I64, RelOp::GtS),
            0x56 => RelOp(NumType::I64, RelOp::GtU),
            0x57 => RelOp(NumType::I64, RelOp::LeS),
            0x58 => RelOp(NumType::I64, RelOp::LeU),
            0x59 => RelOp(NumType::I64, RelOp::GeS),
            0x5A => RelOp(NumType::I64, RelOp::GeU),

            0x5B => RelOp(NumType::F32, RelOp::Eq),
            0x5C => RelOp(NumType::F32, RelOp::Ne),
            0x5D => RelOp(NumType::F32, RelOp::Lt),
            0x5E => RelOp(NumType::F32, RelOp::Gt),
            0x5F => RelOp(NumType::F32, RelOp::Le),
            0x60 => RelOp(NumType::F32, RelOp::Ge),

            0x61 => RelOp(NumType::F64, RelOp::Eq),
            0x62 => RelOp(NumType::F64, RelOp::Ne),
            0x63 => RelOp(NumType::F64, RelOp::Lt),
            0x64 => RelOp(NumType::F64, RelOp::Gt),
            0x65 => RelOp(NumType::F64, RelOp::Le),
            0x66 => RelOp(NumType::F64, RelOp::Ge),

            0x67 => UnOp(NumType::I32, UnOp::Clz),
            0x68 => UnOp(NumType::I32, UnOp::Ctz),
            0x69 => UnOp(NumType::I32, UnOp::Popcnt),
            0x6A => BinOp(NumType::I32, BinOp::Add),
            0x6B => BinOp(NumType::I32, BinOp::Sub),
            0x6C => BinOp(NumType::I32, BinOp::Mul),
            0x6D => BinOp(NumType::I32, BinOp::DivS),
            0x6E => BinOp(NumType::I32, BinOp::DivU),
            0x6F => BinOp(NumType::I32, BinOp::RemS),
            0x70 => BinOp(NumType::I32, BinOp::RemU),
            0x71 => BinOp(NumType::I32, BinOp::And),
            0x72 => BinOp(NumType::I32, BinOp::Or),
            0x73 => BinOp(NumType::I32, BinOp::Xor),
            0x74 => BinOp(NumType::I32, BinOp::Shl),
            0x75 => BinOp(NumType::I32, BinOp::ShrS),
            0x76 => BinOp(NumType::I32, BinOp::ShrU),
            0x77 => BinOp(NumType::I32, BinOp::Rotl),
            0x78 => BinOp(NumType::I32, BinOp::Rotr),

            0x79 => UnOp(NumType::I64, UnOp::Clz),
            0x7A => UnOp(NumType::I64, UnOp::Ctz),
            0x7B => UnOp(NumType::I64, UnOp::Popcnt),
            0x7C => BinOp(NumType::I64, BinOp::Add),
            0x7D => BinOp(NumType::I64, BinOp::Sub),
            0x7E => BinOp(NumType::I64, BinOp::Mul),
            0x7F => BinOp(NumType::I64, BinOp::DivS),
            0x80 => BinOp(NumType::I64, BinOp::DivU),
            0x81 => BinOp(NumType::I64, BinOp::RemS),
            0x82 => BinOp(NumType::I64, BinOp::RemU),
            0x83 => BinOp(NumType::I64, BinOp::And),
            0x84 => BinOp(NumType::I64, BinOp::Or),
            0x85 => BinOp(NumType::I64, BinOp::Xor),
            0x86 => BinOp(NumType::I64, BinOp::Shl),
            0x87 => BinOp(NumType::I64, BinOp::ShrS),
            0x88 => BinOp(NumType::I64, BinOp::ShrU),
            0x89 => BinOp(NumType::I64, BinOp::Rotl),
            0x8A => BinOp(NumType::I64, BinOp::Rotr),

            0x8B => UnOp(NumType::F32, UnOp::Abs),
            0x8C => UnOp(NumType::F32, UnOp::Neg),
            0x8D => UnOp(NumType::F32, UnOp::Ceil),
            0x8E => UnOp(NumType::F32, UnOp::Floor),
            0x8F => UnOp(NumType::F32, UnOp::Trunc),
            0x90 => UnOp(NumType::F32, UnOp::Nearest),
            0x91 => UnOp(NumType::F32, UnOp::Sqrt),
            0x92 => BinOp(NumType::F32, BinOp::Add),
            0x93 => BinOp(NumType::F32, BinOp::Sub),
            0x94 => BinOp(NumType::F32, BinOp::Mul),
            0x95 => BinOp(NumType::F32, BinOp::Div),
            0x96 => BinOp(NumType::F32, BinOp::Min),
            0x97 => BinOp(NumType::F32, BinOp::Max),
            0x98 => BinOp(NumType::F32, BinOp::Copysign),

            0x99 => UnOp(NumType::F64, UnOp::Abs),
            0x9A => UnOp(NumType::F64, UnOp::Neg),
            0x9B => UnOp(NumType::F64, UnOp::Ceil),
            0x9C => UnOp(NumType::F64, UnOp::Floor),
            0x9D => UnOp(NumType::F64, UnOp::Trunc),
            0x9E => UnOp(NumType::F64, UnOp::Nearest),
            0x9F => UnOp(NumType::F64, UnOp::Sqrt),
            0xA0 => BinOp(NumType::F64, BinOp::Add),
            0xA1 => BinOp(NumType::F64, BinOp::Sub),
            0xA2 => BinOp(NumType::F64, BinOp::Mul),
            0xA3 => BinOp(NumType::F64, BinOp::Div),
            0xA4 => BinOp(NumType::F64, BinOp::Min),
            0xA5 => BinOp(NumType::F64, BinOp::Max),
            0xA6 => BinOp(NumType::F64, BinOp::Copysign),

            0xA7 => Convert(ConvertOp::I32WrapI64),
            0xA8 => Convert(ConvertOp::I32TruncF32S),
            0xA9 => Convert(ConvertOp::I32TruncF32U),
            0xAA => Convert(ConvertOp::I32TruncF64S),
            0xAB => Convert(ConvertOp::I32TruncF64U),
            0xAC => Convert(ConvertOp::I64ExtendI32S),
            0xAD => Convert(ConvertOp::I64ExtendI32U),
            0xAE => Convert(ConvertOp::I64TruncF32S),
            0xAF => Convert(ConvertOp::I64TruncF32U),
            0xB0 => Convert(ConvertOp::I64TruncF64S),
            0xB1 => Convert(ConvertOp::I64TruncF64U),
            0xB2 => Convert(ConvertOp::F32ConvertI32S),
            0xB3 => Convert(ConvertOp::F32ConvertI32U),
            0xB4 => Convert(ConvertOp::F32ConvertI64S),
            0xB5 => Convert(ConvertOp::F32ConvertI64U),
            0xB6 => Convert(ConvertOp::F32DemoteF64),
            0xB7 => Convert(ConvertOp::F64ConvertI32S),
            0xB8 => Convert(ConvertOp::F64ConvertI32U),
            0xB9 => Convert(ConvertOp::F64ConvertI64S),
            0xBA => Convert(ConvertOp::F64ConvertI64U),
            0xBB => Convert(ConvertOp::F64PromoteF32),
            0xBC => Convert(ConvertOp::I32ReinterpretF32),
            0xBD => Convert(ConvertOp::I64ReinterpretF64),
            0xBE => Convert(ConvertOp::F32ReinterpretI32),
            0xBF => Convert(ConvertOp::F64ReinterpretI64),

            0xC0 => Extend8S(IntType::I32),
            0xC1 => Extend16S(IntType::I32),
            0xC2 => Extend8S(IntType::I64),
            0xC3 => Extend16S(IntType::I64),
            0xC4 => Extend32S,

            0xD0 => RefNull(self.read_value_type()?),
            0xD1 => RefIsNull,
            0xD2 => RefFunc(self.read_u32()?),
            0xD3 => RefEq,
            0xD4 => RefAsNonNull,
            0xD5 => BrOnNull(self.read_u32()?),
            0xD6 => BrOnNonNull(self.read_u32()?),

            0xFB => self.decode_gc_opcode()?,
            0xFC => self.decode_misc_opcode()?,

            other => return Err(self.err(format!("unsupported or unknown opcode 0x{other:02x}"))),
        })
    }

    fn decode_gc_opcode(&mut self) -> Result<Instr, ParseError> {
        use Instr::*;
        let sub = self.read_u32()?;
        Ok(match sub {
            0 => StructNew(self.read_u32()?),
            1 => StructNewDefault(self.read_u32()?),
            2 => {
                let ty = self.read_u32()?;
                StructGet(ty, self.read_u32()?)
            }
            3 => {
                let ty = self.read_u32()?;
                StructGetS(ty, self.read_u32()?)
            }
            4 => {
                let ty = self.read_u32()?;
                StructGetU(ty, self.read_u32()?)
            }
            5 => {
                let ty = self.read_u32()?;
                StructSet(ty, self.read_u32()?)
            }
            6 => ArrayNew(self.read_u32()?),
            7 => ArrayNewDefault(self.read_u32()?),
            8 => {
                let ty = self.read_u32()?;
                ArrayNewFixed(ty, self.read_u32()?)
            }
            11 => ArrayGet(self.read_u32()?),
            12 => ArrayGetS(self.read_u32()?),
            13 => ArrayGetU(self.read_u32()?),
            14 => ArraySet(self.read_u32()?),
            15 => ArrayLen,
            20 => RefTest(self.read_u32()?, false),
            21 => RefTest(self.read_u32()?, true),
            22 => RefCast(self.read_u32()?, false),
            23 => RefCast(self.read_u32()?, true),
            26 => AnyConvertExtern,
            27 => ExternConvertAny,
            28 => RefI31,
            29 => I31GetS,
            30 => I31GetU,
            other => {
                return Err(self.err(format!("unsupported GC sub-opcode {other}")));
            }
        })
    }

    fn decode_misc_opcode(&mut self) -> Result<Instr, ParseError> {
        use Instr::*;
        let sub = self.read_u32()?;
        Ok(match sub {
            0 => SatConvert(SatConvertOp::I32TruncSatF32S),
            1 => SatConvert(SatConvertOp::I32TruncSatF32U),
            2 => SatConvert(SatConvertOp::I32TruncSatF64S),
            3 => SatConvert(SatConvertOp::I32TruncSatF64U),
            4 => SatConvert(SatConvertOp::I64TruncSatF32S),
            5 => SatConvert(SatConvertOp::I64TruncSatF32U),
            6 => SatConvert(SatConvertOp::I64TruncSatF64S),
            7 => SatConvert(SatConvertOp::I64TruncSatF64U),
            8 => {
                let data = self.read_u32()?;
                let mem = self.read_u32()?;
                MemoryInit(data, mem)
            }
            9 => DataDrop(self.read_u32()?),
            10 => {
                let dst = self.read_u32()?;
                let src = self.read_u32()?;
                MemoryCopy(dst, src)
            }
            11 => MemoryFill(self.read_u32()?),
            12 => {
                let elem = self.read_u32()?;
                let table = self.read_u32()?;
                TableInit(elem, table)
            }
            13 => ElemDrop(self.read_u32()?),
            14 => {
                let dst = self.read_u32()?;
                let src = self.read_u32()?;
                TableCopy(dst, src)
            }
            15 => TableGrow(self.read_u32()?),
            16 => TableSize(self.read_u32()?),
            17 => TableFill(self.read_u32()?),
            other => {
                return Err(self.err(format!("unsupported bulk-memory sub-opcode {other}")));
            }
        })
    }
}

/// Maps a single-byte value-type encoding (spec.md §4.1's "Block types"
/// lookahead set, extended with the GC reference kinds) to a [`ValueType`].
pub fn value_type_from_byte(byte: u8) -> Option<ValueType> {
    Some(match byte {
        0x7F => ValueType::I32,
        0x7E => ValueType::I64,
        0x7D => ValueType::F32,
        0x7C => ValueType::F64,
        0x78 => ValueType::I8,
        0x77 => ValueType::I16,
        0x70 => ValueType::FuncRef,
        0x6F => ValueType::ExternRef,
        0x6E => ValueType::AnyRef,
        0x6D => ValueType::EqRef,
        0x6C => ValueType::I31Ref,
        0x6B => ValueType::StructRef,
        0x6A => ValueType::ArrayRef,
        0x69 => ValueType::NullFuncRef,
        0x68 => ValueType::NullExternRef,
        0x65 => ValueType::NullRef,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(bytes: &[u8]) -> Vec<Instr> {
        let mut reader = InstrReader::new(bytes);
        let mut out = Vec::new();
        while let Some((_, instr)) = reader.next().unwrap() {
            out.push(instr);
        }
        out
    }

    #[test]
    fn decodes_const_and_add() {
        let bytes = [0x41, 42, 0x41, 8, 0x6A, 0x0B];
        let instrs = decode_all(&bytes);
        assert_eq!(
            instrs,
            vec![
                Instr::I32Const(42),
                Instr::I32Const(8),
                Instr::BinOp(NumType::I32, BinOp::Add),
                Instr::End,
            ]
        );
    }

    #[test]
    fn decodes_block_with_value_type() {
        let bytes = [0x02, 0x7F, 0x0B, 0x0B];
        let instrs = decode_all(&bytes);
        assert_eq!(
            instrs,
            vec![Instr::Block(BlockType::Value(ValueType::I32)), Instr::End, Instr::End]
        );
    }

    #[test]
    fn decodes_empty_block_type() {
        let bytes = [0x02, 0x40, 0x0B, 0x0B];
        let instrs = decode_all(&bytes);
        assert_eq!(instrs, vec![Instr::Block(BlockType::Empty), Instr::End, Instr::End]);
    }

    #[test]
    fn decodes_multi_value_block_type_index() {
        // block type index 5, encoded as signed LEB128.
        let bytes = [0x02, 0x05, 0x0B, 0x0B];
        let instrs = decode_all(&bytes);
        assert_eq!(
            instrs,
            vec![Instr::Block(BlockType::FuncType(5)), Instr::End, Instr::End]
        );
    }

    #[test]
    fn decodes_bulk_memory_fill() {
        // memory.fill opcode: 0xFC 11 <mem idx 0>
        let bytes = [0xFC, 11, 0x00];
        let instrs = decode_all(&bytes);
        assert_eq!(instrs, vec![Instr::MemoryFill(0)]);
    }

    #[test]
    fn unknown_opcode_is_parse_error() {
        let bytes = [0xEE];
        let mut reader = InstrReader::new(&bytes);
        assert!(reader.next().is_err());
    }
}
