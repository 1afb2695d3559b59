//! Instruction and terminator nodes (spec.md §4.4).

use super::value::{Global, IlType, Label, MemType, Temporary, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOpKind {
    Add,
    Sub,
    Mul,
    Div,
    DivU,
    Rem,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    Sar,
    Shr,
}

impl fmt::Display for BinOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BinOpKind::Add => "add",
            BinOpKind::Sub => "sub",
            BinOpKind::Mul => "mul",
            BinOpKind::Div => "div",
            BinOpKind::DivU => "udiv",
            BinOpKind::Rem => "rem",
            BinOpKind::RemU => "urem",
            BinOpKind::And => "and",
            BinOpKind::Or => "or",
            BinOpKind::Xor => "xor",
            BinOpKind::Shl => "shl",
            BinOpKind::Sar => "sar",
            BinOpKind::Shr => "shr",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOpKind {
    Neg,
}

impl fmt::Display for UnOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("neg")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpKind {
    Eq,
    Ne,
    SLt,
    ULt,
    SGt,
    UGt,
    SLe,
    ULe,
    SGe,
    UGe,
}

impl fmt::Display for CmpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CmpKind::Eq => "eq",
            CmpKind::Ne => "ne",
            CmpKind::SLt => "slt",
            CmpKind::ULt => "ult",
            CmpKind::SGt => "sgt",
            CmpKind::UGt => "ugt",
            CmpKind::SLe => "sle",
            CmpKind::ULe => "ule",
            CmpKind::SGe => "sge",
            CmpKind::UGe => "uge",
        };
        f.write_str(name)
    }
}

/// A cast/extend/truncate conversion op name, rendered verbatim into the IL
/// text (spec.md §6: `extsw`, `extuw`, `stosi`, `dtoui`, `truncd`, `swtof`,
/// `ultof`, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvKind {
    ExtSW,
    ExtUW,
    ExtSB,
    ExtUB,
    ExtSH,
    ExtUH,
    StoSI,
    StoUI,
    DtoSI,
    DtoUI,
    SwToF,
    UwToF,
    SlToF,
    UlToF,
    Truncd,
    Exts,
    CastIntToFloat,
    CastFloatToInt,
}

impl fmt::Display for ConvKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConvKind::ExtSW => "extsw",
            ConvKind::ExtUW => "extuw",
            ConvKind::ExtSB => "extsb",
            ConvKind::ExtUB => "extub",
            ConvKind::ExtSH => "extsh",
            ConvKind::ExtUH => "extuh",
            ConvKind::StoSI => "stosi",
            ConvKind::StoUI => "stoui",
            ConvKind::DtoSI => "dtosi",
            ConvKind::DtoUI => "dtoui",
            ConvKind::SwToF => "swtof",
            ConvKind::UwToF => "uwtof",
            ConvKind::SlToF => "sltof",
            ConvKind::UlToF => "ultof",
            ConvKind::Truncd => "truncd",
            ConvKind::Exts => "exts",
            ConvKind::CastIntToFloat => "cast",
            ConvKind::CastFloatToInt => "cast",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inst {
    Copy {
        result: Temporary,
        ty: IlType,
        value: Value,
    },
    BinaryOp {
        result: Temporary,
        ty: IlType,
        op: BinOpKind,
        lhs: Value,
        rhs: Value,
    },
    UnaryOp {
        result: Temporary,
        ty: IlType,
        op: UnOpKind,
        operand: Value,
    },
    Comparison {
        result: Temporary,
        operand_ty: IlType,
        op: CmpKind,
        lhs: Value,
        rhs: Value,
    },
    Conversion {
        result: Temporary,
        result_ty: IlType,
        op: ConvKind,
        operand: Value,
    },
    Load {
        result: Temporary,
        load_type: MemType,
        result_ty: IlType,
        address: Value,
    },
    Store {
        store_type: MemType,
        value: Value,
        address: Value,
    },
    Alloc {
        result: Temporary,
        size: u32,
        align: u32,
    },
    Phi {
        result: Temporary,
        ty: IlType,
        incoming: Vec<(Label, Value)>,
    },
    Call {
        target: CallTarget,
        args: Vec<(IlType, Value)>,
        result: Option<(Temporary, IlType)>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Direct(Global),
    Indirect(Value),
}

impl fmt::Display for CallTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallTarget::Direct(g) => write!(f, "{g}"),
            CallTarget::Indirect(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inst::Copy { result, ty, value } => write!(f, "{result} =<{ty}> copy {value}"),
            Inst::BinaryOp { result, ty, op, lhs, rhs } => {
                write!(f, "{result} =<{ty}> {op} {lhs}, {rhs}")
            }
            Inst::UnaryOp { result, ty, op, operand } => {
                write!(f, "{result} =<{ty}> {op} {operand}")
            }
            Inst::Comparison { result, operand_ty, op, lhs, rhs } => {
                write!(f, "{result} =<w> c{op}{operand_ty} {lhs}, {rhs}")
            }
            Inst::Conversion { result, result_ty, op, operand } => {
                write!(f, "{result} =<{result_ty}> {op} {operand}")
            }
            Inst::Load { result, load_type, result_ty, address } => {
                write!(f, "{result} =<{result_ty}> load{load_type} {address}")
            }
            Inst::Store { store_type, value, address } => {
                write!(f, "store{store_type} {value}, {address}")
            }
            Inst::Alloc { result, size, align } => {
                write!(f, "{result} =<l> alloc{align} {size}")
            }
            Inst::Phi { result, ty, incoming } => {
                write!(f, "{result} =<{ty}> phi")?;
                for (i, (label, value)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {label} {value}")?;
                }
                Ok(())
            }
            Inst::Call { target, args, result } => {
                if let Some((r, ty)) = result {
                    write!(f, "{r} =<{ty}> ")?;
                }
                write!(f, "call {target}(")?;
                for (i, (ty, value)) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{ty} {value}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A basic block's terminator; every block has exactly one (spec.md §4.4,
/// §8 property 5).
#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Jump(Label),
    Branch {
        cond: Value,
        if_true: Label,
        if_false: Label,
    },
    Return(Option<Value>),
    Halt,
}

impl fmt::Display for Terminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Terminator::Jump(l) => write!(f, "jmp {l}"),
            Terminator::Branch { cond, if_true, if_false } => {
                write!(f, "jnz {cond}, {if_true}, {if_false}")
            }
            Terminator::Return(Some(v)) => write!(f, "ret {v}"),
            Terminator::Return(None) => write!(f, "ret"),
            Terminator::Halt => write!(f, "hlt"),
        }
    }
}
