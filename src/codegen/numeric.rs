//! Numeric instructions (spec.md §4.3): arithmetic, comparisons,
//! conversions and sign-extensions. Operations QBE has a native mnemonic
//! for become a single [`Inst`]; the rest (bit-counting, float rounding,
//! min/max/copysign, saturating truncation) go through the fixed runtime
//! helpers named in spec.md §6.

use crate::error::CompileError;
use crate::il::{BinOpKind, CmpKind, ConvKind, IlType, Inst, UnOpKind, Value};
use crate::opcode::{BinOp, ConvertOp, IntType, Instr, NumType, RelOp, SatConvertOp, TestOp, UnOp};

use super::state::CompileState;

fn il_ty(t: NumType) -> IlType {
    match t {
        NumType::I32 => IlType::W,
        NumType::I64 => IlType::L,
        NumType::F32 => IlType::S,
        NumType::F64 => IlType::D,
    }
}

fn int_il_ty(t: IntType) -> IlType {
    match t {
        IntType::I32 => IlType::W,
        IntType::I64 => IlType::L,
    }
}

pub fn translate_numeric(cg: &mut CompileState, offset: usize, instr: &Instr) -> Result<(), CompileError> {
    match instr {
        Instr::UnOp(ty, op) => translate_unop(cg, offset, *ty, *op),
        Instr::BinOp(ty, op) => translate_binop(cg, offset, *ty, *op),
        Instr::TestOp(ty, op) => translate_testop(cg, offset, *ty, *op),
        Instr::RelOp(ty, op) => translate_relop(cg, offset, *ty, *op),
        Instr::Convert(op) => translate_convert(cg, offset, *op),
        Instr::SatConvert(op) => translate_sat_convert(cg, offset, *op),
        Instr::Extend8S(ty) => translate_extend(cg, offset, *ty, ConvKind::ExtSB),
        Instr::Extend16S(ty) => translate_extend(cg, offset, *ty, ConvKind::ExtSH),
        Instr::Extend32S => translate_extend(cg, offset, IntType::I64, ConvKind::ExtSW),
        _ => unreachable!("translate_numeric called with a non-numeric instruction"),
    }
}

fn translate_unop(cg: &mut CompileState, offset: usize, ty: NumType, op: UnOp) -> Result<(), CompileError> {
    let operand = cg.pop_value(offset)?;
    let result_ty = il_ty(ty);

    let runtime_name = match (ty, op) {
        (NumType::I32, UnOp::Clz) => Some("__wasm_i32_clz"),
        (NumType::I32, UnOp::Ctz) => Some("__wasm_i32_ctz"),
        (NumType::I32, UnOp::Popcnt) => Some("__wasm_i32_popcnt"),
        (NumType::I64, UnOp::Clz) => Some("__wasm_i64_clz"),
        (NumType::I64, UnOp::Ctz) => Some("__wasm_i64_ctz"),
        (NumType::I64, UnOp::Popcnt) => Some("__wasm_i64_popcnt"),
        (NumType::F32, UnOp::Abs) => Some("__wasm_f32_abs"),
        (NumType::F32, UnOp::Ceil) => Some("__wasm_f32_ceil"),
        (NumType::F32, UnOp::Floor) => Some("__wasm_f32_floor"),
        (NumType::F32, UnOp::Trunc) => Some("__wasm_f32_trunc"),
        (NumType::F32, UnOp::Nearest) => Some("__wasm_f32_nearest"),
        (NumType::F32, UnOp::Sqrt) => Some("__wasm_f32_sqrt"),
        (NumType::F64, UnOp::Abs) => Some("__wasm_f64_abs"),
        (NumType::F64, UnOp::Ceil) => Some("__wasm_f64_ceil"),
        (NumType::F64, UnOp::Floor) => Some("__wasm_f64_floor"),
        (NumType::F64, UnOp::Trunc) => Some("__wasm_f64_trunc"),
        (NumType::F64, UnOp::Nearest) => Some("__wasm_f64_nearest"),
        (NumType::F64, UnOp::Sqrt) => Some("__wasm_f64_sqrt"),
        (_, UnOp::Neg) => None,
        _ => return Err(cg.err(offset, format!("unop {op:?} is not valid for {ty:?}"))),
    };

    let result = if let Some(name) = runtime_name {
        cg.emit_runtime_call(name, vec![(result_ty, operand.value)], Some(result_ty)).unwrap()
    } else {
        let t = cg.fresh_temp();
        cg.emit(Inst::UnaryOp { result: t, ty: result_ty, op: UnOpKind::Neg, operand: operand.value });
        Value::Temp(t)
    };
    cg.push_value(result, result_ty);
    Ok(())
}

fn translate_binop(cg: &mut CompileState, offset: usize, ty: NumType, op: BinOp) -> Result<(), CompileError> {
    let rhs = cg.pop_value(offset)?;
    let lhs = cg.pop_value(offset)?;
    let result_ty = il_ty(ty);
    let is_float = matches!(ty, NumType::F32 | NumType::F64);

    let runtime_name = match (is_float, op) {
        (true, BinOp::Min) => Some(if ty == NumType::F32 { "__wasm_f32_min" } else { "__wasm_f64_min" }),
        (true, BinOp::Max) => Some(if ty == NumType::F32 { "__wasm_f32_max" } else { "__wasm_f64_max" }),
        (true, BinOp::Copysign) => Some(if ty == NumType::F32 { "__wasm_f32_copysign" } else { "__wasm_f64_copysign" }),
        (false, BinOp::Rotl) => Some(if ty == NumType::I32 { "__wasm_i32_rotl" } else { "__wasm_i64_rotl" }),
        (false, BinOp::Rotr) => Some(if ty == NumType::I32 { "__wasm_i32_rotr" } else { "__wasm_i64_rotr" }),
        _ => None,
    };

    let result = if let Some(name) = runtime_name {
        cg.emit_runtime_call(name, vec![(result_ty, lhs.value), (result_ty, rhs.value)], Some(result_ty)).unwrap()
    } else {
        let kind = match op {
            BinOp::Add => BinOpKind::Add,
            BinOp::Sub => BinOpKind::Sub,
            BinOp::Mul => BinOpKind::Mul,
            BinOp::DivS | BinOp::Div => BinOpKind::Div,
            BinOp::DivU => BinOpKind::DivU,
            BinOp::RemS => BinOpKind::Rem,
            BinOp::RemU => BinOpKind::RemU,
            BinOp::And => BinOpKind::And,
            BinOp::Or => BinOpKind::Or,
            BinOp::Xor => BinOpKind::Xor,
            BinOp::Shl => BinOpKind::Shl,
            BinOp::ShrS => BinOpKind::Sar,
            BinOp::ShrU => BinOpKind::Shr,
            BinOp::Rotl | BinOp::Rotr | BinOp::Min | BinOp::Max | BinOp::Copysign => {
                return Err(cg.err(offset, format!("binop {op:?} should have been routed to a runtime helper")));
            }
        };
        let t = cg.fresh_temp();
        cg.emit(Inst::BinaryOp { result: t, ty: result_ty, op: kind, lhs: lhs.value, rhs: rhs.value });
        Value::Temp(t)
    };
    cg.push_value(result, result_ty);
    Ok(())
}

fn translate_testop(cg: &mut CompileState, offset: usize, ty: IntType, op: TestOp) -> Result<(), CompileError> {
    let TestOp::Eqz = op;
    let operand = cg.pop_value(offset)?;
    let result_ty = int_il_ty(ty);
    let t = cg.fresh_temp();
    cg.emit(Inst::Comparison { result: t, operand_ty: result_ty, op: CmpKind::Eq, lhs: operand.value, rhs: Value::IntConst(0) });
    cg.push_value(Value::Temp(t), IlType::W);
    Ok(())
}

fn translate_relop(cg: &mut CompileState, offset: usize, ty: NumType, op: RelOp) -> Result<(), CompileError> {
    let rhs = cg.pop_value(offset)?;
    let lhs = cg.pop_value(offset)?;
    let operand_ty = il_ty(ty);
    let kind = match op {
        RelOp::Eq => CmpKind::Eq,
        RelOp::Ne => CmpKind::Ne,
        RelOp::LtS | RelOp::Lt => CmpKind::SLt,
        RelOp::LtU => CmpKind::ULt,
        RelOp::GtS | RelOp::Gt => CmpKind::SGt,
        RelOp::GtU => CmpKind::UGt,
        RelOp::LeS | RelOp::Le => CmpKind::SLe,
        RelOp::LeU => CmpKind::ULe,
        RelOp::GeS | RelOp::Ge => CmpKind::SGe,
        RelOp::GeU => CmpKind::UGe,
    };
    let t = cg.fresh_temp();
    cg.emit(Inst::Comparison { result: t, operand_ty, op: kind, lhs: lhs.value, rhs: rhs.value });
    cg.push_value(Value::Temp(t), IlType::W);
    Ok(())
}

fn translate_convert(cg: &mut CompileState, offset: usize, op: ConvertOp) -> Result<(), CompileError> {
    let operand = cg.pop_value(offset)?;
    let (result_ty, kind) = match op {
        ConvertOp::I32WrapI64 => (IlType::W, None),
        ConvertOp::I64ExtendI32S => (IlType::L, Some(ConvKind::ExtSW)),
        ConvertOp::I64ExtendI32U => (IlType::L, Some(ConvKind::ExtUW)),
        ConvertOp::I32TruncF32S => (IlType::W, Some(ConvKind::StoSI)),
        ConvertOp::I32TruncF32U => (IlType::W, Some(ConvKind::StoUI)),
        ConvertOp::I32TruncF64S => (IlType::W, Some(ConvKind::DtoSI)),
        ConvertOp::I32TruncF64U => (IlType::W, Some(ConvKind::DtoUI)),
        ConvertOp::I64TruncF32S => (IlType::L, Some(ConvKind::StoSI)),
        ConvertOp::I64TruncF32U => (IlType::L, Some(ConvKind::StoUI)),
        ConvertOp::I64TruncF64S => (IlType::L, Some(ConvKind::DtoSI)),
        ConvertOp::I64TruncF64U => (IlType::L, Some(ConvKind::DtoUI)),
        ConvertOp::F32ConvertI32S => (IlType::S, Some(ConvKind::SwToF)),
        ConvertOp::F32ConvertI32U => (IlType::S, Some(ConvKind::UwToF)),
        ConvertOp::F32ConvertI64S => (IlType::S, Some(ConvKind::SlToF)),
        ConvertOp::F32ConvertI64U => (IlType::S, Some(ConvKind::UlToF)),
        ConvertOp::F64ConvertI32S => (IlType::D, Some(ConvKind::SwToF)),
        ConvertOp::F64ConvertI32U => (IlType::D, Some(ConvKind::UwToF)),
        ConvertOp::F64ConvertI64S => (IlType::D, Some(ConvKind::SlToF)),
        ConvertOp::F64ConvertI64U => (IlType::D, Some(ConvKind::UlToF)),
        ConvertOp::F32DemoteF64 => (IlType::S, Some(ConvKind::Truncd)),
        ConvertOp::F64PromoteF32 => (IlType::D, Some(ConvKind::Exts)),
        ConvertOp::I32ReinterpretF32 => (IlType::W, Some(ConvKind::CastFloatToInt)),
        ConvertOp::I64ReinterpretF64 => (IlType::L, Some(ConvKind::CastFloatToInt)),
        ConvertOp::F32ReinterpretI32 => (IlType::S, Some(ConvKind::CastIntToFloat)),
        ConvertOp::F64ReinterpretI64 => (IlType::D, Some(ConvKind::CastIntToFloat)),
    };

    let result = match kind {
        None => {
            let t = cg.fresh_temp();
            cg.emit(Inst::Copy { result: t, ty: result_ty, value: operand.value });
            Value::Temp(t)
        }
        Some(op) => {
            let t = cg.fresh_temp();
            cg.emit(Inst::Conversion { result: t, result_ty, op, operand: operand.value });
            Value::Temp(t)
        }
    };
    cg.push_value(result, result_ty);
    Ok(())
}

fn translate_sat_convert(cg: &mut CompileState, offset: usize, op: SatConvertOp) -> Result<(), CompileError> {
    let operand = cg.pop_value(offset)?;
    let (name, src_ty, result_ty) = match op {
        SatConvertOp::I32TruncSatF32S => ("__wasm_i32_trunc_sat_f32_s", IlType::S, IlType::W),
        SatConvertOp::I32TruncSatF32U => ("__wasm_i32_trunc_sat_f32_u", IlType::S, IlType::W),
        SatConvertOp::I32TruncSatF64S => ("__wasm_i32_trunc_sat_f64_s", IlType::D, IlType::W),
        SatConvertOp::I32TruncSatF64U => ("__wasm_i32_trunc_sat_f64_u", IlType::D, IlType::W),
        SatConvertOp::I64TruncSatF32S => ("__wasm_i64_trunc_sat_f32_s", IlType::S, IlType::L),
        SatConvertOp::I64TruncSatF32U => ("__wasm_i64_trunc_sat_f32_u", IlType::S, IlType::L),
        SatConvertOp::I64TruncSatF64S => ("__wasm_i64_trunc_sat_f64_s", IlType::D, IlType::L),
        SatConvertOp::I64TruncSatF64U => ("__wasm_i64_trunc_sat_f64_u", IlType::D, IlType::L),
    };
    let result = cg.emit_runtime_call(name, vec![(src_ty, operand.value)], Some(result_ty)).unwrap();
    cg.push_value(result, result_ty);
    Ok(())
}

fn translate_extend(cg: &mut CompileState, offset: usize, ty: IntType, op: ConvKind) -> Result<(), CompileError> {
    let operand = cg.pop_value(offset)?;
    let result_ty = int_il_ty(ty);
    let t = cg.fresh_temp();
    cg.emit(Inst::Conversion { result: t, result_ty, op, operand: operand.value });
    cg.push_value(Value::Temp(t), result_ty);
    Ok(())
}
