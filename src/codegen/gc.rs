//! GC instructions (spec.md §4.3, SPEC_FULL.md supplemented from
//! `original_source`): struct/array allocation and field access, `i31`
//! boxing, and `ref.test`/`ref.cast`. None of these have a native IL form;
//! the runtime owns object layout and type metadata, so every op is a call
//! using the fixed names in spec.md §6.

use crate::error::CompileError;
use crate::il::{IlType, Value};
use crate::opcode::Instr;

use super::state::CompileState;

pub fn translate_gc(cg: &mut CompileState, offset: usize, instr: &Instr) -> Result<(), CompileError> {
    match *instr {
        Instr::StructNew(type_idx) => {
            let field_count = struct_field_count(cg, offset, type_idx)?;
            let mut args = Vec::with_capacity(field_count + 1);
            let mut fields = Vec::with_capacity(field_count);
            for _ in 0..field_count {
                fields.push(cg.pop_value(offset)?);
            }
            fields.reverse();
            args.push((IlType::W, Value::IntConst(type_idx as i64)));
            args.extend(fields.into_iter().map(|s| (s.ty, s.value)));
            let r = cg.emit_runtime_call("__wasm_struct_new", args, Some(IlType::L)).unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::StructNewDefault(type_idx) => {
            let r = cg
                .emit_runtime_call("__wasm_struct_new_default", vec![(IlType::W, Value::IntConst(type_idx as i64))], Some(IlType::L))
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::StructGet(type_idx, field) | Instr::StructGetS(type_idx, field) | Instr::StructGetU(type_idx, field) => {
            let obj = cg.pop_value(offset)?;
            let r = cg
                .emit_runtime_call(
                    "__wasm_struct_get",
                    vec![(IlType::W, Value::IntConst(type_idx as i64)), (IlType::W, Value::IntConst(field as i64)), (obj.ty, obj.value)],
                    Some(IlType::L),
                )
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::StructSet(type_idx, field) => {
            let value = cg.pop_value(offset)?;
            let obj = cg.pop_value(offset)?;
            cg.emit_runtime_call(
                "__wasm_struct_set",
                vec![
                    (IlType::W, Value::IntConst(type_idx as i64)),
                    (IlType::W, Value::IntConst(field as i64)),
                    (obj.ty, obj.value),
                    (value.ty, value.value),
                ],
                None,
            );
            Ok(())
        }
        Instr::ArrayNew(type_idx) => {
            let len = cg.pop_value(offset)?;
            let init = cg.pop_value(offset)?;
            let r = cg
                .emit_runtime_call(
                    "__wasm_array_new",
                    vec![(IlType::W, Value::IntConst(type_idx as i64)), (init.ty, init.value), (len.ty, len.value)],
                    Some(IlType::L),
                )
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::ArrayNewDefault(type_idx) => {
            let len = cg.pop_value(offset)?;
            let r = cg
                .emit_runtime_call(
                    "__wasm_array_new_default",
                    vec![(IlType::W, Value::IntConst(type_idx as i64)), (len.ty, len.value)],
                    Some(IlType::L),
                )
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::ArrayNewFixed(type_idx, count) => {
            let mut elems = Vec::with_capacity(count as usize);
            for _ in 0..count {
                elems.push(cg.pop_value(offset)?);
            }
            elems.reverse();
            let mut args = vec![(IlType::W, Value::IntConst(type_idx as i64)), (IlType::W, Value::IntConst(count as i64))];
            args.extend(elems.into_iter().map(|s| (s.ty, s.value)));
            let r = cg.emit_runtime_call("__wasm_array_new_fixed", args, Some(IlType::L)).unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::ArrayGet(type_idx) | Instr::ArrayGetS(type_idx) | Instr::ArrayGetU(type_idx) => {
            let idx = cg.pop_value(offset)?;
            let obj = cg.pop_value(offset)?;
            let r = cg
                .emit_runtime_call(
                    "__wasm_array_get",
                    vec![(IlType::W, Value::IntConst(type_idx as i64)), (obj.ty, obj.value), (idx.ty, idx.value)],
                    Some(IlType::L),
                )
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::ArraySet(type_idx) => {
            let value = cg.pop_value(offset)?;
            let idx = cg.pop_value(offset)?;
            let obj = cg.pop_value(offset)?;
            cg.emit_runtime_call(
                "__wasm_array_set",
                vec![
                    (IlType::W, Value::IntConst(type_idx as i64)),
                    (obj.ty, obj.value),
                    (idx.ty, idx.value),
                    (value.ty, value.value),
                ],
                None,
            );
            Ok(())
        }
        Instr::ArrayLen => {
            let obj = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_array_len", vec![(obj.ty, obj.value)], Some(IlType::W)).unwrap();
            cg.push_value(r, IlType::W);
            Ok(())
        }
        Instr::RefI31 => {
            let v = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_ref_i31", vec![(v.ty, v.value)], Some(IlType::L)).unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::I31GetS => {
            let v = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_i31_get_s", vec![(v.ty, v.value)], Some(IlType::W)).unwrap();
            cg.push_value(r, IlType::W);
            Ok(())
        }
        Instr::I31GetU => {
            let v = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_i31_get_u", vec![(v.ty, v.value)], Some(IlType::W)).unwrap();
            cg.push_value(r, IlType::W);
            Ok(())
        }
        Instr::RefTest(type_idx, nullable) => {
            let v = cg.pop_value(offset)?;
            let name = if nullable { "__wasm_ref_test_null" } else { "__wasm_ref_test" };
            let r = cg
                .emit_runtime_call(name, vec![(IlType::W, Value::IntConst(type_idx as i64)), (v.ty, v.value)], Some(IlType::W))
                .unwrap();
            cg.push_value(r, IlType::W);
            Ok(())
        }
        Instr::RefCast(type_idx, nullable) => {
            let v = cg.pop_value(offset)?;
            let name = if nullable { "__wasm_ref_cast_null" } else { "__wasm_ref_cast" };
            let r = cg
                .emit_runtime_call(name, vec![(IlType::W, Value::IntConst(type_idx as i64)), (v.ty, v.value)], Some(IlType::L))
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::AnyConvertExtern => {
            let v = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_any_convert_extern", vec![(v.ty, v.value)], Some(IlType::L)).unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::ExternConvertAny => {
            let v = cg.pop_value(offset)?;
            let r = cg.emit_runtime_call("__wasm_extern_convert_any", vec![(v.ty, v.value)], Some(IlType::L)).unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        _ => unreachable!("translate_gc called with a non-GC instruction"),
    }
}

fn struct_field_count(cg: &CompileState, offset: usize, type_idx: u32) -> Result<usize, CompileError> {
    cg.module
        .types
        .get(type_idx as usize)
        .and_then(crate::types::CompositeType::as_struct)
        .map(|s| s.fields.len())
        .ok_or_else(|| cg.err(offset, format!("type {type_idx} is not a struct type")))
}
