//! Table instructions (spec.md §4.3): tables are opaque runtime-managed
//! structures, so every operation is a call into the fixed runtime ABI
//! (spec.md §6), parameterized by a constant table index argument.

use crate::error::CompileError;
use crate::il::{IlType, Value};
use crate::opcode::Instr;

use super::state::CompileState;

pub fn translate_table(cg: &mut CompileState, offset: usize, instr: &Instr) -> Result<(), CompileError> {
    match *instr {
        Instr::TableGet(table) => {
            let idx = cg.pop_value(offset)?;
            let r = cg
                .emit_runtime_call("__wasm_table_get", vec![(IlType::W, Value::IntConst(table as i64)), (idx.ty, idx.value)], Some(IlType::L))
                .unwrap();
            cg.push_value(r, IlType::L);
            Ok(())
        }
        Instr::TableSet(table) => {
            let value = cg.pop_value(offset)?;
            let idx = cg.pop_value(offset)?;
            cg.emit_runtime_call(
                "__wasm_table_set",
                vec![(IlType::W, Value::IntConst(table as i64)), (idx.ty, idx.value), (value.ty, value.value)],
                None,
            );
            Ok(())
        }
        Instr::TableInit(elem, table) => {
            let len = cg.pop_value(offset)?;
            let src = cg.pop_value(offset)?;
            let dst = cg.pop_value(offset)?;
            cg.emit_runtime_call(
                "__wasm_table_init",
                vec![
                    (IlType::W, Value::IntConst(table as i64)),
                    (IlType::W, Value::IntConst(elem as i64)),
                    (dst.ty, dst.value),
                    (src.ty, src.value),
                    (len.ty, len.value),
                ],
                None,
            );
            Ok(())
        }
        Instr::ElemDrop(elem) => {
            cg.emit_runtime_call("__wasm_elem_drop", vec![(IlType::W, Value::IntConst(elem as i64))], None);
            Ok(())
        }
        Instr::TableCopy(dst_table, src_table) => {
            let len = cg.pop_value(offset)?;
            let src = cg.pop_value(offset)?;
            let dst = cg.pop_value(offset)?;
            cg.emit_runtime_call(
                "__wasm_table_copy",
                vec![
                    (IlType::W, Value::IntConst(dst_table as i64)),
                    (IlType::W, Value::IntConst(src_table as i64)),
                    (dst.ty, dst.value),
                    (src.ty, src.value),
                    (len.ty, len.value),
                ],
                None,
            );
            Ok(())
        }
        Instr::TableGrow(table) => {
            let delta = cg.pop_value(offset)?;
            let init = cg.pop_value(offset)?;
            let r = cg
                .emit_runtime_call(
                    "__wasm_table_grow",
                    vec![(IlType::W, Value::IntConst(table as i64)), (init.ty, init.value), (delta.ty, delta.value)],
                    Some(IlType::W),
                )
                .unwrap();
            cg.push_value(r, IlType::W);
            Ok(())
        }
        Instr::TableSize(table) => {
            let r = cg.emit_runtime_call("__wasm_table_size", vec![(IlType::W, Value::IntConst(table as i64))], Some(IlType::W)).unwrap();
            cg.push_value(r, IlType::W);
            Ok(())
        }
        Instr::TableFill(table) => {
            let len = cg.pop_value(offset)?;
            let value = cg.pop_value(offset)?;
            let dst = cg.pop_value(offset)?;
            cg.emit_runtime_call(
                "__wasm_table_fill",
                vec![(IlType::W, Value::IntConst(table as i64)), (dst.ty, dst.value), (value.ty, value.value), (len.ty, len.value)],
                None,
            );
            Ok(())
        }
        _ => unreachable!("translate_table called with a non-table instruction"),
    }
}
