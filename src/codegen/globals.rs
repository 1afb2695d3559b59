//! `global.get`/`global.set` (spec.md §4.3): globals are emitted as module
//! data definitions (`state.rs::emit_globals`), so access is a plain
//! load/store against the global's data symbol.

use crate::error::CompileError;
use crate::il::{Global, IlType, Inst, Value};

use super::state::{mem_type_for, CompileState};
use super::mangle;

fn global_symbol(cg: &CompileState, idx: u32) -> Result<(String, crate::types::ValueType), CompileError> {
    let ty = cg
        .module
        .global_type(idx)
        .ok_or_else(|| cg.err(0, format!("global {idx} out of bounds")))?;

    let num_imported = cg.module.num_imported_globals();
    if idx < num_imported {
        let mut seen = 0u32;
        for import in &cg.module.imports {
            if let crate::decode::ImportDesc::Global(_) = &import.desc {
                if seen == idx {
                    return Ok((import.field.clone(), ty.value_type));
                }
                seen += 1;
            }
        }
        return Err(cg.err(0, format!("imported global {idx} not found")));
    }

    let exported = cg
        .module
        .exports
        .iter()
        .find(|e| e.kind == crate::decode::ExportKind::Global && e.index == idx);
    let name = match exported {
        Some(e) => mangle::mangle_exported_global(&e.name),
        None => mangle::mangle_internal_global(idx),
    };
    Ok((name, ty.value_type))
}

pub fn translate_global_get(cg: &mut CompileState, offset: usize, idx: u32) -> Result<(), CompileError> {
    let (symbol, value_type) = global_symbol(cg, idx)?;
    let il_ty = IlType::from_value_type(value_type);
    let result = cg.fresh_temp();
    cg.emit(Inst::Load {
        result,
        load_type: mem_type_for(value_type),
        result_ty: il_ty,
        address: Value::Global(Global(symbol)),
    });
    cg.push_value(Value::Temp(result), il_ty);
    Ok(())
}

pub fn translate_global_set(cg: &mut CompileState, offset: usize, idx: u32) -> Result<(), CompileError> {
    let (symbol, value_type) = global_symbol(cg, idx)?;
    let v = cg.pop_value(offset)?;
    cg.emit(Inst::Store {
        store_type: mem_type_for(value_type),
        value: v.value,
        address: Value::Global(Global(symbol)),
    });
    Ok(())
}
