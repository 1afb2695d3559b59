//! `CompileState`: the per-function translation context (spec.md §4.3, §5
//! "CompileState is stack-local to a function") plus module-level emission
//! and the structured-control-flow translators.

use crate::decode::Module;
use crate::error::CompileError;
use crate::il::{
    Block, CallTarget, DataDef, DataField, Function, Global, IlModule, IlType, Inst, Label, Param,
    Temporary, Terminator, Value,
};
use crate::interp_const::{eval_const_expr, ConstValue};
use crate::opcode::{Instr, InstrReader};
use crate::types::{CompositeType, FuncType, ValueType};

use super::mangle;
use super::target::TargetTag;

/// An operand-stack entry the generator tracks while walking a function body
/// (spec.md §4.3: "maintain `current_block`... instruction translators may
/// terminate it").
#[derive(Debug, Clone)]
pub struct StackSlot {
    pub value: Value,
    pub ty: IlType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Block,
    Loop,
    If,
    IfElse,
    Try,
}

pub struct CodegenFrame {
    pub kind: FrameKind,
    pub result_types: Vec<ValueType>,
    /// Where `br d` targeting this frame jumps: the loop header for `loop`,
    /// the end label for everything else (spec.md §4.3 "Structured control
    /// flow").
    pub branch_label: Label,
    /// The label used for the block created once this frame's `end` is
    /// reached.
    pub end_label: Label,
    pub else_label: Option<Label>,
    /// The live param values captured when the frame opened, so an `if`'s
    /// `else` arm can restart from the same inputs as its `then` arm
    /// (spec.md §9 "Control-frame book-keeping").
    pub param_values: Vec<StackSlot>,
    pub stack_floor: usize,
    /// Captured at the `else` opcode: the then-arm's terminal block label
    /// and its top-of-stack result values (spec.md §9: "recording... both
    /// the then-branch's current block label and the SSA temporaries on
    /// top of the stack").
    pub then_snapshot: Option<(Label, Vec<StackSlot>)>,
    pub unreachable: bool,
    /// `Try` frames only: label of the next catch-dispatch test block to
    /// enter (the landing pad itself, the first time), or `None` once a
    /// `catch_all` has consumed the chain.
    pub next_catch_test: Option<Label>,
    /// `Try` frames only: whether `__wasm_pop_exception_handler` has
    /// already been emitted for this frame (emitted once, on first catch).
    pub handler_popped: bool,
}

pub struct CompileState<'a> {
    pub module: &'a Module,
    pub func_idx: u32,
    pub func_name: Option<String>,
    pub target: TargetTag,
    pub func_type: FuncType,
    pub self_symbol: String,

    temp_counter: u32,
    label_counter: u32,

    pub locals: Vec<ValueType>,
    pub local_slots: Vec<Temporary>,

    pub value_stack: Vec<StackSlot>,
    pub control_stack: Vec<CodegenFrame>,

    /// Address temporaries of the trailing out-pointer parameters, in
    /// result order starting at the function's 2nd result.
    pub out_param_slots: Vec<Temporary>,

    /// One entry per currently-open `try` frame: the arms (then-body plus
    /// each `catch`/`catch_all`) collected so far, for the final merge at
    /// `end` (mirrors `if`/`else`'s `then_snapshot`, generalized to N arms).
    pub exception_arms: Vec<Vec<(Label, Vec<StackSlot>)>>,

    func: Function,
    current_block_idx: usize,
}

impl<'a> CompileState<'a> {
    pub fn fresh_temp(&mut self) -> Temporary {
        let t = Temporary(self.temp_counter);
        self.temp_counter += 1;
        t
    }

    pub fn fresh_label(&mut self) -> Label {
        let l = Label(self.label_counter);
        self.label_counter += 1;
        l
    }

    pub fn err(&self, offset: usize, message: impl Into<String>) -> CompileError {
        CompileError::new(self.func_idx, offset, self.func_name.clone(), message)
    }

    pub fn push_value(&mut self, value: Value, ty: IlType) {
        self.value_stack.push(StackSlot { value, ty });
    }

    pub fn pop_value(&mut self, offset: usize) -> Result<StackSlot, CompileError> {
        let floor = self.control_stack.last().map(|f| f.stack_floor).unwrap_or(0);
        if self.value_stack.len() <= floor {
            if self.control_stack.last().map_or(false, |f| f.unreachable) {
                // Polymorphic stack in unreachable code: synthesize an
                // unused placeholder temporary rather than underflowing.
                let t = self.fresh_temp();
                return Ok(StackSlot { value: Value::Temp(t), ty: IlType::W });
            }
            return Err(self.err(offset, "codegen value stack underflow (validator should have caught this)"));
        }
        Ok(self.value_stack.pop().unwrap())
    }

    pub fn current_block(&mut self) -> &mut Block {
        &mut self.func.blocks[self.current_block_idx]
    }

    pub fn emit(&mut self, inst: Inst) {
        self.current_block().push(inst);
    }

    pub fn is_current_block_terminated(&self) -> bool {
        self.func.blocks[self.current_block_idx].is_terminated()
    }

    /// Label of the block currently being appended to.
    pub fn current_block_label(&self) -> Label {
        self.func.blocks[self.current_block_idx].label
    }

    pub fn terminate(&mut self, offset: usize, term: Terminator) -> Result<(), CompileError> {
        self.current_block()
            .terminate(term)
            .map_err(|msg| self.err(offset, msg))
    }

    /// Start a new current block under `label`, appending it to the
    /// function's block list.
    pub fn start_block(&mut self, label: Label) {
        self.func.blocks.push(Block::new(label));
        self.current_block_idx = self.func.blocks.len() - 1;
    }

    /// Emit a call, per-the fixed runtime ABI (spec.md §6), with a typed
    /// result if `result_ty` is `Some`.
    pub fn emit_runtime_call(
        &mut self,
        name: &str,
        args: Vec<(IlType, Value)>,
        result_ty: Option<IlType>,
    ) -> Option<Value> {
        let result = result_ty.map(|ty| (self.fresh_temp(), ty));
        self.emit(Inst::Call {
            target: CallTarget::Direct(Global(name.to_string())),
            args,
            result,
        });
        result.map(|(t, _)| Value::Temp(t))
    }
}

/// Compile a decoded, already-validated module to IL (spec.md §4.3's public
/// contract `compile(Module, target) -> IlModule`).
pub fn compile(module: &Module, target: TargetTag) -> Result<IlModule, CompileError> {
    let mut il = IlModule::new();
    emit_globals(module, &mut il)?;

    let num_imported = module.num_imported_funcs();
    for (i, body) in module.code.iter().enumerate() {
        let func_idx = num_imported + i as u32;
        let func = compile_function(module, func_idx, body, target)?;
        il.functions.push(func);
    }
    Ok(il)
}

fn emit_globals(module: &Module, il: &mut IlModule) -> Result<(), CompileError> {
    let num_imported_globals = module.num_imported_globals();
    let export_names: std::collections::BTreeMap<u32, &str> = module
        .exports
        .iter()
        .filter(|e| e.kind == crate::decode::ExportKind::Global)
        .map(|e| (e.index, e.name.as_str()))
        .collect();

    for (i, global) in module.globals.iter().enumerate() {
        let idx = num_imported_globals + i as u32;
        let value = eval_const_expr(module, &global.init_expr, idx)?;
        let ty = IlType::from_value_type(global.ty.value_type);
        let field = DataField {
            ty,
            value: const_value_to_il(value),
        };
        let name = match export_names.get(&idx) {
            Some(n) => mangle::mangle_exported_global(n),
            None => mangle::mangle_internal_global(idx),
        };
        il.data.push(DataDef {
            name,
            fields: vec![field],
            exported: export_names.contains_key(&idx),
        });
    }
    Ok(())
}

fn const_value_to_il(v: ConstValue) -> Value {
    match v {
        ConstValue::I32(n) => Value::IntConst(n as i64),
        ConstValue::I64(n) => Value::IntConst(n),
        ConstValue::F32(n) => Value::FloatConst(n as f64),
        ConstValue::F64(n) => Value::FloatConst(n),
        ConstValue::RefFunc(Some(idx)) => Value::IntConst(idx as i64),
        ConstValue::RefFunc(None) | ConstValue::RefNull => Value::IntConst(0),
    }
}

fn compile_function(
    module: &Module,
    func_idx: u32,
    body: &crate::decode::FunctionBody,
    target: TargetTag,
) -> Result<Function, CompileError> {
    let type_idx = module
        .func_type_index(func_idx)
        .ok_or_else(|| CompileError::new(func_idx, 0, None, "function has no resolvable type"))?;
    let func_type = module
        .types
        .get(type_idx as usize)
        .and_then(CompositeType::as_func)
        .ok_or_else(|| CompileError::new(func_idx, 0, None, "type index is not a function type"))?
        .clone();

    let debug_name = module.func_names.get(&func_idx).cloned();
    let exported = module
        .exports
        .iter()
        .find(|e| e.kind == crate::decode::ExportKind::Func && e.index == func_idx);
    let self_symbol = match exported {
        Some(e) => mangle::mangle_exported_func(&e.name),
        None => mangle::mangle_internal_func(debug_name.as_deref(), func_idx),
    };

    let mut locals = func_type.params.clone();
    locals.extend(body.expand_locals());

    let mut func = Function::new(self_symbol.clone(), exported.is_some());
    func.return_type = func_type.results.first().map(|&t| IlType::from_value_type(t));
    func.blocks.push(Block::new(Label(0)));

    let mut cg = CompileState {
        module,
        func_idx,
        func_name: debug_name,
        target,
        func_type: func_type.clone(),
        self_symbol,
        temp_counter: 0,
        label_counter: 1,
        locals: locals.clone(),
        local_slots: Vec::new(),
        value_stack: Vec::new(),
        control_stack: Vec::new(),
        out_param_slots: Vec::new(),
        exception_arms: Vec::new(),
        func,
        current_block_idx: 0,
    };

    // Parameter temporaries are allocated first so their dense ids double
    // as their textual names in the function signature (`%t0`, `%t1`, …);
    // the out-pointer parameters for results 2..n follow them.
    let mut param_temps = Vec::with_capacity(func_type.params.len());
    for &p in &func_type.params {
        let t = cg.fresh_temp();
        cg.func.params.push(Param { name: t.to_string(), ty: IlType::from_value_type(p) });
        param_temps.push(t);
    }
    // Multi-value results use an out-pointer convention: result 1 returns
    // directly, results 2..n are written through trailing pointer params
    // (spec.md §4.3 point 1).
    let extra_result_count = func_type.results.len().saturating_sub(1);
    let mut out_param_temps = Vec::with_capacity(extra_result_count);
    for _ in 0..extra_result_count {
        let t = cg.fresh_temp();
        cg.func.params.push(Param { name: t.to_string(), ty: IlType::L });
        out_param_temps.push(t);
    }
    cg.out_param_slots = out_param_temps;

    emit_entry_block(&mut cg, &func_type, &param_temps)?;

    cg.control_stack.push(CodegenFrame {
        kind: FrameKind::Block,
        result_types: func_type.results.clone(),
        branch_label: Label(u32::MAX), // function-level frame: `br` out of it is `return`'s job, never targeted directly
        end_label: Label(u32::MAX),
        else_label: None,
        param_values: Vec::new(),
        stack_floor: 0,
        then_snapshot: None,
        unreachable: false,
        next_catch_test: None,
        handler_popped: false,
    });

    let mut reader = InstrReader::new(&body.code);
    loop {
        match reader.next() {
            Ok(Some((offset, instr))) => {
                super::translate::translate_instr(&mut cg, offset, &instr)?;
            }
            Ok(None) => break,
            Err(e) => return Err(CompileError::new(func_idx, e.offset, cg.func_name.clone(), e.message)),
        }
    }

    if !cg.is_current_block_terminated() {
        let results = collect_return_values(&mut cg, body.code.len(), &func_type)?;
        emit_return(&mut cg, body.code.len(), results)?;
    }

    Ok(cg.func)
}

/// Allocate a stack slot for every local (params included), store the
/// incoming parameters, zero-initialize the rest (spec.md §4.3 point 2).
fn emit_entry_block(
    cg: &mut CompileState,
    func_type: &FuncType,
    param_temps: &[Temporary],
) -> Result<(), CompileError> {
    for (i, &local_ty) in cg.locals.clone().iter().enumerate() {
        let slot = cg.fresh_temp();
        let size = local_ty.slot_size();
        cg.emit(Inst::Alloc { result: slot, size, align: size });
        cg.local_slots.push(slot);

        if i < func_type.params.len() {
            cg.emit(Inst::Store {
                store_type: mem_type_for(local_ty),
                value: Value::Temp(param_temps[i]),
                address: Value::Temp(slot),
            });
        } else {
            let zero = match IlType::from_value_type(local_ty) {
                IlType::S | IlType::D => Value::FloatConst(0.0),
                _ => Value::IntConst(0),
            };
            cg.emit(Inst::Store {
                store_type: mem_type_for(local_ty),
                value: zero,
                address: Value::Temp(slot),
            });
        }
    }
    Ok(())
}

pub fn mem_type_for(ty: ValueType) -> crate::il::MemType {
    use crate::il::MemType;
    match ty {
        ValueType::I32 => MemType::W,
        ValueType::I64 => MemType::L,
        ValueType::F32 => MemType::S,
        ValueType::F64 => MemType::D,
        ValueType::I8 => MemType::B,
        ValueType::I16 => MemType::H,
        r if r.is_reference() => MemType::L,
        _ => MemType::L,
    }
}

/// Pop `|results|` values off the stack for a `return`/fallthrough, in
/// declared order (spec.md §4.3 "return: pop |results| values").
pub fn collect_return_values(
    cg: &mut CompileState,
    offset: usize,
    func_type: &FuncType,
) -> Result<Vec<StackSlot>, CompileError> {
    let mut values = Vec::with_capacity(func_type.results.len());
    for _ in &func_type.results {
        values.push(cg.pop_value(offset)?);
    }
    values.reverse();
    Ok(values)
}

/// Emit a `return`: first result returned directly, results 2..n stored
/// through the trailing out-pointer parameters (spec.md §4.3 point 1, "Calls").
pub fn emit_return(cg: &mut CompileState, offset: usize, results: Vec<StackSlot>) -> Result<(), CompileError> {
    for (i, slot) in results.iter().enumerate().skip(1) {
        let out_slot = cg.out_param_slots[i - 1];
        cg.emit(Inst::Store {
            store_type: mem_type_for_il(slot.ty),
            value: slot.value.clone(),
            address: Value::Temp(out_slot),
        });
    }
    let ret_value = results.first().map(|s| s.value.clone());
    cg.terminate(offset, Terminator::Return(ret_value))
}

fn mem_type_for_il(ty: IlType) -> crate::il::MemType {
    use crate::il::MemType;
    match ty {
        IlType::W => MemType::W,
        IlType::L => MemType::L,
        IlType::S => MemType::S,
        IlType::D => MemType::D,
    }
}
