//! Per-function validation context: value-type stack + control-frame stack
//! (spec.md §3 / §4.2), grounded on `validation/func.rs`'s `BlockFrame` /
//! `StackValueType` / value-stack design in the teacher crate.

use crate::decode::Module;
use crate::error::{Issue, Location};
use crate::types::{BlockType, ValueType};

/// A value-stack entry: either a concrete type, or the polymorphic "bottom"
/// type standard WebAssembly validation uses once a region is unreachable
/// (spec.md §4.2 "Unreachable code"): it matches any expected type on pop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackValueType {
    Concrete(ValueType),
    Bottom,
}

impl StackValueType {
    /// Whether `self` (found on the stack) satisfies an expectation of
    /// `expected`. `Bottom` satisfies anything; otherwise exact match.
    pub fn matches(self, expected: ValueType) -> bool {
        match self {
            StackValueType::Bottom => true,
            StackValueType::Concrete(v) => v == expected,
        }
    }
}

impl From<ValueType> for StackValueType {
    fn from(v: ValueType) -> Self {
        StackValueType::Concrete(v)
    }
}

/// A pushed `block`/`loop`/`if`/`try` control frame.
#[derive(Debug, Clone)]
pub struct ControlFrame {
    pub kind: FrameKind,
    /// Value-stack depth when this frame was entered; branching to this
    /// frame resets the stack to this depth plus its result arity.
    pub start_depth: usize,
    pub result_types: Vec<ValueType>,
    /// Once true, a stack pop in this frame synthesizes a `Bottom` value
    /// instead of underflowing (spec.md §4.2 "Unreachable code").
    pub unreachable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Block,
    Loop,
    If,
    // An `if` frame that has seen its `else` opcode; `end` no longer needs
    // the "if without else must have no results" check.
    IfElse,
    Try,
    Catch,
}

pub struct FuncValidationContext<'a> {
    pub module: &'a Module,
    pub func_idx: u32,
    pub locals: Vec<ValueType>,
    pub value_stack: Vec<StackValueType>,
    pub control_stack: Vec<ControlFrame>,
    pub issues: Vec<Issue>,
}

impl<'a> FuncValidationContext<'a> {
    pub fn new(module: &'a Module, func_idx: u32, locals: Vec<ValueType>) -> Self {
        FuncValidationContext {
            module,
            func_idx,
            locals,
            value_stack: Vec::new(),
            control_stack: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn error(&mut self, offset: usize, message: impl Into<String>) {
        self.issues.push(Issue::error(
            Location::in_func(self.func_idx, offset),
            message,
        ));
    }

    pub fn warning(&mut self, offset: usize, message: impl Into<String>) {
        self.issues.push(Issue::warning(
            Location::in_func(self.func_idx, offset),
            message,
        ));
    }

    pub fn current_frame_unreachable(&self) -> bool {
        self.control_stack.last().map_or(false, |f| f.unreachable)
    }

    pub fn push_value(&mut self, ty: ValueType) {
        self.value_stack.push(StackValueType::Concrete(ty));
    }

    /// Pop one value, checking it against `expected`. Returns `true` if the
    /// pop was sound (found a concrete mismatch is reported as an error and
    /// still returns `true` so validation keeps walking the function).
    pub fn pop_value(&mut self, offset: usize, expected: ValueType) {
        let frame_floor = self
            .control_stack
            .last()
            .map(|f| f.start_depth)
            .unwrap_or(0);
        if self.value_stack.len() <= frame_floor {
            if self.current_frame_unreachable() {
                // Polymorphic: popping past the frame floor in unreachable
                // code synthesizes a Bottom value that matches anything.
                return;
            }
            self.error(offset, format!("value stack underflow, expected {expected}"));
            return;
        }
        let actual = self.value_stack.pop().unwrap();
        if !actual.matches(expected) {
            self.error(
                offset,
                format!("type mismatch: expected {expected}, found {actual:?}"),
            );
        }
    }

    pub fn pop_any(&mut self, offset: usize) -> StackValueType {
        let frame_floor = self
            .control_stack
            .last()
            .map(|f| f.start_depth)
            .unwrap_or(0);
        if self.value_stack.len() <= frame_floor {
            if self.current_frame_unreachable() {
                return StackValueType::Bottom;
            }
            self.error(offset, "value stack underflow");
            return StackValueType::Bottom;
        }
        self.value_stack.pop().unwrap()
    }

    pub fn set_unreachable(&mut self) {
        if let Some(frame) = self.control_stack.last_mut() {
            frame.unreachable = true;
            self.value_stack.truncate(frame.start_depth);
        }
    }

    pub fn push_frame(&mut self, kind: FrameKind, block_type: BlockType, offset: usize) {
        let (params, results) = match block_type.params_results(&self.module.types) {
            Ok(pr) => pr,
            Err(message) => {
                self.error(offset, message);
                (&[][..], &[][..])
            }
        };
        let params = params.to_vec();
        let results = results.to_vec();
        // The block's params come off the incoming operand stack (multi-value
        // proposal, spec.md §4.3's "params block type" case) rather than
        // being fabricated: pop and type-check them against whatever the
        // caller actually left on the stack, then re-push as the frame's
        // initial locals-on-stack, mirroring `codegen::translate::open_frame`.
        for &p in params.iter().rev() {
            self.pop_value(offset, p);
        }
        let start_depth = self.value_stack.len();
        for &p in &params {
            self.push_value(p);
        }
        self.control_stack.push(ControlFrame {
            kind,
            start_depth,
            result_types: results,
            unreachable: false,
        });
    }

    /// `br d` / `br_if d` target resolution: the frame `d` levels up from
    /// the top of the control stack.
    pub fn label_at(&self, depth: u32) -> Option<&ControlFrame> {
        let len = self.control_stack.len();
        if (depth as usize) >= len {
            None
        } else {
            Some(&self.control_stack[len - 1 - depth as usize])
        }
    }
}
