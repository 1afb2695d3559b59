//! `Block`, `Function`, `Module` and textual serialization (spec.md §4.4, §6).

use super::inst::{Inst, Terminator};
use super::value::IlType;
use std::fmt::Write as _;

/// A single basic block: a name, its phi nodes (kept separate from the
/// ordinary instruction list so the printer can place them first, matching
/// the textual grammar in spec.md §6), its body, and exactly one terminator.
#[derive(Debug, Clone)]
pub struct Block {
    pub label: super::value::Label,
    pub phis: Vec<Inst>,
    pub insts: Vec<Inst>,
    pub terminator: Option<Terminator>,
}

impl Block {
    pub fn new(label: super::value::Label) -> Self {
        Block {
            label,
            phis: Vec::new(),
            insts: Vec::new(),
            terminator: None,
        }
    }

    pub fn push(&mut self, inst: Inst) {
        debug_assert!(
            self.terminator.is_none(),
            "pushed an instruction after the block was terminated"
        );
        match &inst {
            Inst::Phi { .. } => self.phis.push(inst),
            _ => self.insts.push(inst),
        }
    }

    /// Set the block's terminator. Per spec.md §8 property 5, this must only
    /// ever be called once per block; a second call is a codegen bug
    /// surfaced as a `CompileError` by the caller, not a panic.
    pub fn terminate(&mut self, term: Terminator) -> Result<(), String> {
        if self.terminator.is_some() {
            return Err(format!("block {} already has a terminator", self.label));
        }
        self.terminator = Some(term);
        Ok(())
    }

    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: IlType,
}

/// One IL function (spec.md §4.4): parameters, an optional return type, an
/// export flag, and its block list — the first block is the implicit entry
/// point.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<IlType>,
    pub exported: bool,
    pub blocks: Vec<Block>,
}

impl Function {
    pub fn new(name: impl Into<String>, exported: bool) -> Self {
        Function {
            name: name.into(),
            params: Vec::new(),
            return_type: None,
            exported,
            blocks: Vec::new(),
        }
    }

    pub fn render(&self, out: &mut String) {
        if self.exported {
            out.push_str("export ");
        }
        out.push_str("function");
        if let Some(ret) = self.return_type {
            let _ = write!(out, " {ret}");
        }
        let _ = write!(out, " ${}(", self.name);
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} {}", p.ty, p.name);
        }
        out.push_str(") {\n");
        for (i, block) in self.blocks.iter().enumerate() {
            if i == 0 {
                out.push_str("@entry\n");
            } else {
                let _ = writeln!(out, "{}", block.label);
            }
            for phi in &block.phis {
                let _ = writeln!(out, "\t{phi}");
            }
            for inst in &block.insts {
                let _ = writeln!(out, "\t{inst}");
            }
            if let Some(term) = &block.terminator {
                let _ = writeln!(out, "\t{term}");
            }
        }
        out.push_str("}\n");
    }
}

#[derive(Debug, Clone)]
pub struct DataField {
    pub ty: IlType,
    pub value: super::value::Value,
}

/// A module-level data definition (spec.md §4.3 point 1: evaluated global
/// initializers become typed data definitions).
#[derive(Debug, Clone)]
pub struct DataDef {
    pub name: String,
    pub fields: Vec<DataField>,
    pub exported: bool,
}

impl DataDef {
    pub fn render(&self, out: &mut String) {
        if self.exported {
            out.push_str("export ");
        }
        let _ = write!(out, "data ${} = {{ ", self.name);
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{} {}", field.ty, field.value);
        }
        out.push_str(" }\n");
    }
}

/// The complete output of a single compilation (spec.md §4.4): functions
/// plus data definitions, serializing to the textual IL (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct IlModule {
    pub functions: Vec<Function>,
    pub data: Vec<DataDef>,
}

impl IlModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the whole module to its textual form. Deterministic: the same
    /// `IlModule` always renders identically (spec.md §8 property 4).
    pub fn render(&self) -> String {
        let mut out = String::new();
        for data in &self.data {
            data.render(&mut out);
        }
        for func in &self.functions {
            func.render(&mut out);
        }
        out
    }
}
