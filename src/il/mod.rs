//! The QBE-flavored typed IL builder and textual emitter (spec.md §4.4, §6).

mod inst;
mod module;
mod value;

pub use inst::{BinOpKind, CallTarget, CmpKind, ConvKind, Inst, Terminator, UnOpKind};
pub use module::{Block, DataDef, DataField, Function, IlModule, Param};
pub use value::{Global, IlType, Label, MemType, Temporary, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_minimal_constant_function() {
        let mut func = Function::new("wasm_main", true);
        func.return_type = Some(IlType::W);
        let mut entry = Block::new(Label(0));
        entry.push(Inst::Copy {
            result: Temporary(0),
            ty: IlType::W,
            value: Value::IntConst(42),
        });
        entry.terminate(Terminator::Return(Some(Value::Temp(Temporary(0))))).unwrap();
        func.blocks.push(entry);

        let mut module = IlModule::new();
        module.functions.push(func);
        let text = module.render();
        assert!(text.contains("export function w $wasm_main()"));
        assert!(text.contains("%t0 =<w> copy 42"));
        assert!(text.contains("ret %t0"));
    }

    #[test]
    fn double_terminate_is_an_error_not_a_panic() {
        let mut block = Block::new(Label(0));
        block.terminate(Terminator::Halt).unwrap();
        assert!(block.terminate(Terminator::Halt).is_err());
    }

    #[test]
    fn phi_renders_two_incoming_pairs() {
        let mut block = Block::new(Label(2));
        block.push(Inst::Phi {
            result: Temporary(5),
            ty: IlType::W,
            incoming: vec![
                (Label(0), Value::Temp(Temporary(1))),
                (Label(1), Value::Temp(Temporary(2))),
            ],
        });
        let mut out = String::new();
        for phi in &block.phis {
            out.push_str(&phi.to_string());
        }
        assert_eq!(out, "%t5 =<w> phi @L0 %t1, @L1 %t2");
    }
}
