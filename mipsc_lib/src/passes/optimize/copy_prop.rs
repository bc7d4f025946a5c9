//! Copy propagation over one block.
//!
//! `assign x, y` with `y` a temporary or variable records `x → y`;
//! later uses of `x` are replaced by `y`. Immediates are never
//! propagated here — that is constant folding's job, and several MIPS
//! instructions cannot take an immediate operand anyway. Any other
//! definition of `x` kills `x → *` and `* → x`, and a call kills every
//! mapping whose source is a global variable.

use std::collections::HashMap;

use super::BasicBlock;
use crate::ir::{Opcode, Operand};
use crate::symbols::SymbolTable;

pub(super) fn run(block: &mut BasicBlock) -> bool {
    let mut changed = false;
    let mut copies: HashMap<String, Operand> = HashMap::new();

    for instr in &mut block.instrs {
        if instr.op == Opcode::Call {
            copies.retain(|_, src| {
                !matches!(src, Operand::Var { symbol, .. } if symbol.scope == SymbolTable::GLOBAL_SCOPE)
            });
        }

        changed |= substitute(&mut instr.arg1, &copies);
        changed |= substitute(&mut instr.arg2, &copies);
        if instr.op.result_is_use() {
            changed |= substitute(&mut instr.result, &copies);
        }

        let is_copy = instr.op == Opcode::Assign
            && matches!(&instr.arg1, Some(Operand::Temp(_) | Operand::Var { .. }));

        if let Some(defined) = instr.defined_name() {
            // The defined name's old value is gone either way.
            copies.remove(&defined);
            copies.retain(|_, src| src.value_name() != Some(defined.clone()));
            if is_copy {
                let src = instr.arg1.clone().unwrap();
                // `x = x` carries no information.
                if src.value_name() != Some(defined.clone()) {
                    copies.insert(defined, src);
                }
            }
        }
    }

    changed
}

fn substitute(slot: &mut Option<Operand>, copies: &HashMap<String, Operand>) -> bool {
    let Some(op) = slot else { return false };
    let Some(name) = op.value_name() else {
        return false;
    };
    match copies.get(&name) {
        Some(src) if src != op => {
            *slot = Some(src.clone());
            true
        }
        _ => false,
    }
}
