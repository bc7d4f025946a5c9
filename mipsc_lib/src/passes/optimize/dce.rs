//! Function-level dead-code elimination.
//!
//! Two sweeps over the whole function: collect every used name (all
//! `arg1`/`arg2` operands plus the `result` field of the opcodes that
//! read it), then delete instructions that define a temporary nobody
//! uses, provided the opcode has no side effect. Named variables are
//! never deleted — they may be live in another block.

use std::collections::HashSet;

use super::Function;
use crate::ir::Operand;

pub(super) fn run(func: &mut Function) -> bool {
    let mut used: HashSet<String> = HashSet::new();

    for &id in &func.order {
        for instr in &func.blocks[id].instrs {
            for op in [&instr.arg1, &instr.arg2] {
                if let Some(name) = op.as_ref().and_then(Operand::value_name) {
                    used.insert(name);
                }
            }
            if instr.op.result_is_use() {
                if let Some(name) = instr.result.as_ref().and_then(Operand::value_name) {
                    used.insert(name);
                }
            }
        }
    }

    let mut changed = false;
    for &id in &func.order {
        let block = &mut func.blocks[id];
        let before = block.instrs.len();
        block.instrs.retain(|instr| {
            if instr.op.has_side_effect() {
                return true;
            }
            // `x = x` is a no-op whatever x is; copy propagation
            // produces these when a chain collapses onto itself.
            if instr.op == crate::ir::Opcode::Assign {
                let result = instr.result.as_ref().and_then(Operand::value_name);
                let arg1 = instr.arg1.as_ref().and_then(Operand::value_name);
                if result.is_some() && result == arg1 {
                    return false;
                }
            }
            match &instr.result {
                Some(op @ Operand::Temp(_)) => {
                    let name = op.to_string();
                    used.contains(&name)
                }
                // Only temporaries are provably local to the function.
                _ => true,
            }
        });
        changed |= block.instrs.len() != before;
    }

    changed
}
