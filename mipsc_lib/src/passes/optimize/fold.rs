//! Constant folding over one basic block.
//!
//! A block-local map tracks names with known constant values. Source
//! operands are substituted first (including the `result` field when
//! the opcode uses it as a value), then definitions are folded when
//! both inputs are immediate. Folding is gated: only temporaries and
//! local non-static variables may enter the map, because a call can
//! mutate globals and statics behind the block's back.

use std::collections::HashMap;

use super::BasicBlock;
use crate::ir::{Opcode, Operand};
use crate::symbols::{SymbolTable, SymbolId};

pub(super) fn run(block: &mut BasicBlock, table: &SymbolTable) -> bool {
    let mut changed = false;
    let mut constants: HashMap<String, i32> = HashMap::new();

    for instr in &mut block.instrs {
        // Substitute known-constant sources. The base address of
        // store/load/get-addr is identity, not a value: never touch it.
        if !instr.op.arg1_is_mem_base() {
            changed |= substitute(&mut instr.arg1, &constants);
        }
        changed |= substitute(&mut instr.arg2, &constants);
        if instr.op.result_is_use() {
            changed |= substitute(&mut instr.result, &constants);
        }

        if !instr.op.defines_result() {
            continue;
        }
        let Some(result) = instr.result.clone() else {
            continue;
        };
        let Some(name) = result.value_name() else {
            continue;
        };

        let mut folded_to = None;
        if safe_to_fold(&result, table) {
            folded_to = match (instr.op, &instr.arg1, &instr.arg2) {
                (Opcode::Assign, Some(Operand::Imm(v)), _) => Some(*v),
                (op, Some(Operand::Imm(a)), Some(Operand::Imm(b))) => eval_binary(op, *a, *b),
                (Opcode::Neg, Some(Operand::Imm(v)), None) => Some(v.wrapping_neg()),
                (Opcode::Not, Some(Operand::Imm(v)), None) => Some((*v == 0) as i32),
                _ => None,
            };
        }

        match folded_to {
            Some(value) => {
                if instr.op != Opcode::Assign {
                    instr.op = Opcode::Assign;
                    instr.arg1 = Some(Operand::Imm(value));
                    instr.arg2 = None;
                    changed = true;
                }
                constants.insert(name, value);
            }
            // Redefined without a known value: whatever we knew about
            // the name is stale.
            None => {
                constants.remove(&name);
            }
        }
    }

    changed
}

fn substitute(slot: &mut Option<Operand>, constants: &HashMap<String, i32>) -> bool {
    let Some(op) = slot else { return false };
    if op.is_imm() {
        return false;
    }
    let Some(name) = op.value_name() else {
        return false;
    };
    if let Some(&value) = constants.get(&name) {
        *slot = Some(Operand::Imm(value));
        return true;
    }
    false
}

/// Temporaries are always safe; variables only when local (scope > 1)
/// and not static.
fn safe_to_fold(result: &Operand, table: &SymbolTable) -> bool {
    match result {
        Operand::Temp(_) => true,
        Operand::Var { symbol, .. } => is_foldable_var(*symbol, table),
        _ => false,
    }
}

fn is_foldable_var(id: SymbolId, table: &SymbolTable) -> bool {
    id.scope > SymbolTable::GLOBAL_SCOPE && !table.symbol(id).kind.is_static()
}

fn eval_binary(op: Opcode, a: i32, b: i32) -> Option<i32> {
    Some(match op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::Div => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        Opcode::Mod => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        Opcode::Gt => (a > b) as i32,
        Opcode::Ge => (a >= b) as i32,
        Opcode::Lt => (a < b) as i32,
        Opcode::Le => (a <= b) as i32,
        Opcode::Eq => (a == b) as i32,
        Opcode::Neq => (a != b) as i32,
        Opcode::Sll => a.wrapping_shl(b as u32),
        Opcode::Sra => a.wrapping_shr(b as u32),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrayvec::ArrayVec;

    use crate::ir::Instr;

    fn block(instrs: Vec<Instr>) -> BasicBlock {
        BasicBlock {
            instrs,
            preds: Vec::new(),
            succs: ArrayVec::new(),
        }
    }

    fn t(n: u32) -> Operand {
        Operand::Temp(n)
    }

    fn imm(v: i32) -> Operand {
        Operand::Imm(v)
    }

    #[test]
    fn folds_add_of_immediates_into_assign() {
        let table = SymbolTable::new();
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(imm(3)), Some(imm(4))),
            Instr::new(Opcode::Ret, Some(t(0)), None, None),
        ]);
        assert!(run(&mut b, &table));
        assert_eq!(b.instrs[0].to_string(), "ASSIGN t0, #7, -");
        // The RET's result is a use and picks up the constant.
        assert_eq!(b.instrs[1].to_string(), "RET #7, -, -");
    }

    #[test]
    fn division_by_zero_is_left_alone() {
        let table = SymbolTable::new();
        let mut b = block(vec![Instr::new(
            Opcode::Div,
            Some(t(0)),
            Some(imm(1)),
            Some(imm(0)),
        )]);
        assert!(!run(&mut b, &table));
        assert_eq!(b.instrs[0].op, Opcode::Div);
    }

    #[test]
    fn comparison_folds_to_zero_or_one() {
        let table = SymbolTable::new();
        let mut b = block(vec![Instr::new(
            Opcode::Lt,
            Some(t(0)),
            Some(imm(-7)),
            Some(imm(2)),
        )]);
        assert!(run(&mut b, &table));
        assert_eq!(b.instrs[0].to_string(), "ASSIGN t0, #1, -");
    }

    #[test]
    fn truncating_division_semantics() {
        assert_eq!(eval_binary(Opcode::Div, -7, 2), Some(-3));
        assert_eq!(eval_binary(Opcode::Mod, -7, 2), Some(-1));
    }

    #[test]
    fn wrapping_multiply() {
        assert_eq!(
            eval_binary(Opcode::Mul, i32::MAX, 2),
            Some(i32::MAX.wrapping_mul(2))
        );
    }

    #[test]
    fn idempotent_once_folded() {
        let table = SymbolTable::new();
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(imm(3)), Some(imm(4))),
            Instr::new(Opcode::Add, Some(t(1)), Some(t(0)), Some(imm(1))),
        ]);
        assert!(run(&mut b, &table));
        // Second run finds everything already folded.
        assert!(!run(&mut b, &table));
        assert_eq!(b.instrs[1].to_string(), "ASSIGN t1, #8, -");
    }

    #[test]
    fn load_base_is_never_substituted() {
        let table = SymbolTable::new();
        let mut b = block(vec![
            Instr::new(Opcode::Assign, Some(t(0)), Some(imm(8)), None),
            Instr::new(Opcode::Load, Some(t(1)), Some(t(0)), Some(imm(0))),
        ]);
        run(&mut b, &table);
        // t0 is a known constant, but it is a base address here.
        assert_eq!(b.instrs[1].to_string(), "LOAD t1, t0, #0");
    }

    #[test]
    fn redefinition_invalidates() {
        let table = SymbolTable::new();
        let mut b = block(vec![
            Instr::new(Opcode::Assign, Some(t(0)), Some(imm(1)), None),
            Instr::new(Opcode::GetInt, Some(t(0)), None, None),
            Instr::new(Opcode::Add, Some(t(1)), Some(t(0)), Some(imm(1))),
        ]);
        run(&mut b, &table);
        // t0 was clobbered by getint; the add must not fold.
        assert_eq!(b.instrs[2].op, Opcode::Add);
        assert_eq!(b.instrs[2].arg1, Some(t(0)));
    }
}
