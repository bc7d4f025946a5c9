//! Local common-subexpression elimination over one block.
//!
//! Expression keys are `OP_arg1_arg2` strings; for commutative
//! operations the swapped key is looked up as well. Whenever a name is
//! redefined, every entry whose result is that name or whose key
//! mentions it (full-word match: `_<name>` followed by `_` or the end)
//! is dropped. Calls, loads, `getint` and `get-addr` never enter the
//! map; a call additionally drops every entry touching a global,
//! because the callee may write it.

use std::collections::HashMap;

use super::BasicBlock;
use crate::ir::{Opcode, Operand};
use crate::symbols::SymbolTable;

struct CseEntry {
    /// The operand that first computed this expression.
    result: Operand,
    /// Operands appearing in the expression, for call invalidation.
    operands: Vec<Operand>,
}

pub(super) fn run(block: &mut BasicBlock) -> bool {
    let mut changed = false;
    let mut exprs: HashMap<String, CseEntry> = HashMap::new();

    for instr in &mut block.instrs {
        // Not purely functional: loads observe memory, get-addr depends
        // on frame layout, calls and getint have arbitrary effects.
        if matches!(
            instr.op,
            Opcode::Call | Opcode::Load | Opcode::GetInt | Opcode::GetAddr
        ) {
            if instr.op == Opcode::Call {
                exprs.retain(|_, entry| {
                    !entry.operands.iter().chain([&entry.result]).any(is_global_var)
                });
            }
            continue;
        }

        // Invalidate on redefinition.
        if let Some(defined) = instr.defined_name() {
            let pattern = format!("_{defined}");
            exprs.retain(|key, entry| {
                entry.result.value_name() != Some(defined.clone())
                    && !key_mentions(key, &pattern)
            });
        }

        if !instr.op.defines_result() {
            continue;
        }
        let (Some(result), Some(arg1), Some(arg2)) = (&instr.result, &instr.arg1, &instr.arg2)
        else {
            continue;
        };

        let key = format!("{}_{}_{}", instr.op.name(), arg1, arg2);
        let key = if instr.op.is_commutative() {
            let swapped = format!("{}_{}_{}", instr.op.name(), arg2, arg1);
            if exprs.contains_key(&swapped) {
                swapped
            } else {
                key
            }
        } else {
            key
        };

        if let Some(entry) = exprs.get(&key) {
            // Recomputation of a live expression: reuse the old result.
            let prev = entry.result.clone();
            instr.op = Opcode::Assign;
            instr.arg1 = Some(prev);
            instr.arg2 = None;
            changed = true;
        } else if instr.op != Opcode::Assign {
            exprs.insert(
                key,
                CseEntry {
                    result: result.clone(),
                    operands: vec![arg1.clone(), arg2.clone()],
                },
            );
        }
    }

    changed
}

fn is_global_var(op: &Operand) -> bool {
    matches!(op, Operand::Var { symbol, .. } if symbol.scope == SymbolTable::GLOBAL_SCOPE)
}

/// Full-word scan: a hit for `_x` in `ADD_x_y` must not also fire for
/// `ADD_x1_y`.
fn key_mentions(key: &str, pattern: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = key[start..].find(pattern) {
        let end = start + pos + pattern.len();
        if end == key.len() || key.as_bytes()[end] == b'_' {
            return true;
        }
        start = start + pos + 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrayvec::ArrayVec;

    use crate::ir::Instr;
    use crate::symbols::SymbolId;

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

    fn global(name: &str) -> Operand {
        Operand::Var {
            name: name.into(),
            symbol: SymbolId { scope: 1, index: 0 },
        }
    }

    fn local(name: &str) -> Operand {
        Operand::Var {
            name: name.into(),
            symbol: SymbolId { scope: 2, index: 0 },
        }
    }

    #[test]
    fn repeated_expression_becomes_assign() {
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(local("a_2")), Some(local("b_2"))),
            Instr::new(Opcode::Add, Some(t(1)), Some(local("a_2")), Some(local("b_2"))),
        ]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[1].to_string(), "ASSIGN t1, t0, -");
    }

    #[test]
    fn commutative_lookup_matches_swapped_operands() {
        let mut b = block(vec![
            Instr::new(Opcode::Mul, Some(t(0)), Some(local("a_2")), Some(local("b_2"))),
            Instr::new(Opcode::Mul, Some(t(1)), Some(local("b_2")), Some(local("a_2"))),
        ]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[1].to_string(), "ASSIGN t1, t0, -");
    }

    #[test]
    fn operand_redefinition_kills_the_expression() {
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(local("a_2")), Some(local("b_2"))),
            Instr::new(Opcode::Assign, Some(local("a_2")), Some(Operand::Imm(9)), None),
            Instr::new(Opcode::Add, Some(t(1)), Some(local("a_2")), Some(local("b_2"))),
        ]);
        assert!(!run(&mut b));
        assert_eq!(b.instrs[2].op, Opcode::Add);
    }

    #[test]
    fn full_word_matching_spares_longer_names() {
        // Redefining t1 must not kill an expression over t11.
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(t(11)), Some(t(12))),
            Instr::new(Opcode::Assign, Some(t(1)), Some(Operand::Imm(0)), None),
            Instr::new(Opcode::Add, Some(t(2)), Some(t(11)), Some(t(12))),
        ]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[2].to_string(), "ASSIGN t2, t0, -");
    }

    #[test]
    fn call_invalidates_global_expressions_only() {
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(global("g")), Some(t(9))),
            Instr::new(Opcode::Add, Some(t(1)), Some(local("x_2")), Some(t(9))),
            Instr::new(
                Opcode::Call,
                Some(t(2)),
                Some(Operand::Label("f".into())),
                None,
            ),
            Instr::new(Opcode::Add, Some(t(3)), Some(global("g")), Some(t(9))),
            Instr::new(Opcode::Add, Some(t(4)), Some(local("x_2")), Some(t(9))),
        ]);
        assert!(run(&mut b));
        // The global-based sum is recomputed, the local one is reused.
        assert_eq!(b.instrs[3].op, Opcode::Add);
        assert_eq!(b.instrs[4].to_string(), "ASSIGN t4, t1, -");
    }
}
