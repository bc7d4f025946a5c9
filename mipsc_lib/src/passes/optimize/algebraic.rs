//! Algebraic simplification and strength reduction over one block.
//!
//! Commutative operations are first canonicalized so the immediate sits
//! in `arg2`. A multiply by a power of two becomes a logical left
//! shift. Division by a power of two is deliberately *not* turned into
//! an arithmetic right shift: `sra` rounds toward negative infinity
//! while the source language divides toward zero.

use super::BasicBlock;
use crate::ir::{Opcode, Operand};

pub(super) fn run(block: &mut BasicBlock) -> bool {
    let mut changed = false;

    for instr in &mut block.instrs {
        let (Some(_), Some(_)) = (&instr.arg1, &instr.arg2) else {
            continue;
        };

        if instr.op.is_commutative()
            && instr.arg1.as_ref().is_some_and(Operand::is_imm)
            && !instr.arg2.as_ref().is_some_and(Operand::is_imm)
        {
            std::mem::swap(&mut instr.arg1, &mut instr.arg2);
            changed = true;
        }

        let Some(value) = instr.arg2.as_ref().and_then(Operand::imm_value) else {
            continue;
        };

        match instr.op {
            Opcode::Mul => {
                if value == 0 {
                    instr.op = Opcode::Assign;
                    instr.arg1 = Some(Operand::Imm(0));
                    instr.arg2 = None;
                    changed = true;
                } else if value == 1 {
                    instr.op = Opcode::Assign;
                    instr.arg2 = None;
                    changed = true;
                } else if let Some(shift) = power_of_two(value) {
                    instr.op = Opcode::Sll;
                    instr.arg2 = Some(Operand::Imm(shift));
                    changed = true;
                }
            }
            Opcode::Div => {
                // Only the identity is safe (and dividing by zero is
                // left for the hardware to decide).
                if value == 1 {
                    instr.op = Opcode::Assign;
                    instr.arg2 = None;
                    changed = true;
                }
            }
            Opcode::Add | Opcode::Sub => {
                if value == 0 {
                    instr.op = Opcode::Assign;
                    instr.arg2 = None;
                    changed = true;
                }
            }
            _ => {}
        }
    }

    changed
}

fn power_of_two(n: i32) -> Option<i32> {
    (n > 0 && n & (n - 1) == 0).then(|| n.trailing_zeros() as i32)
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
    fn multiply_by_eight_becomes_shift() {
        let mut b = block(vec![Instr::new(
            Opcode::Mul,
            Some(t(0)),
            Some(t(1)),
            Some(imm(8)),
        )]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[0].to_string(), "SLL t0, t1, #3");
    }

    #[test]
    fn commutative_immediate_moves_right_first() {
        let mut b = block(vec![Instr::new(
            Opcode::Mul,
            Some(t(0)),
            Some(imm(4)),
            Some(t(1)),
        )]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[0].to_string(), "SLL t0, t1, #2");
    }

    #[test]
    fn multiply_by_zero_and_one() {
        let mut b = block(vec![
            Instr::new(Opcode::Mul, Some(t(0)), Some(t(1)), Some(imm(0))),
            Instr::new(Opcode::Mul, Some(t(2)), Some(t(1)), Some(imm(1))),
        ]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[0].to_string(), "ASSIGN t0, #0, -");
        assert_eq!(b.instrs[1].to_string(), "ASSIGN t2, t1, -");
    }

    #[test]
    fn division_by_power_of_two_is_untouched() {
        let mut b = block(vec![Instr::new(
            Opcode::Div,
            Some(t(0)),
            Some(t(1)),
            Some(imm(4)),
        )]);
        assert!(!run(&mut b));
        assert_eq!(b.instrs[0].op, Opcode::Div);
    }

    #[test]
    fn add_and_sub_zero_collapse() {
        let mut b = block(vec![
            Instr::new(Opcode::Add, Some(t(0)), Some(t(1)), Some(imm(0))),
            Instr::new(Opcode::Sub, Some(t(2)), Some(t(1)), Some(imm(0))),
        ]);
        assert!(run(&mut b));
        assert_eq!(b.instrs[0].to_string(), "ASSIGN t0, t1, -");
        assert_eq!(b.instrs[1].to_string(), "ASSIGN t2, t1, -");
    }

    #[test]
    fn subtraction_is_not_commuted() {
        let mut b = block(vec![Instr::new(
            Opcode::Sub,
            Some(t(0)),
            Some(imm(0)),
            Some(t(1)),
        )]);
        // 0 - x is not x; nothing to do here.
        assert!(!run(&mut b));
        assert_eq!(b.instrs[0].to_string(), "SUB t0, #0, t1");
    }
}
