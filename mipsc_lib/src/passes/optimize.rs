//! The IR optimizer: intra-block constant folding, algebraic
//! simplification, local CSE and copy propagation, plus a
//! function-level dead-code pass, iterated to a fixed point.
//!
//! The linear IR is split into functions, each function into basic
//! blocks with label-resolved CFG edges, optimized, and flattened back
//! into a single instruction stream. Instructions outside any function
//! (global defines) are preserved verbatim.

mod algebraic;
mod copy_prop;
mod cse;
mod dce;
mod fold;

use arrayvec::ArrayVec;
use generational_arena::{Arena, Index};
use log::debug;

use crate::ir::{Instr, IrModule, Opcode};
use crate::symbols::SymbolTable;

pub(crate) type BlockId = Index;

/// A maximal straight-line instruction sequence. A terminator has at
/// most two successors (branch target + fall-through).
pub(crate) struct BasicBlock {
    pub instrs: Vec<Instr>,
    pub preds: Vec<BlockId>,
    pub succs: ArrayVec<BlockId, 2>,
}

pub(crate) struct Function {
    pub name: String,
    pub blocks: Arena<BasicBlock>,
    /// Textual order, which fall-through edges and flattening rely on.
    pub order: Vec<BlockId>,
}

/// Bounds the fixed-point iteration; any finite program converges well
/// before this.
const MAX_ROUNDS: u32 = 10;

pub fn optimize(module: IrModule, table: &SymbolTable) -> IrModule {
    let IrModule {
        instrs,
        string_constants,
        frames,
    } = module;

    let (global_defines, raw_functions) = split_functions(instrs);

    let mut functions = Vec::with_capacity(raw_functions.len());
    for (name, instrs) in raw_functions {
        let mut func = build_cfg(name, instrs);
        build_cfg_edges(&mut func);
        run_to_fixed_point(&mut func, table);
        functions.push(func);
    }

    let mut instrs = global_defines;
    for func in &functions {
        flatten_into(func, &mut instrs);
    }

    IrModule {
        instrs,
        string_constants,
        frames,
    }
}

fn run_to_fixed_point(func: &mut Function, table: &SymbolTable) {
    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut changed = false;
        // Order matters inside a round: fold constants first, then
        // simplify, then CSE, then propagate copies.
        for &block_id in &func.order {
            let block = &mut func.blocks[block_id];
            changed |= fold::run(block, table);
            changed |= algebraic::run(block);
            changed |= cse::run(block);
            changed |= copy_prop::run(block);
        }
        changed |= dce::run(func);
        if !changed || rounds >= MAX_ROUNDS {
            debug!("optimizer: `{}` converged after {rounds} round(s)", func.name);
            break;
        }
    }
}

/// Splits the linear IR at function boundaries. A function begins at a
/// label named `main` or a label whose immediate successor is
/// `func-entry`; everything before the first such marker is a global
/// define.
fn split_functions(instrs: Vec<Instr>) -> (Vec<Instr>, Vec<(String, Vec<Instr>)>) {
    let mut global_defines = Vec::new();
    let mut functions: Vec<(String, Vec<Instr>)> = Vec::new();

    for (i, instr) in instrs.iter().enumerate() {
        let function_start = instr.op == Opcode::Label
            && instr
                .result
                .as_ref()
                .and_then(|op| op.label_name())
                .map(|name| {
                    name == "main"
                        || instrs
                            .get(i + 1)
                            .is_some_and(|next| next.op == Opcode::FuncEntry)
                })
                .unwrap_or(false);

        if function_start {
            let name = instr
                .result
                .as_ref()
                .and_then(|op| op.label_name())
                .unwrap()
                .to_owned();
            functions.push((name, vec![instr.clone()]));
        } else if let Some((_, body)) = functions.last_mut() {
            body.push(instr.clone());
        } else {
            global_defines.push(instr.clone());
        }
    }

    (global_defines, functions)
}

/// Partitions a function's instructions into leader-based basic
/// blocks: leaders are the first instruction, labels, `func-entry`,
/// and anything following a jump, branch or `ret`.
fn build_cfg(name: String, instrs: Vec<Instr>) -> Function {
    let mut blocks = Arena::new();
    let mut order = Vec::new();
    let mut current: Vec<Instr> = Vec::new();

    let flush = |blocks: &mut Arena<BasicBlock>, order: &mut Vec<BlockId>, instrs: &mut Vec<Instr>| {
        if !instrs.is_empty() {
            let id = blocks.insert(BasicBlock {
                instrs: std::mem::take(instrs),
                preds: Vec::new(),
                succs: ArrayVec::new(),
            });
            order.push(id);
        }
    };

    for instr in instrs {
        let leader = matches!(instr.op, Opcode::Label | Opcode::FuncEntry)
            || current
                .last()
                .is_some_and(|last| matches!(last.op, Opcode::Jump | Opcode::Beqz | Opcode::Ret));
        if leader {
            flush(&mut blocks, &mut order, &mut current);
        }
        current.push(instr);
    }
    flush(&mut blocks, &mut order, &mut current);

    Function {
        name,
        blocks,
        order,
    }
}

fn add_edge(blocks: &mut Arena<BasicBlock>, from: BlockId, to: BlockId) {
    if blocks[from].succs.contains(&to) {
        return;
    }
    blocks[from].succs.push(to);
    blocks[to].preds.push(from);
}

/// Resolves label names to blocks and connects terminators: `jump`
/// goes only to its target, `beqz` to its target plus the textual
/// fall-through, `ret` nowhere, anything else falls through.
fn build_cfg_edges(func: &mut Function) {
    let mut label_to_block = std::collections::HashMap::new();
    for &id in &func.order {
        for instr in &func.blocks[id].instrs {
            if instr.op == Opcode::Label {
                if let Some(name) = instr.result.as_ref().and_then(|op| op.label_name()) {
                    label_to_block.insert(name.to_owned(), id);
                }
            }
        }
    }

    for (i, &id) in func.order.iter().enumerate() {
        let next = func.order.get(i + 1).copied();
        let Some(last) = func.blocks[id].instrs.last() else {
            if let Some(next) = next {
                add_edge(&mut func.blocks, id, next);
            }
            continue;
        };
        match last.op {
            Opcode::Jump => {
                let target = last
                    .result
                    .as_ref()
                    .and_then(|op| op.label_name())
                    .and_then(|name| label_to_block.get(name).copied());
                if let Some(target) = target {
                    add_edge(&mut func.blocks, id, target);
                }
            }
            Opcode::Beqz => {
                let target = last
                    .arg1
                    .as_ref()
                    .and_then(|op| op.label_name())
                    .and_then(|name| label_to_block.get(name).copied());
                if let Some(target) = target {
                    add_edge(&mut func.blocks, id, target);
                }
                if let Some(next) = next {
                    add_edge(&mut func.blocks, id, next);
                }
            }
            Opcode::Ret => {}
            _ => {
                if let Some(next) = next {
                    add_edge(&mut func.blocks, id, next);
                }
            }
        }
    }
}

fn flatten_into(func: &Function, out: &mut Vec<Instr>) {
    for &id in &func.order {
        out.extend(func.blocks[id].instrs.iter().cloned());
    }
}
