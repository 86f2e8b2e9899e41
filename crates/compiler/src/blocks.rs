//! Basic blocks, flow graph, and next-use information
//!
//! Runs once over the final IR, one control-flow graph per function
//! (delimited by `FUNC_BEGIN`/`FUNC_END`).
//!
//! Leaders: the instruction after `FUNC_BEGIN`, every `LABEL`, and every
//! instruction immediately following a jump. Blocks run leader to next
//! leader. Edges: fall-through when the block does not end in an
//! unconditional terminator, plus one edge to the target block of any jump.
//!
//! Next-use is the classic backward scan: walking a block from its last
//! instruction up, each instruction first snapshots the current table (the
//! state that holds before its own effect, reading backward), then kills
//! its result and revives its operands with the instruction's index as the
//! next use. The IR is never mutated; constants and empty slots are
//! filtered by the same predicate the generator uses.

use crate::ir::{IrOp, IrProgram, Quadruple, is_constant};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One basic block, indices into the IR sequence, inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    pub id: usize,
    pub start: usize,
    pub end: usize,
    pub successors: Vec<usize>,
    pub predecessors: Vec<usize>,
}

/// Liveness of one variable at one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextUse {
    pub is_live: bool,
    /// Index of the next instruction reading the variable, if any.
    pub next_use: Option<usize>,
}

/// Analysis result: blocks (numbered across the whole IR) and a per-index
/// next-use table. Ordered maps keep the rendering deterministic.
#[derive(Debug, Default)]
pub struct FlowAnalysis {
    pub blocks: Vec<BasicBlock>,
    pub next_use: Vec<BTreeMap<String, NextUse>>,
}

impl FlowAnalysis {
    /// The block containing instruction `index`, if any.
    pub fn block_of(&self, index: usize) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| b.start <= index && index <= b.end)
    }

    /// Next-use info for `var` at `index`.
    pub fn lookup(&self, index: usize, var: &str) -> Option<NextUse> {
        self.next_use.get(index)?.get(var).copied()
    }

    /// Human-readable block and next-use report.
    pub fn render(&self, ir: &IrProgram) -> String {
        let mut out = String::new();
        out.push_str("========================================\n");
        out.push_str("BASIC BLOCK ANALYSIS RESULTS\n");
        out.push_str("========================================\n\n");
        for block in &self.blocks {
            let _ = writeln!(out, "Block B{}: [{}-{}]", block.id, block.start, block.end);
            out.push_str("  Instructions:\n");
            for i in block.start..=block.end {
                let quad = &ir.quads[i];
                let _ = writeln!(
                    out,
                    "    [{}] {} {} {} {}",
                    i,
                    quad.op.mnemonic(),
                    quad.arg1,
                    quad.arg2,
                    quad.result
                );
            }
            if !block.successors.is_empty() {
                let succs: Vec<String> =
                    block.successors.iter().map(|s| format!("B{}", s)).collect();
                let _ = writeln!(out, "  Successors: {}", succs.join(" "));
            }
            if !block.predecessors.is_empty() {
                let preds: Vec<String> =
                    block.predecessors.iter().map(|p| format!("B{}", p)).collect();
                let _ = writeln!(out, "  Predecessors: {}", preds.join(" "));
            }
            out.push('\n');
        }

        out.push_str("========================================\n");
        out.push_str("NEXT-USE INFORMATION\n");
        out.push_str("========================================\n\n");
        for (i, table) in self.next_use.iter().enumerate() {
            if table.is_empty() {
                continue;
            }
            let quad = &ir.quads[i];
            let _ = writeln!(
                out,
                "[{}] {} {} {} {}",
                i,
                quad.op.mnemonic(),
                quad.arg1,
                quad.arg2,
                quad.result
            );
            out.push_str("  Next-use info:\n");
            for (var, info) in table {
                let status = if info.is_live { "live" } else { "dead" };
                let next = info
                    .next_use
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-1".to_string());
                let _ = writeln!(out, "    {}: {}, next-use={}", var, status, next);
            }
        }
        out
    }
}

/// Operands of a quadruple that name data. Label-valued slots (jump
/// targets, label definitions, direct-call callees, function markers) name
/// code positions and are excluded.
fn used_operands(quad: &Quadruple) -> Vec<&str> {
    let mut used = Vec::new();
    match quad.op {
        IrOp::Label | IrOp::FuncBegin | IrOp::FuncEnd | IrOp::Goto => {}
        IrOp::IfTrueGoto | IrOp::IfFalseGoto | IrOp::IfTrueGotoFloat | IrOp::IfFalseGotoFloat => {
            used.push(quad.arg1.as_str());
        }
        IrOp::Call => {
            // arg1 is the callee name, arg2 the argument count literal.
        }
        IrOp::IndirectCall => {
            // The callee is a function-pointer variable: a real use.
            used.push(quad.arg1.as_str());
        }
        _ => {
            used.push(quad.arg1.as_str());
            used.push(quad.arg2.as_str());
        }
    }
    used.retain(|s| !s.is_empty() && !is_constant(s));
    used
}

/// The variable defined by a quadruple, per the result-slot rule.
fn defined_operand(quad: &Quadruple) -> Option<&str> {
    if matches!(quad.op, IrOp::Label | IrOp::FuncBegin | IrOp::FuncEnd) {
        return None;
    }
    let result = quad.result.as_str();
    if result.is_empty() || is_constant(result) {
        return None;
    }
    Some(result)
}

/// Partition the IR into per-function basic blocks, build the flow graph
/// and compute next-use information.
pub fn analyze(ir: &IrProgram) -> FlowAnalysis {
    let mut analysis = FlowAnalysis {
        blocks: Vec::new(),
        next_use: vec![BTreeMap::new(); ir.quads.len()],
    };

    let mut i = 0;
    while i < ir.quads.len() {
        if ir.quads[i].op != IrOp::FuncBegin {
            i += 1;
            continue;
        }
        let func_start = i;
        let mut func_end = i;
        while func_end < ir.quads.len() && ir.quads[func_end].op != IrOp::FuncEnd {
            func_end += 1;
        }
        if func_end >= ir.quads.len() {
            func_end = ir.quads.len() - 1;
        }

        let first_block = analysis.blocks.len();
        build_blocks(ir, func_start, func_end, &mut analysis.blocks);
        let block_count = analysis.blocks.len() - first_block;
        build_flow_graph(ir, &mut analysis.blocks, first_block, block_count);
        for b in first_block..first_block + block_count {
            compute_next_use(ir, &analysis.blocks[b], &mut analysis.next_use);
        }

        i = func_end + 1;
    }
    analysis
}

/// Leader finding over one function's instruction range.
fn find_leaders(ir: &IrProgram, start: usize, end: usize) -> Vec<bool> {
    let mut leaders = vec![false; end - start + 1];
    // Rule 1: the first instruction after FUNC_BEGIN.
    if start < end {
        leaders[1] = true;
    }
    for i in start..=end {
        let quad = &ir.quads[i];
        // Rule 2: every label.
        if quad.op == IrOp::Label {
            leaders[i - start] = true;
        }
        // Rule 3: the instruction after any jump.
        if quad.op.is_jump() && i + 1 <= end {
            leaders[i + 1 - start] = true;
        }
    }
    leaders
}

fn build_blocks(ir: &IrProgram, start: usize, end: usize, blocks: &mut Vec<BasicBlock>) {
    let leaders = find_leaders(ir, start, end);
    let mut block_start: Option<usize> = None;
    for i in start..=end {
        if leaders[i - start] {
            if let Some(s) = block_start {
                blocks.push(BasicBlock {
                    id: blocks.len(),
                    start: s,
                    end: i - 1,
                    successors: Vec::new(),
                    predecessors: Vec::new(),
                });
            }
            block_start = Some(i);
        }
    }
    if let Some(s) = block_start {
        blocks.push(BasicBlock {
            id: blocks.len(),
            start: s,
            end,
            successors: Vec::new(),
            predecessors: Vec::new(),
        });
    }
}

/// Index (within the function's blocks) of the block whose range contains a
/// `LABEL name`.
fn find_block_by_label(
    ir: &IrProgram,
    blocks: &[BasicBlock],
    first: usize,
    count: usize,
    label: &str,
) -> Option<usize> {
    blocks[first..first + count].iter().find_map(|block| {
        (block.start..=block.end)
            .any(|i| ir.quads[i].op == IrOp::Label && ir.quads[i].arg1 == label)
            .then_some(block.id)
    })
}

fn build_flow_graph(ir: &IrProgram, blocks: &mut Vec<BasicBlock>, first: usize, count: usize) {
    for b in first..first + count {
        let last = &ir.quads[blocks[b].end];

        // Fall-through edge unless control cannot reach past the block.
        if !last.op.is_unconditional_terminator() && b + 1 < first + count {
            blocks[b].successors.push(b + 1);
            blocks[b + 1].predecessors.push(b);
        }

        // Jump edge to the block holding the target label.
        if let Some(target) = last.jump_target() {
            if let Some(target_block) = find_block_by_label(ir, blocks, first, count, target) {
                blocks[b].successors.push(target_block);
                blocks[target_block].predecessors.push(b);
            }
        }
    }
}

/// Backward next-use scan over one block.
fn compute_next_use(ir: &IrProgram, block: &BasicBlock, table: &mut [BTreeMap<String, NextUse>]) {
    let mut current: BTreeMap<String, NextUse> = BTreeMap::new();

    for i in (block.start..=block.end).rev() {
        let quad = &ir.quads[i];

        // Snapshot first: the state before this instruction's effect.
        table[i] = current.clone();

        if matches!(quad.op, IrOp::Label | IrOp::FuncBegin | IrOp::FuncEnd) {
            continue;
        }

        if let Some(defined) = defined_operand(quad) {
            current.insert(
                defined.to_string(),
                NextUse {
                    is_live: false,
                    next_use: None,
                },
            );
        }
        for used in used_operands(quad) {
            current.insert(
                used.to_string(),
                NextUse {
                    is_live: true,
                    next_use: Some(i),
                },
            );
        }
    }
}
