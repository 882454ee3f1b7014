//! Peephole optimizer over one function's instruction list.
//!
//! Every pass is local and idempotent; [`optimize`] repeats them until a round
//! rewrites nothing.

use tracing::debug;

use crate::op::BinOp;
use crate::util::{FastHashMap, FastHashSet};
use crate::vm::{Constant, Instr, Label, Op};

const MAX_ROUNDS: usize = 32;

#[derive(Debug, Default)]
struct Stats {
    folded: usize,
    fused: usize,
    inverted: usize,
    threaded: usize,
    jumps: usize,
    unreachable: usize,
    labels: usize,
}

impl Stats {
    fn total(&self) -> usize {
        self.folded + self.fused + self.inverted + self.threaded + self.jumps + self.unreachable + self.labels
    }
}

/// Optimize `code` in place and return the number of rewrites applied.
pub fn optimize(code: &mut Vec<Instr>) -> usize {
    let mut stats = Stats::default();
    let mut rounds = 0;
    while rounds < MAX_ROUNDS {
        rounds += 1;
        let before = stats.total();
        fold(code, &mut stats);
        invert_branches(code, &mut stats);
        thread_jumps(code, &mut stats);
        drop_trivial_jumps(code, &mut stats);
        drop_unreachable(code, &mut stats);
        drop_unused_labels(code, &mut stats);
        if stats.total() == before {
            break;
        }
    }
    debug!(
        target: "kiln::opt",
        rounds,
        folded = stats.folded,
        fused = stats.fused,
        inverted = stats.inverted,
        threaded = stats.threaded,
        jumps = stats.jumps,
        unreachable = stats.unreachable,
        labels = stats.labels,
        "optimized"
    );
    stats.total()
}

/// Constant folding, immediate operands and compare fusion, applied at the tail
/// of the rebuilt list so chains like `1 + 2 * 3` collapse in one sweep.
fn fold(code: &mut Vec<Instr>, stats: &mut Stats) {
    let mut out = Vec::with_capacity(code.len());
    for instr in code.drain(..) {
        push_folded(&mut out, instr, stats);
    }
    *code = out;
}

fn tail_const(out: &[Instr], back: usize) -> Option<&Constant> {
    let idx = out.len().checked_sub(back)?;
    match &out[idx].op {
        Op::Const(c) => Some(c),
        _ => None,
    }
}

fn push_folded(out: &mut Vec<Instr>, instr: Instr, stats: &mut Stats) {
    let line = instr.line;
    match instr.op {
        Op::Binary(op, None) if op.is_foldable() => {
            if let (Some(l), Some(r)) = (tail_const(out, 2), tail_const(out, 1)) {
                if let Some(c) = op.eval(&l.to_value(), &r.to_value()).ok().as_ref().and_then(Constant::from_value) {
                    out.truncate(out.len() - 2);
                    stats.folded += 1;
                    return push_folded(out, Instr::new(Op::Const(c), line), stats);
                }
                out.push(Instr::new(Op::Binary(op, None), line));
                return;
            }
            push_immediate(out, op, line, stats);
        }
        Op::Binary(op, None) => push_immediate(out, op, line, stats),
        Op::Binary(op, Some(imm)) if op.is_foldable() => {
            if let Some(l) = tail_const(out, 1) {
                if let Some(c) = op.eval(&l.to_value(), &imm.to_value()).ok().as_ref().and_then(Constant::from_value) {
                    out.pop();
                    stats.folded += 1;
                    return push_folded(out, Instr::new(Op::Const(c), line), stats);
                }
            }
            out.push(Instr::new(Op::Binary(op, Some(imm)), line));
        }
        Op::Unary(op) => {
            if let Some(v) = tail_const(out, 1) {
                if let Some(c) = op.eval(&v.to_value()).ok().as_ref().and_then(Constant::from_value) {
                    out.pop();
                    stats.folded += 1;
                    return push_folded(out, Instr::new(Op::Const(c), line), stats);
                }
            }
            out.push(Instr::new(Op::Unary(op), line));
        }
        Op::JumpIf { when, target } => {
            if let Some(c) = tail_const(out, 1) {
                let taken = c.to_value().truthy() == when;
                out.pop();
                stats.folded += 1;
                if taken {
                    out.push(Instr::new(Op::Jump(target), line));
                }
                return;
            }
            let fusable = match out.last() {
                Some(Instr {
                    op: Op::Binary(op, _), ..
                }) => op.is_comparison(),
                _ => false,
            };
            if fusable {
                if let Some(Instr {
                    op: Op::Binary(op, imm),
                    ..
                }) = out.pop()
                {
                    stats.fused += 1;
                    return push_folded(
                        out,
                        Instr::new(
                            Op::CompareJump {
                                op,
                                imm,
                                when,
                                target,
                            },
                            line,
                        ),
                        stats,
                    );
                }
            }
            out.push(Instr::new(Op::JumpIf { when, target }, line));
        }
        Op::JumpOrPop { when, target } => {
            if let Some(c) = tail_const(out, 1) {
                stats.folded += 1;
                if c.to_value().truthy() == when {
                    out.push(Instr::new(Op::Jump(target), line));
                } else {
                    out.pop();
                }
                return;
            }
            out.push(Instr::new(Op::JumpOrPop { when, target }, line));
        }
        Op::CompareJump {
            op,
            imm,
            when,
            target,
        } => {
            let operands = match &imm {
                Some(r) => tail_const(out, 1).map(|l| (1, l.to_value(), r.to_value())),
                None => match (tail_const(out, 2), tail_const(out, 1)) {
                    (Some(l), Some(r)) => Some((2, l.to_value(), r.to_value())),
                    _ => None,
                },
            };
            if let Some((consumed, l, r)) = operands {
                if let Ok(result) = op.test(&l, &r) {
                    out.truncate(out.len() - consumed);
                    stats.folded += 1;
                    if result == when {
                        out.push(Instr::new(Op::Jump(target), line));
                    }
                    return;
                }
            }
            out.push(Instr::new(
                Op::CompareJump {
                    op,
                    imm,
                    when,
                    target,
                },
                line,
            ));
        }
        op => out.push(Instr::new(op, line)),
    }
}

/// `x; const c; binary op` becomes `x; binary op c` when `x` is not a constant.
fn push_immediate(out: &mut Vec<Instr>, op: BinOp, line: u32, stats: &mut Stats) {
    if tail_const(out, 1).is_some() && tail_const(out, 2).is_none() {
        if let Some(Instr { op: Op::Const(c), .. }) = out.pop() {
            stats.fused += 1;
            out.push(Instr::new(Op::Binary(op, Some(c)), line));
            return;
        }
    }
    out.push(Instr::new(Op::Binary(op, None), line));
}

fn inverted(op: &Op, target: Label) -> Option<Op> {
    match op {
        Op::JumpIf { when, .. } => Some(Op::JumpIf { when: !when, target }),
        Op::CompareJump { op, imm, when, .. } => Some(Op::CompareJump {
            op: *op,
            imm: imm.clone(),
            when: !when,
            target,
        }),
        _ => None,
    }
}

/// `jump_if L1; jump L2; L1:` becomes `jump_if_not L2; L1:`.
fn invert_branches(code: &mut Vec<Instr>, stats: &mut Stats) {
    let mut i = 0;
    while i + 2 < code.len() {
        let rewrite = match (&code[i].op, &code[i + 1].op, &code[i + 2].op) {
            (cond, Op::Jump(l2), Op::Label(l1)) if cond.branch_target() == Some(*l1) => inverted(cond, *l2),
            _ => None,
        };
        if let Some(op) = rewrite {
            code[i].op = op;
            code.remove(i + 1);
            stats.inverted += 1;
        }
        i += 1;
    }
}

fn label_positions(code: &[Instr]) -> FastHashMap<Label, usize> {
    code.iter()
        .enumerate()
        .filter_map(|(pc, instr)| match instr.op {
            Op::Label(l) => Some((l, pc)),
            _ => None,
        })
        .collect()
}

fn threadable(op: &Op) -> bool {
    matches!(
        op,
        Op::Jump(_) | Op::JumpIf { .. } | Op::JumpOrPop { .. } | Op::CompareJump { .. }
    )
}

/// Retarget jumps whose label is followed by an unconditional jump.
fn thread_jumps(code: &mut [Instr], stats: &mut Stats) {
    let labels = label_positions(code);
    let final_target = |start: Label| -> Label {
        let mut seen = FastHashSet::default();
        let mut label = start;
        while seen.insert(label) {
            let Some(&pc) = labels.get(&label) else { break };
            let next = code[pc..].iter().find(|instr| !matches!(instr.op, Op::Label(_)));
            match next.map(|instr| &instr.op) {
                Some(Op::Jump(next)) => label = *next,
                _ => break,
            }
        }
        label
    };
    let retargets: Vec<(usize, Label)> = code
        .iter()
        .enumerate()
        .filter(|(_, instr)| threadable(&instr.op))
        .filter_map(|(pc, instr)| {
            let current = instr.op.branch_target()?;
            let target = final_target(current);
            (target != current).then_some((pc, target))
        })
        .collect();
    for (pc, target) in retargets {
        if let Some(label) = code[pc].op.branch_target_mut() {
            *label = target;
            stats.threaded += 1;
        }
    }
}

fn targets_following_label(code: &[Instr], pc: usize, target: Label) -> bool {
    code[pc + 1..]
        .iter()
        .take_while(|instr| matches!(instr.op, Op::Label(_)))
        .any(|instr| instr.op == Op::Label(target))
}

/// A jump to the labels right after it is a no-op; a conditional one still pops.
fn drop_trivial_jumps(code: &mut Vec<Instr>, stats: &mut Stats) {
    let mut pc = 0;
    while pc < code.len() {
        match code[pc].op {
            Op::Jump(target) if targets_following_label(code, pc, target) => {
                code.remove(pc);
                stats.jumps += 1;
                continue;
            }
            Op::JumpIf { target, .. } if targets_following_label(code, pc, target) => {
                code[pc].op = Op::Pop(1);
                stats.jumps += 1;
            }
            _ => {}
        }
        pc += 1;
    }
}

fn drop_unreachable(code: &mut Vec<Instr>, stats: &mut Stats) {
    let mut out = Vec::with_capacity(code.len());
    let mut dead = false;
    for instr in code.drain(..) {
        if matches!(instr.op, Op::Label(_)) {
            dead = false;
        }
        if dead {
            stats.unreachable += 1;
            continue;
        }
        dead = instr.op.is_terminator();
        out.push(instr);
    }
    *code = out;
}

fn drop_unused_labels(code: &mut Vec<Instr>, stats: &mut Stats) {
    let used: FastHashSet<Label> = code.iter().filter_map(|instr| instr.op.branch_target()).collect();
    let before = code.len();
    code.retain(|instr| match instr.op {
        Op::Label(l) => used.contains(&l),
        _ => true,
    });
    stats.labels += before - code.len();
}
