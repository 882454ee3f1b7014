//! Forward data-flow check of a finalized instruction list.
//!
//! Computes the deepest operand stack a function needs and rejects code where a
//! value-returning function can fall off its end.

use tracing::trace;

use crate::util::FastHashMap;
use crate::vm::{Instr, Label, Op};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct VerifyError {
    pub message: String,
    pub line: u32,
}

impl VerifyError {
    fn internal(message: impl std::fmt::Display, line: u32) -> Self {
        Self {
            message: format!("internal error: {message}"),
            line,
        }
    }
}

/// Net stack movement of one instruction at depth `d`.
struct Effect {
    needs: u32,
    fall: Option<u32>,
    branch: Option<(Label, u32)>,
}

/// Verify `code` and return its maximum operand-stack depth.
pub fn verify(code: &[Instr], returns_value: bool, locals: u16, end_line: u32) -> Result<u16, VerifyError> {
    let labels: FastHashMap<Label, usize> = code
        .iter()
        .enumerate()
        .filter_map(|(pc, instr)| match instr.op {
            Op::Label(l) => Some((l, pc)),
            _ => None,
        })
        .collect();

    let mut depths: Vec<Option<u32>> = vec![None; code.len()];
    let mut worklist = vec![(0usize, 0u32)];
    let mut max_depth = 0u32;

    while let Some((pc, depth)) = worklist.pop() {
        let Some(instr) = code.get(pc) else {
            return Err(if returns_value {
                VerifyError {
                    message: "missing return on some path".to_string(),
                    line: end_line,
                }
            } else {
                VerifyError::internal("control falls off the end of a sub", end_line)
            });
        };
        match depths[pc] {
            Some(seen) if seen == depth => continue,
            Some(seen) => {
                return Err(VerifyError::internal(
                    format!("stack depth mismatch at pc {pc}: {seen} vs {depth}"),
                    instr.line,
                ));
            }
            None => depths[pc] = Some(depth),
        }

        check_slots(&instr.op, locals, instr.line)?;
        let effect = effect(&instr.op, depth, returns_value, instr.line)?;
        if depth < effect.needs {
            return Err(VerifyError::internal(format!("stack underflow at `{}`", instr.op), instr.line));
        }
        if let Some(next) = effect.fall {
            max_depth = max_depth.max(next);
            worklist.push((pc + 1, next));
        }
        if let Some((label, at)) = effect.branch {
            let Some(&target) = labels.get(&label) else {
                return Err(VerifyError::internal(format!("undefined label {label}"), instr.line));
            };
            max_depth = max_depth.max(at);
            worklist.push((target, at));
        }
    }

    let reached = depths.iter().filter(|d| d.is_some()).count();
    trace!(target: "kiln::verify", instrs = code.len(), reached, max_depth, "verified");
    u16::try_from(max_depth).map_err(|_| VerifyError {
        message: "expression nesting is too deep".to_string(),
        line: end_line,
    })
}

fn check_slots(op: &Op, locals: u16, line: u32) -> Result<(), VerifyError> {
    let slots: &[u16] = match op {
        Op::LoadLocal(s) | Op::StoreLocal(s) | Op::ForEachPrep { cursor: s } => std::slice::from_ref(s),
        Op::ForPrep { var, limit, step, .. } | Op::ForStep { var, limit, step, .. } => {
            return [*var, *limit, *step]
                .into_iter()
                .try_for_each(|s| slot_in_range(s, locals, line));
        }
        Op::ForEachNext { cursor, key, value, .. } => {
            return [Some(*cursor), *key, Some(*value)]
                .into_iter()
                .flatten()
                .try_for_each(|s| slot_in_range(s, locals, line));
        }
        _ => &[],
    };
    slots.iter().try_for_each(|&s| slot_in_range(s, locals, line))
}

fn slot_in_range(slot: u16, locals: u16, line: u32) -> Result<(), VerifyError> {
    if slot < locals {
        Ok(())
    } else {
        Err(VerifyError::internal(
            format!("local slot {slot} out of range ({locals} locals)"),
            line,
        ))
    }
}

fn effect(op: &Op, d: u32, returns_value: bool, line: u32) -> Result<Effect, VerifyError> {
    // (needs, net) for straight-line instructions
    let linear = |needs: u32, pops: u32, pushes: u32| Effect {
        needs,
        fall: Some((d + pushes).saturating_sub(pops)),
        branch: None,
    };
    let effect = match op {
        Op::Label(_) | Op::PopHandler | Op::OpenFrame => linear(0, 0, 0),
        Op::Jump(target) => Effect {
            needs: 0,
            fall: None,
            branch: Some((*target, d)),
        },
        Op::JumpIf { target, .. } => Effect {
            needs: 1,
            fall: Some(d.saturating_sub(1)),
            branch: Some((*target, d.saturating_sub(1))),
        },
        Op::JumpOrPop { target, .. } => Effect {
            needs: 1,
            fall: Some(d.saturating_sub(1)),
            branch: Some((*target, d)),
        },
        Op::CompareJump { imm, target, .. } => {
            let pops = if imm.is_some() { 1 } else { 2 };
            Effect {
                needs: pops,
                fall: Some(d.saturating_sub(pops)),
                branch: Some((*target, d.saturating_sub(pops))),
            }
        }
        Op::PushNull | Op::Const(_) | Op::PushFunction(_) | Op::NewMap | Op::MakeClosure(_) => linear(0, 0, 1),
        Op::LoadLocal(_) | Op::LoadPrivate(_) | Op::LoadGlobal(_) | Op::LoadClosure(_) => linear(0, 0, 1),
        Op::StoreLocal(_) | Op::StorePrivate(_) | Op::StoreGlobal(_) | Op::StoreClosure(_) => linear(1, 1, 0),
        Op::Dup => linear(1, 0, 1),
        Op::Dup2 => linear(2, 0, 2),
        Op::Pop(n) => linear(u32::from(*n), u32::from(*n), 0),
        Op::Binary(_, Some(_)) | Op::Unary(_) | Op::GetKey(_) => linear(1, 1, 1),
        Op::Binary(_, None) | Op::GetIndex => linear(2, 2, 1),
        Op::Call { argc, returns, .. } => linear(u32::from(*argc), u32::from(*argc), u32::from(*returns)),
        Op::StackCall { argc } => linear(u32::from(*argc) + 1, u32::from(*argc) + 1, 1),
        Op::SpecialCall { argc, .. } => linear(u32::from(*argc), u32::from(*argc), 1),
        Op::MapAppend => linear(2, 1, 0),
        Op::MapInit => linear(3, 2, 0),
        Op::SetIndex => linear(3, 3, 0),
        Op::SetKey(_) => linear(2, 2, 0),
        Op::ForPrep { exit, .. } => Effect {
            needs: 3,
            fall: Some(d.saturating_sub(3)),
            branch: Some((*exit, d.saturating_sub(3))),
        },
        Op::ForStep { body, .. } => Effect {
            needs: 0,
            fall: Some(d),
            branch: Some((*body, d)),
        },
        Op::ForEachPrep { .. } => linear(1, 1, 0),
        Op::ForEachNext { exit, .. } => Effect {
            needs: 0,
            fall: Some(d),
            branch: Some((*exit, d)),
        },
        Op::PushHandler(target) => Effect {
            needs: 0,
            fall: Some(d),
            branch: Some((*target, d + 1)),
        },
        Op::Assert { has_message } => {
            let n = if *has_message { 2 } else { 1 };
            linear(n, n, 0)
        }
        Op::Throw => Effect {
            needs: 1,
            fall: None,
            branch: None,
        },
        Op::CloseFrame => {
            if returns_value {
                return Err(VerifyError::internal("value-returning function closes without a value", line));
            }
            Effect {
                needs: 0,
                fall: None,
                branch: None,
            }
        }
        Op::CloseFrameValue => {
            if !returns_value {
                return Err(VerifyError::internal("sub closes with a value", line));
            }
            Effect {
                needs: 1,
                fall: None,
                branch: None,
            }
        }
    };
    Ok(effect)
}
