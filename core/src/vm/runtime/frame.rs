use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use smallvec::SmallVec;

use crate::val::{MapRef, Value};
use crate::vm::CompiledUnit;

/// Where a finished call leaves its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ReturnMode {
    /// Push the result (Null for a sub) at the callee's base.
    Push,
    /// Drop the result; the caller expects nothing.
    Discard,
    /// The callee value sits below the arguments and is replaced by the result.
    ReplaceCallee,
    /// Hand the result back to the host that started this frame.
    Entry,
}

/// An installed `try` handler: the catch block's pc and the operand depth to
/// cut back to.
#[derive(Debug, Clone, Copy)]
pub(super) struct Handler {
    pub(super) pc: usize,
    pub(super) depth: usize,
}

/// One active script call, as offsets into the shared operand stack.
#[derive(Debug)]
pub(super) struct Frame {
    /// Unit whose code, globals and privates this call uses.
    pub(super) unit: Arc<CompiledUnit>,
    pub(super) function: u32,
    pub(super) base: usize,
    pub(super) pc: usize,
    pub(super) handlers: SmallVec<[Handler; 2]>,
    /// The call pushed onto the active-closure stack.
    pub(super) closure: bool,
    pub(super) ret: ReturnMode,
}

impl Frame {
    pub(super) fn new(unit: Arc<CompiledUnit>, function: u32, base: usize, closure: bool, ret: ReturnMode) -> Self {
        Self {
            unit,
            function,
            base,
            pc: 0,
            handlers: SmallVec::new(),
            closure,
            ret,
        }
    }

    /// Stack height the caller had before pushing this call.
    pub(super) fn floor(&self) -> usize {
        match self.ret {
            ReturnMode::ReplaceCallee => self.base.saturating_sub(1),
            _ => self.base,
        }
    }
}

/// Foreach position over a live map. Entries appended during the loop are
/// visited; the map is never copied.
pub(super) struct MapCursor {
    map: MapRef,
    next: AtomicUsize,
}

impl MapCursor {
    pub(super) fn new(map: MapRef) -> Self {
        Self {
            map,
            next: AtomicUsize::new(0),
        }
    }

    pub(super) fn advance(&self) -> Option<(Value, Value)> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        self.map
            .read()
            .entry(index)
            .map(|(key, value)| (key.clone(), value.clone()))
    }
}
