use crate::util::FastHashMap;
use crate::vm::Label;

/// What opened a lexical scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Body of a named `function` (or the unit's entry function).
    Function,
    /// Body of a named `sub`.
    Sub,
    /// Body of an anonymous function; names beyond it become captures.
    Border,
    While,
    For,
    ForEach,
    Switch,
    Try,
    Block,
}

impl ScopeKind {
    fn is_function_boundary(self) -> bool {
        matches!(self, ScopeKind::Function | ScopeKind::Sub | ScopeKind::Border)
    }

    fn is_loop(self) -> bool {
        matches!(self, ScopeKind::While | ScopeKind::For | ScopeKind::ForEach)
    }
}

/// Where a closure copies one captured value from when it is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    /// A local slot of the function creating the closure.
    Local(u16),
    /// A capture slot of the (closure) function creating the closure.
    Closure(u16),
}

/// Storage a name resolved to. Function names are resolved separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Local(u16),
    Closure(u16),
    Private(u32),
    Global(u32),
    Unresolved,
}

/// Target of a `break`/`continue` plus the number of `try` scopes it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTarget {
    pub label: Label,
    pub handlers_to_pop: usize,
}

/// Slot requirements of a finished function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionLayout {
    pub locals: u16,
    pub captures: Vec<(String, CaptureSource)>,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    names: FastHashMap<String, u16>,
    slots: Vec<u16>,
    break_label: Option<Label>,
    continue_label: Option<Label>,
}

#[derive(Debug)]
struct FunctionState {
    kind: ScopeKind,
    first_scope: usize,
    free: Vec<u16>,
    next_slot: u16,
    captures: Vec<(String, CaptureSource)>,
    capture_index: FastHashMap<String, u16>,
}

/// Flat chain of lexical scopes across all functions currently being compiled.
#[derive(Debug, Default)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
    functions: Vec<FunctionState>,
}

pub type ScopeResult<T> = Result<T, String>;

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a function body (`Function`, `Sub` or `Border`) and its root scope.
    pub fn push_function(&mut self, kind: ScopeKind) {
        debug_assert!(kind.is_function_boundary());
        self.functions.push(FunctionState {
            kind,
            first_scope: self.scopes.len(),
            free: Vec::new(),
            next_slot: 0,
            captures: Vec::new(),
            capture_index: FastHashMap::default(),
        });
        self.push_raw(kind, None, None);
    }

    /// Close the innermost function, returning its frame size and capture table.
    pub fn pop_function(&mut self) -> FunctionLayout {
        if let Some(state) = self.functions.last() {
            self.scopes.truncate(state.first_scope);
        }
        match self.functions.pop() {
            Some(state) => FunctionLayout {
                locals: state.next_slot,
                captures: state.captures,
            },
            None => FunctionLayout {
                locals: 0,
                captures: Vec::new(),
            },
        }
    }

    pub fn push_scope(&mut self, kind: ScopeKind) {
        debug_assert!(!kind.is_function_boundary());
        self.push_raw(kind, None, None);
    }

    pub fn push_loop(&mut self, kind: ScopeKind, break_label: Label, continue_label: Label) {
        debug_assert!(kind.is_loop());
        self.push_raw(kind, Some(break_label), Some(continue_label));
    }

    pub fn push_switch(&mut self, break_label: Label) {
        self.push_raw(ScopeKind::Switch, Some(break_label), None);
    }

    fn push_raw(&mut self, kind: ScopeKind, break_label: Option<Label>, continue_label: Option<Label>) {
        self.scopes.push(Scope {
            kind,
            names: FastHashMap::default(),
            slots: Vec::new(),
            break_label,
            continue_label,
        });
    }

    /// Leave the innermost block, returning its slots to the free list.
    pub fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else { return };
        debug_assert!(!scope.kind.is_function_boundary());
        if let Some(state) = self.functions.last_mut() {
            // reverse so the lowest slot is handed out first again
            state.free.extend(scope.slots.into_iter().rev());
        }
    }

    /// True while the innermost scope is the root scope of the outermost function.
    pub fn at_top_level(&self) -> bool {
        self.functions.len() == 1 && self.scopes.len() == 1
    }

    fn alloc_slot(&mut self) -> ScopeResult<u16> {
        let state = self
            .functions
            .last_mut()
            .ok_or_else(|| "no function is being compiled".to_string())?;
        let slot = match state.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = state.next_slot;
                state.next_slot = slot
                    .checked_add(1)
                    .ok_or_else(|| "too many local variables in one function".to_string())?;
                slot
            }
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.slots.push(slot);
        }
        Ok(slot)
    }

    /// Declare a named local in the innermost scope.
    pub fn declare_local(&mut self, name: &str) -> ScopeResult<u16> {
        let slot = self.alloc_slot()?;
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name.to_string(), slot);
        }
        Ok(slot)
    }

    /// Allocate an unnamed slot owned by the innermost scope (loop limits, cursors...).
    pub fn hidden_slot(&mut self) -> ScopeResult<u16> {
        self.alloc_slot()
    }

    /// Resolve a local or closure name. Privates and globals are the caller's concern.
    pub fn resolve(&mut self, name: &str) -> Resolved {
        let Some(fi) = self.functions.len().checked_sub(1) else {
            return Resolved::Unresolved;
        };
        if let Some(slot) = self.find_in_function(fi, name) {
            return Resolved::Local(slot);
        }
        match self.maybe_create_cvar(fi, name) {
            Some(idx) => Resolved::Closure(idx),
            None => Resolved::Unresolved,
        }
    }

    fn find_in_function(&self, fi: usize, name: &str) -> Option<u16> {
        let start = self.functions[fi].first_scope;
        let end = self
            .functions
            .get(fi + 1)
            .map_or(self.scopes.len(), |next| next.first_scope);
        self.scopes[start..end]
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
    }

    /// Capture `name` into function `fi` if it is an anonymous function and the name
    /// is reachable through its enclosing functions. Every anonymous function between
    /// the declaring one and `fi` receives a forwarding capture.
    fn maybe_create_cvar(&mut self, fi: usize, name: &str) -> Option<u16> {
        if let Some(&idx) = self.functions[fi].capture_index.get(name) {
            return Some(idx);
        }
        if self.functions[fi].kind != ScopeKind::Border || fi == 0 {
            return None;
        }
        let parent = fi - 1;
        let source = match self.find_in_function(parent, name) {
            Some(slot) => CaptureSource::Local(slot),
            None => CaptureSource::Closure(self.maybe_create_cvar(parent, name)?),
        };
        let state = &mut self.functions[fi];
        let idx = u16::try_from(state.captures.len()).ok()?;
        state.captures.push((name.to_string(), source));
        state.capture_index.insert(name.to_string(), idx);
        Some(idx)
    }

    /// Innermost `break` target within the current function.
    pub fn break_target(&self) -> ScopeResult<JumpTarget> {
        self.jump_target(|scope| scope.break_label, "break")
    }

    /// Innermost `continue` target; `switch` scopes are transparent to it.
    pub fn continue_target(&self) -> ScopeResult<JumpTarget> {
        self.jump_target(|scope| scope.continue_label, "continue")
    }

    fn jump_target(&self, pick: impl Fn(&Scope) -> Option<Label>, what: &str) -> ScopeResult<JumpTarget> {
        let mut handlers_to_pop = 0;
        for scope in self.scopes.iter().rev() {
            if scope.kind.is_function_boundary() {
                break;
            }
            if let Some(label) = pick(scope) {
                return Ok(JumpTarget { label, handlers_to_pop });
            }
            if scope.kind == ScopeKind::Try {
                handlers_to_pop += 1;
            }
        }
        Err(format!("'{what}' outside of a loop"))
    }
}
