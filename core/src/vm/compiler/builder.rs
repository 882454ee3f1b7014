use crate::vm::{Instr, Label, Op};

/// Role of the function being emitted; decides which `return` forms are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FunctionRole {
    /// The unit's top-level code.
    Entry,
    Function,
    Sub,
}

impl FunctionRole {
    pub(crate) fn returns_value(self) -> bool {
        !matches!(self, FunctionRole::Sub)
    }
}

/// Instruction list of one function under construction.
pub(crate) struct FunctionBuilder {
    pub(crate) role: FunctionRole,
    code: Vec<Instr>,
    next_label: u32,
    line: u32,
}

impl FunctionBuilder {
    pub(crate) fn new(role: FunctionRole, line: u32) -> Self {
        Self {
            role,
            code: Vec::new(),
            next_label: 0,
            line,
        }
    }

    #[inline]
    pub(crate) fn set_line(&mut self, line: u32) {
        self.line = line;
    }

    #[inline]
    pub(crate) fn line(&self) -> u32 {
        self.line
    }

    pub(crate) fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    #[inline]
    pub(crate) fn emit(&mut self, op: Op) {
        self.code.push(Instr::new(op, self.line));
    }

    /// Place `label` at the current position.
    pub(crate) fn mark(&mut self, label: Label) {
        self.emit(Op::Label(label));
    }

    pub(crate) fn finish(self) -> Vec<Instr> {
        self.code
    }
}
