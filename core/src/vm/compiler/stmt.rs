use crate::{
    ast::{DeclKind, Expr, Stmt, StmtKind, SwitchCase, Target},
    op::BinOp,
    resolve::{Resolved, ScopeKind},
    vm::{Constant, Op},
};

use super::{
    builder::FunctionRole,
    driver::{CompileResult, Compiler},
};

impl Compiler {
    /// Statements in the current scope.
    pub(super) fn block(&mut self, stmts: &[Stmt]) -> CompileResult<()> {
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    /// Statements in a fresh block scope.
    fn scoped_block(&mut self, kind: ScopeKind, stmts: &[Stmt]) -> CompileResult<()> {
        self.scopes.push_scope(kind);
        self.block(stmts)?;
        self.scopes.pop_scope();
        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> CompileResult<()> {
        let line = stmt.line;
        self.builder().set_line(line);
        match &stmt.kind {
            StmtKind::Declare { kind, name, value } => self.declare(*kind, name, value.as_ref(), line),
            StmtKind::Function(decl) => {
                if !self.scopes.at_top_level() {
                    let what = if decl.returns_value { "function" } else { "sub" };
                    return Err(self.error(format!("{what} '{}' must be declared at top level", decl.name), line));
                }
                self.named_function(decl, line)?;
                self.builder().set_line(line);
                Ok(())
            }
            StmtKind::If { branches, otherwise } => self.if_stmt(branches, otherwise.as_deref()),
            StmtKind::While { condition, body } => self.while_stmt(condition, body),
            StmtKind::NumericFor {
                var,
                start,
                limit,
                step,
                body,
            } => self.numeric_for(var, start, limit, step.as_ref(), body),
            StmtKind::ForEach {
                key,
                value,
                iterable,
                body,
            } => self.for_each(key.as_deref(), value, iterable, body),
            StmtKind::Switch {
                subject,
                cases,
                default,
            } => self.switch(subject, cases, default.as_deref()),
            StmtKind::Block(body) => self.scoped_block(ScopeKind::Block, body),
            StmtKind::Break => {
                let target = self.scopes.break_target().map_err(|msg| self.error(msg, line))?;
                for _ in 0..target.handlers_to_pop {
                    self.builder().emit(Op::PopHandler);
                }
                self.builder().emit(Op::Jump(target.label));
                Ok(())
            }
            StmtKind::Continue => {
                let target = self
                    .scopes
                    .continue_target()
                    .map_err(|msg| self.error(msg, line))?;
                for _ in 0..target.handlers_to_pop {
                    self.builder().emit(Op::PopHandler);
                }
                self.builder().emit(Op::Jump(target.label));
                Ok(())
            }
            StmtKind::Return(value) => self.return_stmt(value.as_ref(), line),
            StmtKind::Throw(value) => {
                self.expr(value)?;
                self.builder().emit(Op::Throw);
                Ok(())
            }
            StmtKind::Try {
                body,
                binding,
                handler,
            } => self.try_stmt(body, binding, handler),
            StmtKind::Assert { condition, message } => {
                self.expr(condition)?;
                if let Some(message) = message {
                    self.expr(message)?;
                }
                self.builder().emit(Op::Assert {
                    has_message: message.is_some(),
                });
                Ok(())
            }
            StmtKind::Assign { target, op, value } => self.assign(target, *op, value),
            StmtKind::Expr(expr) => {
                if self.call(expr, false)? {
                    self.builder().emit(Op::Pop(1));
                }
                Ok(())
            }
        }
    }

    fn declare(&mut self, kind: DeclKind, name: &str, value: Option<&Expr>, line: u32) -> CompileResult<()> {
        if kind != DeclKind::Local && !self.scopes.at_top_level() {
            let what = if kind == DeclKind::Private { "private" } else { "global" };
            return Err(self.error(format!("{what} '{name}' must be declared at top level"), line));
        }
        match kind {
            DeclKind::Local => {
                // the initializer cannot see the variable it defines
                self.expr_or_null(value)?;
                let slot = self.scopes.declare_local(name).map_err(|msg| self.error(msg, line))?;
                self.builder().emit(Op::StoreLocal(slot));
            }
            DeclKind::Private => {
                self.expr_or_null(value)?;
                let idx = self.declare_private(name, line)?;
                self.builder().emit(Op::StorePrivate(idx));
            }
            DeclKind::Global => {
                let Some(&idx) = self.globals.get(name) else {
                    return Err(self.error(format!("global '{name}' was not collected"), line));
                };
                if let Some(value) = value {
                    self.expr(value)?;
                    self.builder().emit(Op::StoreGlobal(idx));
                }
            }
        }
        Ok(())
    }

    fn expr_or_null(&mut self, value: Option<&Expr>) -> CompileResult<()> {
        match value {
            Some(value) => self.expr(value),
            None => {
                self.builder().emit(Op::PushNull);
                Ok(())
            }
        }
    }

    fn if_stmt(&mut self, branches: &[(Expr, Vec<Stmt>)], otherwise: Option<&[Stmt]>) -> CompileResult<()> {
        let end = self.builder().new_label();
        for (condition, body) in branches {
            let next = self.builder().new_label();
            self.expr(condition)?;
            self.builder().emit(Op::JumpIf {
                when: false,
                target: next,
            });
            self.scoped_block(ScopeKind::Block, body)?;
            self.builder().emit(Op::Jump(end));
            self.builder().mark(next);
        }
        if let Some(body) = otherwise {
            self.scoped_block(ScopeKind::Block, body)?;
        }
        self.builder().mark(end);
        Ok(())
    }

    fn while_stmt(&mut self, condition: &Expr, body: &[Stmt]) -> CompileResult<()> {
        let top = self.builder().new_label();
        let exit = self.builder().new_label();
        self.builder().mark(top);
        self.expr(condition)?;
        self.builder().emit(Op::JumpIf {
            when: false,
            target: exit,
        });
        self.scopes.push_loop(ScopeKind::While, exit, top);
        self.block(body)?;
        self.scopes.pop_scope();
        self.builder().emit(Op::Jump(top));
        self.builder().mark(exit);
        Ok(())
    }

    fn numeric_for(
        &mut self,
        var: &str,
        start: &Expr,
        limit: &Expr,
        step: Option<&Expr>,
        body: &[Stmt],
    ) -> CompileResult<()> {
        let line = self.builder().line();
        // bounds are evaluated outside the loop scope
        self.expr(start)?;
        self.expr(limit)?;
        match step {
            Some(step) => self.expr(step)?,
            None => self.builder().emit(Op::Const(Constant::Number(1.0))),
        }
        let body_label = self.builder().new_label();
        let next = self.builder().new_label();
        let exit = self.builder().new_label();
        self.scopes.push_loop(ScopeKind::For, exit, next);
        let limit_slot = self.scopes.hidden_slot().map_err(|msg| self.error(msg, line))?;
        let step_slot = self.scopes.hidden_slot().map_err(|msg| self.error(msg, line))?;
        let var_slot = self.scopes.declare_local(var).map_err(|msg| self.error(msg, line))?;
        self.builder().emit(Op::ForPrep {
            var: var_slot,
            limit: limit_slot,
            step: step_slot,
            exit,
        });
        self.builder().mark(body_label);
        self.block(body)?;
        self.builder().set_line(line);
        self.builder().mark(next);
        self.builder().emit(Op::ForStep {
            var: var_slot,
            limit: limit_slot,
            step: step_slot,
            body: body_label,
        });
        self.scopes.pop_scope();
        self.builder().mark(exit);
        Ok(())
    }

    fn for_each(&mut self, key: Option<&str>, value: &str, iterable: &Expr, body: &[Stmt]) -> CompileResult<()> {
        let line = self.builder().line();
        self.expr(iterable)?;
        let next = self.builder().new_label();
        let exit = self.builder().new_label();
        self.scopes.push_loop(ScopeKind::ForEach, exit, next);
        let cursor = self.scopes.hidden_slot().map_err(|msg| self.error(msg, line))?;
        let key_slot = match key {
            Some(key) => Some(self.scopes.declare_local(key).map_err(|msg| self.error(msg, line))?),
            None => None,
        };
        let value_slot = self.scopes.declare_local(value).map_err(|msg| self.error(msg, line))?;
        self.builder().emit(Op::ForEachPrep { cursor });
        self.builder().mark(next);
        self.builder().emit(Op::ForEachNext {
            cursor,
            key: key_slot,
            value: value_slot,
            exit,
        });
        self.block(body)?;
        self.builder().set_line(line);
        self.builder().emit(Op::Jump(next));
        self.scopes.pop_scope();
        self.builder().mark(exit);
        Ok(())
    }

    fn switch(&mut self, subject: &Expr, cases: &[SwitchCase], default: Option<&[Stmt]>) -> CompileResult<()> {
        let line = self.builder().line();
        self.expr(subject)?;
        let end = self.builder().new_label();
        self.scopes.push_switch(end);
        let subject_slot = self.scopes.hidden_slot().map_err(|msg| self.error(msg, line))?;
        self.builder().emit(Op::StoreLocal(subject_slot));

        let mut case_labels = Vec::with_capacity(cases.len());
        for case in cases {
            let label = self.builder().new_label();
            self.builder().set_line(case.line);
            for value in &case.values {
                self.builder().emit(Op::LoadLocal(subject_slot));
                self.expr(value)?;
                self.builder().emit(Op::Binary(BinOp::Eq, None));
                self.builder().emit(Op::JumpIf {
                    when: true,
                    target: label,
                });
            }
            case_labels.push(label);
        }
        let default_label = self.builder().new_label();
        self.builder().emit(Op::Jump(default_label));

        for (case, label) in cases.iter().zip(case_labels) {
            self.builder().mark(label);
            self.scoped_block(ScopeKind::Block, &case.body)?;
            self.builder().emit(Op::Jump(end));
        }
        self.builder().mark(default_label);
        if let Some(body) = default {
            self.scoped_block(ScopeKind::Block, body)?;
        }
        self.builder().mark(end);
        self.scopes.pop_scope();
        Ok(())
    }

    fn return_stmt(&mut self, value: Option<&Expr>, line: u32) -> CompileResult<()> {
        match (self.role(), value) {
            (FunctionRole::Sub, Some(_)) => Err(self.error("a sub cannot return a value", line)),
            (FunctionRole::Sub, None) => {
                self.builder().emit(Op::CloseFrame);
                Ok(())
            }
            (FunctionRole::Function, None) => Err(self.error("a function must return a value", line)),
            (FunctionRole::Entry, None) => {
                self.builder().emit(Op::PushNull);
                self.builder().emit(Op::CloseFrameValue);
                Ok(())
            }
            (_, Some(value)) => {
                self.expr(value)?;
                self.builder().emit(Op::CloseFrameValue);
                Ok(())
            }
        }
    }

    fn try_stmt(&mut self, body: &[Stmt], binding: &str, handler: &[Stmt]) -> CompileResult<()> {
        let line = self.builder().line();
        let catch = self.builder().new_label();
        let end = self.builder().new_label();
        self.builder().emit(Op::PushHandler(catch));
        self.scoped_block(ScopeKind::Try, body)?;
        self.builder().emit(Op::PopHandler);
        self.builder().emit(Op::Jump(end));

        self.builder().set_line(line);
        self.builder().mark(catch);
        self.scopes.push_scope(ScopeKind::Block);
        let slot = self.scopes.declare_local(binding).map_err(|msg| self.error(msg, line))?;
        self.builder().emit(Op::StoreLocal(slot));
        self.block(handler)?;
        self.scopes.pop_scope();
        self.builder().mark(end);
        Ok(())
    }

    fn assign(&mut self, target: &Target, op: Option<BinOp>, value: &Expr) -> CompileResult<()> {
        match target {
            Target::Name(name) => {
                let resolved = self.resolve_var(name);
                if resolved == Resolved::Unresolved {
                    return Err(self.error_here(format!("Unknown variable '{name}'")));
                }
                if let Some(op) = op {
                    self.load_var(resolved);
                    self.expr(value)?;
                    self.builder().emit(Op::Binary(op, None));
                } else {
                    self.expr(value)?;
                }
                self.store_var(resolved);
            }
            Target::Index(object, key) => {
                self.expr(object)?;
                self.expr(key)?;
                if let Some(op) = op {
                    self.builder().emit(Op::Dup2);
                    self.builder().emit(Op::GetIndex);
                    self.expr(value)?;
                    self.builder().emit(Op::Binary(op, None));
                } else {
                    self.expr(value)?;
                }
                self.builder().emit(Op::SetIndex);
            }
            Target::Field(object, field) => {
                let key = Constant::Str(field.as_str().into());
                self.expr(object)?;
                if let Some(op) = op {
                    self.builder().emit(Op::Dup);
                    self.builder().emit(Op::GetKey(key.clone()));
                    self.expr(value)?;
                    self.builder().emit(Op::Binary(op, None));
                } else {
                    self.expr(value)?;
                }
                self.builder().emit(Op::SetKey(key));
            }
        }
        Ok(())
    }

    pub(super) fn load_var(&mut self, resolved: Resolved) {
        let op = match resolved {
            Resolved::Local(i) => Op::LoadLocal(i),
            Resolved::Closure(i) => Op::LoadClosure(i),
            Resolved::Private(i) => Op::LoadPrivate(i),
            Resolved::Global(i) => Op::LoadGlobal(i),
            Resolved::Unresolved => Op::PushNull,
        };
        self.builder().emit(op);
    }

    fn store_var(&mut self, resolved: Resolved) {
        let op = match resolved {
            Resolved::Local(i) => Op::StoreLocal(i),
            Resolved::Closure(i) => Op::StoreClosure(i),
            Resolved::Private(i) => Op::StorePrivate(i),
            Resolved::Global(i) => Op::StoreGlobal(i),
            Resolved::Unresolved => Op::Pop(1),
        };
        self.builder().emit(op);
    }
}
