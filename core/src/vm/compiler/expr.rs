use crate::{
    ast::{Expr, MapItem},
    resolve::Resolved,
    vm::{Constant, Op},
};

use super::driver::{CompileResult, Compiler};

impl Compiler {
    /// Emit code leaving exactly one value on the stack.
    pub(super) fn expr(&mut self, expr: &Expr) -> CompileResult<()> {
        match expr {
            Expr::Null => self.builder().emit(Op::PushNull),
            Expr::Number(n) => self.builder().emit(Op::Const(Constant::Number(*n))),
            Expr::Str(s) => self.builder().emit(Op::Const(Constant::Str(s.clone()))),
            Expr::Name(name) => self.name(name)?,
            Expr::Unary(op, operand) => {
                self.expr(operand)?;
                self.builder().emit(Op::Unary(*op));
            }
            Expr::Binary(lhs, op, rhs) => {
                self.expr(lhs)?;
                self.expr(rhs)?;
                self.builder().emit(Op::Binary(*op, None));
            }
            Expr::And(lhs, rhs) => self.short_circuit(lhs, rhs, false)?,
            Expr::Or(lhs, rhs) => self.short_circuit(lhs, rhs, true)?,
            Expr::Call(..) | Expr::Method(..) => {
                self.call(expr, true)?;
            }
            Expr::Index(object, key) => {
                self.expr(object)?;
                self.expr(key)?;
                self.builder().emit(Op::GetIndex);
            }
            Expr::Field(object, field) => {
                self.expr(object)?;
                self.builder().emit(Op::GetKey(Constant::Str(field.as_str().into())));
            }
            Expr::Map(items) => {
                self.builder().emit(Op::NewMap);
                for item in items {
                    match item {
                        MapItem::Positional(value) => {
                            self.expr(value)?;
                            self.builder().emit(Op::MapAppend);
                        }
                        MapItem::Keyed(key, value) => {
                            self.expr(key)?;
                            self.expr(value)?;
                            self.builder().emit(Op::MapInit);
                        }
                    }
                }
            }
            Expr::Function(decl) => {
                let id = self.anonymous_function(decl)?;
                self.builder().emit(Op::MakeClosure(id));
            }
        }
        Ok(())
    }

    fn name(&mut self, name: &str) -> CompileResult<()> {
        let resolved = self.resolve_var(name);
        if resolved != Resolved::Unresolved {
            self.load_var(resolved);
            return Ok(());
        }
        match self.resolve_function_value(name) {
            Some(func) => {
                self.builder().emit(Op::PushFunction(func));
                Ok(())
            }
            None => Err(self.error_here(format!("Unknown variable '{name}'"))),
        }
    }

    fn short_circuit(&mut self, lhs: &Expr, rhs: &Expr, when: bool) -> CompileResult<()> {
        let end = self.builder().new_label();
        self.expr(lhs)?;
        self.builder().emit(Op::JumpOrPop { when, target: end });
        self.expr(rhs)?;
        self.builder().mark(end);
        Ok(())
    }

    /// Emit a call. Returns whether a value was left on the stack.
    pub(super) fn call(&mut self, expr: &Expr, want_value: bool) -> CompileResult<bool> {
        match expr {
            Expr::Call(callee, args) => {
                let argc = self.argc(args.len())?;
                if let Expr::Name(name) = callee.as_ref() {
                    let resolved = self.resolve_var(name);
                    if resolved == Resolved::Unresolved {
                        return self.direct_call(name, args, argc, want_value);
                    }
                    self.load_var(resolved);
                } else {
                    self.expr(callee)?;
                }
                self.args(args)?;
                self.builder().emit(Op::StackCall { argc });
                Ok(true)
            }
            Expr::Method(receiver, name, args) => {
                let argc = self.argc(args.len() + 1)?;
                self.expr(receiver)?;
                self.args(args)?;
                self.builder().emit(Op::SpecialCall {
                    name: name.as_str().into(),
                    argc,
                });
                Ok(true)
            }
            other => {
                self.expr(other)?;
                Ok(true)
            }
        }
    }

    fn direct_call(&mut self, name: &str, args: &[Expr], argc: u8, want_value: bool) -> CompileResult<bool> {
        let Some((target, returns)) = self.resolve_call(name, argc) else {
            let message = if self.has_function_named(name) {
                format!("no overload of '{name}' takes {argc} argument(s)")
            } else {
                format!("Unknown function '{name}'")
            };
            return Err(self.error_here(message));
        };
        if want_value && !returns {
            return Err(self.error_here(format!("sub '{name}' does not return a value")));
        }
        self.args(args)?;
        self.builder().emit(Op::Call { target, argc, returns });
        Ok(returns)
    }

    fn args(&mut self, args: &[Expr]) -> CompileResult<()> {
        for arg in args {
            self.expr(arg)?;
        }
        Ok(())
    }

    fn argc(&self, count: usize) -> CompileResult<u8> {
        u8::try_from(count).map_err(|_| self.error_here("too many arguments"))
    }
}
