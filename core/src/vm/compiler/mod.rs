mod builder;
mod driver;
mod expr;
mod stmt;

pub(crate) use driver::Compiler;
