//! Matcher expression pipeline
//!
//! Text is tokenized and parsed into an [`Expr`], then lowered into a
//! [`Program`] bound to the model's request and policy token tables.
//! Programs are immutable and shared across threads; each evaluation gets
//! its own [`EvalContext`].

mod lexer;
mod parser;
mod program;
mod rewrite;
mod value;

pub use parser::{parse, BinaryOp, Expr, UnaryOp};
pub use program::{EvalContext, Layout, Program, Scope};
pub use rewrite::{eval_targets, has_eval, rewrite_eval};
pub use value::Value;
