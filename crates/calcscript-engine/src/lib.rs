#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! Compiler and evaluator for CalcScript, the expression language of text-first spreadsheet
//! models.
//!
//! A calc block is a list of `name = expression;` declarations. [`compile`] turns it into
//! [`CalcNode`]s (one per declaration, carrying the parsed expression and the names it depends
//! on). [`scheduler::evaluate_all`] orders the nodes topologically and evaluates each one,
//! isolating failures: a failing node becomes an error marker and its dependents report an
//! upstream error instead of aborting the run. [`infer::infer`] is an independent pass that
//! propagates display dimensions (currency, percent, ...) through arithmetic.
//!
//! [`Engine`] ties the passes together:
//!
//! ```
//! use calcscript_engine::{Engine, EvalOptions, ModelInputs, Value};
//!
//! let report = Engine::new().run(
//!     "subtotal = 40 + 2;\ntotal = std.math.round(subtotal * 1.075, 2);",
//!     &ModelInputs::default(),
//!     &EvalOptions::default(),
//! );
//! assert!(report.messages.is_empty());
//! assert_eq!(report.values["total"], Value::Number(45.15));
//! ```
//!
//! ## Sandbox
//!
//! Expressions have no side effects and no ambient clock. The only callable values are the
//! functions of the [`StdLibrary`] reached through the reserved `std` root; user arrow
//! functions are passed to higher-order std functions but never called directly. The names
//! `__proto__`, `prototype` and `constructor` are rejected wherever they could become a key or
//! binding.
//!
//! Work is bounded by input size. The parser rejects expressions nested deeper than
//! [`parser::MAX_NESTING_DEPTH`], and an evaluation that recurses past [`eval::MAX_EVAL_DEPTH`]
//! (a closure applied to itself through a std higher-order function) fails with
//! `NESTING_LIMIT` instead of exhausting the stack.

pub mod ast;
pub mod compiler;
pub mod deps;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod eval;
pub mod extract;
pub mod infer;
pub mod lexer;
pub mod metadata;
pub mod parser;
pub mod scheduler;
pub mod stdlib;
pub mod table_patch;
pub mod validate;
pub mod value;

pub use compiler::{compile, CalcNode, Compilation};
pub use diagnostics::{codes, Message, Severity};
pub use engine::{Engine, EvalOptions, ModelInputs, RunReport};
pub use error::{EvalError, EvalResult, ModelError, ParseResult, SyntaxError};
pub use infer::{ComputedTableSchema, Dimension, Inference, InferredType};
pub use metadata::{DeclaredType, InputDef, TableSchema};
pub use parser::parse_expression;
pub use scheduler::Evaluation;
pub use stdlib::{FunctionSpec, StdLibrary};
pub use table_patch::{RowSelector, TablePatch};
pub use value::{Record, Table, TableSource, Value};
