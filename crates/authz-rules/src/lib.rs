//! Rule Language
//!
//! Rule programs are Rego modules. Generated programs are built as a syntax
//! tree (`ast`) and rendered to source with `Display` (`print`); every
//! program, generated or hand-written, is executed by an `Engine`.
//!
//! A program is a package of rules. Rules sharing a head name are
//! alternatives; a rule holds when every expression in its body holds.

pub mod ast;
pub mod engine;
pub mod print;
pub mod store;

pub use ast::{CompareOp, Expr, Head, Location, Module, Ref, Rule, Term};
pub use engine::{Engine, InputHook, PrepareRequest, PreparedQuery, ResultSet, RuleEngine};
pub use print::{is_identifier, is_keyword};
pub use store::{DataStore, MemoryStore};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ast::{Expr, Module, Rule, Term};
    pub use crate::engine::{Engine, PrepareRequest, PreparedQuery, ResultSet, RuleEngine};
    pub use crate::store::{DataStore, MemoryStore};
}
