//! # qrel - A Quantitative Relational Model Finder
//!
//! `qrel` lowers bounded relational-logic formulas, interpreted over either
//! the ordinary integers or a fuzzy (t-norm-parameterized) semiring, to
//! SMT-LIB v2.6 and dispatches to an external SMT solver (Z3, MathSAT, CVC4,
//! or Yices) to find a satisfying weighted instance.
//!
//! The pipeline runs in six stages, front to back:
//!
//! - [`scalar`]/[`semiring`]/[`factory`] (C1): a hash-consed scalar circuit
//!   IR, parameterized by a [`semiring::Domain`] and [`semiring::TNorm`].
//! - [`matrix`] (C2): a sparse numeric matrix type carrying the relational
//!   algebra (union, product, transpose, closure, and the rest) over that
//!   circuit.
//! - [`bounds`]/[`leaf`] (C3): relation bounds and the leaf interpreter that
//!   allocates primary variables under them.
//! - [`ast`]/[`env`]/[`cache`]/[`translator`] (C4): the relational-formula AST
//!   and the translator that lowers it to a single scalar circuit root.
//! - [`smt`] (C5): SMT-LIB emission and the external solver driver.
//! - [`instance`] (C6): lifting a solved model back into a weighted
//!   [`instance::Instance`].
//!
//! [`problem::Problem`] bundles all of the above behind a single `solve`/
//! `enumerate` entry point; [`error::Error`] is the crate-wide failure type.

pub mod ast;
pub mod bounds;
pub mod cache;
pub mod env;
pub mod error;
pub mod factory;
pub mod instance;
pub mod leaf;
pub mod matrix;
pub mod problem;
pub mod scalar;
pub mod semiring;
pub mod smt;
pub mod translator;

pub use ast::{Decl, Expr, Formula, Multiplicity, ScalarExpr, Variable};
pub use bounds::{Bounds, RelationBounds, Sort, Universe};
pub use error::{CancellationFault, Error, LiftFault, SolverFailure, TranslationFault};
pub use instance::Instance;
pub use problem::{Options, Outcome, Problem, SolutionIterator, Statistics};
pub use scalar::{Label, NumConst};
pub use semiring::{Domain, TNorm};
pub use smt::{cancel_active_solver, SolverKind};
