//! SMT emission & driver (C5): serializes the scalar circuit to SMT-LIB
//! v2.6, dispatches to one of four external solver back ends, parses the
//! returned model, and supports enumeration by blocking previous solutions.

mod emit;
mod model;
mod solver;

pub use emit::{emit_problem, EmittedProblem};
pub use model::{parse_model, ModelValue, SolverModel};
pub use solver::{
	cancel_active_solver, resolve_binary, take_aborted, SolveOutcome, SolverHandle, SolverKind,
	DEADLINE_EXCEEDED,
};
