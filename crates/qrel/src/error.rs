//! Error taxonomy for every fallible boundary in the translation pipeline.
//!
//! Each component of the pipeline (§4 of the design) has its own error enum;
//! [`Error`] wraps all of them so that [`crate::problem::Problem::solve`] can
//! return a single type while still letting callers match on the specific
//! kind of failure that occurred.

use thiserror::Error;

/// Errors raised while folding or canonicalizing a scalar value, or while
/// walking the relational AST to build the circuit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationFault {
	/// A variable was referenced in the AST without a binding in the current
	/// environment.
	#[error("unbound leaf variable `{0}'")]
	UnboundLeaf(String),
	/// A declaration in a quantifier or comprehension did not have multiplicity
	/// `one`; skolemization is not performed by this translator.
	#[error("declaration `{0}' is not of multiplicity `one'")]
	HigherOrder(String),
	/// A constant arithmetic expression divided or took the modulo of a
	/// constant zero.
	#[error("arithmetic error: {0}")]
	Arithmetic(String),
	/// Two scalar values that were constructed by different [`crate::factory::Factory`]
	/// instances were combined.
	#[error("mixed scalars from distinct factories")]
	DomainMismatch,
	/// The universe size raised to the arity of some node exceeded the
	/// implementation's matrix capacity limit.
	#[error("capacity exceeded: universe^arity = {got}, limit = {limit}")]
	CapacityExceeded {
		/// The capacity that was requested.
		got: u64,
		/// The configured capacity limit.
		limit: u64,
	},
	/// The bounds supplied for a relation were inconsistent (lower bound not a
	/// subset of upper bound, or arity mismatch).
	#[error("invalid bounds for relation `{0}'")]
	InvalidBounds(String),
}

/// Errors raised while driving an external SMT solver process.
#[derive(Error, Debug)]
pub enum SolverFailure {
	/// The solver binary could not be located or spawned.
	#[error("solver binary unreachable: {0}")]
	Unreachable(String),
	/// The solver's stdout could not be parsed as a valid response.
	#[error("could not parse solver output: {message}\n--- stderr ---\n{stderr}")]
	Protocol {
		/// Description of the parse failure.
		message: String,
		/// The raw stderr captured from the solver process, for diagnosis.
		stderr: String,
	},
	/// The solver reported `unknown` rather than `sat`/`unsat`.
	#[error("solver returned unknown")]
	Unknown,
	/// The solver process exited with an unexpected status.
	#[error("solver exited unexpectedly: {0}")]
	UnexpectedExit(String),
	/// An I/O error occurred while communicating with the solver process.
	#[error("I/O error communicating with solver: {0}")]
	Io(#[from] std::io::Error),
}

/// Errors raised by deadline-based cancellation of a solve.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationFault {
	/// The configured deadline elapsed before the solver returned.
	#[error("solve timed out")]
	Timeout,
	/// The solve was aborted by the caller (e.g. a Ctrl-C signal).
	#[error("solve aborted")]
	Aborted,
}

/// Errors raised while lifting a solver model back into a weighted instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LiftFault {
	/// A relation declared boolean received a lifted weight other than `1`.
	#[error("boolean relation `{0}' was lifted with a non-unit weight")]
	BooleanWithWeights(String),
	/// The solver's model did not contain a value for a primary variable that
	/// the translation allocated.
	#[error("model is missing a value for primary variable {0}")]
	MissingVariable(u64),
}

/// Top-level error type unifying every component's failure mode.
#[derive(Error, Debug)]
pub enum Error {
	/// A failure while translating the AST and bounds into a circuit.
	#[error(transparent)]
	Translation(#[from] TranslationFault),
	/// A failure while driving the external SMT solver.
	#[error(transparent)]
	Solver(#[from] SolverFailure),
	/// A failure due to deadline-based cancellation.
	#[error(transparent)]
	Cancellation(#[from] CancellationFault),
	/// A failure while lifting a model back into a weighted instance.
	#[error(transparent)]
	Lift(#[from] LiftFault),
}
