//! The problem front door: the single public entry point external
//! collaborators (the surface-language parser and type checker upstream, the
//! GUI downstream) are expected to call. Bundles an AST, [`Bounds`], and
//! [`Options`]; exposes `solve`/`enumerate`; owns the process-wide "last
//! solved" handle the enumerator relies on.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::ast::Formula;
use crate::bounds::{Bounds, Sort};
use crate::error::{CancellationFault, Error, SolverFailure};
use crate::factory::Factory;
use crate::instance::{lift, model_value_to_const, Instance};
use crate::leaf::LeafInterpreter;
use crate::scalar::{CmpOp, Label};
use crate::semiring::{Domain, TNorm};
use crate::smt::{emit_problem, resolve_binary, SolveOutcome, SolverHandle, SolverKind};
use crate::translator::Translator;

/// The configuration surface for one solve: solver choice, domain, t-norm,
/// an optional binary path override, the maximum representable integer
/// weight, whether to prefer incremental solver invocation, and a wall-clock
/// deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
	/// Which external SMT solver to dispatch to.
	pub solver: SolverKind,
	/// The value domain: integer or fuzzy.
	pub domain: Domain,
	/// The t-norm family, meaningful only when `domain` is [`Domain::Fuzzy`].
	pub tnorm: TNorm,
	/// An explicit override of the solver binary's path. When absent,
	/// resolution falls back to the `<SOLVER>_DIR` environment variable and
	/// then a bare `./<solver>` relative lookup.
	pub binary_path: Option<PathBuf>,
	/// The maximum magnitude a quantitative weight may take, if bounded.
	pub max_weight: Option<i64>,
	/// Prefer incremental solver invocation when the backend supports it.
	pub incremental: bool,
	/// A wall-clock deadline for the whole solve; exceeding it kills the
	/// solver subprocess and reports [`CancellationFault::Timeout`].
	pub deadline: Option<Duration>,
}

impl Default for Options {
	fn default() -> Self {
		Options {
			solver: SolverKind::Z3,
			domain: Domain::Integer,
			tnorm: TNorm::Godel,
			binary_path: None,
			max_weight: None,
			incremental: true,
			deadline: None,
		}
	}
}

/// Translation and solving time, and circuit-size counters, returned
/// alongside every verdict.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
	/// Wall-clock time spent in AST translation.
	pub translation_time: Duration,
	/// Wall-clock time spent waiting on the solver process.
	pub solving_time: Duration,
	/// Number of primary variables allocated by the leaf interpreter.
	pub primary_var_count: u64,
	/// Number of distinct function symbols declared in the emitted SMT-LIB.
	pub function_symbol_count: usize,
	/// Number of `(assert ...)` statements emitted.
	pub assertion_count: usize,
	/// Translation cache (hits, misses).
	pub cache_hit_rate: (u64, u64),
}

/// The typed outcome of a solve, matching §7's `{Sat, Unsat, Unknown,
/// Error}` taxonomy.
#[derive(Debug)]
pub enum Outcome {
	/// The problem is satisfiable; carries the lifted instance.
	Sat(Instance),
	/// The problem is unsatisfiable.
	Unsat,
	/// The solver could not determine satisfiability.
	Unknown,
	/// A translation, solver, or lift failure occurred.
	Error(Error),
}

/// A snapshot of one solve, sufficient to re-block on a later `next()` call
/// without re-parsing the solver's model. This is what the process-wide
/// "last solved" handle actually stores.
#[derive(Debug, Clone)]
struct SolveRecord {
	bounds_fingerprint: String,
	options_fingerprint: String,
	assigned: Vec<(u64, crate::smt::ModelValue)>,
}

static LAST_SOLVED: OnceLock<Mutex<Option<SolveRecord>>> = OnceLock::new();

fn last_solved() -> &'static Mutex<Option<SolveRecord>> {
	LAST_SOLVED.get_or_init(|| Mutex::new(None))
}

/// A bundled AST, [`Bounds`], and [`Options`]: the unit of work this crate
/// solves.
pub struct Problem {
	formula: Rc<Formula>,
	bounds: Bounds,
	options: Options,
	sorts: BTreeMap<String, Sort>,
}

impl Problem {
	/// Construct a problem from its formula, bounds, and options.
	#[must_use]
	pub fn new(formula: Rc<Formula>, bounds: Bounds, options: Options) -> Self {
		let mut sorts = BTreeMap::new();
		for (name, rb) in bounds.iter() {
			let _ = sorts.insert(name.to_string(), rb.sort);
		}
		Problem { formula, bounds, options, sorts }
	}

	/// Solve once: translate, emit, dispatch to the solver, and lift the
	/// result, recording statistics throughout.
	pub fn solve(&self) -> (Outcome, Statistics) {
		let (outcome, stats, _) = self.solve_blocking(&[]);
		(outcome, stats)
	}

	/// As [`Problem::solve`], additionally asserting one blocking clause per
	/// entry of `blocks`, excluding the exact primary-variable assignment
	/// each one recorded. Used by [`SolutionIterator`] to force progress on
	/// successive calls without re-parsing or re-translating the formula.
	/// Returns the freshly solved [`SolveRecord`] alongside a `Sat` outcome
	/// so the caller can extend its own block list without re-reading the
	/// process-wide "last solved" singleton, which a concurrent solve
	/// elsewhere could have overwritten in the meantime.
	fn solve_blocking(&self, blocks: &[SolveRecord]) -> (Outcome, Statistics, Option<SolveRecord>) {
		let span = info_span!("solve", solve_id = tracing::field::Empty);
		let _enter = span.enter();

		let mut stats = Statistics::default();
		let translate_start = Instant::now();

		if self.bounds.is_fully_trivial() {
			info!("bounds fully trivial, taking fast path");
		}

		let mut factory = Factory::new(self.options.domain, self.options.tnorm);
		let leaves = LeafInterpreter::interpret(&self.bounds, &mut factory, self.options.max_weight);
		stats.primary_var_count = leaves.max_primary_var();

		let mut translator = Translator::new(&mut factory, &leaves);
		let root = match translator.translate_formula(&self.formula) {
			Ok(root) => root,
			Err(e) => return (Outcome::Error(Error::Translation(e)), stats, None),
		};
		stats.cache_hit_rate = translator.cache_stats();
		stats.translation_time = translate_start.elapsed();

		let mut roots = vec![root];
		for block in blocks {
			roots.push(build_blocking_clause(&mut factory, block));
		}

		let emitted = emit_problem(&factory, &roots, self.options.domain);
		stats.function_symbol_count = emitted.declared_vars.len();
		stats.assertion_count = roots.len();
		info!(bytes = emitted.byte_len, "emitted SMT-LIB problem");

		let binary = resolve_binary(self.options.solver, self.options.binary_path.as_deref());
		let mut handle = SolverHandle::new(self.options.solver, binary);

		let solve_start = Instant::now();
		let outcome = handle.solve_with_deadline(&emitted, self.options.incremental, self.options.deadline);
		stats.solving_time = solve_start.elapsed();

		match outcome {
			Ok(SolveOutcome::Unsat) if crate::smt::take_aborted() => {
				(Outcome::Error(Error::Cancellation(CancellationFault::Aborted)), stats, None)
			}
			Ok(SolveOutcome::Unsat) => (Outcome::Unsat, stats, None),
			Ok(SolveOutcome::Sat(model)) => match lift(&leaves, &model, &self.sorts) {
				Ok(instance) => {
					let record = store_last_solved(&self.bounds, &self.options, &model);
					(Outcome::Sat(instance), stats, Some(record))
				}
				Err(e) => (Outcome::Error(Error::Lift(e)), stats, None),
			},
			Err(SolverFailure::Unreachable(ref msg)) if msg == crate::smt::DEADLINE_EXCEEDED => {
				(Outcome::Error(Error::Cancellation(CancellationFault::Timeout)), stats, None)
			}
			Err(_) if crate::smt::take_aborted() => {
				(Outcome::Error(Error::Cancellation(CancellationFault::Aborted)), stats, None)
			}
			Err(SolverFailure::Unknown) => (Outcome::Unknown, stats, None),
			Err(e) => (Outcome::Error(Error::Solver(e)), stats, None),
		}
	}

	/// Obtain an enumerator over every solution, blocking each one found
	/// before re-solving.
	#[must_use]
	pub fn enumerate(self) -> SolutionIterator {
		SolutionIterator::new(self)
	}
}

/// Build a single boolean clause asserting that at least one primary
/// variable `record` assigned takes a different value than it did then:
/// `OR(var != value)` over every `(label, value)` pair. Since a solve's
/// primary-variable labels are allocated deterministically from the same
/// [`Bounds`] in the same order every time, a label recorded by an earlier
/// solve over identical bounds refers to the same logical variable in a
/// fresh [`Factory`].
fn build_blocking_clause(f: &mut Factory, record: &SolveRecord) -> Label {
	let diffs: Vec<Label> = record
		.assigned
		.iter()
		.map(|(raw, value)| {
			let var = Label::from_raw(*raw);
			let constant = f.num_const(model_value_to_const(value));
			f.cmp(CmpOp::Ne, var, constant)
		})
		.collect();
	f.or(diffs)
}

fn store_last_solved(bounds: &Bounds, options: &Options, model: &crate::smt::SolverModel) -> SolveRecord {
	let record = SolveRecord {
		bounds_fingerprint: format!("{bounds:?}"),
		options_fingerprint: format!("{options:?}"),
		assigned: model.iter().map(|(label, value)| (label.raw(), value.clone())).collect(),
	};
	*last_solved().lock().expect("last-solved mutex poisoned") = Some(record.clone());
	record
}

/// Drives enumeration of every solution to a [`Problem`]: each call to
/// [`SolutionIterator::next`] adds a blocking clause for every previously
/// found model and re-solves, until the solver reports `unsat` or `unknown`.
pub struct SolutionIterator {
	problem: Problem,
	exhausted: bool,
	found: Vec<SolveRecord>,
}

impl SolutionIterator {
	fn new(problem: Problem) -> Self {
		SolutionIterator { problem, exhausted: false, found: Vec::new() }
	}
}

impl Iterator for SolutionIterator {
	type Item = (Outcome, Statistics);

	fn next(&mut self) -> Option<Self::Item> {
		if self.exhausted {
			return None;
		}
		let (outcome, stats, record) = self.problem.solve_blocking(&self.found);
		match record {
			Some(record) => self.found.push(record),
			None => self.exhausted = true,
		}
		Some((outcome, stats))
	}
}
