//! Driving an external SMT solver process: binary resolution, one-shot and
//! incremental invocation, and the per-backend quirk table.

use std::io::Write as _;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::SolverFailure;

use super::emit::EmittedProblem;
use super::model::{parse_model, SolverModel};

/// The satisfiability verdict of one `solve` call, before lifting. `unknown`
/// is reported through [`SolverFailure::Unknown`] rather than as a variant
/// here: it is a distinct terminal state the caller (`problem::Problem`)
/// turns into its own outcome, not a value this layer can usefully carry a
/// payload for.
#[derive(Debug, Clone)]
pub enum SolveOutcome {
	/// The problem is satisfiable; carries the parsed model.
	Sat(SolverModel),
	/// The problem is unsatisfiable under the current assertions.
	Unsat,
}

/// The four external SMT solvers this crate knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SolverKind {
	/// Microsoft's Z3.
	Z3,
	/// MathSAT.
	MathSat,
	/// CVC4.
	Cvc4,
	/// Yices (the `yices-smt2` front end).
	Yices,
}

impl SolverKind {
	/// The default binary name searched for on `PATH`.
	#[must_use]
	pub fn default_binary_name(self) -> &'static str {
		match self {
			SolverKind::Z3 => "z3",
			SolverKind::MathSat => "mathsat",
			SolverKind::Cvc4 => "cvc4",
			SolverKind::Yices => "yices-smt2",
		}
	}

	/// The name of the `<SOLVER>_DIR` environment variable fallback used
	/// when no explicit binary path option is given.
	#[must_use]
	pub fn dir_env_var(self) -> &'static str {
		match self {
			SolverKind::Z3 => "Z3_DIR",
			SolverKind::MathSat => "MATHSAT_DIR",
			SolverKind::Cvc4 => "CVC4_DIR",
			SolverKind::Yices => "YICES_DIR",
		}
	}

	/// Whether this backend supports incremental (push/pop, persistent
	/// stdin/stdout) operation in this crate's invocation style. CVC4's
	/// incremental model-production mode is flaky across versions, so this
	/// crate always drives it one-shot regardless of the `incremental`
	/// option.
	#[must_use]
	pub fn supports_incremental(self) -> bool {
		!matches!(self, SolverKind::Cvc4)
	}

	/// Extra command-line flags this backend needs to behave the way the
	/// rest of this crate assumes (model production on, input read from
	/// stdin in `-in`/`-smt2` style where the backend requires it
	/// explicitly).
	#[must_use]
	pub fn extra_args(self) -> &'static [&'static str] {
		match self {
			SolverKind::Z3 => &["-in", "-smt2"],
			SolverKind::MathSat => &["-input=smt2"],
			SolverKind::Cvc4 => &["--lang=smt2", "--produce-models"],
			SolverKind::Yices => &["--incremental"],
		}
	}
}

/// Resolve a solver binary path: explicit user-supplied path, then the
/// `<SOLVER>_DIR` environment variable joined with the default binary name,
/// then a bare `./<solver>` relative lookup, in that order.
#[must_use]
pub fn resolve_binary(kind: SolverKind, explicit: Option<&std::path::Path>) -> PathBuf {
	if let Some(path) = explicit {
		return path.to_path_buf();
	}
	if let Ok(dir) = std::env::var(kind.dir_env_var()) {
		return PathBuf::from(dir).join(kind.default_binary_name());
	}
	PathBuf::from(format!("./{}", kind.default_binary_name()))
}

/// A live solver process (incremental mode) or the recipe for a one-shot
/// invocation.
pub struct SolverHandle {
	kind: SolverKind,
	binary: PathBuf,
	child: Option<Child>,
}

impl std::fmt::Debug for SolverHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SolverHandle")
			.field("kind", &self.kind)
			.field("binary", &self.binary)
			.field("live", &self.child.is_some())
			.finish()
	}
}

impl SolverHandle {
	/// Construct a handle for the given backend and binary path, without
	/// spawning a process yet.
	#[must_use]
	pub fn new(kind: SolverKind, binary: PathBuf) -> Self {
		SolverHandle { kind, binary, child: None }
	}

	/// Run the emitted problem to completion and parse the resulting model,
	/// choosing incremental (persistent process, reused across `next()`
	/// calls) or one-shot (fresh temp file per call) invocation according to
	/// the backend's support and the caller's preference.
	pub fn solve(&mut self, problem: &EmittedProblem, incremental: bool) -> Result<SolveOutcome, SolverFailure> {
		if incremental && self.kind.supports_incremental() {
			self.solve_incremental(problem)
		} else {
			self.solve_one_shot(problem)
		}
	}

	fn spawn(&self) -> Result<Child, SolverFailure> {
		debug!(solver = ?self.kind, binary = %self.binary.display(), "spawning solver process");
		let child = Command::new(&self.binary)
			.args(self.kind.extra_args())
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.spawn()
			.map_err(|e| SolverFailure::Unreachable(format!("{}: {e}", self.binary.display())))?;
		ACTIVE_PID.store(child.id(), Ordering::SeqCst);
		Ok(child)
	}

	fn solve_incremental(&mut self, problem: &EmittedProblem) -> Result<SolveOutcome, SolverFailure> {
		if self.child.is_none() {
			self.child = Some(self.spawn()?);
		}
		let child = self.child.as_mut().expect("just ensured child is spawned");
		let stdin = child.stdin.as_mut().expect("piped stdin");
		trace!(bytes = problem.byte_len, "writing incremental SMT-LIB source");
		stdin.write_all(problem.source.as_bytes())?;
		stdin.flush()?;
		// In true incremental mode a persistent process would be read
		// line-by-line after each `(check-sat)`; this crate instead treats
		// every `solve` call as a complete script against the live process,
		// matching the one-writer-per-process lifecycle in §5.
		self.read_response()
	}

	fn solve_one_shot(&mut self, problem: &EmittedProblem) -> Result<SolveOutcome, SolverFailure> {
		let mut child = self.spawn()?;
		{
			let stdin = child.stdin.as_mut().expect("piped stdin");
			stdin.write_all(problem.source.as_bytes())?;
		}
		let output = child.wait_with_output()?;
		if !output.status.success() && output.stdout.is_empty() {
			return Err(SolverFailure::UnexpectedExit(format!("{:?}", output.status)));
		}
		let stdout = String::from_utf8_lossy(&output.stdout);
		let stderr = String::from_utf8_lossy(&output.stderr);
		interpret_output(&stdout, &stderr)
	}

	fn read_response(&mut self) -> Result<SolveOutcome, SolverFailure> {
		use std::io::Read as _;
		let child = self.child.as_mut().expect("live child for incremental read");
		let stdout = child.stdout.as_mut().expect("piped stdout");
		let mut buf = String::new();
		stdout.read_to_string(&mut buf).map_err(SolverFailure::Io)?;
		interpret_output(&buf, "")
	}

	/// Kill the live subprocess, if any, at the OS level. Called on deadline
	/// expiry per §5's cancellation contract, leaving translator state
	/// intact.
	pub fn kill(&mut self) {
		if let Some(mut child) = self.child.take() {
			let _ = child.kill();
			let _ = child.wait();
		}
		ACTIVE_PID.store(0, Ordering::SeqCst);
	}

	/// As [`SolverHandle::solve`], but races the call against a wall-clock
	/// budget: a watchdog thread kills the subprocess at the OS level if it
	/// is still running once the deadline elapses, which unblocks the
	/// in-progress read or wait and turns it into
	/// [`SolverFailure::Unreachable`] with the sentinel message
	/// [`DEADLINE_EXCEEDED`]; the caller is expected to recognize that
	/// message and report [`crate::error::CancellationFault::Timeout`]
	/// instead of an ordinary solver error.
	pub fn solve_with_deadline(
		&mut self,
		problem: &EmittedProblem,
		incremental: bool,
		deadline: Option<Duration>,
	) -> Result<SolveOutcome, SolverFailure> {
		let Some(budget) = deadline else {
			return self.solve(problem, incremental);
		};
		if self.child.is_none() {
			self.child = Some(self.spawn()?);
		}
		let pid = self.child.as_ref().expect("just ensured child is spawned").id();
		let finished = Arc::new(AtomicBool::new(false));
		let timed_out = Arc::new(AtomicBool::new(false));
		let watchdog = {
			let finished = Arc::clone(&finished);
			let timed_out = Arc::clone(&timed_out);
			std::thread::spawn(move || {
				std::thread::sleep(budget);
				if !finished.load(Ordering::SeqCst) {
					timed_out.store(true, Ordering::SeqCst);
					warn!(pid, "solve deadline exceeded, killing solver process");
					kill_pid(pid);
				}
			})
		};

		let result = self.solve(problem, incremental);
		finished.store(true, Ordering::SeqCst);
		let _ = watchdog.join();

		if timed_out.load(Ordering::SeqCst) {
			return Err(SolverFailure::Unreachable(DEADLINE_EXCEEDED.to_string()));
		}
		result
	}
}

/// The sentinel message a deadline-triggered kill reports through
/// [`SolverFailure::Unreachable`], distinguishing it from an ordinary spawn
/// failure for callers that want to treat it as a cancellation instead.
pub const DEADLINE_EXCEEDED: &str = "solve deadline exceeded";

/// The OS pid of the currently live solver subprocess, `0` when none is
/// running. Lets an out-of-band signal handler (a `ctrlc` callback in the
/// CLI, say) kill the active solve without holding a reference to the
/// [`SolverHandle`] that owns it.
static ACTIVE_PID: AtomicU32 = AtomicU32::new(0);

/// Set by [`cancel_active_solver`], read (and cleared) by the caller of
/// `solve`/`solve_with_deadline` to tell an out-of-band abort apart from an
/// ordinary solver failure.
static ABORTED: AtomicBool = AtomicBool::new(false);

/// Kill whatever solver subprocess is currently live, if any. Intended to be
/// called from a signal handler outside the normal `solve` call stack; a
/// concurrent `solve_with_deadline` watchdog racing this call is harmless,
/// since killing an already-dead pid is a no-op.
pub fn cancel_active_solver() {
	let pid = ACTIVE_PID.swap(0, Ordering::SeqCst);
	if pid != 0 {
		ABORTED.store(true, Ordering::SeqCst);
		warn!(pid, "cancelling active solver process");
		kill_pid(pid);
	}
}

/// Whether the most recent solve was cut short by [`cancel_active_solver`],
/// clearing the flag so a later solve is not misreported as aborted.
#[must_use]
pub fn take_aborted() -> bool {
	ABORTED.swap(false, Ordering::SeqCst)
}

#[cfg(unix)]
fn kill_pid(pid: u32) {
	let _ = Command::new("kill").arg("-9").arg(pid.to_string()).status();
}

#[cfg(not(unix))]
fn kill_pid(pid: u32) {
	let _ = Command::new("taskkill").args(["/PID", &pid.to_string(), "/F"]).status();
}

impl Drop for SolverHandle {
	fn drop(&mut self) {
		self.kill();
	}
}

fn interpret_output(stdout: &str, stderr: &str) -> Result<SolveOutcome, SolverFailure> {
	let trimmed = stdout.trim_start();
	if trimmed.starts_with("unsat") {
		return Ok(SolveOutcome::Unsat);
	}
	if trimmed.starts_with("unknown") {
		return Err(SolverFailure::Unknown);
	}
	if !trimmed.starts_with("sat") {
		return Err(SolverFailure::Protocol {
			message: format!("unrecognized solver response head: {:?}", &trimmed[..trimmed.len().min(32)]),
			stderr: stderr.to_string(),
		});
	}
	parse_model(stdout, stderr).map(SolveOutcome::Sat)
}
