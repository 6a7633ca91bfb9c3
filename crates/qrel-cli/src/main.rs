//! Command-line driver for `qrel`: reads a serialized relational problem,
//! solves or enumerates it against an external SMT solver, and prints the
//! lifted instance (or a bare verdict) one line at a time.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use qrel::{Bounds, Domain, Formula, Options, Outcome, Problem, SolverKind, TNorm};
use serde::Deserialize;
use tracing::{error, info};

/// The on-disk problem format: a formula and the bounds it is checked
/// against. Solver/domain/t-norm/weight/deadline configuration is supplied
/// on the command line rather than embedded in the file, since the same
/// problem is commonly re-run against different solvers and t-norms.
#[derive(Debug, Deserialize)]
struct ProblemFile {
	formula: Formula,
	bounds: Bounds,
}

fn print_usage() {
	eprintln!(
		"usage: qrel --problem <FILE> [--solver z3|mathsat|cvc4|yices] [--domain integer|fuzzy]\n\
		 \t\t[--tnorm godel|lukasiewicz|product|drastic|einstein|add-min|max-product]\n\
		 \t\t[--binary-path <PATH>] [--max-weight <N>] [--no-incremental]\n\
		 \t\t[--deadline <DURATION>] [--enumerate] [--limit <N>]"
	);
}

fn parse_solver(s: &str) -> Result<SolverKind, String> {
	match s {
		"z3" => Ok(SolverKind::Z3),
		"mathsat" => Ok(SolverKind::MathSat),
		"cvc4" => Ok(SolverKind::Cvc4),
		"yices" => Ok(SolverKind::Yices),
		other => Err(format!("unknown solver `{other}'")),
	}
}

fn parse_domain(s: &str) -> Result<Domain, String> {
	match s {
		"integer" => Ok(Domain::Integer),
		"fuzzy" => Ok(Domain::Fuzzy),
		other => Err(format!("unknown domain `{other}'")),
	}
}

fn parse_tnorm(s: &str) -> Result<TNorm, String> {
	match s {
		"godel" => Ok(TNorm::Godel),
		"lukasiewicz" => Ok(TNorm::Lukasiewicz),
		"product" => Ok(TNorm::Product),
		"drastic" => Ok(TNorm::Drastic),
		"einstein" => Ok(TNorm::Einstein),
		"add-min" => Ok(TNorm::AddMin),
		"max-product" => Ok(TNorm::MaxProduct),
		other => Err(format!("unknown t-norm `{other}'")),
	}
}

struct Args {
	problem: PathBuf,
	options: Options,
	enumerate: bool,
	limit: Option<usize>,
}

fn parse_args() -> Result<Args, pico_args::Error> {
	let mut pargs = pico_args::Arguments::from_env();

	if pargs.contains(["-h", "--help"]) {
		print_usage();
		std::process::exit(0);
	}

	let problem: PathBuf = pargs.value_from_str("--problem")?;
	let mut options = Options::default();

	if let Some(s) = pargs.opt_value_from_str::<_, String>("--solver")? {
		options.solver = parse_solver(&s).unwrap_or_else(|e| {
			eprintln!("{e}");
			std::process::exit(2);
		});
	}
	if let Some(s) = pargs.opt_value_from_str::<_, String>("--domain")? {
		options.domain = parse_domain(&s).unwrap_or_else(|e| {
			eprintln!("{e}");
			std::process::exit(2);
		});
	}
	if let Some(s) = pargs.opt_value_from_str::<_, String>("--tnorm")? {
		options.tnorm = parse_tnorm(&s).unwrap_or_else(|e| {
			eprintln!("{e}");
			std::process::exit(2);
		});
	}
	options.binary_path = pargs
		.opt_value_from_str::<_, String>("--binary-path")?
		.map(PathBuf::from);
	options.max_weight = pargs.opt_value_from_str("--max-weight")?;
	options.incremental = !pargs.contains("--no-incremental");
	if let Some(d) = pargs.opt_value_from_str::<_, String>("--deadline")? {
		let parsed: Duration = humantime::parse_duration(&d)
			.unwrap_or_else(|e| {
				eprintln!("invalid --deadline: {e}");
				std::process::exit(2);
			});
		options.deadline = Some(parsed);
	}

	let enumerate = pargs.contains("--enumerate");
	let limit = pargs.opt_value_from_str("--limit")?;

	let remaining = pargs.finish();
	if !remaining.is_empty() {
		eprintln!("unrecognized arguments: {remaining:?}");
		print_usage();
		std::process::exit(2);
	}

	Ok(Args { problem, options, enumerate, limit })
}

fn print_instance(instance: &qrel::Instance) {
	for (name, tuples) in instance.iter() {
		for (index, weight) in tuples {
			println!("{name}[{index}] = {weight:?}");
		}
	}
}

fn print_outcome(outcome: &Outcome) {
	match outcome {
		Outcome::Sat(instance) => {
			println!("sat");
			print_instance(instance);
		}
		Outcome::Unsat => println!("unsat"),
		Outcome::Unknown => println!("unknown"),
		Outcome::Error(e) => {
			println!("error");
			error!(error = %e, "solve failed");
		}
	}
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_timer(tracing_subscriber::fmt::time::uptime())
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let args = match parse_args() {
		Ok(a) => a,
		Err(e) => {
			eprintln!("{e}");
			print_usage();
			return ExitCode::from(2);
		}
	};

	ctrlc::set_handler(move || {
		tracing::warn!("received interrupt, cancelling active solver");
		qrel::cancel_active_solver();
	})
	.expect("failed to install Ctrl-C handler");

	let source = match std::fs::read_to_string(&args.problem) {
		Ok(s) => s,
		Err(e) => {
			eprintln!("could not read {}: {e}", args.problem.display());
			return ExitCode::FAILURE;
		}
	};
	let file: ProblemFile = match serde_json::from_str(&source) {
		Ok(f) => f,
		Err(e) => {
			eprintln!("could not parse {}: {e}", args.problem.display());
			return ExitCode::FAILURE;
		}
	};

	let problem = Problem::new(std::rc::Rc::new(file.formula), file.bounds, args.options);

	let mut exit_code = ExitCode::SUCCESS;
	if args.enumerate {
		let limit = args.limit.unwrap_or(usize::MAX);
		let mut count = 0usize;
		for (outcome, stats) in problem.enumerate() {
			info!(?stats, "solved");
			let is_sat = matches!(outcome, Outcome::Sat(_));
			print_outcome(&outcome);
			if !is_sat {
				if !matches!(outcome, Outcome::Unsat) {
					exit_code = ExitCode::FAILURE;
				}
				break;
			}
			count += 1;
			if count >= limit {
				break;
			}
		}
	} else {
		let (outcome, stats) = problem.solve();
		info!(?stats, "solved");
		if matches!(outcome, Outcome::Error(_)) {
			exit_code = ExitCode::FAILURE;
		}
		print_outcome(&outcome);
	}

	exit_code
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_solver_accepts_every_known_name() {
		assert!(matches!(parse_solver("z3"), Ok(SolverKind::Z3)));
		assert!(matches!(parse_solver("mathsat"), Ok(SolverKind::MathSat)));
		assert!(matches!(parse_solver("cvc4"), Ok(SolverKind::Cvc4)));
		assert!(matches!(parse_solver("yices"), Ok(SolverKind::Yices)));
		assert!(parse_solver("bogus").is_err());
	}

	#[test]
	fn parse_tnorm_accepts_every_known_name() {
		for name in ["godel", "lukasiewicz", "product", "drastic", "einstein", "add-min", "max-product"] {
			assert!(parse_tnorm(name).is_ok(), "{name} should parse");
		}
		assert!(parse_tnorm("bogus").is_err());
	}

	#[test]
	fn parse_domain_rejects_unknown_names() {
		assert!(matches!(parse_domain("integer"), Ok(Domain::Integer)));
		assert!(matches!(parse_domain("fuzzy"), Ok(Domain::Fuzzy)));
		assert!(parse_domain("bogus").is_err());
	}
}
