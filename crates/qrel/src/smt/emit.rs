//! SMT-LIB v2.6 serialization of a scalar circuit.

use std::collections::{HashMap, HashSet};

use crate::factory::Factory;
use crate::scalar::{BoolOp, CmpOp, Label, NumAritOp, NumChoiceOp, NumConst, NumConstraint, NumUnaryOp, Scalar};
use crate::semiring::Domain;

/// A fully serialized SMT-LIB problem, ready to be written to a solver's
/// stdin (incremental mode) or a temp file (one-shot mode).
#[derive(Debug, Clone)]
pub struct EmittedProblem {
	/// The complete SMT-LIB v2.6 source, ending in `(check-sat)`.
	pub source: String,
	/// The length of `source`, recorded eagerly for the emission-size
	/// logging event named in the ambient-stack section.
	pub byte_len: usize,
	/// Every primary-variable label that was declared, in declaration order;
	/// used to build `(get-value (...))` requests and to parse the model
	/// back.
	pub declared_vars: Vec<Label>,
}

/// Serialize a list of root boolean assertions plus a domain tag into a
/// complete SMT-LIB v2.6 script: `(set-logic ...)`, function-symbol
/// declarations, the root/fixed-point/range assertions, a single
/// division-by-zero guard, then `(check-sat)` and `(get-model)`.
pub fn emit_problem(factory: &Factory, roots: &[Label], domain: Domain) -> EmittedProblem {
	let logic = match domain {
		Domain::Integer => "QF_LIA",
		Domain::Fuzzy => "QF_NRA",
	};

	let mut declared: HashSet<Label> = HashSet::new();
	let mut declared_vars = Vec::new();
	let mut term_cache: HashMap<Label, String> = HashMap::new();
	let mut div_guards: Vec<String> = Vec::new();

	let mut decls = String::new();
	let mut asserts = String::new();

	for &root in roots {
		let term = to_term(
			factory,
			root,
			domain,
			&mut term_cache,
			&mut declared,
			&mut declared_vars,
			&mut decls,
			&mut div_guards,
		);
		asserts.push_str(&format!("(assert {term})\n"));
	}

	let mut source = String::new();
	source.push_str(&format!("(set-logic {logic})\n"));
	source.push_str(&decls);
	source.push_str(&asserts);
	if !div_guards.is_empty() {
		let guard = if div_guards.len() == 1 {
			div_guards[0].clone()
		} else {
			format!("(and {})", div_guards.join(" "))
		};
		source.push_str(&format!("(assert {guard})\n"));
	}
	source.push_str("(check-sat)\n");
	source.push_str("(get-model)\n");

	let byte_len = source.len();
	EmittedProblem { source, byte_len, declared_vars }
}

fn var_name(label: Label) -> String {
	format!("v{}", label.raw())
}

#[allow(clippy::too_many_arguments)]
fn to_term(
	f: &Factory,
	label: Label,
	domain: Domain,
	cache: &mut HashMap<Label, String>,
	declared: &mut HashSet<Label>,
	declared_vars: &mut Vec<Label>,
	decls: &mut String,
	div_guards: &mut Vec<String>,
) -> String {
	if let Some(term) = cache.get(&label) {
		return term.clone();
	}
	let sort = match domain {
		Domain::Integer => "Int",
		Domain::Fuzzy => "Real",
	};

	let term = match f.resolve(label).clone() {
		Scalar::BoolConst(b) => if b { "true".to_string() } else { "false".to_string() },
		Scalar::NumConst(NumConst::Int(n)) => {
			if n < 0 {
				format!("(- {})", -n)
			} else {
				n.to_string()
			}
		}
		Scalar::NumConst(NumConst::Fuzzy(d)) => d.to_string(),
		Scalar::BoolVar(_) => {
			declare_once(label, "Bool", declared, declared_vars, decls);
			var_name(label)
		}
		Scalar::NumVar { constraint, max_value, allowed_values } => {
			if declare_once(label, sort, declared, declared_vars, decls) {
				emit_num_var_constraint(label, constraint, max_value, allowed_values.as_deref(), domain, decls);
			}
			var_name(label)
		}
		Scalar::BoolGate(op, args) => {
			let arg_terms: Vec<String> = args
				.iter()
				.map(|&a| to_term(f, a, domain, cache, declared, declared_vars, decls, div_guards))
				.collect();
			match op {
				BoolOp::And => format!("(and {})", arg_terms.join(" ")),
				BoolOp::Or => format!("(or {})", arg_terms.join(" ")),
				BoolOp::Not => format!("(not {})", arg_terms[0]),
				BoolOp::Ite => format!("(ite {} {} {})", arg_terms[0], arg_terms[1], arg_terms[2]),
			}
		}
		Scalar::NumAritGate(op, args) => {
			let arg_terms: Vec<String> = args
				.iter()
				.map(|&a| to_term(f, a, domain, cache, declared, declared_vars, decls, div_guards))
				.collect();
			if op == NumAritOp::Div || op == NumAritOp::Mod {
				let divisor = arg_terms[1].clone();
				div_guards.push(format!("(not (= {divisor} 0))"));
			}
			let op_sym = match op {
				NumAritOp::Plus => "+",
				NumAritOp::Minus => "-",
				NumAritOp::Times => "*",
				NumAritOp::Div => match domain {
					Domain::Integer => "div",
					Domain::Fuzzy => "/",
				},
				NumAritOp::Mod => "mod",
			};
			format!("({op_sym} {})", arg_terms.join(" "))
		}
		Scalar::NumChoiceGate { op, left, right, condition } => {
			let l = to_term(f, left, domain, cache, declared, declared_vars, decls, div_guards);
			let r = to_term(f, right, domain, cache, declared, declared_vars, decls, div_guards);
			match op {
				NumChoiceOp::Min => format!("(ite (<= {l} {r}) {l} {r})"),
				NumChoiceOp::Max => format!("(ite (>= {l} {r}) {l} {r})"),
				NumChoiceOp::Ite => {
					let c = condition.expect("Ite choice gate always carries a condition");
					let cterm = to_term(f, c, domain, cache, declared, declared_vars, decls, div_guards);
					format!("(ite {cterm} {l} {r})")
				}
			}
		}
		Scalar::NumUnaryGate(op, inner) => {
			let i = to_term(f, inner, domain, cache, declared, declared_vars, decls, div_guards);
			match op {
				NumUnaryOp::Neg => format!("(- {i})"),
				NumUnaryOp::Abs => format!("(ite (>= {i} 0) {i} (- {i}))"),
				NumUnaryOp::Sgn => format!("(ite (= {i} 0) 0 (ite (> {i} 0) 1 (- 1)))"),
			}
		}
		Scalar::CmpGate(op, left, right) => {
			let l = to_term(f, left, domain, cache, declared, declared_vars, decls, div_guards);
			let r = to_term(f, right, domain, cache, declared, declared_vars, decls, div_guards);
			let op_sym = match op {
				CmpOp::Eq => "=",
				CmpOp::Ne => return format!("(not (= {l} {r}))"),
				CmpOp::Lt => "<",
				CmpOp::Le => "<=",
				CmpOp::Gt => ">",
				CmpOp::Ge => ">=",
			};
			format!("({op_sym} {l} {r})")
		}
		Scalar::BinaryValue { bool_side, .. } => {
			let b = to_term(f, bool_side, domain, cache, declared, declared_vars, decls, div_guards);
			format!("(ite {b} 1 0)")
		}
	};

	let _ = cache.insert(label, term.clone());
	term
}

fn declare_once(
	label: Label,
	sort: &str,
	declared: &mut HashSet<Label>,
	declared_vars: &mut Vec<Label>,
	decls: &mut String,
) -> bool {
	if declared.insert(label) {
		declared_vars.push(label);
		decls.push_str(&format!("(declare-fun {} () {sort})\n", var_name(label)));
		true
	} else {
		false
	}
}

/// Emit the range/constraint assertions a declared primary variable carries:
/// `0 <= v <= 1` in the fuzzy domain, `0 <= v` (and `v <= maxWeight` if
/// bounded) in the integer domain, plus whatever `NumConstraint` or explicit
/// enumeration the variable was allocated under.
fn emit_num_var_constraint(
	label: Label,
	constraint: NumConstraint,
	max_value: Option<i64>,
	allowed_values: Option<&[NumConst]>,
	domain: Domain,
	decls: &mut String,
) {
	let name = var_name(label);
	decls.push_str(&format!("(assert (>= {name} 0))\n"));
	let upper = match domain {
		Domain::Fuzzy => Some("1".to_string()),
		Domain::Integer => max_value.map(|m| m.to_string()),
	};
	if let Some(upper) = upper {
		decls.push_str(&format!("(assert (<= {name} {upper}))\n"));
	}
	match constraint {
		NumConstraint::Free => {}
		NumConstraint::NonZero => decls.push_str(&format!("(assert (not (= {name} 0)))\n")),
		NumConstraint::Zero => decls.push_str(&format!("(assert (= {name} 0))\n")),
	}
	if let Some(values) = allowed_values {
		let disjuncts: Vec<String> = values
			.iter()
			.map(|v| match v {
				NumConst::Int(n) if *n < 0 => format!("(= {name} (- {}))", -n),
				NumConst::Int(n) => format!("(= {name} {n})"),
				NumConst::Fuzzy(d) => format!("(= {name} {d})"),
			})
			.collect();
		decls.push_str(&format!("(assert (or {}))\n", disjuncts.join(" ")));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory::Factory;
	use crate::semiring::TNorm;

	#[test]
	fn emits_set_logic_and_check_sat() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let x = f.fresh_bool_var();
		let emitted = emit_problem(&f, &[x], Domain::Integer);
		assert!(emitted.source.starts_with("(set-logic QF_LIA)"));
		assert!(emitted.source.contains("(check-sat)"));
		assert!(emitted.source.contains("(declare-fun v0 () Bool)"));
	}

	#[test]
	fn full_script_for_a_conjunction_of_two_bools() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let x = f.fresh_bool_var();
		let y = f.fresh_bool_var();
		let root = f.and([x, y]);
		let emitted = emit_problem(&f, &[root], Domain::Integer);
		expect_test::expect![[r#"
            (set-logic QF_LIA)
            (declare-fun v0 () Bool)
            (declare-fun v1 () Bool)
            (assert (and v0 v1))
            (check-sat)
            (get-model)
        "#]]
		.assert_eq(&emitted.source);
	}

	#[test]
	fn division_emits_a_single_guard() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let a = f.fresh_num_var(crate::scalar::NumConstraint::Free, None, None);
		let b = f.fresh_num_var(crate::scalar::NumConstraint::Free, None, None);
		let q = f.divide(a, b).unwrap();
		let cond = f.cmp(CmpOp::Eq, q, f.zero());
		let emitted = emit_problem(&f, &[cond], Domain::Integer);
		assert!(emitted.source.contains("(not (= v1 0))"));
	}
}
