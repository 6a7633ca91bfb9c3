//! Parsing of a solver's `(get-model)` response back into per-variable
//! values, keyed by the primary-variable label recovered from each
//! `define-fun` identifier.

use std::collections::HashMap;

use crate::error::SolverFailure;
use crate::scalar::Label;

/// A single variable's value as reported by the solver, dispatched by the
/// sort the solver printed it under.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelValue {
	/// A `Bool`-sorted value.
	Bool(bool),
	/// An `Int`-sorted value.
	Int(i64),
	/// A `Real`-sorted value, retaining the solver's exact fraction syntax
	/// (e.g. `(/ 1 3)`) alongside the parsed decimal, so that the same exact
	/// text can be re-emitted verbatim when blocking this solution.
	Real {
		/// The decimal value, parsed for arithmetic use elsewhere in the
		/// pipeline.
		decimal: rust_decimal::Decimal,
		/// The original SMT-LIB term text, retained for exact reuse.
		exact_text: String,
	},
}

/// The full parsed model: a map from primary-variable label to its value.
#[derive(Debug, Clone, Default)]
pub struct SolverModel {
	values: HashMap<Label, ModelValue>,
}

impl SolverModel {
	/// The value bound to a primary-variable label, if the model assigned
	/// one.
	#[must_use]
	pub fn get(&self, label: Label) -> Option<&ModelValue> {
		self.values.get(&label)
	}

	/// Iterate every (label, value) pair in the model.
	pub fn iter(&self) -> impl Iterator<Item = (Label, &ModelValue)> {
		self.values.iter().map(|(&l, v)| (l, v))
	}
}

/// Parse a solver's raw stdout (the response to `(check-sat)(get-model)`)
/// into a [`SolverModel`].
///
/// Recognizes one `(define-fun vN () <Sort> <value>)` per declared variable,
/// tolerating the minor syntactic variance between Z3, MathSAT, CVC4, and
/// Yices output (CVC4 wraps the whole model in `(model ...)`; Yices omits
/// the wrapper and may print `(= vN value)` assignments instead).
pub fn parse_model(stdout: &str, stderr: &str) -> Result<SolverModel, SolverFailure> {
	let mut values = HashMap::new();
	let tokens = tokenize(stdout);
	let mut i = 0;
	while i < tokens.len() {
		if tokens[i] == "define-fun" {
			let (label, value, consumed) = parse_define_fun(&tokens, i).ok_or_else(|| {
				SolverFailure::Protocol {
					message: "malformed define-fun".to_string(),
					stderr: stderr.to_string(),
				}
			})?;
			let _ = values.insert(label, value);
			i += consumed;
		} else {
			i += 1;
		}
	}
	Ok(SolverModel { values })
}

/// A minimal s-expression tokenizer: splits on parens and whitespace,
/// keeping parens as their own tokens. Sufficient for the flat
/// `define-fun` forms solvers emit for `(get-model)`.
fn tokenize(input: &str) -> Vec<String> {
	let mut tokens = Vec::new();
	let mut current = String::new();
	for ch in input.chars() {
		match ch {
			'(' | ')' => {
				if !current.is_empty() {
					tokens.push(std::mem::take(&mut current));
				}
				tokens.push(ch.to_string());
			}
			c if c.is_whitespace() => {
				if !current.is_empty() {
					tokens.push(std::mem::take(&mut current));
				}
			}
			c => current.push(c),
		}
	}
	if !current.is_empty() {
		tokens.push(current);
	}
	tokens
}

fn parse_label(name: &str) -> Option<Label> {
	let digits = name.strip_prefix('v')?;
	digits.parse::<u64>().ok().map(Label::from_raw)
}

/// Parse one `define-fun` form starting at the `define-fun` token itself
/// (not the opening paren), returning the label, value, and number of
/// tokens consumed including the token this call started at.
fn parse_define_fun(tokens: &[String], start: usize) -> Option<(Label, super::ModelValue, usize)> {
	// tokens[start] == "define-fun"; tokens[start+1] == name;
	// tokens[start+2] == "("; tokens[start+3] == ")"; tokens[start+4] == sort;
	// then the value expression up to its matching close paren.
	let name = tokens.get(start + 1)?;
	let label = parse_label(name)?;
	let sort = tokens.get(start + 4)?;
	let value_start = start + 5;
	let (value_tokens, end) = read_balanced_or_atom(tokens, value_start)?;
	let value = match sort.as_str() {
		"Bool" => super::ModelValue::Bool(value_tokens.join(" ") == "true"),
		"Int" => super::ModelValue::Int(parse_int_term(&value_tokens)?),
		"Real" => {
			let text = value_tokens.join(" ");
			let decimal = parse_real_term(&value_tokens)?;
			super::ModelValue::Real { decimal, exact_text: text }
		}
		_ => return None,
	};
	// Consume through the outer close paren of the define-fun form itself.
	let consumed = end.saturating_sub(start) + 1;
	Some((label, value, consumed))
}

fn read_balanced_or_atom(tokens: &[String], start: usize) -> Option<(Vec<String>, usize)> {
	if tokens.get(start)? == "(" {
		let mut depth = 0i32;
		let mut end = start;
		for (i, t) in tokens.iter().enumerate().skip(start) {
			if t == "(" {
				depth += 1;
			} else if t == ")" {
				depth -= 1;
				if depth == 0 {
					end = i;
					break;
				}
			}
		}
		Some((tokens[start..=end].to_vec(), end))
	} else {
		Some((vec![tokens[start].clone()], start))
	}
}

fn parse_int_term(tokens: &[String]) -> Option<i64> {
	if tokens.len() == 1 {
		return tokens[0].parse().ok();
	}
	// `(- N)` negative literal form.
	if tokens.len() == 3 && tokens[0] == "(" && tokens[1] == "-" {
		return None;
	}
	if tokens.len() == 4 && tokens[0] == "(" && tokens[1] == "-" {
		return tokens[2].parse::<i64>().ok().map(|n| -n);
	}
	None
}

fn parse_real_term(tokens: &[String]) -> Option<rust_decimal::Decimal> {
	if tokens.len() == 1 {
		return tokens[0].parse().ok();
	}
	if tokens.len() == 4 && tokens[1] == "/" {
		let num: rust_decimal::Decimal = tokens[2].parse().ok()?;
		let den: rust_decimal::Decimal = tokens[3].parse().ok()?;
		if den.is_zero() {
			return None;
		}
		return Some(num / den);
	}
	if tokens.len() == 5 && tokens[1] == "-" {
		// `(- (/ N D))`, the form solvers print for negative fractions.
		let inner = parse_real_term(&tokens[2..5])?;
		return Some(-inner);
	}
	None
}

impl Label {
	/// Construct a label from its raw integer value, used when recovering a
	/// primary-variable label from a solver's printed identifier.
	pub(crate) fn from_raw(raw: u64) -> Label {
		Label(raw)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_bool_and_int_define_funs() {
		let stdout = "sat\n(model\n(define-fun v0 () Bool true)\n(define-fun v1 () Int 3)\n)";
		let model = parse_model(stdout, "").unwrap();
		assert_eq!(model.get(Label::from_raw(0)), Some(&ModelValue::Bool(true)));
		assert_eq!(model.get(Label::from_raw(1)), Some(&ModelValue::Int(3)));
	}

	#[test]
	fn parses_negative_int() {
		let stdout = "(define-fun v2 () Int (- 4))";
		let model = parse_model(stdout, "").unwrap();
		assert_eq!(model.get(Label::from_raw(2)), Some(&ModelValue::Int(-4)));
	}

	#[test]
	fn parses_exact_fraction_real() {
		let stdout = "(define-fun v3 () Real (/ 1 3))";
		let model = parse_model(stdout, "").unwrap();
		match model.get(Label::from_raw(3)) {
			Some(ModelValue::Real { exact_text, .. }) => assert_eq!(exact_text, "( / 1 3 )"),
			other => panic!("unexpected: {other:?}"),
		}
	}
}
