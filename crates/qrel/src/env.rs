//! The translation environment (C4): a stack of frames binding relational
//! variables to matrices, with a polarity flipped on entry to a negation.

use std::collections::HashMap;

use crate::ast::Variable;
use crate::matrix::Matrix;

/// The active truth-value orientation of the formula currently being
/// translated, used by the leaf interpreter to decide whether an
/// under-constrained primary variable should default open (`Some`, may be
/// made true to satisfy the formula) or closed (`All`, must be made true to
/// avoid vacuous falsification). Flipped by [`Env::enter_negation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
	/// Under a universal/negated-existential context.
	All,
	/// Under an existential/negated-universal context.
	Some,
}

impl Polarity {
	/// The opposite polarity.
	#[must_use]
	pub fn flipped(self) -> Polarity {
		match self {
			Polarity::All => Polarity::Some,
			Polarity::Some => Polarity::All,
		}
	}
}

/// One frame of the environment stack: a binding map plus the polarity in
/// effect when the frame was pushed.
#[derive(Debug, Clone, Default)]
struct Frame {
	bindings: HashMap<Variable, Matrix>,
	polarity: Option<Polarity>,
}

/// The translator's variable environment: a stack of frames, the top of
/// which is searched first on lookup.
#[derive(Debug, Clone)]
pub struct Env {
	frames: Vec<Frame>,
}

impl Default for Env {
	fn default() -> Self {
		Self::new()
	}
}

impl Env {
	/// Construct an environment with a single root frame at [`Polarity::Some`].
	#[must_use]
	pub fn new() -> Self {
		Env { frames: vec![Frame { bindings: HashMap::new(), polarity: Some(Polarity::Some) }] }
	}

	/// The polarity of the innermost frame that declares one, defaulting to
	/// [`Polarity::Some`] if none has.
	#[must_use]
	pub fn polarity(&self) -> Polarity {
		self.frames
			.iter()
			.rev()
			.find_map(|frame| frame.polarity)
			.unwrap_or(Polarity::Some)
	}

	/// Push a fresh frame with the current polarity flipped, for the
	/// duration of translating a negation's operand. Pair with
	/// [`Env::exit_negation`].
	pub fn enter_negation(&mut self) {
		let flipped = self.polarity().flipped();
		self.frames.push(Frame { bindings: HashMap::new(), polarity: Some(flipped) });
	}

	/// Pop the frame pushed by the matching [`Env::enter_negation`].
	pub fn exit_negation(&mut self) {
		let _ = self.frames.pop();
	}

	/// Push a fresh binding frame for a quantifier or comprehension's
	/// declarations, inheriting the current polarity.
	pub fn push_bindings(&mut self) {
		self.frames.push(Frame { bindings: HashMap::new(), polarity: None });
	}

	/// Pop the frame pushed by the matching [`Env::push_bindings`].
	pub fn pop_bindings(&mut self) {
		let _ = self.frames.pop();
	}

	/// Bind a variable to a matrix in the innermost frame.
	pub fn bind(&mut self, variable: Variable, value: Matrix) {
		let frame = self.frames.last_mut().expect("environment always has a root frame");
		let _ = frame.bindings.insert(variable, value);
	}

	/// Look up a variable, searching from the innermost frame outward.
	#[must_use]
	pub fn lookup(&self, variable: &Variable) -> Option<&Matrix> {
		self.frames.iter().rev().find_map(|frame| frame.bindings.get(variable))
	}

	/// The current nesting depth, used by the translation cache to judge
	/// whether a node's free variables are strictly below the innermost
	/// quantifier (and therefore safe to cache).
	#[must_use]
	pub fn depth(&self) -> usize {
		self.frames.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::factory::Factory;
	use crate::semiring::{Domain, TNorm};

	#[test]
	fn negation_flips_and_restores_polarity() {
		let mut env = Env::new();
		assert_eq!(env.polarity(), Polarity::Some);
		env.enter_negation();
		assert_eq!(env.polarity(), Polarity::All);
		env.enter_negation();
		assert_eq!(env.polarity(), Polarity::Some);
		env.exit_negation();
		assert_eq!(env.polarity(), Polarity::All);
		env.exit_negation();
		assert_eq!(env.polarity(), Polarity::Some);
	}

	#[test]
	fn lookup_searches_innermost_frame_first() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let mut env = Env::new();
		let v = Variable("x".to_string());
		let outer = Matrix::empty(vec![2], f.id());
		env.bind(v.clone(), outer);
		env.push_bindings();
		let inner = Matrix::empty(vec![3], f.id());
		env.bind(v.clone(), inner.clone());
		assert_eq!(env.lookup(&v).unwrap().dims(), inner.dims());
		env.pop_bindings();
		assert_eq!(env.lookup(&v).unwrap().dims(), &[2]);
		let _ = &mut f;
	}
}
