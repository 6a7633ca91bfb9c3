//! The leaf interpreter (C3): allocates primary variables per relation under
//! its declared bounds, and realizes the built-in constant relations
//! (`UNIV`, `IDEN`, `NONE`, `INTS`, integer literals).

use std::collections::{BTreeMap, HashMap};

use crate::bounds::{Bounds, Sort};
use crate::factory::Factory;
use crate::matrix::Matrix;
use crate::scalar::{Label, NumConstraint};

/// The flattened coordinate set and realized matrix for one interpreted
/// relation, retained so lift-back (C6) can associate a model's fresh
/// variables with the relation's tuple indices.
#[derive(Debug, Clone)]
pub struct RelationRealization {
	/// The matrix realizing the relation's current (pre-solve) value.
	pub matrix: Matrix,
	/// The upper-bound flat indices, in allocation order, that carry a fresh
	/// primary variable (as opposed to a fixed lower-bound constant).
	pub free_indices: Vec<u64>,
	/// The primary variable label allocated for each entry of `free_indices`,
	/// same order.
	pub primary_vars: Vec<Label>,
}

/// The leaf interpreter: immutable once constructed, built from a set of
/// [`Bounds`] and a [`Factory`] to allocate into.
#[derive(Debug)]
pub struct LeafInterpreter {
	universe_size: usize,
	relations: HashMap<String, RelationRealization>,
	max_primary_var: u64,
}

impl LeafInterpreter {
	/// Allocate primary variables for every relation in `bounds`, in the
	/// bounds' deterministic (lexicographic) relation order. `max_weight`
	/// bounds the magnitude of every quantitative primary variable, if set.
	pub fn interpret(bounds: &Bounds, f: &mut Factory, max_weight: Option<i64>) -> Self {
		let universe_size = bounds.universe().size();
		let mut relations = HashMap::new();
		let mut max_primary_var = 0u64;

		for (name, rb) in bounds.iter() {
			let mut cells = BTreeMap::new();
			let mut free_indices = Vec::new();
			let mut primary_vars = Vec::new();

			for &index in &rb.upper {
				if rb.lower.contains(&index) {
					let label = match rb.sort {
						Sort::Boolean => f.one(),
						Sort::Quantitative => {
							let v = f.fresh_num_var(NumConstraint::NonZero, max_weight, None);
							max_primary_var = max_primary_var.max(v.raw());
							v
						}
					};
					let _ = cells.insert(index, label);
				} else {
					let label = match rb.sort {
						Sort::Boolean => {
							let b = f.fresh_bool_var();
							f.binary_value(b)
						}
						Sort::Quantitative => f.fresh_num_var(NumConstraint::Free, max_weight, None),
					};
					max_primary_var = max_primary_var.max(label.raw());
					free_indices.push(index);
					primary_vars.push(label);
					let _ = cells.insert(index, label);
				}
			}

			let dims = vec![universe_size; rb.arity as usize];
			let matrix = Matrix::from_cells(dims, f.id(), cells, f);
			let _ = relations.insert(
				name.to_string(),
				RelationRealization { matrix, free_indices, primary_vars },
			);
		}

		LeafInterpreter { universe_size, relations, max_primary_var }
	}

	/// The realization of a declared relation, if any.
	#[must_use]
	pub fn relation(&self, name: &str) -> Option<&RelationRealization> {
		self.relations.get(name)
	}

	/// Iterate every realized relation.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationRealization)> {
		self.relations.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// The highest primary-variable label allocated, for statistics.
	#[must_use]
	pub fn max_primary_var(&self) -> u64 {
		self.max_primary_var
	}

	/// The universe (unary, all atoms present) constant.
	#[must_use]
	pub fn univ(&self, f: &mut Factory) -> Matrix {
		let mut cells = BTreeMap::new();
		for i in 0..self.universe_size {
			let _ = cells.insert(i as u64, f.one());
		}
		Matrix::from_cells(vec![self.universe_size], f.id(), cells, f)
	}

	/// The identity binary relation constant.
	#[must_use]
	pub fn iden(&self, f: &mut Factory) -> Matrix {
		Matrix::identity(self.universe_size, f.id(), f)
	}

	/// The empty relation of the given arity.
	#[must_use]
	pub fn none(&self, arity: u32, f: &Factory) -> Matrix {
		Matrix::empty(vec![self.universe_size; arity as usize], f.id())
	}

	/// The set of declared integer atoms, identified with the whole universe
	/// in this crate's atom model (a relation whose universe is exactly the
	/// integers in range is the common case for the quantitative scenarios
	/// in §8).
	#[must_use]
	pub fn ints(&self, f: &mut Factory) -> Matrix {
		self.univ(f)
	}

	/// A single integer constant lifted to a unary relation containing just
	/// the atom at that index, if it is within the universe.
	#[must_use]
	pub fn const_int(&self, atom: usize, f: &mut Factory) -> Matrix {
		let mut cells = BTreeMap::new();
		if atom < self.universe_size {
			let _ = cells.insert(atom as u64, f.one());
		}
		Matrix::from_cells(vec![self.universe_size], f.id(), cells, f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bounds::{RelationBounds, Universe};
	use crate::semiring::{Domain, TNorm};
	use std::collections::BTreeSet;

	#[test]
	fn lower_bound_boolean_tuples_are_fixed_true() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let mut bounds = Bounds::new(Universe::new(3));
		let lower = BTreeSet::from([0u64]);
		let upper = BTreeSet::from([0u64, 1u64]);
		let rb = RelationBounds::new(1, Sort::Boolean, lower, upper, "R").unwrap();
		bounds.declare("R", rb);
		let leaf = LeafInterpreter::interpret(&bounds, &mut f, None);
		let r = leaf.relation("R").unwrap();
		assert_eq!(r.matrix.get(0), f.one());
		assert_eq!(r.free_indices, vec![1]);
	}

	#[test]
	fn quantitative_lower_bound_gets_nonzero_var() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let mut bounds = Bounds::new(Universe::new(2));
		let lower = BTreeSet::from([0u64]);
		let upper = BTreeSet::from([0u64]);
		let rb = RelationBounds::new(1, Sort::Quantitative, lower, upper, "W").unwrap();
		bounds.declare("W", rb);
		let leaf = LeafInterpreter::interpret(&bounds, &mut f, None);
		let r = leaf.relation("W").unwrap();
		assert!(r.free_indices.is_empty());
		assert_ne!(r.matrix.get(0), Label::ZERO);
	}
}
