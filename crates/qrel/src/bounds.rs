//! Universe and bounds: the finite domain over which relations are
//! interpreted, and the per-relation lower/upper tuple sets the leaf
//! interpreter (C3) allocates primary variables from.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::TranslationFault;

/// The finite universe of atoms a problem is interpreted over.
///
/// Atoms are addressed by a dense `0..size` index; the surface-language
/// front end (out of scope for this crate) is responsible for mapping
/// user-facing atom names to these indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
	size: usize,
}

impl Universe {
	/// Construct a universe of the given size.
	#[must_use]
	pub fn new(size: usize) -> Self {
		Universe { size }
	}

	/// The number of atoms in the universe.
	#[must_use]
	pub fn size(&self) -> usize {
		self.size
	}

	/// Flatten a tuple of atom indices of the given arity to a single
	/// row-major index into a matrix of dimensions `[size; arity]`.
	#[must_use]
	pub fn flatten(&self, tuple: &[usize]) -> usize {
		tuple.iter().fold(0, |acc, &atom| acc * self.size + atom)
	}

	/// Recover a tuple of the given arity from a flat index.
	#[must_use]
	pub fn unflatten(&self, mut index: usize, arity: usize) -> Vec<usize> {
		let mut tuple = vec![0usize; arity];
		for slot in tuple.iter_mut().rev() {
			*slot = index % self.size;
			index /= self.size;
		}
		tuple
	}

	/// The total number of flat indices for the given arity, i.e.
	/// `size^arity`.
	#[must_use]
	pub fn capacity(&self, arity: u32) -> u64 {
		(self.size as u64).saturating_pow(arity)
	}
}

/// Whether a relation's tuples carry only presence (`{0,1}`) or an arbitrary
/// weight in the active domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sort {
	/// The relation's weights are restricted to `{0, 1}`.
	Boolean,
	/// The relation's weights range over the active numeric domain.
	Quantitative,
}

/// The lower (must-be-in) and upper (may-be-in) tuple sets for one relation
/// symbol, plus its arity and sort.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationBounds {
	/// Declared arity of the relation.
	pub arity: u32,
	/// Whether the relation is boolean or quantitative.
	pub sort: Sort,
	/// Flat indices that must be present in every model.
	pub lower: BTreeSet<u64>,
	/// Flat indices that may be present; always a superset of `lower`.
	pub upper: BTreeSet<u64>,
}

impl RelationBounds {
	/// Construct bounds, validating that `lower ⊆ upper`.
	pub fn new(
		arity: u32,
		sort: Sort,
		lower: BTreeSet<u64>,
		upper: BTreeSet<u64>,
		name: &str,
	) -> Result<Self, TranslationFault> {
		if !lower.is_subset(&upper) {
			return Err(TranslationFault::InvalidBounds(name.to_string()));
		}
		Ok(RelationBounds { arity, sort, lower, upper })
	}

	/// Whether this relation's bounds fix its value completely
	/// (`lower == upper`), meaning no primary variable is needed.
	#[must_use]
	pub fn is_trivial(&self) -> bool {
		self.lower == self.upper
	}
}

/// The full set of declared relation bounds for a problem, plus the universe
/// they are interpreted over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bounds {
	universe: Universe,
	relations: BTreeMap<String, RelationBounds>,
}

impl Bounds {
	/// Construct an empty bounds set over the given universe.
	#[must_use]
	pub fn new(universe: Universe) -> Self {
		Bounds { universe, relations: BTreeMap::new() }
	}

	/// The universe these bounds are interpreted over.
	#[must_use]
	pub fn universe(&self) -> &Universe {
		&self.universe
	}

	/// Declare bounds for a relation symbol.
	pub fn declare(&mut self, name: impl Into<String>, bounds: RelationBounds) {
		let _ = self.relations.insert(name.into(), bounds);
	}

	/// Look up the bounds for a relation symbol.
	#[must_use]
	pub fn get(&self, name: &str) -> Option<&RelationBounds> {
		self.relations.get(name)
	}

	/// Iterate relation symbols in deterministic (lexicographic) order, the
	/// order primary-variable allocation follows.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &RelationBounds)> {
		self.relations.iter().map(|(k, v)| (k.as_str(), v))
	}

	/// Whether every declared relation is trivially bound
	/// (`lower == upper`), the fast path named in §4.6.
	#[must_use]
	pub fn is_fully_trivial(&self) -> bool {
		self.relations.values().all(RelationBounds::is_trivial)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flatten_unflatten_round_trips() {
		let u = Universe::new(4);
		let tuple = vec![1, 2, 3];
		let flat = u.flatten(&tuple);
		assert_eq!(u.unflatten(flat, 3), tuple);
	}

	#[test]
	fn invalid_bounds_rejected() {
		let lower = BTreeSet::from([1, 2]);
		let upper = BTreeSet::from([1]);
		let result = RelationBounds::new(1, Sort::Boolean, lower, upper, "R");
		assert!(result.is_err());
	}

	#[test]
	fn trivial_bounds_detected() {
		let set = BTreeSet::from([0, 1]);
		let rb = RelationBounds::new(1, Sort::Boolean, set.clone(), set, "R").unwrap();
		assert!(rb.is_trivial());
	}
}
