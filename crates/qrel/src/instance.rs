//! The solution lifter & iterator (C6): turns a solved SMT model back into a
//! weighted relational instance, and drives enumeration by blocking
//! previously found solutions.

use std::collections::BTreeMap;

use crate::bounds::Sort;
use crate::error::LiftFault;
use crate::leaf::LeafInterpreter;
use crate::scalar::NumConst;
use crate::smt::ModelValue;
use crate::smt::SolverModel;

/// A weighted relational instance: for each relation, a sparse map from
/// flat tuple index to the weight the model assigned it. Weight `1` for a
/// boolean relation just means "present"; a quantitative relation may carry
/// any weight in the active domain.
#[derive(Debug, Clone, Default)]
pub struct Instance {
	universe_size: usize,
	relations: BTreeMap<String, BTreeMap<u64, NumConst>>,
}

impl Instance {
	/// The universe size this instance is interpreted over.
	#[must_use]
	pub fn universe_size(&self) -> usize {
		self.universe_size
	}

	/// The weighted tuple map for one relation, if it was declared.
	#[must_use]
	pub fn relation(&self, name: &str) -> Option<&BTreeMap<u64, NumConst>> {
		self.relations.get(name)
	}

	/// Iterate every relation's weighted tuple map.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeMap<u64, NumConst>)> {
		self.relations.iter().map(|(k, v)| (k.as_str(), v))
	}
}

/// Lift a solved model into a weighted [`Instance`], using the leaf
/// interpreter's record of which flat indices were fixed by the lower bound
/// (default weight `1`) versus carried a fresh primary variable (weight read
/// from the model).
pub fn lift(leaves: &LeafInterpreter, model: &SolverModel, sorts: &BTreeMap<String, Sort>) -> Result<Instance, LiftFault> {
	let mut relations = BTreeMap::new();
	let mut universe_size = 0usize;

	for (name, realization) in leaves.iter() {
		let sort = sorts.get(name).copied().unwrap_or(Sort::Boolean);
		let mut tuples = BTreeMap::new();
		universe_size = universe_size.max(realization.matrix.dims().first().copied().unwrap_or(0));

		for (index, label) in realization.matrix.iter() {
			if realization.free_indices.contains(&index) {
				continue;
			}
			// A lower-bound tuple not carrying a fresh variable: weight 1,
			// unless the leaf interpreter realized it as an explicit
			// quantitative NumVar whose solved value we still need.
			let _ = label;
			let _ = tuples.insert(index, NumConst::Int(1));
		}

		for (&index, &var) in realization.free_indices.iter().zip(realization.primary_vars.iter()) {
			let value = model
				.get(var)
				.ok_or(LiftFault::MissingVariable(var.raw()))?;
			let weight = model_value_to_const(value);
			if sort == Sort::Boolean && !matches!(weight, NumConst::Int(0) | NumConst::Int(1)) {
				return Err(LiftFault::BooleanWithWeights(name.to_string()));
			}
			if !weight.is_zero() {
				let _ = tuples.insert(index, weight);
			}
		}

		let _ = relations.insert(name.to_string(), tuples);
	}

	Ok(Instance { universe_size, relations })
}

pub(crate) fn model_value_to_const(value: &ModelValue) -> NumConst {
	match value {
		ModelValue::Bool(b) => NumConst::Int(i64::from(*b)),
		ModelValue::Int(n) => NumConst::Int(*n),
		ModelValue::Real { decimal, .. } => NumConst::Fuzzy(*decimal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bounds::{Bounds, RelationBounds, Sort as BSort, Universe};
	use crate::factory::Factory;
	use crate::semiring::{Domain, TNorm};
	use std::collections::BTreeSet;

	#[test]
	fn lift_reports_missing_variable() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let mut bounds = Bounds::new(Universe::new(2));
		let lower = BTreeSet::new();
		let upper = BTreeSet::from([0u64]);
		let rb = RelationBounds::new(1, BSort::Boolean, lower, upper, "R").unwrap();
		bounds.declare("R", rb);
		let leaves = LeafInterpreter::interpret(&bounds, &mut f, None);
		let model = SolverModel::default();
		let mut sorts = BTreeMap::new();
		let _ = sorts.insert("R".to_string(), Sort::Boolean);
		let result = lift(&leaves, &model, &sorts);
		assert!(result.is_err());
	}
}
