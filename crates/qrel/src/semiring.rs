//! The pluggable semiring: the `(tconorm, tnorm)` pair (or `(max, min)` /
//! `(+, *)` in the integer domain) that the matrix algebra's `plus`/`product`
//! reduce to, bound once at [`crate::factory::Factory`] construction rather
//! than re-dispatched per call via a `match` at every call site.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::scalar::NumConst;

/// The value domain a [`crate::factory::Factory`] operates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
	/// Weights are arbitrary-precision integers.
	Integer,
	/// Weights are decimals in `[0, 1]`, combined via a t-norm/t-conorm pair.
	Fuzzy,
}

/// The t-norm family selected for the fuzzy domain. Meaningless in the
/// integer domain, where `tnorm`/`tconorm` always reduce to `min`/`max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TNorm {
	/// `min`/`max`.
	Godel,
	/// `max(a+b-1, 0)` / `min(a+b, 1)`.
	Lukasiewicz,
	/// `a*b` / `a+b-a*b`.
	Product,
	/// `0` unless one side is `1` / `1` unless one side is `0`.
	Drastic,
	/// `ab / (2 - (a+b-ab))` / `(a+b) / (1+ab)`.
	Einstein,
	/// `min(a,b)` / `min(a+b,1)`: Gödel's t-norm paired with Łukasiewicz's
	/// t-conorm.
	AddMin,
	/// `a*b` / `max(a,b)`: the product t-norm paired with Gödel's t-conorm.
	MaxProduct,
}

/// Clamp a fuzzy decimal into `[0, 1]` and round to 16 decimal places,
/// half-up, as required of every fuzzy constant.
#[must_use]
pub fn canonicalize_fuzzy(d: Decimal) -> Decimal {
	let clamped = d.max(Decimal::ZERO).min(Decimal::ONE);
	clamped.round_dp_with_strategy(16, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// The sixteen-place canonical fuzzy zero and one, kept as associated
/// constants so callers do not re-derive them.
pub(crate) const FUZZY_ZERO: Decimal = Decimal::ZERO;
pub(crate) const FUZZY_ONE: Decimal = Decimal::ONE;

/// A bound, per-factory implementation of the semiring operations.
///
/// Constructed once from a [`Domain`]/[`TNorm`] pair and then called directly
/// without further branching on the selected family; this is the "pre-bound
/// function pointers" design named for the translation layer.
pub struct Semiring {
	domain: Domain,
	tnorm: TNorm,
}

impl Semiring {
	/// Build a semiring implementation for the given domain and t-norm family.
	/// The `tnorm` choice is ignored when `domain` is [`Domain::Integer`].
	#[must_use]
	pub fn new(domain: Domain, tnorm: TNorm) -> Self {
		Semiring { domain, tnorm }
	}

	/// The domain this semiring was constructed for.
	#[must_use]
	pub fn domain(&self) -> Domain {
		self.domain
	}

	/// The t-norm family this semiring was constructed for.
	#[must_use]
	pub fn tnorm_family(&self) -> TNorm {
		self.tnorm
	}

	/// The multiplicative (meet) operation, used as the inner operator of
	/// matrix `dot`/`product`.
	#[must_use]
	pub fn meet(&self, a: NumConst, b: NumConst) -> NumConst {
		self.tnorm(a, b)
	}

	/// The additive (join) operation, used as the outer operator of matrix
	/// `dot`/`plus`.
	#[must_use]
	pub fn join(&self, a: NumConst, b: NumConst) -> NumConst {
		self.tconorm(a, b)
	}

	/// The t-norm (fuzzy conjunction), or integer `min`, applied to two
	/// constants of the same domain.
	#[must_use]
	pub fn tnorm(&self, a: NumConst, b: NumConst) -> NumConst {
		match (self.domain, a, b) {
			(Domain::Integer, NumConst::Int(x), NumConst::Int(y)) => NumConst::Int(x.min(y)),
			(Domain::Fuzzy, NumConst::Fuzzy(x), NumConst::Fuzzy(y)) => {
				NumConst::Fuzzy(canonicalize_fuzzy(self.fuzzy_tnorm(x, y)))
			}
			_ => unreachable!("mixed-domain constants reaching the semiring"),
		}
	}

	/// The t-conorm (fuzzy disjunction), or integer `max`.
	#[must_use]
	pub fn tconorm(&self, a: NumConst, b: NumConst) -> NumConst {
		match (self.domain, a, b) {
			(Domain::Integer, NumConst::Int(x), NumConst::Int(y)) => NumConst::Int(x.max(y)),
			(Domain::Fuzzy, NumConst::Fuzzy(x), NumConst::Fuzzy(y)) => {
				NumConst::Fuzzy(canonicalize_fuzzy(self.fuzzy_tconorm(x, y)))
			}
			_ => unreachable!("mixed-domain constants reaching the semiring"),
		}
	}

	fn fuzzy_tnorm(&self, a: Decimal, b: Decimal) -> Decimal {
		match self.tnorm {
			TNorm::Godel | TNorm::AddMin => a.min(b),
			TNorm::Lukasiewicz => (a + b - Decimal::ONE).max(Decimal::ZERO),
			TNorm::Product | TNorm::MaxProduct => a * b,
			TNorm::Drastic => {
				if a == FUZZY_ONE {
					b
				} else if b == FUZZY_ONE {
					a
				} else {
					FUZZY_ZERO
				}
			}
			TNorm::Einstein => {
				let denom = Decimal::TWO - (a + b - a * b);
				if denom.is_zero() {
					FUZZY_ZERO
				} else {
					(a * b) / denom
				}
			}
		}
	}

	fn fuzzy_tconorm(&self, a: Decimal, b: Decimal) -> Decimal {
		match self.tnorm {
			TNorm::Godel | TNorm::MaxProduct => a.max(b),
			TNorm::Lukasiewicz | TNorm::AddMin => (a + b).min(Decimal::ONE),
			TNorm::Product => a + b - a * b,
			TNorm::Drastic => {
				if a == FUZZY_ZERO {
					b
				} else if b == FUZZY_ZERO {
					a
				} else {
					FUZZY_ONE
				}
			}
			TNorm::Einstein => {
				let denom = Decimal::ONE + a * b;
				(a + b) / denom
			}
		}
	}
}

impl std::fmt::Debug for Semiring {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Semiring")
			.field("domain", &self.domain)
			.field("tnorm", &self.tnorm)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn godel_tnorm_is_min() {
		let s = Semiring::new(Domain::Fuzzy, TNorm::Godel);
		let a = NumConst::Fuzzy(Decimal::new(3, 1));
		let b = NumConst::Fuzzy(Decimal::new(7, 1));
		assert_eq!(s.tnorm(a, b), a);
		assert_eq!(s.tconorm(a, b), b);
	}

	#[test]
	fn lukasiewicz_tnorm_clamps_to_zero() {
		let s = Semiring::new(Domain::Fuzzy, TNorm::Lukasiewicz);
		let a = NumConst::Fuzzy(Decimal::new(3, 1));
		let b = NumConst::Fuzzy(Decimal::new(4, 1));
		assert_eq!(s.tnorm(a, b), NumConst::Fuzzy(Decimal::ZERO));
	}

	#[test]
	fn integer_domain_uses_min_max() {
		let s = Semiring::new(Domain::Integer, TNorm::Godel);
		assert_eq!(s.tnorm(NumConst::Int(2), NumConst::Int(5)), NumConst::Int(2));
		assert_eq!(s.tconorm(NumConst::Int(2), NumConst::Int(5)), NumConst::Int(5));
	}

	#[test]
	fn product_tconorm_matches_probabilistic_sum() {
		let s = Semiring::new(Domain::Fuzzy, TNorm::Product);
		let a = NumConst::Fuzzy(Decimal::new(5, 1));
		let b = NumConst::Fuzzy(Decimal::new(5, 1));
		assert_eq!(s.tconorm(a, b), NumConst::Fuzzy(Decimal::new(75, 2)));
	}
}
