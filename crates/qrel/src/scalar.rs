//! The scalar intermediate representation (C1): boolean and numeric gates
//! over which the matrix algebra and the SMT emitter operate.
//!
//! Every [`Scalar`] is interned by a [`crate::factory::Factory`] and carries a
//! unique [`Label`]. Two scalars are the same value if and only if they carry
//! the same label; factories never share labels with one another except for
//! the canonical [`Label::ZERO`]/[`Label::ONE`] constants.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A unique identifier for an interned [`Scalar`] within a single
/// [`crate::factory::Factory`].
///
/// Ordinary labels are assigned in increasing order starting from `0`;
/// [`Label::ZERO`] and [`Label::ONE`] use the high end of the range so that
/// they never collide with a primary-variable label regardless of how many
/// variables a translation allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Label(pub(crate) u64);

impl Label {
	/// The reserved label of the shared numeric/boolean zero constant.
	pub const ZERO: Label = Label(u64::MAX - 1);
	/// The reserved label of the shared numeric/boolean one constant.
	pub const ONE: Label = Label(u64::MAX);

	/// The raw integer value of this label, for diagnostics and serialization.
	#[must_use]
	pub fn raw(self) -> u64 {
		self.0
	}
}

impl fmt::Display for Label {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			Label::ZERO => write!(f, "l!zero"),
			Label::ONE => write!(f, "l!one"),
			Label(n) => write!(f, "l{n}"),
		}
	}
}

/// An n-ary boolean gate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoolOp {
	/// Conjunction of all inputs.
	And,
	/// Disjunction of all inputs.
	Or,
	/// Negation of the single input.
	Not,
	/// `ite(c, t, f)`: the condition is the first input.
	Ite,
}

/// A numeric value constraint carried by a [`Scalar::NumVar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumConstraint {
	/// No constraint beyond the declared domain.
	Free,
	/// The variable is never the additive identity.
	NonZero,
	/// The variable is fixed to the additive identity.
	Zero,
}

/// An n-ary arithmetic gate operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumAritOp {
	/// Sum of all inputs.
	Plus,
	/// Binary subtraction.
	Minus,
	/// Product of all inputs.
	Times,
	/// Binary division; division by a constant zero is rejected at
	/// construction, division by a variable zero is guarded at emission.
	Div,
	/// Binary modulo.
	Mod,
}

/// A binary choice operator over two numeric arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumChoiceOp {
	/// The lesser of the two arms.
	Min,
	/// The greater of the two arms.
	Max,
	/// `ite(condition, left, right)`.
	Ite,
}

/// A unary numeric operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumUnaryOp {
	/// Additive inverse.
	Neg,
	/// Absolute value.
	Abs,
	/// Sign: `-1`, `0`, or `1`.
	Sgn,
}

/// A comparison operator producing a boolean value from two scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CmpOp {
	/// Equality.
	Eq,
	/// Inequality.
	Ne,
	/// Strictly less than.
	Lt,
	/// Less than or equal to.
	Le,
	/// Strictly greater than.
	Gt,
	/// Greater than or equal to.
	Ge,
}

/// A numeric constant: an integer or a 16-decimal-place fuzzy rational.
///
/// Fuzzy constants are canonicalized to 16 decimal places, rounded half-up,
/// by the factory before interning; this type itself only carries the
/// already-canonical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumConst {
	/// An integer-domain constant.
	Int(i64),
	/// A fuzzy-domain constant in `[0, 1]`, canonicalized to 16 decimal places.
	Fuzzy(Decimal),
}

impl NumConst {
	/// The additive identity for this constant's domain.
	#[must_use]
	pub fn zero_like(self) -> NumConst {
		match self {
			NumConst::Int(_) => NumConst::Int(0),
			NumConst::Fuzzy(_) => NumConst::Fuzzy(Decimal::ZERO),
		}
	}

	/// Whether this constant is the additive identity.
	#[must_use]
	pub fn is_zero(self) -> bool {
		match self {
			NumConst::Int(n) => n == 0,
			NumConst::Fuzzy(d) => d.is_zero(),
		}
	}

	/// Whether this constant is the multiplicative identity.
	#[must_use]
	pub fn is_one(self) -> bool {
		match self {
			NumConst::Int(n) => n == 1,
			NumConst::Fuzzy(d) => d == Decimal::ONE,
		}
	}
}

/// A single node of the scalar circuit.
///
/// `Scalar` values are produced exclusively by a [`crate::factory::Factory`],
/// which performs constant folding, identity elimination, and negation fusion
/// so that a caller never constructs a redundant gate directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
	/// A boolean constant.
	BoolConst(bool),
	/// A fresh boolean atom, identified by its label.
	BoolVar(Label),
	/// A boolean gate over boolean-valued inputs.
	BoolGate(BoolOp, Vec<Label>),
	/// A numeric constant.
	NumConst(NumConst),
	/// A fresh numeric primary variable.
	NumVar {
		/// The constraint on this variable's value.
		constraint: NumConstraint,
		/// An optional upper bound on the variable's magnitude (`maxWeight`).
		max_value: Option<i64>,
		/// An optional explicit enumeration of admissible values.
		allowed_values: Option<Vec<NumConst>>,
	},
	/// An n-ary arithmetic gate.
	NumAritGate(NumAritOp, Vec<Label>),
	/// A binary choice gate, with an optional boolean condition for `Ite`.
	NumChoiceGate {
		/// The choice operator.
		op: NumChoiceOp,
		/// The first arm.
		left: Label,
		/// The second arm.
		right: Label,
		/// The guarding condition, present only for [`NumChoiceOp::Ite`].
		condition: Option<Label>,
	},
	/// A unary numeric gate.
	NumUnaryGate(NumUnaryOp, Label),
	/// A comparison between two scalars, yielding a boolean value.
	CmpGate(CmpOp, Label, Label),
	/// A paired numeric/boolean representation with the invariant
	/// `num = if bool then 1 else 0`.
	BinaryValue {
		/// The numeric side of the pair.
		num: Label,
		/// The boolean side of the pair.
		bool_side: Label,
	},
}

impl Scalar {
	/// Whether this scalar is a boolean-sorted value (as opposed to numeric).
	#[must_use]
	pub fn is_bool_sorted(&self) -> bool {
		matches!(
			self,
			Scalar::BoolConst(_) | Scalar::BoolVar(_) | Scalar::BoolGate(..) | Scalar::CmpGate(..)
		)
	}
}
