//! The scalar factory (C1): the single allocator and hash-conser of
//! [`Scalar`] nodes, exposing simplifying builders over the gate
//! constructors of [`crate::scalar`].

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::error::TranslationFault;
use crate::scalar::{
	BoolOp, CmpOp, Label, NumAritOp, NumChoiceOp, NumConst, NumConstraint, NumUnaryOp, Scalar,
};
use crate::semiring::{canonicalize_fuzzy, Domain, Semiring, TNorm};

/// Every scalar produced by one `Factory` instance carries this tag so that
/// matrices and gates built from two different factories can be rejected at
/// the boundary ([`TranslationFault::DomainMismatch`]) rather than silently
/// mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryId(u64);

/// The single allocator of scalar nodes for one solve.
///
/// `Factory` interns every [`Scalar`] it constructs: calling a builder twice
/// with equal arguments returns the same [`Label`]. Builders additionally
/// fold constants, eliminate identities, and fuse double negations so that
/// callers never need to special-case those simplifications themselves.
pub struct Factory {
	id: FactoryId,
	semiring: Semiring,
	arena: Vec<Scalar>,
	intern: HashMap<Scalar, Label>,
}

impl std::fmt::Debug for Factory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Factory")
			.field("id", &self.id)
			.field("domain", &self.semiring.domain())
			.field("nodes", &self.arena.len())
			.finish()
	}
}

impl Factory {
	/// Construct a fresh factory for the given domain and t-norm family.
	#[must_use]
	pub fn new(domain: Domain, tnorm: TNorm) -> Self {
		use std::sync::atomic::{AtomicU64, Ordering};
		static NEXT_ID: AtomicU64 = AtomicU64::new(0);
		Factory {
			id: FactoryId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
			semiring: Semiring::new(domain, tnorm),
			arena: Vec::new(),
			intern: HashMap::new(),
		}
	}

	/// The identity tag of this factory, for mismatch checks at API
	/// boundaries that accept scalars from more than one source.
	#[must_use]
	pub fn id(&self) -> FactoryId {
		self.id
	}

	/// The semiring this factory was constructed with.
	#[must_use]
	pub fn semiring(&self) -> &Semiring {
		&self.semiring
	}

	/// The domain of this factory's semiring, for convenience.
	#[must_use]
	pub fn domain(&self) -> Domain {
		self.semiring.domain()
	}

	/// Resolve a label to the scalar it names.
	#[must_use]
	pub fn resolve(&self, label: Label) -> &Scalar {
		match label {
			Label::ZERO => &ZERO_SENTINELS.0,
			Label::ONE => &ZERO_SENTINELS.1,
			Label(n) => &self.arena[n as usize],
		}
	}

	fn intern(&mut self, scalar: Scalar) -> Label {
		if let Some(&label) = self.intern.get(&scalar) {
			return label;
		}
		let label = Label(self.arena.len() as u64);
		self.arena.push(scalar.clone());
		let _ = self.intern.insert(scalar, label);
		label
	}

	/// The shared boolean/numeric zero constant.
	#[must_use]
	pub fn zero(&self) -> Label {
		Label::ZERO
	}

	/// The shared boolean/numeric one constant.
	#[must_use]
	pub fn one(&self) -> Label {
		Label::ONE
	}

	/// A boolean constant literal.
	pub fn bool_const(&mut self, value: bool) -> Label {
		if value {
			Label::ONE
		} else {
			Label::ZERO
		}
	}

	/// Allocate a fresh, uninterned boolean primary variable.
	pub fn fresh_bool_var(&mut self) -> Label {
		let label = Label(self.arena.len() as u64);
		self.arena.push(Scalar::BoolVar(label));
		label
	}

	/// Allocate a fresh numeric primary variable under the given constraint.
	pub fn fresh_num_var(
		&mut self,
		constraint: NumConstraint,
		max_value: Option<i64>,
		allowed_values: Option<Vec<NumConst>>,
	) -> Label {
		let label = Label(self.arena.len() as u64);
		self.arena.push(Scalar::NumVar { constraint, max_value, allowed_values });
		label
	}

	/// A numeric constant, canonicalizing fuzzy values to 16 decimal places.
	pub fn num_const(&mut self, value: NumConst) -> Label {
		let value = match value {
			NumConst::Fuzzy(d) => NumConst::Fuzzy(canonicalize_fuzzy(d)),
			int @ NumConst::Int(_) => int,
		};
		if value.is_zero() {
			return Label::ZERO;
		}
		if value.is_one() {
			return Label::ONE;
		}
		self.intern(Scalar::NumConst(value))
	}

	/// Conjunction, flattening nested `AND`s, dropping `true` arms, and
	/// short-circuiting to `false` if any arm is `false`.
	pub fn and(&mut self, inputs: impl IntoIterator<Item = Label>) -> Label {
		let mut flat = Vec::new();
		for input in inputs {
			match self.resolve(input) {
				Scalar::BoolConst(true) => continue,
				Scalar::BoolConst(false) => return Label::ZERO,
				Scalar::BoolGate(BoolOp::And, args) => flat.extend(args.iter().copied()),
				_ => flat.push(input),
			}
		}
		flat.sort_unstable();
		flat.dedup();
		match flat.len() {
			0 => Label::ONE,
			1 => flat[0],
			_ => self.intern(Scalar::BoolGate(BoolOp::And, flat)),
		}
	}

	/// Disjunction, the dual of [`Factory::and`].
	pub fn or(&mut self, inputs: impl IntoIterator<Item = Label>) -> Label {
		let mut flat = Vec::new();
		for input in inputs {
			match self.resolve(input) {
				Scalar::BoolConst(false) => continue,
				Scalar::BoolConst(true) => return Label::ONE,
				Scalar::BoolGate(BoolOp::Or, args) => flat.extend(args.iter().copied()),
				_ => flat.push(input),
			}
		}
		flat.sort_unstable();
		flat.dedup();
		match flat.len() {
			0 => Label::ZERO,
			1 => flat[0],
			_ => self.intern(Scalar::BoolGate(BoolOp::Or, flat)),
		}
	}

	/// Negation, fusing `not(not(x))` back to `x`.
	pub fn not(&mut self, input: Label) -> Label {
		match self.resolve(input).clone() {
			Scalar::BoolConst(b) => self.bool_const(!b),
			Scalar::BoolGate(BoolOp::Not, args) => args[0],
			_ => self.intern(Scalar::BoolGate(BoolOp::Not, vec![input])),
		}
	}

	/// Boolean if-then-else, collapsing on a constant condition or on
	/// identical arms.
	pub fn bool_ite(&mut self, cond: Label, then_arm: Label, else_arm: Label) -> Label {
		if then_arm == else_arm {
			return then_arm;
		}
		match self.resolve(cond) {
			Scalar::BoolConst(true) => return then_arm,
			Scalar::BoolConst(false) => return else_arm,
			_ => {}
		}
		self.intern(Scalar::BoolGate(BoolOp::Ite, vec![cond, then_arm, else_arm]))
	}

	/// Sum of numeric arms, folding constants and dropping zero arms.
	pub fn plus(&mut self, inputs: impl IntoIterator<Item = Label>) -> Label {
		let mut acc: Option<NumConst> = None;
		let mut flat = Vec::new();
		for input in inputs {
			match self.resolve(input).clone() {
				Scalar::NumConst(c) => acc = Some(add_const(acc, c)),
				Scalar::NumAritGate(NumAritOp::Plus, args) => flat.extend(args),
				_ => flat.push(input),
			}
		}
		if let Some(c) = acc {
			if !c.is_zero() || flat.is_empty() {
				let lbl = self.num_const(c);
				flat.push(lbl);
			}
		}
		match flat.len() {
			0 => self.num_const(NumConst::Int(0)),
			1 => flat[0],
			_ => self.intern(Scalar::NumAritGate(NumAritOp::Plus, flat)),
		}
	}

	/// Binary subtraction, folding constant operands.
	pub fn minus(&mut self, left: Label, right: Label) -> Label {
		if let (Scalar::NumConst(a), Scalar::NumConst(b)) =
			(self.resolve(left).clone(), self.resolve(right).clone())
		{
			return self.num_const(sub_const(a, b));
		}
		if right == self.zero_for(left) {
			return left;
		}
		self.intern(Scalar::NumAritGate(NumAritOp::Minus, vec![left, right]))
	}

	fn zero_for(&self, _hint: Label) -> Label {
		Label::ZERO
	}

	/// Product of numeric arms, folding constants and short-circuiting to
	/// zero if any arm is the additive identity.
	pub fn times(&mut self, inputs: impl IntoIterator<Item = Label>) -> Label {
		let mut acc: Option<NumConst> = None;
		let mut flat = Vec::new();
		for input in inputs {
			match self.resolve(input).clone() {
				Scalar::NumConst(c) if c.is_zero() => return self.num_const(c.zero_like()),
				Scalar::NumConst(c) => acc = Some(mul_const(acc, c)),
				Scalar::NumAritGate(NumAritOp::Times, args) => flat.extend(args),
				_ => flat.push(input),
			}
		}
		if let Some(c) = acc {
			if !c.is_one() || flat.is_empty() {
				let lbl = self.num_const(c);
				flat.push(lbl);
			}
		}
		match flat.len() {
			0 => self.num_const(NumConst::Int(1)),
			1 => flat[0],
			_ => self.intern(Scalar::NumAritGate(NumAritOp::Times, flat)),
		}
	}

	/// Binary division. Division by a constant zero is an immediate
	/// [`TranslationFault::Arithmetic`]; fuzzy results are clamped to
	/// `min(result, 1)` once, at this construction site, per the adopted
	/// division-clamp policy.
	pub fn divide(&mut self, left: Label, right: Label) -> Result<Label, TranslationFault> {
		if let Scalar::NumConst(c) = self.resolve(right).clone() {
			if c.is_zero() {
				return Err(TranslationFault::Arithmetic("division by constant zero".into()));
			}
			if let Scalar::NumConst(a) = self.resolve(left).clone() {
				let quotient = div_const(a, c);
				let quotient = match quotient {
					NumConst::Fuzzy(d) => NumConst::Fuzzy(d.min(Decimal::ONE)),
					int => int,
				};
				return Ok(self.num_const(quotient));
			}
		}
		Ok(self.intern(Scalar::NumAritGate(NumAritOp::Div, vec![left, right])))
	}

	/// Binary modulo.
	pub fn modulo(&mut self, left: Label, right: Label) -> Result<Label, TranslationFault> {
		if let Scalar::NumConst(NumConst::Int(b)) = self.resolve(right).clone() {
			if b == 0 {
				return Err(TranslationFault::Arithmetic("modulo by constant zero".into()));
			}
			if let Scalar::NumConst(NumConst::Int(a)) = self.resolve(left).clone() {
				return Ok(self.num_const(NumConst::Int(a.rem_euclid(b))));
			}
		}
		Ok(self.intern(Scalar::NumAritGate(NumAritOp::Mod, vec![left, right])))
	}

	/// The minimum of two numeric arms.
	pub fn min(&mut self, left: Label, right: Label) -> Label {
		if left == right {
			return left;
		}
		if let (Scalar::NumConst(a), Scalar::NumConst(b)) =
			(self.resolve(left).clone(), self.resolve(right).clone())
		{
			return self.num_const(if const_le(a, b) { a } else { b });
		}
		self.intern(Scalar::NumChoiceGate {
			op: NumChoiceOp::Min,
			left,
			right,
			condition: None,
		})
	}

	/// The maximum of two numeric arms.
	pub fn max(&mut self, left: Label, right: Label) -> Label {
		if left == right {
			return left;
		}
		if let (Scalar::NumConst(a), Scalar::NumConst(b)) =
			(self.resolve(left).clone(), self.resolve(right).clone())
		{
			return self.num_const(if const_le(a, b) { b } else { a });
		}
		self.intern(Scalar::NumChoiceGate {
			op: NumChoiceOp::Max,
			left,
			right,
			condition: None,
		})
	}

	/// Numeric if-then-else.
	pub fn num_ite(&mut self, cond: Label, then_arm: Label, else_arm: Label) -> Label {
		if then_arm == else_arm {
			return then_arm;
		}
		match self.resolve(cond) {
			Scalar::BoolConst(true) => return then_arm,
			Scalar::BoolConst(false) => return else_arm,
			_ => {}
		}
		self.intern(Scalar::NumChoiceGate {
			op: NumChoiceOp::Ite,
			left: then_arm,
			right: else_arm,
			condition: Some(cond),
		})
	}

	/// Unary negation of a numeric scalar.
	pub fn neg(&mut self, input: Label) -> Label {
		match self.resolve(input).clone() {
			Scalar::NumConst(c) => self.num_const(neg_const(c)),
			Scalar::NumUnaryGate(NumUnaryOp::Neg, inner) => inner,
			_ => self.intern(Scalar::NumUnaryGate(NumUnaryOp::Neg, input)),
		}
	}

	/// Absolute value.
	pub fn abs(&mut self, input: Label) -> Label {
		match self.resolve(input).clone() {
			Scalar::NumConst(NumConst::Int(n)) => self.num_const(NumConst::Int(n.abs())),
			Scalar::NumConst(NumConst::Fuzzy(d)) => self.num_const(NumConst::Fuzzy(d.abs())),
			Scalar::NumUnaryGate(NumUnaryOp::Abs, _) => input,
			_ => self.intern(Scalar::NumUnaryGate(NumUnaryOp::Abs, input)),
		}
	}

	/// Sign: `-1`, `0`, or `1` (always `0` or `1` in the fuzzy domain).
	pub fn sgn(&mut self, input: Label) -> Label {
		match self.resolve(input).clone() {
			Scalar::NumConst(NumConst::Int(n)) => self.num_const(NumConst::Int(n.signum())),
			Scalar::NumConst(NumConst::Fuzzy(d)) => {
				self.num_const(NumConst::Fuzzy(if d.is_zero() { Decimal::ZERO } else { Decimal::ONE }))
			}
			_ => self.intern(Scalar::NumUnaryGate(NumUnaryOp::Sgn, input)),
		}
	}

	/// Build a comparison gate, folding it immediately when both sides are
	/// constant.
	pub fn cmp(&mut self, op: CmpOp, left: Label, right: Label) -> Label {
		if left == right {
			let trivial = matches!(op, CmpOp::Eq | CmpOp::Le | CmpOp::Ge);
			return self.bool_const(trivial);
		}
		if let (Scalar::NumConst(a), Scalar::NumConst(b)) =
			(self.resolve(left).clone(), self.resolve(right).clone())
		{
			return self.bool_const(fold_cmp(op, a, b));
		}
		self.intern(Scalar::CmpGate(op, left, right))
	}

	/// Build a `BinaryValue` pairing, enforcing `num = if bool then 1 else 0`.
	pub fn binary_value(&mut self, bool_side: Label) -> Label {
		if let Scalar::BoolConst(b) = self.resolve(bool_side) {
			return self.num_const(NumConst::Int(i64::from(*b)));
		}
		self.intern(Scalar::BinaryValue { num: Label::ZERO, bool_side })
	}
}

const ZERO_LABEL_SCALAR: Scalar = Scalar::NumConst(NumConst::Int(0));
const ONE_LABEL_SCALAR: Scalar = Scalar::BoolConst(true);

struct ZeroSentinels(Scalar, Scalar);
static ZERO_SENTINELS: ZeroSentinels = ZeroSentinels(ZERO_LABEL_SCALAR, ONE_LABEL_SCALAR);

fn add_const(acc: Option<NumConst>, c: NumConst) -> NumConst {
	match (acc, c) {
		(None, c) => c,
		(Some(NumConst::Int(a)), NumConst::Int(b)) => NumConst::Int(a + b),
		(Some(NumConst::Fuzzy(a)), NumConst::Fuzzy(b)) => {
			NumConst::Fuzzy(canonicalize_fuzzy(a + b))
		}
		_ => unreachable!("mixed-domain constant folding"),
	}
}

fn sub_const(a: NumConst, b: NumConst) -> NumConst {
	match (a, b) {
		(NumConst::Int(a), NumConst::Int(b)) => NumConst::Int(a - b),
		(NumConst::Fuzzy(a), NumConst::Fuzzy(b)) => NumConst::Fuzzy(canonicalize_fuzzy(a - b)),
		_ => unreachable!("mixed-domain constant folding"),
	}
}

fn mul_const(acc: Option<NumConst>, c: NumConst) -> NumConst {
	match (acc, c) {
		(None, c) => c,
		(Some(NumConst::Int(a)), NumConst::Int(b)) => NumConst::Int(a * b),
		(Some(NumConst::Fuzzy(a)), NumConst::Fuzzy(b)) => {
			NumConst::Fuzzy(canonicalize_fuzzy(a * b))
		}
		_ => unreachable!("mixed-domain constant folding"),
	}
}

fn div_const(a: NumConst, b: NumConst) -> NumConst {
	match (a, b) {
		(NumConst::Int(a), NumConst::Int(b)) => NumConst::Int(a / b),
		(NumConst::Fuzzy(a), NumConst::Fuzzy(b)) => NumConst::Fuzzy(canonicalize_fuzzy(a / b)),
		_ => unreachable!("mixed-domain constant folding"),
	}
}

fn neg_const(c: NumConst) -> NumConst {
	match c {
		NumConst::Int(n) => NumConst::Int(-n),
		NumConst::Fuzzy(d) => NumConst::Fuzzy(canonicalize_fuzzy(-d)),
	}
}

fn const_le(a: NumConst, b: NumConst) -> bool {
	match (a, b) {
		(NumConst::Int(a), NumConst::Int(b)) => a <= b,
		(NumConst::Fuzzy(a), NumConst::Fuzzy(b)) => a <= b,
		_ => unreachable!("mixed-domain constant comparison"),
	}
}

fn fold_cmp(op: CmpOp, a: NumConst, b: NumConst) -> bool {
	match op {
		CmpOp::Eq => a == b,
		CmpOp::Ne => a != b,
		CmpOp::Lt => const_le(a, b) && a != b,
		CmpOp::Le => const_le(a, b),
		CmpOp::Gt => const_le(b, a) && a != b,
		CmpOp::Ge => const_le(b, a),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn and_drops_true_arms_and_dedups() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let x = f.fresh_bool_var();
		let t = f.bool_const(true);
		let result = f.and([x, t, x]);
		assert_eq!(result, x);
	}

	#[test]
	fn and_short_circuits_on_false() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let x = f.fresh_bool_var();
		let bot = f.bool_const(false);
		assert_eq!(f.and([x, bot]), Label::ZERO);
	}

	#[test]
	fn not_not_fuses() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let x = f.fresh_bool_var();
		let nx = f.not(x);
		let nnx = f.not(nx);
		assert_eq!(nnx, x);
	}

	#[test]
	fn divide_by_constant_zero_errors() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let a = f.num_const(NumConst::Int(4));
		let zero = f.num_const(NumConst::Int(0));
		assert!(f.divide(a, zero).is_err());
	}

	#[test]
	fn constant_plus_folds() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let a = f.num_const(NumConst::Int(2));
		let b = f.num_const(NumConst::Int(3));
		let sum = f.plus([a, b]);
		assert_eq!(f.resolve(sum).clone(), Scalar::NumConst(NumConst::Int(5)));
	}

	#[test]
	fn fuzzy_divide_clamps_to_one() {
		let mut f = Factory::new(Domain::Fuzzy, TNorm::Godel);
		let a = f.num_const(NumConst::Fuzzy(Decimal::new(9, 1)));
		let b = f.num_const(NumConst::Fuzzy(Decimal::new(3, 1)));
		let q = f.divide(a, b).unwrap();
		assert_eq!(f.resolve(q).clone(), Scalar::NumConst(NumConst::Fuzzy(Decimal::ONE)));
	}
}
