//! The AST translator (C4): a single post-order traversal mapping each AST
//! node to a matrix, boolean scalar, or numeric expression, threading an
//! [`Env`] and a [`TranslationCache`] as explicit arguments rather than
//! smuggling state through thread-locals or interior mutability.

use std::collections::BTreeSet;
use std::rc::Rc;

use crate::ast::{Decl, Expr, Formula, Multiplicity, ScalarExpr, Variable};
use crate::cache::{TranslationCache, VarBinding};
use crate::env::{Env, Polarity};
use crate::error::TranslationFault;
use crate::factory::Factory;
use crate::leaf::LeafInterpreter;
use crate::matrix::Matrix;
use crate::scalar::{Label, NumConst};

/// The capacity limit (universe^arity) beyond which translation refuses to
/// materialize a matrix, guarding against runaway memory use on a
/// pathological bound.
const DEFAULT_CAPACITY_LIMIT: u64 = 1 << 26;

/// The translator: borrows a [`Factory`] and a [`LeafInterpreter`] for the
/// duration of one solve, owning the [`Env`] and [`TranslationCache`] that
/// accumulate across the traversal.
pub struct Translator<'a> {
	factory: &'a mut Factory,
	leaves: &'a LeafInterpreter,
	env: Env,
	cache: TranslationCache,
	capacity_limit: u64,
}

impl<'a> Translator<'a> {
	/// Construct a translator over the given factory and leaf interpreter.
	#[must_use]
	pub fn new(factory: &'a mut Factory, leaves: &'a LeafInterpreter) -> Self {
		Translator {
			factory,
			leaves,
			env: Env::new(),
			cache: TranslationCache::new(),
			capacity_limit: DEFAULT_CAPACITY_LIMIT,
		}
	}

	/// Translate a root formula to a single boolean scalar, the SMT root
	/// assertion.
	pub fn translate_formula(&mut self, formula: &Rc<Formula>) -> Result<Label, TranslationFault> {
		match formula.as_ref() {
			Formula::BoolLit(b) => Ok(self.factory.bool_const(*b)),
			Formula::Not(inner) => {
				self.env.enter_negation();
				let v = self.translate_formula(inner);
				self.env.exit_negation();
				Ok(self.factory.not(v?))
			}
			Formula::And(parts) => {
				let mut labels = Vec::with_capacity(parts.len());
				for part in parts {
					labels.push(self.translate_formula(&Rc::new(part.clone()))?);
				}
				Ok(self.factory.and(labels))
			}
			Formula::Or(parts) => {
				let mut labels = Vec::with_capacity(parts.len());
				for part in parts {
					labels.push(self.translate_formula(&Rc::new(part.clone()))?);
				}
				Ok(self.factory.or(labels))
			}
			Formula::Implies(a, b) => {
				let na = {
					self.env.enter_negation();
					let v = self.translate_formula(a);
					self.env.exit_negation();
					self.factory.not(v?)
				};
				let bv = self.translate_formula(b)?;
				Ok(self.factory.or([na, bv]))
			}
			Formula::Iff(a, b) => {
				let av = self.translate_formula(a)?;
				let bv = self.translate_formula(b)?;
				let fwd = {
					let na = self.factory.not(av);
					self.factory.or([na, bv])
				};
				let bwd = {
					let nb = self.factory.not(bv);
					self.factory.or([nb, av])
				};
				Ok(self.factory.and([fwd, bwd]))
			}
			Formula::No(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.no(self.factory))
			}
			Formula::Some(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.some(self.factory))
			}
			Formula::One(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.one(self.factory))
			}
			Formula::Lone(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.lone(self.factory))
			}
			Formula::Eq(a, b) => {
				let ma = self.translate_expr(a)?;
				let mb = self.translate_expr(b)?;
				Ok(ma.eq(&mb, self.factory))
			}
			Formula::Subset(a, b) => {
				let ma = self.translate_expr(a)?;
				let mb = self.translate_expr(b)?;
				Ok(ma.subset(&mb, self.factory))
			}
			Formula::ScalarCmp(op, a, b) => {
				let la = self.translate_scalar(a)?;
				let lb = self.translate_scalar(b)?;
				Ok(self.factory.cmp(*op, la, lb))
			}
			Formula::All(decls, body) => self.translate_quantifier(decls, body, Polarity::All),
			Formula::Exists(decls, body) => self.translate_quantifier(decls, body, Polarity::Some),
			Formula::Let(var, bound, body) => {
				let value = self.translate_expr(bound)?;
				self.env.push_bindings();
				self.env.bind(var.clone(), value);
				let result = self.translate_formula(body);
				self.env.pop_bindings();
				result
			}
		}
	}

	fn translate_quantifier(
		&mut self,
		decls: &[Decl],
		body: &Rc<Formula>,
		polarity: Polarity,
	) -> Result<Label, TranslationFault> {
		let mut per_binding = Vec::new();
		self.collect_bindings(decls, 0, &mut Vec::new(), &mut per_binding)?;

		let mut results = Vec::with_capacity(per_binding.len());
		for binding in per_binding {
			self.env.push_bindings();
			for (var, matrix) in &binding {
				self.env.bind(var.clone(), matrix.clone());
			}
			let v = self.translate_formula(body);
			self.env.pop_bindings();
			results.push(v?);
		}

		Ok(match polarity {
			Polarity::All => self.factory.and(results),
			Polarity::Some => self.factory.or(results),
		})
	}

	/// Expand a sequence of `one`-multiplicity declarations into the
	/// cross-product of single-atom bindings. Any declaration with a
	/// multiplicity other than `one` is rejected: this translator does not
	/// skolemize set-valued bindings.
	fn collect_bindings(
		&mut self,
		decls: &[Decl],
		idx: usize,
		current: &mut Vec<(Variable, Matrix)>,
		out: &mut Vec<Vec<(Variable, Matrix)>>,
	) -> Result<(), TranslationFault> {
		if idx == decls.len() {
			out.push(current.clone());
			return Ok(());
		}
		let decl = &decls[idx];
		if decl.multiplicity != Multiplicity::One {
			return Err(TranslationFault::HigherOrder(decl.variable.0.clone()));
		}
		let domain = self.translate_expr(&decl.domain)?;
		for (index, label) in domain.iter() {
			if label == Label::ZERO {
				continue;
			}
			let dims = vec![*domain.dims().first().unwrap_or(&1)];
			let mut cells = std::collections::BTreeMap::new();
			let _ = cells.insert(index, self.factory.one());
			let singleton = Matrix::from_cells(dims, self.factory.id(), cells, self.factory);
			current.push((decl.variable.clone(), singleton));
			self.collect_bindings(decls, idx + 1, current, out)?;
			let _ = current.pop();
		}
		Ok(())
	}

	/// Translate a relational expression to a matrix, consulting and
	/// populating the environment-keyed cache for nodes judged shareable.
	///
	/// A node with no free variables is cached under its identity alone. A
	/// node that references variables bound by an enclosing quantifier,
	/// comprehension, or `let` must be cached under those bindings too, since
	/// a shared subexpression translates differently for each binding of its
	/// free variables; if the current environment can't resolve one of them
	/// (shouldn't happen for a well-formed AST, but the cache is pure storage
	/// and shouldn't panic), the node is simply left uncached.
	pub fn translate_expr(&mut self, expr: &Rc<Expr>) -> Result<Matrix, TranslationFault> {
		let free = free_vars(expr);
		if free.is_empty() {
			if let Some(m) = self.cache.get_no_var(expr) {
				return Ok(m.clone());
			}
			let result = self.translate_expr_uncached(expr)?;
			if Rc::strong_count(expr) > 1 {
				self.cache.put_no_var(expr, result.clone());
			}
			return Ok(result);
		}

		let Some(bindings) = self.current_bindings(&free) else {
			return self.translate_expr_uncached(expr);
		};
		if let Some(m) = self.cache.get_multi_var(expr, bindings.clone()) {
			return Ok(m.clone());
		}
		let result = self.translate_expr_uncached(expr)?;
		if Rc::strong_count(expr) > 1 {
			self.cache.put_multi_var(expr, bindings, result.clone());
		}
		Ok(result)
	}

	/// Resolve each variable's current binding to a [`VarBinding`], or `None`
	/// if any of them is unbound in the present environment.
	fn current_bindings(&self, vars: &[Variable]) -> Option<Vec<VarBinding>> {
		vars.iter()
			.map(|v| {
				self.env
					.lookup(v)
					.map(|m| VarBinding { variable: v.clone(), tuple_index: first_present_atom(m) as u64 })
			})
			.collect()
	}

	fn translate_expr_uncached(&mut self, expr: &Rc<Expr>) -> Result<Matrix, TranslationFault> {
		match expr.as_ref() {
			Expr::Relation(name) => {
				let realization = self
					.leaves
					.relation(name)
					.ok_or_else(|| TranslationFault::UnboundLeaf(name.clone()))?;
				Ok(realization.matrix.clone())
			}
			Expr::Var(var) => self
				.env
				.lookup(var)
				.cloned()
				.ok_or_else(|| TranslationFault::UnboundLeaf(var.0.clone())),
			Expr::Univ => Ok(self.leaves.univ(self.factory)),
			Expr::Iden => Ok(self.leaves.iden(self.factory)),
			Expr::None => Ok(self.leaves.none(1, self.factory)),
			Expr::Ints => Ok(self.leaves.ints(self.factory)),
			Expr::ConstInt(n) => Ok(self.leaves.const_int(*n as usize, self.factory)),
			Expr::Union(a, b) => {
				let (ma, mb) = self.translate_pair(a, b)?;
				Ok(ma.union(&mb, self.factory))
			}
			Expr::Intersection(a, b) => {
				let (ma, mb) = self.translate_pair(a, b)?;
				Ok(ma.intersection(&mb, self.factory))
			}
			Expr::Difference(a, b) => {
				let (ma, mb) = self.translate_pair(a, b)?;
				Ok(ma.difference(&mb, self.factory))
			}
			Expr::Join(a, b) => {
				let (ma, mb) = self.translate_pair(a, b)?;
				self.check_capacity(ma.dims().iter().chain(mb.dims().iter()).product())?;
				Ok(ma.dot(&mb, self.factory))
			}
			Expr::Product(a, b) => {
				let (ma, mb) = self.translate_pair(a, b)?;
				let capacity: u64 = (ma.dims().iter().product::<usize>()
					* mb.dims().iter().product::<usize>()) as u64;
				self.check_capacity(capacity)?;
				Ok(ma.cross(&mb, self.factory))
			}
			Expr::Transpose(a) => {
				let ma = self.translate_expr(a)?;
				Ok(ma.transpose())
			}
			Expr::Closure(a) => {
				let ma = self.translate_expr(a)?;
				Ok(ma.closure(self.factory))
			}
			Expr::ReflexiveClosure(a) => {
				let ma = self.translate_expr(a)?;
				Ok(ma.reflexive_closure(self.factory))
			}
			Expr::Override(a, b) => {
				let (ma, mb) = self.translate_pair(a, b)?;
				Ok(ma.row_override(&mb, self.factory))
			}
			Expr::Comprehension(decls, formula) => self.translate_comprehension(decls, formula, None),
			Expr::QuantitativeComprehension(decls, formula, weight) => {
				self.translate_comprehension(decls, formula, Some(weight))
			}
			Expr::IfElse(cond, then_arm, else_arm) => {
				let c = self.translate_formula(cond)?;
				let then_m = self.translate_expr(then_arm)?;
				let else_m = self.translate_expr(else_arm)?;
				let cond_matrix = broadcast_condition(c, &then_m, self.factory);
				Ok(then_m.choice(&cond_matrix, &else_m, self.factory))
			}
			Expr::Let(var, bound, body) => {
				let value = self.translate_expr(bound)?;
				self.env.push_bindings();
				self.env.bind(var.clone(), value);
				let result = self.translate_expr(body);
				self.env.pop_bindings();
				result
			}
		}
	}

	fn translate_pair(&mut self, a: &Rc<Expr>, b: &Rc<Expr>) -> Result<(Matrix, Matrix), TranslationFault> {
		let ma = self.translate_expr(a)?;
		let mb = self.translate_expr(b)?;
		Ok((ma, mb))
	}

	fn check_capacity(&self, requested: u64) -> Result<(), TranslationFault> {
		if requested > self.capacity_limit {
			return Err(TranslationFault::CapacityExceeded { got: requested, limit: self.capacity_limit });
		}
		Ok(())
	}

	/// A plain or quantitative comprehension: enumerate the declarations'
	/// cross-product, evaluate the guard formula (and, if quantitative, the
	/// weight expression) under each binding, and accumulate into a fresh
	/// matrix over the declared variables' joint arity.
	fn translate_comprehension(
		&mut self,
		decls: &[Decl],
		formula: &Rc<Formula>,
		weight: Option<&Rc<ScalarExpr>>,
	) -> Result<Matrix, TranslationFault> {
		let mut per_binding = Vec::new();
		self.collect_bindings(decls, 0, &mut Vec::new(), &mut per_binding)?;

		let universe_size = per_binding
			.first()
			.and_then(|b| b.first())
			.map_or(1, |(_, m)| *m.dims().first().unwrap_or(&1));
		let dims = vec![universe_size; decls.len()];

		let mut cells = std::collections::BTreeMap::new();
		for binding in per_binding {
			self.env.push_bindings();
			let mut tuple = Vec::with_capacity(binding.len());
			for (var, matrix) in &binding {
				self.env.bind(var.clone(), matrix.clone());
				tuple.push(first_present_atom(matrix));
			}
			let guard = self.translate_formula(formula);
			let value = if let Some(w) = weight {
				guard.and_then(|g| {
					let weight = self.translate_scalar(w)?;
					let zero = self.factory.zero();
					Ok(self.factory.num_ite(g, weight, zero))
				})
			} else {
				guard.map(|g| self.factory.binary_value(g))
			};
			self.env.pop_bindings();
			let value = value?;
			if value != Label::ZERO {
				let flat = flatten_tuple(&tuple, universe_size);
				let _ = cells.insert(flat, value);
			}
		}
		Ok(Matrix::from_cells(dims, self.factory.id(), cells, self.factory))
	}

	/// Translate a scalar expression to a single label.
	pub fn translate_scalar(&mut self, expr: &Rc<ScalarExpr>) -> Result<Label, TranslationFault> {
		match expr.as_ref() {
			ScalarExpr::IntLit(n) => Ok(self.factory.num_const(NumConst::Int(*n))),
			ScalarExpr::DecimalLit(text) => {
				let d: rust_decimal::Decimal = text
					.parse()
					.map_err(|_| TranslationFault::Arithmetic(format!("invalid decimal literal `{text}'")))?;
				Ok(self.factory.num_const(NumConst::Fuzzy(d)))
			}
			ScalarExpr::WeightOf(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.sum(self.factory))
			}
			ScalarExpr::Sum(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.sum(self.factory))
			}
			ScalarExpr::Cardinality(e) => {
				let m = self.translate_expr(e)?;
				Ok(m.cardinality(self.factory))
			}
			ScalarExpr::Plus(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				Ok(self.factory.plus([la, lb]))
			}
			ScalarExpr::Minus(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				Ok(self.factory.minus(la, lb))
			}
			ScalarExpr::Times(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				Ok(self.factory.times([la, lb]))
			}
			ScalarExpr::Div(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				self.factory.divide(la, lb)
			}
			ScalarExpr::Mod(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				self.factory.modulo(la, lb)
			}
			ScalarExpr::Neg(a) => {
				let la = self.translate_scalar(a)?;
				Ok(self.factory.neg(la))
			}
			ScalarExpr::Abs(a) => {
				let la = self.translate_scalar(a)?;
				Ok(self.factory.abs(la))
			}
			ScalarExpr::Sgn(a) => {
				let la = self.translate_scalar(a)?;
				Ok(self.factory.sgn(la))
			}
			ScalarExpr::Min(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				Ok(self.factory.min(la, lb))
			}
			ScalarExpr::Max(a, b) => {
				let (la, lb) = self.translate_scalar_pair(a, b)?;
				Ok(self.factory.max(la, lb))
			}
			ScalarExpr::IfElse(cond, then_arm, else_arm) => {
				let c = self.translate_formula(cond)?;
				let t = self.translate_scalar(then_arm)?;
				let e = self.translate_scalar(else_arm)?;
				Ok(self.factory.num_ite(c, t, e))
			}
		}
	}

	fn translate_scalar_pair(
		&mut self,
		a: &Rc<ScalarExpr>,
		b: &Rc<ScalarExpr>,
	) -> Result<(Label, Label), TranslationFault> {
		let la = self.translate_scalar(a)?;
		let lb = self.translate_scalar(b)?;
		Ok((la, lb))
	}

	/// Hand back the cache's hit/miss counters for statistics reporting.
	#[must_use]
	pub fn cache_stats(&self) -> (u64, u64) {
		self.cache.hit_rate()
	}
}

fn first_present_atom(m: &Matrix) -> usize {
	m.iter().next().map_or(0, |(i, _)| i as usize)
}

/// The variables an expression references that are not bound somewhere
/// inside it, i.e. the bindings it needs from the surrounding environment to
/// translate unambiguously.
fn free_vars(expr: &Expr) -> Vec<Variable> {
	let mut bound = Vec::new();
	let mut out = BTreeSet::new();
	free_vars_in_expr(expr, &mut bound, &mut out);
	out.into_iter().collect()
}

fn free_vars_in_expr(expr: &Expr, bound: &mut Vec<Variable>, out: &mut BTreeSet<Variable>) {
	match expr {
		Expr::Relation(_) | Expr::Univ | Expr::Iden | Expr::None | Expr::Ints | Expr::ConstInt(_) => {}
		Expr::Var(v) => {
			if !bound.contains(v) {
				let _ = out.insert(v.clone());
			}
		}
		Expr::Union(a, b)
		| Expr::Intersection(a, b)
		| Expr::Difference(a, b)
		| Expr::Join(a, b)
		| Expr::Product(a, b)
		| Expr::Override(a, b) => {
			free_vars_in_expr(a, bound, out);
			free_vars_in_expr(b, bound, out);
		}
		Expr::Transpose(a) | Expr::Closure(a) | Expr::ReflexiveClosure(a) => {
			free_vars_in_expr(a, bound, out);
		}
		Expr::Comprehension(decls, formula) => {
			let bound_here = bind_decls(decls, bound, out);
			free_vars_in_formula(formula, bound, out);
			bound.truncate(bound.len() - bound_here);
		}
		Expr::QuantitativeComprehension(decls, formula, weight) => {
			let bound_here = bind_decls(decls, bound, out);
			free_vars_in_formula(formula, bound, out);
			free_vars_in_scalar(weight, bound, out);
			bound.truncate(bound.len() - bound_here);
		}
		Expr::IfElse(cond, then_arm, else_arm) => {
			free_vars_in_formula(cond, bound, out);
			free_vars_in_expr(then_arm, bound, out);
			free_vars_in_expr(else_arm, bound, out);
		}
		Expr::Let(var, value, body) => {
			free_vars_in_expr(value, bound, out);
			bound.push(var.clone());
			free_vars_in_expr(body, bound, out);
			let _ = bound.pop();
		}
	}
}

fn free_vars_in_formula(formula: &Formula, bound: &mut Vec<Variable>, out: &mut BTreeSet<Variable>) {
	match formula {
		Formula::BoolLit(_) => {}
		Formula::Not(inner) => free_vars_in_formula(inner, bound, out),
		Formula::And(parts) | Formula::Or(parts) => {
			for part in parts {
				free_vars_in_formula(part, bound, out);
			}
		}
		Formula::Implies(a, b) | Formula::Iff(a, b) => {
			free_vars_in_formula(a, bound, out);
			free_vars_in_formula(b, bound, out);
		}
		Formula::No(e) | Formula::Some(e) | Formula::One(e) | Formula::Lone(e) => {
			free_vars_in_expr(e, bound, out);
		}
		Formula::Eq(a, b) | Formula::Subset(a, b) => {
			free_vars_in_expr(a, bound, out);
			free_vars_in_expr(b, bound, out);
		}
		Formula::ScalarCmp(_, a, b) => {
			free_vars_in_scalar(a, bound, out);
			free_vars_in_scalar(b, bound, out);
		}
		Formula::All(decls, body) | Formula::Exists(decls, body) => {
			let bound_here = bind_decls(decls, bound, out);
			free_vars_in_formula(body, bound, out);
			bound.truncate(bound.len() - bound_here);
		}
		Formula::Let(var, value, body) => {
			free_vars_in_expr(value, bound, out);
			bound.push(var.clone());
			free_vars_in_formula(body, bound, out);
			let _ = bound.pop();
		}
	}
}

fn free_vars_in_scalar(expr: &ScalarExpr, bound: &mut Vec<Variable>, out: &mut BTreeSet<Variable>) {
	match expr {
		ScalarExpr::IntLit(_) | ScalarExpr::DecimalLit(_) => {}
		ScalarExpr::WeightOf(e) | ScalarExpr::Sum(e) | ScalarExpr::Cardinality(e) => {
			free_vars_in_expr(e, bound, out);
		}
		ScalarExpr::Plus(a, b)
		| ScalarExpr::Minus(a, b)
		| ScalarExpr::Times(a, b)
		| ScalarExpr::Div(a, b)
		| ScalarExpr::Mod(a, b)
		| ScalarExpr::Min(a, b)
		| ScalarExpr::Max(a, b) => {
			free_vars_in_scalar(a, bound, out);
			free_vars_in_scalar(b, bound, out);
		}
		ScalarExpr::Neg(a) | ScalarExpr::Abs(a) | ScalarExpr::Sgn(a) => {
			free_vars_in_scalar(a, bound, out);
		}
		ScalarExpr::IfElse(cond, then_arm, else_arm) => {
			free_vars_in_formula(cond, bound, out);
			free_vars_in_scalar(then_arm, bound, out);
			free_vars_in_scalar(else_arm, bound, out);
		}
	}
}

/// Push each declaration's variable onto `bound` after collecting the free
/// variables of its own domain expression (evaluated in the scope of the
/// *preceding* declarations only); returns how many variables were pushed so
/// the caller can truncate them back off afterward.
fn bind_decls(decls: &[Decl], bound: &mut Vec<Variable>, out: &mut BTreeSet<Variable>) -> usize {
	for decl in decls {
		free_vars_in_expr(&decl.domain, bound, out);
		bound.push(decl.variable.clone());
	}
	decls.len()
}

fn flatten_tuple(tuple: &[usize], universe_size: usize) -> u64 {
	tuple.iter().fold(0u64, |acc, &a| acc * universe_size as u64 + a as u64)
}

/// Broadcast a single boolean scalar into a constant matrix of the given
/// shape, for use as the condition operand of [`Matrix::choice`].
fn broadcast_condition(condition: Label, shape_like: &Matrix, f: &mut Factory) -> Matrix {
	let dims = shape_like.dims().to_vec();
	let capacity: usize = dims.iter().product();
	let mut cells = std::collections::BTreeMap::new();
	if condition != Label::ZERO {
		for i in 0..capacity {
			let _ = cells.insert(i as u64, condition);
		}
	}
	Matrix::from_cells(dims, f.id(), cells, f)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bounds::{Bounds, RelationBounds, Sort, Universe};
	use crate::semiring::{Domain, TNorm};
	use std::collections::BTreeSet;

	fn setup() -> (Factory, Bounds) {
		let f = Factory::new(Domain::Integer, TNorm::Godel);
		let bounds = Bounds::new(Universe::new(2));
		(f, bounds)
	}

	#[test]
	fn literal_formula_translates_directly() {
		let (mut f, bounds) = setup();
		let leaves = LeafInterpreter::interpret(&bounds, &mut f, None);
		let mut t = Translator::new(&mut f, &leaves);
		let formula = Rc::new(Formula::BoolLit(true));
		let result = t.translate_formula(&formula).unwrap();
		assert_eq!(result, Label::ONE);
	}

	#[test]
	fn some_of_univ_is_true_when_universe_nonempty() {
		let (mut f, bounds) = setup();
		let leaves = LeafInterpreter::interpret(&bounds, &mut f, None);
		let mut t = Translator::new(&mut f, &leaves);
		let formula = Rc::new(Formula::Some(Rc::new(Expr::Univ)));
		let result = t.translate_formula(&formula).unwrap();
		assert_eq!(result, Label::ONE);
	}

	#[test]
	fn unbound_relation_is_an_error() {
		let (mut f, bounds) = setup();
		let leaves = LeafInterpreter::interpret(&bounds, &mut f, None);
		let mut t = Translator::new(&mut f, &leaves);
		let expr = Rc::new(Expr::Relation("Missing".to_string()));
		assert!(t.translate_expr(&expr).is_err());
	}

	#[test]
	fn trivial_relation_bound_realizes_constant_matrix() {
		let (mut f, mut bounds) = setup();
		let set = BTreeSet::from([0u64]);
		let rb = RelationBounds::new(1, Sort::Boolean, set.clone(), set, "R").unwrap();
		bounds.declare("R", rb);
		let leaves = LeafInterpreter::interpret(&bounds, &mut f, None);
		let mut t = Translator::new(&mut f, &leaves);
		let expr = Rc::new(Expr::Relation("R".to_string()));
		let m = t.translate_expr(&expr).unwrap();
		assert_eq!(m.get(0), Label::ONE);
	}

	#[test]
	fn free_vars_excludes_variables_bound_by_their_own_comprehension() {
		let x = Variable("x".to_string());
		let y = Variable("y".to_string());
		let decl = Decl { variable: x.clone(), multiplicity: Multiplicity::One, domain: Rc::new(Expr::Univ) };
		let body = Rc::new(Formula::Eq(Rc::new(Expr::Var(x.clone())), Rc::new(Expr::Var(y.clone()))));
		let comprehension = Expr::Comprehension(vec![decl], body);
		assert_eq!(free_vars(&comprehension), vec![y]);
	}

	#[test]
	fn free_vars_of_let_excludes_the_bound_name() {
		let x = Variable("x".to_string());
		let y = Variable("y".to_string());
		let expr = Expr::Let(x.clone(), Rc::new(Expr::Var(y.clone())), Rc::new(Expr::Var(x.clone())));
		assert_eq!(free_vars(&expr), vec![y]);
	}

	#[test]
	fn shared_var_node_is_not_misscached_across_quantifier_bindings() {
		let (mut f, bounds) = setup();
		let leaves = LeafInterpreter::interpret(&bounds, &mut f, None);
		let mut t = Translator::new(&mut f, &leaves);
		let x = Variable("x".to_string());
		let shared: Rc<Expr> = Rc::new(Expr::Var(x.clone()));
		// Keep a second handle alive so `translate_expr` judges this node shareable,
		// exactly as a node reached through more than one AST parent would be.
		let _keep_alive = Rc::clone(&shared);

		let mut cells0 = std::collections::BTreeMap::new();
		let _ = cells0.insert(0u64, Label::ONE);
		let bound_to_atom0 = Matrix::from_cells(vec![2], t.factory.id(), cells0, t.factory);

		let mut cells1 = std::collections::BTreeMap::new();
		let _ = cells1.insert(1u64, Label::ONE);
		let bound_to_atom1 = Matrix::from_cells(vec![2], t.factory.id(), cells1, t.factory);

		t.env.push_bindings();
		t.env.bind(x.clone(), bound_to_atom0);
		let r0 = t.translate_expr(&shared).unwrap();
		t.env.pop_bindings();

		t.env.push_bindings();
		t.env.bind(x.clone(), bound_to_atom1);
		let r1 = t.translate_expr(&shared).unwrap();
		t.env.pop_bindings();

		assert_eq!(r0.get(0), Label::ONE);
		assert_eq!(r0.get(1), Label::ZERO);
		assert_eq!(r1.get(0), Label::ZERO);
		assert_eq!(r1.get(1), Label::ONE);
	}
}
