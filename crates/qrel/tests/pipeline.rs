//! End-to-end exercise of the translate-and-emit path (C3 through C5)
//! without dispatching to a live solver process, so these tests run in any
//! environment regardless of which SMT backends happen to be installed.

use std::collections::BTreeSet;
use std::rc::Rc;

use qrel::ast::{Decl, Expr, Formula, Multiplicity, ScalarExpr, Variable};
use qrel::bounds::{Bounds, RelationBounds, Sort, Universe};
use qrel::factory::Factory;
use qrel::leaf::LeafInterpreter;
use qrel::scalar::CmpOp;
use qrel::semiring::{Domain, TNorm};
use qrel::smt::emit_problem;
use qrel::translator::Translator;

/// Scenario 4: `R = {a -> 0.5, b -> 0.2}` over `{a, b, c}`; asserting
/// `#R = 0.7` should translate and emit without error, with exactly one
/// primary variable declared for the free weight of `c` (absent from the
/// bounds entirely here, so the whole relation is trivially fixed and no
/// primary variable should be needed at all).
#[test]
fn cardinality_formula_translates_and_emits_cleanly() {
	let mut bounds = Bounds::new(Universe::new(3));
	let fixed = BTreeSet::from([0u64, 1u64]);
	let rb = RelationBounds::new(1, Sort::Quantitative, fixed.clone(), fixed, "R").unwrap();
	bounds.declare("R", rb);

	let mut factory = Factory::new(Domain::Fuzzy, TNorm::Godel);
	let leaves = LeafInterpreter::interpret(&bounds, &mut factory, None);
	let mut translator = Translator::new(&mut factory, &leaves);

	let r = Rc::new(Expr::Relation("R".to_string()));
	let cardinality = Rc::new(ScalarExpr::Sum(r));
	let target = Rc::new(ScalarExpr::DecimalLit("0.7".to_string()));
	let formula = Rc::new(Formula::ScalarCmp(CmpOp::Eq, cardinality, target));

	let root = translator.translate_formula(&formula).expect("translation must succeed");
	let emitted = emit_problem(&factory, &[root], Domain::Fuzzy);

	assert!(emitted.source.contains("check-sat"));
	assert!(emitted.source.starts_with("(set-logic QF_NRA)"));
	assert!(emitted.declared_vars.is_empty(), "bounds were fully trivial, no primary variable expected");
}

/// A bounded universal over a two-element free boolean relation: every
/// quantified instantiation must translate, and the declared-variable count
/// must match exactly the two free booleans the bounds leave undetermined.
#[test]
fn bounded_quantifier_over_free_relation_declares_expected_variables() {
	let mut bounds = Bounds::new(Universe::new(2));
	let rb = RelationBounds::new(1, Sort::Boolean, BTreeSet::new(), BTreeSet::from([0u64, 1u64]), "P").unwrap();
	bounds.declare("P", rb);

	let mut factory = Factory::new(Domain::Integer, TNorm::Godel);
	let leaves = LeafInterpreter::interpret(&bounds, &mut factory, None);
	let mut translator = Translator::new(&mut factory, &leaves);

	let decl = Decl {
		variable: Variable("x".to_string()),
		multiplicity: Multiplicity::One,
		domain: Rc::new(Expr::Univ),
	};
	let p = Rc::new(Expr::Relation("P".to_string()));
	let some_p = Rc::new(Formula::Some(p));
	let formula = Rc::new(Formula::All(vec![decl], some_p));

	let root = translator.translate_formula(&formula).expect("translation must succeed");
	let emitted = emit_problem(&factory, &[root], Domain::Integer);

	assert_eq!(emitted.declared_vars.len(), 2);
	assert!(emitted.source.contains("declare-fun"));
}
