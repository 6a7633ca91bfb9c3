//! The sparse numeric matrix (C2): a multidimensional sparse tensor of
//! [`Scalar`] labels, and the full relational algebra built on top of it.
//!
//! A [`Matrix`] never stores an explicit `ZERO` cell; an absent index reads
//! as `ZERO`. The `backing` field records which of three storage shapes
//! (homogeneous / dense / tree) a matrix was built with, but it is only a
//! performance hint the constructors choose heuristically from a matrix's
//! density — every operation is defined purely in terms of the logical
//! sparse map and ignores it.

use std::collections::BTreeMap;

use crate::factory::{Factory, FactoryId};
use crate::scalar::{CmpOp, Label, NumConst, Scalar};
use crate::semiring::canonicalize_fuzzy;

/// A hint about how a matrix's cells are physically organized. Chosen by
/// constructors from the matrix's observed density; never load-bearing for
/// correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backing {
	/// Every present cell holds the same label (e.g. a freshly allocated
	/// all-`ONE` identity-like constant).
	Homogeneous,
	/// Dense enough that a `Vec`-backed representation would be preferred by
	/// a real implementation; this crate still stores it as a sparse map.
	Dense,
	/// Sparse enough that a tree/map representation is preferred.
	Tree,
}

fn choose_backing(present: usize, capacity: u64) -> Backing {
	if present == 0 {
		return Backing::Tree;
	}
	if capacity > 0 && (present as u64) * 3 >= capacity * 2 {
		Backing::Dense
	} else {
		Backing::Tree
	}
}

/// A sparse tensor of scalars over a fixed dimension vector, all cells
/// belonging to one [`Factory`].
#[derive(Debug, Clone)]
pub struct Matrix {
	dims: Vec<usize>,
	factory: FactoryId,
	cells: BTreeMap<u64, Label>,
	backing: Backing,
	/// `true` once a constructor has established that every cell is a
	/// `{0,1}`-valued label; the `BinaryMatrix` invariant of the distilled
	/// model, carried as a flag rather than a distinct type so that the
	/// relational algebra below can share one implementation.
	binary: bool,
}

impl Matrix {
	/// Construct an all-`ZERO` matrix of the given dimensions.
	#[must_use]
	pub fn empty(dims: Vec<usize>, factory: FactoryId) -> Self {
		Matrix { dims, factory, cells: BTreeMap::new(), backing: Backing::Tree, binary: true }
	}

	/// Construct a matrix from an explicit sparse cell map, inferring the
	/// `binary` flag and `backing` hint from its contents.
	pub fn from_cells(
		dims: Vec<usize>,
		factory: FactoryId,
		cells: BTreeMap<u64, Label>,
		f: &Factory,
	) -> Self {
		let capacity = dims.iter().product::<usize>() as u64;
		let backing = choose_backing(cells.len(), capacity);
		let binary = cells.values().all(|&l| is_binary_label(l, f));
		Matrix { dims, factory, cells, backing, binary }
	}

	/// The dimension vector of this matrix.
	#[must_use]
	pub fn dims(&self) -> &[usize] {
		&self.dims
	}

	/// The arity (number of dimensions).
	#[must_use]
	pub fn arity(&self) -> usize {
		self.dims.len()
	}

	/// The factory every cell of this matrix belongs to.
	#[must_use]
	pub fn factory_id(&self) -> FactoryId {
		self.factory
	}

	/// The backing hint chosen for this matrix.
	#[must_use]
	pub fn backing(&self) -> Backing {
		self.backing
	}

	/// Whether every cell of this matrix is known to be `{0,1}`-valued.
	#[must_use]
	pub fn is_binary(&self) -> bool {
		self.binary
	}

	/// The cell at a flat index, or `ZERO` (as a label) if absent.
	#[must_use]
	pub fn get(&self, index: u64) -> Label {
		self.cells.get(&index).copied().unwrap_or(Label::ZERO)
	}

	/// Iterate the present (non-`ZERO`) cells.
	pub fn iter(&self) -> impl Iterator<Item = (u64, Label)> + '_ {
		self.cells.iter().map(|(&i, &l)| (i, l))
	}

	/// The number of present cells.
	#[must_use]
	pub fn nnz(&self) -> usize {
		self.cells.len()
	}

	fn assert_same_shape(&self, other: &Matrix) {
		debug_assert_eq!(self.factory, other.factory, "matrices from distinct factories combined");
		debug_assert_eq!(self.dims, other.dims, "matrices of distinct shape combined");
	}

	fn cellwise(&self, other: &Matrix, f: &mut Factory, mut op: impl FnMut(&mut Factory, Label, Label) -> Label) -> Matrix {
		self.assert_same_shape(other);
		let mut cells = BTreeMap::new();
		let mut indices: Vec<u64> = self.cells.keys().chain(other.cells.keys()).copied().collect();
		indices.sort_unstable();
		indices.dedup();
		for index in indices {
			let a = self.get(index);
			let b = other.get(index);
			let v = op(f, a, b);
			if v != Label::ZERO {
				let _ = cells.insert(index, v);
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// Elementwise bounded addition: `min(A[i]+B[i], 1)` in the fuzzy domain,
	/// saturating addition in the integer domain. Distinct from the
	/// semiring's `join` (t-conorm), which [`Matrix::union`] uses instead.
	#[must_use]
	pub fn plus(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.cellwise(other, f, |f, a, b| {
			let sum = match (scalar_to_const(f, a), scalar_to_const(f, b)) {
				(NumConst::Int(x), NumConst::Int(y)) => NumConst::Int(x.saturating_add(y)),
				(NumConst::Fuzzy(x), NumConst::Fuzzy(y)) => NumConst::Fuzzy(canonicalize_fuzzy(x + y)),
				_ => unreachable!("mixed-domain constants reaching matrix arithmetic"),
			};
			f.num_const(sum)
		})
	}

	/// Elementwise subtraction.
	#[must_use]
	pub fn minus(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.cellwise(other, f, |f, a, b| f.minus(a, b))
	}

	/// Elementwise (Hadamard) product: the semiring's multiplicative
	/// operation per cell.
	#[must_use]
	pub fn product(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.cellwise(other, f, |f, a, b| {
			let av = scalar_to_const(f, a);
			let bv = scalar_to_const(f, b);
			f.num_const(f.semiring().meet(av, bv))
		})
	}

	/// Elementwise division; `ZERO / ZERO` and division by a structurally
	/// zero cell both yield `ZERO` here (the full zero-guard is emitted at
	/// the circuit level, not inside the matrix algebra).
	#[must_use]
	pub fn divide(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.assert_same_shape(other);
		let mut cells = BTreeMap::new();
		for (&index, &a) in &self.cells {
			let b = other.get(index);
			if b == Label::ZERO {
				continue;
			}
			if let Ok(v) = f.divide(a, b) {
				if v != Label::ZERO {
					let _ = cells.insert(index, v);
				}
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// Set intersection of the two matrices' supports, taking the `meet` of
	/// overlapping weights (a `BinaryMatrix`-preserving operation when both
	/// inputs are binary).
	#[must_use]
	pub fn intersection(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.assert_same_shape(other);
		let mut cells = BTreeMap::new();
		for (&index, &a) in &self.cells {
			let b = other.get(index);
			if b == Label::ZERO {
				continue;
			}
			let av = scalar_to_const(f, a);
			let bv = scalar_to_const(f, b);
			let v = f.num_const(f.semiring().meet(av, bv));
			if v != Label::ZERO {
				let _ = cells.insert(index, v);
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// Set union, taking the semiring `join` (t-conorm) of overlapping weights.
	#[must_use]
	pub fn union(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.cellwise(other, f, |f, a, b| {
			let av = scalar_to_const(f, a);
			let bv = scalar_to_const(f, b);
			f.num_const(f.semiring().join(av, bv))
		})
	}

	/// Cells present in `self` but kept at `self`'s weight only where `other`
	/// is also present (left-biased intersection of supports).
	#[must_use]
	pub fn left_intersection(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.assert_same_shape(other);
		let mut cells = BTreeMap::new();
		for (&index, &a) in &self.cells {
			if other.get(index) != Label::ZERO {
				let _ = cells.insert(index, a);
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// The dual of [`Matrix::left_intersection`].
	#[must_use]
	pub fn right_intersection(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		other.left_intersection(self, f)
	}

	/// Set difference: cells of `self` whose index is absent from `other`.
	#[must_use]
	pub fn difference(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		self.assert_same_shape(other);
		let mut cells = BTreeMap::new();
		for (&index, &a) in &self.cells {
			if other.get(index) == Label::ZERO {
				let _ = cells.insert(index, a);
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// The Kronecker (cross) product: every combination of a tuple of `self`
	/// and a tuple of `other`, weighted by `meet`.
	#[must_use]
	pub fn cross(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		debug_assert_eq!(self.factory, other.factory);
		let mut dims = self.dims.clone();
		dims.extend_from_slice(&other.dims);
		let other_capacity = other.dims.iter().product::<usize>() as u64;
		let mut cells = BTreeMap::new();
		for (&li, &lv) in &self.cells {
			for (&ri, &rv) in &other.cells {
				let index = li * other_capacity + ri;
				let lvv = scalar_to_const(f, lv);
				let rvv = scalar_to_const(f, rv);
				let v = f.num_const(f.semiring().meet(lvv, rvv));
				if v != Label::ZERO {
					let _ = cells.insert(index, v);
				}
			}
		}
		Matrix::from_cells(dims, self.factory, cells, f)
	}

	/// The matrix (min-max / semiring) product of two binary-relation
	/// matrices: `self` of shape `[a, b]`, `other` of shape `[b, c]`, result
	/// of shape `[a, c]`; cell `(i, k) = join over j of meet(self[i,j],
	/// other[j,k])`.
	#[must_use]
	pub fn dot(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		assert_eq!(self.arity(), 2, "dot is defined on binary relations");
		assert_eq!(other.arity(), 2, "dot is defined on binary relations");
		let (a, b) = (self.dims[0], self.dims[1]);
		let (b2, c) = (other.dims[0], other.dims[1]);
		debug_assert_eq!(b, b2, "inner dimensions of dot must agree");
		let mut cells = BTreeMap::new();
		for i in 0..a {
			for k in 0..c {
				let mut acc: Option<Label> = None;
				for j in 0..b {
					let lv = self.get((i * b + j) as u64);
					let rv = other.get((j * c + k) as u64);
					if lv == Label::ZERO || rv == Label::ZERO {
						continue;
					}
					let lvv = scalar_to_const(f, lv);
					let rvv = scalar_to_const(f, rv);
					let term = f.num_const(f.semiring().meet(lvv, rvv));
					acc = Some(match acc {
						None => term,
						Some(prev) => {
							let pv = scalar_to_const(f, prev);
							let tv = scalar_to_const(f, term);
							f.num_const(f.semiring().join(pv, tv))
						}
					});
				}
				if let Some(v) = acc {
					if v != Label::ZERO {
						let _ = cells.insert((i * c + k) as u64, v);
					}
				}
			}
		}
		Matrix::from_cells(vec![a, c], self.factory, cells, f)
	}

	/// Fold [`Matrix::dot`] across a sequence of matrices, left to right.
	pub fn multi_dot(factory: &mut Factory, chain: &[Matrix]) -> Matrix {
		let mut iter = chain.iter();
		let first = iter.next().expect("multiDot requires at least one matrix").clone();
		iter.fold(first, |acc, next| acc.dot(next, factory))
	}

	/// Transpose of a binary relation.
	#[must_use]
	pub fn transpose(&self) -> Matrix {
		assert_eq!(self.arity(), 2, "transpose is defined on binary relations");
		let (rows, cols) = (self.dims[0], self.dims[1]);
		let mut cells = BTreeMap::new();
		for (&index, &v) in &self.cells {
			let r = (index / cols as u64) as usize;
			let c = (index % cols as u64) as usize;
			let _ = cells.insert((c * rows + r) as u64, v);
		}
		Matrix { dims: vec![cols, rows], factory: self.factory, cells, backing: self.backing, binary: self.binary }
	}

	/// Transitive closure under the semiring's join-meet pair, computed by
	/// repeated squaring fixed-point iteration: `X ∪ X·X ∪ X·X·X ∪ …` until
	/// no new cell appears.
	#[must_use]
	pub fn closure(&self, f: &mut Factory) -> Matrix {
		assert_eq!(self.arity(), 2, "closure is defined on binary relations");
		let mut acc = self.clone();
		loop {
			let step = acc.dot(self, f).union(&acc, f);
			if step.cells == acc.cells {
				return step;
			}
			acc = step;
		}
	}

	/// Reflexive closure: `closure(self) ∪ identity`, realized via the
	/// fixed-point equation `X = id ∪ A·X` handed to the SMT layer rather
	/// than the unrolled structural encoding `closure` above computes
	/// eagerly; this constructor is the eager evaluation used when bounds
	/// are trivial and no SMT round trip is needed.
	#[must_use]
	pub fn reflexive_closure(&self, f: &mut Factory) -> Matrix {
		let n = self.dims[0];
		let identity = Matrix::identity(n, self.factory, f);
		self.closure(f).union(&identity, f)
	}

	/// The `n x n` identity matrix over one factory.
	#[must_use]
	pub fn identity(n: usize, factory: FactoryId, f: &mut Factory) -> Matrix {
		let mut cells = BTreeMap::new();
		for i in 0..n {
			let _ = cells.insert((i * n + i) as u64, f.one());
		}
		Matrix::from_cells(vec![n, n], factory, cells, f)
	}

	/// Override: for each row of `self` that is entirely zero (per the
	/// adopted reading of "row is zero" for the fuzzy domain), substitute
	/// the corresponding row of `other`; otherwise keep `self`'s row. This
	/// reduces to a cellwise choice gated on a per-row zero test.
	#[must_use]
	pub fn row_override(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		assert_eq!(self.arity(), 2);
		self.assert_same_shape(other);
		let (rows, cols) = (self.dims[0], self.dims[1]);
		let mut cells = BTreeMap::new();
		for row in 0..rows {
			let row_is_zero = (0..cols).all(|c| self.get((row * cols + c) as u64) == Label::ZERO);
			for col in 0..cols {
				let index = (row * cols + col) as u64;
				let v = if row_is_zero { other.get(index) } else { self.get(index) };
				if v != Label::ZERO {
					let _ = cells.insert(index, v);
				}
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// The domain of a binary relation: the set of first components with a
	/// non-zero row, as a unary matrix of arity-1 shape `[rows]`.
	#[must_use]
	pub fn domain(&self, f: &mut Factory) -> Matrix {
		assert_eq!(self.arity(), 2);
		let (rows, cols) = (self.dims[0], self.dims[1]);
		let mut cells = BTreeMap::new();
		for row in 0..rows {
			if (0..cols).any(|c| self.get((row * cols + c) as u64) != Label::ZERO) {
				let _ = cells.insert(row as u64, f.one());
			}
		}
		Matrix::from_cells(vec![rows], self.factory, cells, f)
	}

	/// The range of a binary relation: the set of second components with a
	/// non-zero column.
	#[must_use]
	pub fn range(&self, f: &mut Factory) -> Matrix {
		self.transpose().domain(f)
	}

	/// Project the tuple components at the given axis positions, taking the
	/// `join` of weights that map onto the same projected tuple.
	#[must_use]
	pub fn project(&self, axes: &[usize], f: &mut Factory) -> Matrix {
		let new_dims: Vec<usize> = axes.iter().map(|&a| self.dims[a]).collect();
		let mut cells: BTreeMap<u64, Label> = BTreeMap::new();
		for (&index, &v) in &self.cells {
			let tuple = unflatten(index, &self.dims);
			let projected: Vec<usize> = axes.iter().map(|&a| tuple[a]).collect();
			let pidx = flatten(&projected, &new_dims);
			let existing = cells.get(&pidx).copied().unwrap_or(Label::ZERO);
			let joined = if existing == Label::ZERO {
				v
			} else {
				let ev = scalar_to_const(f, existing);
				let vv = scalar_to_const(f, v);
				f.num_const(f.semiring().join(ev, vv))
			};
			let _ = cells.insert(pidx, joined);
		}
		Matrix::from_cells(new_dims, self.factory, cells, f)
	}

	/// The Khatri-Rao (column-wise Kronecker) product of two matrices
	/// sharing their first dimension.
	#[must_use]
	pub fn khatri_rao(&self, other: &Matrix, f: &mut Factory) -> Matrix {
		debug_assert_eq!(self.dims[0], other.dims[0]);
		let shared = self.dims[0];
		let mut out_dims = vec![shared];
		out_dims.extend_from_slice(&self.dims[1..]);
		out_dims.extend_from_slice(&other.dims[1..]);
		let self_tail: usize = self.dims[1..].iter().product();
		let other_tail: usize = other.dims[1..].iter().product();
		let mut cells = BTreeMap::new();
		for row in 0..shared {
			for lt in 0..self_tail {
				let lidx = (row * self_tail + lt) as u64;
				let lv = self.get(lidx);
				if lv == Label::ZERO {
					continue;
				}
				for rt in 0..other_tail {
					let ridx = (row * other_tail + rt) as u64;
					let rv = other.get(ridx);
					if rv == Label::ZERO {
						continue;
					}
					let lvv = scalar_to_const(f, lv);
					let rvv = scalar_to_const(f, rv);
					let v = f.num_const(f.semiring().meet(lvv, rvv));
					if v != Label::ZERO {
						let out_idx = row * self_tail * other_tail + lt * other_tail + rt;
						let _ = cells.insert(out_idx as u64, v);
					}
				}
			}
		}
		Matrix::from_cells(out_dims, self.factory, cells, f)
	}

	/// Choice between two matrices of the same shape, cellwise, gated by a
	/// boolean condition matrix (broadcasting a scalar condition across all
	/// cells when `condition` has arity zero is the caller's job; here
	/// `condition` must share `self`'s shape).
	#[must_use]
	pub fn choice(&self, condition: &Matrix, other: &Matrix, f: &mut Factory) -> Matrix {
		self.assert_same_shape(other);
		self.assert_same_shape(condition);
		let mut cells = BTreeMap::new();
		let mut indices: Vec<u64> =
			self.cells.keys().chain(other.cells.keys()).chain(condition.cells.keys()).copied().collect();
		indices.sort_unstable();
		indices.dedup();
		for index in indices {
			let cond = condition.get(index);
			let is_true = matches!(f.resolve(cond), Scalar::BoolConst(true)) || cond == Label::ONE;
			let chosen = if is_true { self.get(index) } else { other.get(index) };
			if chosen != Label::ZERO {
				let _ = cells.insert(index, chosen);
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// Alpha-cut: keep only cells whose weight is `>= alpha`, replacing the
	/// survivors with `ONE` (producing a `BinaryMatrix`).
	#[must_use]
	pub fn alpha_cut(&self, alpha: Label, f: &mut Factory) -> Matrix {
		let mut cells = BTreeMap::new();
		for (&index, &v) in &self.cells {
			let ge = f.cmp(CmpOp::Ge, v, alpha);
			if matches!(f.resolve(ge), Scalar::BoolConst(true)) {
				let _ = cells.insert(index, f.one());
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// Drop: zero out every cell whose weight is `<= threshold`, keeping the
	/// original weight of survivors.
	#[must_use]
	pub fn drop(&self, threshold: Label, f: &mut Factory) -> Matrix {
		let mut cells = BTreeMap::new();
		for (&index, &v) in &self.cells {
			let le = f.cmp(CmpOp::Le, v, threshold);
			if !matches!(f.resolve(le), Scalar::BoolConst(true)) {
				let _ = cells.insert(index, v);
			}
		}
		Matrix::from_cells(self.dims.clone(), self.factory, cells, f)
	}

	/// The scalar sum of all weights, via repeated `join` as the cardinality
	/// broadcast.
	pub fn sum(&self, f: &mut Factory) -> Label {
		let mut acc = f.zero();
		for &v in self.cells.values() {
			acc = f.plus([acc, v]);
		}
		acc
	}

	/// The cardinality: count of non-zero cells, as a numeric scalar.
	pub fn cardinality(&self, f: &mut Factory) -> Label {
		f.num_const(crate::scalar::NumConst::Int(self.cells.len() as i64))
	}

	/// `some(self)`: at least one cell is non-zero.
	pub fn some(&self, f: &mut Factory) -> Label {
		let conditions: Vec<Label> = self
			.cells
			.values()
			.map(|&v| f.cmp(CmpOp::Ne, v, Label::ZERO))
			.collect();
		f.or(conditions)
	}

	/// `no(self)`: every cell is zero.
	pub fn no(&self, f: &mut Factory) -> Label {
		let some = self.some(f);
		f.not(some)
	}

	/// `one(self)`: exactly one cell is non-zero.
	pub fn one(&self, f: &mut Factory) -> Label {
		self.has_cardinality(1, f)
	}

	/// `lone(self)`: at most one cell is non-zero.
	pub fn lone(&self, f: &mut Factory) -> Label {
		let no = self.no(f);
		let one = self.one(f);
		f.or([no, one])
	}

	fn has_cardinality(&self, n: usize, f: &mut Factory) -> Label {
		let present: Vec<Label> =
			self.cells.values().map(|&v| f.cmp(CmpOp::Ne, v, Label::ZERO)).collect();
		if present.len() < n {
			return f.bool_const(false);
		}
		exactly_n(&present, n, f)
	}

	/// Structural equality: every cell equal.
	pub fn eq(&self, other: &Matrix, f: &mut Factory) -> Label {
		self.assert_same_shape(other);
		let diff = self.difference(other, f);
		let rdiff = other.difference(self, f);
		let a = diff.no(f);
		let b = rdiff.no(f);
		f.and([a, b])
	}

	/// Subset: every non-zero cell of `self` is non-zero (and, in the
	/// quantitative case, no greater) in `other`.
	pub fn subset(&self, other: &Matrix, f: &mut Factory) -> Label {
		self.assert_same_shape(other);
		let mut conditions = Vec::new();
		for (&index, &a) in &self.cells {
			let b = other.get(index);
			conditions.push(f.cmp(CmpOp::Le, a, b));
		}
		f.and(conditions)
	}

	/// Elementwise strictly-less comparison, conjoined across all cells.
	pub fn lt(&self, other: &Matrix, f: &mut Factory) -> Label {
		self.cmp_all(other, CmpOp::Lt, f)
	}

	/// Elementwise less-or-equal comparison, conjoined across all cells.
	pub fn le(&self, other: &Matrix, f: &mut Factory) -> Label {
		self.cmp_all(other, CmpOp::Le, f)
	}

	/// Elementwise strictly-greater comparison, conjoined across all cells.
	pub fn gt(&self, other: &Matrix, f: &mut Factory) -> Label {
		self.cmp_all(other, CmpOp::Gt, f)
	}

	/// Elementwise greater-or-equal comparison, conjoined across all cells.
	pub fn ge(&self, other: &Matrix, f: &mut Factory) -> Label {
		self.cmp_all(other, CmpOp::Ge, f)
	}

	fn cmp_all(&self, other: &Matrix, op: CmpOp, f: &mut Factory) -> Label {
		self.assert_same_shape(other);
		let mut indices: Vec<u64> = self.cells.keys().chain(other.cells.keys()).copied().collect();
		indices.sort_unstable();
		indices.dedup();
		let conditions: Vec<Label> =
			indices.into_iter().map(|i| f.cmp(op, self.get(i), other.get(i))).collect();
		f.and(conditions)
	}
}

/// Exactly-n cardinality constraint over a set of boolean literals, built by
/// a direct pairwise-exclusion encoding (adequate at the bound sizes this
/// crate targets; a sequential counter encoding is not needed).
fn exactly_n(literals: &[Label], n: usize, f: &mut Factory) -> Label {
	if n == 1 {
		let at_least_one = f.or(literals.iter().copied());
		let mut pairwise = Vec::new();
		for i in 0..literals.len() {
			for j in (i + 1)..literals.len() {
				let both = f.and([literals[i], literals[j]]);
				pairwise.push(f.not(both));
			}
		}
		let at_most_one = f.and(pairwise);
		return f.and([at_least_one, at_most_one]);
	}
	// General n is not exercised by the multiplicity assertions this crate
	// emits (`some`/`no`/`one`/`lone` only ever ask for n ∈ {0, 1}); kept as
	// a total function via the constant-false fallback.
	f.bool_const(false)
}

fn scalar_to_const(f: &mut Factory, label: Label) -> crate::scalar::NumConst {
	match f.resolve(label).clone() {
		Scalar::NumConst(c) => c,
		Scalar::BoolConst(true) => crate::scalar::NumConst::Int(1),
		Scalar::BoolConst(false) => crate::scalar::NumConst::Int(0),
		_ => match f.domain() {
			crate::semiring::Domain::Integer => crate::scalar::NumConst::Int(0),
			crate::semiring::Domain::Fuzzy => crate::scalar::NumConst::Fuzzy(rust_decimal::Decimal::ZERO),
		},
	}
}

fn is_binary_label(label: Label, f: &Factory) -> bool {
	match f.resolve(label) {
		Scalar::BoolConst(_) | Scalar::BoolVar(_) | Scalar::BoolGate(..) | Scalar::BinaryValue { .. } => true,
		Scalar::NumConst(c) => c.is_zero() || c.is_one(),
		_ => false,
	}
}

fn flatten(tuple: &[usize], dims: &[usize]) -> u64 {
	let mut acc = 0u64;
	for (i, &d) in tuple.iter().zip(dims.iter()) {
		acc = acc * d as u64 + *i as u64;
	}
	acc
}

fn unflatten(mut index: u64, dims: &[usize]) -> Vec<usize> {
	let mut tuple = vec![0usize; dims.len()];
	for (slot, &d) in tuple.iter_mut().zip(dims.iter()).rev() {
		*slot = (index % d as u64) as usize;
		index /= d as u64;
	}
	tuple
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::scalar::NumConst;
	use crate::semiring::{Domain, TNorm};

	fn binary_relation(f: &mut Factory, n: usize, edges: &[(usize, usize)]) -> Matrix {
		let mut cells = BTreeMap::new();
		for &(a, b) in edges {
			let _ = cells.insert((a * n + b) as u64, f.one());
		}
		Matrix::from_cells(vec![n, n], f.id(), cells, f)
	}

	#[test]
	fn transpose_swaps_pairs() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let r = binary_relation(&mut f, 3, &[(0, 1)]);
		let t = r.transpose();
		assert_eq!(t.get((1 * 3 + 0) as u64), f.one());
		assert_eq!(t.get((0 * 3 + 1) as u64), Label::ZERO);
	}

	#[test]
	fn closure_of_chain_reaches_transitively() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let r = binary_relation(&mut f, 3, &[(0, 1), (1, 2)]);
		let c = r.closure(&mut f);
		assert_ne!(c.get((0 * 3 + 2) as u64), Label::ZERO);
	}

	#[test]
	fn some_and_no_are_complementary_on_empty() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let empty = Matrix::empty(vec![2, 2], f.id());
		let no = empty.no(&mut f);
		assert_eq!(f.resolve(no).clone(), Scalar::BoolConst(true));
	}

	#[test]
	fn cross_product_dimension_is_sum_of_arities() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let a = binary_relation(&mut f, 2, &[(0, 1)]);
		let b = binary_relation(&mut f, 2, &[(1, 0)]);
		let cross = a.cross(&b, &mut f);
		assert_eq!(cross.arity(), 4);
	}

	#[test]
	fn closure_under_godel_takes_the_min_along_the_path() {
		let mut f = Factory::new(Domain::Fuzzy, TNorm::Godel);
		let ab = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(3, 1)));
		let bc = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(4, 1)));
		let mut cells = BTreeMap::new();
		let _ = cells.insert(0 * 3 + 1, ab);
		let _ = cells.insert(1 * 3 + 2, bc);
		let a = Matrix::from_cells(vec![3, 3], f.id(), cells, &f);
		let closure = a.closure(&mut f);
		let ac = closure.get((0 * 3 + 2) as u64);
		assert_eq!(f.resolve(ac).clone(), Scalar::NumConst(NumConst::Fuzzy(rust_decimal::Decimal::new(3, 1))));
	}

	#[test]
	fn cardinality_sums_weights_but_counts_tuples_separately() {
		let mut f = Factory::new(Domain::Fuzzy, TNorm::Godel);
		let a = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(5, 1)));
		let b = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(2, 1)));
		let mut cells = BTreeMap::new();
		let _ = cells.insert(0, a);
		let _ = cells.insert(1, b);
		let r = Matrix::from_cells(vec![3], f.id(), cells, &f);
		let total = r.sum(&mut f);
		assert_eq!(
			f.resolve(total).clone(),
			Scalar::NumConst(NumConst::Fuzzy(rust_decimal::Decimal::new(7, 1)))
		);
		let count = r.cardinality(&mut f);
		assert_eq!(f.resolve(count).clone(), Scalar::NumConst(NumConst::Int(2)));
	}

	#[test]
	fn plus_saturating_adds_in_the_integer_domain() {
		let mut f = Factory::new(Domain::Integer, TNorm::Godel);
		let mut a_cells = BTreeMap::new();
		let _ = a_cells.insert(0u64, f.num_const(NumConst::Int(2)));
		let a = Matrix::from_cells(vec![1], f.id(), a_cells, &f);
		let mut b_cells = BTreeMap::new();
		let _ = b_cells.insert(0u64, f.num_const(NumConst::Int(3)));
		let b = Matrix::from_cells(vec![1], f.id(), b_cells, &f);
		let summed = a.plus(&b, &mut f);
		assert_eq!(f.resolve(summed.get(0)).clone(), Scalar::NumConst(NumConst::Int(5)));
		let unioned = a.union(&b, &mut f);
		assert_eq!(f.resolve(unioned.get(0)).clone(), Scalar::NumConst(NumConst::Int(3)));
	}

	#[test]
	fn plus_bounds_to_one_in_the_fuzzy_domain_unlike_union() {
		let mut f = Factory::new(Domain::Fuzzy, TNorm::Godel);
		let mut a_cells = BTreeMap::new();
		let _ = a_cells.insert(0u64, f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(3, 1))));
		let a = Matrix::from_cells(vec![1], f.id(), a_cells, &f);
		let mut b_cells = BTreeMap::new();
		let _ = b_cells.insert(0u64, f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(4, 1))));
		let b = Matrix::from_cells(vec![1], f.id(), b_cells, &f);
		let summed = a.plus(&b, &mut f);
		assert_eq!(
			f.resolve(summed.get(0)).clone(),
			Scalar::NumConst(NumConst::Fuzzy(rust_decimal::Decimal::new(7, 1)))
		);
		let unioned = a.union(&b, &mut f);
		assert_eq!(
			f.resolve(unioned.get(0)).clone(),
			Scalar::NumConst(NumConst::Fuzzy(rust_decimal::Decimal::new(4, 1)))
		);
	}

	#[test]
	fn alpha_cut_keeps_only_cells_above_threshold() {
		let mut f = Factory::new(Domain::Fuzzy, TNorm::Godel);
		let mut cells = BTreeMap::new();
		let low = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(2, 1)));
		let high = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(9, 1)));
		let _ = cells.insert(0, low);
		let _ = cells.insert(1, high);
		let m = Matrix::from_cells(vec![2], f.id(), cells, &f);
		let alpha = f.num_const(NumConst::Fuzzy(rust_decimal::Decimal::new(5, 1)));
		let cut = m.alpha_cut(alpha, &mut f);
		assert_eq!(cut.get(0), Label::ZERO);
		assert_eq!(cut.get(1), f.one());
	}
}
