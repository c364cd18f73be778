//! Probabilities, sampling and collapse.
//!
//! All quantities are computed by one weighted traversal over the whole grid
//! at once: the 4 × `r` cell roots are walked together level by level, so a
//! "node" of the traversal is the tuple of cell node ids reached under a
//! partial assignment. Tuples that recur under different partial assignments
//! are evaluated once and memoized.

use rand::Rng;
use rustc_hash::FxHashMap;
use tracing::{ trace, warn };
use crate::{
    bdd::{ NodeId, NodeView, View },
    state::{ signed_value, AlgebraicState, COMPONENTS, WEIGHTS },
};

/// Memo of unconditioned probability mass per cell tuple.
///
/// Entries are tied to the variable order and the node ids they were computed
/// under; the cache empties itself when the order has changed or nodes have
/// been reclaimed since.
#[derive(Clone, Debug, Default)]
pub struct ProbCache {
    stamp: (u64, u64),
    masses: FxHashMap<Box<[NodeId]>, f64>,
}

impl ProbCache {
    pub fn new() -> Self { Self::default() }

    /// Drop every entry.
    pub fn clear(&mut self) { self.masses.clear(); }

    pub fn len(&self) -> usize { self.masses.len() }

    pub fn is_empty(&self) -> bool { self.masses.is_empty() }

    fn validate(&mut self, view: &View) {
        let stamp = (view.generation(), view.collections());
        if stamp != self.stamp {
            self.masses.clear();
            self.stamp = stamp;
        }
    }
}

/// How a variable is treated by a traversal.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Role {
    /// Summed over.
    Free,
    /// Restricted to one value.
    Fixed(bool),
    /// Summed over with sign (-1)^value.
    Parity,
}

struct Masses<'v, 'm> {
    view: View<'v>,
    roles: Vec<Role>,
    memo: &'m mut FxHashMap<Box<[NodeId]>, f64>,
}

impl<'v, 'm> Masses<'v, 'm> {
    fn new(
        view: View<'v>,
        roles: Vec<Role>,
        memo: &'m mut FxHashMap<Box<[NodeId]>, f64>,
    ) -> Self
    {
        Self { view, roles, memo }
    }

    fn top(&self, t: &[NodeId]) -> usize {
        t.iter().map(|id| self.view.level(*id)).min()
            .unwrap_or(self.view.num_vars())
    }

    fn split(&self, t: &[NodeId], level: usize) -> (Vec<NodeId>, Vec<NodeId>) {
        t.iter().map(|id| self.view.cofactors(*id, level)).unzip()
    }

    // weight of summing out the levels in `from..to`, none of which `t`
    // depends on
    fn skip(&self, from: usize, to: usize) -> f64 {
        (from..to)
            .map(|level| match self.roles[self.view.var_at(level)] {
                Role::Free => 2.0,
                Role::Fixed(_) => 1.0,
                Role::Parity => 0.0,
            })
            .product()
    }

    fn leaf(&self, t: &[NodeId]) -> f64 {
        let r = t.len() / COMPONENTS;
        t.chunks(r).zip(WEIGHTS.iter())
            .map(|(bits, w)| {
                *w * signed_value(
                    bits.iter().map(|id| self.view.node(*id) == NodeView::Const(true))
                )
            })
            .sum::<num_complex::Complex64>()
            .norm_sqr()
    }

    /// Mass of `t` summed over every level from `level` down.
    fn from_level(&mut self, t: &[NodeId], level: usize) -> f64 {
        let top = self.top(t);
        let w = self.skip(level, top);
        if w == 0.0 { return 0.0; }
        w * self.at(t, top)
    }

    fn at(&mut self, t: &[NodeId], top: usize) -> f64 {
        if top == self.view.num_vars() { return self.leaf(t); }
        if let Some(m) = self.memo.get(t) { return *m; }
        let role = self.roles[self.view.var_at(top)];
        let (t0, t1) = self.split(t, top);
        let m0
            = if role == Role::Fixed(true) { 0.0 }
            else { self.from_level(&t0, top + 1) };
        let m1
            = if role == Role::Fixed(false) { 0.0 }
            else { self.from_level(&t1, top + 1) };
        let m = if role == Role::Parity { m0 - m1 } else { m0 + m1 };
        self.memo.insert(t.into(), m);
        m
    }
}

impl AlgebraicState {
    fn cell_ids(&self) -> Vec<NodeId> {
        self.grid.iter().flatten().map(|f| f.id()).collect()
    }

    // converts raw integer mass into probability
    fn mass_scale(&self) -> f64 {
        0.5_f64.powi(self.k as i32) * self.norm * self.norm
    }

    fn roles(&self, fixed: &[(usize, bool)], parity: &[usize]) -> Vec<Role> {
        let mut roles = vec![Role::Free; self.n];
        fixed.iter().for_each(|(q, v)| { roles[*q] = Role::Fixed(*v); });
        // Z·Z = I: repeated qubits cancel in pairs
        parity.iter().for_each(|q| {
            roles[*q]
                = if roles[*q] == Role::Parity { Role::Free } else { Role::Parity };
        });
        roles
    }

    // conditioned or signed traversals get a private memo
    fn query(&self, fixed: &[(usize, bool)], parity: &[usize]) -> f64 {
        let mut memo = FxHashMap::default();
        let mut masses
            = Masses::new(self.mgr.view(), self.roles(fixed, parity), &mut memo);
        masses.from_level(&self.cell_ids(), 0) * self.mass_scale()
    }

    /// Sum of all squared amplitude magnitudes. Equals 1 for a normalized
    /// state up to floating-point rounding in the decode.
    pub fn total_probability(&self, cache: &mut ProbCache) -> f64 {
        let view = self.mgr.view();
        cache.validate(&view);
        let mut masses
            = Masses::new(view, vec![Role::Free; self.n], &mut cache.masses);
        masses.from_level(&self.cell_ids(), 0) * self.mass_scale()
    }

    /// Joint probability that each listed qubit has the listed value.
    ///
    /// *Panics if a qubit index is out of range.*
    pub fn probability_of(&self, fixed: &[(usize, bool)]) -> f64 {
        self.query(fixed, &[])
    }

    /// Expectation value of the product of Pauli *Z* over `qubits`,
    /// normalized by the total probability.
    ///
    /// *Panics if a qubit index is out of range.*
    pub fn expectation_z(&self, qubits: &[usize], cache: &mut ProbCache) -> f64 {
        let total = self.total_probability(cache);
        if total == 0.0 { return 0.0; }
        self.query(&[], qubits) / total
    }

    /// Draw a full basis assignment (indexed by qubit) from the Born
    /// distribution without modifying the state.
    ///
    /// Qubits are decided in the current variable order, each from its
    /// probability conditioned on the earlier decisions.
    pub fn sample_one<R>(&self, cache: &mut ProbCache, rng: &mut R) -> Vec<bool>
    where R: Rng + ?Sized
    {
        let view = self.mgr.view();
        cache.validate(&view);
        let mut masses
            = Masses::new(view, vec![Role::Free; self.n], &mut cache.masses);
        let mut t = self.cell_ids();
        let mut bits = vec![false; self.n];
        for level in 0..self.n {
            let var = masses.view.var_at(level);
            if masses.top(&t) > level {
                // both branches carry the same mass
                bits[var] = rng.gen();
                continue;
            }
            let (t0, t1) = masses.split(&t, level);
            let p0 = masses.from_level(&t0, level + 1);
            let p1 = masses.from_level(&t1, level + 1);
            let one = p0 + p1 > 0.0 && rng.gen::<f64>() * (p0 + p1) >= p0;
            bits[var] = one;
            t = if one { t1 } else { t0 };
        }
        trace!(?bits, "sampled");
        bits
    }

    /// Draw values for `qubits` only, in the given order, each from its
    /// marginal probability conditioned on the values already drawn.
    pub fn sample_qubits<R>(&self, qubits: &[usize], rng: &mut R) -> Vec<bool>
    where R: Rng + ?Sized
    {
        let mut fixed: Vec<(usize, bool)> = Vec::with_capacity(qubits.len());
        for q in qubits.iter() {
            fixed.push((*q, false));
            let p0 = self.probability_of(&fixed);
            fixed.pop();
            fixed.push((*q, true));
            let p1 = self.probability_of(&fixed);
            fixed.pop();
            let one = p0 + p1 > 0.0 && rng.gen::<f64>() * (p0 + p1) >= p0;
            fixed.push((*q, one));
        }
        fixed.into_iter().map(|(_, v)| v).collect()
    }

    /// Project onto the given outcomes and renormalize.
    ///
    /// With `reset`, every measured qubit is afterwards returned to ∣0⟩. Returns
    /// the probability of the outcomes relative to the state before collapse;
    /// a zero-probability projection leaves the normalization untouched.
    pub fn collapse(
        &mut self,
        outcomes: &[(usize, bool)],
        reset: bool,
        cache: &mut ProbCache,
    ) -> f64
    {
        let total = self.total_probability(cache);
        let selected = self.probability_of(outcomes);
        let projector = self.mgr.cube(outcomes.iter().copied());
        let resets: Vec<_>
            = outcomes.iter()
            .map(|(q, v)| (*q, *v, self.mgr.nvar(*q)))
            .collect();
        for cell in self.grid.iter_mut().flatten() {
            let mut f = cell.and(&projector);
            if reset {
                for (q, v, zero) in resets.iter() {
                    f = f.restrict(*q, *v).and(zero);
                }
            }
            *cell = f;
        }
        cache.clear();
        let p_rel = if total > 0.0 { selected / total } else { 0.0 };
        if p_rel > 0.0 {
            self.norm /= p_rel.sqrt();
        } else {
            warn!(?outcomes, "collapse onto a zero-probability outcome");
        }
        p_rel
    }

    /// Measure `qubits` in the Z basis: draw outcomes, collapse onto them and
    /// optionally reset the measured qubits to ∣0⟩.
    pub fn measure_qubits<R>(
        &mut self,
        qubits: &[usize],
        reset: bool,
        cache: &mut ProbCache,
        rng: &mut R,
    ) -> Vec<bool>
    where R: Rng + ?Sized
    {
        let bits = self.sample_qubits(qubits, rng);
        let outcomes: Vec<(usize, bool)>
            = qubits.iter().copied().zip(bits.iter().copied()).collect();
        self.collapse(&outcomes, reset, cache);
        bits
    }
}
