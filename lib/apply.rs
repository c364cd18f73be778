//! Gate application as integer arithmetic over the state grid.
//!
//! Permutation gates only substitute qubit literals into every cell. Phase
//! gates move coefficients between components, negating some of them. The
//! 1/√2-scaling gates (H, √X, √Y) add two coefficient rows per component with
//! a ripple-carry adder built from diagram operations, and bump `k`.
//!
//! Every addition checks for two's-complement overflow before computing its
//! top bit. When growth is enabled an overflow widens the whole grid and the
//! ripple continues on the wider operands; otherwise the result wraps and the
//! event is counted.

use tracing::debug;
use crate::{
    bdd::Func,
    error::GateError,
    gate::{ Gate, Phase },
    state::{ AlgebraicState, COMPONENTS },
};

type Rows = [Vec<Func>; COMPONENTS];

fn sign_extend(row: &mut Vec<Func>, r: usize) {
    if row.len() >= r { return; }
    if let Some(top) = row.last().cloned() {
        row.resize(r, top);
    }
}

fn half_add(g: &Func, c: &Func) -> (Func, Func) {
    (g ^ c, g & c)
}

fn full_add(g: &Func, h: &Func, c: &Func) -> (Func, Func) {
    let sum = g ^ h ^ c;
    let carry = (g & h) | (c & &(g | h));
    (sum, carry)
}

// `f` with qubit `t` negated
fn flip(f: &Func, t: usize, x: &Func) -> Func {
    x.ite(&f.restrict(t, false), &f.restrict(t, true))
}

fn flip_rows(rows: &Rows, t: usize, x: &Func) -> Rows {
    std::array::from_fn(|c| rows[c].iter().map(|f| flip(f, t, x)).collect())
}

// `f` with qubits `a` and `b` exchanged
fn swap(f: &Func, a: usize, b: usize, xa: &Func, xb: &Func) -> Func {
    let f0 = f.restrict(a, false);
    let f1 = f.restrict(a, true);
    let f00 = f0.restrict(b, false);
    let f01 = f0.restrict(b, true);
    let f10 = f1.restrict(b, false);
    let f11 = f1.restrict(b, true);
    xa.ite(&xb.ite(&f11, &f01), &xb.ite(&f10, &f00))
}

impl AlgebraicState {
    /// Apply a gate.
    ///
    /// Fails without touching the state if the gate names a qubit outside the
    /// register or names the same qubit twice.
    pub fn apply_gate(&mut self, gate: &Gate) -> Result<&mut Self, GateError> {
        gate.validate(self.n)?;
        match gate {
            Gate::H(k) => { self.hadamard(*k); },
            Gate::X(k) => { self.toffoli(*k, &[], &[]); },
            Gate::Y(k) => { self.pauli_y(*k); },
            Gate::Z(k) => { self.phase_shift(Phase::Pi, &[*k]); },
            Gate::S(k) => { self.phase_shift(Phase::Pi1h, &[*k]); },
            Gate::SInv(k) => { self.phase_shift(Phase::Pi3h, &[*k]); },
            Gate::T(k) => { self.phase_shift(Phase::Pi1q, &[*k]); },
            Gate::TInv(k) => { self.phase_shift(Phase::Pi7q, &[*k]); },
            Gate::SqrtX(k) => { self.sqrt_x(*k); },
            Gate::SqrtY(k) => { self.sqrt_y(*k); },
            Gate::CX(c, t) => { self.toffoli(*t, &[*c], &[]); },
            Gate::CZ(a, b) => { self.phase_shift(Phase::Pi, &[*a, *b]); },
            Gate::MCZ(qs) => { self.phase_shift(Phase::Pi, qs); },
            Gate::Swap(a, b) => { self.fredkin(*a, *b, &[]); },
            Gate::Toffoli { target, controls, ncontrols }
                => { self.toffoli(*target, controls, ncontrols); },
            Gate::Fredkin { a, b, controls }
                => { self.fredkin(*a, *b, controls); },
            Gate::Peres(a, b, c) => {
                self.toffoli(*c, &[*a, *b], &[]);
                self.toffoli(*b, &[*a], &[]);
            },
            Gate::PeresInv(a, b, c) => {
                self.toffoli(*b, &[*a], &[]);
                self.toffoli(*c, &[*a, *b], &[]);
            },
        }
        if gate.is_scaling() { self.reduce_scale(); }
        Ok(self)
    }

    /// Apply a sequence of gates, stopping at the first invalid one.
    pub fn apply_circuit<'a, I>(&mut self, gates: I) -> Result<&mut Self, GateError>
    where I: IntoIterator<Item = &'a Gate>
    {
        for gate in gates.into_iter() { self.apply_gate(gate)?; }
        Ok(self)
    }

    fn condition(&self, controls: &[usize], ncontrols: &[usize]) -> Func {
        self.mgr.cube(
            controls.iter().map(|q| (*q, true))
                .chain(ncontrols.iter().map(|q| (*q, false)))
        )
    }

    fn install(&mut self, mut rows: Rows) {
        let r
            = rows.iter().map(Vec::len)
            .fold(self.precision(), usize::max);
        rows.iter_mut().for_each(|row| sign_extend(row, r));
        drop(std::mem::replace(&mut self.grid, rows));
    }

    fn overflows(g: &Func, h: Option<&Func>, c: &Func) -> bool {
        match h {
            Some(h) => ((g ^ c) & g.xnor(h)).is_satisfiable(),
            None => (!g & c).is_satisfiable(),
        }
    }

    /// Ripple-carry `g + h + carry`, or `g + carry` without `h`, over the
    /// current precision. Shorter operands are sign-extended first.
    fn add(&mut self, mut g: Vec<Func>, mut h: Option<Vec<Func>>, carry: Func)
        -> Vec<Func>
    {
        let r = self.precision();
        sign_extend(&mut g, r);
        if let Some(h) = h.as_mut() { sign_extend(h, r); }
        let mut out: Vec<Func> = Vec::with_capacity(r);
        let mut c = carry;
        let mut b = 0;
        while b < g.len() {
            if h.is_none() && c.is_false() {
                out.extend(g.drain(b..));
                break;
            }
            let top = b + 1 == g.len();
            if top && Self::overflows(&g[b], h.as_ref().map(|h| &h[b]), &c) {
                if self.growth.enabled {
                    let step = self.growth.step;
                    self.grow_precision(step);
                    self.growth.events += 1;
                    let r = self.precision();
                    sign_extend(&mut g, r);
                    if let Some(h) = h.as_mut() { sign_extend(h, r); }
                    debug!(precision = r, events = self.growth.events, "coefficient overflow, precision grown");
                    continue;
                }
                self.growth.ignored += 1;
            }
            let (sum, next)
                = match h.as_ref() {
                    Some(h) => full_add(&g[b], &h[b], &c),
                    None => half_add(&g[b], &c),
                };
            out.push(sum);
            c = next;
            b += 1;
        }
        out
    }

    fn toffoli(&mut self, target: usize, controls: &[usize], ncontrols: &[usize]) {
        let cond = self.condition(controls, ncontrols);
        let x = self.mgr.var(target);
        for cell in self.grid.iter_mut().flatten() {
            let flipped = flip(cell, target, &x);
            *cell = cond.ite(&flipped, cell);
        }
    }

    fn fredkin(&mut self, a: usize, b: usize, controls: &[usize]) {
        let cond = self.condition(controls, &[]);
        let xa = self.mgr.var(a);
        let xb = self.mgr.var(b);
        for cell in self.grid.iter_mut().flatten() {
            let swapped = swap(cell, a, b, &xa, &xb);
            *cell = cond.ite(&swapped, cell);
        }
    }

    /// Multiply every amplitude where all of `qubits` are ∣1⟩ by `phase`.
    fn phase_shift(&mut self, phase: Phase, qubits: &[usize]) {
        let cond = self.condition(qubits, &[]);
        let old = self.grid.clone();
        let mut new = Rows::default();
        for (src, row) in old.iter().enumerate() {
            let (dst, negate) = phase.rotate(src);
            let kept = &old[dst];
            new[dst]
                = if negate {
                    // ¬v + 1 = -v where the condition holds
                    let inv: Vec<Func>
                        = row.iter().zip(kept)
                        .map(|(s, d)| cond.ite(&!s, d))
                        .collect();
                    self.add(inv, None, cond.clone())
                } else {
                    row.iter().zip(kept).map(|(s, d)| cond.ite(s, d)).collect()
                };
        }
        self.install(new);
    }

    fn hadamard(&mut self, t: usize) {
        let x = self.mgr.var(t);
        let old = self.grid.clone();
        let mut new = Rows::default();
        for (c, row) in old.iter().enumerate() {
            let g: Vec<Func> = row.iter().map(|f| f.restrict(t, false)).collect();
            let h: Vec<Func> = row.iter().map(|f| f.restrict(t, true) ^ &x).collect();
            new[c] = self.add(g, Some(h), x.clone());
        }
        self.install(new);
        self.k += 1;
    }

    // (1/√2)[[1, -i], [-i, 1]]
    fn sqrt_x(&mut self, t: usize) {
        let x = self.mgr.var(t);
        let old = self.grid.clone();
        let flipped = flip_rows(&old, t, &x);
        let mut new = Rows::default();
        for (src, row) in flipped.iter().enumerate() {
            let (dst, negate) = Phase::Pi3h.rotate(src);
            let (h, carry)
                = if negate {
                    (row.iter().map(|f| !f).collect(), self.mgr.tt())
                } else {
                    (row.clone(), self.mgr.ff())
                };
            new[dst] = self.add(old[dst].clone(), Some(h), carry);
        }
        self.install(new);
        self.k += 1;
    }

    // (1/√2)[[1, -1], [1, 1]]
    fn sqrt_y(&mut self, t: usize) {
        let x = self.mgr.var(t);
        let nx = !&x;
        let old = self.grid.clone();
        let flipped = flip_rows(&old, t, &x);
        let mut new = Rows::default();
        for (c, row) in flipped.iter().enumerate() {
            let h: Vec<Func> = row.iter().map(|f| f ^ &nx).collect();
            new[c] = self.add(old[c].clone(), Some(h), nx.clone());
        }
        self.install(new);
        self.k += 1;
    }

    // swap the two halves, then multiply by i on ∣1⟩ and -i on ∣0⟩
    fn pauli_y(&mut self, t: usize) {
        let x = self.mgr.var(t);
        let flipped = flip_rows(&self.grid, t, &x);
        let mut new = Rows::default();
        for (src, row) in flipped.iter().enumerate() {
            let (dst, negate_on_one) = Phase::Pi1h.rotate(src);
            let negf = if negate_on_one { x.clone() } else { !&x };
            let h: Vec<Func> = row.iter().map(|f| f ^ &negf).collect();
            new[dst] = self.add(h, None, negf);
        }
        self.install(new);
    }
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use num_complex::Complex64 as C64;
    use rand::{ rngs::StdRng, Rng, SeedableRng };
    use crate::bdd::Manager;
    use super::*;

    fn zero_state(n: usize) -> AlgebraicState {
        AlgebraicState::basis(&Manager::new(n), 8, &[])
    }

    fn assert_amplitudes(state: &AlgebraicState, expected: &[C64]) {
        let psi = state.amplitudes().unwrap();
        for (a, e) in psi.iter().zip(expected) {
            assert_relative_eq!(a.re, e.re, epsilon = 1e-9);
            assert_relative_eq!(a.im, e.im, epsilon = 1e-9);
        }
    }

    fn c(re: f64, im: f64) -> C64 { C64::new(re, im) }

    #[test]
    fn x_twice_is_bit_identical() {
        let mut state = zero_state(2);
        state.apply_gate(&Gate::H(0)).unwrap()
            .apply_gate(&Gate::T(0)).unwrap()
            .apply_gate(&Gate::CX(0, 1)).unwrap();
        let before = state.grid().clone();
        state.apply_gate(&Gate::X(1)).unwrap();
        assert_ne!(state.grid(), &before);
        state.apply_gate(&Gate::X(1)).unwrap();
        assert_eq!(state.grid(), &before);
    }

    #[test]
    fn hadamard_twice_is_bit_identical() {
        let mut state = zero_state(1);
        let before = state.grid().clone();
        state.apply_gate(&Gate::H(0)).unwrap();
        assert_eq!(state.k(), 1);
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert_amplitudes(&state, &[c(h, 0.0), c(h, 0.0)]);
        state.apply_gate(&Gate::H(0)).unwrap();
        assert_eq!(state.k(), 0);
        assert_eq!(state.grid(), &before);
    }

    #[test]
    fn t_eight_times_is_identity() {
        let mut state = zero_state(1);
        state.apply_gate(&Gate::H(0)).unwrap();
        let before = state.grid().clone();
        for _ in 0..8 { state.apply_gate(&Gate::T(0)).unwrap(); }
        assert_eq!(state.grid(), &before);
    }

    #[test]
    fn pauli_y() {
        let mut state = zero_state(1);
        state.apply_gate(&Gate::Y(0)).unwrap();
        assert_amplitudes(&state, &[c(0.0, 0.0), c(0.0, 1.0)]);
        state.apply_gate(&Gate::Y(0)).unwrap();
        assert_amplitudes(&state, &[c(1.0, 0.0), c(0.0, 0.0)]);
    }

    #[test]
    fn square_roots() {
        let mut state = zero_state(1);
        state.apply_gate(&Gate::SqrtX(0)).unwrap()
            .apply_gate(&Gate::SqrtX(0)).unwrap();
        assert_amplitudes(&state, &[c(0.0, 0.0), c(0.0, -1.0)]);
        let mut state = zero_state(1);
        state.apply_gate(&Gate::SqrtY(0)).unwrap()
            .apply_gate(&Gate::SqrtY(0)).unwrap();
        assert_amplitudes(&state, &[c(0.0, 0.0), c(1.0, 0.0)]);
        assert_eq!(state.k(), 0);
    }

    #[test]
    fn controlled_permutations() {
        let mgr = Manager::new(3);
        // ∣q2 q1 q0⟩ = ∣001⟩
        let mut state = AlgebraicState::basis(&mgr, 4, &[true, false, false]);
        state.apply_gate(&Gate::Toffoli {
            target: 2, controls: vec![0], ncontrols: vec![1] }).unwrap();
        assert_eq!(state.algebraic_amplitude(0b101).unwrap().coeffs, [0, 0, 0, 1]);
        state.apply_gate(&Gate::Fredkin { a: 1, b: 2, controls: vec![0] }).unwrap();
        assert_eq!(state.algebraic_amplitude(0b011).unwrap().coeffs, [0, 0, 0, 1]);
        state.apply_gate(&Gate::Swap(0, 2)).unwrap();
        assert_eq!(state.algebraic_amplitude(0b110).unwrap().coeffs, [0, 0, 0, 1]);
        let before = state.grid().clone();
        state.apply_gate(&Gate::Peres(1, 2, 0)).unwrap()
            .apply_gate(&Gate::PeresInv(1, 2, 0)).unwrap();
        assert_eq!(state.grid(), &before);
    }

    #[test]
    fn invalid_gate_leaves_state() {
        let mut state = zero_state(2);
        let before = state.grid().clone();
        assert_eq!(
            state.apply_gate(&Gate::H(2)).err(),
            Some(GateError::OutOfRange { qubit: 2, n: 2 }),
        );
        assert_eq!(
            state.apply_gate(&Gate::CZ(1, 1)).err(),
            Some(GateError::Duplicate(1)),
        );
        assert_eq!(state.grid(), &before);
        assert_eq!(state.k(), 0);
    }

    #[test]
    fn overflow_grows_once() {
        let mgr = Manager::new(1);
        let matrix = vec![vec![0, 0], vec![0, 0], vec![0, 0], vec![7, 7]];
        let mut state = AlgebraicState::from_matrix(&mgr, 4, 1, &matrix).unwrap();
        assert_eq!(state.precision(), 4);
        // 7 + 7 does not fit in 4 bits
        state.apply_gate(&Gate::H(0)).unwrap();
        assert_eq!(state.growth().events, 1);
        assert_eq!(state.growth().ignored, 0);
        assert_eq!(state.precision(), 7);
        // 14 / (√2)^2 = 7 after the scale is reduced
        assert_eq!(state.k(), 0);
        assert_eq!(state.algebraic_amplitude(0).unwrap().coeffs, [0, 0, 0, 7]);
        assert!(state.algebraic_amplitude(1).unwrap().is_zero());
    }

    #[test]
    fn overflow_counted_without_growth() {
        let mgr = Manager::new(1);
        let matrix = vec![vec![0, 0], vec![0, 0], vec![0, 0], vec![7, 7]];
        let mut state = AlgebraicState::from_matrix(&mgr, 4, 1, &matrix).unwrap();
        state.set_growth(false, 3);
        state.apply_gate(&Gate::H(0)).unwrap();
        assert_eq!(state.growth().events, 0);
        assert_eq!(state.growth().ignored, 1);
        assert_eq!(state.precision(), 4);
    }

    /* dense reference ****************************************************/

    fn dense_single(psi: &mut [C64], t: usize, u: [[C64; 2]; 2]) {
        for i in 0..psi.len() {
            if i >> t & 1 == 1 { continue; }
            let j = i | 1 << t;
            let (a, b) = (psi[i], psi[j]);
            psi[i] = u[0][0] * a + u[0][1] * b;
            psi[j] = u[1][0] * a + u[1][1] * b;
        }
    }

    fn dense_permute<F>(psi: &mut Vec<C64>, map: F)
    where F: Fn(usize) -> usize
    {
        let mut out = vec![C64::new(0.0, 0.0); psi.len()];
        for (i, a) in psi.iter().enumerate() { out[map(i)] = *a; }
        *psi = out;
    }

    fn dense_apply(psi: &mut Vec<C64>, gate: &Gate) {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let o = c(0.0, 0.0);
        let l = c(1.0, 0.0);
        let bit = |i: usize, q: usize| i >> q & 1 == 1;
        let diag = |psi: &mut Vec<C64>, qs: &[usize], ph: Phase| {
            for (i, a) in psi.iter_mut().enumerate() {
                if qs.iter().all(|q| bit(i, *q)) { *a *= ph.as_complex(); }
            }
        };
        match gate {
            Gate::H(t) => dense_single(psi, *t, [[c(h, 0.0), c(h, 0.0)], [c(h, 0.0), c(-h, 0.0)]]),
            Gate::X(t) => dense_single(psi, *t, [[o, l], [l, o]]),
            Gate::Y(t) => dense_single(psi, *t, [[o, c(0.0, -1.0)], [c(0.0, 1.0), o]]),
            Gate::SqrtX(t) => dense_single(psi, *t, [[c(h, 0.0), c(0.0, -h)], [c(0.0, -h), c(h, 0.0)]]),
            Gate::SqrtY(t) => dense_single(psi, *t, [[c(h, 0.0), c(-h, 0.0)], [c(h, 0.0), c(h, 0.0)]]),
            Gate::Z(t) => diag(psi, &[*t], Phase::Pi),
            Gate::S(t) => diag(psi, &[*t], Phase::Pi1h),
            Gate::SInv(t) => diag(psi, &[*t], Phase::Pi3h),
            Gate::T(t) => diag(psi, &[*t], Phase::Pi1q),
            Gate::TInv(t) => diag(psi, &[*t], Phase::Pi7q),
            Gate::CZ(a, b) => diag(psi, &[*a, *b], Phase::Pi),
            Gate::MCZ(qs) => diag(psi, qs, Phase::Pi),
            Gate::CX(a, b) => dense_permute(psi, |i| if bit(i, *a) { i ^ 1 << *b } else { i }),
            Gate::Swap(a, b) => dense_permute(psi, |i| {
                if bit(i, *a) != bit(i, *b) { i ^ (1 << *a) ^ (1 << *b) } else { i }
            }),
            Gate::Toffoli { target, controls, ncontrols } => dense_permute(psi, |i| {
                if controls.iter().all(|q| bit(i, *q))
                    && ncontrols.iter().all(|q| !bit(i, *q))
                { i ^ 1 << *target } else { i }
            }),
            Gate::Fredkin { a, b, controls } => dense_permute(psi, |i| {
                if controls.iter().all(|q| bit(i, *q)) && bit(i, *a) != bit(i, *b) {
                    i ^ (1 << *a) ^ (1 << *b)
                } else { i }
            }),
            Gate::Peres(a, b, t) => {
                dense_apply(psi, &Gate::Toffoli {
                    target: *t, controls: vec![*a, *b], ncontrols: vec![] });
                dense_apply(psi, &Gate::CX(*a, *b));
            },
            Gate::PeresInv(a, b, t) => {
                dense_apply(psi, &Gate::CX(*a, *b));
                dense_apply(psi, &Gate::Toffoli {
                    target: *t, controls: vec![*a, *b], ncontrols: vec![] });
            },
        }
    }

    fn random_gate<R: Rng>(n: usize, rng: &mut R) -> Gate {
        let mut qs: Vec<usize> = (0..n).collect();
        for i in (1..n).rev() { qs.swap(i, rng.gen_range(0..=i)); }
        let (a, b, t) = (qs[0], qs[1], qs[2]);
        match rng.gen_range(0..17) {
            0 => Gate::H(a),
            1 => Gate::X(a),
            2 => Gate::Y(a),
            3 => Gate::Z(a),
            4 => Gate::S(a),
            5 => Gate::SInv(a),
            6 => Gate::T(a),
            7 => Gate::TInv(a),
            8 => Gate::SqrtX(a),
            9 => Gate::SqrtY(a),
            10 => Gate::CX(a, b),
            11 => Gate::CZ(a, b),
            12 => Gate::Swap(a, b),
            13 => Gate::Toffoli { target: t, controls: vec![a], ncontrols: vec![b] },
            14 => Gate::Fredkin { a, b, controls: vec![t] },
            15 => Gate::Peres(a, b, t),
            _ => Gate::MCZ(vec![a, b, t]),
        }
    }

    #[test]
    fn matches_dense_reference() {
        let n = 3;
        let mut rng = StdRng::seed_from_u64(10546);
        for _ in 0..20 {
            let mut state = AlgebraicState::basis(&Manager::new(n), 3, &[]);
            let mut psi = vec![c(0.0, 0.0); 1 << n];
            psi[0] = c(1.0, 0.0);
            for _ in 0..30 {
                let gate = random_gate(n, &mut rng);
                state.apply_gate(&gate).unwrap();
                dense_apply(&mut psi, &gate);
            }
            assert_amplitudes(&state, &psi);
        }
    }
}
