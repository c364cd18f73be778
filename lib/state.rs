//! Exact amplitude encoding over shared Boolean functions.
//!
//! Every amplitude of an *n*-qubit register is written as
//!
//! ```text
//! amp(x) = norm · (1/√2)^k · Σ_c v_c(x) · e^{iπ(3 - c)/4}
//! ```
//!
//! where each `v_c` is an `r`-bit two's-complement integer. Bit `b` of `v_c`,
//! viewed as a function of the basis assignment `x`, is a single Boolean
//! function over the qubit variables, so the whole state is a 4 × `r` grid of
//! functions.

use std::fmt;
use nalgebra as na;
use num_complex::Complex64 as C64;
use once_cell::sync::Lazy;
use crate::{
    bdd::{ Func, Manager },
    error::{ SimError, SimResult },
    gate::Phase,
};

/// Number of algebraic components per amplitude.
pub const COMPONENTS: usize = 4;

/// Largest register for which a full amplitude listing is produced.
pub const MAX_LISTED_QUBITS: usize = 30;

/// Unit direction carried by each component.
pub(crate) static WEIGHTS: Lazy<[C64; COMPONENTS]> =
    Lazy::new(|| [0, 1, 2, 3].map(|c| Phase::of_component(c).as_complex()));

/// A 4 × `r` grid of Boolean functions together with the scale factors that
/// fold it into amplitudes.
///
/// `grid[c][b]` is bit `b` (least significant first) of component `c`. All
/// rows always have the same length, the current precision.
#[derive(Clone)]
pub struct AlgebraicState {
    pub(crate) mgr: Manager,
    pub(crate) n: usize,
    pub(crate) grid: [Vec<Func>; COMPONENTS],
    pub(crate) k: usize,
    pub(crate) shift: usize,
    pub(crate) norm: f64,
    pub(crate) growth: Growth,
}

/// Reaction to arithmetic overflow.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Growth {
    /// Widen every coefficient when an addition would overflow.
    pub enabled: bool,
    /// Bits added per widening.
    pub step: usize,
    /// Number of widenings performed.
    pub events: usize,
    /// Number of overflows left to wrap around because growth is disabled.
    pub ignored: usize,
}

impl Default for Growth {
    fn default() -> Self {
        Self { enabled: true, step: 3, events: 0, ignored: 0 }
    }
}

/// An amplitude extracted without rounding: `(1/√2)^k · Σ_c coeffs[c] ·
/// e^{iπ(3 - c)/4}`. The floating normalization factor is not included.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlgebraicAmplitude {
    pub k: usize,
    pub coeffs: [i128; COMPONENTS],
}

impl AlgebraicAmplitude {
    pub fn is_zero(&self) -> bool { self.coeffs.iter().all(|v| *v == 0) }

    pub fn to_complex(&self) -> C64 {
        let scale = std::f64::consts::FRAC_1_SQRT_2.powi(self.k as i32);
        self.coeffs.iter().zip(WEIGHTS.iter())
            .map(|(v, w)| *w * (*v as f64))
            .sum::<C64>()
            * scale
    }
}

/// Value of a two's-complement integer given its bits, least significant
/// first.
pub(crate) fn signed_value<I>(bits: I) -> f64
where I: IntoIterator<Item = bool>
{
    let bits: Vec<bool> = bits.into_iter().collect();
    let r = bits.len();
    bits.iter().enumerate()
        .filter(|(_, bit)| **bit)
        .map(|(b, _)| {
            let w = 2.0_f64.powi(b as i32);
            if b + 1 == r { -w } else { w }
        })
        .sum()
}

/// Number of two's-complement bits needed to hold `v`.
fn bits_needed(v: i64) -> usize {
    let magnitude = if v < 0 { !v } else { v };
    (64 - magnitude.leading_zeros() as usize) + 1
}

/// Assignment of qubit variables for basis index `index` (qubit `q` is bit `q`
/// of the index).
pub fn assignment(n: usize, index: usize) -> Vec<bool> {
    (0..n).map(|q| index >> q & 1 == 1).collect()
}

impl AlgebraicState {
    /// Create the basis state whose qubit `q` is ∣1⟩ iff `bits[q]`, with
    /// coefficient exactly 1 on the real axis. Qubits past the end of `bits`
    /// are ∣0⟩.
    pub fn basis(mgr: &Manager, precision: usize, bits: &[bool]) -> Self {
        let n = mgr.num_vars();
        let r = precision.max(2);
        let mut grid: [Vec<Func>; COMPONENTS]
            = std::array::from_fn(|_| vec![mgr.ff(); r]);
        grid[COMPONENTS - 1][0]
            = mgr.cube((0..n).map(|q| (q, bits.get(q).copied().unwrap_or(false))));
        Self {
            mgr: mgr.clone(),
            n,
            grid,
            k: 0,
            shift: 0,
            norm: 1.0,
            growth: Growth::default(),
        }
    }

    /// Create a state from explicit integer coefficients: `matrix[c][i]` is
    /// component `c` of basis index `i`, and every amplitude carries the factor
    /// `(1/√2)^scale_bits`.
    ///
    /// Precision is widened past `precision` if some entry does not fit. This
    /// performs O(4 · r · 2^n) diagram operations and is only practical for
    /// small registers.
    pub fn from_matrix(
        mgr: &Manager,
        precision: usize,
        scale_bits: usize,
        matrix: &[Vec<i64>],
    ) -> SimResult<Self>
    {
        let n = mgr.num_vars();
        let dim = 1_usize << n;
        if matrix.len() != COMPONENTS {
            return Err(SimError::BadMatrixShape {
                expected: COMPONENTS, got: matrix.len() });
        }
        if let Some(row) = matrix.iter().find(|row| row.len() != dim) {
            return Err(SimError::BadMatrixShape { expected: dim, got: row.len() });
        }
        let r
            = matrix.iter().flatten()
            .map(|v| bits_needed(*v))
            .fold(precision.max(2), usize::max);
        let mut grid: [Vec<Func>; COMPONENTS]
            = std::array::from_fn(|_| vec![mgr.ff(); r]);
        for index in 0..dim {
            if matrix.iter().all(|row| row[index] == 0) { continue; }
            let minterm = mgr.cube(assignment(n, index).into_iter().enumerate());
            for (c, row) in matrix.iter().enumerate() {
                let v = row[index];
                for (b, cell) in grid[c].iter_mut().enumerate() {
                    if v >> b.min(63) & 1 == 1 {
                        *cell = cell.or(&minterm);
                    }
                }
            }
        }
        Ok(Self {
            mgr: mgr.clone(),
            n,
            grid,
            k: scale_bits,
            shift: 0,
            norm: 1.0,
            growth: Growth::default(),
        })
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize { self.n }

    /// Current integer bit width `r`.
    pub fn precision(&self) -> usize { self.grid[0].len() }

    /// Exponent `k` of the common 1/√2 factor.
    pub fn k(&self) -> usize { self.k }

    /// Number of right shifts performed so far.
    pub fn shift(&self) -> usize { self.shift }

    /// Floating normalization factor accumulated by measurement.
    pub fn norm(&self) -> f64 { self.norm }

    /// Overflow policy and counters.
    pub fn growth(&self) -> &Growth { &self.growth }

    /// Enable or disable precision growth and set its step.
    pub fn set_growth(&mut self, enabled: bool, step: usize) {
        self.growth.enabled = enabled;
        self.growth.step = step.max(1);
    }

    /// The manager owning every cell.
    pub fn manager(&self) -> &Manager { &self.mgr }

    /// The full grid of cells.
    pub fn grid(&self) -> &[Vec<Func>; COMPONENTS] { &self.grid }

    /// Bit `b` of component `c`.
    pub fn cell(&self, c: usize, b: usize) -> &Func { &self.grid[c][b] }

    /// Widen every coefficient by `extra` bits.
    ///
    /// The new grid is built beside the old one, with the added high bits
    /// copied from the previous sign bit, and then swapped in; the old cells
    /// are released afterwards.
    pub fn grow_precision(&mut self, extra: usize) {
        let grown: [Vec<Func>; COMPONENTS]
            = std::array::from_fn(|c| {
                let row = &self.grid[c];
                let sign = &row[row.len() - 1];
                row.iter().cloned()
                    .chain(std::iter::repeat(sign).take(extra).cloned())
                    .collect()
            });
        drop(std::mem::replace(&mut self.grid, grown));
    }

    /// Shift every coefficient right by one bit, discarding bit 0 and
    /// sign-extending the top.
    pub fn drop_lsb(&mut self) {
        for row in self.grid.iter_mut() {
            let sign = row[row.len() - 1].clone();
            row.remove(0);
            row.push(sign);
        }
        self.shift += 1;
    }

    /// While `k ≥ 2` and every coefficient is even everywhere, halve the
    /// coefficients and lower `k` by two. Leaves amplitudes unchanged.
    pub fn reduce_scale(&mut self) {
        while self.k >= 2 && self.grid.iter().all(|row| row[0].is_false()) {
            self.drop_lsb();
            self.k -= 2;
        }
    }

    /// Decoded coefficients at basis index `index`, exactly.
    pub fn algebraic_amplitude(&self, index: usize) -> SimResult<AlgebraicAmplitude> {
        let r = self.precision();
        if r > 128 { return Err(SimError::PrecisionTooWide(r)); }
        let x = assignment(self.n, index);
        let coeffs: [i128; COMPONENTS]
            = std::array::from_fn(|c| {
                self.grid[c].iter().enumerate()
                    .filter(|(_, cell)| cell.eval(&x))
                    .map(|(b, _)| {
                        if b + 1 == r { i128::MIN >> (127 - b) } else { 1_i128 << b }
                    })
                    .sum()
            });
        Ok(AlgebraicAmplitude { k: self.k, coeffs })
    }

    /// Amplitude of basis index `index`, including the normalization factor.
    pub fn amplitude(&self, index: usize) -> C64 {
        let x = assignment(self.n, index);
        let scale
            = std::f64::consts::FRAC_1_SQRT_2.powi(self.k as i32) * self.norm;
        self.grid.iter().zip(WEIGHTS.iter())
            .map(|(row, w)| *w * signed_value(row.iter().map(|cell| cell.eval(&x))))
            .sum::<C64>()
            * scale
    }

    /// Every amplitude, indexed by basis state with qubit 0 as the least
    /// significant bit.
    pub fn amplitudes(&self) -> SimResult<na::DVector<C64>> {
        if self.n > MAX_LISTED_QUBITS {
            return Err(SimError::TooManyQubits {
                n: self.n, max: MAX_LISTED_QUBITS });
        }
        Ok(na::DVector::from_iterator(
            1 << self.n,
            (0..1_usize << self.n).map(|i| self.amplitude(i)),
        ))
    }
}

impl fmt::Debug for AlgebraicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgebraicState")
            .field("n", &self.n)
            .field("r", &self.precision())
            .field("k", &self.k)
            .field("shift", &self.shift)
            .field("norm", &self.norm)
            .finish()
    }
}

impl fmt::Display for AlgebraicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const SHOW_QUBITS: usize = 8;
        if self.n > SHOW_QUBITS {
            return write!(
                f,
                "<{} qubits, r = {}, k = {}>",
                self.n, self.precision(), self.k,
            );
        }
        let mut first = true;
        for i in 0..1_usize << self.n {
            let a = self.amplitude(i);
            if a.norm() < 1e-12 { continue; }
            if !first { write!(f, " + ")?; }
            first = false;
            write!(f, "({:+.5}{:+.5}i)∣", a.re, a.im)?;
            for q in (0..self.n).rev() { write!(f, "{}", i >> q & 1)?; }
            write!(f, "⟩")?;
        }
        if first { write!(f, "0")?; }
        Ok(())
    }
}
