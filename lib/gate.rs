//! Gate descriptions for the Clifford+T gate set and its reversible-logic
//! extensions (multi-controlled X, Fredkin, Peres).
//!
//! Gates are plain data; they are applied to a state by
//! [`AlgebraicState::apply_gate`][crate::state::AlgebraicState::apply_gate].

use std::{
    fmt,
    ops::{ Add, AddAssign },
    str::FromStr,
};
use itertools::Itertools;
use num_complex::Complex64 as C64;
use crate::error::GateError;

/// The argument of a complex phase factor, limited to integer multiples of π/4.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// 0
    Pi0,
    /// π/4
    Pi1q,
    /// π/2
    Pi1h,
    /// 3π/4
    Pi3q,
    /// π
    Pi,
    /// 5π/4
    Pi5q,
    /// 3π/2
    Pi3h,
    /// 7π/4
    Pi7q,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Pi0 => write!(f, "+1"),
            Self::Pi1q => write!(f, "+e^iπ/4"),
            Self::Pi1h => write!(f, "+i"),
            Self::Pi3q => write!(f, "+e^i3π/4"),
            Self::Pi => write!(f, "-1"),
            Self::Pi5q => write!(f, "+e^i5π/4"),
            Self::Pi3h => write!(f, "-i"),
            Self::Pi7q => write!(f, "+e^i7π/4"),
        }
    }
}

impl Phase {
    /// Convert to the bare multiple of π/4.
    pub fn to_int(&self) -> i8 {
        match self {
            Self::Pi0  => 0,
            Self::Pi1q => 1,
            Self::Pi1h => 2,
            Self::Pi3q => 3,
            Self::Pi   => 4,
            Self::Pi5q => 5,
            Self::Pi3h => 6,
            Self::Pi7q => 7,
        }
    }

    /// Convert from a bare multiple of π/4 (modulo 8).
    pub fn from_int(i: i8) -> Self {
        match i.rem_euclid(8) {
            0 => Self::Pi0,
            1 => Self::Pi1q,
            2 => Self::Pi1h,
            3 => Self::Pi3q,
            4 => Self::Pi,
            5 => Self::Pi5q,
            6 => Self::Pi3h,
            7 => Self::Pi7q,
            _ => unreachable!(),
        }
    }

    pub fn as_complex(self) -> C64 {
        use std::f64::consts::FRAC_PI_4 as PI4;
        match self {
            Self::Pi0  => 1.0_f64.into(),
            Self::Pi1q => C64::cis(PI4),
            Self::Pi1h => C64::i(),
            Self::Pi3q => C64::cis(3.0 * PI4),
            Self::Pi   => (-1.0_f64).into(),
            Self::Pi5q => C64::cis(5.0 * PI4),
            Self::Pi3h => -C64::i(),
            Self::Pi7q => C64::cis(7.0 * PI4),
        }
    }

    /// Unit direction carried by coefficient `component` of an amplitude:
    /// component `c` weighs `e^{iπ(3 - c)/4}`.
    pub fn of_component(component: usize) -> Self {
        Self::from_int(3 - component as i8)
    }

    /// Where a coefficient lands when its amplitude is multiplied by `self`.
    ///
    /// Returns the destination component and whether the coefficient must be
    /// negated on the way.
    pub fn rotate(self, component: usize) -> (usize, bool) {
        let e = (Self::of_component(component) + self).to_int();
        let negate = e >= 4;
        let dest = 3 - (e % 4) as usize;
        (dest, negate)
    }
}

macro_rules! impl_phase_math {
    (
        $trait:ident,
        $trait_fn:ident,
        $trait_assign:ident,
        $trait_assign_fn:ident,
        $op:tt
    ) => {
        impl $trait for Phase {
            type Output = Self;

            fn $trait_fn(self, rhs: Self) -> Self::Output {
                Self::from_int(self.to_int() $op rhs.to_int())
            }
        }

        impl $trait_assign for Phase {
            fn $trait_assign_fn(&mut self, rhs: Self) {
                *self = *self $op rhs;
            }
        }
    }
}
impl_phase_math!(Add, add, AddAssign, add_assign, +);

/// Description of a single gate.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Hadamard
    H(usize),
    /// π rotation about X
    X(usize),
    /// π rotation about Y
    Y(usize),
    /// π rotation about Z
    Z(usize),
    /// π/2 rotation about Z
    S(usize),
    /// -π/2 rotation about Z
    SInv(usize),
    /// π/4 rotation about Z
    T(usize),
    /// -π/4 rotation about Z
    TInv(usize),
    /// π/2 rotation about X, up to global phase
    SqrtX(usize),
    /// π/2 rotation about Y, up to global phase
    SqrtY(usize),
    /// Z-controlled π rotation about X.
    ///
    /// The first qubit index is the control.
    CX(usize, usize),
    /// Z-controlled π rotation about Z.
    ///
    /// The first qubit index is the control.
    CZ(usize, usize),
    /// -1 phase on the subspace where every listed qubit is ∣1⟩.
    MCZ(Vec<usize>),
    /// Swap
    Swap(usize, usize),
    /// X on `target` when every qubit in `controls` is ∣1⟩ and every qubit in
    /// `ncontrols` is ∣0⟩.
    Toffoli { target: usize, controls: Vec<usize>, ncontrols: Vec<usize> },
    /// Swap of `a` and `b` when every qubit in `controls` is ∣1⟩.
    Fredkin { a: usize, b: usize, controls: Vec<usize> },
    /// Toffoli on `(a, b) → c` followed by a CNOT `a → b`.
    Peres(usize, usize, usize),
    /// Inverse of [`Peres`][Self::Peres].
    PeresInv(usize, usize, usize),
}

impl Gate {
    /// Return `true` if `self` scales amplitudes by 1/√2.
    pub fn is_scaling(&self) -> bool {
        matches!(self, Self::H(..) | Self::SqrtX(..) | Self::SqrtY(..))
    }

    /// All qubit indices `self` acts on, controls included.
    pub fn qubits(&self) -> Vec<usize> {
        match self {
            Self::H(k)
            | Self::X(k)
            | Self::Y(k)
            | Self::Z(k)
            | Self::S(k)
            | Self::SInv(k)
            | Self::T(k)
            | Self::TInv(k)
            | Self::SqrtX(k)
            | Self::SqrtY(k)
            => vec![*k],
            Self::CX(a, b) | Self::CZ(a, b) | Self::Swap(a, b)
            => vec![*a, *b],
            Self::MCZ(qs) => qs.clone(),
            Self::Toffoli { target, controls, ncontrols }
            => std::iter::once(*target)
                .chain(controls.iter().copied())
                .chain(ncontrols.iter().copied())
                .collect(),
            Self::Fredkin { a, b, controls }
            => [*a, *b].into_iter().chain(controls.iter().copied()).collect(),
            Self::Peres(a, b, c) | Self::PeresInv(a, b, c)
            => vec![*a, *b, *c],
        }
    }

    /// Verify that every qubit index is less than `n` and that no qubit
    /// appears twice.
    pub fn validate(&self, n: usize) -> Result<(), GateError> {
        let qubits = self.qubits();
        if let Some(q) = qubits.iter().find(|q| **q >= n) {
            return Err(GateError::OutOfRange { qubit: *q, n });
        }
        if let Some(q) = qubits.iter().duplicates().next() {
            return Err(GateError::Duplicate(*q));
        }
        Ok(())
    }

    /// Return a copy of `self` with every qubit index passed through `map`.
    pub fn remap<F>(&self, map: F) -> Self
    where F: Fn(usize) -> usize
    {
        let all = |qs: &[usize]| -> Vec<usize> {
            qs.iter().map(|q| map(*q)).collect()
        };
        match self {
            Self::H(k) => Self::H(map(*k)),
            Self::X(k) => Self::X(map(*k)),
            Self::Y(k) => Self::Y(map(*k)),
            Self::Z(k) => Self::Z(map(*k)),
            Self::S(k) => Self::S(map(*k)),
            Self::SInv(k) => Self::SInv(map(*k)),
            Self::T(k) => Self::T(map(*k)),
            Self::TInv(k) => Self::TInv(map(*k)),
            Self::SqrtX(k) => Self::SqrtX(map(*k)),
            Self::SqrtY(k) => Self::SqrtY(map(*k)),
            Self::CX(a, b) => Self::CX(map(*a), map(*b)),
            Self::CZ(a, b) => Self::CZ(map(*a), map(*b)),
            Self::MCZ(qs) => Self::MCZ(all(qs)),
            Self::Swap(a, b) => Self::Swap(map(*a), map(*b)),
            Self::Toffoli { target, controls, ncontrols }
                => Self::Toffoli {
                    target: map(*target),
                    controls: all(controls),
                    ncontrols: all(ncontrols),
                },
            Self::Fredkin { a, b, controls }
                => Self::Fredkin { a: map(*a), b: map(*b), controls: all(controls) },
            Self::Peres(a, b, c) => Self::Peres(map(*a), map(*b), map(*c)),
            Self::PeresInv(a, b, c) => Self::PeresInv(map(*a), map(*b), map(*c)),
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H(k) => write!(f, "h {}", k),
            Self::X(k) => write!(f, "x {}", k),
            Self::Y(k) => write!(f, "y {}", k),
            Self::Z(k) => write!(f, "z {}", k),
            Self::S(k) => write!(f, "s {}", k),
            Self::SInv(k) => write!(f, "sdg {}", k),
            Self::T(k) => write!(f, "t {}", k),
            Self::TInv(k) => write!(f, "tdg {}", k),
            Self::SqrtX(k) => write!(f, "sx {}", k),
            Self::SqrtY(k) => write!(f, "sy {}", k),
            Self::CX(a, b) => write!(f, "cx {} {}", a, b),
            Self::CZ(a, b) => write!(f, "cz {} {}", a, b),
            Self::MCZ(qs) => write!(f, "mcz {}", qs.iter().join(" ")),
            Self::Swap(a, b) => write!(f, "swap {} {}", a, b),
            Self::Toffoli { target, controls, ncontrols } => {
                write!(f, "mcx {}", target)?;
                controls.iter().try_for_each(|c| write!(f, " {}", c))?;
                ncontrols.iter().try_for_each(|c| write!(f, " !{}", c))
            },
            Self::Fredkin { a, b, controls } => {
                write!(f, "cswap {} {}", a, b)?;
                controls.iter().try_for_each(|c| write!(f, " {}", c))
            },
            Self::Peres(a, b, c) => write!(f, "peres {} {} {}", a, b, c),
            Self::PeresInv(a, b, c) => write!(f, "peresdg {} {} {}", a, b, c),
        }
    }
}

impl FromStr for Gate {
    type Err = GateError;

    /// Parse a mnemonic followed by whitespace-separated qubit indices, e.g.
    /// `h 0`, `cx 0 1`, `mcx 2 0 !1` (target first, `!` marks a negative
    /// control).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || GateError::Unknown(s.trim().to_string());
        let mut words = s.split_whitespace();
        let name = words.next().ok_or_else(unknown)?.to_ascii_lowercase();
        let mut pos: Vec<usize> = Vec::new();
        let mut neg: Vec<usize> = Vec::new();
        for w in words {
            match w.strip_prefix('!') {
                Some(rest) => neg.push(rest.parse().map_err(|_| unknown())?),
                None => pos.push(w.parse().map_err(|_| unknown())?),
            }
        }
        if !neg.is_empty() && name != "mcx" { return Err(unknown()); }
        let gate
            = match (name.as_str(), pos.as_slice()) {
                ("h", &[k]) => Self::H(k),
                ("x", &[k]) => Self::X(k),
                ("y", &[k]) => Self::Y(k),
                ("z", &[k]) => Self::Z(k),
                ("s", &[k]) => Self::S(k),
                ("sdg", &[k]) => Self::SInv(k),
                ("t", &[k]) => Self::T(k),
                ("tdg", &[k]) => Self::TInv(k),
                ("sx", &[k]) => Self::SqrtX(k),
                ("sy", &[k]) => Self::SqrtY(k),
                ("cx", &[a, b]) => Self::CX(a, b),
                ("cz", &[a, b]) => Self::CZ(a, b),
                ("swap", &[a, b]) => Self::Swap(a, b),
                ("ccx", &[a, b, c]) => Self::Toffoli {
                    target: c,
                    controls: vec![a, b],
                    ncontrols: Vec::new(),
                },
                ("peres", &[a, b, c]) => Self::Peres(a, b, c),
                ("peresdg", &[a, b, c]) => Self::PeresInv(a, b, c),
                ("mcz", qs) if !qs.is_empty() => Self::MCZ(qs.to_vec()),
                ("mcx", [t, cs @ ..]) => Self::Toffoli {
                    target: *t,
                    controls: cs.to_vec(),
                    ncontrols: neg,
                },
                ("cswap", [a, b, cs @ ..]) => Self::Fredkin {
                    a: *a,
                    b: *b,
                    controls: cs.to_vec(),
                },
                _ => { return Err(unknown()); },
            };
        Ok(gate)
    }
}

/// Parse a `;`-separated list of gates; empty entries are ignored.
pub fn parse_gate_list(s: &str) -> Result<Vec<Gate>, GateError> {
    s.split(';')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .map(Gate::from_str)
        .collect()
}
