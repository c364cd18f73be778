//! Exact simulation of quantum circuits over registers of qubits.
//!
//! Every amplitude is held as `(1/√2)^k · Σ_c v_c · ω^(3 - c)` with
//! ω = e^{iπ/4} and four integer coefficients `v_c`. Bit `b` of coefficient `c`
//! across all basis states is a single Boolean function of the qubit values,
//! stored as a reduced ordered binary decision diagram, so gates act as
//! carry-propagating bitwise arithmetic on diagrams and the state is never
//! expanded unless all amplitudes are requested.
//!
//! Gates are limited to the Clifford+T family and its multi-controlled
//! permutation relatives; arbitrary Z rotations are reached through
//! repeat-until-success programs looked up from a gate database.

pub mod bdd;
pub mod error;
pub mod gate;
pub mod state;
pub mod apply;
pub mod measure;
pub mod rus;
pub mod circuit;
