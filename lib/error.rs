//! Error types for the simulator.
//!
//! Three tiers: [`GateError`] is a caller contract violation (the offending
//! operation is skipped and the run continues), [`RusError`] is a
//! misconfigured gate database, and the remaining [`SimError`] variants abort
//! a run.

use std::{ io, path::PathBuf };
use thiserror::Error;

/// A gate or measurement request that cannot be applied to the current
/// register.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateError {
    #[error("qubit index {qubit} out of range for {n} qubits")]
    OutOfRange { qubit: usize, n: usize },

    #[error("qubit {0} appears more than once in a single gate")]
    Duplicate(usize),

    #[error("unsupported gate {0:?}")]
    Unknown(String),

    #[error("malformed angle {0:?}")]
    BadAngle(String),

    #[error("rz requires a gate database and an ancilla register")]
    RusUnavailable,
}

/// Problems with a repeat-until-success gate database.
#[derive(Debug, Error)]
pub enum RusError {
    #[error("cannot read {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("{path}: missing key {key:?}")]
    MissingKey { path: PathBuf, key: String },

    #[error("cannot parse angle {0:?}")]
    BadAngle(String),

    #[error("angle {angle} is not a multiple of the database unit {unit}")]
    NotMultiple { angle: f64, unit: f64 },

    #[error("no database entry for angle index {0}")]
    MissingEntry(i64),

    #[error("{path}:{line}: {msg}")]
    Syntax { path: PathBuf, line: usize, msg: String },

    #[error("condition lists {got} outcomes for {expected} ancillas")]
    ConditionMismatch { expected: usize, got: usize },
}

/// Errors surfaced by the simulation session.
///
/// [`SimError::Gate`] wraps a contract violation; the session driver logs it
/// and skips the operation. Every other variant terminates a run.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("the first operation must declare the qubit register")]
    NotDeclared,

    #[error("qubit register already declared")]
    AlreadyDeclared,

    #[error("shot count must be positive")]
    InvalidShots,

    #[error("integer precision must be at least 2 bits, got {0}")]
    InvalidPrecision(usize),

    #[error("sampling mode requires a measurement or an expectation-value target")]
    NothingToSample,

    #[error("initial state must have {expected} entries per component, got {got}")]
    BadMatrixShape { expected: usize, got: usize },

    #[error("amplitude listing is only available in all-amplitude mode")]
    AmplitudeModeRequired,

    #[error("amplitude listing is limited to {max} qubits, register has {n}")]
    TooManyQubits { n: usize, max: usize },

    #[error("coefficients are {0} bits wide; exact extraction supports at most 128")]
    PrecisionTooWide(usize),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Rus(#[from] RusError),

    #[error("repeat-until-success loop exceeded {0} attempts")]
    RusRetryLimit(usize),
}

pub type SimResult<T> = Result<T, SimError>;
