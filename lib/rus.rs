//! Repeat-until-success synthesis of Z rotations.
//!
//! A rotation angle is looked up in a [`GateLibrary`], yielding a
//! [`RusProgram`]: a preparation sequence over the target and some ancillas,
//! the ancilla outcome that signals success, and a correction sequence that
//! undoes a failed attempt. [`RusMachine`] sequences the attempts.
//!
//! Programs are written over *slots*: slot 0 is the rotation target and slots
//! `1..=ancillas` are the ancillas, bound to concrete qubits by
//! [`RusProgram::bind`]. A gadget written directly over register qubits is
//! built with [`BoundProgram::new`].

use std::{
    f64::consts::{ PI, TAU },
    fs,
    path::{ Path, PathBuf },
};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use tracing::debug;
use crate::{
    error::{ GateError, RusError, SimError, SimResult },
    gate::{ parse_gate_list, Gate },
};

/// Name of the manifest file inside a gate database directory.
pub const MANIFEST: &str = "manifest.yaml";

/// Relative tolerance when deciding that an angle is a multiple of the
/// database unit.
pub const ANGLE_TOLERANCE: f64 = 1e-6;

/// Parse an angle in radians. Accepts plain numbers and multiples of `pi`,
/// optionally divided: `1.25`, `pi`, `-pi/4`, `3pi/8`, `3*pi/8`.
pub fn parse_angle(text: &str) -> Result<f64, RusError> {
    let bad = || RusError::BadAngle(text.to_string());
    let s: String
        = text.chars()
        .filter(|ch| !ch.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    let (num, den) = match s.split_once('/') {
        Some((num, den)) => (num.to_string(), Some(den.to_string())),
        None => (s.clone(), None),
    };
    let numerator
        = if let Some(coeff) = num.strip_suffix("pi") {
            let coeff = coeff.strip_suffix('*').unwrap_or(coeff);
            match coeff {
                "" | "+" => PI,
                "-" => -PI,
                c => c.parse::<f64>().map_err(|_| bad())? * PI,
            }
        } else {
            num.parse::<f64>().map_err(|_| bad())?
        };
    let value
        = match den {
            Some(d) => {
                let d: f64 = d.parse().map_err(|_| bad())?;
                if d == 0.0 { return Err(bad()); }
                numerator / d
            },
            None => numerator,
        };
    if value.is_finite() { Ok(value) } else { Err(bad()) }
}

/// Map an angle into (-π, π].
pub fn normalize_angle(theta: f64) -> f64 {
    let t = theta.rem_euclid(TAU);
    if t > PI { t - TAU } else { t }
}

/// Index of `angle` in a table of multiples of `unit` covering one full turn.
pub fn quantize(angle: f64, unit: f64) -> Result<i64, RusError> {
    let unit = unit.abs();
    if unit == 0.0 || !unit.is_finite() {
        return Err(RusError::BadAngle(unit.to_string()));
    }
    let q = normalize_angle(angle) / unit;
    let idx = q.round();
    if (q - idx).abs() > ANGLE_TOLERANCE {
        return Err(RusError::NotMultiple { angle, unit });
    }
    let table = ((TAU / unit).round() as i64).max(1);
    Ok((idx as i64).rem_euclid(table))
}

/// A repeat-until-success gadget over slots.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RusProgram {
    pub ancillas: usize,
    pub prepare: Vec<Gate>,
    pub condition: Vec<bool>,
    pub correction: Vec<Gate>,
}

/// A repeat-until-success gadget over concrete qubits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoundProgram {
    /// Rotated qubit, for programs bound from a [`RusProgram`].
    pub target: Option<usize>,
    /// Qubits measured after every preparation.
    pub ancillas: Vec<usize>,
    pub prepare: Vec<Gate>,
    pub condition: Vec<bool>,
    pub correction: Vec<Gate>,
}

impl RusProgram {
    /// Parse the `key: value` text of a program file. `path` is only used in
    /// error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, RusError> {
        let syntax = |line: usize, msg: String| {
            RusError::Syntax { path: path.to_path_buf(), line, msg }
        };
        let mut fields: FxHashMap<&str, (usize, &str)> = FxHashMap::default();
        for (lineno, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }
            let (key, value)
                = line.split_once(':')
                .ok_or_else(|| syntax(lineno, "expected `key: value`".into()))?;
            fields.insert(key.trim(), (lineno, value.trim()));
        }
        let field = |key: &str| {
            fields.get(key).copied()
                .ok_or_else(|| RusError::MissingKey {
                    path: path.to_path_buf(), key: key.to_string() })
        };
        let gates = |key: &str| -> Result<Vec<Gate>, RusError> {
            let (lineno, value) = field(key)?;
            parse_gate_list(value).map_err(|e| syntax(lineno, e.to_string()))
        };

        let (lineno, value) = field("ancillas")?;
        let ancillas: usize
            = value.parse()
            .map_err(|_| syntax(lineno, format!("bad ancilla count {:?}", value)))?;
        let (lineno, value) = field("condition")?;
        let condition: Vec<bool>
            = value.split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|w| !w.is_empty())
            .map(|w| match w {
                "0" => Ok(false),
                "1" => Ok(true),
                _ => Err(syntax(lineno, format!("bad outcome {:?}", w))),
            })
            .collect::<Result<_, _>>()?;
        if condition.len() != ancillas {
            return Err(RusError::ConditionMismatch {
                expected: ancillas, got: condition.len() });
        }
        Ok(Self {
            ancillas,
            prepare: gates("prepare")?,
            condition,
            correction: gates("correction")?,
        })
    }

    /// Read and parse a program file.
    pub fn load(path: &Path) -> Result<Self, RusError> {
        let text
            = fs::read_to_string(path)
            .map_err(|source| RusError::Io { path: path.to_path_buf(), source })?;
        Self::parse(&text, path)
    }

    /// Bind slot 0 to `target` and slots `1..` to `ancillas`.
    ///
    /// Fails if too few ancillas are supplied, if some slot index is beyond
    /// the ancilla count, or if the target is also listed as an ancilla.
    pub fn bind(&self, target: usize, ancillas: &[usize])
        -> Result<BoundProgram, GateError>
    {
        if ancillas.len() < self.ancillas {
            return Err(GateError::RusUnavailable);
        }
        let ancillas: Vec<usize> = ancillas[..self.ancillas].to_vec();
        if ancillas.contains(&target) {
            return Err(GateError::Duplicate(target));
        }
        let slots: Vec<usize>
            = std::iter::once(target).chain(ancillas.iter().copied()).collect();
        let bind_all = |gates: &[Gate]| -> Result<Vec<Gate>, GateError> {
            gates.iter()
                .map(|g| {
                    g.validate(slots.len())
                        .map_err(|_| GateError::Unknown(g.to_string()))?;
                    Ok(g.remap(|s| slots[s]))
                })
                .collect()
        };
        Ok(BoundProgram {
            target: Some(target),
            prepare: bind_all(&self.prepare)?,
            correction: bind_all(&self.correction)?,
            condition: self.condition.clone(),
            ancillas,
        })
    }
}

impl BoundProgram {
    /// Build a gadget directly over register qubits: `prepare` is applied,
    /// `measured` is read out and compared with `condition`, and `correction`
    /// precedes every further preparation.
    pub fn new(
        prepare: Vec<Gate>,
        measured: Vec<usize>,
        condition: Vec<bool>,
        correction: Vec<Gate>,
    ) -> Result<Self, RusError>
    {
        if condition.len() != measured.len() {
            return Err(RusError::ConditionMismatch {
                expected: measured.len(), got: condition.len() });
        }
        Ok(Self { target: None, ancillas: measured, prepare, condition, correction })
    }

    /// Check every gate against an `n`-qubit register.
    pub fn validate(&self, n: usize) -> Result<(), GateError> {
        if let Some(q) = self.ancillas.iter().chain(self.target.iter()).find(|q| **q >= n) {
            return Err(GateError::OutOfRange { qubit: *q, n });
        }
        if let Some(q) = self.ancillas.iter().duplicates().next() {
            return Err(GateError::Duplicate(*q));
        }
        self.prepare.iter().chain(self.correction.iter())
            .try_for_each(|g| g.validate(n))
    }
}

/// Source of [`RusProgram`]s by rotation angle.
pub trait GateLibrary {
    fn lookup(&self, angle: f64) -> Result<RusProgram, RusError>;
}

impl<F> GateLibrary for F
where F: Fn(f64) -> Result<RusProgram, RusError>
{
    fn lookup(&self, angle: f64) -> Result<RusProgram, RusError> { self(angle) }
}

/// A gate database on disk: a directory holding [`MANIFEST`] and one program
/// file per angle index.
///
/// The manifest is line-based `key: value` text. Keys are matched exactly:
/// `angle_unit` gives the angle quantum, and every integer key maps that
/// multiple of the unit to a program file relative to the directory.
#[derive(Clone, Debug)]
pub struct ManifestLibrary {
    dir: PathBuf,
    unit: f64,
    entries: FxHashMap<i64, PathBuf>,
}

impl ManifestLibrary {
    /// Read the manifest in `dir`. Program files are only read on lookup.
    pub fn open<P>(dir: P) -> Result<Self, RusError>
    where P: AsRef<Path>
    {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(MANIFEST);
        let text
            = fs::read_to_string(&path)
            .map_err(|source| RusError::Io { path: path.clone(), source })?;
        let mut unit: Option<f64> = None;
        let mut entries: FxHashMap<i64, PathBuf> = FxHashMap::default();
        for (lineno, line) in text.lines().enumerate().map(|(i, l)| (i + 1, l)) {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') { continue; }
            let (key, value)
                = line.split_once(':')
                .ok_or_else(|| RusError::Syntax {
                    path: path.clone(),
                    line: lineno,
                    msg: "expected `key: value`".into(),
                })?;
            let (key, value) = (key.trim(), value.trim());
            if key == "angle_unit" {
                unit = Some(parse_angle(value)?);
            } else if let Ok(idx) = key.parse::<i64>() {
                entries.insert(idx, dir.join(value));
            }
        }
        let unit
            = unit.ok_or_else(|| RusError::MissingKey {
                path: path.clone(), key: "angle_unit".into() })?;
        debug!(dir = %dir.display(), unit, entries = entries.len(), "opened gate database");
        Ok(Self { dir, unit, entries })
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn unit(&self) -> f64 { self.unit }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl GateLibrary for ManifestLibrary {
    fn lookup(&self, angle: f64) -> Result<RusProgram, RusError> {
        let idx = quantize(angle, self.unit)?;
        let path = self.entries.get(&idx).ok_or(RusError::MissingEntry(idx))?;
        RusProgram::load(path)
    }
}

/// Progress of one repeat-until-success rotation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RusState {
    /// Nothing applied yet.
    Idle,
    /// Preparation applied; ancillas not yet measured.
    AwaitingOutcome,
    /// Ancillas matched the success condition.
    Success,
    /// Ancillas did not match; a correction is due.
    Retry,
}

/// Next thing the driver of a [`RusMachine`] must do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RusAction<'a> {
    /// Apply these gates in order.
    Apply(Vec<&'a Gate>),
    /// Measure these qubits (with reset) and report the outcomes through
    /// [`RusMachine::observe`].
    Measure(&'a [usize]),
    /// The rotation has been applied.
    Done,
}

/// State machine sequencing the attempts of a [`BoundProgram`].
///
/// The loop is unbounded unless a limit on the number of attempts is given.
#[derive(Clone, Debug)]
pub struct RusMachine<'a> {
    program: &'a BoundProgram,
    state: RusState,
    attempts: usize,
    limit: Option<usize>,
}

impl<'a> RusMachine<'a> {
    pub fn new(program: &'a BoundProgram, limit: Option<usize>) -> Self {
        Self { program, state: RusState::Idle, attempts: 0, limit }
    }

    pub fn state(&self) -> RusState { self.state }

    /// Number of preparations applied so far.
    pub fn attempts(&self) -> usize { self.attempts }

    /// Move to the next step.
    ///
    /// Fails if a retry is due and the attempt limit has been reached.
    pub fn advance(&mut self) -> SimResult<RusAction<'a>> {
        let program: &'a BoundProgram = self.program;
        match self.state {
            RusState::Idle => {
                self.state = RusState::AwaitingOutcome;
                self.attempts = 1;
                Ok(RusAction::Apply(program.prepare.iter().collect()))
            },
            RusState::AwaitingOutcome => Ok(RusAction::Measure(&program.ancillas)),
            RusState::Success => Ok(RusAction::Done),
            RusState::Retry => {
                if let Some(limit) = self.limit {
                    if self.attempts >= limit {
                        return Err(SimError::RusRetryLimit(limit));
                    }
                }
                self.state = RusState::AwaitingOutcome;
                self.attempts += 1;
                Ok(RusAction::Apply(
                    program.correction.iter().chain(program.prepare.iter()).collect()
                ))
            },
        }
    }

    /// Report the ancilla outcomes of the last measurement.
    pub fn observe(&mut self, outcomes: &[bool]) -> RusState {
        if self.state == RusState::AwaitingOutcome {
            self.state
                = if outcomes == self.program.condition.as_slice() {
                    RusState::Success
                } else {
                    RusState::Retry
                };
            debug!(attempt = self.attempts, state = ?self.state, "rus outcome");
        }
        self.state
    }
}
