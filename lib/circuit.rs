//! Simulation sessions: replaying a stream of already-parsed operations
//! against an [`AlgebraicState`] and reading out the results.

use std::{
    collections::BTreeMap,
    fmt,
    path::PathBuf,
};
use itertools::Itertools;
use nalgebra as na;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, SeedableRng };
use tracing::{ debug, warn };
use crate::{
    bdd::Manager,
    error::{ GateError, SimError, SimResult },
    gate::Gate,
    measure::ProbCache,
    rus::{ parse_angle, BoundProgram, GateLibrary, ManifestLibrary, RusAction, RusMachine },
    state::AlgebraicState,
};

/// Fractional bits used when converting floating-point initial amplitudes.
pub const DEFAULT_FRACTION_BITS: usize = 20;

/// Readout performed at the end of a run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SimMode {
    /// Sample every measured qubit from the final state, `shots` times.
    #[default]
    Sampling,
    /// Measure every measured qubit once, collapsing the final state, and
    /// list every amplitude of the result. Costs O(2^n).
    AllAmplitude,
}

/// Session configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub mode: SimMode,
    pub shots: usize,
    pub seed: Option<u64>,
    /// Initial coefficient width in bits.
    pub precision: usize,
    /// Let the diagram manager reorder variables between gates.
    pub reorder: bool,
    pub grow_precision: bool,
    /// Bits added per precision growth.
    pub growth_step: usize,
    /// First qubit of the ancilla register used by `rz`.
    pub rus_ancilla: Option<usize>,
    /// Give up on a repeat-until-success rotation after this many attempts.
    pub rus_retry_limit: Option<usize>,
    /// Directory holding a gate database manifest for `rz`.
    pub rus_database: Option<PathBuf>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            mode: SimMode::Sampling,
            shots: 1,
            seed: None,
            precision: 32,
            reorder: true,
            grow_precision: true,
            growth_step: 3,
            rus_ancilla: None,
            rus_retry_limit: None,
            rus_database: None,
        }
    }
}

impl SimConfig {
    pub fn with_mode(mut self, mode: SimMode) -> Self { self.mode = mode; self }

    pub fn with_shots(mut self, shots: usize) -> Self { self.shots = shots; self }

    pub fn with_seed(mut self, seed: u64) -> Self { self.seed = Some(seed); self }

    pub fn with_precision(mut self, bits: usize) -> Self {
        self.precision = bits;
        self
    }

    pub fn with_reorder(mut self, on: bool) -> Self { self.reorder = on; self }

    pub fn with_growth(mut self, on: bool, step: usize) -> Self {
        self.grow_precision = on;
        self.growth_step = step;
        self
    }

    pub fn with_rus_ancilla(mut self, first: usize) -> Self {
        self.rus_ancilla = Some(first);
        self
    }

    pub fn with_rus_retry_limit(mut self, limit: usize) -> Self {
        self.rus_retry_limit = Some(limit);
        self
    }

    pub fn with_rus_database<P>(mut self, dir: P) -> Self
    where P: Into<PathBuf>
    {
        self.rus_database = Some(dir.into());
        self
    }

    /// Check the settings that would make a run meaningless.
    pub fn validate(&self) -> SimResult<()> {
        if self.shots == 0 { return Err(SimError::InvalidShots); }
        if self.precision < 2 {
            return Err(SimError::InvalidPrecision(self.precision));
        }
        Ok(())
    }

    /// Number of shots actually taken.
    ///
    /// In all-amplitude mode the final state is collapsed onto a single
    /// outcome, so a run that measures anything yields exactly one shot
    /// regardless of `shots`.
    pub fn effective_shots(&self, measured: bool) -> usize {
        if self.mode == SimMode::AllAmplitude && measured {
            if self.shots != 1 {
                warn!(requested = self.shots, "all-amplitude mode with measurement takes a single shot");
            }
            1
        } else {
            self.shots
        }
    }
}

/// A custom initial state.
#[derive(Clone, Debug, PartialEq)]
pub enum InitialState {
    /// `entries[c][i]` is component `c` of basis index `i`, with a common
    /// factor `(1/√2)^scale_bits`.
    Matrix { scale_bits: usize, entries: Vec<Vec<i64>> },
}

impl InitialState {
    /// Round floating-point amplitudes to `fraction_bits` binary places: the
    /// real parts go to the real-axis component and the imaginary parts to the
    /// imaginary-axis component.
    pub fn from_amplitudes(amps: &[C64], fraction_bits: usize) -> Self {
        let scale = 2.0_f64.powi(fraction_bits as i32);
        let mut entries = vec![vec![0_i64; amps.len()]; 4];
        for (i, a) in amps.iter().enumerate() {
            entries[3][i] = (a.re * scale).round() as i64;
            entries[1][i] = (a.im * scale).round() as i64;
        }
        Self::Matrix { scale_bits: 2 * fraction_bits, entries }
    }
}

/// One event of an already-parsed program.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    /// Declare the number of qubits. Must come first, exactly once.
    Declare(usize),
    InitialState(InitialState),
    Gate(Gate),
    /// Read `qubit` into `clbit` at the end of the run.
    Measure { qubit: usize, clbit: usize },
    /// Repeat `prepare` until the `measured` qubits read `condition`, applying
    /// `correction` before each retry. Measured qubits are reset to ∣0⟩.
    Rus {
        prepare: Vec<Gate>,
        measured: Vec<usize>,
        condition: Vec<bool>,
        correction: Vec<Gate>,
    },
    /// Z rotation synthesized by repeat-until-success; `angle` is unparsed
    /// text such as `pi/8`.
    Rz { qubit: usize, angle: String },
    /// Request the ⟨Z⊗…⊗Z⟩ expectation value over these qubits.
    ExpVal(Vec<usize>),
}

/// Run statistics.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stats {
    pub gates: usize,
    pub peak_nodes: usize,
    /// |1 - total probability| of the final state.
    pub accuracy_loss: f64,
    pub precision: usize,
    pub growth_events: usize,
    pub ignored_overflows: usize,
    pub skipped_ops: usize,
    pub rus_attempts: usize,
    pub reorderings: usize,
    pub shots: usize,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "gates applied:      {}", self.gates)?;
        writeln!(f, "peak node count:    {}", self.peak_nodes)?;
        writeln!(f, "accuracy loss:      {:e}", self.accuracy_loss)?;
        writeln!(f, "integer bit width:  {}", self.precision)?;
        writeln!(f, "precision growths:  {}", self.growth_events)?;
        writeln!(f, "ignored overflows:  {}", self.ignored_overflows)?;
        writeln!(f, "skipped operations: {}", self.skipped_ops)?;
        writeln!(f, "rus attempts:       {}", self.rus_attempts)?;
        writeln!(f, "reorderings:        {}", self.reorderings)?;
        write!(f, "shots:              {}", self.shots)
    }
}

/// Everything a run reports.
#[derive(Clone, Debug)]
pub struct RunOutput {
    /// Outcome counts keyed by classical register contents, classical bit 0
    /// rightmost.
    pub counts: BTreeMap<String, usize>,
    /// Final amplitudes, in all-amplitude mode only.
    pub statevector: Option<na::DVector<C64>>,
    pub expectation: Option<f64>,
    pub stats: Stats,
}

/// Main driver: owns the diagram manager, the state, the random number
/// generator and all counters for one run.
pub struct Simulator {
    config: SimConfig,
    mgr: Manager,
    state: AlgebraicState,
    rng: StdRng,
    cache: ProbCache,
    // classical bit -> measured qubit
    clbits: BTreeMap<usize, usize>,
    expval: Option<Vec<usize>>,
    library: Option<Box<dyn GateLibrary>>,
    stats: Stats,
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("clbits", &self.clbits)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Simulator {
    /// Create a new session for `n` qubits initialized to ∣0...0⟩.
    ///
    /// Opens the gate database named in `config`, if any.
    pub fn new(n: usize, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let mgr = Manager::new(n);
        mgr.set_auto_reorder(config.reorder);
        let mut state = AlgebraicState::basis(&mgr, config.precision, &[]);
        state.set_growth(config.grow_precision, config.growth_step);
        let rng
            = config.seed.map(StdRng::seed_from_u64)
            .unwrap_or_else(StdRng::from_entropy);
        let library: Option<Box<dyn GateLibrary>>
            = match config.rus_database.as_ref() {
                Some(dir) => Some(Box::new(ManifestLibrary::open(dir)?)),
                None => None,
            };
        Ok(Self {
            config,
            mgr,
            state,
            rng,
            cache: ProbCache::new(),
            clbits: BTreeMap::new(),
            expval: None,
            library,
            stats: Stats::default(),
        })
    }

    /// Replace the gate library used by `rz`.
    pub fn set_library<L>(&mut self, library: L) -> &mut Self
    where L: GateLibrary + 'static
    {
        self.library = Some(Box::new(library));
        self
    }

    pub fn state(&self) -> &AlgebraicState { &self.state }

    pub fn stats(&self) -> &Stats { &self.stats }

    pub fn config(&self) -> &SimConfig { &self.config }

    pub fn num_qubits(&self) -> usize { self.state.num_qubits() }

    fn check_qubit(&self, qubit: usize) -> Result<(), GateError> {
        let n = self.num_qubits();
        if qubit >= n { Err(GateError::OutOfRange { qubit, n }) } else { Ok(()) }
    }

    /// Replace the state with a custom one.
    pub fn set_initial_state(&mut self, init: &InitialState) -> SimResult<&mut Self> {
        let InitialState::Matrix { scale_bits, entries } = init;
        let mut state
            = AlgebraicState::from_matrix(
                &self.mgr, self.config.precision, *scale_bits, entries)?;
        state.set_growth(self.config.grow_precision, self.config.growth_step);
        self.state = state;
        self.cache.clear();
        Ok(self)
    }

    /// Apply a gate, count it, and give the manager a chance to reorder.
    pub fn apply_gate(&mut self, gate: &Gate) -> Result<&mut Self, GateError> {
        self.state.apply_gate(gate)?;
        self.stats.gates += 1;
        if gate.qubits().iter().any(|q| self.clbits.values().any(|m| m == q)) {
            debug!(%gate, "gate after measurement; the final state is what gets read out");
        }
        if self.config.reorder && self.mgr.maybe_reorder() {
            self.stats.reorderings += 1;
            debug!(nodes = self.mgr.node_count(), order = ?self.mgr.order(), "reordered variables");
        }
        self.stats.peak_nodes = self.stats.peak_nodes.max(self.mgr.peak_node_count());
        Ok(self)
    }

    /// Map `clbit` to `qubit`. Every mapped qubit is read from the final
    /// state by [`finish`][Self::finish], in either mode.
    pub fn measure(&mut self, qubit: usize, clbit: usize) -> Result<&mut Self, GateError> {
        self.check_qubit(qubit)?;
        self.clbits.insert(clbit, qubit);
        Ok(self)
    }

    /// Request an expectation value over `qubits` at the end of the run.
    pub fn request_expectation(&mut self, qubits: &[usize]) -> Result<&mut Self, GateError> {
        qubits.iter().try_for_each(|q| self.check_qubit(*q))?;
        self.expval = Some(qubits.to_vec());
        Ok(self)
    }

    /// Rotate `qubit` about Z by the angle written in `angle`, using the gate
    /// library and the configured ancilla register.
    ///
    /// Returns the number of attempts taken.
    pub fn rz(&mut self, qubit: usize, angle: &str) -> SimResult<usize> {
        self.check_qubit(qubit)?;
        let theta
            = parse_angle(angle)
            .map_err(|_| GateError::BadAngle(angle.to_string()))?;
        let first = self.config.rus_ancilla.ok_or(GateError::RusUnavailable)?;
        let program
            = self.library.as_ref()
            .ok_or(GateError::RusUnavailable)?
            .lookup(theta)?;
        let ancillas: Vec<usize> = (first..first + program.ancillas).collect();
        let bound = program.bind(qubit, &ancillas)?;
        self.rus(&bound)
    }

    /// Drive `program` to success, measuring (and resetting) its ancillas
    /// after every preparation.
    ///
    /// Returns the number of attempts taken.
    pub fn rus(&mut self, program: &BoundProgram) -> SimResult<usize> {
        program.validate(self.num_qubits())?;
        let mut machine = RusMachine::new(program, self.config.rus_retry_limit);
        let result
            = loop {
                match machine.advance() {
                    Ok(RusAction::Apply(gates)) => {
                        for gate in gates { self.apply_gate(gate)?; }
                    },
                    Ok(RusAction::Measure(ancillas)) => {
                        self.cache.clear();
                        let bits
                            = self.state.measure_qubits(
                                ancillas, true, &mut self.cache, &mut self.rng);
                        machine.observe(&bits);
                    },
                    Ok(RusAction::Done) => { break Ok(machine.attempts()); },
                    Err(e) => { break Err(e); },
                }
            };
        self.stats.rus_attempts += machine.attempts();
        result
    }

    /// Execute one operation. Contract violations are logged and skipped;
    /// anything else is returned.
    pub fn execute(&mut self, op: &Op) -> SimResult<()> {
        let res
            = match op {
                Op::Declare(_) => Err(SimError::AlreadyDeclared),
                Op::InitialState(init) => self.set_initial_state(init).map(|_| ()),
                Op::Gate(gate) => self.apply_gate(gate).map(|_| ()).map_err(SimError::from),
                Op::Measure { qubit, clbit }
                    => self.measure(*qubit, *clbit).map(|_| ()).map_err(SimError::from),
                Op::Rus { prepare, measured, condition, correction }
                    => BoundProgram::new(
                        prepare.clone(),
                        measured.clone(),
                        condition.clone(),
                        correction.clone(),
                    )
                    .map_err(SimError::from)
                    .and_then(|program| self.rus(&program))
                    .map(|_| ()),
                Op::Rz { qubit, angle } => self.rz(*qubit, angle).map(|_| ()),
                Op::ExpVal(qubits)
                    => self.request_expectation(qubits).map(|_| ()).map_err(SimError::from),
            };
        match res {
            Err(SimError::Gate(e)) => {
                warn!(error = %e, ?op, "skipping operation");
                self.stats.skipped_ops += 1;
                Ok(())
            },
            other => other,
        }
    }

    /// List every amplitude of the current state.
    ///
    /// Only available in all-amplitude mode.
    pub fn statevector(&self) -> SimResult<na::DVector<C64>> {
        if self.config.mode != SimMode::AllAmplitude {
            return Err(SimError::AmplitudeModeRequired);
        }
        self.state.amplitudes()
    }

    fn bitstring<F>(&self, bit: F) -> String
    where F: Fn(usize) -> bool
    {
        let width = self.clbits.keys().next_back().map(|c| c + 1).unwrap_or(0);
        (0..width).rev()
            .map(|c| if self.clbits.contains_key(&c) && bit(c) { '1' } else { '0' })
            .collect()
    }

    /// Perform the final readout and return the results.
    pub fn finish(mut self) -> SimResult<RunOutput> {
        let measured = !self.clbits.is_empty();
        let shots = self.config.effective_shots(measured);
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        let statevector
            = match self.config.mode {
                SimMode::Sampling => {
                    if !measured && self.expval.is_none() {
                        return Err(SimError::NothingToSample);
                    }
                    if measured {
                        self.cache.clear();
                        for _ in 0..shots {
                            let bits = self.state.sample_one(&mut self.cache, &mut self.rng);
                            let key = self.bitstring(|c| bits[self.clbits[&c]]);
                            *counts.entry(key).or_insert(0) += 1;
                        }
                    }
                    None
                },
                SimMode::AllAmplitude => {
                    if measured {
                        let qubits: Vec<usize>
                            = self.clbits.values().copied().unique().collect();
                        let bits
                            = self.state.measure_qubits(
                                &qubits, false, &mut self.cache, &mut self.rng);
                        let outcome: BTreeMap<usize, bool>
                            = qubits.into_iter().zip(bits).collect();
                        let key = self.bitstring(|c| outcome[&self.clbits[&c]]);
                        counts.insert(key, 1);
                    }
                    Some(self.statevector()?)
                },
            };
        let expectation
            = self.expval.as_ref()
            .map(|qubits| self.state.expectation_z(qubits, &mut self.cache));
        let total = self.state.total_probability(&mut self.cache);
        let growth = *self.state.growth();
        let stats = Stats {
            peak_nodes: self.stats.peak_nodes.max(self.mgr.peak_node_count()),
            accuracy_loss: (1.0 - total).abs(),
            precision: self.state.precision(),
            growth_events: growth.events,
            ignored_overflows: growth.ignored,
            shots,
            ..self.stats.clone()
        };
        debug!(%stats, "run finished");
        Ok(RunOutput { counts, statevector, expectation, stats })
    }
}

/// Run a whole program: `ops` must open with [`Op::Declare`].
pub fn run_program(config: SimConfig, ops: &[Op]) -> SimResult<RunOutput> {
    run_program_with(config, ops, None)
}

/// Like [`run_program`], but with an explicit gate library for `rz`, which
/// takes precedence over any database named in `config`.
pub fn run_program_with(
    config: SimConfig,
    ops: &[Op],
    library: Option<Box<dyn GateLibrary>>,
) -> SimResult<RunOutput>
{
    config.validate()?;
    let (n, rest)
        = match ops.split_first() {
            Some((Op::Declare(n), rest)) => (*n, rest),
            _ => { return Err(SimError::NotDeclared); },
        };
    let mut config = config;
    if library.is_some() { config.rus_database = None; }
    let mut sim = Simulator::new(n, config)?;
    if let Some(library) = library { sim.library = Some(library); }
    for op in rest.iter() { sim.execute(op)?; }
    sim.finish()
}

#[cfg(test)]
mod test {
    use std::path::Path;
    use approx::assert_relative_eq;
    use crate::{ error::RusError, rus::RusProgram };
    use super::*;

    fn stub(prepare: &'static str, condition: &'static str)
        -> Box<dyn GateLibrary>
    {
        Box::new(move |_angle: f64| {
            RusProgram::parse(
                &format!(
                    "ancillas: 1\ncondition: {}\nprepare: {}\ncorrection: z 0\n",
                    condition, prepare,
                ),
                Path::new("stub"),
            )
        })
    }

    #[test]
    fn hadamard_shots_split() {
        let ops = [
            Op::Declare(1),
            Op::Gate(Gate::H(0)),
            Op::Measure { qubit: 0, clbit: 0 },
        ];
        let config = SimConfig::default().with_shots(100).with_seed(10546);
        let out = run_program(config.clone(), &ops).unwrap();
        let zeros = out.counts.get("0").copied().unwrap_or(0);
        let ones = out.counts.get("1").copied().unwrap_or(0);
        assert_eq!(zeros + ones, 100);
        assert!((30..=70).contains(&zeros), "{:?}", out.counts);
        assert!(out.statevector.is_none());
        assert_eq!(out.stats.gates, 1);
        // fixed seed reproduces the run
        let again = run_program(config, &ops).unwrap();
        assert_eq!(out.counts, again.counts);
    }

    #[test]
    fn bell_amplitudes() {
        let ops = [
            Op::Declare(2),
            Op::Gate(Gate::X(0)),
            Op::Gate(Gate::CX(0, 1)),
        ];
        let config = SimConfig::default().with_mode(SimMode::AllAmplitude);
        let out = run_program(config, &ops).unwrap();
        let psi = out.statevector.unwrap();
        for (i, a) in psi.iter().enumerate() {
            let expected = if i == 0b11 { 1.0 } else { 0.0 };
            assert_relative_eq!(a.re, expected, epsilon = 1e-12);
            assert_relative_eq!(a.im, 0.0, epsilon = 1e-12);
        }
        assert!(out.counts.is_empty());
        assert_relative_eq!(out.stats.accuracy_loss, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn rus_stub_succeeds_first_time() {
        let ops = [
            Op::Declare(2),
            Op::Gate(Gate::H(0)),
            Op::Rz { qubit: 0, angle: "pi/4".into() },
            Op::ExpVal(vec![1]),
        ];
        for seed in 0..10 {
            let config
                = SimConfig::default()
                .with_mode(SimMode::AllAmplitude)
                .with_rus_ancilla(1)
                .with_seed(seed);
            // the ancilla is left in ∣0⟩, which is the success outcome
            let out
                = run_program_with(config, &ops, Some(stub("t 0; h 1; h 1", "0")))
                .unwrap();
            assert_eq!(out.stats.rus_attempts, 1);
            assert_eq!(out.stats.skipped_ops, 0);
            let psi = out.statevector.unwrap();
            let h = std::f64::consts::FRAC_1_SQRT_2;
            assert_relative_eq!(psi[0].re, h, epsilon = 1e-12);
            assert_relative_eq!(psi[1].re, 0.5, epsilon = 1e-12);
            assert_relative_eq!(psi[1].im, 0.5, epsilon = 1e-12);
            assert_relative_eq!(out.expectation.unwrap(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn rus_from_database() {
        let dir
            = std::env::temp_dir()
            .join(format!("qbdd-sim-database-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(crate::rus::MANIFEST),
            "angle_unit: pi/4\n1: quarter.rus\n",
        ).unwrap();
        std::fs::write(
            dir.join("quarter.rus"),
            "ancillas: 1\ncondition: 0\nprepare: t 0; h 1; h 1\ncorrection: tdg 0\n",
        ).unwrap();
        let ops = [
            Op::Declare(2),
            Op::Gate(Gate::X(0)),
            Op::Rz { qubit: 0, angle: "pi/4".into() },
            Op::Rz { qubit: 0, angle: "9pi/4".into() },
        ];
        let config
            = SimConfig::default()
            .with_mode(SimMode::AllAmplitude)
            .with_rus_ancilla(1)
            .with_rus_database(&dir)
            .with_seed(2);
        let out = run_program(config.clone(), &ops).unwrap();
        assert_eq!(out.stats.rus_attempts, 2);
        let psi = out.statevector.unwrap();
        // ∣1⟩ picks up ω twice
        assert_relative_eq!(psi[1].re, 0.0, epsilon = 1e-12);
        assert_relative_eq!(psi[1].im, 1.0, epsilon = 1e-12);
        // no entry for index 2
        let ops = [Op::Declare(2), Op::Rz { qubit: 0, angle: "pi/2".into() }];
        assert!(matches!(
            run_program(config, &ops),
            Err(SimError::Rus(RusError::MissingEntry(2))),
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rus_retry_limit() {
        let ops = [Op::Declare(2), Op::Rz { qubit: 0, angle: "pi/4".into() }];
        let config
            = SimConfig::default()
            .with_mode(SimMode::AllAmplitude)
            .with_rus_ancilla(1)
            .with_rus_retry_limit(3)
            .with_seed(0);
        // the ancilla always reads 1
        let err = run_program_with(config, &ops, Some(stub("x 1", "0"))).unwrap_err();
        assert!(matches!(err, SimError::RusRetryLimit(3)));
    }

    #[test]
    fn rus_retries_until_success() {
        let ops = [
            Op::Declare(2),
            Op::Rz { qubit: 0, angle: "-pi/4".into() },
            Op::Measure { qubit: 0, clbit: 0 },
        ];
        let config
            = SimConfig::default()
            .with_rus_ancilla(1)
            .with_shots(10)
            .with_seed(3);
        let out = run_program_with(config, &ops, Some(stub("h 1", "0"))).unwrap();
        assert!(out.stats.rus_attempts >= 1);
        assert_eq!(out.counts.get("0").copied(), Some(10));
    }

    #[test]
    fn contract_violations_are_skipped() {
        let ops = [
            Op::Declare(1),
            Op::Gate(Gate::H(3)),
            Op::Gate(Gate::X(0)),
            Op::Rz { qubit: 0, angle: "half a turn".into() },
            Op::Rz { qubit: 0, angle: "pi/4".into() },
            Op::Measure { qubit: 2, clbit: 0 },
            Op::ExpVal(vec![0]),
        ];
        let config = SimConfig::default().with_mode(SimMode::AllAmplitude);
        let out = run_program(config, &ops).unwrap();
        assert_eq!(out.stats.skipped_ops, 4);
        assert_eq!(out.stats.gates, 1);
        let psi = out.statevector.unwrap();
        assert_relative_eq!(psi[1].re, 1.0, epsilon = 1e-12);
        assert_relative_eq!(out.expectation.unwrap(), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn fatal_conditions() {
        let config = SimConfig::default();
        assert!(matches!(
            run_program(config.clone(), &[Op::Gate(Gate::X(0))]),
            Err(SimError::NotDeclared),
        ));
        assert!(matches!(
            run_program(config.clone(), &[Op::Declare(1), Op::Declare(1)]),
            Err(SimError::AlreadyDeclared),
        ));
        assert!(matches!(
            run_program(config.clone(), &[Op::Declare(1), Op::Gate(Gate::H(0))]),
            Err(SimError::NothingToSample),
        ));
        assert!(matches!(
            run_program(config.clone().with_shots(0), &[Op::Declare(1)]),
            Err(SimError::InvalidShots),
        ));
        assert!(matches!(
            run_program(config.clone().with_precision(1), &[Op::Declare(1)]),
            Err(SimError::InvalidPrecision(1)),
        ));
        let missing = std::env::temp_dir().join("qbdd-sim-no-such-database");
        assert!(matches!(
            run_program(config.with_rus_database(missing), &[Op::Declare(1)]),
            Err(SimError::Rus(RusError::Io { .. })),
        ));
    }

    #[test]
    fn single_shot_in_all_amplitude_mode() {
        let sampling = SimConfig::default().with_shots(50);
        assert_eq!(sampling.effective_shots(true), 50);
        let all = sampling.clone().with_mode(SimMode::AllAmplitude);
        assert_eq!(all.effective_shots(false), 50);
        assert_eq!(all.effective_shots(true), 1);

        let ops = [
            Op::Declare(2),
            Op::Gate(Gate::H(0)),
            Op::Gate(Gate::CX(0, 1)),
            Op::Measure { qubit: 0, clbit: 1 },
        ];
        let out = run_program(all.with_seed(5), &ops).unwrap();
        assert_eq!(out.stats.shots, 1);
        assert_eq!(out.counts.values().sum::<usize>(), 1);
        // the collapse is visible in the listed amplitudes
        let psi = out.statevector.unwrap();
        let (key, _) = out.counts.iter().next().unwrap();
        let idx = if key == "10" { 0b11 } else { 0b00 };
        assert_relative_eq!(psi[idx].re, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn classical_bit_order() {
        let ops = [
            Op::Declare(3),
            Op::Gate(Gate::X(2)),
            Op::Measure { qubit: 2, clbit: 0 },
            Op::Measure { qubit: 0, clbit: 2 },
        ];
        let out = run_program(SimConfig::default().with_shots(4), &ops).unwrap();
        assert_eq!(out.counts.get("001").copied(), Some(4));
    }

    #[test]
    fn statevector_needs_all_amplitude_mode() {
        let sim = Simulator::new(1, SimConfig::default()).unwrap();
        assert!(matches!(sim.statevector(), Err(SimError::AmplitudeModeRequired)));
    }

    #[test]
    fn initial_state_from_amplitudes() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let init = InitialState::from_amplitudes(
            &[C64::new(h, 0.0), C64::new(0.0, h)], DEFAULT_FRACTION_BITS);
        let ops = [
            Op::Declare(1),
            Op::InitialState(init),
            Op::Gate(Gate::SInv(0)),
        ];
        let config = SimConfig::default().with_mode(SimMode::AllAmplitude);
        let out = run_program(config, &ops).unwrap();
        let psi = out.statevector.unwrap();
        assert_relative_eq!(psi[0].re, h, epsilon = 1e-6);
        assert_relative_eq!(psi[1].re, h, epsilon = 1e-6);
        assert_relative_eq!(psi[1].im, 0.0, epsilon = 1e-6);
        assert!(out.stats.accuracy_loss < 1e-5);
    }

    #[test]
    fn reordering_keeps_results() {
        let n = 8;
        let mut ops = vec![Op::Declare(n)];
        for k in 0..n / 2 {
            ops.push(Op::Gate(Gate::H(k)));
            ops.push(Op::Gate(Gate::CX(k, k + n / 2)));
            ops.push(Op::Gate(Gate::T(k)));
        }
        ops.push(Op::ExpVal(vec![0, n / 2]));
        let base = SimConfig::default().with_mode(SimMode::AllAmplitude).with_precision(4);
        let plain = run_program(base.clone().with_reorder(false), &ops).unwrap();
        let mut sim = Simulator::new(n, base.with_reorder(true)).unwrap();
        for op in ops[1..].iter() {
            sim.execute(op).unwrap();
            sim.mgr.reorder();
        }
        let sifted = sim.finish().unwrap();
        let (a, b) = (plain.statevector.unwrap(), sifted.statevector.unwrap());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_relative_eq!(x.re, y.re, epsilon = 1e-12);
            assert_relative_eq!(x.im, y.im, epsilon = 1e-12);
        }
        assert_relative_eq!(sifted.expectation.unwrap(), 1.0, epsilon = 1e-12);
    }
    #[test]
    fn modes_read_the_final_state() {
        // the second H undoes the first, so both bits read the final ∣0⟩
        let ops = [
            Op::Declare(1),
            Op::Gate(Gate::H(0)),
            Op::Measure { qubit: 0, clbit: 0 },
            Op::Gate(Gate::H(0)),
            Op::Measure { qubit: 0, clbit: 1 },
        ];
        let sampled
            = run_program(SimConfig::default().with_shots(200).with_seed(1), &ops)
            .unwrap();
        assert_eq!(sampled.counts.get("00").copied(), Some(200));
        for seed in 0..20 {
            let config
                = SimConfig::default()
                .with_mode(SimMode::AllAmplitude)
                .with_seed(seed);
            let out = run_program(config, &ops).unwrap();
            assert_eq!(out.counts.get("00").copied(), Some(1));
        }

        // correlated outcomes have the same support in both modes
        let ops = [
            Op::Declare(2),
            Op::Gate(Gate::H(0)),
            Op::Measure { qubit: 0, clbit: 0 },
            Op::Gate(Gate::CX(0, 1)),
            Op::Measure { qubit: 1, clbit: 1 },
        ];
        let sampled
            = run_program(SimConfig::default().with_shots(200).with_seed(2), &ops)
            .unwrap();
        let mut single: BTreeMap<String, usize> = BTreeMap::new();
        for seed in 0..40 {
            let config
                = SimConfig::default()
                .with_mode(SimMode::AllAmplitude)
                .with_seed(seed);
            let out = run_program(config, &ops).unwrap();
            let (key, _) = out.counts.into_iter().next().unwrap();
            let psi = out.statevector.unwrap();
            let idx = usize::from_str_radix(&key, 2).unwrap();
            assert_relative_eq!(psi[idx].norm(), 1.0, epsilon = 1e-12);
            *single.entry(key).or_insert(0) += 1;
        }
        let support = |counts: &BTreeMap<String, usize>| -> Vec<String> {
            counts.keys().cloned().collect()
        };
        assert_eq!(support(&sampled.counts), vec!["00", "11"]);
        assert_eq!(support(&single), vec!["00", "11"]);
    }

    #[test]
    fn rus_until_condition() {
        // qubit 2 starts in ∣1⟩, so the first readout of ancilla 1 fails; the
        // correction clears qubit 2 and the second attempt succeeds
        let rus = Op::Rus {
            prepare: vec![Gate::CX(2, 1)],
            measured: vec![1],
            condition: vec![false],
            correction: vec![Gate::X(2)],
        };
        let ops = [
            Op::Declare(3),
            Op::Gate(Gate::X(2)),
            Op::Gate(Gate::H(0)),
            rus,
            Op::ExpVal(vec![2]),
        ];
        for seed in 0..5 {
            let config
                = SimConfig::default()
                .with_mode(SimMode::AllAmplitude)
                .with_seed(seed);
            let out = run_program(config, &ops).unwrap();
            assert_eq!(out.stats.rus_attempts, 2);
            assert_eq!(out.stats.gates, 5);
            assert_relative_eq!(out.expectation.unwrap(), 1.0, epsilon = 1e-12);
            let psi = out.statevector.unwrap();
            let h = std::f64::consts::FRAC_1_SQRT_2;
            assert_relative_eq!(psi[0b000].re, h, epsilon = 1e-12);
            assert_relative_eq!(psi[0b001].re, h, epsilon = 1e-12);
        }

        let config = SimConfig::default().with_mode(SimMode::AllAmplitude);
        let out_of_range = [
            Op::Declare(2),
            Op::Rus {
                prepare: vec![],
                measured: vec![4],
                condition: vec![false],
                correction: vec![],
            },
        ];
        let out = run_program(config.clone(), &out_of_range).unwrap();
        assert_eq!(out.stats.skipped_ops, 1);
        assert_eq!(out.stats.rus_attempts, 0);
        let mismatched = [
            Op::Declare(2),
            Op::Rus {
                prepare: vec![],
                measured: vec![1],
                condition: vec![false, true],
                correction: vec![],
            },
        ];
        assert!(matches!(
            run_program(config, &mismatched),
            Err(SimError::Rus(RusError::ConditionMismatch { expected: 1, got: 2 })),
        ));
    }

    #[test]
    fn overflow_statistics() {
        // 7 + 7 does not fit in 4 bits
        let init = InitialState::Matrix {
            scale_bits: 1,
            entries: vec![vec![0, 0], vec![0, 0], vec![0, 0], vec![7, 7]],
        };
        let ops = [Op::Declare(1), Op::InitialState(init), Op::Gate(Gate::H(0))];
        let base
            = SimConfig::default()
            .with_mode(SimMode::AllAmplitude)
            .with_precision(4);
        let grown = run_program(base.clone(), &ops).unwrap();
        assert_eq!(grown.stats.growth_events, 1);
        assert_eq!(grown.stats.ignored_overflows, 0);
        assert_eq!(grown.stats.precision, 7);
        assert!(grown.stats.peak_nodes > 0);
        let fixed = run_program(base.with_growth(false, 3), &ops).unwrap();
        assert_eq!(fixed.stats.growth_events, 0);
        assert_eq!(fixed.stats.ignored_overflows, 1);
        assert_eq!(fixed.stats.precision, 4);
        assert!(fixed.stats.peak_nodes > 0);
        assert_eq!(fixed.stats.gates, 1);
    }
}
