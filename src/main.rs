use std::process::ExitCode;
use num_complex::Complex64 as C64;
use qbdd_sim::{
    circuit::{ run_program, InitialState, Op, RunOutput, SimConfig, SimMode, DEFAULT_FRACTION_BITS },
    error::SimResult,
    gate::Gate,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

const N: usize = 5; // number of qubits in the GHZ demo
const SHOTS: usize = 1000;
const SEED: u64 = 10546;

fn ghz() -> SimResult<RunOutput> {
    let mut ops: Vec<Op> = vec![Op::Declare(N), Op::Gate(Gate::H(0))];
    ops.extend((1..N).map(|k| Op::Gate(Gate::CX(k - 1, k))));
    ops.extend((0..N).map(|k| Op::Measure { qubit: k, clbit: k }));
    let config
        = SimConfig::default()
        .with_shots(SHOTS)
        .with_seed(SEED);
    run_program(config, &ops)
}

fn t_ladder() -> SimResult<RunOutput> {
    let h = std::f64::consts::FRAC_1_SQRT_2;
    let init
        = InitialState::from_amplitudes(
            &[C64::new(h, 0.0), C64::new(0.0, 0.0), C64::new(0.0, 0.0), C64::new(0.0, h)],
            DEFAULT_FRACTION_BITS,
        );
    let ops = vec![
        Op::Declare(2),
        Op::InitialState(init),
        Op::Gate(Gate::T(0)),
        Op::Gate(Gate::H(1)),
        Op::Gate(Gate::Toffoli { target: 1, controls: vec![0], ncontrols: vec![] }),
        Op::Gate(Gate::SqrtX(0)),
        Op::ExpVal(vec![0, 1]),
    ];
    let config
        = SimConfig::default()
        .with_mode(SimMode::AllAmplitude)
        .with_precision(8);
    run_program(config, &ops)
}

fn report(name: &str, out: &RunOutput) {
    println!("== {} ==", name);
    for (bits, count) in out.counts.iter() {
        println!("{} : {}", bits, count);
    }
    if let Some(psi) = out.statevector.as_ref() {
        let w = psi.len().trailing_zeros() as usize;
        for (i, a) in psi.iter().enumerate() {
            println!("∣{:0w$b}⟩ : {:+.6} {:+.6}i", i, a.re, a.im, w = w);
        }
    }
    if let Some(e) = out.expectation {
        println!("<Z...Z> = {:.6}", e);
    }
    println!("{}", out.stats);
    println!();
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let runs: [(&str, fn() -> SimResult<RunOutput>); 2]
        = [("ghz sampling", ghz), ("all amplitudes", t_ladder)];
    for (name, run) in runs.into_iter() {
        match run() {
            Ok(out) => report(name, &out),
            Err(e) => {
                error!("{}: {}", name, e);
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            },
        }
    }
    ExitCode::SUCCESS
}
