use clap::Parser;
use ovalsim::core::engine::{EngineError, EnginePhase, RaceEngine};
use ovalsim::core::handle_race::{handle_race, AutoPolicy};
use ovalsim::interfaces::bridge::{parse_player_decision, BridgeEncoder};
use ovalsim::post::race_result::RaceResult;
use ovalsim::pre::check_sim_opts_pars::check_sim_opts_pars;
use ovalsim::pre::read_sim_pars::{read_sim_pars, SimPars};
use ovalsim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::cmp::min;
use std::io::BufRead;
use std::thread;
use std::time::{Duration, Instant};

// set maximum number of concurrently running jobs in case of running more than a single
// simulation
const MAX_NO_CONCURRENT_JOBS: u32 = 200;

fn main() {
    match run() {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(err) => {
            eprintln!("ERROR: {:#}", err);
            std::process::exit(exit_code_for(&err));
        }
    }
}

/// exit_code_for maps the error taxonomy to process exit codes: 2 for a broken engine
/// invariant, 1 for everything else (configuration and IO errors).
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::InconsistentState(_)) => 2,
        _ => 1,
    }
}

fn run() -> anyhow::Result<i32> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments and read simulation parameters
    let sim_opts: SimOpts = SimOpts::parse();
    let mut sim_pars = read_sim_pars(sim_opts.parfile_path.as_path())?;

    // check simulation options and parameters
    check_sim_opts_pars(&sim_opts, &sim_pars)?;

    // apply the seed override
    if let Some(seed) = sim_opts.seed {
        sim_pars.race_pars.rng_seed = seed;
    }

    // print race details
    println!(
        "INFO: Simulating {} laps at {} with a tick size of {}ms (seed {})",
        sim_pars.race_pars.total_laps,
        sim_pars.track_pars.name,
        sim_opts.tick_ms,
        sim_pars.race_pars.rng_seed
    );

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.stream_json {
        return run_stream(&sim_pars, &sim_opts);
    }

    let mut race_results: Vec<RaceResult> = Vec::with_capacity(sim_opts.no_sim_runs as usize);
    let t_start = Instant::now();

    if sim_opts.no_sim_runs == 1 {
        // SINGLE RUN ------------------------------------------------------------------------------
        race_results.push(handle_race(
            &sim_pars,
            sim_opts.tick_ms,
            sim_opts.debug,
            None,
            sim_opts.realtime_factor,
            AutoPolicy::DefaultOption,
        )?);
    } else {
        // MULTIPLE RUNS ---------------------------------------------------------------------------
        // every run gets its own seed derived from the base seed so the runs differ but the
        // whole batch stays reproducible
        let mut no_races_left = sim_opts.no_sim_runs;
        let mut next_run_idx = 0u64;

        while no_races_left > 0 {
            // calculate number of simulation runs to execute in current loop
            let tmp_no_sim_runs = min(no_races_left, MAX_NO_CONCURRENT_JOBS);

            // simulate the races and save the results
            race_results.par_extend(
                (next_run_idx..next_run_idx + tmp_no_sim_runs as u64)
                    .into_par_iter()
                    .map(|run_idx| {
                        let mut run_pars = sim_pars.to_owned();
                        run_pars.race_pars.rng_seed =
                            sim_pars.race_pars.rng_seed.wrapping_add(run_idx);

                        handle_race(
                            &run_pars,
                            sim_opts.tick_ms,
                            false,
                            None,
                            0.0,
                            AutoPolicy::DefaultOption,
                        )
                        .expect("Batch simulation run failed!")
                    }),
            );

            // reduce remaining simulation runs
            next_run_idx += tmp_no_sim_runs as u64;
            no_races_left -= tmp_no_sim_runs;
        }
    }

    if sim_opts.debug {
        println!(
            "INFO: Execution time (total): {}ms",
            t_start.elapsed().as_millis()
        );
    }

    // POST-PROCESSING -----------------------------------------------------------------------------
    if race_results.len() == 1 {
        race_results[0].print_classification();

        if sim_opts.debug {
            race_results[0].print_player_laptimes();
        }
    } else {
        print_batch_summary(&race_results);
    }

    Ok(0)
}

/// print_batch_summary aggregates the player finishes of a multi-run batch.
fn print_batch_summary(race_results: &[RaceResult]) {
    let finishes: Vec<u32> = race_results
        .iter()
        .filter_map(|result| result.player_entry().map(|entry| entry.position))
        .collect();

    if finishes.is_empty() {
        return;
    }

    let wins = finishes.iter().filter(|&&p| p == 1).count();
    let top5 = finishes.iter().filter(|&&p| p <= 5).count();
    let avg = finishes.iter().map(|&p| p as f64).sum::<f64>() / finishes.len() as f64;

    println!("RESULT: {} runs", finishes.len());
    println!(
        "RESULT: Player avg finish {:.2}, wins {}, top-5 {}",
        avg, wins, top5
    );
}

/// run_stream drives a single race while streaming line-delimited JSON to stdout and accepting
/// player decisions (and an abort command) on stdin.
fn run_stream(sim_pars: &SimPars, sim_opts: &SimOpts) -> anyhow::Result<i32> {
    let mut engine = RaceEngine::new(
        &sim_pars.race_pars,
        &sim_pars.track_pars,
        &sim_pars.player_pars,
        &sim_pars.ai_pars_all,
        sim_pars.starting_positions.as_deref(),
    )?;

    let driver_colors: Vec<(u32, String)> = std::iter::once(&sim_pars.player_pars)
        .chain(sim_pars.ai_pars_all.iter().map(|pars| &pars.driver))
        .map(|pars| (pars.id, pars.color.to_owned()))
        .collect();
    let encoder = BridgeEncoder::new(engine.track(), &driver_colors)?;

    let rx = engine.subscribe();

    // stdin lines arrive on their own thread; the tick loop drains them without blocking
    let (stdin_tx, stdin_rx) = flume::unbounded::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if stdin_tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    engine.start()?;

    while !engine.is_complete() {
        let t_start = Instant::now();

        engine.simulate_tick(sim_opts.tick_ms)?;

        // apply observer input: decisions for the active prompt, or an abort request
        for line in stdin_rx.try_iter() {
            if line.trim() == "abort" {
                engine.abort();
            } else if let Ok(msg) = parse_player_decision(&line) {
                if engine.phase() == EnginePhase::AwaitingDecision {
                    // an unknown option id keeps the prompt active
                    let _ = engine.submit_decision(&msg.option_id);
                }
            }
        }

        for event in rx.try_iter() {
            if let Some(line) = encoder.encode(&event)? {
                println!("{}", line);
            }
        }

        // pace against the wall clock when a real-time factor is set
        if sim_opts.realtime_factor > 0.0 {
            let t_sleep = (sim_opts.tick_ms as f64 / sim_opts.realtime_factor) as i64
                - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                thread::sleep(Duration::from_millis(t_sleep as u64));
            }
        }
    }

    if engine.phase() == EnginePhase::Aborted {
        return Ok(130);
    }

    if let Some(result) = engine.race_result() {
        result.print_classification();
    }

    Ok(0)
}
