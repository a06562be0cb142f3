use crate::core::engine::{EnginePhase, RaceEngine};
use crate::interfaces::observer::EngineEvent;
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// How the runner answers player prompts when no interactive client is attached.
///
/// * `DefaultOption` - Immediately submits the default (low-risk) option, which rolls a real
/// outcome
/// * `Timeout` - Lets the shot clock run out, which resolves as a neutral outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPolicy {
    DefaultOption,
    Timeout,
}

/// handle_race creates and simulates a race on the basis of the inserted parameters, and
/// returns the result for post-processing. If a sender is inserted, all engine events are
/// forwarded to it; with a positive real-time factor the simulation is paced against the wall
/// clock for live observers.
pub fn handle_race(
    sim_pars: &SimPars,
    tick_ms: i64,
    print_debug: bool,
    tx: Option<&Sender<EngineEvent>>,
    realtime_factor: f64,
    auto_policy: AutoPolicy,
) -> anyhow::Result<RaceResult> {
    // create the race engine
    let mut engine = RaceEngine::new(
        &sim_pars.race_pars,
        &sim_pars.track_pars,
        &sim_pars.player_pars,
        &sim_pars.ai_pars_all,
        sim_pars.starting_positions.as_deref(),
    )?;

    // attach the forwarding observer if a sender was inserted
    let rx = tx.map(|_| engine.subscribe());

    engine.start()?;

    let sim_realtime = realtime_factor > 0.0;
    let mut t_race_update_print = 0.0;

    // simulate the race -> execute ticks until every car has taken the checkered flag
    while !engine.is_complete() {
        let t_start = Instant::now();

        engine.simulate_tick(tick_ms)?;

        // answer a pending prompt according to the auto policy
        if engine.phase() == EnginePhase::AwaitingDecision && auto_policy == AutoPolicy::DefaultOption
        {
            let default_id = engine
                .current_state()
                .active_decision
                .map(|decision| decision.default_option_id)
                .expect("Awaiting-decision phase carries an active prompt!");
            engine.submit_decision(&default_id)?;
        }

        // forward engine events to the external observer
        if let (Some(tx), Some(rx)) = (tx, rx.as_ref()) {
            for event in rx.try_iter() {
                tx.send(event)
                    .context("Failed to send engine event to the observer!")?;
            }
        }

        // print status (with a maximum of 1 Hz of simulated time)
        if print_debug && engine.race_time_s() > t_race_update_print + 0.9999 {
            println!(
                "INFO: Simulating... Current race time is {:.3}s, current lap is {}",
                engine.race_time_s(),
                engine.current_lap()
            );
            t_race_update_print = engine.race_time_s();
        }

        // sleep until the tick is finished in real-time as well (calculation in ms)
        if sim_realtime {
            let t_sleep =
                (tick_ms as f64 / realtime_factor) as i64 - t_start.elapsed().as_millis() as i64;

            if t_sleep > 0 {
                sleep(Duration::from_millis(t_sleep as u64));
            } else {
                println!("WARNING: Could not keep up with real-time!")
            }
        }
    }

    engine
        .race_result()
        .context("Race ended without a result!")
}
