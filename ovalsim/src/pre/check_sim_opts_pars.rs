use crate::core::track::Track;
use crate::pre::read_sim_pars::SimPars;
use crate::pre::sim_opts::SimOpts;
use anyhow::Context;
use helpers::general::InputValueError;

/// check_sim_opts_pars assures that the inserted options and parameters are within reasonable
/// limits and raises an error if not. The engine re-validates the parameters on construction;
/// the checks here exist to reject bad input with a readable message before any work is done.
pub fn check_sim_opts_pars(sim_opts: &SimOpts, sim_pars: &SimPars) -> anyhow::Result<()> {
    // PART 1: SIMULATION OPTIONS
    if !(10..=1000).contains(&sim_opts.tick_ms) {
        return Err(InputValueError).context(format!(
            "tick_ms is {}, which is not within the reasonable range of [10, 1000]ms!",
            sim_opts.tick_ms
        ));
    }

    if sim_opts.no_sim_runs < 1 {
        return Err(InputValueError).context(format!(
            "no_sim_runs must be at least equal to one, but is {}!",
            sim_opts.no_sim_runs
        ));
    }

    if sim_opts.stream_json && sim_opts.no_sim_runs != 1 {
        return Err(InputValueError)
            .context("If stream_json is activated, no_sim_runs must be equal to one!");
    }

    if sim_opts.realtime_factor < 0.0 || sim_opts.realtime_factor > 100.0 {
        return Err(InputValueError).context(format!(
            "realtime_factor is {:.3}, which is not within the reasonable range of [0.0, 100.0]!",
            sim_opts.realtime_factor
        ));
    }

    // PART 2: SIMULATION PARAMETERS
    // RACE -----------------------------------------------------------------------------------------
    if sim_pars.race_pars.total_laps < 1 {
        return Err(InputValueError).context("total_laps must be at least equal to one!");
    }

    if sim_pars.ai_pars_all.is_empty() {
        return Err(InputValueError).context("The field needs at least one AI driver!");
    }

    // TRACK ---------------------------------------------------------------------------------------
    Track::new(&sim_pars.track_pars).context("Track parameters are invalid!")?;

    // DRIVERS -------------------------------------------------------------------------------------
    let mut numbers: Vec<u32> = sim_pars
        .ai_pars_all
        .iter()
        .map(|pars| pars.driver.number)
        .collect();
    numbers.push(sim_pars.player_pars.number);
    numbers.sort_unstable();

    for pair in numbers.windows(2) {
        if pair[0] == pair[1] {
            return Err(InputValueError).context(format!(
                "Car number {} is used by more than one driver!",
                pair[0]
            ));
        }
    }

    for driver_pars in std::iter::once(&sim_pars.player_pars)
        .chain(sim_pars.ai_pars_all.iter().map(|pars| &pars.driver))
    {
        if driver_pars.skills.as_array().iter().any(|&level| level > 100) {
            return Err(InputValueError).context(format!(
                "Driver {} has a skill level above 100!",
                driver_pars.name
            ));
        }
    }

    Ok(())
}
