//! Monte-Carlo dwell-chain generation and sampling.

use nalgebra::{DMatrix, RowDVector};
use rand_distr::Exp;

use clamp_core::{default_epsilon, AbortFlag, ClampError, ErrorInfo, Result, RngHandle};
use clamp_protocol::{Epoch, EpochPool, MonteCarloEvent, MonteCarloEventChain, Simulation};

/// Options controlling a Monte-Carlo run batch.
#[derive(Debug, Clone, Copy)]
pub struct MonteCarloOptions {
    /// Number of chains generated per call.
    pub num_runs: usize,
    /// Append to chains from prior calls instead of replacing them.
    pub accumulate_runs: bool,
    /// Reconstruct P(t) from the chains after generation.
    pub sample_runs: bool,
}

impl Default for MonteCarloOptions {
    fn default() -> Self {
        Self {
            num_runs: 100,
            accumulate_runs: false,
            sample_runs: true,
        }
    }
}

/// Stationary distribution of a rate matrix.
///
/// Solves πQ = 0 with Σπ = 1 by augmenting Q with a column of ones:
/// π = 1·(S·Sᵀ)⁻¹ for S = [Q | 1].
pub fn equilibrium_probability(q: &DMatrix<f64>) -> Result<RowDVector<f64>> {
    let n = q.ncols();
    let mut s = DMatrix::<f64>::from_element(n, n + 1, 1.0);
    s.view_mut((0, 0), (n, n)).copy_from(q);
    let gram = &s * s.transpose();
    let inverse = gram.try_inverse().ok_or_else(|| {
        ClampError::Numerical(ErrorInfo::new(
            "equilibrium",
            "stationary distribution system is singular",
        ))
    })?;
    Ok(RowDVector::from_element(n, 1.0) * inverse)
}

fn sample_lifetime(kout: f64, epsilon: f64, end_time: f64, rng: &mut RngHandle) -> Result<f64> {
    if kout > epsilon {
        let distribution = Exp::new(kout).map_err(|_| {
            ClampError::Numerical(
                ErrorInfo::new("lifetime", "invalid exit rate for exponential lifetime")
                    .with_context("rate", kout.to_string()),
            )
        })?;
        Ok(rng.sample(&distribution))
    } else {
        // Absorbing state: dwell past the end of the simulated interval.
        Ok(end_time)
    }
}

fn generate_chain(
    epochs: &[Epoch],
    pool: &EpochPool,
    starting_probability: &RowDVector<f64>,
    end_time: f64,
    epsilon: f64,
    rng: &mut RngHandle,
    abort: &AbortFlag,
) -> Result<MonteCarloEventChain> {
    let num_states = starting_probability.len();
    let mut chain = MonteCarloEventChain::new();
    // Initial state by inverse CDF; floating summation drift falls through
    // to the last state.
    let u = rng.uniform();
    let mut state = num_states - 1;
    let mut cumulative = 0.0;
    for i in 0..num_states {
        cumulative += starting_probability[i];
        if cumulative > u {
            state = i;
            break;
        }
    }
    let mut t_chain = 0.0;
    let mut epoch_idx = 0usize;
    while t_chain < end_time {
        if abort.is_set() {
            return Err(ClampError::aborted());
        }
        let mut kout = pool.get(epochs[epoch_idx].unique).exit_rates[state];
        let mut lifetime = sample_lifetime(kout, epsilon, end_time, rng)?;
        let mut past_last_epoch = false;
        while t_chain + lifetime > epochs[epoch_idx].start + epochs[epoch_idx].duration {
            // Truncate to the epoch boundary and restart memorylessly in the
            // next epoch's rate environment.
            lifetime = epochs[epoch_idx].start + epochs[epoch_idx].duration - t_chain;
            epoch_idx += 1;
            if epoch_idx >= epochs.len() {
                past_last_epoch = true;
                break;
            }
            kout = pool.get(epochs[epoch_idx].unique).exit_rates[state];
            lifetime += sample_lifetime(kout, epsilon, end_time, rng)?;
        }
        if past_last_epoch {
            chain.push(MonteCarloEvent {
                state,
                duration: end_time - t_chain,
            });
            break;
        }
        chain.push(MonteCarloEvent {
            state,
            duration: lifetime,
        });
        t_chain += lifetime;
        if t_chain < end_time {
            // Next state weighted by the rates leaving the current one.
            let u = rng.uniform();
            let rates = &pool.get(epochs[epoch_idx].unique).transition_rates;
            let mut cumulative = 0.0;
            for next in 0..num_states {
                if next == state {
                    continue;
                }
                let rate = rates[(state, next)];
                if rate == 0.0 {
                    continue;
                }
                cumulative += rate / kout;
                if cumulative >= u {
                    state = next;
                    break;
                }
            }
        }
    }
    Ok(chain)
}

/// Generates Monte-Carlo dwell chains for one variable set of a simulation.
///
/// Runs are serial within the simulation so chains replay deterministically
/// for a fixed RNG substream. With `accumulate_runs` new chains append to
/// those of prior calls, otherwise they replace them.
pub fn monte_carlo_simulation(
    sim: &mut Simulation,
    pool: &EpochPool,
    mut starting_probability: RowDVector<f64>,
    opts: &MonteCarloOptions,
    start_equilibrated: bool,
    variable_set: usize,
    abort: &AbortFlag,
) -> Result<()> {
    let num_states = starting_probability.len();
    while sim.events.len() <= variable_set {
        sim.events.push(Vec::new());
    }
    if !opts.accumulate_runs {
        sim.events[variable_set].clear();
    }
    if start_equilibrated {
        let first = pool.get(sim.epochs[0].unique);
        starting_probability = equilibrium_probability(&first.transition_rates)?;
    }
    let epsilon = default_epsilon();
    let end_time = sim.end_time;
    for _ in 0..opts.num_runs {
        if abort.is_set() {
            return Err(ClampError::aborted());
        }
        let chain = generate_chain(
            &sim.epochs,
            pool,
            &starting_probability,
            end_time,
            epsilon,
            &mut sim.rng,
            abort,
        )?;
        sim.events[variable_set].push(chain);
    }
    if opts.sample_runs {
        let p = probability_from_event_chains(
            &sim.time,
            end_time,
            num_states,
            &sim.events[variable_set],
            abort,
        )?;
        sim.ensure_probability_slot(variable_set, num_states);
        sim.probability[variable_set] = p;
    }
    Ok(())
}

/// Reconstructs P(t) from dwell chains by time-weighted averaging.
///
/// Each sample interval `[t_i, t_{i+1})` (with `t_N = end_time`) accumulates
/// `overlap / interval` into the column of the overlapping event's state;
/// the result is divided by the number of chains. Row sums are exactly one
/// when every chain spans the full interval.
pub fn probability_from_event_chains(
    time: &[f64],
    end_time: f64,
    num_states: usize,
    chains: &[MonteCarloEventChain],
    abort: &AbortFlag,
) -> Result<DMatrix<f64>> {
    let num_pts = time.len();
    let mut p = DMatrix::<f64>::zeros(num_pts, num_states);
    if chains.is_empty() {
        return Ok(p);
    }
    for chain in chains {
        if chain.is_empty() {
            continue;
        }
        let mut t = 0usize;
        let mut event = 0usize;
        let mut interval_start = time[0];
        let mut interval_end = if num_pts > 1 { time[1] } else { end_time };
        let mut interval = interval_end - interval_start;
        let mut event_start = 0.0;
        let mut event_end = chain[0].duration;
        while t < num_pts && event < chain.len() {
            if abort.is_set() {
                return Err(ClampError::aborted());
            }
            let state = chain[event].state;
            if event_start <= interval_start && event_end >= interval_end {
                // Event covers the entire sample interval.
                p[(t, state)] += 1.0;
                t += 1;
                interval_start = interval_end;
                interval_end = if t + 1 < num_pts { time[t + 1] } else { end_time };
                interval = interval_end - interval_start;
            } else if event_start <= interval_start {
                // Event stopped mid interval.
                p[(t, state)] += (event_end - interval_start) / interval;
                event += 1;
                if event == chain.len() {
                    break;
                }
                event_start = event_end;
                event_end = event_start + chain[event].duration;
            } else if event_end >= interval_end {
                // Event started mid interval.
                p[(t, state)] += (interval_end - event_start) / interval;
                t += 1;
                interval_start = interval_end;
                interval_end = if t + 1 < num_pts { time[t + 1] } else { end_time };
                interval = interval_end - interval_start;
            } else {
                // Event started and stopped mid interval.
                p[(t, state)] += chain[event].duration / interval;
                event += 1;
                if event == chain.len() {
                    break;
                }
                event_start = event_end;
                event_end = event_start + chain[event].duration;
            }
        }
    }
    p /= chains.len() as f64;
    Ok(p)
}
