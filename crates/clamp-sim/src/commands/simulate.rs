use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use clap::Args;

use clamp_engine::write_event_chains_dwt;
use clamp_protocol::Protocol;
use clamp_session::Session;

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// YAML model description.
    #[arg(long)]
    pub model: PathBuf,
    /// YAML protocol file (repeatable).
    #[arg(long = "protocol", required = true)]
    pub protocols: Vec<PathBuf>,
    /// YAML simulation options.
    #[arg(long)]
    pub options: Option<PathBuf>,
    /// Output directory for run artefacts.
    #[arg(long)]
    pub out: PathBuf,
    /// Export Monte-Carlo event chains as .dwt files.
    #[arg(long)]
    pub dwt: bool,
    /// Master seed override.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(&args.out)?;
    let mut session = commands_session(args)?;
    let outcome = session.simulate();
    let report = serde_json::json!({
        "cost": session.cost(),
        "max_probability_error": session.max_probability_error(),
        "unique_epochs": session.pool().len(),
        "message": &session.message,
    });
    fs::write(
        args.out.join("report.json"),
        serde_json::to_string_pretty(&report)?,
    )?;
    outcome?;
    let state_names = session.state_names().to_vec();
    for protocol in &session.protocols {
        write_protocol_artefacts(protocol, &state_names, args)?;
        if args.dwt {
            write_event_chains_dwt(&args.out.join(&protocol.name), &protocol.simulations)?;
        }
    }
    tracing::info!(out = %args.out.display(), "simulation artefacts written");
    Ok(())
}

fn commands_session(args: &SimulateArgs) -> Result<Session, Box<dyn Error>> {
    super::build_session(
        &args.model,
        &args.protocols,
        args.options.as_deref(),
        args.seed,
    )
}

fn write_protocol_artefacts(
    protocol: &Protocol,
    state_names: &[String],
    args: &SimulateArgs,
) -> Result<(), Box<dyn Error>> {
    for (row, grid_row) in protocol.simulations.iter().enumerate() {
        for (col, sim) in grid_row.iter().enumerate() {
            let cell = format!("{}_r{row}c{col}", protocol.name);
            if !sim.stimuli.is_empty() {
                let mut csv = String::from("time");
                for name in sim.stimuli.keys() {
                    let _ = write!(csv, ",{name}");
                }
                csv.push('\n');
                for (k, t) in sim.time.iter().enumerate() {
                    let _ = write!(csv, "{t}");
                    for values in sim.stimuli.values() {
                        let _ = write!(csv, ",{}", values[k]);
                    }
                    csv.push('\n');
                }
                fs::write(args.out.join(format!("{cell}_stimuli.csv")), csv)?;
            }
            for (variable_set, p) in sim.probability.iter().enumerate() {
                let mut csv = String::from("time");
                for name in state_names {
                    let _ = write!(csv, ",{name}");
                }
                csv.push('\n');
                for (k, t) in sim.time.iter().enumerate() {
                    let _ = write!(csv, "{t}");
                    for state in 0..p.ncols() {
                        let _ = write!(csv, ",{}", p[(k, state)]);
                    }
                    csv.push('\n');
                }
                fs::write(
                    args.out.join(format!("{cell}_v{variable_set}_probability.csv")),
                    csv,
                )?;
            }
            for (variable_set, waveforms) in sim.waveforms.iter().enumerate() {
                if waveforms.is_empty() {
                    continue;
                }
                let mut csv = String::from("time");
                for name in waveforms.keys() {
                    let _ = write!(csv, ",{name}");
                }
                csv.push('\n');
                for (k, t) in sim.time.iter().enumerate() {
                    let _ = write!(csv, "{t}");
                    for values in waveforms.values() {
                        let _ = write!(csv, ",{}", values[k]);
                    }
                    csv.push('\n');
                }
                fs::write(
                    args.out.join(format!("{cell}_v{variable_set}_waveforms.csv")),
                    csv,
                )?;
            }
        }
    }
    for summary in protocol.summaries.iter().filter(|s| s.active) {
        for (variable_set, data_x) in summary.data_x.iter().enumerate() {
            let data_y = &summary.data_y[variable_set];
            let mut csv = String::from("row,col,x,y\n");
            for row in 0..data_x.nrows() {
                for col in 0..data_x.ncols() {
                    let _ = writeln!(
                        csv,
                        "{row},{col},{},{}",
                        data_x[(row, col)],
                        data_y[(row, col)]
                    );
                }
            }
            fs::write(
                args.out.join(format!(
                    "{}_{}_v{variable_set}_summary.csv",
                    protocol.name, summary.name
                )),
                csv,
            )?;
        }
    }
    Ok(())
}
