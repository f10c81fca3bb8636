use std::error::Error;
use std::path::PathBuf;

use clap::Args;

#[derive(Args, Debug)]
pub struct CostArgs {
    /// YAML model description.
    #[arg(long)]
    pub model: PathBuf,
    /// YAML protocol file (repeatable).
    #[arg(long = "protocol", required = true)]
    pub protocols: Vec<PathBuf>,
    /// YAML simulation options.
    #[arg(long)]
    pub options: Option<PathBuf>,
    /// Master seed override.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &CostArgs) -> Result<(), Box<dyn Error>> {
    let mut session = super::build_session(
        &args.model,
        &args.protocols,
        args.options.as_deref(),
        args.seed,
    )?;
    session.simulate()?;
    let report = serde_json::json!({
        "cost": session.cost(),
        "max_probability_error": session.max_probability_error(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
