pub mod cost;
pub mod simulate;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clamp_model::{ModelConfig, TableModel};
use clamp_protocol::Protocol;
use clamp_session::{Session, SimOptions};

/// Loads the model, protocols and options and assembles a session.
pub fn build_session(
    model_path: &Path,
    protocol_paths: &[PathBuf],
    options_path: Option<&Path>,
    seed_override: Option<u64>,
) -> Result<Session, Box<dyn Error>> {
    let config: ModelConfig = serde_yaml::from_str(&fs::read_to_string(model_path)?)?;
    let model = TableModel::new(config);
    let mut protocols = Vec::with_capacity(protocol_paths.len());
    for path in protocol_paths {
        let mut protocol: Protocol = serde_yaml::from_str(&fs::read_to_string(path)?)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        protocol.load_reference_files(base_dir)?;
        protocols.push(protocol);
    }
    let mut options = match options_path {
        Some(path) => serde_yaml::from_str(&fs::read_to_string(path)?)?,
        None => SimOptions::default(),
    };
    if let Some(seed) = seed_override {
        options.master_seed = seed;
    }
    Ok(Session::new(Box::new(model), protocols, options))
}
