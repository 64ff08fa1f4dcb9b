use std::path::PathBuf;

use crate::cli::prover::ProverCliArgs;

#[derive(Debug, Clone)]
pub struct ProverParams {
    pub binary: PathBuf,
    pub proving_key: PathBuf,
    pub scratch_dir: PathBuf,
}

impl From<ProverCliArgs> for ProverParams {
    fn from(args: ProverCliArgs) -> Self {
        Self {
            binary: args.prover_binary,
            proving_key: args.proving_key,
            scratch_dir: args.scratch_dir.unwrap_or_else(std::env::temp_dir),
        }
    }
}
