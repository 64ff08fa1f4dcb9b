use std::path::PathBuf;

use clap::Args;

/// Parameters of the native prover and its scratch space.
#[derive(Debug, Clone, Args)]
#[group()]
pub struct ProverCliArgs {
    /// Path to the prover executable.
    #[arg(env = "PROOF_ORCHESTRATOR_PROVER_BINARY", long, default_value = "./prover")]
    pub prover_binary: PathBuf,

    /// Path to the proving key passed as the first prover argument.
    #[arg(env = "PROOF_ORCHESTRATOR_PROVING_KEY", long, default_value = "./rsa_verify_0001.zkey")]
    pub proving_key: PathBuf,

    /// Directory for per-job artifacts. Defaults to the OS temp directory.
    #[arg(env = "PROOF_ORCHESTRATOR_SCRATCH_DIR", long)]
    pub scratch_dir: Option<PathBuf>,
}
