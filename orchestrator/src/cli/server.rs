use clap::Args;

/// Parameters used to config the server.
#[derive(Debug, Clone, Args)]
#[group()]
pub struct ServerCliArgs {
    /// The host to listen on.
    #[arg(env = "PROOF_ORCHESTRATOR_HOST", long, default_value = "0.0.0.0")]
    pub host: String,

    /// The port to listen on.
    #[arg(env = "PORT", long, default_value = "8080")]
    pub port: u16,

    /// Shared secret expected in the `X-API-Key` header.
    #[arg(env = "API_KEY", long, hide_env_values = true)]
    pub api_key: Option<String>,
}
