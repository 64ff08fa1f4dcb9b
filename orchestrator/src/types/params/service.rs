use std::time::Duration;

use crate::cli::server::ServerCliArgs;
use crate::cli::service::{Role, ServiceCliArgs};

#[derive(Debug, Clone)]
pub struct ServiceParams {
    pub role: Role,
    pub worker_concurrency: usize,
    pub shutdown_grace: Duration,
}

impl ServiceParams {
    pub fn runs_api(&self) -> bool {
        matches!(self.role, Role::Api | Role::All)
    }

    pub fn runs_workers(&self) -> bool {
        matches!(self.role, Role::Worker | Role::All)
    }
}

/// An explicit role wins. Otherwise a worker dyno runs everything and any other process serves the API.
pub fn resolve_role(role: Option<Role>, dyno: Option<&str>) -> Role {
    match (role, dyno) {
        (Some(role), _) => role,
        (None, Some(dyno)) if dyno.starts_with("worker") => Role::All,
        (None, _) => Role::Api,
    }
}

impl From<ServiceCliArgs> for ServiceParams {
    fn from(args: ServiceCliArgs) -> Self {
        Self {
            role: resolve_role(args.role, args.dyno.as_deref()),
            worker_concurrency: args.worker_concurrency,
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerParams {
    pub host: String,
    pub port: u16,
    pub api_key: Option<String>,
}

impl From<ServerCliArgs> for ServerParams {
    fn from(value: ServerCliArgs) -> Self {
        Self { host: value.host, port: value.port, api_key: value.api_key.filter(|key| !key.is_empty()) }
    }
}
