use clap::Parser;
use opc_ua_client::ClientOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Interactive OPC UA client.
///
/// Startup shortcuts: `opcli <ipv4>` connects to `opc.tcp://<ipv4>:4840`,
/// `opcli connect <endpoint>` connects to the given endpoint.
#[derive(Debug, Parser)]
#[command(name = "opcli", version, about)]
pub struct Cli {
    /// Directory for the daily-rolling log file
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Upper bound for each server operation, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// Application name announced to the server
    #[arg(long, default_value = "opcli")]
    pub application_name: String,

    /// Directory for the client certificate store
    #[arg(long, default_value = "pki")]
    pub pki_dir: PathBuf,

    /// Reconnect attempts made by the stack itself (0 disables)
    #[arg(long, default_value_t = 0)]
    pub session_retry_limit: i32,

    /// `<ipv4>` or `connect <endpoint>`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub target: Vec<String>,
}

impl Cli {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            application_uri: format!("urn:{}", self.application_name),
            application_name: self.application_name.clone(),
            pki_dir: self.pki_dir.clone(),
            session_retry_limit: self.session_retry_limit,
            ..ClientOptions::default()
        }
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Startup words with the program name in front.
    pub fn startup_args(&self) -> Vec<String> {
        std::iter::once("opcli".to_string())
            .chain(self.target.iter().cloned())
            .collect()
    }
}
