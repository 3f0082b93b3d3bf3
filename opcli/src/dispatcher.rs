use chrono::{DateTime, Local, Utc};
use opc_ua_client::{NodeAddress, OpcError, OpcUaProvider, friendly_error_hint, render};
use std::future::Future;
use std::io::Write;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Port used when startup gets a bare IPv4 address.
pub const DEFAULT_PORT: u16 = 4840;

const HELP: &str = "\
Available commands:
  connect <endpoint>  - Connect to OPC UA server
  disconnect          - Disconnect from server
  read <node-id>      - Read the value of a node (e.g. ns=2;s=Demo.Temp)
  info                - Show server information
  help                - Show this help
  exit, quit          - Exit the program";

/// Outcome of a command other than plain success.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unknown command: {0}. Type 'help' for available commands")]
    Unknown(String),

    /// Sentinel telling the shell loop to stop. Not an error for the operator.
    #[error("exit")]
    Exit,

    #[error(transparent)]
    Opc(#[from] OpcError),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatchError {
    /// Actionable hint for the operator, if the underlying status is known.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Opc(e) => friendly_error_hint(e),
            Self::Timeout { .. } => Some("The server did not answer in time; check the endpoint and network"),
            _ => None,
        }
    }
}

/// Dotted-decimal IPv4 check used by the startup shortcut.
pub fn is_ipv4(text: &str) -> bool {
    text.parse::<Ipv4Addr>().is_ok()
}

/// Maps operator input to provider calls and writes the dialogue to `out`.
pub struct Dispatcher<W: Write> {
    provider: Arc<dyn OpcUaProvider>,
    out: W,
    timeout: Duration,
}

impl<W: Write> Dispatcher<W> {
    pub fn new(provider: Arc<dyn OpcUaProvider>, out: W, timeout: Duration) -> Self {
        Self {
            provider,
            out,
            timeout,
        }
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    /// Execute one input line. Whitespace-only lines are a no-op.
    pub async fn execute(&mut self, line: &str) -> Result<(), DispatchError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(());
        };
        let args: Vec<&str> = words.collect();

        tracing::debug!(command, args = ?args, "Dispatching command");

        match command {
            "help" => {
                writeln!(self.out, "{HELP}")?;
                Ok(())
            }
            "connect" => match args.as_slice() {
                [endpoint] => self.connect(endpoint).await,
                _ => Err(DispatchError::Usage("connect <endpoint>")),
            },
            "disconnect" => self.disconnect().await,
            "read" => match args.as_slice() {
                [node] => self.read(node).await,
                _ => Err(DispatchError::Usage("read <node-id>")),
            },
            "info" => self.info().await,
            "exit" | "quit" => Err(DispatchError::Exit),
            other => Err(DispatchError::Unknown(other.to_string())),
        }
    }

    /// Handle the process arguments (`args[0]` is the program name).
    ///
    /// `<prog> <ipv4>` connects to `opc.tcp://<ipv4>:4840`,
    /// `<prog> connect <endpoint>` connects to the endpoint. Any other shape
    /// starts disconnected.
    pub async fn parse_startup_arguments(&mut self, args: &[String]) -> Result<(), DispatchError> {
        match args {
            [_, address] if is_ipv4(address) => {
                let endpoint = format!("opc.tcp://{address}:{DEFAULT_PORT}");
                tracing::info!(%endpoint, "Startup IPv4 shortcut");
                self.connect(&endpoint).await
            }
            [_, command, rest @ ..] if command == "connect" => match rest.first() {
                Some(endpoint) => self.connect(endpoint).await,
                None => Err(DispatchError::Usage("connect <endpoint>")),
            },
            _ => Ok(()),
        }
    }

    async fn connect(&mut self, endpoint: &str) -> Result<(), DispatchError> {
        writeln!(self.out, "Connecting to {endpoint}...")?;
        self.out.flush()?;

        let provider = Arc::clone(&self.provider);
        let info = self.bounded("connect", provider.connect(endpoint)).await?;

        tracing::info!(%endpoint, fields = info.present_count(), "Connected");
        writeln!(self.out, "Successfully connected!")?;
        if info.present_count() == 0 {
            writeln!(self.out, "Warning: could not retrieve server info")?;
        } else {
            write!(self.out, "{}", render(&info))?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), DispatchError> {
        let provider = Arc::clone(&self.provider);
        match self.bounded("disconnect", provider.disconnect()).await {
            Ok(true) => writeln!(self.out, "Disconnected.")?,
            Ok(false) => tracing::debug!("Disconnect requested while not connected"),
            Err(e) => tracing::warn!(error = %e, "Disconnect did not complete cleanly"),
        }
        Ok(())
    }

    async fn read(&mut self, node: &str) -> Result<(), DispatchError> {
        let address = node.parse::<NodeAddress>().map_err(OpcError::from)?;
        let provider = Arc::clone(&self.provider);
        let reading = self
            .bounded("read", provider.read_node(address.clone()))
            .await?;

        writeln!(self.out, "{address} = {}", reading.value)?;
        if let Some(ts) = reading.source_timestamp {
            writeln!(self.out, "  source timestamp: {}", local_time(ts))?;
        }
        if let Some(ts) = reading.server_timestamp {
            writeln!(self.out, "  server timestamp: {}", local_time(ts))?;
        }
        Ok(())
    }

    async fn info(&mut self) -> Result<(), DispatchError> {
        let provider = Arc::clone(&self.provider);
        let info = self.bounded("info", provider.server_info()).await?;
        write!(self.out, "{}", render(&info))?;
        Ok(())
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, DispatchError>
    where
        F: Future<Output = Result<T, OpcError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(DispatchError::from),
            Err(_) => {
                let secs = self.timeout.as_secs();
                tracing::error!(operation, timeout_secs = secs, "Operation timed out");
                Err(DispatchError::Timeout { operation, secs })
            }
        }
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}
