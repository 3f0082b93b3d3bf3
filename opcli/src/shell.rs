//! Line-oriented read-eval loop, its stdin feed and the interrupt feed.

use crate::dispatcher::{DispatchError, Dispatcher};
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc;

const PROMPT: &str = "opcli> ";

/// Why the shell loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellExit {
    /// `exit` or `quit`.
    Quit,
    EndOfInput,
    Interrupted,
}

/// Read-eval loop over `lines`. Every command races `interrupts`, so a
/// Ctrl-C during a slow connect still returns to the caller's cleanup.
pub async fn run<W: Write>(
    dispatcher: &mut Dispatcher<W>,
    lines: &mut mpsc::Receiver<io::Result<String>>,
    interrupts: &mut mpsc::Receiver<()>,
) -> anyhow::Result<ShellExit> {
    loop {
        write!(dispatcher.out(), "{PROMPT}")?;
        dispatcher.out().flush()?;

        let line = tokio::select! {
            line = lines.recv() => line,
            Some(()) = interrupts.recv() => return interrupted(dispatcher, "waiting for input"),
        };

        let line = match line {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                tracing::error!(error = %e, "Failed to read input");
                return Err(e.into());
            }
            None => {
                tracing::info!("End of input");
                writeln!(dispatcher.out())?;
                writeln!(dispatcher.out(), "Goodbye!")?;
                return Ok(ShellExit::EndOfInput);
            }
        };

        let outcome = tokio::select! {
            outcome = dispatcher.execute(&line) => Some(outcome),
            Some(()) = interrupts.recv() => None,
        };
        let Some(outcome) = outcome else {
            return interrupted(dispatcher, "running a command");
        };

        match outcome {
            Ok(()) => {}
            Err(DispatchError::Exit) => {
                writeln!(dispatcher.out(), "Goodbye!")?;
                return Ok(ShellExit::Quit);
            }
            Err(e) => {
                tracing::warn!(command = %line.trim(), error = %e, "Command failed");
                match e.hint() {
                    Some(hint) => eprintln!("Error: {hint} ({e})"),
                    None => eprintln!("Error: {e}"),
                }
            }
        }
    }
}

fn interrupted<W: Write>(
    dispatcher: &mut Dispatcher<W>,
    during: &'static str,
) -> anyhow::Result<ShellExit> {
    tracing::info!(during, "Interrupted by signal");
    writeln!(dispatcher.out())?;
    Ok(ShellExit::Interrupted)
}

/// Next input line without its terminator, `None` at end of input.
///
/// Bytes that are not UTF-8 are replaced rather than failing the read, so a
/// garbled line is reported by the dispatcher like any other bad command.
pub fn next_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> io::Result<Option<String>> {
    loop {
        buf.clear();
        match reader.read_until(b'\n', buf) {
            Ok(0) => return Ok(None),
            Ok(_) => {
                let text = String::from_utf8_lossy(buf);
                return Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()));
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

/// Blocking stdin lives on its own thread so Ctrl-C and exit never wait on
/// a pending read.
pub fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(1);
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = io::stdin();
            let mut reader = stdin.lock();
            let mut buf = Vec::new();
            loop {
                let item = match next_line(&mut reader, &mut buf) {
                    Ok(Some(line)) => Ok(line),
                    Ok(None) => break,
                    Err(e) => Err(e),
                };
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() || failed {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::error!(error = %e, "Failed to spawn stdin reader");
    }
    rx
}

/// Register the interrupt handlers now and forward each signal as `()`.
///
/// Registration happens before this returns, so no signal in between falls
/// back to the default handler that would kill the process.
pub fn spawn_interrupt_listener() -> io::Result<mpsc::Receiver<()>> {
    let (tx, rx) = mpsc::channel(4);

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(()) = sigint.recv() => tracing::info!("Received SIGINT"),
                    Some(()) = sigterm.recv() => tracing::info!("Received SIGTERM"),
                    else => break,
                }
                if tx.send(()).await.is_err() {
                    return;
                }
            }
            // Keep the sender alive so a closed channel never reads as a signal.
            std::future::pending::<()>().await;
        });
    }

    #[cfg(windows)]
    {
        let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
        tokio::spawn(async move {
            while ctrl_c.recv().await.is_some() {
                tracing::info!("Received Ctrl-C");
                if tx.send(()).await.is_err() {
                    return;
                }
            }
            std::future::pending::<()>().await;
        });
    }

    Ok(rx)
}
