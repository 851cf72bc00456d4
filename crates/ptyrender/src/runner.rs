//! Runs one command and streams its events.

use std::io::Write;
use std::sync::Arc;

use anyhow::{bail, Context};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use ptyrender_core::{Error, Platform, SessionEvent};
use ptyrender_session::{BackendRegistry, EventReceiver, SessionHandle, SessionManager};

use crate::cli::Cli;
use crate::schema::event_schema;

/// Exit code when the session is interrupted.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// How the event stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The command exited
    Exited(Option<i32>),
    /// The backend stream failed
    Failed(String),
    /// The stream closed without a final event
    Terminated,
}

impl Outcome {
    /// Process exit code to report.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Exited(Some(code)) => *code,
            Outcome::Exited(None) | Outcome::Failed(_) => 1,
            Outcome::Terminated => INTERRUPTED_EXIT_CODE,
        }
    }
}

/// Write every event as one JSON line until the queue closes.
pub async fn stream_events<W: Write>(events: &mut EventReceiver, out: &mut W) -> anyhow::Result<Outcome> {
    let mut outcome = Outcome::Terminated;

    while let Some(event) = events.recv().await {
        serde_json::to_writer(&mut *out, &event).context("failed to encode event")?;
        out.write_all(b"\n")?;
        out.flush()?;

        match event {
            SessionEvent::Exited { code } => outcome = Outcome::Exited(code),
            SessionEvent::Failed { reason } => outcome = Outcome::Failed(reason),
            _ => {}
        }
    }

    if events.dropped() > 0 {
        warn!("{} events dropped by a slow consumer", events.dropped());
    }
    Ok(outcome)
}

/// Copy standard input into the session until either side closes.
async fn forward_stdin(session: Arc<SessionHandle>) {
    let mut stdin = tokio::io::stdin();
    let mut buffer = vec![0u8; 1024];
    loop {
        match stdin.read(&mut buffer).await {
            Ok(0) => {
                debug!("stdin closed");
                return;
            }
            Ok(n) => {
                if let Err(e) = session.write(&buffer[..n]).await {
                    debug!("stdin forwarding stopped: {}", e);
                    return;
                }
            }
            Err(e) => {
                warn!("failed to read stdin: {}", e);
                return;
            }
        }
    }
}

fn print_backends(registry: &BackendRegistry) {
    println!("platform: {}", registry.platform());
    for name in registry.names() {
        let available = registry.recheck(name).unwrap_or(false);
        let state = if available { "available" } else { "unavailable" };
        println!("{name}: {state}");
    }
}

/// Execute the parsed command line. Returns the process exit code.
pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    if cli.schema {
        println!("{}", serde_json::to_string_pretty(&event_schema())?);
        return Ok(0);
    }

    let config = cli.load_config().context("failed to load configuration")?;

    let mut registry =
        BackendRegistry::default_for(Platform::detect()).with_settings(config.backends.clone());
    if let Some(backend) = &cli.backend {
        registry.restrict_to(backend)?;
    }

    if cli.list_backends {
        print_backends(&registry);
        return Ok(0);
    }

    let Some((program, args)) = cli.command.split_first() else {
        bail!("no command given");
    };

    let manager = SessionManager::with_registry(config, Arc::new(registry));
    let mut request = manager.exec_request(program.as_str()).args(args.iter().cloned());
    if let Some(cwd) = &cli.cwd {
        request = request.cwd(cwd);
    }

    let (session, mut events) = match manager.spawn(request) {
        Ok(spawned) => spawned,
        Err(Error::BackendsExhausted { attempts }) => {
            eprintln!("ptyrender: no backend could run '{}'", cli.command.join(" "));
            for attempt in &attempts {
                eprintln!("  {attempt}");
            }
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };
    info!(
        "Streaming session {} on backend {}",
        session.id(),
        session.backend_name()
    );

    if cli.stdin {
        tokio::spawn(forward_stdin(Arc::clone(&session)));
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let outcome = tokio::select! {
        outcome = stream_events(&mut events, &mut out) => outcome?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, terminating session {}", session.id());
            Outcome::Terminated
        }
    };
    drop(out);

    manager.close_all().await?;
    Ok(outcome.exit_code())
}
