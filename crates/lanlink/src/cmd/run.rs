use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;

use lanlink_session::{Session, SessionConfig};
use tracing::info;

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{session_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_event, print_readiness, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let mut config = SessionConfig::new(&args.backend);
    config.backend_args = args.backend_args.clone();
    config.connect_timeout = parse_duration(&args.connect_timeout)?;
    if let Some(dir) = &args.pipe_dir {
        config.pipe_dir = dir.clone();
    }

    let session =
        Session::launch(config).map_err(|err| session_error("backend launch failed", err))?;
    info!(pid = ?session.backend_pid(), "backend session established");

    let readiness = session.readiness_changes();
    let events = session.events();
    session.mark_consumer_ready(true);

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut backend_lost = false;
    while running.load(Ordering::SeqCst) {
        for change in readiness.try_iter() {
            print_readiness(&change, format);
        }

        match events.recv_timeout(POLL_INTERVAL) {
            Ok(event) => print_event(&event, format),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if session.is_closed() {
            backend_lost = true;
            break;
        }
    }

    // Publish any change that raced the exit decision.
    for change in readiness.try_iter() {
        print_readiness(&change, format);
    }

    session.shutdown();

    if backend_lost {
        Ok(FAILURE)
    } else {
        Ok(SUCCESS)
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
