use std::sync::mpsc::RecvTimeoutError;

use lanlink_proto::OperationType;
use lanlink_session::{Session, SessionConfig};
use serde_json::Value;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{session_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_response, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let operation = parse_operation(&args.operation)?;
    let data = resolve_data(&args)?;
    let ready_timeout = parse_duration(&args.ready_timeout)?;

    let mut config = SessionConfig::new(&args.backend);
    config.backend_args = args.backend_args.clone();
    config.response_timeout = parse_duration(&args.timeout)?;
    config.connect_timeout = parse_duration(&args.connect_timeout)?;
    if let Some(dir) = &args.pipe_dir {
        config.pipe_dir = dir.clone();
    }

    let session =
        Session::launch(config).map_err(|err| session_error("backend launch failed", err))?;

    let readiness = session.readiness_changes();
    session.mark_consumer_ready(true);
    wait_until_ready(&session, readiness, ready_timeout)?;

    let handle = session
        .send(operation, data)
        .map_err(|err| session_error("request failed", err))?;
    let response = handle
        .wait()
        .map_err(|err| session_error("request failed", err))?;

    print_response(operation.as_str(), &response, format);

    session.shutdown();
    Ok(SUCCESS)
}

fn wait_until_ready(
    session: &Session,
    readiness: std::sync::mpsc::Receiver<lanlink_session::ReadinessChange>,
    timeout: std::time::Duration,
) -> CliResult<()> {
    if session.is_ready() {
        return Ok(());
    }
    let deadline = std::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(std::time::Instant::now());
        if remaining.is_zero() {
            return Err(CliError::new(TIMEOUT, "backend did not become ready"));
        }
        match readiness.recv_timeout(remaining) {
            Ok(change) if change.ready => return Ok(()),
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                return Err(CliError::new(TIMEOUT, "backend did not become ready"));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(CliError::new(
                    crate::exit::FAILURE,
                    "session ended before the backend became ready",
                ));
            }
        }
    }
}

fn parse_operation(input: &str) -> CliResult<OperationType> {
    match input {
        "SendFile" => Ok(OperationType::SendFile),
        "CancelWaitForConfirmation" => Ok(OperationType::CancelWaitForConfirmation),
        "CancelSend" => Ok(OperationType::CancelSend),
        "ConfirmReceive" => Ok(OperationType::ConfirmReceive),
        "CancelReceive" => Ok(OperationType::CancelReceive),
        "ModifySettings" => Ok(OperationType::ModifySettings),
        "ConnectToDevice" => Ok(OperationType::ConnectToDevice),
        "ExitApp" => Ok(OperationType::ExitApp),
        other => Err(CliError::new(
            USAGE,
            format!("unknown operation: {other}"),
        )),
    }
}

fn resolve_data(args: &SendArgs) -> CliResult<Value> {
    match &args.data {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|err| CliError::new(USAGE, format!("--data is not valid JSON: {err}"))),
        None => Ok(Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_operation_accepts_protocol_vocabulary() {
        assert_eq!(
            parse_operation("ConnectToDevice").unwrap(),
            OperationType::ConnectToDevice
        );
        assert_eq!(parse_operation("ExitApp").unwrap(), OperationType::ExitApp);
    }

    #[test]
    fn parse_operation_rejects_unknown_names() {
        let err = parse_operation("Reboot").unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
