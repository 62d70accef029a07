use std::path::PathBuf;

use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::OutputFormat;

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: String,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        platform_transport_check(),
        pipe_dir_writable_check(),
        backend_path_check(args.backend.as_deref()),
        compiled_features_check(),
    ];

    let has_fail = checks.iter().any(|c| matches!(c.status, CheckStatus::Fail));
    let overall = if has_fail { "fail" } else { "pass" };

    let output = DoctorOutput { checks, overall };
    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(output).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("lanlink doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<22} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
        OutputFormat::Raw => {
            println!("{}", output.overall);
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

fn platform_transport_check() -> CheckResult {
    #[cfg(unix)]
    {
        CheckResult {
            name: "platform_transport".to_string(),
            status: CheckStatus::Pass,
            detail: "Unix domain sockets available".to_string(),
        }
    }

    #[cfg(not(unix))]
    {
        CheckResult {
            name: "platform_transport".to_string(),
            status: CheckStatus::Fail,
            detail: "native non-Unix transport backend unavailable (named pipes not implemented)"
                .to_string(),
        }
    }
}

fn pipe_dir_writable_check() -> CheckResult {
    #[cfg(unix)]
    {
        use lanlink_transport::PipeEndpoint;
        let dir = PathBuf::from(format!(
            "/tmp/lanlink-doctor-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        let _ = std::fs::create_dir_all(&dir);
        let sock = dir.join("doctor.sock");
        let check = match PipeEndpoint::bind(&sock) {
            Ok(_endpoint) => CheckResult {
                name: "pipe_dir_writable".to_string(),
                status: CheckStatus::Pass,
                detail: "/tmp socket bind succeeded".to_string(),
            },
            Err(err) => CheckResult {
                name: "pipe_dir_writable".to_string(),
                status: CheckStatus::Fail,
                detail: format!("/tmp socket bind failed: {err}"),
            },
        };
        let _ = std::fs::remove_dir_all(&dir);
        check
    }

    #[cfg(not(unix))]
    {
        CheckResult {
            name: "pipe_dir_writable".to_string(),
            status: CheckStatus::Skip,
            detail: "temp socket check not implemented on this platform".to_string(),
        }
    }
}

fn backend_path_check(backend: Option<&std::path::Path>) -> CheckResult {
    let Some(path) = backend else {
        return CheckResult {
            name: "backend_path".to_string(),
            status: CheckStatus::Skip,
            detail: "--backend not given".to_string(),
        };
    };

    if !path.exists() {
        return CheckResult {
            name: "backend_path".to_string(),
            status: CheckStatus::Fail,
            detail: format!("{} does not exist", path.display()),
        };
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let executable = std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false);
        if !executable {
            return CheckResult {
                name: "backend_path".to_string(),
                status: CheckStatus::Fail,
                detail: format!("{} is not executable", path.display()),
            };
        }
    }

    CheckResult {
        name: "backend_path".to_string(),
        status: CheckStatus::Pass,
        detail: format!("{} exists and is executable", path.display()),
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = Vec::new();
    if cfg!(feature = "cli") {
        features.push("cli");
    }
    if cfg!(unix) {
        features.push("unix-transport");
    }

    CheckResult {
        name: "compiled_features".to_string(),
        status: CheckStatus::Info,
        detail: features.join(", "),
    }
}
