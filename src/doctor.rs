// SPDX-License-Identifier: MIT
//! Pre-flight diagnostic checks for the `doctor` subcommand.
//!
//! Runs against a resolved config before any browser is launched, so it can
//! catch environment problems before they cause confusing mid-run failures.

use std::process::Command;

use crate::config::ActorConfig;

/// The result of a single diagnostic check.
pub struct CheckResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

/// Run all diagnostic checks and return a list of results.
pub fn run_doctor(config: &ActorConfig) -> Vec<CheckResult> {
    vec![
        check_browser_binary(config),
        check_storage_writable(config),
        check_credentials(config),
        check_webhook_url(config),
    ]
}

// ─── Individual checks ────────────────────────────────────────────────────────

/// Check 1: a Chromium-family binary is configured or on PATH.
fn check_browser_binary(config: &ActorConfig) -> CheckResult {
    let binary = config
        .browser_binary
        .clone()
        .or_else(crate::browser::detect_browser);
    match binary {
        Some(bin) => {
            let version = Command::new(&bin)
                .arg("--version")
                .output()
                .ok()
                .filter(|out| out.status.success())
                .and_then(|out| {
                    String::from_utf8_lossy(&out.stdout)
                        .lines()
                        .next()
                        .map(|l| l.trim().to_string())
                });
            CheckResult {
                name: "Browser binary",
                passed: true,
                detail: version.unwrap_or_else(|| format!("{bin} (version unknown)")),
            }
        }
        None => CheckResult {
            name: "Browser binary",
            passed: false,
            detail: "no chromium/chrome/google-chrome found in PATH".to_string(),
        },
    }
}

/// Check 2: the local storage directory exists (or can be created) and is writable.
fn check_storage_writable(config: &ActorConfig) -> CheckResult {
    let dir = &config.storage_dir;
    if let Err(e) = std::fs::create_dir_all(dir) {
        return CheckResult {
            name: "Storage directory writable",
            passed: false,
            detail: format!("cannot create {}: {e}", dir.display()),
        };
    }
    let probe = dir.join(".doctor_write_test");
    match std::fs::write(&probe, b"ok") {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            CheckResult {
                name: "Storage directory writable",
                passed: true,
                detail: format!("{} is writable", dir.display()),
            }
        }
        Err(e) => CheckResult {
            name: "Storage directory writable",
            passed: false,
            detail: format!("cannot write to {}: {e}", dir.display()),
        },
    }
}

/// Check 3: login credentials are present in the input (or environment).
fn check_credentials(config: &ActorConfig) -> CheckResult {
    let passed = config.has_credentials();
    CheckResult {
        name: "Credentials configured",
        passed,
        detail: if passed {
            format!("indeed_username is set ({})", config.input.indeed_username)
        } else {
            "indeed_username and/or indeed_password missing — set them in the input \
             or via INDEED_USERNAME / INDEED_PASSWORD"
                .to_string()
        },
    }
}

/// Check 4: the webhook URL, when present, looks like an HTTP(S) endpoint.
/// The URL itself is not printed; it may carry tokens in the query string.
fn check_webhook_url(config: &ActorConfig) -> CheckResult {
    match &config.webhook_url {
        None => CheckResult {
            name: "Webhook URL",
            passed: true,
            detail: "not configured (optional)".to_string(),
        },
        Some(url) if url.starts_with("https://") || url.starts_with("http://") => CheckResult {
            name: "Webhook URL",
            passed: true,
            detail: "configured".to_string(),
        },
        Some(_) => CheckResult {
            name: "Webhook URL",
            passed: false,
            detail: "configured but does not start with http:// or https://".to_string(),
        },
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print a formatted table of check results to stdout.
pub fn print_doctor_results(results: &[CheckResult]) {
    println!();
    println!("{BOLD}indeed-csv-downloader doctor — pre-flight checks{RESET}");
    println!("{}", "─".repeat(60));

    for r in results {
        let (symbol, color) = if r.passed {
            ("✓", GREEN)
        } else {
            ("✗", RED)
        };
        println!("  {color}{symbol}{RESET}  {:<30}  {}", r.name, r.detail);
    }

    println!("{}", "─".repeat(60));

    let failed = results.iter().filter(|r| !r.passed).count();
    if failed == 0 {
        println!("{GREEN}All checks passed.{RESET}");
    } else {
        println!("{RED}{failed} check(s) failed. See above for details.{RESET}");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActorConfig, ActorInput};

    fn config_with(input: ActorInput, storage_dir: std::path::PathBuf) -> ActorConfig {
        ActorConfig::from_parts(
            input,
            storage_dir,
            "INPUT".to_string(),
            "run-1".to_string(),
            None,
            true,
        )
    }

    #[test]
    fn credentials_check_flags_missing_password() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = ActorInput {
            indeed_username: "hiring@example.com".to_string(),
            indeed_password: String::new(),
            ..ActorInput::default()
        };
        let result = check_credentials(&config_with(input, tmp.path().to_path_buf()));
        assert!(!result.passed);
        assert!(result.detail.contains("INDEED_PASSWORD"));
    }

    #[test]
    fn storage_check_creates_missing_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("storage").join("deep");
        let result = check_storage_writable(&config_with(ActorInput::default(), nested.clone()));
        assert!(result.passed, "{}", result.detail);
        assert!(nested.is_dir());
    }

    #[test]
    fn webhook_check_accepts_https_and_rejects_garbage() {
        let tmp = tempfile::TempDir::new().unwrap();

        let input = ActorInput {
            n8n_webhook_url: "https://hooks.example.com/ingest".to_string(),
            ..ActorInput::default()
        };
        let ok = check_webhook_url(&config_with(input, tmp.path().to_path_buf()));
        assert!(ok.passed);

        let input = ActorInput {
            n8n_webhook_url: "ftp://hooks.example.com".to_string(),
            ..ActorInput::default()
        };
        let bad = check_webhook_url(&config_with(input, tmp.path().to_path_buf()));
        assert!(!bad.passed);

        let none = check_webhook_url(&config_with(
            ActorInput::default(),
            tmp.path().to_path_buf(),
        ));
        assert!(none.passed);
        assert!(none.detail.contains("optional"));
    }
}
