//! Health check command - probe a running bookshelf server
//!
//! Hits `/ready`, `/health` and `/health/db` in order, prints each status
//! and body, then a summary. Exit code is 0 when every critical probe
//! passes; the database probe alone failing still counts as success since
//! the server is designed to run without its database.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;

/// Arguments for the healthcheck command
#[derive(Parser, Debug)]
pub struct HealthcheckArgs {
    /// Base URL of the server to probe
    #[arg(long, short = 'u', default_value = "http://localhost:3200", env = "BOOKSHELF_URL")]
    pub url: String,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub timeout_ms: u64,
}

/// A single endpoint to probe
#[derive(Debug, Clone, Copy)]
pub struct Probe {
    pub name: &'static str,
    pub path: &'static str,
    /// Failure of a critical probe fails the whole check
    pub critical: bool,
}

pub const PROBES: [Probe; 3] = [
    Probe {
        name: "Readiness",
        path: "/ready",
        critical: true,
    },
    Probe {
        name: "Application Health",
        path: "/health",
        critical: true,
    },
    Probe {
        name: "Database Health",
        path: "/health/db",
        critical: false,
    },
];

/// Outcome of a probe
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub probe: Probe,
    pub passed: bool,
}

/// Exit code for a set of results: 1 if any critical probe failed.
pub fn exit_code(results: &[ProbeResult]) -> i32 {
    let critical_failure = results.iter().any(|r| !r.passed && r.probe.critical);
    if critical_failure {
        1
    } else {
        0
    }
}

/// Run every probe and return the process exit code.
pub async fn run_healthcheck(args: HealthcheckArgs) -> Result<i32> {
    let client = Client::builder()
        .timeout(Duration::from_millis(args.timeout_ms))
        .build()
        .context("Failed to build HTTP client")?;

    let base = args.url.trim_end_matches('/');
    println!("Starting health check tests against {}", base);

    let mut results = Vec::with_capacity(PROBES.len());
    for probe in PROBES {
        let passed = check(&client, base, probe).await;
        results.push(ProbeResult { probe, passed });
    }

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    println!("\n{}", "=".repeat(50));
    println!("Test Results Summary:");
    println!("{}", "=".repeat(50));
    println!("Total Tests: {}", total);
    println!("Passed: {}", passed);
    println!("Failed: {}", total - passed);

    let code = exit_code(&results);
    if passed == total {
        println!("\nAll health checks PASSED");
    } else if code == 0 {
        println!("\nDatabase check FAILED (non-critical), service is running in degraded mode");
    } else {
        println!("\n{} health check(s) FAILED", total - passed);
    }

    Ok(code)
}

async fn check(client: &Client, base: &str, probe: Probe) -> bool {
    let url = format!("{}{}", base, probe.path);
    println!("\nTesting {} endpoint ({})...", probe.name, probe.path);

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            println!("{} check TIMEOUT", probe.name);
            return false;
        }
        Err(e) => {
            println!("{} check ERROR: {}", probe.name, e);
            tracing::debug!(error = ?e, url = %url, "probe request failed");
            return false;
        }
    };

    let status = response.status();
    println!("Status Code: {}", status.as_u16());

    match response.text().await {
        Ok(body) if !body.is_empty() => match serde_json::from_str::<serde_json::Value>(&body) {
            Ok(json) => println!(
                "Response: {}",
                serde_json::to_string_pretty(&json).unwrap_or(body)
            ),
            Err(_) => println!("Response: {}", body),
        },
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to read probe response body"),
    }

    if status.is_success() {
        println!("{} check PASSED", probe.name);
        true
    } else {
        println!("{} check FAILED", probe.name);
        false
    }
}
