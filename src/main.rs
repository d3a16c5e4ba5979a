//! StrokeGuard: Stroke-risk and AFib inference service
//!
//! Command-line entry point. Reads one JSON request from a file or stdin,
//! prints the JSON response on stdout.
//!
//! ```text
//! strokeguard predict-stroke record.json
//! strokeguard detect-afib - < ecg.json
//! strokeguard assess-tia symptoms.json
//! strokeguard status
//! ```
//!
//! Exit codes: 0 success, 1 service fault, 2 bad request, 3 model unavailable.

use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use strokeguard::adapters::sanitize::{sanitize, SanitizingMakeWriter};
use strokeguard::config::{LogMode, ServiceConfig};
use strokeguard::domain::AfibRequest;
use strokeguard::{ClinicalRecord, InferenceService, ModelRegistry, TiaRequest};

const USAGE: &str =
    "Usage: strokeguard <predict-stroke|detect-afib|assess-tia|status> [input.json|-]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    PredictStroke,
    DetectAfib,
    AssessTia,
    Status,
}

impl Command {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "predict-stroke" => Some(Self::PredictStroke),
            "detect-afib" => Some(Self::DetectAfib),
            "assess-tia" => Some(Self::AssessTia),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Where the request body comes from.
enum Input {
    Stdin,
    File(PathBuf),
}

fn parse_args() -> Result<(Command, Input), String> {
    let mut args = std::env::args().skip(1);
    let command = args
        .next()
        .and_then(|c| Command::parse(&c))
        .ok_or_else(|| USAGE.to_string())?;
    let input = match args.next().as_deref() {
        None | Some("-") => Input::Stdin,
        Some(path) => Input::File(PathBuf::from(path)),
    };
    if args.next().is_some() {
        return Err(USAGE.to_string());
    }
    Ok((command, input))
}

fn init_logging(config: &ServiceConfig) -> anyhow::Result<WorkerGuard> {
    // stdout carries the JSON response; logs never go there.
    let use_file = match config.log_mode {
        LogMode::File => true,
        LogMode::Stderr => false,
        LogMode::Auto => std::io::stderr().is_terminal(),
    };

    let (writer, guard) = if use_file {
        if let Some(parent) = config.log_file.parent() {
            // Best-effort: a missing directory surfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn read_request<T: DeserializeOwned>(input: &Input) -> strokeguard::Result<T> {
    let body = match input {
        Input::Stdin => {
            let mut body = String::new();
            std::io::stdin().read_to_string(&mut body)?;
            body
        }
        Input::File(path) => std::fs::read_to_string(path)?,
    };
    Ok(serde_json::from_str(&body)?)
}

fn to_json(value: &impl Serialize) -> strokeguard::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn run(service: &InferenceService, command: Command, input: &Input) -> strokeguard::Result<String> {
    match command {
        Command::PredictStroke => {
            let record: ClinicalRecord = read_request(input)?;
            to_json(&service.dispatch_tabular(&record)?)
        }
        Command::DetectAfib => {
            let request: AfibRequest = read_request(input)?;
            to_json(&service.dispatch_sequence(&request.signal)?)
        }
        Command::AssessTia => {
            let request: TiaRequest = read_request(input)?;
            to_json(&service.assess_tia(&request)?)
        }
        Command::Status => to_json(&service.registry().status()),
    }
}

fn main() -> ExitCode {
    let (command, input) = match parse_args() {
        Ok(parsed) => parsed,
        Err(usage) => {
            eprintln!("{usage}");
            return ExitCode::from(2);
        }
    };

    let config = ServiceConfig::from_env();
    let _guard = match init_logging(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(1);
        }
    };

    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }

    let registry = Arc::new(ModelRegistry::from_config(&config));
    let service = InferenceService::new(registry, config.dispatch);
    tracing::info!(
        "Starting StrokeGuard {} (command={:?}, model_dir={:?})",
        env!("CARGO_PKG_VERSION"),
        command,
        service.registry().model_dir()
    );

    match run(&service, command, &input) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let code = e.exit_code();
            tracing::warn!("Request failed (exit {code}): {e}");
            // Parse errors can quote request content.
            eprintln!("error: {}", sanitize(&e.to_string()));
            ExitCode::from(code)
        }
    }
}
