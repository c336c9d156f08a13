//! Doomtax CLI - command-line interface for Doomscroll Tax
//!
//! Commands:
//! - serve: Run the accounting server
//! - detect: Classify streamed frames and forward state reports
//! - validate: Validate frame or report NDJSON
//! - doctor: Diagnose configuration and connectivity

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use doomscroll_tax::clock::SystemClock;
use doomscroll_tax::config::{Config, CONFIG_PATH_ENV};
use doomscroll_tax::detector::{parse_frame, FramePipeline};
use doomscroll_tax::report::parse_report;
use doomscroll_tax::transport::{check_server, HttpReporter, NullSink, ReportSink, Reporter};
use doomscroll_tax::{EngineError, ENGINE_VERSION, PRODUCER_NAME};

/// Doomtax - bill yourself for doomscrolling
#[derive(Parser)]
#[command(name = "doomtax")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Debounce doomscrolling signals and track the penalty", long_about = None)]
struct Cli {
    /// Config file (defaults to $DOOMTAX_CONFIG or ./doomtax.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the accounting server
    Serve {
        /// Bind address (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Penalty per second of doomscrolling in USD (overrides config)
        #[arg(long)]
        penalty_rate: Option<f64>,
    },

    /// Classify NDJSON frames and forward debounced state to a server
    Detect {
        /// Input file path (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Server base URL (overrides config)
        #[arg(long)]
        server_url: Option<String>,

        /// Do not forward reports, only print decisions
        #[arg(long)]
        offline: bool,

        /// Reclined threshold (overrides config)
        #[arg(long)]
        reclined_threshold: Option<f64>,

        /// Holding-phone threshold (overrides config)
        #[arg(long)]
        holding_phone_threshold: Option<f64>,

        /// Hysteresis window in seconds (overrides config)
        #[arg(long)]
        window_seconds: Option<f64>,

        /// Skip frames that fail to parse instead of stopping
        #[arg(long)]
        skip_invalid: bool,

        /// Do not print per-frame decisions
        #[arg(long)]
        quiet: bool,

        /// Buffer output instead of flushing after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Validate NDJSON input
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// What each line contains
        #[arg(long, value_enum, default_value = "frames")]
        kind: InputKind,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and connectivity
    Doctor {
        /// Also probe this server
        #[arg(long)]
        server_url: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum InputKind {
    /// Frame observations (detector input)
    Frames,
    /// State reports (server input)
    Reports,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to install log subscriber: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), DoomtaxCliError> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve {
            host,
            port,
            penalty_rate,
        } => {
            let mut config = Config::resolve(config_path)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(rate) = penalty_rate {
                config.session.penalty_rate_per_second = rate;
            }
            config.validate()?;
            doomscroll_tax::server::run_server(&config)
                .await
                .map_err(DoomtaxCliError::Server)
        }

        Commands::Detect {
            input,
            server_url,
            offline,
            reclined_threshold,
            holding_phone_threshold,
            window_seconds,
            skip_invalid,
            quiet,
            no_flush,
        } => {
            let mut config = Config::resolve(config_path)?;
            if let Some(url) = server_url {
                config.transport.server_url = url;
            }
            if let Some(v) = reclined_threshold {
                config.heuristics.reclined_threshold = v;
            }
            if let Some(v) = holding_phone_threshold {
                config.heuristics.holding_phone_threshold = v;
            }
            if let Some(v) = window_seconds {
                config.classifier.window_seconds = v;
            }
            config.validate()?;

            let options = DetectOptions {
                offline,
                skip_invalid,
                quiet,
                flush: !no_flush,
            };
            cmd_detect(&input, &config, options).await
        }

        Commands::Validate { input, kind, json } => cmd_validate(&input, kind, json),

        Commands::Doctor { server_url, json } => cmd_doctor(config_path, server_url, json).await,
    }
}

struct DetectOptions {
    offline: bool,
    skip_invalid: bool,
    quiet: bool,
    flush: bool,
}

async fn cmd_detect(
    input: &Path,
    config: &Config,
    options: DetectOptions,
) -> Result<(), DoomtaxCliError> {
    let mut pipeline = FramePipeline::new(config.heuristics.clone(), &config.classifier)?;

    let sink: Arc<dyn ReportSink> = if options.offline {
        Arc::new(NullSink)
    } else {
        let reporter = HttpReporter::new(&config.transport)?;
        tracing::info!(endpoint = reporter.endpoint(), "forwarding reports");
        Arc::new(reporter)
    };
    let mut reporter = Reporter::new(
        config.transport.report_interval_seconds,
        sink,
        Arc::new(SystemClock),
    );

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if is_stdio(input) {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        Box::new(BufReader::new(tokio::fs::File::open(input).await?))
    };

    let mut lines = reader.lines();
    let mut stdout = io::stdout();
    let mut frames = 0usize;
    let mut skipped = 0usize;
    let mut reports = 0usize;

    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let decision = match pipeline.process_line(trimmed) {
            Ok(decision) => decision,
            Err(e) if options.skip_invalid => {
                tracing::warn!(error = %e, "skipping invalid frame");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        frames += 1;

        if reporter.offer(decision.timestamp, decision.is_doomscrolling()) {
            reports += 1;
        }

        if !options.quiet {
            writeln!(stdout, "{}", serde_json::to_string(&decision)?)?;
            if options.flush {
                stdout.flush()?;
            }
        }
    }
    stdout.flush()?;

    // Give in-flight sends a chance before the runtime shuts down
    if !options.offline && reports > 0 {
        tokio::time::sleep(Duration::from_millis(config.transport.request_timeout_ms)).await;
    }

    tracing::info!(frames, skipped, reports, "detect.finished");
    Ok(())
}

fn cmd_validate(input: &Path, kind: InputKind, json: bool) -> Result<(), DoomtaxCliError> {
    let input_data = if is_stdio(input) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(input)?
    };

    let mut total = 0usize;
    let mut errors = Vec::new();

    for (index, line) in input_data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        total += 1;

        let result = match kind {
            InputKind::Frames => parse_frame(trimmed).map(|_| ()),
            InputKind::Reports => parse_report(trimmed.as_bytes()).map(|_| ()),
        };
        if let Err(e) = result {
            errors.push(ValidationErrorDetail {
                line: index + 1,
                error: e.to_string(),
            });
        }
    }

    let report = ValidationReport {
        total_records: total,
        valid_records: total - errors.len(),
        invalid_records: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:   {}", report.total_records);
        println!("Valid records:   {}", report.valid_records);
        println!("Invalid records: {}", report.invalid_records);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!("  - Line {}: {}", err.line, err.error);
            }
        }
    }

    if report.invalid_records > 0 {
        Err(DoomtaxCliError::ValidationFailed(report.invalid_records))
    } else {
        Ok(())
    }
}

async fn cmd_doctor(
    config_path: Option<&Path>,
    server_url: Option<String>,
    json: bool,
) -> Result<(), DoomtaxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} {}", PRODUCER_NAME, ENGINE_VERSION),
    });

    let source = match config_path {
        Some(path) => path.display().to_string(),
        None => std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "defaults".to_string()),
    };
    let config = match Config::resolve(config_path) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid ({source}): window {}s, enter {:.2}, exit {:.2}, ${}/s",
                    config.classifier.window_seconds,
                    config.classifier.enter_fraction,
                    config.classifier.exit_fraction,
                    config.session.penalty_rate_per_second
                ),
            });
            Some(config)
        }
        Err(e) => {
            checks.push(DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config ({source}): {e}"),
            });
            None
        }
    };

    if let Some(config) = &config {
        if config.transport.report_interval_seconds * 2.0 > config.session.heartbeat_timeout_seconds
        {
            checks.push(DoctorCheck {
                name: "heartbeat".to_string(),
                status: CheckStatus::Warning,
                message: format!(
                    "Report interval {}s leaves little slack under the {}s heartbeat timeout",
                    config.transport.report_interval_seconds,
                    config.session.heartbeat_timeout_seconds
                ),
            });
        }
        if config.transport.report_interval_seconds * 2.0 > config.session.max_accrual_gap_seconds {
            checks.push(DoctorCheck {
                name: "accrual".to_string(),
                status: CheckStatus::Warning,
                message: format!(
                    "Report interval {}s is close to the {}s accrual gap; late reports will not be billed",
                    config.transport.report_interval_seconds,
                    config.session.max_accrual_gap_seconds
                ),
            });
        }
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (ready for detect)".to_string(),
        }
    };
    checks.push(stdin_check);

    if let Some(url) = server_url {
        let check = match check_server(&url, Duration::from_secs(2)).await {
            Ok(()) => DoctorCheck {
                name: "server".to_string(),
                status: CheckStatus::Ok,
                message: format!("{url} is reachable"),
            },
            Err(e) => DoctorCheck {
                name: "server".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        };
        checks.push(check);
    }

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Doomtax Doctor Report");
        println!("=====================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(DoomtaxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn is_stdio(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

// Error types

#[derive(Debug)]
enum DoomtaxCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    Server(anyhow::Error),
    ValidationFailed(usize),
    DoctorFailed,
}

impl From<io::Error> for DoomtaxCliError {
    fn from(e: io::Error) -> Self {
        DoomtaxCliError::Io(e)
    }
}

impl From<EngineError> for DoomtaxCliError {
    fn from(e: EngineError) -> Self {
        DoomtaxCliError::Engine(e)
    }
}

impl From<serde_json::Error> for DoomtaxCliError {
    fn from(e: serde_json::Error) -> Self {
        DoomtaxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<DoomtaxCliError> for CliError {
    fn from(e: DoomtaxCliError) -> Self {
        match e {
            DoomtaxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            DoomtaxCliError::Engine(EngineError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'doomtax doctor' to inspect the configuration".to_string()),
            },
            DoomtaxCliError::Engine(e) if e.is_validation() => CliError {
                code: "INPUT_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'doomtax validate' for details".to_string()),
            },
            DoomtaxCliError::Engine(e) => CliError {
                code: "ENGINE_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            DoomtaxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            DoomtaxCliError::Server(e) => CliError {
                code: "SERVER_ERROR".to_string(),
                message: format!("{e:#}"),
                hint: Some("Is the port already in use?".to_string()),
            },
            DoomtaxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            DoomtaxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_records: usize,
    valid_records: usize,
    invalid_records: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    line: usize,
    error: String,
}

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
