//! h1probe CLI - raw-socket HTTP/1.1 conformance testing

mod render;
mod storage;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use h1probe_core::{Config, report_schema};
use h1probe_runner::{Runner, cases_from_config};

#[derive(Parser)]
#[command(name = "h1probe")]
#[command(about = "Raw-socket HTTP/1.1 conformance tester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "terminal")]
    output: OutputFormat,

    /// Verbose output (per-case debug logs on stderr)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run conformance cases against a server
    Run(RunArgs),

    /// Write a starter .h1probe.toml
    Init,

    /// Print the JSON Schema of the results report
    Schema,
}

#[derive(Args, Default)]
struct RunArgs {
    /// Config file (default: .h1probe.toml in the current directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target host
    #[arg(long)]
    host: Option<String>,

    /// Target port
    #[arg(short, long)]
    port: Option<u16>,

    /// Cases in flight at once
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Default per-case timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Suites to run, replacing the configured list (rfc, smuggling, status, random)
    #[arg(long = "suite", value_delimiter = ',')]
    suites: Vec<String>,

    /// Additional catalog files (TOML, YAML or JSON)
    #[arg(long = "catalog")]
    catalogs: Vec<PathBuf>,

    /// Seed for the random suite
    #[arg(long)]
    seed: Option<u64>,

    /// List the selected cases without connecting
    #[arg(long)]
    dry_run: bool,

    /// Do not persist the report
    #[arg(long)]
    no_save: bool,

    /// Report directory (default: ~/.h1probe/reports)
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

impl RunArgs {
    fn load_config(&self) -> Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::load_default()?,
        };
        self.apply(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Command-line flags win over the config file.
    fn apply(&self, cfg: &mut Config) {
        if let Some(host) = &self.host {
            cfg.host.clone_from(host);
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(concurrency) = self.concurrency {
            cfg.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            cfg.timeout = timeout;
        }
        if !self.suites.is_empty() {
            cfg.suites.clone_from(&self.suites);
        }
        cfg.catalogs.extend(self.catalogs.iter().cloned());
        if let Some(seed) = self.seed {
            cfg.random_seed = seed;
        }
        if let Some(dir) = &self.report_dir {
            cfg.report_dir = Some(dir.clone());
        }
    }
}

#[derive(Clone, Copy, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Terminal,
    Json,
    Silent,
}

const CONFIG_PATH: &str = ".h1probe.toml";

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn init_tracing(output: OutputFormat, verbose: bool) -> Result<()> {
    let level = match (output, verbose) {
        (_, true) => Level::DEBUG,
        (OutputFormat::Silent, false) => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Run(args) => {
            init_tracing(cli.output, cli.verbose)?;
            run_cases(&args, cli.output)
        }

        Commands::Init => init(Path::new(CONFIG_PATH)),

        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&report_schema())?);
            Ok(0)
        }
    }
}

fn run_cases(args: &RunArgs, output: OutputFormat) -> Result<i32> {
    let cfg = args.load_config()?;
    let cases = cases_from_config(&cfg)?;

    if args.dry_run {
        match output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cases)?),
            OutputFormat::Terminal => println!("{}", render::case_list(&cases)),
            OutputFormat::Silent => {}
        }
        return Ok(0);
    }

    let runner = Runner::from_config(&cfg);
    let stop = runner.stop_handle();
    ctrlc::set_handler(move || {
        warn!("interrupt received, letting in-flight cases finish");
        stop.stop();
    })
    .context("failed to install interrupt handler")?;

    let ledger = runner.run(&cases)?;

    match output {
        OutputFormat::Terminal => println!("{}", render::summary(&ledger, &cfg.target())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ledger)?),
        OutputFormat::Silent => {}
    }

    if !args.no_save {
        let data = storage::ReportData {
            config: &cfg,
            ledger: &ledger,
        };
        match storage::save_report(&data, &cfg.report_dir()) {
            Ok(path) => info!(path = %path.display(), "report saved"),
            Err(e) => warn!(error = %e, "failed to save report"),
        }
    }

    Ok(ledger.exit_code())
}

fn init(path: &Path) -> Result<i32> {
    if path.exists() {
        eprintln!("{} already exists", path.display());
        return Ok(1);
    }

    std::fs::write(path, Config::example())
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Created {}", path.display());
    println!("\nEdit the file to configure:");
    println!("  - host, port: server under test");
    println!("  - suites: rfc, smuggling, status, random");
    println!("  - catalogs: extra case files");
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "h1probe", "run", "--host", "127.0.0.1", "-p", "9000", "-j", "8", "--suite",
            "rfc,smuggling", "--catalog", "extra.toml", "--dry-run", "--output", "json",
        ])
        .unwrap();
        assert!(cli.output == OutputFormat::Json);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.host.as_deref(), Some("127.0.0.1"));
        assert_eq!(args.port, Some(9000));
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.suites, ["rfc", "smuggling"]);
        assert_eq!(args.catalogs, [PathBuf::from("extra.toml")]);
        assert!(args.dry_run);
    }

    #[test]
    fn flags_override_config() {
        let args = RunArgs {
            host: Some("10.0.0.2".into()),
            port: Some(81),
            suites: vec!["random".into()],
            catalogs: vec![PathBuf::from("b.yaml")],
            seed: Some(7),
            ..RunArgs::default()
        };
        let mut cfg = Config {
            catalogs: vec![PathBuf::from("a.toml")],
            ..Config::default()
        };
        args.apply(&mut cfg);
        assert_eq!(cfg.host, "10.0.0.2");
        assert_eq!(cfg.port, 81);
        assert_eq!(cfg.suites, ["random"]);
        assert_eq!(cfg.catalogs, [PathBuf::from("a.toml"), PathBuf::from("b.yaml")]);
        assert_eq!(cfg.random_seed, 7);
        assert_eq!(cfg.concurrency, Config::default().concurrency);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("probe.toml");
        std::fs::write(&path, "port = 8080\n").unwrap();
        let args = RunArgs {
            config: Some(path),
            concurrency: Some(0),
            ..RunArgs::default()
        };
        assert!(args.load_config().is_err());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_PATH);
        assert_eq!(init(&path).unwrap(), 0);
        let written = Config::load(&path).unwrap();
        assert_eq!(written, Config::default());
        assert_eq!(init(&path).unwrap(), 1);
    }
}
