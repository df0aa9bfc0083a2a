use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use docker_unit::config::{self, Config, Jobs, PullPolicy};
use docker_unit::docker::{self, CancelToken};
use docker_unit::report::{self, OutputFormat};
use docker_unit::runner::{self, RunEvent, RunInput};
use docker_unit::suite::{self, Suite};
use docker_unit::templates;
use docker_unit::units::{HumanDuration, parse_duration};

#[derive(Parser)]
#[command(name = "docker-unit", about, version, author)]
struct Cli {
    /// Config file (default: .docker-unit.yml in the current directory)
    #[arg(long, short = 'c', global = true, env = "DOCKER_UNIT_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites against their images (the default)
    Run(RunArgs),

    /// List suites and their tests without running anything
    List {
        /// Suite files or directories to search
        paths: Vec<PathBuf>,
    },

    /// Validate suite files without running anything
    Check {
        /// Suite files or directories to search
        paths: Vec<PathBuf>,
    },

    /// Print the static characteristics of an image
    Inspect {
        image: String,

        /// Output format (yaml, json)
        #[arg(long, short = 'f', default_value = "yaml")]
        format: String,
    },

    /// Write a starter docker-unit.yml
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Suite files or directories to search
    paths: Vec<PathBuf>,

    /// Output format (console, json, junit)
    #[arg(long, short = 'f')]
    format: Option<String>,

    /// Write the report to a file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Parallel containers per suite ("auto" or a positive integer)
    #[arg(long, short = 'j')]
    jobs: Option<String>,

    /// Only run tests whose "suite/test" name contains this text
    #[arg(long)]
    filter: Option<String>,

    /// Stop scheduling tests after the first failure
    #[arg(long)]
    fail_fast: bool,

    /// Default per-test timeout, e.g. "30s"
    #[arg(long)]
    timeout: Option<String>,

    /// Pull policy (always, missing, never)
    #[arg(long)]
    pull: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(&cli);

    let cwd = match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: cannot determine current directory: {e}");
            return ExitCode::from(2);
        }
    };

    match dispatch(cli, &cwd) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn setup_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn dispatch(cli: Cli, cwd: &Path) -> Result<ExitCode> {
    // Only commands that use the config read it, so `init` works next to a broken one.
    let load_config = || -> Result<Config> {
        let cfg = config::load(cwd, cli.config.as_deref())?;
        debug!(?cfg, "effective config");
        Ok(cfg)
    };

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => cmd_run(cwd, load_config()?, args, cli.quiet),
        Commands::List { paths } => cmd_list(cwd, &load_config()?, &paths),
        Commands::Check { paths } => cmd_check(cwd, &load_config()?, &paths),
        Commands::Inspect { image, format } => cmd_inspect(&load_config()?, &image, &format),
        Commands::Init { force } => {
            let path = templates::write_starter(cwd, force)?;
            println!("Created {}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn no_suites_found(cwd: &Path) -> anyhow::Error {
    anyhow!(
        "no suite files found under {} (looked for {} or YAML files with `image` and `tests`)",
        cwd.display(),
        suite::WELL_KNOWN_NAMES.join(" / ")
    )
}

/// Load every suite, reporting all invalid files rather than only the first.
fn load_suites(cwd: &Path, cfg: &Config, paths: &[PathBuf]) -> Result<Vec<Suite>> {
    let files = suite::resolve_suite_paths(cwd, paths, cfg.search_depth)?;
    if files.is_empty() {
        return Err(no_suites_found(cwd));
    }

    let mut suites = Vec::with_capacity(files.len());
    let mut errors = Vec::new();
    for file in &files {
        match suite::load_suite(file) {
            Ok(s) => suites.push(s),
            Err(e) => errors.push(e.to_string()),
        }
    }
    if !errors.is_empty() {
        return Err(anyhow!("invalid suites:\n  {}", errors.join("\n  ")));
    }
    Ok(suites)
}

fn apply_overrides(cfg: &mut Config, args: &RunArgs) -> Result<()> {
    if let Some(jobs) = &args.jobs {
        cfg.jobs = Jobs::from_str_lenient(jobs)
            .ok_or_else(|| anyhow!("--jobs must be \"auto\" or a positive integer"))?;
    }
    if let Some(timeout) = &args.timeout {
        cfg.timeout = HumanDuration(parse_duration(timeout).map_err(|e| anyhow!("--timeout: {e}"))?);
    }
    if let Some(pull) = &args.pull {
        cfg.pull = PullPolicy::from_str_lenient(pull)
            .ok_or_else(|| anyhow!("--pull must be one of always, missing, never"))?;
    }
    if let Some(format) = &args.format {
        cfg.format = format.clone();
    }
    Ok(())
}

fn cmd_run(cwd: &Path, mut cfg: Config, args: RunArgs, quiet: bool) -> Result<ExitCode> {
    apply_overrides(&mut cfg, &args)?;
    let format = OutputFormat::from_str_lenient(&cfg.format)
        .ok_or_else(|| anyhow!("unknown format `{}` (console, json, junit)", cfg.format))?;

    let suites = load_suites(cwd, &cfg, &args.paths)?;
    docker::ensure_available(&cfg.docker)?;

    // Console reports stream to stdout; other formats keep stdout clean for the report.
    let live_stdout = format == OutputFormat::Console && args.output.is_none();
    let color = live_stdout && std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();

    let input = RunInput {
        config: cfg,
        suites,
        filter: args.filter,
        fail_fast: args.fail_fast,
    };
    let rx = runner::run_suites(input, CancelToken::new());

    for event in rx {
        match event {
            RunEvent::Completed(run) => {
                let rendered = if live_stdout {
                    report::render_summary(&run, color)
                } else {
                    report::render(&run, format, false)?
                };
                match &args.output {
                    Some(path) => std::fs::write(path, &rendered)
                        .with_context(|| format!("failed to write {}", path.display()))?,
                    None => {
                        print!("{rendered}");
                        let _ = std::io::stdout().flush();
                    }
                }
                return Ok(if run.success() {
                    ExitCode::SUCCESS
                } else {
                    ExitCode::from(1)
                });
            }
            RunEvent::Aborted(reason) => {
                return Err(anyhow!("run aborted: {reason}"));
            }
            other => {
                if let Some(line) = report::render_event_line(&other, color) {
                    if live_stdout {
                        println!("{line}");
                    } else if !quiet {
                        eprintln!("{line}");
                    }
                }
            }
        }
    }

    Err(anyhow!("runner stopped without a result"))
}

fn cmd_list(cwd: &Path, cfg: &Config, paths: &[PathBuf]) -> Result<ExitCode> {
    for suite in load_suites(cwd, cfg, paths)? {
        println!("{} ({}) - {}", suite.name, suite.image, suite.path.display());
        if suite.inspect.is_some() {
            println!("  image characteristics");
        }
        for test in &suite.tests {
            match test.skip_reason() {
                Some(reason) => println!("  {} [skip: {reason}]", test.name),
                None => println!("  {}", test.name),
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(cwd: &Path, cfg: &Config, paths: &[PathBuf]) -> Result<ExitCode> {
    let files = suite::resolve_suite_paths(cwd, paths, cfg.search_depth)?;
    if files.is_empty() {
        return Err(no_suites_found(cwd));
    }
    let mut ok = true;
    for file in &files {
        match suite::load_suite(file) {
            Ok(s) => println!("ok    {} ({} tests)", file.display(), s.tests.len()),
            Err(e) => {
                ok = false;
                println!("error {e}");
            }
        }
    }
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::from(2) })
}

fn cmd_inspect(cfg: &Config, image: &str, format: &str) -> Result<ExitCode> {
    docker::ensure_available(&cfg.docker)?;
    let info = docker::inspect_image(&cfg.docker, image)?;
    let rendered = match format.to_ascii_lowercase().as_str() {
        "json" => serde_json::to_string_pretty(&info)? + "\n",
        "yaml" | "yml" => serde_yaml::to_string(&info)?,
        other => return Err(anyhow!("unknown format `{other}` (yaml, json)")),
    };
    print!("{rendered}");
    Ok(ExitCode::SUCCESS)
}
