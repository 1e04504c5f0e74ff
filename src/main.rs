//! CLI to check and fix pointer symbol spacing in C# files.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use pointer_spacing::diagnostic::{DESCRIPTORS, RULE_TITLE};
use pointer_spacing::{
    Analyzer, CancellationToken, Config, Diagnostic, Document, RULE_ID, Severity,
};

#[derive(Parser)]
#[command(
    name = "pointer-spacing",
    version,
    about = "Check and fix spacing around dereference, access-of, and function pointer symbols"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (default: nearest .pointer-spacing.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Number of parallel jobs (0 = auto)
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    /// Override the configured severity (hidden, info, warning, error)
    #[arg(long, global = true)]
    severity: Option<Severity>,
}

#[derive(Subcommand)]
enum Command {
    /// Report spacing violations
    Check {
        /// C# source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: Format,
    },
    /// Fix spacing violations and print the result
    Fix {
        /// C# source files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Rewrite the files in place instead of printing
        #[arg(long)]
        write: bool,
    },
    /// Describe the rule and its diagnostics
    Rules,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Serialize)]
struct FileReport<'a> {
    path: String,
    diagnostics: &'a [Diagnostic],
}

fn load_config(cli: &Cli, files: &[PathBuf]) -> Result<Config, String> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).map_err(|e| format!("{}: {e}", path.display()))?,
        None => {
            let dir = files
                .first()
                .and_then(|f| f.parent())
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            Config::discover(dir).map_err(|e| e.to_string())?
        }
    };
    if let Some(jobs) = cli.jobs {
        config.engine.jobs = jobs;
    }
    if let Some(severity) = cli.severity {
        config.rule.severity = severity;
    }
    Ok(config)
}

fn read_sources(files: &[PathBuf]) -> (Vec<(PathBuf, String)>, bool) {
    let mut sources = Vec::with_capacity(files.len());
    let mut had_error = false;
    for path in files {
        match fs::read_to_string(path) {
            Ok(content) => sources.push((path.clone(), content)),
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                had_error = true;
            }
        }
    }
    (sources, had_error)
}

fn check(analyzer: &Analyzer, files: &[PathBuf], format: Format) -> bool {
    let (sources, mut had_error) = read_sources(files);

    let mut paths = Vec::with_capacity(sources.len());
    let mut documents = Vec::with_capacity(sources.len());
    for (path, content) in sources {
        match Document::parse(content) {
            Ok(document) => {
                paths.push(path);
                documents.push(document);
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                had_error = true;
            }
        }
    }

    let results = analyzer.analyze_batch(&documents, &CancellationToken::new());
    let mut reports = Vec::with_capacity(results.len());
    let mut reported = 0usize;

    for (path, result) in paths.iter().zip(&results) {
        match result {
            Ok(diagnostics) => {
                reported += diagnostics
                    .iter()
                    .filter(|d| d.severity > Severity::Hidden)
                    .count();
                if matches!(format, Format::Text) {
                    for d in diagnostics {
                        println!("{}:{d}", path.display());
                    }
                }
                reports.push(FileReport {
                    path: path.display().to_string(),
                    diagnostics,
                });
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                had_error = true;
            }
        }
    }

    if matches!(format, Format::Json) {
        match serde_json::to_string_pretty(&reports) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error: {e}");
                had_error = true;
            }
        }
    }

    if reported > 0 {
        eprintln!(
            "{reported} {RULE_ID} diagnostic(s) in {} file(s)",
            documents.len()
        );
    }
    had_error || reported > 0
}

fn fix(analyzer: &Analyzer, files: &[PathBuf], write: bool) -> bool {
    let (sources, mut had_error) = read_sources(files);
    let (paths, contents): (Vec<PathBuf>, Vec<String>) = sources.into_iter().unzip();

    for (path, result) in paths.iter().zip(analyzer.fix_batch(&contents)) {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                had_error = true;
                continue;
            }
        };

        if write {
            if outcome.changed() {
                if let Err(e) = fs::write(path, &outcome.text) {
                    eprintln!("{}: {e}", path.display());
                    had_error = true;
                    continue;
                }
                eprintln!("{}: {} fix(es) applied", path.display(), outcome.applied);
            }
        } else {
            print!("{}", outcome.text);
        }

        if outcome.unfixable > 0 {
            eprintln!(
                "{}: {} violation(s) cannot be fixed automatically",
                path.display(),
                outcome.unfixable
            );
            had_error = true;
        }
    }
    had_error
}

fn rules() {
    println!("{RULE_ID}: {RULE_TITLE}");
    for info in &DESCRIPTORS {
        println!("  {:<24}'*' or '&' {}", info.id, info.template);
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let files = match &cli.command {
        Command::Check { files, .. } | Command::Fix { files, .. } => files.as_slice(),
        Command::Rules => {
            rules();
            return ExitCode::SUCCESS;
        }
    };

    let config = match load_config(&cli, files) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(2);
        }
    };

    if config.engine.jobs > 0 {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(config.engine.jobs)
            .build_global()
        {
            log::warn!("could not size the thread pool: {e}");
        }
    }

    let analyzer = Analyzer::from_config(&config);
    let failed = match &cli.command {
        Command::Check { files, format } => check(&analyzer, files, *format),
        Command::Fix { files, write } => fix(&analyzer, files, *write),
        Command::Rules => false,
    };

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
