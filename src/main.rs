use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use songform::config::AppConfig;
use songform::export::ExportFormat;
use songform::model::{MusicStructure, Section};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "songform", version, about = "Musical structure analysis from note events")]
struct Cli {
    /// Config file (defaults to the XDG config location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze note files (.mid, .midi, .json) and write one structure file each
    Analyze {
        /// Files or directories to analyze
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: ExportFormat,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Analyze a single file and print a summary
    Inspect {
        /// Note file to analyze
        file: PathBuf,

        /// Print the full structure in this format instead of a summary
        #[arg(long, value_enum)]
        dump: Option<ExportFormat>,
    },

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Config file is optional: CLI path > XDG default > built-in defaults
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Analyze {
            paths,
            output,
            format,
            jobs,
        } => {
            let workers = if jobs > 0 { jobs } else { config.resolve_workers() };
            let result =
                songform::batch::analyze_paths(&paths, &output, format, workers, &config)
                    .context("Analysis failed")?;
            println!(
                "Analysis complete: {} analyzed, {} failed",
                result.analyzed, result.failed
            );
        }

        Commands::Inspect { file, dump } => {
            let structure = songform::analyzer::analyze_file(&file, &config)
                .with_context(|| format!("Failed to analyze {}", file.display()))?;
            match dump {
                Some(format) => {
                    let text = songform::export::render(&structure, format)
                        .context("Failed to render structure")?;
                    println!("{text}");
                }
                None => print_summary(&file, &structure),
            }
        }

        Commands::Config => {
            if let Some(path) = cli.config.clone().or_else(AppConfig::config_path) {
                println!("# {}", path.display());
            }
            let text = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{text}");
        }
    }

    Ok(())
}

fn print_summary(file: &std::path::Path, structure: &MusicStructure) {
    println!("{}", file.display());
    println!();

    println!("Skeleton sections ({}):", structure.skeleton_sections.len());
    print_sections(&structure.skeleton_sections);
    println!();

    println!("Novelty sections ({}):", structure.ssm_sections.len());
    print_sections(&structure.ssm_sections);
    println!();

    // Indices count characterized sections (those with enough notes)
    let repeated: Vec<_> = structure
        .repetition_adjacency
        .iter()
        .filter(|(_, related)| !related.is_empty())
        .collect();
    println!("Repetitions ({}):", repeated.len());
    for (i, related) in repeated {
        let others: Vec<String> = related.iter().map(|j| j.to_string()).collect();
        println!("  {:>3} ~ {}", i, others.join(", "));
    }
    println!();

    println!("Salient events ({}):", structure.salient_events.len());
    for event in &structure.salient_events {
        println!(
            "  {:>8} {:<22} {:>7.3}",
            format_time(event.time),
            event.kind.to_string(),
            event.strength
        );
    }
}

fn print_sections(sections: &[Section]) {
    println!("  {:>3}  {:>8}  {:>8}  {:>7}", "#", "Start", "End", "Secs");
    for (i, s) in sections.iter().enumerate() {
        println!(
            "  {:>3}  {:>8}  {:>8}  {:>7.2}",
            i,
            format_time(s.start),
            format_time(s.end),
            s.duration()
        );
    }
}

/// Format seconds as `m:ss.s`.
fn format_time(secs: f64) -> String {
    let minutes = (secs / 60.0).floor() as u64;
    format!("{}:{:04.1}", minutes, secs - minutes as f64 * 60.0)
}
