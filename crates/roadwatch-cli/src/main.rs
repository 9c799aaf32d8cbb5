#![forbid(unsafe_code)]

mod cmd;
mod output;
mod reporter;

use clap::{CommandFactory, Parser, Subcommand};
use output::{CliError, OutputMode, render_error};
use roadwatch_core::config::{EffectiveConfig, resolve_config};
use roadwatch_core::controller::ControllerError;
use roadwatch_core::error::{EncodingError, ErrorCode, StoreError, ValidationError};
use roadwatch_core::lock::LockError;
use roadwatch_core::store::kv::KvError;
use std::env;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "rw: citizen road-issue reporting",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format (overrides --json, FORMAT and user config).
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Report under this name (skips env and config resolution).
    #[arg(long = "as", global = true)]
    as_: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self, config: Option<&EffectiveConfig>) -> OutputMode {
        if let Some(format) = self.format {
            return format;
        }
        if self.json {
            return OutputMode::Json;
        }
        config.map_or(OutputMode::Pretty, |c| {
            OutputMode::from_resolved(&c.resolved_output)
        })
    }

    fn reporter_flag(&self) -> Option<&str> {
        self.as_.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Initialize a roadwatch project",
        long_about = "Create .roadwatch/ with a default config.toml in the current directory.",
        after_help = "EXAMPLES:\n    # Initialize a project in the current directory\n    rw init\n\n    # Reset config.toml to defaults\n    rw init --force"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Citizen",
        about = "Report a road issue",
        long_about = "Fill in the report form and submit it. Location defaults to the map center.",
        after_help = "EXAMPLES:\n    # Report a pothole at a coordinate\n    rw report --type Pothole --at \"19.0896, 72.8656\" -d \"Deep hole near the signal\"\n\n    # Attach a photo\n    rw report --type Accident --at \"19.1, 72.9\" --photo crash.jpg\n\n    # Report under a specific name\n    rw --as ward-7 report --type Streetlight"
    )]
    Report(cmd::report::ReportArgs),

    #[command(
        next_help_heading = "Read",
        about = "List reported issues",
        long_about = "List reported issues in insertion order with optional filters.",
        after_help = "EXAMPLES:\n    # Everything\n    rw list\n\n    # Only open work\n    rw list --status \"in progress\"\n\n    # Emit machine-readable output\n    rw list --json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one issue",
        long_about = "Show full details for a single issue by ID.",
        after_help = "EXAMPLES:\n    # Show an issue\n    rw show r_1717000000000_ab12cd\n\n    # Emit machine-readable output\n    rw show r_1717000000000_ab12cd --json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Authority",
        about = "Update an issue's status",
        long_about = "Apply an authority status update (Received, In Progress, Resolved).",
        after_help = "EXAMPLES:\n    # Start work\n    rw status r_1717000000000_ab12cd in_progress\n\n    # Close it out\n    rw status r_1717000000000_ab12cd resolved"
    )]
    Status(cmd::status::StatusArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show the marker layer",
        long_about = "Show the markers and popups the map draws for the current collection.",
        after_help = "EXAMPLES:\n    # Citizen view\n    rw markers\n\n    # Authority popups as HTML\n    rw markers --authority --html"
    )]
    Markers(cmd::markers::MarkersArgs),

    #[command(
        next_help_heading = "Setup",
        about = "Generate shell completions",
        after_help = "EXAMPLES:\n    # Bash\n    rw completions bash > ~/.local/share/bash-completion/completions/rw"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("ROADWATCH_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose {
            "roadwatch=debug,info"
        } else {
            "warn"
        })
    });

    let format = env::var("ROADWATCH_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

/// Map an error chain onto the first stable code found in it.
fn classify(err: &anyhow::Error) -> CliError {
    let message = format!("{err:#}");
    for cause in err.chain() {
        let code = if let Some(e) = cause.downcast_ref::<ControllerError>() {
            e.code()
        } else if let Some(e) = cause.downcast_ref::<StoreError>() {
            e.code()
        } else if let Some(e) = cause.downcast_ref::<ValidationError>() {
            e.code()
        } else if let Some(e) = cause.downcast_ref::<EncodingError>() {
            e.code()
        } else if let Some(e) = cause.downcast_ref::<KvError>() {
            e.code()
        } else if let Some(e) = cause.downcast_ref::<LockError>() {
            e.code()
        } else if let Some(e) = cause.downcast_ref::<cmd::CodedError>() {
            e.code
        } else if cause.downcast_ref::<toml::de::Error>().is_some() {
            ErrorCode::ConfigParseError
        } else {
            continue;
        };
        return CliError::with_code(message, code);
    }
    CliError::new(message)
}

async fn dispatch(cli: &Cli, project_root: &Path) -> anyhow::Result<()> {
    if let Commands::Init(args) = &cli.command {
        return cmd::init::run_init(args, cli.output_mode(None), project_root);
    }
    if let Commands::Completions(args) = &cli.command {
        let mut command = Cli::command();
        return cmd::completions::run_completions(args.shell, &mut command);
    }

    let config = resolve_config(project_root, cli.json)?;
    let output = cli.output_mode(Some(&config));
    let project = &config.project;

    match &cli.command {
        Commands::Report(args) => {
            let reporter = reporter::resolve_reporter(
                cli.reporter_flag(),
                config.user.reporter.as_deref(),
                &project.report.anonymous_name,
            );
            cmd::report::run_report(args, reporter, project, output, project_root).await
        }
        Commands::List(args) => cmd::list::run_list(args, project, output, project_root).await,
        Commands::Show(args) => cmd::show::run_show(args, project, output, project_root).await,
        Commands::Status(args) => {
            cmd::status::run_status(args, project, output, project_root).await
        }
        Commands::Markers(args) => {
            cmd::markers::run_markers(args, project, output, project_root).await
        }
        Commands::Init(_) | Commands::Completions(_) => Ok(()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let project_root = env::current_dir()?;
    let error_mode = cli.format.unwrap_or(if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Pretty
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    if let Err(err) = runtime.block_on(dispatch(&cli, &project_root)) {
        tracing::debug!(error = ?err, "command failed");
        render_error(error_mode, &classify(&err))?;
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_sets_output_mode() {
        let cli = Cli::parse_from(["rw", "--json", "list"]);
        assert!(cli.json);
        assert!(cli.output_mode(None).is_json());
    }

    #[test]
    fn json_flag_after_subcommand() {
        let cli = Cli::parse_from(["rw", "list", "--json"]);
        assert!(cli.output_mode(None).is_json());
    }

    #[test]
    fn format_flag_wins_over_json() {
        let cli = Cli::parse_from(["rw", "--json", "--format", "text", "list"]);
        assert_eq!(cli.output_mode(None), OutputMode::Text);
    }

    #[test]
    fn default_output_is_pretty() {
        let cli = Cli::parse_from(["rw", "list"]);
        assert_eq!(cli.output_mode(None), OutputMode::Pretty);
    }

    #[test]
    fn as_flag_parsed() {
        let cli = Cli::parse_from(["rw", "--as", "ward-7", "report", "--type", "Pothole"]);
        assert_eq!(cli.reporter_flag(), Some("ward-7"));
        assert!(matches!(cli.command, Commands::Report(_)));
    }

    #[test]
    fn negative_coordinates_parse() {
        let cli = Cli::parse_from(["rw", "report", "--at", "-33.86, 151.21"]);
        let Commands::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.at.as_deref(), Some("-33.86, 151.21"));
    }

    #[test]
    fn status_subcommand_parses_status() {
        let cli = Cli::parse_from(["rw", "status", "r_1_abcdef", "In Progress"]);
        let Commands::Status(args) = cli.command else {
            panic!("expected status");
        };
        assert_eq!(
            args.status,
            roadwatch_core::model::IssueStatus::InProgress
        );
    }

    #[test]
    fn bad_status_is_rejected() {
        assert!(Cli::try_parse_from(["rw", "status", "r_1_abcdef", "closed"]).is_err());
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["rw", "init"],
            vec!["rw", "report"],
            vec!["rw", "list"],
            vec!["rw", "show", "x"],
            vec!["rw", "status", "x", "resolved"],
            vec!["rw", "markers", "--authority", "--html"],
            vec!["rw", "completions", "bash"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }

    #[test]
    fn classify_finds_code_through_context() {
        let err = anyhow::Error::new(StoreError::NotFound {
            id: roadwatch_core::model::IssueId::new_unchecked("r_1_x"),
        })
        .context("status update failed");
        let cli_err = classify(&err);
        assert_eq!(cli_err.error_code.as_deref(), Some("E2001"));
        assert!(cli_err.suggestion.is_some());
    }

    #[test]
    fn classify_without_code_is_plain() {
        let err = anyhow::anyhow!("something odd");
        assert!(classify(&err).error_code.is_none());
    }
}
