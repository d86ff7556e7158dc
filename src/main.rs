//! CLI entry point for `emlnorm`.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use emlnorm::config::Config;
use emlnorm::export::json;
use emlnorm::model::email::NormalizedMessage;
use emlnorm::parser::mbox::MboxReader;
use emlnorm::parser::{eml, EmailParser};

#[derive(Parser)]
#[command(
    name = "emlnorm",
    version,
    about = "Normalize raw e-mail messages into JSON records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize one or more .eml files, one JSON document per file
    Parse {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        output: OutputArgs,

        /// Print single-line JSON
        #[arg(long)]
        compact: bool,
    },
    /// Normalize every message of an MBOX file as JSON Lines
    Mbox {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Account / mailbox id recorded on every message
    #[arg(short, long, value_name = "ID")]
    account: Option<String>,

    /// Leave the flattened attachment lists empty
    #[arg(long)]
    no_flatten: bool,

    /// Keep null and empty-string values in the output
    #[arg(long)]
    keep_empty: bool,
}

/// Settings resolved from the config file and command-line flags.
struct RunOptions {
    account: String,
    flatten: bool,
    prune: bool,
}

impl RunOptions {
    fn new(args: &OutputArgs, config: &Config) -> Self {
        Self {
            account: args
                .account
                .clone()
                .unwrap_or_else(|| config.parse.default_account.clone()),
            flatten: config.parse.flatten && !args.no_flatten,
            prune: config.output.prune_empty && !args.keep_empty,
        }
    }

    fn render(&self, message: &mut NormalizedMessage, pretty: bool) -> emlnorm::error::Result<String> {
        if self.flatten {
            message.flatten();
        }
        if self.prune {
            json::to_clean_json(message, pretty)
        } else {
            json::to_json(message, pretty)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = emlnorm::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let parser = EmailParser::new().with_max_depth(config.parse.max_depth);

    match cli.command {
        Commands::Parse {
            files,
            output,
            compact,
        } => {
            let options = RunOptions::new(&output, &config);
            let pretty = config.output.pretty && !compact;
            cmd_parse(&parser, &files, &options, pretty)
        }
        Commands::Mbox { path, output } => {
            let options = RunOptions::new(&output, &config);
            cmd_mbox(&parser, &path, &options)
        }
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_path = emlnorm::config::log_file_path(config);
    let file_target = log_path
        .parent()
        .zip(log_path.file_name())
        .filter(|(dir, _)| std::fs::create_dir_all(dir).is_ok());
    if let Some((log_dir, log_file)) = file_target {
        let file_appender = tracing_appender::rolling::never(log_dir, log_file);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "emlnorm", &mut std::io::stdout());
    Ok(())
}

/// Normalize each file and print its JSON document.
fn cmd_parse(
    parser: &EmailParser,
    files: &[PathBuf],
    options: &RunOptions,
    pretty: bool,
) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for path in files {
        let mut message = eml::normalize_file(parser, path, &options.account)?;
        tracing::info!(
            path = %path.display(),
            files = message.attached_files.len(),
            emails = message.attached_emails.len(),
            "Normalized message"
        );
        writeln!(out, "{}", options.render(&mut message, pretty)?)?;
    }
    Ok(())
}

/// Normalize every message of an MBOX file, one compact JSON line each.
fn cmd_mbox(parser: &EmailParser, path: &Path, options: &RunOptions) -> anyhow::Result<()> {
    let reader = MboxReader::new(path)?;

    let pb = ProgressBar::new(reader.file_size());
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} Normalizing [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            )?
            .progress_chars("#>-"),
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut failure: Option<anyhow::Error> = None;

    let count = reader.for_each_message(
        &mut |entry| {
            let mut message = parser.normalize(entry.raw, &options.account);
            let written = options
                .render(&mut message, false)
                .map_err(anyhow::Error::from)
                .and_then(|line| writeln!(out, "{line}").map_err(anyhow::Error::from));
            match written {
                Ok(()) => true,
                Err(e) => {
                    failure = Some(e.context(format!("message {} at offset {}", entry.index, entry.offset)));
                    false
                }
            }
        },
        Some(&|current, total| {
            pb.set_length(total);
            pb.set_position(current);
        }),
    )?;

    pb.finish_and_clear();

    if let Some(e) = failure {
        return Err(e);
    }
    tracing::info!(path = %reader.path().display(), messages = count, "Mailbox normalized");
    Ok(())
}
