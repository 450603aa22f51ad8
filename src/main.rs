//! CLI entry point for `pecbox`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use pecbox::config::{self, Config, ReportFormat};
use pecbox::export;
use pecbox::i18n;
use pecbox::pipeline::events::Tee;
use pecbox::pipeline::{EventSink, IngestSummary, Pipeline, PipelineEvent, TracingSink};
use pecbox::session::directory::DirectoryConnector;
use pecbox::session::imap::ImapConnector;
use pecbox::session::Connector;
use pecbox::stats::Summary;

#[derive(Parser)]
#[command(name = "pecbox", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: $PECBOX_CONFIG or the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Language (en, it). Defaults to the config file, then the system locale.
    #[arg(long, global = true, value_name = "LANG")]
    lang: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the configured IMAP mailbox
    Run(RunArgs),
    /// Process a directory of .eml files
    Scan {
        /// Directory containing .eml files
        dir: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Write a configuration template
    InitConfig {
        /// Where to write it (default: the user config path)
        path: Option<PathBuf>,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Options shared by `run` and `scan`. Unset options fall back to the config.
#[derive(Args, Clone, Default)]
struct RunArgs {
    /// Folder to read
    #[arg(long)]
    folder: Option<String>,

    /// Number of most recent messages to process
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Only unread messages
    #[arg(short, long)]
    unread: bool,

    /// Skip attachment extraction
    #[arg(long)]
    no_attachments: bool,

    /// Where attachments are saved
    #[arg(short, long, value_name = "DIR")]
    attachments_dir: Option<PathBuf>,

    /// Report file (default: report_pec_<timestamp>.<ext> in the report dir)
    #[arg(short, long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Report format (default: from the report extension, then the config)
    #[arg(short, long, value_enum)]
    format: Option<ReportFormat>,

    /// Print the statistics as JSON
    #[arg(long)]
    json: bool,
}

/// Find `--name value` or `--name=value` in the raw arguments.
fn early_arg(name: &str) -> Option<String> {
    let flag = format!("--{name}");
    let prefix = format!("--{name}=");
    let args: Vec<String> = std::env::args().collect();
    for (i, arg) in args.iter().enumerate() {
        if *arg == flag {
            return args.get(i + 1).cloned();
        }
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.to_string());
        }
    }
    None
}

/// Pick the language before clap runs, so `--help` is localized:
/// `--lang`, then `[general] lang` from the config, then the system locale.
fn detect_lang_early() -> i18n::Lang {
    if let Some(lang) = early_arg("lang").and_then(|code| i18n::Lang::from_code(&code)) {
        return lang;
    }
    let config_path = early_arg("config").map(PathBuf::from);
    config::load_config(config_path.as_deref())
        .ok()
        .and_then(|c| c.general.lang)
        .and_then(|code| i18n::Lang::from_code(&code))
        .unwrap_or_else(i18n::detect_system_lang)
}

/// Build a localized clap Command using i18n strings.
fn build_localized_command() -> clap::Command {
    let mut cmd = Cli::command().about(i18n::app_about());

    let subcommands: Vec<clap::Command> = cmd
        .get_subcommands()
        .map(|sub| {
            let s = sub.clone();
            match s.get_name() {
                "run" => s.about(i18n::help_cmd_run()),
                "scan" => s.about(i18n::help_cmd_scan()),
                "init-config" => s.about(i18n::help_cmd_init_config()),
                "completions" => s.about(i18n::help_cmd_completions()),
                "manpage" => s.about(i18n::help_cmd_manpage()),
                _ => s,
            }
        })
        .collect();

    for sub in subcommands {
        cmd = cmd.mut_subcommand(sub.get_name(), |_| sub.clone());
    }

    cmd
}

fn main() -> anyhow::Result<()> {
    // Detect language BEFORE clap parsing so --help is localized
    i18n::set_lang(detect_lang_early());

    let matches = build_localized_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    let config = config::load_config(cli.config.as_deref())?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Run(args) => {
            let connector = ImapConnector::new(config.account.clone(), config.fetch.mark_seen)
                .context(i18n::err_no_config())?;
            cmd_run(&config, &args, Box::new(connector))
        }
        Commands::Scan { dir, mut run } => {
            if !dir.is_dir() {
                anyhow::bail!("{}: {}", i18n::err_dir_not_found(), dir.display());
            }
            run.folder.get_or_insert_with(|| "INBOX".to_string());
            cmd_run(&config, &run, Box::new(DirectoryConnector::new(dir)))
        }
        Commands::InitConfig { path } => cmd_init_config(path),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "pecbox.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn cmd_init_config(path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = path
        .or_else(config::config_file_path)
        .context("cannot determine the user config directory; pass a path")?;
    config::write_template(&path)?;
    println!("  {} {}", i18n::msg_config_written(), path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "pecbox", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Terminal feedback: status lines and the progress bar.
struct ConsoleSink {
    pb: ProgressBar,
    quiet: bool,
}

impl ConsoleSink {
    fn say(&self, line: String) {
        if !self.quiet {
            self.pb.suspend(|| println!("  {line}"));
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&mut self, event: &PipelineEvent<'_>) {
        match event {
            PipelineEvent::Connected { target } => {
                self.say(format!("{} {target}", i18n::msg_connected()));
            }
            PipelineEvent::FolderSelected { folder } => {
                self.say(format!("{}: {folder}", i18n::msg_folder_selected()));
            }
            PipelineEvent::SearchResults { count } => {
                self.say(format!("{count} {}", i18n::msg_found()));
                self.pb.set_length(*count as u64);
                self.pb.set_position(0);
                self.pb.set_message(i18n::msg_processing());
            }
            PipelineEvent::MessageIngested { index, .. } | PipelineEvent::MessageFailed { index, .. } => {
                self.pb.set_position(*index as u64);
            }
            PipelineEvent::AttachmentsSaved { .. } => self.pb.inc(1),
            PipelineEvent::ReportExported { path, .. } => {
                self.say(format!("{}: {}", i18n::msg_report_saved(), path.display()));
            }
            PipelineEvent::Closed => self.say(i18n::msg_connection_closed().to_string()),
            PipelineEvent::AttachmentFailed { .. } | PipelineEvent::Summary(_) => {}
        }
    }
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(0);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Run the whole pipeline against `connector` and print the statistics.
fn cmd_run(config: &Config, args: &RunArgs, connector: Box<dyn Connector>) -> anyhow::Result<()> {
    let folder = args.folder.as_deref().unwrap_or(&config.fetch.folder);
    let limit = args.limit.unwrap_or(config.fetch.limit);
    let unread_only = args.unread || config.fetch.unread_only;
    let attachments_dir = args
        .attachments_dir
        .as_deref()
        .unwrap_or(&config.export.attachments_dir);
    let format = args
        .format
        .or_else(|| args.report.as_deref().and_then(ReportFormat::from_path))
        .unwrap_or(config.export.format);

    let pb = progress_bar(args.json);
    let console = ConsoleSink {
        pb: pb.clone(),
        quiet: args.json,
    };
    let mut pipeline = Pipeline::new(connector)
        .with_categorizer(config.categories.categorizer())
        .with_limits(config.parser)
        .with_raw_cache(config.fetch.cache_messages)
        .with_events(Tee(TracingSink, console));

    let start = Instant::now();
    pipeline.connect()?;
    pipeline.select_folder(folder)?;
    let ingest = pipeline.fetch_emails(limit, unread_only)?;
    pb.finish_and_clear();

    let attachments = if args.no_attachments {
        None
    } else {
        let pending = pipeline.records().iter().filter(|r| r.has_attachments()).count();
        pb.reset();
        pb.set_length(pending as u64);
        pb.set_message(i18n::msg_extracting());
        let saved = pipeline.download_attachments(attachments_dir)?;
        pb.finish_and_clear();
        if !args.json {
            println!(
                "  {saved} {} {}",
                i18n::msg_attachments_saved(),
                attachments_dir.display()
            );
        }
        Some(saved)
    };

    let sink = export::sink_for(format);
    let report_path = match &args.report {
        Some(path) => path.clone(),
        None => {
            let dir = &config.export.report_dir;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("cannot create {}", dir.display()))?;
            export::default_report_path(dir, sink.extension())
        }
    };
    let exported = pipeline.export(sink.as_ref(), &report_path);
    pipeline.close();

    let summary = match &exported {
        Ok(summary) => summary.clone(),
        Err(_) => pipeline.summary(),
    };
    let run = RunReport {
        folder,
        ingest,
        attachments,
        report: exported.is_ok().then_some(report_path.as_path()),
        summary: &summary,
        elapsed: start.elapsed(),
    };
    if args.json {
        print_stats_json(&run)?;
    } else {
        print_stats_table(&run);
    }

    exported?;
    Ok(())
}

struct RunReport<'a> {
    folder: &'a str,
    ingest: IngestSummary,
    attachments: Option<usize>,
    report: Option<&'a Path>,
    summary: &'a Summary,
    elapsed: std::time::Duration,
}

/// Print statistics in a human-readable table.
fn print_stats_table(run: &RunReport<'_>) {
    use humansize::{format_size, BINARY};

    let summary = run.summary;
    println!();
    println!("  {}", i18n::msg_statistics());
    println!("  {}", "=".repeat(40));
    println!("  {:<22} {}", i18n::msg_total_messages(), summary.total);
    println!(
        "  {:<22} {} ({:.1}%)",
        i18n::msg_with_attachments(),
        summary.with_attachments,
        summary.attachment_ratio()
    );
    if run.ingest.failed > 0 {
        println!("  {:<22} {}", i18n::msg_skipped(), run.ingest.failed);
    }
    if let Some(size) = run
        .report
        .and_then(|p| std::fs::metadata(p).ok())
        .map(|m| m.len())
    {
        println!("  {:<22} {}", i18n::msg_report_saved(), format_size(size, BINARY));
    }
    println!("  {:<22} {:.2?}", i18n::msg_elapsed(), run.elapsed);

    println!();
    println!("  {}:", i18n::msg_by_category());
    for (category, count) in summary.per_category.iter().filter(|(_, n)| **n > 0) {
        println!("    {count:>6}  {}", category.display_name());
    }

    if !summary.top_senders.is_empty() {
        println!();
        println!("  {}:", i18n::msg_top_senders());
        for (sender, count) in &summary.top_senders {
            println!("    {count:>6}  {sender}");
        }
    }
    println!();
}

/// Print statistics as JSON.
fn print_stats_json(run: &RunReport<'_>) -> anyhow::Result<()> {
    let summary = run.summary;
    let categories: serde_json::Map<String, serde_json::Value> = summary
        .per_category
        .iter()
        .map(|(category, count)| (category.label().to_string(), (*count).into()))
        .collect();
    let top_json: Vec<serde_json::Value> = summary
        .top_senders
        .iter()
        .map(|(sender, count)| {
            serde_json::json!({
                "sender": sender,
                "count": count,
            })
        })
        .collect();

    let stats = serde_json::json!({
        "folder": run.folder,
        "attempted": run.ingest.attempted,
        "ingested": run.ingest.ingested,
        "failed": run.ingest.failed,
        "attachments_saved": run.attachments,
        "report": run.report.map(|p| p.to_string_lossy().into_owned()),
        "total": summary.total,
        "with_attachments": summary.with_attachments,
        "per_category": categories,
        "top_senders": top_json,
        "elapsed_ms": run.elapsed.as_millis(),
    });

    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
