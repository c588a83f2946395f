//! CLI entry point for `patchinbox`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use patchinbox::config::{self, Config};
use patchinbox::deadline::Deadline;
use patchinbox::model::message::{BlockKind, Message, MessageHeader, PatchView};
use patchinbox::model::thread::ThreadNode;
use patchinbox::parser::diff::FileDiff;
use patchinbox::source::{self, BoxedSource};
use patchinbox::store::{MemStore, ThreadStore};

/// Browse a mailing-list patch archive as threads.
#[derive(Parser)]
#[command(name = "patchinbox", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "FILE", global = true, env = "PATCHINBOX_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the newest threads
    List {
        /// Archive directory or MBOX file
        archive: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show one message with its patches split per file
    Show {
        archive: PathBuf,
        /// Message-ID, with or without angle brackets
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Show the whole thread containing a message
    Thread {
        archive: PathBuf,
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Count the messages in a thread
    Count { archive: PathBuf, id: String },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::List { archive, json } => cmd_list(&archive, json, &config),
        Commands::Show { archive, id, json } => cmd_show(&archive, &id, json, &config),
        Commands::Thread { archive, id, json } => cmd_thread(&archive, &id, json, &config),
        Commands::Count { archive, id } => cmd_count(&archive, &id, &config),
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

    let log_path = config::log_file_path(config);
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_name = log_path.file_name().unwrap_or_default();
        let file_appender = tracing_appender::rolling::never(&log_dir, file_name);
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

/// Scan the archive and build the thread index behind a spinner.
fn open_store(archive: &Path, config: &Config) -> anyhow::Result<MemStore<BoxedSource>> {
    let source = source::open_archive(archive, &config.archive)?;

    let deadline = config
        .threading
        .scan_timeout()
        .map(Deadline::after)
        .unwrap_or_default();

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})")?);
    pb.set_message(format!("Indexing {}", archive.display()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let store = MemStore::open(source, &deadline, config.threading.max_thread_depth);
    pb.finish_and_clear();
    let store = store?;

    tracing::info!(
        path = %archive.display(),
        messages = store.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Archive indexed"
    );
    Ok(store)
}

/// Accept ids with or without the surrounding angle brackets.
fn clean_id(id: &str) -> anyhow::Result<&str> {
    let id = id.trim();
    let id = id
        .strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(id);
    if id.is_empty() {
        anyhow::bail!("empty Message-ID");
    }
    Ok(id)
}

// ── list ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ThreadSummary<'a> {
    #[serde(flatten)]
    header: &'a MessageHeader,
    messages: usize,
}

fn cmd_list(archive: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let store = open_store(archive, config)?;
    let summaries = store
        .list()
        .into_iter()
        .map(|header| {
            Ok(ThreadSummary {
                header,
                messages: store.thread_count(&header.id)?,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &summaries)?;
        writeln!(out)?;
        return Ok(());
    }

    for s in &summaries {
        writeln!(
            out,
            "{}  {:>4}  {:<24}  {}",
            s.header.date.format(&config.general.date_format),
            s.messages,
            truncate(s.header.author.label(), 24),
            s.header.title
        )?;
    }
    let total = store.index().thread_total();
    if total > summaries.len() {
        writeln!(out, "({} of {} threads)", summaries.len(), total)?;
    }
    Ok(())
}

// ── show ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct MessageView<'a> {
    #[serde(flatten)]
    message: &'a Message,
    /// Per-file diffs of every patch block that split cleanly.
    diffs: Vec<FileDiff>,
}

fn cmd_show(archive: &Path, id: &str, json: bool, config: &Config) -> anyhow::Result<()> {
    let store = open_store(archive, config)?;
    let message = store.get(clean_id(id)?, &Deadline::none())?;

    let mut out = std::io::stdout().lock();
    if json {
        let diffs = message
            .patches()
            .flat_map(|b| match b.patch_view() {
                PatchView::Files(files) => files,
                PatchView::Raw(_) => Vec::new(),
            })
            .collect();
        serde_json::to_writer_pretty(&mut out, &MessageView { message: &message, diffs })?;
        writeln!(out)?;
        return Ok(());
    }

    write_message(&mut out, &message, config)
}

fn write_message(out: &mut impl Write, message: &Message, config: &Config) -> anyhow::Result<()> {
    let h = &message.header;
    writeln!(out, "From:    {}", h.author)?;
    if !h.to.is_empty() {
        writeln!(out, "To:      {}", h.to)?;
    }
    if !h.cc.is_empty() {
        writeln!(out, "Cc:      {}", h.cc)?;
    }
    writeln!(out, "Date:    {}", h.date.format(&config.general.date_format))?;
    writeln!(out, "Subject: {}", h.title)?;
    writeln!(out, "Id:      <{}>", h.id)?;
    if let Some(parent) = &h.reply_to {
        writeln!(out, "Reply-to <{parent}>")?;
    }
    if message.signed_off {
        writeln!(out, "Signed-off: yes")?;
    }
    writeln!(out)?;

    for block in &message.body {
        match block.kind {
            BlockKind::Plain | BlockKind::Quotes => write!(out, "{}", block.body)?,
            BlockKind::Patch => match block.patch_view() {
                PatchView::Files(files) => {
                    for file in &files {
                        writeln!(out, "── {} ──", file.path().unwrap_or("(unknown file)"))?;
                        write!(out, "{}", file.text)?;
                    }
                }
                PatchView::Raw(text) => write!(out, "{text}")?,
            },
        }
    }
    Ok(())
}

// ── thread / count ──────────────────────────────────────────────

fn cmd_thread(archive: &Path, id: &str, json: bool, config: &Config) -> anyhow::Result<()> {
    let store = open_store(archive, config)?;
    let thread = store.thread(clean_id(id)?, &Deadline::none())?;

    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &thread)?;
        writeln!(out)?;
        return Ok(());
    }

    write_overview(&mut out, &thread, config)?;
    for node in thread.flatten() {
        writeln!(out)?;
        writeln!(out, "{}", "═".repeat(72))?;
        write_message(&mut out, &node.message, config)?;
    }
    Ok(())
}

/// One line per message: date, indentation by depth, title.
fn write_overview(out: &mut impl Write, thread: &ThreadNode, config: &Config) -> anyhow::Result<()> {
    for node in thread.flatten() {
        let h = &node.message.header;
        writeln!(
            out,
            "{}  {}{}  ({})",
            h.date.format(&config.general.date_format),
            "  ".repeat(node.level),
            h.title,
            h.author.label()
        )?;
    }
    Ok(())
}

fn cmd_count(archive: &Path, id: &str, config: &Config) -> anyhow::Result<()> {
    let store = open_store(archive, config)?;
    println!("{}", store.thread_count(clean_id(id)?)?);
    Ok(())
}

// ── completions / manpage ───────────────────────────────────────

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "patchinbox", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

/// Cut `s` to at most `max` characters.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
