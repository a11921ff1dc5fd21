//! CLI binary for pdf-toolbox.
//!
//! A thin shim over the library crate that maps CLI flags to a `Job`,
//! drives it to completion and saves or prints the result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf_toolbox::preferences::{self, Preferences, Theme};
use pdf_toolbox::presenter::SHARE_COMMAND_ENV;
use pdf_toolbox::registry::{self, ParamKind, ToolSpec};
use pdf_toolbox::{
    pipeline, CandidateFile, ClientConfig, CommandShare, HttpBackend, Job, JobObserver, JobPhase,
    JobResult, Observer, ShareOutcome, ToolboxError,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn paint(code: &str, s: &str) -> String {
    format!("\x1b[{code}m{s}\x1b[0m")
}
fn green(s: &str) -> String {
    paint("32", s)
}
fn red(s: &str) -> String {
    paint("31", s)
}
fn dim(s: &str) -> String {
    paint("2", s)
}
fn bold(s: &str) -> String {
    paint("1", s)
}
/// Cyan reads well on dark terminals, blue on light ones.
fn accent(s: &str) -> String {
    match preferences::current().theme {
        Theme::Dark => paint("36", s),
        Theme::Light => paint("34", s),
    }
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Shows a spinner while the job waits on the network and prints one line
/// per milestone.
struct CliObserver {
    spinner: Mutex<Option<ProgressBar>>,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spinner: Mutex::new(None),
        })
    }

    fn start(&self, prefix: &'static str, message: String) {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix(prefix);
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(old) = slot.replace(bar) {
                old.finish_and_clear();
            }
        }
    }

    fn stop(&self) {
        if let Ok(mut slot) = self.spinner.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl JobObserver for CliObserver {
    fn on_transition(&self, from: JobPhase, to: JobPhase) {
        match to {
            JobPhase::Previewing => self.start("Previewing", "rendering page thumbnails…".into()),
            JobPhase::Submitting => {}
            _ if from == JobPhase::Previewing || from == JobPhase::Submitting => self.stop(),
            _ => {}
        }
    }

    fn on_intake(&self, accepted: usize, rejected: usize, ignored: usize) {
        let mut line = format!("{} {} file(s) staged", accent("◆"), bold(&accepted.to_string()));
        if rejected > 0 {
            line.push_str(&format!(", {}", red(&format!("{rejected} rejected"))));
        }
        if ignored > 0 {
            line.push_str(&dim(&format!(", {ignored} ignored (tool takes one file)")));
        }
        eprintln!("{line}");
    }

    fn on_previews_loaded(&self, pages: usize) {
        self.stop();
        eprintln!("  {} {} page previews", green("✓"), pages);
    }

    fn on_submit(&self, tool_id: &str, files: usize) {
        self.start("Processing", format!("{tool_id} ({files} file(s))"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # List every tool, or search the catalog
  pdftool tools
  pdftool tools excel

  # Merge two PDFs into ./output.pdf
  pdftool run merge a.pdf b.pdf

  # Rotate, choosing a dropdown value
  pdftool run rotate scan.pdf -p angle=180

  # Image watermark at 60% opacity
  pdftool run watermark report.pdf -p watermark_type=image --asset image=logo.png -p opacity=60

  # Remove pages 2, 4 and 6 to 8
  pdftool run delete-pages deck.pdf --remove-pages 2,4,6-8

  # OCR to stdout
  pdftool run ocr scan.pdf

  # Save page thumbnails
  pdftool preview deck.pdf -o thumbs/

SLIDERS:
  opacity, rotation and size take a level from 0 to 100. The server receives
  opacity = level/100, rotation = level*3.6 degrees, size = level*0.8 + 20.

ENVIRONMENT VARIABLES:
  PDFTOOL_SERVER          Base URL of the processing server
  PDFTOOL_TIMEOUT         Request timeout in seconds
  PDFTOOL_OUTPUT_DIR      Where results are saved
  PDFTOOL_SHARE_COMMAND   Program that receives the result path for --share
  RUST_LOG                Log filter (overrides -v / -q)
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pdftool",
    version,
    about = "Run remote PDF tools: merge, split, convert, watermark, OCR and more",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of the processing server.
    #[arg(long, global = true, env = "PDFTOOL_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Upper bound on each request, in seconds.
    #[arg(long, global = true, env = "PDFTOOL_TIMEOUT", default_value_t = 60)]
    timeout: u64,

    /// Debug logging.
    #[arg(short, long, global = true, env = "PDFTOOL_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "PDFTOOL_QUIET")]
    quiet: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "PDFTOOL_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available tools, optionally filtered by a search term.
    Tools {
        query: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Run one tool on one or more files.
    Run {
        tool: String,

        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tool parameter, e.g. `-p password=secret` or `-p opacity=40`.
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// File parameter, e.g. `--asset image=logo.png`.
        #[arg(long = "asset", value_name = "KEY=PATH", value_parser = parse_key_value)]
        assets: Vec<(String, String)>,

        /// Pages to remove for page tools, e.g. `2,4,6-8`.
        #[arg(long, value_name = "LIST")]
        remove_pages: Option<String>,

        /// Directory the result is saved into.
        #[arg(short, long, env = "PDFTOOL_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,

        /// Print the result summary (or extracted text) as JSON.
        #[arg(long)]
        json: bool,

        /// Also hand the result to $PDFTOOL_SHARE_COMMAND.
        #[arg(long)]
        share: bool,
    },

    /// Fetch page thumbnails for a PDF and save them.
    Preview {
        file: PathBuf,

        #[arg(short, long, env = "PDFTOOL_OUTPUT_DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Show or set the display theme.
    Theme {
        #[arg(value_enum)]
        theme: Option<ThemeArg>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ThemeArg {
    Dark,
    Light,
}

impl From<ThemeArg> for Theme {
    fn from(v: ThemeArg) -> Self {
        match v {
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Light => Theme::Light,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers the waits; INFO lines would tear it.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let prefs_path = preferences::default_path();
    preferences::init(prefs_path.as_deref());

    match cli.command {
        Command::Tools { ref query, json } => list_tools(query.as_deref(), json),
        Command::Theme { theme } => set_theme(theme, prefs_path.as_deref()),
        Command::Preview { ref file, ref output } => {
            let config = build_config(&cli)?;
            save_previews(&config, file, output).await
        }
        Command::Run {
            ref tool,
            ref files,
            ref params,
            ref assets,
            ref remove_pages,
            ref output,
            json,
            share,
        } => {
            let config = build_config(&cli)?;
            let observer: Option<Observer> = if show_progress {
                Some(CliObserver::new())
            } else {
                None
            };
            let run = RunArgs {
                tool,
                files,
                params,
                assets,
                remove_pages: remove_pages.as_deref(),
                output,
                json,
                share,
                quiet: cli.quiet,
            };
            run_tool(config, observer, run).await
        }
    }
}

fn build_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::builder()
        .base_url(cli.server.clone())
        .request_timeout_secs(cli.timeout)
        .preview_timeout_secs(cli.timeout)
        .build()
        .context("Invalid configuration")
}

// ── tools ────────────────────────────────────────────────────────────────────

fn list_tools(query: Option<&str>, json: bool) -> Result<()> {
    let tools = registry::search(query.unwrap_or(""));
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&tools).context("Failed to serialise tool list")?
        );
        return Ok(());
    }
    if tools.is_empty() {
        eprintln!("No tools match '{}'", query.unwrap_or_default());
        return Ok(());
    }
    for spec in tools {
        println!("{:<14} {}", accent(&bold(spec.id)), spec.title);
        println!("{:<14} {}", "", dim(spec.description));
        println!("{:<14} accepts {}", "", spec.accepted_display());
        let params = describe_params(spec);
        if !params.is_empty() {
            println!("{:<14} params  {}", "", params);
        }
    }
    Ok(())
}

fn describe_params(spec: &ToolSpec) -> String {
    let mut out = Vec::new();
    for p in spec.parameters {
        let shape = match p.kind {
            ParamKind::Text { .. } => "text".to_string(),
            ParamKind::Password => "password".to_string(),
            ParamKind::Choice { options } => options
                .iter()
                .map(|o| o.value)
                .collect::<Vec<_>>()
                .join("|"),
            ParamKind::Scaled { default_level, .. } => format!("0-100, default {default_level}"),
            ParamKind::Asset { extensions, .. } => format!("file: {}", extensions.join("/")),
            ParamKind::Watermark {
                text_key, asset_key, ..
            } => format!("text|image, with {text_key}=… or --asset {asset_key}=…"),
        };
        let required = if p.required { "" } else { "?" };
        out.push(format!("{}{}=<{}>", p.key, required, shape));
    }
    out.join("  ")
}

// ── theme ────────────────────────────────────────────────────────────────────

fn set_theme(theme: Option<ThemeArg>, path: Option<&Path>) -> Result<()> {
    let Some(theme) = theme else {
        println!("{}", preferences::current().theme);
        return Ok(());
    };
    let path = path.context("Cannot locate a config directory (set HOME or XDG_CONFIG_HOME)")?;
    let prefs = Preferences {
        theme: theme.into(),
    };
    prefs
        .save(path)
        .with_context(|| format!("Failed to save preferences to {}", path.display()))?;
    println!("{}", prefs.theme);
    Ok(())
}

// ── preview ──────────────────────────────────────────────────────────────────

async fn save_previews(config: &ClientConfig, file: &Path, output: &Path) -> Result<()> {
    let candidate = CandidateFile::from_path(file)?;
    let staged = pipeline::intake::stage_asset(candidate, &["pdf"], config.max_file_bytes)
        .with_context(|| format!("Cannot preview {}", file.display()))?;
    let backend = HttpBackend::new(config)?;
    let previews =
        pipeline::preview::fetch_previews(&backend, &staged, config.preview_timeout()).await?;

    tokio::fs::create_dir_all(output)
        .await
        .with_context(|| format!("Failed to create {}", output.display()))?;
    for page in &previews {
        let name = format!(
            "{}-page-{}.{}",
            staged.stem(),
            page.page_number,
            page.thumbnail.extension()
        );
        let path = output.join(name);
        tokio::fs::write(&path, page.thumbnail.bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{}", path.display());
    }
    eprintln!("{} {} thumbnails saved", green("✔"), previews.len());
    Ok(())
}

// ── run ──────────────────────────────────────────────────────────────────────

struct RunArgs<'a> {
    tool: &'a str,
    files: &'a [PathBuf],
    params: &'a [(String, String)],
    assets: &'a [(String, String)],
    remove_pages: Option<&'a str>,
    output: &'a Path,
    json: bool,
    share: bool,
    quiet: bool,
}

async fn run_tool(config: ClientConfig, observer: Option<Observer>, args: RunArgs<'_>) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(&config)?);
    let mut job = match Job::new(args.tool, config, backend) {
        Ok(job) => job,
        Err(e @ ToolboxError::UnknownTool { .. }) => {
            let near = registry::search(args.tool);
            if !near.is_empty() {
                let ids: Vec<_> = near.iter().map(|t| t.id).collect();
                eprintln!("Did you mean: {}", ids.join(", "));
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(observer) = observer {
        job = job.with_observer(observer);
    }
    let spec = job.spec();

    // ── Stage ────────────────────────────────────────────────────────────
    let candidates = args
        .files
        .iter()
        .map(CandidateFile::from_path)
        .collect::<Result<Vec<_>, _>>()?;
    let report = job.stage(candidates)?;
    for rejection in &report.rejected {
        eprintln!("  {} {}", red("✗"), rejection.error);
    }
    if report.accepted.is_empty() {
        anyhow::bail!("No usable input files for '{}'", spec.id);
    }

    // ── Parameters ───────────────────────────────────────────────────────
    for (key, value) in args.params {
        job.inputs_mut()?
            .set_from_str(spec, key, value)
            .map_err(ToolboxError::from)?;
    }
    for (key, path) in args.assets {
        let candidate = CandidateFile::from_path(path)?;
        job.attach_asset(key, candidate)
            .with_context(|| format!("Cannot use {path} as '{key}'"))?;
    }

    // ── Page selection ───────────────────────────────────────────────────
    match (spec.page_selection, args.remove_pages) {
        (true, Some(list)) => {
            let pages = parse_pages(list)?;
            if job.needs_previews() {
                job.load_previews().await.context("Failed to load page previews")?;
            }
            let selection = job.selection_mut()?;
            for page in pages {
                selection.select(page).map_err(ToolboxError::from)?;
            }
        }
        (true, None) => anyhow::bail!("'{}' needs --remove-pages", spec.id),
        (false, Some(_)) => anyhow::bail!("'{}' does not take --remove-pages", spec.id),
        (false, None) => {}
    }

    // ── Submit ───────────────────────────────────────────────────────────
    job.submit().await.context("Processing failed")?;

    let presenter = job.presenter()?;
    let saved = match presenter.result() {
        Some(JobResult::Text { text, page_count }) => {
            if args.json {
                let body = serde_json::json!({ "text": text, "pages": page_count });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(text.as_bytes())
                    .context("Failed to write to stdout")?;
                if !text.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }
            None
        }
        Some(JobResult::File { bytes, .. }) => {
            let size = bytes.len();
            let path = presenter.download(args.output).await?;
            if args.json {
                let body = serde_json::json!({ "file": path, "bytes": size });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("{}", path.display());
            }
            if !args.quiet {
                eprintln!("{} {} ({} bytes)", green("✔"), bold(&path.display().to_string()), size);
            }
            Some(path)
        }
        None => None,
    };

    // ── Share ────────────────────────────────────────────────────────────
    if args.share {
        let target = CommandShare::from_env();
        if !presenter.can_offer_share(&target) {
            eprintln!("Sharing is not available; set {SHARE_COMMAND_ENV} to enable it.");
        } else {
            match presenter.share(&target).await {
                Ok(ShareOutcome::Shared) => {}
                Ok(ShareOutcome::Cancelled) => eprintln!("{}", dim("Share cancelled")),
                Err(e) => {
                    eprintln!("{} {}", red("✗"), e);
                    if saved.is_none() {
                        let path = presenter.download(args.output).await?;
                        eprintln!("Saved to {} instead", path.display());
                    }
                }
            }
        }
    }

    presenter.reset();
    Ok(())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse `2,4,6-8` into page numbers. Pages are 1-indexed.
fn parse_pages(s: &str) -> Result<Vec<u32>> {
    let mut pages = Vec::new();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((start, end)) = part.split_once('-') {
            let start: u32 = start
                .trim()
                .parse()
                .with_context(|| format!("Invalid start page in range '{part}'"))?;
            let end: u32 = end
                .trim()
                .parse()
                .with_context(|| format!("Invalid end page in range '{part}'"))?;
            if start < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", start);
            }
            if start > end {
                anyhow::bail!("Invalid page range '{}': start must be <= end", part);
            }
            pages.extend(start..=end);
        } else {
            let page: u32 = part
                .parse()
                .with_context(|| format!("Invalid page number: '{part}'"))?;
            if page < 1 {
                anyhow::bail!("Pages are 1-indexed, minimum is 1 (got {})", page);
            }
            pages.push(page);
        }
    }
    if pages.is_empty() {
        anyhow::bail!("No pages given");
    }
    Ok(pages)
}
