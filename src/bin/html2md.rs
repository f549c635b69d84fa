//! CLI binary for edgequake-html2md.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_html2md::{
    convert, convert_to_file, inspect, ConversionConfig, ConversionProgressCallback,
    Html2MdError, ProgressCallback, TokenEncoding,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live bar plus one log line per chunk.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-chunk start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_conversion_start` reports the chunk count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(SPINNER);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Parsing HTML…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} chunks  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Converting");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, chunk_num: usize) -> f64 {
        self.start_times
            .lock()
            .map(|mut m| m.remove(&chunk_num))
            .ok()
            .flatten()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_chunks: usize) {
        self.activate_bar(total_chunks);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_chunks} chunk(s)…"))
        ));
    }

    fn on_chunk_start(&self, chunk_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(chunk_num, Instant::now());
        }
        self.bar.set_message(format!("chunk {chunk_num}"));
    }

    fn on_chunk_complete(&self, chunk_num: usize, total: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(chunk_num);
        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            chunk_num,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(chunk_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Chunk {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, total_chunks: usize, success_count: usize) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 && success_count == total_chunks {
            eprintln!(
                "{} {} chunk(s) converted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} conversion aborted after {}/{} chunk(s)",
                red("✘"),
                bold(&success_count.to_string()),
                total_chunks,
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  html2md page.html

  # Convert to file
  html2md page.html -o page.md

  # Convert from URL with smaller chunks
  html2md https://example.com/article --token-budget 2000 --overlap 200 -o article.md

  # Preview how a document would be chunked (no API key needed)
  html2md --inspect-only page.html

  # Keep formatting consistent across chunks
  html2md --maintain-format long.html -o long.md

  # JSON output with metadata and per-chunk stats
  html2md --json page.html > output.json

CHUNKING:
  The body HTML is split into windows of --token-budget tokens. Each window
  repeats the last --overlap tokens of the previous one for context. Converted
  fragments are joined as-is; text near a boundary may appear twice.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Convert HTML files and URLs to Markdown using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "html2md",
    version,
    about = "Convert HTML files and URLs to Markdown using LLMs",
    long_about = "Convert HTML documents (local files or URLs) to clean Markdown using Large \
Language Models. Large documents are split into overlapping token-budgeted chunks; page \
metadata becomes YAML front matter.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local HTML file path or HTTP/HTTPS URL.
    input: String,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long, env = "HTML2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Maximum tokens per chunk.
    #[arg(long, env = "HTML2MD_TOKEN_BUDGET", default_value_t = 4000)]
    token_budget: usize,

    /// Tokens shared between consecutive chunks (must be < token budget).
    #[arg(long, env = "HTML2MD_OVERLAP", default_value_t = 100)]
    overlap: usize,

    /// Tokenizer encoding used to measure chunks.
    #[arg(long, env = "HTML2MD_ENCODING", value_enum, default_value = "cl100k")]
    encoding: EncodingArg,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of chunks converted at once (order is always preserved).
    #[arg(short, long, env = "HTML2MD_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Pass the previous chunk's Markdown as context (forces sequential mode).
    #[arg(long, env = "HTML2MD_MAINTAIN_FORMAT")]
    maintain_format: bool,

    /// Do not prepend YAML front matter.
    #[arg(long, env = "HTML2MD_NO_METADATA")]
    no_metadata: bool,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "HTML2MD_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per chunk.
    #[arg(long, env = "HTML2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "HTML2MD_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Output structured JSON (ConversionOutput) instead of Markdown.
    #[arg(long, env = "HTML2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "HTML2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Print metadata and the chunk plan only, no conversion.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "HTML2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "HTML2MD_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "HTML2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-chunk LLM call timeout in seconds (0 = none).
    #[arg(long, env = "HTML2MD_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum EncodingArg {
    Cl100k,
    O200k,
}

impl From<EncodingArg> for TokenEncoding {
    fn from(v: EncodingArg) -> Self {
        match v {
            EncodingArg::Cl100k => TokenEncoding::Cl100k,
            EncodingArg::O200k => TokenEncoding::O200k,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose mode always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.inspect_only;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let info = inspect(&cli.input, &config)
            .await
            .map_err(stage_context)
            .context("Failed to inspect HTML")?;

        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&info).context("Failed to serialize report")?
            );
        } else {
            println!("Input:        {}", cli.input);
            for (key, value) in info.metadata.iter() {
                println!("{:<13} {}", format!("{key}:"), value);
            }
            println!("Body:         {} bytes", info.body_bytes);
            println!("Tokens:       {} ({})", info.total_tokens, info.encoding);
            println!(
                "Chunks:       {} (budget {}, overlap {})",
                info.chunks.len(),
                info.token_budget,
                info.overlap
            );
            for (i, (start, end)) in info.chunks.iter().enumerate() {
                println!("  #{:<3} [{start}, {end})", i + 1);
            }
        }
        return Ok(());
    }

    // ── Run conversion ───────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let stats = convert_to_file(&cli.input, output_path, &config)
            .await
            .map_err(stage_context)
            .context("Conversion failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} chunk(s)  {}ms  →  {}",
                green("✔"),
                stats.chunk_count,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
    } else {
        let output = convert(&cli.input, &config)
            .await
            .map_err(stage_context)
            .context("Conversion failed")?;

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "   {} chunk(s)  {} tokens in  /  {} tokens out  —  {}ms total",
                output.stats.chunk_count,
                dim(&output.stats.total_input_tokens.to_string()),
                dim(&output.stats.total_output_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Prefix the failing pipeline stage so the user knows where it broke.
fn stage_context(e: Html2MdError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("{stage} stage failed"))
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .token_budget(cli.token_budget)
        .overlap(cli.overlap)
        .encoding(cli.encoding.clone().into())
        .concurrency(cli.concurrency)
        .maintain_format(cli.maintain_format)
        .include_metadata(!cli.no_metadata)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
