//! CLI binary for invoice-batcher.
//!
//! A thin shim over the library crate: maps CLI flags to `BatchConfig`,
//! wires in the real Gemini and DMS clients, and renders progress.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use invoice_batcher::{
    process_batch, push_pending, BatchConfig, BatchProgressCallback, DmsConfig, GeminiClient,
    HttpDmsClient, JsonFileStore, ProgressCallback, DEFAULT_GEMINI_MODEL,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
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

/// Cut `s` to at most `max` characters, appending an ellipsis when cut.
/// Counts characters, not bytes, so multi-byte text never splits mid-char.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for extraction or upload, with a
/// per-document log line above it.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate(&self, prefix: &str, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len}  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix(prefix.to_string());
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.activate("Extracting", total_documents);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Split into {total_documents} invoices"))
        ));
    }

    fn on_document_start(&self, _index: usize, _total: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_document_extracted(&self, index: usize, total: usize, filename: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}",
            green("✓"),
            index,
            total,
            dim(filename),
        ));
        self.bar.inc(1);
    }

    fn on_document_failed(&self, index: usize, total: usize, filename: &str, error: &str) {
        let msg = truncate_chars(error, 79);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            dim(filename),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_documents: usize, persisted: usize) {
        self.bar.finish_and_clear();
        let failed = total_documents.saturating_sub(persisted);
        if failed == 0 {
            eprintln!(
                "{} {} invoices extracted and recorded",
                green("✔"),
                bold(&persisted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} invoices recorded  ({} failed)",
                cyan("⚠"),
                bold(&persisted.to_string()),
                total_documents,
                red(&failed.to_string()),
            );
        }
    }

    fn on_push_start(&self, total_records: usize) {
        self.activate("Uploading", total_records);
    }

    fn on_upload_start(&self, _index: usize, _total: usize, filename: &str) {
        self.bar.set_message(filename.to_string());
    }

    fn on_upload_done(&self, index: usize, total: usize, filename: &str, uploaded: bool) {
        let tick = if uploaded { green("✓") } else { red("✗") };
        self.bar.println(format!(
            "  {tick} {:>3}/{:<3}  {}",
            index,
            total,
            dim(filename),
        ));
        self.bar.inc(1);
    }

    fn on_upload_skipped(&self, index: usize, total: usize, filename: &str) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            dim("-"),
            index,
            total,
            dim(filename),
            dim("already uploaded"),
        ));
        self.bar.inc(1);
    }

    fn on_push_complete(&self, uploaded: usize, failed: usize, skipped: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} uploaded, {} skipped",
                green("✔"),
                bold(&uploaded.to_string()),
                skipped
            );
        } else {
            eprintln!(
                "{} {} uploaded, {} failed, {} skipped",
                cyan("⚠"),
                bold(&uploaded.to_string()),
                red(&failed.to_string()),
                skipped
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split a bundle and extract the default field set
  invoice-batcher process invoices.pdf

  # Custom fields and output directory
  invoice-batcher process invoices.pdf \
      --field "Invoice Number" --field "Vendor" --field "Total Amount" \
      --output-dir uploads

  # Upload everything still pending to the DMS
  invoice-batcher push --dms-url https://dms.example.com --doc-type 42

  # Machine-readable summary
  invoice-batcher process invoices.pdf --json > batch.json

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY     Google Gemini API key (required for `process`)
  DMS_API_URL        DMS base URL
  DMS_USERNAME       DMS account username
  DMS_PASSWORD       DMS account password
  DMS_DOC_TYPE_ID    DMS document-type identifier
  DMS_CHECKER_ID     Optional DMS reviewer identifier
"#;

/// Split multi-invoice PDFs, extract fields, and push to a DMS.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-batcher",
    version,
    about = "Split multi-invoice PDFs, extract fields with a multimodal model, and push to a DMS",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Record store file.
    #[arg(long, global = true, default_value = "records.json")]
    store: PathBuf,

    /// Directory holding the split PDF files.
    #[arg(long, global = true, default_value = "uploads")]
    output_dir: PathBuf,

    /// Output structured JSON instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Split a combined PDF, extract fields, and record each invoice.
    Process {
        /// Combined multi-invoice PDF.
        input: PathBuf,

        /// Field to extract; repeat for each field. Names containing
        /// "amount", "total", or "price" are treated as numbers.
        #[arg(long = "field", default_values_t = [
            "Invoice Number".to_string(),
            "Vendor".to_string(),
            "Invoice Date".to_string(),
            "Total Amount".to_string(),
        ])]
        fields: Vec<String>,

        /// Gemini API key.
        #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Model identifier.
        #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
        model: String,

        /// Maximum attempts per model call when rate limited.
        #[arg(long, default_value_t = 5)]
        max_attempts: u32,

        /// Initial backoff after a 429, in milliseconds (doubles per attempt).
        #[arg(long, default_value_t = 5000)]
        base_delay_ms: u64,

        /// Per-model-call HTTP timeout in seconds.
        #[arg(long, default_value_t = 120)]
        api_timeout: u64,
    },

    /// Upload every recorded invoice not yet marked Uploaded.
    Push {
        /// DMS base URL.
        #[arg(long = "dms-url", env = "DMS_API_URL")]
        dms_url: String,

        /// DMS account username.
        #[arg(long, env = "DMS_USERNAME")]
        username: String,

        /// DMS account password.
        #[arg(long, env = "DMS_PASSWORD", hide_env_values = true)]
        password: String,

        /// DMS document-type identifier.
        #[arg(long = "doc-type", env = "DMS_DOC_TYPE_ID")]
        doc_type: String,

        /// Optional DMS reviewer identifier.
        #[arg(long = "checker", env = "DMS_CHECKER_ID")]
        checker: Option<String>,

        /// Pause between consecutive uploads, in milliseconds.
        #[arg(long, default_value_t = 3000)]
        throttle_ms: u64,

        /// DMS HTTP timeout in seconds.
        #[arg(long, default_value_t = 60)]
        api_timeout: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn short_messages_pass_through_unchanged() {
        assert_eq!(truncate_chars("timeout", 79), "timeout");
        let fifty = "é".repeat(50);
        assert_eq!(truncate_chars(&fifty, 79), fifty);
    }

    #[test]
    fn truncation_lands_on_character_boundaries() {
        // Every byte offset near the cut falls inside a 2-byte character.
        let long = "é".repeat(120);
        let msg = truncate_chars(&long, 79);
        assert_eq!(msg.chars().count(), 80);
        assert!(msg.ends_with('\u{2026}'));
        assert!(msg.starts_with(&"é".repeat(79)));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };

    let store = JsonFileStore::open(&cli.store)
        .await
        .context("Failed to open the record store")?;

    match cli.command {
        Command::Process {
            ref input,
            ref fields,
            ref api_key,
            ref model,
            max_attempts,
            base_delay_ms,
            api_timeout,
        } => {
            let mut builder = BatchConfig::builder()
                .fields(fields.iter().cloned())
                .max_attempts(max_attempts)
                .base_delay_ms(base_delay_ms)
                .api_timeout_secs(api_timeout)
                .model(model.as_str())
                .output_dir(&cli.output_dir);
            if let Some(cb) = progress_cb {
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid configuration")?;

            let ai = GeminiClient::new(api_key.as_str(), model.as_str(), api_timeout)
                .context("Failed to build the Gemini client")?;

            let output = process_batch(input, &ai, &store, &config)
                .await
                .context("Batch processing failed")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output)
                        .context("Failed to serialise batch output")?
                );
            } else if !show_progress && !cli.quiet {
                eprintln!(
                    "Recorded {}/{} invoices in {}ms",
                    output.stats.persisted, output.stats.ranges, output.stats.total_duration_ms
                );
                if output.stats.failed > 0 {
                    eprintln!("  {} invoices failed extraction", output.stats.failed);
                }
            }
        }

        Command::Push {
            ref dms_url,
            ref username,
            ref password,
            ref doc_type,
            ref checker,
            throttle_ms,
            api_timeout,
        } => {
            let mut builder = BatchConfig::builder()
                .throttle_ms(throttle_ms)
                .output_dir(&cli.output_dir)
                .dms(DmsConfig {
                    base_url: dms_url.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    doc_type_id: doc_type.clone(),
                    checker_id: checker.clone(),
                });
            if let Some(cb) = progress_cb {
                builder = builder.progress_callback(cb);
            }
            let config = builder.build().context("Invalid configuration")?;

            let api = HttpDmsClient::new(dms_url.as_str(), api_timeout)
                .context("Failed to build the DMS client")?;

            let summary = push_pending(Arc::new(api), &store, &config)
                .await
                .context("Bulk push failed")?;

            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary)
                        .context("Failed to serialise push summary")?
                );
            } else if !show_progress && !cli.quiet {
                eprintln!(
                    "Uploaded {}, failed {}, skipped {} (of {})",
                    summary.uploaded, summary.failed, summary.skipped, summary.total
                );
            }
        }
    }

    Ok(())
}
