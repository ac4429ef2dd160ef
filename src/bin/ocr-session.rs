//! Interactive CLI for edgequake-ocr-session.
//!
//! A line-oriented front end over [`SessionController`]: every command is one
//! session action, run to completion before the next prompt appears.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use edgequake_ocr_session::pipeline::input::is_url;
use edgequake_ocr_session::{
    present, Action, DisplayMode, DownloadArtifact, LoadStatus, OcrError, PagePreview, Session,
    SessionConfig, SessionController, SessionObserver, SessionState, Upload,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
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

// ── Busy indicator ───────────────────────────────────────────────────────────

/// Shows a spinner while an upload, model load or extraction is running.
struct SpinnerObserver {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl SpinnerObserver {
    fn new(quiet: bool) -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
            quiet,
        })
    }

    fn finish(&self) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_and_clear();
            }
        }
    }
}

impl SessionObserver for SpinnerObserver {
    fn on_action_start(&self, action: Action, detail: &str) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix(format!("{action}…"));
        bar.set_message(detail.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(bar);
        }
    }

    fn on_action_complete(&self, _action: Action, summary: &str) {
        self.finish();
        if !self.quiet {
            eprintln!("{} {}", green("✔"), summary);
        }
    }

    fn on_action_error(&self, _action: Action, _error: &OcrError) {
        // The command loop prints the error itself.
        self.finish();
    }
}

// ── Command-line arguments ───────────────────────────────────────────────────

const AFTER_HELP: &str = r#"COMMANDS (at the ocr> prompt):
  open <path|url>     Upload a PDF and render its pages (spaces allowed)
  page <n>            Select the page to OCR
  models              List selectable models
  model <n|name>      Select a model (by list number or name)
  load                Load the selected model
  prompt <text>       Replace the OCR prompt, spacing kept ("\n" for newlines)
  prompt --reset      Restore the default prompt
  extract             Extract text from the current page
  mode plain|rendered Toggle how the result is displayed
  show                Show the current result
  save [dir]          Save the result as ocr_page_<N>.txt
  preview [dir]       Save the selected page image as page_<N>.png
  status [--json]     Show the session state
  quit                Leave the session

EXAMPLES:
  # Start with a document already open
  ocr-session scan.pdf

  # Serve models from LM Studio instead of Ollama
  ocr-session --provider lmstudio --model Qwen3-VL-8B-Instruct-4bit

ENVIRONMENT VARIABLES:
  OCR_SESSION_PROVIDER    edgequake-llm provider serving the model (default: ollama)
  OCR_SESSION_MODEL       Initially selected model
  PDFIUM_LIB_PATH         Path to an existing libpdfium — skips auto-download
  RUST_LOG                Override log filtering
"#;

/// OCR PDF pages with a local Vision LLM, one page at a time.
#[derive(Parser, Debug)]
#[command(
    name = "ocr-session",
    version,
    about = "OCR PDF pages with a local Vision LLM, interactively",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF to open at startup (local path or HTTP/HTTPS URL).
    input: Option<String>,

    /// edgequake-llm provider serving the model: ollama, lmstudio, openai, …
    #[arg(long, env = "OCR_SESSION_PROVIDER", default_value = "ollama")]
    provider: String,

    /// Initially selected model (list number, full identifier or short name).
    #[arg(long, env = "OCR_SESSION_MODEL")]
    model: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "OCR_SESSION_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Path to a text file with the initial OCR prompt.
    #[arg(long, env = "OCR_SESSION_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Directory `save` writes to when none is given.
    #[arg(long, env = "OCR_SESSION_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Start in rendered display mode.
    #[arg(long)]
    rendered: bool,

    /// Skip the warm-up generation after loading a model.
    #[arg(long, env = "OCR_SESSION_NO_WARMUP")]
    no_warmup: bool,

    /// Enable DEBUG-level tracing logs (and log prompts/token counts).
    #[arg(short, long, env = "OCR_SESSION_VERBOSE")]
    verbose: bool,

    /// No spinner or hints; only results and errors.
    #[arg(short, long)]
    quiet: bool,
}

/// One line typed at the `ocr>` prompt.
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a PDF (local path or URL).
    Open { input: String },
    /// Select the page to OCR.
    Page { number: usize },
    /// List selectable models.
    Models,
    /// Select a model.
    Model { name: String },
    /// Load the selected model.
    Load,
    /// Show or replace the OCR prompt.
    Prompt {
        /// Restore the default prompt.
        #[arg(long)]
        reset: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Extract text from the current page.
    Extract,
    /// Choose how results are displayed.
    Mode { mode: DisplayMode },
    /// Show the current result.
    Show,
    /// Save the result as ocr_page_<N>.txt.
    Save { dir: Option<PathBuf> },
    /// Save the selected page image as page_<N>.png.
    Preview { dir: Option<PathBuf> },
    /// Show the session state.
    Status {
        /// Print the state as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Leave the session.
    #[command(alias = "exit")]
    Quit,
}

/// Editable form fields that live outside the session snapshot.
struct Form {
    prompt: String,
    mode: DisplayMode,
    output_dir: PathBuf,
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Keep library logs quiet by default; the spinner is the feedback.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let mut builder = SessionConfig::builder()
        .dpi(cli.dpi)
        .verbose(cli.verbose)
        .provider_name(cli.provider.clone())
        .warmup_on_load(!cli.no_warmup);
    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.default_prompt(prompt);
    }
    let config = builder.build().context("Invalid configuration")?;

    let observer = SpinnerObserver::new(cli.quiet);
    let controller =
        SessionController::with_default_backends(config).with_observer(observer.clone());

    let mut form = Form {
        prompt: controller.config().default_prompt.clone(),
        mode: if cli.rendered {
            DisplayMode::Rendered
        } else {
            DisplayMode::Plain
        },
        output_dir: cli.output_dir.clone(),
        quiet: cli.quiet,
    };

    let mut session = controller.start_session();
    if let Some(ref name) = cli.model {
        session = select_model(&controller, &session, name);
    }

    if !cli.quiet {
        eprintln!(
            "{} {}",
            cyan("◆"),
            bold("PDF OCR with Local Vision LLM")
        );
        eprintln!("{}", dim("Type 'help' for commands, 'quit' to leave."));
    }

    if let Some(ref input) = cli.input {
        session = open(&controller, &session, input).await;
        print_hint(&session, &form);
    }

    // ── Command loop ─────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", cyan("ocr>"));
        io::stderr().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parsed = match parse_line(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                // Covers `help` and `--help` as well as typos.
                e.print().ok();
                continue;
            }
        };

        if matches!(parsed.command, Command::Quit) {
            break;
        }
        session = run(&controller, session, parsed.command, &mut form).await;
    }

    observer.finish();
    Ok(())
}

/// Execute one command and return the snapshot to continue from.
async fn run(
    controller: &SessionController,
    session: Session,
    command: Command,
    form: &mut Form,
) -> Session {
    match command {
        Command::Open { input } => {
            let next = open(controller, &session, &input).await;
            print_hint(&next, form);
            next
        }
        Command::Page { number } => {
            let (next, outcome) = controller.select_page(&session, number).into_parts();
            match outcome {
                Ok(()) => print_hint(&next, form),
                Err(e) => report(&e),
            }
            next
        }
        Command::Models => {
            print_models(controller, &session);
            session
        }
        Command::Model { name } => {
            let next = select_model(controller, &session, &name);
            print_hint(&next, form);
            next
        }
        Command::Load => {
            let identifier = session.selected_model().to_string();
            let (next, outcome) = controller.load_model(&session, &identifier).await.into_parts();
            match outcome {
                Ok(LoadStatus::AlreadyReady) => {
                    eprintln!("{} Model ready: {}", green("✔"), identifier);
                }
                Ok(LoadStatus::Loaded) => {}
                Err(e) => report(&e),
            }
            print_hint(&next, form);
            next
        }
        Command::Prompt { reset, text } => {
            if reset {
                form.prompt = controller.config().default_prompt.clone();
            } else if !text.is_empty() {
                form.prompt = text.join(" ").replace("\\n", "\n");
            }
            println!("{}", form.prompt);
            session
        }
        Command::Extract => {
            let (next, outcome) = controller.extract(&session, &form.prompt).await.into_parts();
            match outcome {
                Ok(_) => show(&next, form),
                Err(e) => report(&e),
            }
            next
        }
        Command::Mode { mode } => {
            form.mode = mode;
            if session.result().is_some() {
                show(&session, form);
            }
            session
        }
        Command::Show => {
            show(&session, form);
            session
        }
        Command::Save { dir } => {
            match session.result() {
                Some(result) => {
                    let dir = dir.unwrap_or_else(|| form.output_dir.clone());
                    match DownloadArtifact::for_result(result).write_to(&dir).await {
                        Ok(path) => eprintln!(
                            "{} Saved {} {}",
                            green("✔"),
                            bold(&path.display().to_string()),
                            dim("(text/plain)")
                        ),
                        Err(e) => report(&e),
                    }
                }
                None => eprintln!("{}", dim("Nothing to save yet; run 'extract' first.")),
            }
            session
        }
        Command::Preview { dir } => {
            match session.document() {
                Some(doc) => {
                    let preview = PagePreview::for_document(doc);
                    let dir = dir.unwrap_or_else(|| form.output_dir.clone());
                    match preview.write_to(&dir).await {
                        Ok(path) => {
                            let (w, h) = preview.dimensions();
                            eprintln!(
                                "{} Page {} → {} {}",
                                green("✔"),
                                preview.page_num,
                                bold(&path.display().to_string()),
                                dim(&format!("({w}x{h} px)"))
                            );
                        }
                        Err(e) => report(&e),
                    }
                }
                None => report(&OcrError::NoDocument),
            }
            session
        }
        Command::Status { json: true } => {
            print_status_json(controller, &session, form);
            session
        }
        Command::Status { json: false } => {
            print_status(controller, &session, form);
            session
        }
        Command::Quit => session,
    }
}

/// Commands whose single argument is the rest of the line, spaces included.
const RAW_ARG_COMMANDS: &[&str] = &["open", "prompt", "save", "preview"];

/// Tokenise one REPL line and parse it.
///
/// Arguments may be quoted shell-style. For `open`, `prompt`, `save` and
/// `preview`, an unquoted argument is taken verbatim up to the end of the
/// line, so paths with spaces and the prompt's own spacing survive.
fn parse_line(line: &str) -> Result<Line, clap::Error> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim_start()),
        None => (line, ""),
    };
    let raw = RAW_ARG_COMMANDS.contains(&head)
        && !rest.is_empty()
        && !rest.starts_with(['"', '\'', '-']);

    let tokens = if raw {
        vec![head.to_string(), rest.to_string()]
    } else {
        shlex::split(line).ok_or_else(|| {
            Line::command().error(
                clap::error::ErrorKind::InvalidValue,
                "unbalanced quotes in command line",
            )
        })?
    };
    Line::try_parse_from(tokens)
}

/// Read a local file or download a URL, then upload it.
async fn open(controller: &SessionController, session: &Session, input: &str) -> Session {
    let upload = if is_url(input) {
        Upload::from_url(input, controller.config().download_timeout_secs).await
    } else {
        Upload::from_path(input).await
    };
    let upload = match upload {
        Ok(upload) => upload,
        Err(e) => {
            report(&e);
            return session.clone();
        }
    };

    let (next, outcome) = controller.upload(session, &upload).await.into_parts();
    if let Err(e) = outcome {
        report(&e);
    }
    next
}

fn select_model(controller: &SessionController, session: &Session, name: &str) -> Session {
    match controller.config().catalog.resolve(name) {
        Some(info) => controller.select_model(session, &info.identifier),
        None => {
            eprintln!(
                "{} Unknown model '{}'. Run 'models' to list the choices.",
                red("✘"),
                name
            );
            session.clone()
        }
    }
}

fn report(error: &OcrError) {
    eprintln!("{} {}", red("✘"), red(&error.to_string()));
}

fn show(session: &Session, form: &Form) {
    let Some(result) = session.result() else {
        eprintln!("{}", dim("No result for this page yet; run 'extract'."));
        return;
    };
    let view = present(result, form.mode);
    println!("{}", bold(&view.heading));
    println!();
    print!("{}", view.body);
    if !view.body.ends_with('\n') {
        println!();
    }
    if !form.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "{} tokens in / {} out · {}ms · 'save' writes ocr_page_{}.txt",
                result.input_tokens, result.output_tokens, result.duration_ms, result.page_num
            ))
        );
    }
}

fn print_models(controller: &SessionController, session: &Session) {
    let catalog = &controller.config().catalog;
    println!(
        "{}",
        bold(&format!(
            "Select Model ({})",
            catalog.provider_label().unwrap_or("models")
        ))
    );
    for (i, info) in catalog.models().iter().enumerate() {
        let marker = if info.identifier == session.selected_model() {
            green("●")
        } else {
            " ".to_string()
        };
        println!(
            "  {marker} {}. {:<28} {}",
            i + 1,
            info.display_name(),
            dim(info.download_hint.as_deref().unwrap_or(""))
        );
    }
}

fn print_status(controller: &SessionController, session: &Session, form: &Form) {
    println!("State:        {:?}", session.state());
    match session.document() {
        Some(doc) => {
            println!("Document:     {} ({} page(s))", doc.file_name, doc.page_count());
            println!("Page:         {}", doc.current_page());
        }
        None => println!("Document:     —"),
    }
    println!(
        "Model:        {} ({})",
        session.selected_model(),
        if session.is_model_ready() {
            "ready"
        } else {
            "not loaded"
        }
    );
    println!("Provider:     {}", controller.config().provider_name);
    println!("Display mode: {:?}", form.mode);
    println!("Prompt:       {:?}", form.prompt);
}

fn print_status_json(controller: &SessionController, session: &Session, form: &Form) {
    let status = serde_json::json!({
        "state": session.state(),
        "document": session.document().map(|doc| serde_json::json!({
            "file_name": doc.file_name,
            "page_count": doc.page_count(),
            "current_page": doc.current_page(),
        })),
        "model": session.selected_model(),
        "model_ready": session.is_model_ready(),
        "provider": controller.config().provider_name,
        "display_mode": format!("{:?}", form.mode).to_lowercase(),
        "result": session.result(),
    });
    match serde_json::to_string_pretty(&status) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("{} {}", red("✘"), e),
    }
}

/// Nudge the user towards the next step, like the form's info banners.
fn print_hint(session: &Session, form: &Form) {
    if form.quiet {
        return;
    }
    let hint = match session.state() {
        SessionState::NoDocument => "Upload a PDF file to begin: open <path|url>".to_string(),
        SessionState::DocumentLoaded | SessionState::ModelNotReady => {
            let pages = session.document().map_or(1, |d| d.page_count());
            let page_hint = if pages > 1 {
                format!(" (page 1–{pages} with 'page <n>')")
            } else {
                String::new()
            };
            format!(
                "Run 'load' to load {}{}",
                session.selected_model(),
                page_hint
            )
        }
        SessionState::ModelReady => format!(
            "Model ready: {}. Run 'extract' for page {}.",
            session.selected_model(),
            session.current_page().unwrap_or(1)
        ),
        SessionState::ResultAvailable => "Run 'show', 'mode' or 'save'.".to_string(),
    };
    eprintln!("{} {}", cyan("ℹ"), hint);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Command {
        parse_line(line).unwrap().command
    }

    #[test]
    fn open_keeps_spaces_in_unquoted_paths() {
        match parse("open /tmp/My Scan.pdf") {
            Command::Open { input } => assert_eq!(input, "/tmp/My Scan.pdf"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn open_accepts_quoted_paths() {
        match parse(r#"open "/tmp/My Scan.pdf""#) {
            Command::Open { input } => assert_eq!(input, "/tmp/My Scan.pdf"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prompt_text_keeps_its_spacing() {
        match parse("prompt Read  the table,   don't summarise") {
            Command::Prompt { reset, text } => {
                assert!(!reset);
                assert_eq!(text.join(" "), "Read  the table,   don't summarise");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn prompt_reset_flag_still_parses() {
        assert!(matches!(parse("prompt --reset"), Command::Prompt { reset: true, .. }));
    }

    #[test]
    fn save_and_preview_take_directories_with_spaces() {
        match parse("save /tmp/OCR out") {
            Command::Save { dir } => assert_eq!(dir, Some(PathBuf::from("/tmp/OCR out"))),
            other => panic!("unexpected {other:?}"),
        }
        match parse("preview") {
            Command::Preview { dir } => assert_eq!(dir, None),
            other => panic!("unexpected {other:?}"),
        }
        match parse("preview 'page shots'") {
            Command::Preview { dir } => assert_eq!(dir, Some(PathBuf::from("page shots"))),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn other_commands_split_on_whitespace() {
        assert!(matches!(parse("page   3"), Command::Page { number: 3 }));
        assert!(matches!(parse("status --json"), Command::Status { json: true }));
        assert!(matches!(parse("exit"), Command::Quit));
    }

    #[test]
    fn unbalanced_quotes_are_a_parse_error() {
        assert!(parse_line(r#"model "Qwen3"#).is_err());
    }

    #[test]
    fn decoding_parameters_are_not_cli_flags() {
        assert!(Cli::try_parse_from(["ocr-session", "--max-tokens", "10"]).is_err());
        assert!(Cli::try_parse_from(["ocr-session", "--temperature", "0.7"]).is_err());
    }
}
