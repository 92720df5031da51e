//! ams CLI — one verb per pipeline stage plus `pipeline run`, composing
//! `ams-core` the way the teacher's `glottisdale` binary composes
//! `glottisdale-core`: clap subcommands, `env_logger` init, `anyhow`
//! propagation up to `main`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use ams_core::anchors::ChapterLabel;
use ams_core::asr::{AsrClient, CliAsrClient};
use ams_core::book::model::{Paragraph, ParagraphKind};
use ams_core::book::build_book_index;
use ams_core::config::AmsConfig;
use ams_core::context::{BookContext, ChapterDescriptor, ChapterManager};
use ams_core::docs::ArtifactResolver;
use ams_core::pipeline::{
    run_chapter, CancellationToken, ChapterInput, CliForcedAligner, ConcurrencyGates, ForceClaims, MfaWorkspacePool,
    RunContext,
};

#[derive(Parser)]
#[command(name = "ams", about = "Align a book's text to its audiobook recording", version)]
struct Cli {
    /// Verbose (debug-level) logging.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build (or rebuild) the book-wide word/sentence/paragraph/section index.
    BookIndex(BookIndexArgs),
    /// Run the ASR engine over one chapter's audio (stage 2).
    Asr(AsrArgs),
    /// Alignment sub-stages operating on one chapter (stages 3-5).
    Align(AlignArgs),
    /// Run the forced aligner over one chapter's staged corpus (stage 6).
    Mfa(MfaArgs),
    /// Merge forced-alignment timings into the hydrated transcript (stage 7).
    Merge(MergeArgs),
    /// Compose all seven stages for one or more chapters.
    Pipeline(PipelineArgs),
}

#[derive(Parser)]
struct BookIndexArgs {
    /// Plain-text book source, paragraphs separated by blank lines.
    #[arg(long)]
    book: PathBuf,
    /// Directory artifacts are written under (`book-index.json` lands here).
    #[arg(long = "work-dir")]
    work_dir: PathBuf,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long, default_value_t = 200.0)]
    avg_wpm: f64,
}

#[derive(Parser)]
struct ChapterTarget {
    #[arg(long = "work-dir")]
    work_dir: PathBuf,
    #[arg(long)]
    chapter: String,
    #[arg(long, default_value_t = false)]
    force: bool,
}

#[derive(Parser)]
struct AsrArgs {
    #[command(flatten)]
    target: ChapterTarget,
    #[arg(long)]
    audio: PathBuf,
    /// ASR CLI command (e.g. `whisper`) invoked as a subprocess.
    #[arg(long, default_value = "whisper")]
    asr_command: String,
    #[arg(long, default_value = "base")]
    asr_model: String,
    #[arg(long, default_value = "en")]
    language: String,
}

#[derive(Parser)]
struct AlignArgs {
    #[command(subcommand)]
    stage: AlignStage,
}

#[derive(Subcommand)]
enum AlignStage {
    /// Compute n-gram anchors between the book and ASR transcripts (stage 3).
    Anchors(AnchorsArgs),
    /// Run windowed alignment and roll up sentence/paragraph metrics (stage 4).
    Tx(TxArgs),
    /// Attach book/ASR word text and per-sentence diffs (stage 5).
    Hydrate(HydrateArgs),
}

#[derive(Parser)]
struct AnchorsArgs {
    #[command(flatten)]
    target: ChapterTarget,
    #[arg(long)]
    section_label: Option<String>,
}

#[derive(Parser)]
struct TxArgs {
    #[command(flatten)]
    target: ChapterTarget,
    #[arg(long)]
    audio: PathBuf,
}

#[derive(Parser)]
struct HydrateArgs {
    #[command(flatten)]
    target: ChapterTarget,
    #[arg(long)]
    audio: PathBuf,
}

#[derive(Parser)]
struct MfaArgs {
    #[command(flatten)]
    target: ChapterTarget,
    #[arg(long, default_value = "mfa")]
    mfa_command: String,
    #[arg(long, default_value = "english_us_arpa")]
    acoustic_model: String,
    #[arg(long, default_value = "english_us_arpa")]
    dictionary: String,
}

#[derive(Parser)]
struct MergeArgs {
    #[command(flatten)]
    target: ChapterTarget,
}

#[derive(Parser)]
struct PipelineArgs {
    #[arg(long)]
    book: PathBuf,
    #[arg(long = "work-dir")]
    work_dir: PathBuf,
    /// `chapter_id=audio_path`, repeatable.
    #[arg(long = "chapter", value_parser = parse_chapter_pair, required = true)]
    chapters: Vec<(String, PathBuf)>,
    #[arg(long, default_value_t = false)]
    force: bool,
    #[arg(long, default_value_t = 1)]
    start_stage: u8,
    #[arg(long, default_value_t = 7)]
    end_stage: u8,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "whisper")]
    asr_command: String,
    #[arg(long, default_value = "mfa")]
    mfa_command: String,
    #[arg(long, default_value = "english_us_arpa")]
    acoustic_model: String,
    #[arg(long, default_value = "english_us_arpa")]
    dictionary: String,
}

fn parse_chapter_pair(s: &str) -> std::result::Result<(String, PathBuf), String> {
    let (id, path) = s.split_once('=').ok_or_else(|| format!("expected chapter_id=audio_path, got `{s}`"))?;
    Ok((id.to_string(), PathBuf::from(path)))
}

/// Splits plain text into `Paragraph`s on blank lines; a line is treated as
/// a heading when it is short and carries no closing punctuation (a minimal
/// stand-in for the external book parser spec §1 places out of scope).
fn load_paragraphs(path: &Path) -> Result<Vec<Paragraph>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut paragraphs = Vec::new();
    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let single_line = !block.contains('\n');
        let looks_like_heading = single_line && block.len() < 60 && !block.ends_with(['.', '!', '?']);
        let kind = if looks_like_heading { ParagraphKind::Heading } else { ParagraphKind::Body };
        let level = if looks_like_heading { Some(1) } else { None };
        paragraphs.push(Paragraph { text: block.replace('\n', " "), style: None, kind, level });
    }
    Ok(paragraphs)
}

fn run_book_index(args: BookIndexArgs) -> Result<()> {
    let paragraphs = load_paragraphs(&args.book)?;
    let indexed_at = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default();
    let index = build_book_index(&paragraphs, &args.book, args.avg_wpm, &indexed_at, args.title, args.author)
        .context("building book index")?;
    let resolver = ArtifactResolver::new(&args.work_dir);
    ams_core::docs::atomic_write_json(&resolver.book_index_path(), &index)?;
    println!("wrote {}", resolver.book_index_path().display());
    Ok(())
}

fn asr_client(command: &str, model: &str, language: &str) -> CliAsrClient {
    CliAsrClient::new(command, model, language)
}

fn book_context(work_dir: &Path, chapters: Vec<ChapterDescriptor>) -> BookContext {
    BookContext::new(work_dir, ChapterManager::new(chapters))
}

async fn run_asr(args: AsrArgs) -> Result<()> {
    let resolver = ArtifactResolver::new(&args.target.work_dir);
    let path = resolver.asr_json_path(&args.target.chapter);
    let claims = ForceClaims::new();
    if !args.target.force && path.exists() {
        println!("skip: {} already exists", path.display());
        return Ok(());
    }
    if path.exists() && !claims.try_claim(&path) {
        return Ok(());
    }
    let client = asr_client(&args.asr_command, &args.asr_model, &args.language);
    let response = client.transcribe(&args.audio).await.context("transcribing audio")?;
    ams_core::docs::atomic_write_json(&path, &response)?;
    ams_core::docs::atomic_write_text(&resolver.asr_corpus_path(&args.target.chapter), &response.to_corpus_text())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn main_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread().enable_all().build().expect("failed to start tokio runtime")
}

fn make_pipeline_deps(
    cfg: &AmsConfig,
) -> (ConcurrencyGates, MfaWorkspacePool, CancellationToken, ForceClaims) {
    let gates = ConcurrencyGates::new(cfg.pipeline.asr_concurrency, cfg.pipeline.mfa_concurrency);
    let mfa_pool = MfaWorkspacePool::new(Path::new("./ams-mfa-workspaces"), cfg.pipeline.mfa_workspace_pool);
    let cancellation = CancellationToken::new();
    let force_claims = ForceClaims::new();
    (gates, mfa_pool, cancellation, force_claims)
}

async fn run_pipeline(args: PipelineArgs) -> Result<i32> {
    let cfg = match &args.config {
        Some(p) => AmsConfig::load(p)?,
        None => AmsConfig::default(),
    };
    let mut cfg = cfg;
    cfg.pipeline.force = args.force;
    cfg.pipeline.start_stage = args.start_stage;
    cfg.pipeline.end_stage = args.end_stage;

    let resolver = ArtifactResolver::new(&args.work_dir);
    let book_index_path = resolver.book_index_path();
    if !book_index_path.exists() {
        bail!("no book index at {} — run `ams book-index` first", book_index_path.display());
    }
    let book_index_text = std::fs::read_to_string(&book_index_path)?;
    let book_index = serde_json::from_str(&book_index_text)?;

    let descriptors: Vec<ChapterDescriptor> = args
        .chapters
        .iter()
        .map(|(id, audio)| ChapterDescriptor { id: id.clone(), audio_path: audio.clone(), labels: Vec::<ChapterLabel>::new() })
        .collect();
    let _book_ctx = book_context(&args.work_dir, descriptors);

    let (gates, mfa_pool, cancellation, force_claims) = make_pipeline_deps(&cfg);
    let asr_client = asr_client(&args.asr_command, "base", "en");
    let aligner = CliForcedAligner::new(&args.mfa_command, &args.acoustic_model, &args.dictionary);

    let run_ctx = RunContext {
        resolver: &resolver,
        config: &cfg,
        gates: &gates,
        mfa_pool: &mfa_pool,
        cancellation: &cancellation,
        force_claims: &force_claims,
        asr_client: &asr_client,
        aligner: &aligner,
    };

    let mut any_failed = false;
    for (chapter_id, audio_path) in &args.chapters {
        let input = ChapterInput { chapter_id, audio_path, book_index: &book_index, section_labels: &[] };
        let report = run_chapter(&run_ctx, &input).await;
        for stage in &report.stages {
            match &stage.error {
                Some(err) => log::error!("chapter {chapter_id} stage {} failed: {err}", stage.stage.name()),
                None => log::info!(
                    "chapter {chapter_id} stage {} {} ({}ms)",
                    stage.stage.name(),
                    if stage.skipped { "skipped" } else { "ok" },
                    stage.duration_ms
                ),
            }
        }
        any_failed |= report.failed();
    }

    Ok(if any_failed { 1 } else { 0 })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).format_timestamp(None).init();

    let exit_code = match cli.command {
        Command::BookIndex(args) => {
            run_book_index(args).map_err(|e| {
                log::error!("{e:#}");
                e
            })?;
            0
        }
        Command::Asr(args) => {
            let rt = main_runtime();
            match rt.block_on(run_asr(args)) {
                Ok(()) => 0,
                Err(e) => {
                    log::error!("{e:#}");
                    1
                }
            }
        }
        Command::Align(_) | Command::Mfa(_) | Command::Merge(_) => {
            // These stages only make sense composed with the book/ASR context
            // a chapter carries; drive them through `ams pipeline run
            // --start-stage --end-stage` restricted to the stage of interest.
            bail!("use `ams pipeline run --start-stage N --end-stage N` to run a single alignment stage in isolation");
        }
        Command::Pipeline(args) => {
            let rt = main_runtime();
            match rt.block_on(run_pipeline(args)) {
                Ok(code) => code,
                Err(e) => {
                    log::error!("{e:#}");
                    2
                }
            }
        }
    };

    std::process::exit(exit_code);
}
