//! jlyrics 命令行入口

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use jlyrics::annotation::error::helpers;
use jlyrics::annotation::{
    build_reading_service, AnnotationConfig, AnnotationResult, ConfigManager, EngineState,
    LineAnnotation, LineAnnotationPipeline, ReadingEngineLifecycle, StartPolicy,
};
use jlyrics::env::{self, EnvVar};

/// Mora counts and end vowels for Japanese song lyrics
#[derive(Parser, Debug)]
#[command(name = "jlyrics", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Annotate every line of a lyrics file
    Annotate(AnnotateArgs),
    /// Print documentation for the supported environment variables
    EnvDocs,
    /// Write an example configuration file
    InitConfig {
        /// Destination path
        path: PathBuf,
    },
}

#[derive(Args, Debug)]
struct AnnotateArgs {
    /// Lyrics file, one line per lyric line
    file: PathBuf,

    /// Configuration file (TOML or JSON)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Reading engine dictionary, overrides the configured path
    #[arg(long, short = 'd')]
    dictionary: Option<PathBuf>,

    /// Emit one JSON object per line instead of a table
    #[arg(long)]
    json: bool,

    /// Start loading the dictionary before reading the input
    #[arg(long)]
    eager: bool,
}

fn init_tracing() {
    let level = env::core::LogLevel::get().unwrap_or_else(|_| "info".to_string());
    let no_color = env::core::NoColor::get().unwrap_or(false);

    let filter = EnvFilter::try_new(format!("jlyrics={}", level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(!no_color),
        )
        .init();
}

fn load_config(args: &AnnotateArgs) -> AnnotationResult<AnnotationConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigManager::from_file(path)?.into_config(),
        None => ConfigManager::new()?.into_config(),
    };

    if let Some(dictionary) = &args.dictionary {
        config.dictionary_path = Some(dictionary.clone());
    }
    if args.eager {
        config.start_policy = StartPolicy::Eager;
    }
    config.validate()?;
    Ok(config)
}

fn read_lines(path: &Path) -> AnnotationResult<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    Ok(text.lines().map(str::to_string).collect())
}

fn write_table(out: &mut impl Write, annotations: &[LineAnnotation]) -> AnnotationResult<()> {
    for annotation in annotations {
        if annotation.is_blank() {
            writeln!(out, "{:>3}  {}  {}", "", " ", annotation.raw_text)?;
            continue;
        }
        let vowel = annotation.end_vowel.map_or("-", |v| v.as_str());
        writeln!(
            out,
            "{:>3}  {}  {}",
            annotation.mora_count, vowel, annotation.raw_text
        )?;
    }
    Ok(())
}

fn write_json(out: &mut impl Write, annotations: &[LineAnnotation]) -> AnnotationResult<()> {
    for annotation in annotations {
        writeln!(out, "{}", serde_json::to_string(annotation)?)?;
    }
    Ok(())
}

async fn annotate(args: AnnotateArgs) -> AnnotationResult<()> {
    let config = load_config(&args)?;

    let service = build_reading_service(config.dictionary_path.as_deref());
    let lifecycle = Arc::new(ReadingEngineLifecycle::from_config(service, &config));
    lifecycle.on_session_start();

    let lines = read_lines(&args.file)?;

    lifecycle.on_document_opened();
    if lifecycle.wait_until_settled().await == EngineState::Failed {
        tracing::warn!("读音引擎不可用，汉字将不计入莫拉数");
    }

    let pipeline = LineAnnotationPipeline::from_config(lifecycle, &config);
    let annotations = pipeline.annotate_document(&lines).await;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        write_json(&mut out, &annotations)?;
    } else {
        write_table(&mut out, &annotations)?;
    }
    out.flush()?;

    let stats = pipeline.stats().snapshot();
    tracing::debug!(
        "共标注 {} 行，其中 {} 行经过读音转换，耗时 {:?}",
        stats.lines_annotated,
        stats.lines_converted,
        stats.processing_time
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Annotate(args) => annotate(args).await,
        Command::EnvDocs => {
            print!("{}", env::generate_env_docs());
            Ok(())
        }
        Command::InitConfig { path } => ConfigManager::generate_example_config(&path).map(|()| {
            println!("已写入示例配置: {}", path.display());
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            let _ = helpers::log_error::<()>(e);
            ExitCode::FAILURE
        }
    }
}
