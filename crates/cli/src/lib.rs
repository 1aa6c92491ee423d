use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use annotation_model::AnnotationEditorType;
use annotation_storage::{AnnotationSidecar, SerializableStorage};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_annotator_core::outliner::HighlightOutliner;
use pdf_annotator_core::{EditorConfig, NoopHooks, NormalizedBox, Point, UiAction, UiManager, Viewport};
use pdf_annotator_scheduler::ManualClock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

#[derive(Debug, Parser)]
#[command(name = "pdf-annotator")]
#[command(about = "PDF annotation editing tools")]
pub struct Cli {
    /// Configuration file; falls back to PDF_ANNOTATOR_* environment variables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run an editing script and print the resulting annotation storage.
    Replay {
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,
        /// Write a sidecar file instead of printing.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the outline of a highlight made of text boxes.
    Outline {
        /// Display-normalized box as `x,y,width,height`. Repeatable.
        #[arg(long = "box", value_name = "X,Y,W,H", value_parser = parse_box, required = true)]
        boxes: Vec<NormalizedBox>,
        /// Outline drawn around the highlight when it has focus.
        #[arg(long)]
        focus: bool,
    },
    /// Summarize a saved sidecar file.
    Show {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the effective configuration.
    Config {
        #[arg(long)]
        json: bool,
    },
    /// Print CLI version.
    Version,
}

/// Pages to lay out before the steps run.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayScript {
    #[serde(default)]
    pages: Vec<ScriptPage>,
    steps: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptPage {
    page_index: usize,
    viewport: Viewport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OutlineOutput<'a> {
    bbox: NormalizedBox,
    polygons: &'a [Vec<Point>],
    last_point: Option<Point>,
}

#[derive(Debug, Serialize)]
struct ShowOutput {
    path: String,
    entries: usize,
    hash: String,
    types: BTreeMap<String, usize>,
    transfer: Vec<String>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_tracing();

    match cli.command {
        Commands::Replay { script, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_replay(config, &script, output.as_deref())
        }
        Commands::Outline { boxes, focus } => run_outline(&boxes, focus),
        Commands::Show { file } => run_show(&file),
        Commands::Config { json } => {
            let config = load_config(cli.config.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                print!("{}", config.to_toml());
            }
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    // Logs go to stderr so stdout stays machine-readable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => EditorConfig::from_env().context("invalid PDF_ANNOTATOR_* environment"),
    }
}

fn run_replay(config: EditorConfig, script: &Path, output: Option<&Path>) -> Result<()> {
    let text = fs::read_to_string(script)
        .with_context(|| format!("failed to read script {}", script.display()))?;
    let script: ReplayScript = serde_json::from_str(&text).context("script is not valid JSON")?;

    let storage = replay(config, script)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            AnnotationSidecar::new(path)
                .save(&storage)
                .with_context(|| format!("failed to write sidecar to {}", path.display()))?;
            println!("{}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&storage)?),
    }
    Ok(())
}

fn replay(config: EditorConfig, script: ReplayScript) -> Result<SerializableStorage> {
    let clock = Arc::new(ManualClock::new());
    let mut manager = UiManager::with_hooks(config, Box::new(NoopHooks), clock.clone());
    for page in script.pages {
        manager.add_layer(page.page_index, page.viewport);
    }

    for (index, step) in script.steps.into_iter().enumerate() {
        // `wait` only moves the clock; it is not an editing operation.
        if step.get("action").and_then(Value::as_str) == Some("wait") {
            let ms = step
                .get("ms")
                .and_then(Value::as_u64)
                .with_context(|| format!("step {index}: wait needs a millisecond count"))?;
            clock.advance(Duration::from_millis(ms));
            manager.tick();
            continue;
        }
        let action: UiAction =
            serde_json::from_value(step).with_context(|| format!("step {index}: unknown action"))?;
        let outcome = manager.dispatch(action).with_context(|| format!("step {index} failed"))?;
        debug!(step = index, ?outcome, "step done");
    }

    manager.flush_translation();
    manager.commit_or_remove();
    info!(editors = manager.editors().count(), undo_steps = manager.history_len(), "replay finished");
    Ok(manager.serializable())
}

fn run_outline(boxes: &[NormalizedBox], focus: bool) -> Result<()> {
    let outliner = if focus { HighlightOutliner::focus(boxes) } else { HighlightOutliner::fill(boxes) };
    let outline = outliner.outline();
    let output = OutlineOutput { bbox: outline.bbox, polygons: &outline.polygons, last_point: outline.last_point };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_show(file: &Path) -> Result<()> {
    let storage = AnnotationSidecar::new(file)
        .load()
        .with_context(|| format!("failed to read sidecar {}", file.display()))?
        .with_context(|| format!("file does not exist: {}", file.display()))?;

    let mut types = BTreeMap::new();
    for value in storage.map.values() {
        let kind = match value.get("annotationType") {
            Some(code) => serde_json::from_value::<AnnotationEditorType>(code.clone())
                .map(|kind| kind.name().to_owned())
                .unwrap_or_else(|_| "unknown".to_owned()),
            None if value.get("deleted").and_then(Value::as_bool) == Some(true) => "deleted".to_owned(),
            None => "unknown".to_owned(),
        };
        *types.entry(kind).or_insert(0) += 1;
    }

    let output = ShowOutput {
        path: file.display().to_string(),
        entries: storage.map.len(),
        hash: storage.hash.clone(),
        types,
        transfer: storage.transfer.clone(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_box(value: &str) -> Result<NormalizedBox, String> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|part| part.trim().parse::<f64>().map_err(|_| format!("`{part}` is not a number")))
        .collect::<Result<_, _>>()?;
    let &[x, y, width, height] = parts.as_slice() else {
        return Err(format!("expected x,y,width,height, got `{value}`"));
    };
    if width <= 0.0 || height <= 0.0 {
        return Err("width and height must be positive".to_owned());
    }
    Ok(NormalizedBox::new(x, y, width, height))
}
