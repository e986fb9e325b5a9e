//! bytelens - Inspect binary files byte by byte
//!
//! Decodes the bytes at an offset under many interpretations, prints the
//! visible window of a hex view, and loads batches of files the way the
//! interactive viewer does.

use anyhow::{bail, Context, Result};
use bytelens_core::view::{offset_label, row_count};
use bytelens_core::{
    decode, parse_offset, Action, Endianness, Frame, HexView, Inspector, InspectorConfig,
    LoadedFile, Loader, LoaderConfig, Session, ViewEvent,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, Level};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Inspect binary files byte by byte
#[derive(Parser, Debug)]
#[command(name = "bytelens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Per-file size limit in bytes (batches may total ten times this)
    #[arg(long, global = true)]
    max_file_size: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode the bytes at an offset under every interpretation
    Inspect(InspectArgs),
    /// Print the rows a hex view would show for a scroll position
    View(ViewArgs),
    /// Load files into a session and list them
    Files(FilesArgs),
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// File to inspect
    file: PathBuf,

    /// Offset to decode (decimal or 0x-prefixed hex)
    #[arg(short, long, default_value = "0", value_parser = offset_arg)]
    offset: usize,

    /// Byte order for multi-byte values
    #[arg(short, long, value_enum, env = "BYTELENS_ENDIAN", default_value = "little")]
    endian: EndianArg,
}

#[derive(Args, Debug)]
struct ViewArgs {
    /// File to view
    file: PathBuf,

    /// Scroll position in pixels
    #[arg(long, default_value = "0")]
    scroll: f64,

    /// Viewport height in pixels
    #[arg(long, default_value = "480")]
    height: f64,

    /// Select a byte, scrolling to it if it is not visible
    #[arg(long, value_parser = offset_arg)]
    select: Option<usize>,
}

#[derive(Args, Debug)]
struct FilesArgs {
    #[command(flatten)]
    input: InputMode,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct InputMode {
    /// Files to load
    paths: Vec<PathBuf>,

    /// Load every file below a directory
    #[arg(short, long)]
    directory: Option<PathBuf>,
}

/// Byte order accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EndianArg {
    /// Least significant byte first
    Little,
    /// Most significant byte first
    Big,
}

impl From<EndianArg> for Endianness {
    fn from(arg: EndianArg) -> Self {
        match arg {
            EndianArg::Little => Endianness::Little,
            EndianArg::Big => Endianness::Big,
        }
    }
}

fn offset_arg(input: &str) -> std::result::Result<usize, String> {
    parse_offset(input).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let loader = Loader::new(loader_config(&cli));
    let lines = match &cli.command {
        Command::Inspect(args) => inspect(&loader, args)?,
        Command::View(args) => view(&loader, args)?,
        Command::Files(args) => files(&loader, &args.input)?,
    };

    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn loader_config(cli: &Cli) -> LoaderConfig {
    match cli.max_file_size {
        Some(limit) => LoaderConfig::new().max_file_size(limit),
        None => LoaderConfig::new(),
    }
}

fn load(loader: &Loader, file: &Path) -> Result<LoadedFile> {
    if !file.is_file() {
        bail!("Input path is not a file: {}", file.display());
    }
    loader
        .load_file(file)
        .with_context(|| format!("Failed to load {}", file.display()))
}

/// Decode one offset and format every field as `label: value`
fn inspect(loader: &Loader, args: &InspectArgs) -> Result<Vec<String>> {
    let file = load(loader, &args.file)?;
    let endianness = Endianness::from(args.endian);

    let config = InspectorConfig::new()
        .debounce(Duration::ZERO)
        .endianness(endianness);
    let mut inspector = Inspector::with_config(config);
    let now = Instant::now();
    inspector.cursor_mut().select(args.offset, now);
    inspector.refresh(Some(&file.bytes), now);

    let interpretation = match inspector.interpretation() {
        Some(interpretation) => interpretation.clone(),
        None => decode(&file.bytes, args.offset, endianness),
    };

    let mut lines = vec![format!(
        "{} ({} bytes) at offset {} ({}), {} endian",
        file.name,
        file.size,
        args.offset,
        offset_label(args.offset),
        endianness
    )];
    let entries = interpretation.entries();
    let width = entries.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    lines.extend(
        entries
            .into_iter()
            .map(|(label, value)| format!("{label:>width$}: {value}")),
    );
    Ok(lines)
}

/// Render the visible window of the hex view
fn view(loader: &Loader, args: &ViewArgs) -> Result<Vec<String>> {
    let file = load(loader, &args.file)?;
    let len = file.bytes.len();

    let mut view = HexView::new();
    view.resize(args.height);
    view.scroll(args.scroll);

    let mut lines = Vec::new();
    if let Some(offset) = args.select {
        match view.select(offset, len) {
            Some(ViewEvent::ScrollTo(top)) => lines.push(format!("scroll to {top}")),
            Some(ViewEvent::OffsetChanged(_)) | None => {}
        }
        if offset >= len {
            lines.push(format!("offset {} is past the end of the file", offset));
        }
    }

    let window = match view.render(Some(&file.bytes[..])) {
        Frame::Rows(window) => window,
        Frame::Empty => return Ok(lines),
    };

    debug!(
        "Rendering rows {}..{} of {}",
        window.range.start,
        window.range.end,
        row_count(len)
    );

    let selected = window.selected_cell();
    for (i, placed) in window.rows.iter().enumerate() {
        lines.push(format!("{:>8}  {}", placed.top, placed.row));
        if let Some((row, column)) = selected.filter(|(row, _)| *row == i) {
            trace!("Marking selection at row {} column {}", row, column);
            // Offset label and two spaces, then three columns per byte
            let pad = 8 + 2 + 8 + 2 + column * 3;
            lines.push(format!("{:pad$}^^", ""));
        }
    }
    lines.push(format!(
        "rows {}..{}, content height {}",
        window.range.start, window.range.end, window.total_height
    ));
    Ok(lines)
}

/// Load a batch into a session and list the result
fn files(loader: &Loader, input: &InputMode) -> Result<Vec<String>> {
    let paths = match &input.directory {
        Some(directory) => collect_directory(directory)?,
        None => input.paths.clone(),
    };
    info!("Loading {} files", paths.len());

    let mut session = Session::new();
    session.dispatch(Action::StartReading);
    let batch = loader.load_paths(&paths);
    session.dispatch(Action::SetFiles {
        files: batch.files,
        error: batch.error,
    });

    let state = session.state();
    let mut lines: Vec<String> = state
        .files
        .iter()
        .map(|file| {
            let marker = if state.active.as_ref() == Some(&file.id) {
                '*'
            } else {
                ' '
            };
            format!("{} {}  {:>10}  {}", marker, file.id, file.size, file.name)
        })
        .collect();
    if let Some(error) = &state.file_error {
        lines.push(error.clone());
    }
    Ok(lines)
}

/// Collect regular, non-hidden files below `directory`
fn collect_directory(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        bail!("Path is not a directory: {}", directory.display());
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(directory)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false)
        {
            trace!("Skipping hidden file: {}", path.display());
            continue;
        }
        paths.push(path.to_path_buf());
    }
    Ok(paths)
}
