use clap::{Args, Parser, Subcommand};
use kw6::index::IndexSnapshot;
use kw6::sidecar::{read_sidecar, DEFAULT_POSITION_DIVISOR};
use kw6::{export, Kw6Error, Reader, ReaderOptions};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "kw6", about = "Inspect and convert .kw6 camera recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Source {
    /// Path to the .kw6 recording
    input: PathBuf,
    /// Sidecar .hdr index used to pre-seed byte offsets
    #[arg(long)]
    sidecar: Option<PathBuf>,
    /// Divisor applied to sidecar kw6Pos values
    #[arg(long, default_value_t = DEFAULT_POSITION_DIVISOR)]
    sidecar_divisor: i64,
    /// Index snapshot written earlier by `kw6 index`
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Failed extrapolations per lookup before walking linearly
    #[arg(long, default_value_t = kw6::config::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, size, first frame and length
    Info {
        #[command(flatten)]
        source: Source,
    },
    /// One line per position with camera sizes and image CRC32s
    List {
        #[command(flatten)]
        source: Source,
    },
    /// Dump the header fields of one position
    Frame {
        #[command(flatten)]
        source: Source,
        frame_index: i64,
    },
    /// Walk every position by declared length and report the layout
    Scan {
        #[command(flatten)]
        source: Source,
    },
    /// Write every camera image as {frame_index}_{camera_index}.png
    ToPng {
        #[command(flatten)]
        source: Source,
        /// Output directory (default: next to the input, named after it)
        #[arg(short, long)]
        output_directory: Option<PathBuf>,
    },
    /// Write frame_index,time for every position
    PositionsCsv {
        #[command(flatten)]
        source: Source,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Resolve every frame and save the byte-offset cache as JSON
    Index {
        #[command(flatten)]
        source: Source,
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { source } => {
            let mut reader = open_reader(&source)?;
            let (length, how) = match reader.assumptuous_length() {
                Ok(length) => (length, "inferred from stride"),
                Err(Kw6Error::LengthInferenceFailed { .. }) => {
                    (reader.scan_length()?, "counted linearly")
                }
                Err(e) => return Err(e.into()),
            };
            println!("── .kw6 Recording ───────────────────────────────────────");
            println!("  Path           {}", source.input.display());
            println!("  Version        {}", reader.version().as_str());
            println!("  Size           {} B", reader.file_size());
            println!("  First frame    {}", reader.initial_frame_index());
            println!("  Positions      {} ({})", length, how);
            println!("  Cached offsets {}", reader.cache().len());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { source } => {
            let mut reader = open_reader(&source)?;
            println!("{:>10} {:>14} {:>10} {:>8}  Cameras", "Frame", "Time", "Bytes", "Active");
            for position in reader.positions() {
                let position = position?;
                let cameras: Vec<String> = position.cameras.iter()
                    .map(|c| format!("#{} {}x{} crc={:08x}", c.camera_index(), c.width(), c.height(), c.crc32()))
                    .collect();
                println!("{:>10} {:>14} {:>10} {:>8}  {}",
                    position.header.frame_index, position.header.time,
                    position.header.n_frame_bytes, position.header.n_active_cameras,
                    cameras.join(", "));
            }
        }

        // ── Frame ────────────────────────────────────────────────────────────
        Commands::Frame { source, frame_index } => {
            let mut reader = open_reader(&source)?;
            let position = reader.resolve(frame_index)?;
            for (name, value) in position.header.fields() {
                println!("{:<18} {}", name, value);
            }
            for camera in &position.cameras {
                println!("── camera {} ──", camera.camera_index());
                for (name, value) in camera.header.fields() {
                    println!("  {:<16} {}", name, value);
                }
            }
        }

        // ── Scan ─────────────────────────────────────────────────────────────
        Commands::Scan { source } => {
            let mut reader = open_reader(&source)?;
            let report = reader.scan::<fn(u64, u64)>(None)?;
            println!("{}", report.summary());
            println!("  strides  {:?}", report.strides);
            println!("  ordered  {}", report.monotonic);
        }

        // ── ToPng ────────────────────────────────────────────────────────────
        Commands::ToPng { source, output_directory } => {
            let output_directory = output_directory.unwrap_or_else(|| default_output_dir(&source.input));
            let mut reader = open_reader(&source)?;
            let written = export::export_pngs(&mut reader, &output_directory)?;
            println!("Wrote {} image(s) to {}", written, output_directory.display());
        }

        // ── PositionsCsv ─────────────────────────────────────────────────────
        Commands::PositionsCsv { source, output } => {
            let mut reader = open_reader(&source)?;
            let out = BufWriter::new(File::create(&output)?);
            let rows = export::write_positions_csv(&mut reader, out)?;
            println!("Wrote {} row(s) to {}", rows, output.display());
        }

        // ── Index ────────────────────────────────────────────────────────────
        Commands::Index { source, output } => {
            let mut reader = open_reader(&source)?;
            let report = reader.scan::<fn(u64, u64)>(None)?;
            std::fs::write(&output, reader.snapshot().to_bytes()?)?;
            println!("Indexed {} position(s) → {}", report.len(), output.display());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn open_reader(source: &Source) -> Result<Reader<File>, Box<dyn std::error::Error>> {
    let options = ReaderOptions::default().with_max_attempts(source.max_attempts);
    let seed = match &source.sidecar {
        Some(path) => Some(read_sidecar(path, source.sidecar_divisor)?),
        None => None,
    };
    let mut reader = Reader::with_options(File::open(&source.input)?, options, seed)?;
    if let Some(path) = &source.snapshot {
        reader.restore(IndexSnapshot::from_bytes(&std::fs::read(path)?)?)?;
    }
    Ok(reader)
}

fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input.file_stem().map(|s| s.to_os_string()).unwrap_or_else(|| "kw6".into());
    input.parent().unwrap_or_else(|| Path::new(".")).join(stem)
}
