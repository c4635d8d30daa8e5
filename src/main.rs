//! raidimage - Rebuild a RAID-5 volume from member disk images
//!
//! Usage:
//!   raidimage init -d d1.img -d d2.img -d d3.img --map 1.0.P.P.3.2.4.P.5 --period 3
//!   raidimage check-map              - Validate the map and print its layout
//!   raidimage presets                - List built-in maps
//!   raidimage cat -o volume.img      - Write the reconstructed stream
//!   raidimage hash                   - BLAKE3 of the reconstructed stream
//!   raidimage inspect -p 10          - Show block boundaries of a period
//!   raidimage find-text -p 10        - Find the next period holding text

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use raidimage::{
    config::{parse_size, ArrayConfig},
    disk::{DiskSet, FileDisk},
    raid::{self, inspect::printable, RaidMap, RaidReader, ShortReadPolicy, PRESETS},
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "raidimage")]
#[command(author = "raidimage Contributors")]
#[command(version)]
#[command(about = "Rebuild a RAID-5 volume from images of its member disks")]
struct Cli {
    /// Array configuration file (JSON, or YAML by extension)
    #[arg(short, long, default_value = "~/.config/raidimage/array.json")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    array: ArrayArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Array parameters that override the configuration file
#[derive(Args)]
struct ArrayArgs {
    /// Member disk image, repeated in map column order
    #[arg(short, long = "disk", global = true)]
    disks: Vec<PathBuf>,

    /// Block size (k/m/g/s suffixes allowed)
    #[arg(long, global = true)]
    block_size: Option<String>,

    /// Rows per period
    #[arg(long, global = true)]
    period: Option<usize>,

    /// Dot-separated interleave map
    #[arg(long, global = true)]
    map: Option<String>,

    /// Use a built-in map (index or name prefix)
    #[arg(long, global = true, conflicts_with = "map")]
    preset: Option<String>,

    /// One disk is missing; rebuild it from parity as the last column
    #[arg(long, global = true)]
    missing: bool,

    /// Start of the stream of interest (k/m/g/s suffixes allowed)
    #[arg(long, global = true)]
    offset: Option<String>,

    /// Return the common prefix when rebuilt data runs short on one disk
    #[arg(long, global = true)]
    truncate_short_reads: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Save the effective configuration
    Init,

    /// List built-in maps
    Presets,

    /// Validate the map and print the grid and lookup table
    CheckMap {
        /// Number of disks, when no images are configured
        #[arg(long)]
        disk_count: Option<usize>,
    },

    /// Write the reconstructed stream
    Cat {
        /// Bytes to skip from the logical start
        #[arg(short, long)]
        skip: Option<String>,

        /// Bytes to write (default: until the disks run out)
        #[arg(short, long)]
        length: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Hash the reconstructed stream with BLAKE3
    Hash {
        /// Bytes to hash (default: until the disks run out)
        #[arg(short, long)]
        length: Option<String>,
    },

    /// Show the start and end of every block in a period
    Inspect {
        /// Period to show
        #[arg(short, long, default_value_t = 0)]
        period_number: u64,

        /// Bytes to show from each end of a block
        #[arg(long, default_value_t = 64)]
        sample: usize,
    },

    /// Find the next period whose blocks start with text
    FindText {
        /// Period to start searching from
        #[arg(short = 'p', long, default_value_t = 0)]
        from_period: u64,
    },
}

fn main() {
    let cli = Cli::parse();

    // Setup logging; stdout is reserved for stream output
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set subscriber");

    let config_path = expand_tilde(&cli.config);

    if let Err(e) = run_command(cli.command, &cli.array, &config_path) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run_command(command: Commands, args: &ArrayArgs, config_path: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Init => cmd_init(config_path, args),
        Commands::Presets => cmd_presets(),
        Commands::CheckMap { disk_count } => cmd_check_map(config_path, args, disk_count),
        Commands::Cat {
            skip,
            length,
            output,
        } => cmd_cat(config_path, args, skip, length, output),
        Commands::Hash { length } => cmd_hash(config_path, args, length),
        Commands::Inspect {
            period_number,
            sample,
        } => cmd_inspect(config_path, args, period_number, sample),
        Commands::FindText { from_period } => cmd_find_text(config_path, args, from_period),
    }
}

/// Build the configuration from file, environment and command line
fn resolve_config(config_path: &Path, args: &ArrayArgs) -> anyhow::Result<ArrayConfig> {
    // Validation waits until the command line has been applied
    let config = if config_path.exists() {
        ArrayConfig::from_file(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        env_config()
    };
    apply_args(config, args)
}

/// Defaults with environment overrides
fn env_config() -> ArrayConfig {
    let mut config = ArrayConfig::default();
    config.apply_env_overrides();
    config
}

fn apply_args(mut config: ArrayConfig, args: &ArrayArgs) -> anyhow::Result<ArrayConfig> {
    if !args.disks.is_empty() {
        config.disks = args.disks.clone();
    }
    if let Some(preset) = &args.preset {
        config.apply_preset(preset)?;
    }
    if let Some(block_size) = &args.block_size {
        config.block_size = block_size.clone();
    }
    if let Some(period) = args.period {
        config.period = period;
    }
    if let Some(map) = &args.map {
        config.map = map.clone();
    }
    if let Some(offset) = &args.offset {
        config.offset = offset.clone();
    }
    if args.missing {
        config.missing = true;
    }
    if args.truncate_short_reads {
        config.short_read = ShortReadPolicy::Truncate;
    }

    Ok(config)
}

fn open_disks(config: &ArrayConfig) -> anyhow::Result<Vec<FileDisk>> {
    config
        .disks
        .iter()
        .map(|path| {
            FileDisk::open(path).with_context(|| format!("opening disk {}", path.display()))
        })
        .collect()
}

fn disk_set<'a>(config: &ArrayConfig, disks: &'a [FileDisk]) -> raidimage::Result<DiskSet<'a, FileDisk>> {
    if config.missing {
        DiskSet::with_missing(disks)
    } else {
        Ok(DiskSet::new(disks))
    }
}

/// Validate, open the disks and hand a positioned reader to `f`
fn with_reader<F>(config_path: &Path, args: &ArrayArgs, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut RaidReader<'_, FileDisk>) -> anyhow::Result<()>,
{
    let config = resolve_config(config_path, args)?;
    config.validate()?;

    let disks = open_disks(&config)?;
    let (map, geometry) = config.layout()?;
    let mut reader = RaidReader::new(disk_set(&config, &disks)?, geometry.block_size, map, geometry.base_offset)?
        .with_policy(config.short_read);

    f(&mut reader)
}

fn cmd_init(config_path: &Path, args: &ArrayArgs) -> anyhow::Result<()> {
    info!("Initializing array configuration...");

    let config = apply_args(env_config(), args)?;
    config.validate()?;

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    config.save(config_path)?;

    info!("Configuration saved to {:?}", config_path);
    info!(
        "{} disks, map {} (period {})",
        config.disk_count(),
        config.map,
        config.period
    );
    Ok(())
}

fn cmd_presets() -> anyhow::Result<()> {
    println!("Presets");
    println!("=======");
    for (index, preset) in PRESETS.iter().enumerate() {
        println!(
            "{}: {} ({} disks, period {})",
            index,
            preset.name,
            preset.disk_count(),
            preset.period
        );
        println!("   {}", preset.map);
    }
    Ok(())
}

fn cmd_check_map(config_path: &Path, args: &ArrayArgs, disk_count: Option<usize>) -> anyhow::Result<()> {
    let config = resolve_config(config_path, args)?;
    let disk_count = match disk_count {
        Some(count) => count,
        None if config.disk_count() > 0 => config.disk_count(),
        None => bail!("no disks configured; pass --disk or --disk-count"),
    };

    let map = RaidMap::parse(&config.map, config.period, disk_count)?;

    println!("Map: {} rows x {} disks", map.physical_period(), map.disk_count());
    println!();
    print!("{}", map);
    println!();
    println!("Logical block -> (row, disk)");
    for (index, slot) in map.lookup().iter().enumerate() {
        println!("{:>5} -> ({}, {})", index, slot.row, slot.disk);
    }
    Ok(())
}

fn cmd_cat(
    config_path: &Path,
    args: &ArrayArgs,
    skip: Option<String>,
    length: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let skip = skip.as_deref().map(parse_size).transpose()?.unwrap_or(0);
    let length = length.as_deref().map(parse_size).transpose()?;

    with_reader(config_path, args, |reader| {
        reader.seek(SeekFrom::Start(skip))?;

        let mut out: Box<dyn Write> = match &output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("creating {}", path.display()))?,
            )),
            None => Box::new(BufWriter::new(io::stdout().lock())),
        };

        let written = match length {
            Some(length) => io::copy(&mut reader.by_ref().take(length), &mut out)?,
            None => io::copy(reader, &mut out)?,
        };
        out.flush()?;

        info!("Wrote {} bytes", written);
        if let Some(length) = length {
            if written < length {
                info!("Stream ended {} bytes short of the requested length", length - written);
            }
        }
        Ok(())
    })
}

fn cmd_hash(config_path: &Path, args: &ArrayArgs, length: Option<String>) -> anyhow::Result<()> {
    let length = length.as_deref().map(parse_size).transpose()?;

    with_reader(config_path, args, |reader| {
        let mut hasher = blake3::Hasher::new();
        let hashed = match length {
            Some(length) => io::copy(&mut reader.by_ref().take(length), &mut hasher)?,
            None => io::copy(reader, &mut hasher)?,
        };

        println!("{}  ({} bytes)", hex::encode(hasher.finalize().as_bytes()), hashed);
        Ok(())
    })
}

fn cmd_inspect(config_path: &Path, args: &ArrayArgs, period_number: u64, sample: usize) -> anyhow::Result<()> {
    with_reader(config_path, args, |reader| {
        let geometry = *reader.geometry();
        println!(
            "Disk offset is {} ({} periods)",
            geometry.row_offset(period_number, 0)?,
            period_number
        );

        let previews = raid::preview_period(reader.disks(), reader.map(), &geometry, period_number, sample)?;
        for preview in previews {
            println!();
            println!(
                "[{}] row {} @ {}  pos {}",
                reader.disks().label(preview.disk),
                preview.row,
                preview.offset,
                preview.token
            );
            for line in preview.head.chunks(16) {
                println!("    {}", printable(line));
            }
            println!("    ...");
            for line in preview.tail.chunks(16) {
                println!("    {}", printable(line));
            }
        }
        Ok(())
    })
}

fn cmd_find_text(config_path: &Path, args: &ArrayArgs, from_period: u64) -> anyhow::Result<()> {
    with_reader(config_path, args, |reader| {
        match raid::find_text_region(reader.disks(), reader.geometry(), from_period)? {
            Some(region) => println!(
                "Text at period {} row {} on {} (offset {})",
                region.period_number,
                region.row,
                reader.disks().label(region.disk),
                region.offset
            ),
            None => println!("No text region found after period {}", from_period),
        }
        Ok(())
    })
}

/// Expand ~ to home directory
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
