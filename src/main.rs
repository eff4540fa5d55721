use clap::{Parser, Subcommand};
use media_normalize::config::{self, NormalizeConfig};
use media_normalize::imaging::{ExifSnapshot, ImageBackend, Quality, RustBackend, SizeSpec};
use media_normalize::metadata::MediaMetadata;
use media_normalize::output;
use media_normalize::pipeline::{NormalizeRequest, Normalizer};
use media_normalize::session::MediaSession;
use media_normalize::types::GeoLocation;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "media-normalize")]
#[command(version, about = "Resize, auto-rotate and fix up EXIF of photos in place")]
#[command(long_about = "\
Resize, auto-rotate and fix up EXIF of photos in place

Each file is rewritten atomically: re-encoded pixels and updated tags go to a
staging file beside the original, which is then renamed over it. A file that
needs no change keeps its pixels; missing tags may still be filled in.

What gets filled in when missing:
  DateTime / DateTimeOriginal   current local time
  GPS latitude / longitude      --lat/--lon
  Make / Model                  [device] in the config file

Run 'media-normalize gen-config' to generate a documented normalize.toml.")]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Per-run overrides of the config's `[defaults]`.
#[derive(clap::Args)]
struct NormalizeArgs {
    /// Image files to normalize in place
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Output size: full, large, medium, small, NN% or max:PX
    #[arg(long)]
    size: Option<SizeSpec>,

    /// Cap on the longer edge in pixels, combined with --size
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    quality: Option<u32>,

    /// Keep pixels as stored, ignoring the EXIF orientation
    #[arg(long)]
    no_rotate: bool,

    /// Latitude to write when a file has no GPS position (decimal, south negative)
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude to write when a file has no GPS position (decimal, west negative)
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Report internal failures as errors instead of a "failed" status
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Normalize image files in place
    Normalize(NormalizeArgs),
    /// Print pixel dimensions from the file header
    Probe { path: PathBuf },
    /// Print embedded metadata as JSON
    Metadata { path: PathBuf },
    /// Print a stock normalize.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Command::Normalize(args) => {
            let config = config::load_config(&cli.config)?;
            debug!("config: {:?}", config);
            init_thread_pool(&config.processing);
            run_normalize(&config, args)?;
        }
        Command::Probe { path } => {
            let dims = RustBackend::new().probe(&path)?;
            output::print_probe(&path, dims);
        }
        Command::Metadata { path } => {
            let snapshot = ExifSnapshot::read(&path)?;
            output::print_metadata_json(&MediaMetadata::from_snapshot(&snapshot))?;
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_normalize(
    config: &NormalizeConfig,
    args: NormalizeArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut options = config.normalizer_options();
    options.propagate_internal_errors |= args.strict;

    let location = args.lat.zip(args.lon).map(|(lat, lon)| GeoLocation::new(lat, lon));
    let mut seen = HashSet::new();
    let requests: Vec<NormalizeRequest> = args
        .paths
        .iter()
        .filter(|path| seen.insert(path.as_path()))
        .map(|path| {
            let mut request = config.default_request(path).with_location(location);
            if let Some(size) = args.size {
                request.size.spec = size;
            }
            if args.max_dimension.is_some() {
                request.size.max_dimension = args.max_dimension;
            }
            if let Some(quality) = args.quality {
                request.quality = Quality::new(quality);
            }
            if args.no_rotate {
                request.rotate = false;
            }
            request
        })
        .collect();

    let session = MediaSession::new(Normalizer::new(RustBackend::new(), options));
    let results = session.normalize_many(&requests)?;
    output::print_results(&requests, &results);

    let unsuccessful = results
        .iter()
        .filter(|r| r.as_ref().map_or(true, |o| o.is_failed()))
        .count();
    if unsuccessful > 0 {
        return Err(format!("{} of {} files were not normalized", unsuccessful, results.len()).into());
    }
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the config can lower the count, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
