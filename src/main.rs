use clap::{Parser, Subcommand};
use magick_info::{FormatQuery, FormatTables, MagickMetadata, NativeMagick, config, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "magick-info")]
#[command(about = "Inspect the features and format registry of ImageMagick's MagickCore")]
#[command(long_about = "\
Inspect the features and format registry of ImageMagick's MagickCore

MagickCore is loaded at runtime. By default a list of common sonames is
tried in order; point at a specific library with --library, the
MAGICK_INFO_LIBRARY environment variable, or a config file.

Format modes:
  r  a decoder is registered (readable)
  w  an encoder is registered (writable)
  +  multiple frames per file are supported

Run 'magick-info gen-config' to generate a documented config file.")]
#[command(version)]
struct Cli {
    /// Config file (defaults are used when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the MagickCore shared library
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct FormatFilter {
    /// Only formats with a decoder
    #[arg(long)]
    readable: bool,
    /// Only formats with an encoder
    #[arg(long)]
    writable: bool,
    /// Only formats that store multiple frames
    #[arg(long)]
    frames: bool,
    /// MagickCore glob applied to format names
    #[arg(long, default_value = "*")]
    pattern: String,
}

#[derive(Subcommand)]
enum Command {
    /// Compiled-in features and delegate libraries
    Features,
    /// Library version
    Version,
    /// List registered image formats
    Formats(FormatFilter),
    /// Show one format by name (case-insensitive)
    Format { name: String },
    /// Show the format registered for a MIME type
    Mime { mime_type: String },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let magick_config = || -> Result<config::MagickConfig, config::ConfigError> {
        let mut loaded = config::load_config(cli.config.as_deref())?;
        if let Some(library) = &cli.library {
            loaded.library = Some(library.clone());
        }
        Ok(loaded)
    };

    match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
        Command::Features => {
            let magick = magick_info::metadata::init(&magick_config()?)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&magick.capabilities)?);
            } else {
                output::print_features(&magick.capabilities);
            }
        }
        Command::Version => {
            let magick = magick_info::metadata::init(&magick_config()?)?;
            if cli.json {
                let info = magick.capabilities.version_info();
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                output::print_version(&magick.capabilities);
            }
        }
        Command::Formats(filter) => {
            let magick_config = magick_config()?;
            let tables = if filter.pattern == "*" {
                magick_info::metadata::init(&magick_config)?.formats.clone()
            } else {
                let native = NativeMagick::load(&magick_config)?;
                FormatTables::load_pattern(&native, &filter.pattern)?
            };
            let query = FormatQuery {
                readable: filter.readable,
                writable: filter.writable,
                frames: filter.frames,
            };
            let selected: Vec<_> = tables.select(query).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&selected)?);
            } else {
                output::print_format_list(selected);
            }
        }
        Command::Format { name } => {
            let magick = magick_info::metadata::init(&magick_config()?)?;
            let format = magick
                .formats
                .get(&name)
                .ok_or_else(|| format!("unknown format: {name}"))?;
            print_one(format, cli.json)?;
        }
        Command::Mime { mime_type } => {
            let magick: &MagickMetadata = magick_info::metadata::init(&magick_config()?)?;
            let format = magick
                .formats
                .by_mime_type(&mime_type)
                .ok_or_else(|| format!("no format registered for {mime_type}"))?;
            print_one(format, cli.json)?;
        }
    }

    Ok(())
}

fn print_one(format: &magick_info::ImageFormat, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string_pretty(format)?);
    } else {
        output::print_format_detail(format);
    }
    Ok(())
}

/// `RUST_LOG` wins when set; otherwise `-v` picks the level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}
