use anyhow::Result;
use clap::{Parser, Subcommand};
use serlink_cli::commands::{inspect::InspectOptions, monitor::MonitorOptions};
use serlink_cli::{commands, load_config, KindArg};
use serlink_core::builder::KeyState;
use serlink_core::stream::DEFAULT_CHUNK_SIZE;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "serlink")]
#[command(about = "Serlink - COBS framed telemetry over serial links", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a file's contents in one packet frame
    Encode {
        /// Input file with the payload ("-" for stdin)
        #[arg(short, long)]
        input: String,

        /// Packet kind
        #[arg(short, long, value_enum, default_value = "log")]
        kind: KindArg,

        /// Output file for the frame (hex on stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Append a CRC32C trailer
        #[arg(long)]
        crc32c: bool,

        /// Append to the output file instead of replacing it
        #[arg(long)]
        append: bool,

        /// Also print the frame as hex
        #[arg(long)]
        hex: bool,
    },

    /// Build an input packet from key codes
    Keys {
        /// Key codes currently pressed
        #[arg(long, value_delimiter = ',')]
        press: Vec<u16>,

        /// Key codes currently released
        #[arg(long, value_delimiter = ',')]
        release: Vec<u16>,

        /// Output file for the frame (hex on stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Append to the output file instead of replacing it
        #[arg(long)]
        append: bool,

        /// Also print the frame as hex
        #[arg(long)]
        hex: bool,
    },

    /// Replay a captured byte stream through the reassembler
    Inspect {
        /// Capture file
        #[arg(short, long)]
        input: String,

        /// Bytes per simulated read
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// JSON reassembler configuration
        #[arg(long)]
        config: Option<String>,

        /// Save video frames into this directory
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// Output JSON file for the report
        #[arg(short, long)]
        output: Option<String>,

        /// Show statistics only
        #[arg(long)]
        stats_only: bool,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Read and dispatch packets from a live device
    Monitor {
        /// Device node to read from
        #[arg(short, long)]
        device: String,

        /// JSON reassembler configuration
        #[arg(long)]
        config: Option<String>,

        /// Bytes requested per read
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        /// Save video frames into this directory
        #[arg(long)]
        frames_dir: Option<PathBuf>,

        /// Stop after this many packets
        #[arg(long)]
        limit: Option<u64>,

        /// Key codes to report as pressed once the link is open
        #[arg(long, value_delimiter = ',')]
        press: Vec<u16>,

        /// Write outbound frames here instead of to the device
        #[arg(long)]
        outbound: Option<String>,

        /// Seconds between throughput reports
        #[arg(long, default_value = "1")]
        interval: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Execute command
    match cli.command {
        Commands::Encode {
            input,
            kind,
            output,
            crc32c,
            append,
            hex,
        } => commands::encode::execute(&input, output.as_deref(), kind.into(), crc32c, append, hex)
            .map(drop),

        Commands::Keys {
            press,
            release,
            output,
            append,
            hex,
        } => commands::keys::execute(&press, &release, output.as_deref(), append, hex).map(drop),

        Commands::Inspect {
            input,
            chunk_size,
            config,
            frames_dir,
            output,
            stats_only,
            progress,
        } => {
            let options = InspectOptions {
                input,
                chunk_size,
                config: load_config(config.as_deref())?,
                frames_dir,
                output,
                stats_only,
                progress,
            };
            commands::inspect::execute(&options).map(drop)
        }

        Commands::Monitor {
            device,
            config,
            chunk_size,
            frames_dir,
            limit,
            press,
            outbound,
            interval,
        } => {
            let keys = (!press.is_empty()).then(|| {
                let mut keys = KeyState::new();
                for code in press {
                    keys.set(code, true);
                }
                keys
            });
            let options = MonitorOptions {
                device,
                config: load_config(config.as_deref())?,
                chunk_size,
                frames_dir,
                limit,
                keys,
                outbound,
                report_interval: Duration::from_secs(interval.max(1)),
            };
            commands::monitor::execute(options).map(drop)
        }
    }
}
