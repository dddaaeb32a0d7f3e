//! eipkit-cli - reference originator (scanner) front-end.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "eipkit-cli")]
#[command(about = "EtherNet/IP originator tools")]
#[command(version)]
struct Cli {
    /// Target address (port 44818 appended when omitted)
    #[arg(short, long, default_value = "127.0.0.1", env = "EIPKIT_SERVER")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Broadcast-free ListIdentity against the target
    Identity,
    /// ListServices against the target
    Services,
    /// Enumerate controller tags via the Symbol object
    ListTags,
    /// Read one element of a tag and print it
    ReadTag {
        tag: String,
    },
    /// Write a typed value to a tag
    WriteTag {
        tag: String,
        /// Elementary type: bool, sint, int, dint, lint, real, lreal
        r#type: String,
        value: String,
    },
    /// Read and decode a TIMER tag
    ReadTimer {
        tag: String,
    },
    /// Read and decode a COUNTER tag
    ReadCounter {
        tag: String,
    },
    /// Open a cyclic I/O connection and produce frames at the given RPI
    Scan {
        /// O->T (output) assembly instance
        #[arg(long, default_value_t = 150)]
        output_assembly: u16,
        /// T->O (input) assembly instance
        #[arg(long, default_value_t = 100)]
        input_assembly: u16,
        /// Requested packet interval in milliseconds
        #[arg(long, default_value_t = 100)]
        rpi_ms: u64,
        /// Produced payload size in bytes
        #[arg(long, default_value_t = 32)]
        size: usize,
        /// How long to keep producing, in seconds
        #[arg(long, default_value_t = 10)]
        duration: u64,
        /// Target UDP port for produced frames
        #[arg(long, default_value_t = 2222)]
        udp_port: u16,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Identity => commands::identity(&cli.server).await,
        Commands::Services => commands::services(&cli.server).await,
        Commands::ListTags => commands::list_tags(&cli.server).await,
        Commands::ReadTag { tag } => commands::read_tag(&cli.server, &tag).await,
        Commands::WriteTag { tag, r#type, value } => {
            commands::write_tag(&cli.server, &tag, &r#type, &value).await
        }
        Commands::ReadTimer { tag } => commands::read_timer(&cli.server, &tag).await,
        Commands::ReadCounter { tag } => commands::read_counter(&cli.server, &tag).await,
        Commands::Scan {
            output_assembly,
            input_assembly,
            rpi_ms,
            size,
            duration,
            udp_port,
        } => {
            commands::scan(
                &cli.server,
                commands::ScanOptions {
                    output_assembly,
                    input_assembly,
                    rpi_ms,
                    size,
                    duration,
                    udp_port,
                },
            )
            .await
        }
    }
}
