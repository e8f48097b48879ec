//! CLI for chainmix — an auditable public randomness beacon.

mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chainmix")]
#[command(about = "chainmix — public randomness from finalized blocks plus local entropy")]
#[command(version = chainmix_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (draws, SSE streams, history, sampling)
    Serve {
        /// Bind host
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Bind port
        #[arg(long, default_value = "8000")]
        port: u16,

        /// Override the Solana RPC endpoint
        #[arg(long)]
        rpc_url: Option<String>,

        /// Disable the periodic auto-draw task
        #[arg(long)]
        no_auto_draw: bool,
    },

    /// Run one draw against the live chain and print the record
    Draw {
        /// Draw identifier (defaults to a timestamped id)
        #[arg(long)]
        draw_id: Option<String>,

        /// Finalized blocks to scan for
        #[arg(long, default_value = "3")]
        blocks: usize,

        /// Local entropy collection window in milliseconds (0 disables)
        #[arg(long, default_value = "1200")]
        collect_ms: u64,

        /// Fail unless at least this many local entropy bytes were collected
        #[arg(long)]
        min_loc_bytes: Option<usize>,

        /// Override the Solana RPC endpoint
        #[arg(long)]
        rpc_url: Option<String>,

        /// Print every pipeline event as a JSON line while the draw runs
        #[arg(long)]
        events: bool,
    },

    /// Sample an unbiased integer from an inclusive range by seed
    Range {
        /// 32-byte seed, hex encoded
        seed_hex: String,

        /// Range bounds, in either order
        #[arg(allow_negative_numbers = true)]
        n1: i128,
        #[arg(allow_negative_numbers = true)]
        n2: i128,

        /// Sub-seed label for stream separation
        #[arg(long, default_value = chainmix_core::RANGE_LABEL)]
        label: String,
    },

    /// Expand a seed into a bit stream and write it out
    Bits {
        /// 32-byte seed, hex encoded
        seed_hex: String,

        /// Number of bits to produce
        bits: u64,

        /// Output format: txt (ASCII '0'/'1') or bin (raw bytes)
        #[arg(long, default_value = "bin", value_parser = ["txt", "bin"])]
        fmt: String,

        /// One bit per line (txt only)
        #[arg(long)]
        newline: bool,

        /// Output path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let exit = match cli.command {
        Commands::Serve {
            host,
            port,
            rpc_url,
            no_auto_draw,
        } => commands::serve::run(&host, port, rpc_url, no_auto_draw),
        Commands::Draw {
            draw_id,
            blocks,
            collect_ms,
            min_loc_bytes,
            rpc_url,
            events,
        } => commands::draw::run(draw_id, blocks, collect_ms, min_loc_bytes, rpc_url, events),
        Commands::Range {
            seed_hex,
            n1,
            n2,
            label,
        } => commands::range::run(&seed_hex, n1, n2, &label),
        Commands::Bits {
            seed_hex,
            bits,
            fmt,
            newline,
            output,
        } => commands::bits::run(&seed_hex, bits, &fmt, newline, output.as_deref()),
    };
    std::process::exit(exit);
}
