use std::fs::File;
use std::io::{self, BufWriter, Write};

use chainmix_core::{BitChunks, BitFormat, parse_seed_hex};

pub fn run(seed_hex: &str, bits: u64, fmt: &str, newline: bool, output: Option<&str>) -> i32 {
    let seed = match parse_seed_hex(seed_hex) {
        Ok(seed) => seed,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    let format = match fmt {
        "txt" => BitFormat::Ascii { newline },
        _ => BitFormat::Binary,
    };

    let result = match output {
        Some(path) => match File::create(path) {
            Ok(file) => write_chunks(&seed, bits, format, BufWriter::new(file)),
            Err(e) => {
                eprintln!("cannot create {path}: {e}");
                return 1;
            }
        },
        None => write_chunks(&seed, bits, format, io::stdout().lock()),
    };

    match result {
        Ok(()) => {
            if let Some(path) = output {
                eprintln!("wrote {bits} bits to {path}");
            }
            0
        }
        Err(e) => {
            eprintln!("write failed: {e}");
            1
        }
    }
}

fn write_chunks<W: Write>(
    seed: &[u8; 32],
    bits: u64,
    format: BitFormat,
    mut writer: W,
) -> io::Result<()> {
    for chunk in BitChunks::new(seed, bits, format) {
        writer.write_all(&chunk)?;
    }
    writer.flush()
}
