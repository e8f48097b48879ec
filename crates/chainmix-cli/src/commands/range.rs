use chainmix_core::{parse_seed_hex, sample_range};

pub fn run(seed_hex: &str, n1: i128, n2: i128, label: &str) -> i32 {
    let seed = match parse_seed_hex(seed_hex) {
        Ok(seed) => seed,
        Err(e) => {
            eprintln!("{e}");
            return 1;
        }
    };
    match sample_range(&seed, n1, n2, label) {
        Ok(result) => {
            println!("{}", result.value);
            println!(
                "  range [{}, {}] size {} | attempts {} rejected {}",
                result.lo, result.hi, result.range_size, result.attempts, result.rejected
            );
            println!("  subseed {}", result.subseed_hex);
            0
        }
        Err(e) => {
            eprintln!("{e}");
            1
        }
    }
}
