#![no_main]

use energy_stats::preprocess::Trial;
use energy_stats::table::Table;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed trial files must surface as errors, never panics
        if let Ok(raw) = Table::parse("fuzz", input, None) {
            let _ = raw.to_csv();
            let _ = Trial::new("fuzz", raw);
        }
    }
});
