// Integration test utilities
//
// Helpers for writing raw trial folders the way the measurement tooling
// produces them: Time/Delta in milliseconds, cumulative energy, power.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// Sampling interval of generated trials (ms)
pub const INTERVAL_MS: u64 = 100;

/// Raw trial CSV with cumulative CPU and per-core energy
///
/// `total` is spread evenly over `samples - 1` steps; core `i` gets
/// `total / (i + 2)`.
pub fn trial_csv(total: f64, samples: usize, cores: usize) -> String {
    let mut header = vec!["Time".to_string(), "Delta".to_string(), "CPU_ENERGY (J)".to_string()];
    for core in 0..cores {
        header.push(format!("CORE{}_ENERGY (J)", core));
    }

    let mut csv = header.join(",");
    csv.push('\n');

    let steps = (samples.max(2) - 1) as f64;
    for i in 0..samples {
        let time = 5_000 + i as u64 * INTERVAL_MS;
        let delta = if i == 0 { 0 } else { INTERVAL_MS };
        let fraction = i as f64 / steps;
        let mut row = vec![
            time.to_string(),
            delta.to_string(),
            (total * fraction).to_string(),
        ];
        for core in 0..cores {
            row.push((total * fraction / (core + 2) as f64).to_string());
        }
        csv.push_str(&row.join(","));
        csv.push('\n');
    }
    csv
}

/// Folder `{root}/raw/{name}` with one trial per entry of `totals`
pub fn write_group(root: &Path, name: &str, totals: &[f64]) -> PathBuf {
    let folder = root.join("raw").join(name);
    fs::create_dir_all(&folder).expect("create trial folder");
    for (i, total) in totals.iter().enumerate() {
        fs::write(
            folder.join(format!("trial_{:02}.csv", i + 1)),
            trial_csv(*total, 4, 2),
        )
        .expect("write trial");
    }
    folder
}

/// Every file below `dir`, relative, sorted
pub fn list_files(dir: &Path) -> Vec<String> {
    fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(base, &path, out);
            } else if let Ok(relative) = path.strip_prefix(base) {
                out.push(relative.display().to_string());
            }
        }
    }

    let mut files = Vec::new();
    walk(dir, dir, &mut files);
    files.sort();
    files
}
