//! Id command implementation.

use lorekeep_core::{id_timestamp, IdGenerator};
use std::time::{Duration, UNIX_EPOCH};

/// Generates `count` ids, or decodes `decode` if given.
pub fn run(count: usize, decode: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(id) = decode {
        let ms = id_timestamp(id).ok_or_else(|| format!("{id:?} is not a generated id"))?;
        println!("{id}: {}", format_timestamp(ms));
        return Ok(());
    }

    let ids = IdGenerator::new();
    for _ in 0..count {
        println!("{}", ids.next_id());
    }
    Ok(())
}

fn format_timestamp(ms: u64) -> String {
    let datetime = UNIX_EPOCH + Duration::from_millis(ms);
    match datetime.duration_since(UNIX_EPOCH) {
        Ok(duration) => {
            let total = duration.as_secs();
            let days = total / 86400;
            let hours = (total / 3600) % 24;
            let mins = (total / 60) % 60;
            let secs = total % 60;
            format!(
                "{} ms ({} days, {:02}:{:02}:{:02}.{:03} since epoch)",
                ms,
                days,
                hours,
                mins,
                secs,
                ms % 1000
            )
        }
        Err(_) => format!("{} ms since epoch", ms),
    }
}
