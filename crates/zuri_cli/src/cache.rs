//! `zuri cache` inspects and trims the on-disk artifact cache.

use zuri_cache::{EvictionPolicy, EvictionReport};
use zuri_common::ByteSize;
use zuri_config::parse_duration;

use crate::pipeline::{close_cache, load_workspace, open_cache};
use crate::{CacheCommand, GlobalArgs, ReportFormat};

/// Runs a `zuri cache` subcommand.
pub fn run(action: &CacheCommand, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = load_workspace(global)?;
    let cache = open_cache(&settings)?;

    match action {
        CacheCommand::Stats { format } => {
            let usage = cache.usage()?;
            match format {
                ReportFormat::Text => {
                    println!("cache directory: {}", settings.cache.dir.display());
                    println!("entries:         {}", usage.entries);
                    println!("size:            {}", ByteSize::new(usage.bytes));
                    println!("size limit:      {}", ByteSize::new(settings.cache.max_bytes));
                }
                ReportFormat::Json => {
                    let json = serde_json::json!({
                        "dir": settings.cache.dir,
                        "usage": usage,
                        "max_bytes": settings.cache.max_bytes,
                    });
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
            }
        }
        CacheCommand::Evict {
            max_size,
            max_age,
            format,
        } => {
            let policy = EvictionPolicy {
                max_bytes: Some(match max_size {
                    Some(size) => size.parse::<ByteSize>()?.bytes(),
                    None => settings.cache.max_bytes,
                }),
                max_age: Some(match max_age {
                    Some(age) => parse_duration(age)?,
                    None => settings.cache.max_age,
                }),
            };
            let report = cache.evict(policy)?;
            print_eviction(&report, *format, global)?;
        }
        CacheCommand::Clear => {
            let report = cache.clear()?;
            print_eviction(&report, ReportFormat::Text, global)?;
        }
    }

    close_cache(cache);
    Ok(0)
}

fn print_eviction(
    report: &EvictionReport,
    format: ReportFormat,
    global: &GlobalArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        ReportFormat::Text if !global.quiet => println!("{}", eviction_summary(report)),
        ReportFormat::Text => {}
    }
    Ok(())
}

/// One-line summary of an eviction pass.
pub fn eviction_summary(report: &EvictionReport) -> String {
    let mut line = format!(
        "removed {} of {} entries, freed {}, {} remaining",
        report.removed.len(),
        report.scanned,
        ByteSize::new(report.bytes_freed),
        ByteSize::new(report.bytes_remaining)
    );
    if report.protected > 0 {
        line.push_str(&format!(" ({} in use, kept)", report.protected));
    }
    line
}
