//! `harvest`: pull reviews from the source without touching the store.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use chrono::NaiveDate;
use churnlens_core::{AppConfig, RawReview};
use churnlens_harvester::{HarvestConfig, ReviewHarvester};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::wiring::{build_source, cancel_on_ctrl_c, resolve_app_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HarvestMode {
    Count,
    Date,
}

#[derive(Debug)]
pub(crate) struct HarvestArgs {
    pub app: Option<String>,
    pub mode: HarvestMode,
    pub count: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub page_size: Option<usize>,
    pub delay_ms: Option<u64>,
    pub out: Option<PathBuf>,
}

/// Harvests reviews and writes one JSON object per line, using the store's
/// column names.
///
/// # Errors
///
/// Returns an error if the arguments are inconsistent, the source fails or
/// the output cannot be written.
pub(crate) async fn run_harvest(config: &AppConfig, args: HarvestArgs) -> anyhow::Result<()> {
    let app_id = resolve_app_id(args.app, config)?;

    let mut harvest_config = HarvestConfig::from_app_config(config);
    if let Some(page_size) = args.page_size {
        harvest_config.page_size = page_size.max(1);
    }
    if let Some(delay_ms) = args.delay_ms {
        harvest_config.inter_request_delay_ms = delay_ms;
    }
    let harvester = ReviewHarvester::new(build_source(config)?, harvest_config);

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let result = match args.mode {
        HarvestMode::Count => harvester.collect_by_count(&app_id, args.count, &cancel).await,
        HarvestMode::Date => {
            let (Some(start), Some(end)) = (args.start, args.end) else {
                interrupt.abort();
                anyhow::bail!("--mode date requires both --start and --end");
            };
            if start > end {
                interrupt.abort();
                anyhow::bail!("--start {start} is after --end {end}");
            }
            harvester.collect_by_date(&app_id, start, end, &cancel).await
        }
    };
    interrupt.abort();
    let reviews = result?;

    match &args.out {
        Some(path) => {
            let mut out = BufWriter::new(File::create(path)?);
            write_json_lines(&mut out, &reviews)?;
            println!("wrote {} reviews to {}", reviews.len(), path.display());
        }
        None => write_json_lines(&mut std::io::stdout().lock(), &reviews)?,
    }
    Ok(())
}

pub(crate) fn write_json_lines<W: Write>(out: &mut W, reviews: &[RawReview]) -> anyhow::Result<()> {
    for review in reviews {
        let line = json!({
            "reviewId": review.id,
            "userName": review.author,
            "content": review.text,
            "score": review.rating,
            "thumbsUpCount": review.thumbs_up,
            "at": review.at.format("%Y-%m-%d %H:%M:%S").to_string(),
        });
        serde_json::to_writer(&mut *out, &line)?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
