//! Read-only summary query handlers.

use std::path::{Path, PathBuf};

use churnlens_core::{AppConfig, KeywordShare, SummaryCard};
use clap::Subcommand;

use crate::wiring::{open_store, resolve_window};

/// Sub-commands available under `summary`.
#[derive(Debug, Subcommand)]
pub enum SummaryCommands {
    /// Show the stored card for one month
    Show {
        /// SQLite store (defaults to `CHURNLENS_STORE_PATH`)
        #[arg(long)]
        store_path: Option<PathBuf>,
        /// Month as YYYY-MM (defaults to the current month)
        #[arg(long)]
        month: Option<String>,
        /// Print the card as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the most recent stored cards
    List {
        /// SQLite store (defaults to `CHURNLENS_STORE_PATH`)
        #[arg(long)]
        store_path: Option<PathBuf>,
        /// Maximum number of months to show
        #[arg(long, default_value = "12")]
        limit: u32,
    },
}

pub(crate) async fn run(config: &AppConfig, command: SummaryCommands) -> anyhow::Result<()> {
    match command {
        SummaryCommands::Show {
            store_path,
            month,
            json,
        } => run_summary_show(config, store_path.as_deref(), month.as_deref(), json).await,
        SummaryCommands::List { store_path, limit } => {
            run_summary_list(config, store_path.as_deref(), limit).await
        }
    }
}

async fn run_summary_show(
    config: &AppConfig,
    store_path: Option<&Path>,
    month: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let window = resolve_window(month)?;
    let pool = open_store(config, store_path).await?;

    let month = window.key();
    let Some(card) = churnlens_db::get_summary(&pool, &month).await? else {
        println!("no summary stored for {month}; run `pipeline --month {month}` first");
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&card)?);
    } else {
        print_card(&card);
    }
    Ok(())
}

async fn run_summary_list(
    config: &AppConfig,
    store_path: Option<&Path>,
    limit: u32,
) -> anyhow::Result<()> {
    let pool = open_store(config, store_path).await?;
    let cards = churnlens_db::list_summaries(&pool, i64::from(limit)).await?;

    if cards.is_empty() {
        println!("no summaries stored; run `pipeline` first");
        return Ok(());
    }

    println!(
        "{:<10}{:>8}{:>9}{:>9}{:>12}{:>11}  GENERATED",
        "MONTH", "RISK", "VARIANT", "REVIEWS", "CONFIRMED%", "COMPLAINT%"
    );
    for card in &cards {
        println!(
            "{:<10}{:>8.2}{:>9}{:>9}{:>12.1}{:>11.1}  {}",
            card.month,
            card.risk_score,
            card.variant.index(),
            card.current.total,
            card.current.confirmed.ratio,
            card.current.complaint.ratio,
            card.generated_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

fn keyword_list(keywords: &[KeywordShare]) -> String {
    if keywords.is_empty() {
        return "\u{2014}".to_string();
    }
    keywords
        .iter()
        .map(|k| format!("{} ({:.1}%)", k.keyword, k.share))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn print_card(card: &SummaryCard) {
    println!("month        {}", card.month);
    println!("risk score   {:.2}", card.risk_score);
    println!("variant      {}", card.variant.index());
    println!(
        "reviews      {} ({:+} vs previous month)",
        card.current.total, card.deltas.total
    );
    println!(
        "confirmed    {:>5.1}%  ({:+.1} pp)",
        card.current.confirmed.ratio, card.deltas.confirmed
    );
    println!(
        "complaint    {:>5.1}%  ({:+.1} pp)",
        card.current.complaint.ratio, card.deltas.complaint
    );
    println!(
        "none         {:>5.1}%  ({:+.1} pp)",
        card.current.none.ratio, card.deltas.none
    );
    println!("keywords");
    println!("  confirmed  {}", keyword_list(&card.top_keywords.confirmed));
    println!("  complaint  {}", keyword_list(&card.top_keywords.complaint));
    println!("  none       {}", keyword_list(&card.top_keywords.none));
    println!();
    for section in card.sections() {
        println!("[{}] {}", section.class, section.text);
        if !section.reason_id.is_empty() {
            println!("  evidence: {}", section.reason_id.join(", "));
        }
    }
}
