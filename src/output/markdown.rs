//! Markdown report generation
//!
//! This module writes a human-readable market report: run information,
//! per-model price statistics and the most recent listings.

use crate::output::{MarketSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a markdown report to a file
///
/// # Arguments
///
/// * `summary` - The market summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote markdown summary
/// * `Err(OutputError)` - Failed to write summary
pub fn generate_markdown_summary(summary: &MarketSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a market summary as markdown
pub fn format_markdown_summary(summary: &MarketSummary) -> String {
    let mut md = String::new();

    md.push_str("# GPU Market Report\n\n");
    md.push_str(&format!(
        "Generated {}\n\n",
        summary.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    if let Some(run) = &summary.latest_run {
        md.push_str("## Last Scrape\n\n");
        md.push_str(&format!("- **Run ID**: {}\n", run.id));
        md.push_str(&format!("- **Started**: {}\n", run.started_at));
        if let Some(finished) = &run.finished_at {
            md.push_str(&format!("- **Finished**: {}\n", finished));
        }
        md.push_str(&format!("- **Status**: {}\n", run.status.to_db_string()));
        md.push_str(&format!(
            "- **Pages / Threads**: {} / {}\n",
            run.pages, run.threads
        ));
        md.push_str(&format!(
            "- **Listings found / saved**: {} / {}\n",
            run.listings, run.saved
        ));
        if let Some(error) = &run.error {
            md.push_str(&format!("- **Error**: {}\n", escape(error)));
        }
        md.push('\n');
    }

    md.push_str("## Prices by Model\n\n");
    md.push_str(&format!("Total listings: {}\n\n", summary.total_listings));

    if summary.model_stats.is_empty() {
        md.push_str("_No listings stored yet._\n\n");
    } else {
        md.push_str("| Model | Brand | Currency | Count | Min | Avg | Max |\n");
        md.push_str("|-------|-------|----------|-------|-----|-----|-----|\n");
        for stats in &summary.model_stats {
            md.push_str(&format!(
                "| {} | {} | {} | {} | {:.2} | {:.2} | {:.2} |\n",
                stats.model,
                stats.brand,
                stats.currency,
                stats.count,
                stats.min_price,
                stats.avg_price,
                stats.max_price
            ));
        }
        md.push('\n');
    }

    if !summary.recent_listings.is_empty() {
        md.push_str("## Recent Listings\n\n");
        md.push_str("| Model | Price | Seller | Location | Thread |\n");
        md.push_str("|-------|-------|--------|----------|--------|\n");
        for listing in &summary.recent_listings {
            md.push_str(&format!(
                "| {} | {:.2} {} | {} | {} | [{}]({}) |\n",
                listing.model,
                listing.price,
                listing.currency,
                escape(&listing.author),
                listing.location.as_deref().unwrap_or("-"),
                escape(&listing.title),
                listing.url
            ));
        }
        md.push('\n');
    }

    md
}

/// Escapes characters that would break a table cell or link text
fn escape(text: &str) -> String {
    text.replace('|', "\\|")
        .replace('[', "\\[")
        .replace(']', "\\]")
}
