//! CLI command implementations

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use unsub_core::{AnalysisReport, AnalysisStage, Analyzer, ProgressCallback};

use crate::cli::InputFormat;

/// `unsub analyze` - run the pipeline on a local file and print results
pub async fn cmd_analyze(
    file: &Path,
    format: InputFormat,
    json: bool,
    no_validate: bool,
) -> Result<()> {
    let format = resolve_format(file, format)?;
    let data = std::fs::read(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    let mut analyzer = Analyzer::new();
    if !no_validate {
        analyzer = analyzer.with_validator_from_env();
    }

    let progress: ProgressCallback = Box::new(|e| {
        if e.stage == AnalysisStage::Processing {
            info!(
                batch = e.current_chunk,
                total = e.total_chunks,
                "validating candidates"
            );
        }
    });

    let report = match format {
        InputFormat::Csv => analyzer.analyze_csv(&data, Some(&progress)).await?,
        InputFormat::Pdf => analyzer.analyze_pdf(&data, Some(&progress)).await?,
        InputFormat::Auto => unreachable!("resolved above"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// `unsub serve` - start the web server
pub async fn cmd_serve(host: &str, port: u16) -> Result<()> {
    unsub_server::serve(host, port).await
}

fn resolve_format(file: &Path, format: InputFormat) -> Result<InputFormat> {
    if format != InputFormat::Auto {
        return Ok(format);
    }
    match file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("csv") => Ok(InputFormat::Csv),
        Some("pdf") => Ok(InputFormat::Pdf),
        other => bail!(
            "cannot infer format from extension {:?}, pass --format csv|pdf",
            other.unwrap_or("none")
        ),
    }
}

fn print_report(report: &AnalysisReport) {
    if report.subscriptions.is_empty() {
        println!(
            "No subscriptions detected in {} transactions.",
            report.transaction_count
        );
        return;
    }

    println!(
        "Found {} subscription(s) in {} transactions ({} ms):\n",
        report.subscriptions.len(),
        report.transaction_count,
        report.processing_ms
    );
    println!(
        "{:<28} {:>10} {:>4}  {:<10} {:>5}  {:<12} {:>12}",
        "MERCHANT", "AMOUNT", "CUR", "FREQUENCY", "CONF", "NEXT CHARGE", "YEARLY"
    );

    for sub in &report.subscriptions {
        println!(
            "{:<28} {:>10.2} {:>4}  {:<10} {:>4.0}%  {:<12} {:>12.2}",
            truncate(&sub.beneficiary, 28),
            sub.average_amount,
            sub.currency,
            sub.frequency.to_string(),
            sub.confidence * 100.0,
            sub.next_estimated_payment.to_string(),
            sub.total_paid_amount,
        );
    }

    let yearly: f64 = report.subscriptions.iter().map(|s| s.total_paid_amount).sum();
    println!("\nProjected yearly total: {:.2}", yearly);
}

/// Truncate a string to a maximum length, adding "..." if truncated
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_format_by_extension() {
        assert_eq!(
            resolve_format(Path::new("a.CSV"), InputFormat::Auto).unwrap(),
            InputFormat::Csv
        );
        assert_eq!(
            resolve_format(Path::new("a.pdf"), InputFormat::Auto).unwrap(),
            InputFormat::Pdf
        );
        assert!(resolve_format(Path::new("a.txt"), InputFormat::Auto).is_err());
    }

    #[test]
    fn test_explicit_format_wins() {
        assert_eq!(
            resolve_format(Path::new("a.txt"), InputFormat::Pdf).unwrap(),
            InputFormat::Pdf
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 28), "short");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }
}
