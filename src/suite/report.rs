//! Self-contained HTML report
//!
//! Screenshots are inlined as base64 data URIs so the report can be moved
//! around as a single file.

use base64::Engine;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::suite::{ScenarioResult, Status, SuiteReport};
use crate::{Error, Result};

/// Write `report` to `<dir>/<suite>_report_<timestamp>.html`, creating `dir`
pub async fn write_html_report(dir: &Path, report: &SuiteReport) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let file_name = format!(
        "{}_report_{}.html",
        report.name,
        report.started_at.format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(file_name);

    let mut screenshots = Vec::with_capacity(report.results.len());
    for result in &report.results {
        screenshots.push(match &result.screenshot {
            Some(shot) => embed_png(shot).await,
            None => None,
        });
    }

    let html = render(report, &screenshots)?;
    tokio::fs::write(&path, html).await?;
    info!("Report written to {}", path.display());
    Ok(path)
}

async fn embed_png(path: &Path) -> Option<String> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Some(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(bytes)
        )),
        Err(e) => {
            warn!("Could not embed screenshot {}: {}", path.display(), e);
            None
        }
    }
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left;vertical-align:top}\
.passed{color:#2e7d32}.failed{color:#c62828}.error{color:#ef6c00}\
img{max-width:480px;display:block;margin-top:4px}";

fn render(report: &SuiteReport, screenshots: &[Option<String>]) -> Result<String> {
    let mut html = String::new();
    let title = format!("{} suite report", escape(&report.name));

    write_html(&mut html, format_args!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title>\
         <style>{STYLE}</style></head><body>\n<h1>{title}</h1>\n"
    ))?;
    write_html(&mut html, format_args!(
        "<p>Started {} &middot; {:.1}s &middot; {} passed, {} failed, {} errors</p>\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.duration.as_secs_f64(),
        report.count(Status::Passed),
        report.count(Status::Failed),
        report.count(Status::Error),
    ))?;

    html.push_str("<table>\n<tr><th>Scenario</th><th>Tags</th><th>Status</th><th>Duration</th><th>Details</th></tr>\n");
    for (result, screenshot) in report.results.iter().zip(screenshots) {
        render_row(&mut html, result, screenshot.as_deref())?;
    }
    html.push_str("</table>\n</body></html>\n");
    Ok(html)
}

fn render_row(html: &mut String, result: &ScenarioResult, screenshot: Option<&str>) -> Result<()> {
    let tags: Vec<&str> = result.tags.iter().map(|t| t.as_str()).collect();
    write_html(html, format_args!(
        "<tr><td>{}</td><td>{}</td><td class=\"{}\">{}</td><td>{:.2}s</td><td>",
        escape(&result.name),
        tags.join(", "),
        result.status.as_str().to_lowercase(),
        result.status.as_str(),
        result.duration.as_secs_f64(),
    ))?;
    if let Some(message) = &result.message {
        write_html(html, format_args!("<pre>{}</pre>", escape(message)))?;
    }
    if let Some(uri) = screenshot {
        write_html(html, format_args!(
            "<img alt=\"{}\" src=\"{}\">",
            escape(&result.name),
            uri
        ))?;
    }
    html.push_str("</td></tr>\n");
    Ok(())
}

fn write_html(html: &mut String, args: std::fmt::Arguments<'_>) -> Result<()> {
    html.write_fmt(args)
        .map_err(|e| Error::internal(format!("Failed to render report: {}", e)))
}

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
