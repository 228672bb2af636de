//! Terminal rendering for pass reports and registry listings.

use crawl_core::{PassReport, Target, UnitStatus};
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One row per unit in registry order, then the failures with their reasons.
pub fn print_report(report: &PassReport) {
    if report.is_empty() {
        println!("Registry is empty. Nothing crawled.");
        return;
    }

    let rows = report
        .outcomes
        .iter()
        .map(|o| {
            let status = match &o.status {
                UnitStatus::Succeeded => "ok",
                UnitStatus::Failed { .. } => "failed",
                UnitStatus::Panicked { .. } => "panicked",
            };
            vec![o.target.clone(), status.to_string(), format!("{}ms", o.elapsed_ms)]
        })
        .collect::<Vec<_>>();
    print!("{}", render_table(&["TARGET", "STATUS", "ELAPSED"], &rows));

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("Failures:");
        for o in failures {
            let reason = match &o.status {
                UnitStatus::Failed { reason } | UnitStatus::Panicked { reason } => {
                    reason.as_str()
                }
                UnitStatus::Succeeded => "",
            };
            println!("  {}: {reason}", o.target);
        }
    }

    println!();
    println!(
        "{} targets: {} ok, {} failed",
        report.len(),
        report.succeeded(),
        report.failed()
    );
}

pub fn print_targets(targets: &[Target]) {
    let rows = targets
        .iter()
        .map(|t| {
            vec![
                t.name.clone(),
                t.url.clone(),
                t.last_run_at
                    .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".into()),
                t.last_status.clone().unwrap_or_else(|| "-".into()),
                t.consecutive_failures.to_string(),
                t.documents_indexed.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    print!(
        "{}",
        render_table(
            &["NAME", "URL", "LAST RUN", "STATUS", "FAILURES", "INDEXED"],
            &rows,
        )
    );
}

/// Left-aligned columns sized by character count. The last column is not
/// padded so long URLs or reasons do not leave trailing blanks.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = render_line(&widths, headers.iter());
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&render_line(&widths, rule.iter()));
    for row in rows {
        out.push_str(&render_line(&widths, row.iter()));
    }
    out
}

fn render_line<S: AsRef<str>>(widths: &[usize], cells: impl Iterator<Item = S>) -> String {
    let mut out = String::new();
    for (i, cell) in cells.enumerate() {
        let cell = cell.as_ref();
        if i > 0 {
            out.push_str("  ");
        }
        out.push_str(cell);
        if i + 1 < widths.len() {
            let pad = widths[i].saturating_sub(cell.chars().count());
            out.extend(std::iter::repeat(' ').take(pad));
        }
    }
    out.truncate(out.trim_end().len());
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_aligns_on_character_width() {
        let rows = vec![
            vec!["뉴스".to_string(), "ok".to_string(), "12ms".to_string()],
            vec!["blog".to_string(), "failed".to_string(), "3ms".to_string()],
        ];
        let out = render_table(&["TARGET", "STATUS", "ELAPSED"], &rows);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "TARGET  STATUS  ELAPSED");
        assert_eq!(lines[1], "------  ------  -------");
        assert_eq!(lines[2], "뉴스      ok      12ms");
        assert_eq!(lines[3], "blog    failed  3ms");
    }

    #[test]
    fn table_with_no_rows_has_header_and_rule() {
        let out = render_table(&["NAME", "URL"], &[]);
        assert_eq!(out, "NAME  URL\n----  ---\n");
    }
}
