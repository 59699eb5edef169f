use anyhow::Result;
use prettytable::format::consts::FORMAT_CLEAN;
use prettytable::{Table, row};

use crate::load::Report;

pub fn print_table(reports: &[Report]) {
    let mut table = Table::new();
    table.set_format(*FORMAT_CLEAN);
    table.set_titles(row![b => "URL", "Status", "Size", "Elapsed", "Details"]);

    for report in reports {
        let size = report.size.map(|size| size.to_string()).unwrap_or_default();
        let details = match (&report.error, &report.path) {
            (Some(error), _) => error.clone(),
            (None, Some(path)) => path.display().to_string(),
            (None, None) => String::new(),
        };

        table.add_row(row![
            report.url,
            report.status,
            r->size,
            r->format!("{}ms", report.elapsed.as_millis()),
            details
        ]);
    }

    table.printstd();
}

pub fn print_json(reports: &[Report]) -> Result<()> {
    let stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(stdout, reports)?;
    println!();
    Ok(())
}
