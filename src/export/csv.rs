use anyhow::Result;
use std::io::Write;

use crate::state::{DisplayState, HostMark};

/// Export the hop table to CSV, one line per responder
pub fn export_csv<W: Write>(state: &DisplayState, mut writer: W) -> Result<()> {
    writeln!(
        writer,
        "hop,host,state,responder,current,asn,sent,loss_pct,avg_ms,min_ms,max_ms"
    )?;

    for row in state.visible_rows() {
        let mark = match row.mark {
            HostMark::Blank => "",
            HostMark::Pending => "pending",
            HostMark::Identified => "ok",
            HostMark::TimedOut => "timeout",
        };

        // Hop summary line
        writeln!(
            writer,
            "{},{},{},,,{},{},{},{},{},{}",
            row.hop,
            escape_csv(&row.host),
            mark,
            escape_csv(&row.asn),
            row.sent,
            row.loss,
            csv_ms(&row.avg),
            csv_ms(&row.min),
            csv_ms(&row.max)
        )?;

        for responder in &row.responders {
            writeln!(
                writer,
                "{},,,{},{},{},{},{},{},{},{}",
                row.hop,
                escape_csv(&responder.identity),
                responder.current,
                escape_csv(&responder.asn),
                responder.count,
                responder.loss,
                csv_ms(&responder.avg),
                csv_ms(&responder.min),
                csv_ms(&responder.max)
            )?;
        }
    }

    Ok(())
}

/// Absent latencies are empty cells
fn csv_ms(value: &str) -> &str {
    if value == "-" { "" } else { value }
}

/// Escape a string for CSV (quote if contains comma, quote, or newline)
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
