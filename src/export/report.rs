use std::io::Write;
use tokio::sync::mpsc;

use crate::monitor::Snapshot;
use crate::state::{DisplayState, HostMark};

/// Host column text for non-interactive output
fn host_cell(host: &str, mark: HostMark, changed: bool) -> String {
    match mark {
        HostMark::Blank => String::new(),
        HostMark::Pending => "???".to_string(),
        HostMark::Identified if changed => format!("{} (changed)", host),
        HostMark::Identified => host.to_string(),
        HostMark::TimedOut => format!("{} (timeout)", host),
    }
}

/// Generate a text report similar to mtr --report
pub fn generate_report<W: Write>(state: &DisplayState, mut writer: W) -> std::io::Result<()> {
    writeln!(
        writer,
        "hopwatch report for {}, {} hops max",
        state.target, state.max_hops
    )?;
    writeln!(
        writer,
        "Samples: {} processed, {} dropped, {} rounds, {} route changes",
        state.counters.processed,
        state.counters.dropped,
        state.counters.rounds,
        state.counters.route_changes
    )?;
    writeln!(writer)?;

    writeln!(
        writer,
        "{:>3}  {:<40} {:<16} {:>6} {:>6} {:>8} {:>8} {:>8} {:>8}",
        "#", "Host", "ASN", "Loss%", "Sent", "Last", "Avg", "Best", "Wrst"
    )?;
    writeln!(writer, "{}", "-".repeat(112))?;

    for row in state.visible_rows() {
        writeln!(
            writer,
            "{:>3}  {:<40} {:<16} {:>6} {:>6} {:>8} {:>8} {:>8} {:>8}",
            row.hop,
            host_cell(&row.host, row.mark, row.changed),
            row.asn,
            row.loss,
            row.sent,
            row.last,
            row.avg,
            row.min,
            row.max
        )?;
    }

    Ok(())
}

/// Generate report to string
pub fn generate_report_string(state: &DisplayState) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail
    let _ = generate_report(state, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Print a report for every completed-round snapshot until the monitor
/// stops. Returns the number of reports written.
pub async fn write_round_reports<W: Write>(
    mut rounds: mpsc::Receiver<Snapshot>,
    mut writer: W,
) -> std::io::Result<u64> {
    let mut written = 0;
    while let Some(snapshot) = rounds.recv().await {
        generate_report(&snapshot, &mut writer)?;
        writeln!(writer)?;
        writer.flush()?;
        written += 1;
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::monitor::{Monitor, MonitorLoop};
    use crate::state::Sample;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_report_lists_visible_hops() {
        let mut monitor = Monitor::new(&Config {
            target: "example.net".into(),
            ..Config::default()
        });
        monitor.apply_sample(&Sample::reply(1, "gw", 1.0));
        monitor.apply_sample(&Sample::timeout(2));
        monitor.apply_sample(&Sample::reply(3, "example.net", 12.0).with_last());

        let report = generate_report_string(monitor.display());
        assert!(report.starts_with("hopwatch report for example.net, 64 hops max"));
        assert!(report.contains("3 processed, 0 dropped, 1 rounds"));

        let lines: Vec<_> = report.lines().skip(5).collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("gw"));
        assert!(lines[1].contains("???"));
        assert!(lines[1].contains("100.0"));
        assert!(lines[2].contains("12.00"));
    }

    #[test]
    fn test_host_cell_markers() {
        assert_eq!(host_cell("r1", HostMark::TimedOut, false), "r1 (timeout)");
        assert_eq!(host_cell("r2", HostMark::Identified, true), "r2 (changed)");
        assert_eq!(host_cell("x", HostMark::Blank, false), "");
    }

    #[tokio::test]
    async fn test_one_report_per_round_without_pacing() {
        let (tx, rx) = mpsc::channel(1024);
        for i in 0..50 {
            tx.send(Sample::reply(1, "gw", 1.0)).await.unwrap();
            tx.send(Sample::reply(2, "example.net", i as f64 + 1.0).with_last())
                .await
                .unwrap();
        }
        drop(tx);

        let (mut monitor_loop, _handle) =
            MonitorLoop::new(Monitor::new(&Config::default()), rx, CancellationToken::new());
        let rounds = monitor_loop.subscribe_rounds();
        let task = tokio::spawn(monitor_loop.run());

        let mut out = Vec::new();
        let written = write_round_reports(rounds, &mut out).await.unwrap();
        task.await.unwrap();

        assert_eq!(written, 50);
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.matches("hopwatch report for").count(), 50);
        assert!(out.contains(" 1 rounds,"));
        assert!(out.contains(" 50 rounds,"));
    }
}
