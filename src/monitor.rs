//! The monitor: folds the sample stream into the route table and history,
//! keeps the display projection current, and handles user commands.
//!
//! [`Monitor`] is the synchronous state machine. [`MonitorLoop`] drives it
//! from a sample channel and a command queue on a single task, so none of the
//! owned state needs a lock. Snapshots go out through a `watch` channel.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::state::{DisplayState, HistoryWindow, RouteTable, Sample, ViewMode};

/// Lifecycle of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Running,
    /// Only observable while a reset is in progress
    Resetting,
    Stopped,
}

/// Commands from the presentation surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    ResetStatistics,
    SwitchView(ViewMode),
    /// New terminal width in columns
    Resize(u16),
}

/// Why the monitor stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The producer closed the sample channel
    StreamClosed,
    /// The user asked to quit
    Quit,
    /// Cancelled from outside (e.g. Ctrl+C)
    Cancelled,
}

/// Read-only view published to the surface
pub type Snapshot = Arc<DisplayState>;

/// Synchronous core of the monitor
#[derive(Debug, Clone)]
pub struct Monitor {
    state: MonitorState,
    routes: RouteTable,
    history: HistoryWindow,
    display: DisplayState,
}

impl Monitor {
    pub fn new(config: &Config) -> Self {
        let history = HistoryWindow::for_width(config.width);
        let display = DisplayState::new(
            config.target.clone(),
            config.max_hops,
            config.width,
            config.view,
        );
        Self {
            state: MonitorState::Running,
            routes: RouteTable::new(config.max_hops),
            history,
            display,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn history(&self) -> &HistoryWindow {
        &self.history
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    /// Fold a sample in, stamping history points with the current time
    pub fn apply_sample(&mut self, sample: &Sample) -> bool {
        self.apply_sample_at(sample, Local::now())
    }

    /// Fold a sample in. Returns false if it was ignored (out-of-range hop,
    /// or the monitor is stopped).
    pub fn apply_sample_at(&mut self, sample: &Sample, at: DateTime<Local>) -> bool {
        if self.state == MonitorState::Stopped {
            return false;
        }

        let identity = sample.identity();
        let rtt = sample.rtt_ms();
        let observed = u8::try_from(sample.hop).ok().and_then(|hop| {
            self.routes
                .observe(hop, &identity, rtt, sample.asn.as_ref())
                .map(|observation| (hop, observation))
        });
        let Some((hop, observation)) = observed else {
            self.display.counters.dropped += 1;
            tracing::debug!(
                hop = sample.hop,
                max_hops = self.routes.max_hops(),
                "dropping sample with out-of-range hop"
            );
            return false;
        };

        self.display.counters.processed += 1;
        if observation.route_changed {
            self.display.counters.route_changes += 1;
        }
        if let Some(route) = self.routes.hop(hop) {
            self.display.project_hop(route);
        }

        if sample.last {
            self.display.counters.rounds += 1;
            self.display.dest_hop = Some(hop);

            // Lost destination samples leave no point on the chart
            if let Some(rtt) = rtt {
                self.history.append(rtt, at.format("%M:%S").to_string());
                self.display.set_history(&self.history);
            }

            // Trailing hops left over from a longer round
            self.routes.clear_beyond(hop);
            self.display.project_beyond(&self.routes, hop);
        }

        true
    }

    /// Apply a user command. Returns the stop reason if the command stopped
    /// the monitor.
    pub fn apply_command(&mut self, command: Command) -> Option<StopReason> {
        if self.state == MonitorState::Stopped {
            tracing::debug!(?command, "ignoring command, monitor stopped");
            return None;
        }

        match command {
            Command::Quit => {
                self.stop();
                return Some(StopReason::Quit);
            }
            Command::ResetStatistics => self.reset(),
            Command::SwitchView(view) => {
                self.display.view = view;
            }
            Command::Resize(width) => {
                self.display.width = width;
                self.history
                    .resize(HistoryWindow::capacity_for_width(width));
                self.display.set_history(&self.history);
            }
        }
        None
    }

    /// Zero all statistics, identities, history and loss bars
    pub fn reset(&mut self) {
        self.state = MonitorState::Resetting;
        self.display.state = MonitorState::Resetting;

        self.routes.reset();
        self.history.clear();
        self.display.dest_hop = None;
        self.display.counters.route_changes = 0;
        self.display.counters.rounds = 0;
        self.display.project_all(&self.routes, &self.history);

        self.state = MonitorState::Running;
        self.display.state = MonitorState::Running;
        tracing::info!("statistics reset");
    }

    /// Move to `Stopped`. Returns false if already stopped.
    pub fn stop(&mut self) -> bool {
        if self.state == MonitorState::Stopped {
            return false;
        }
        self.state = MonitorState::Stopped;
        self.display.state = MonitorState::Stopped;
        true
    }

    /// Take a snapshot for publishing
    pub fn snapshot(&mut self) -> Snapshot {
        self.display.generation += 1;
        Arc::new(self.display.clone())
    }
}

/// Surface-side handle: send commands, observe snapshots
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<Snapshot>,
}

impl MonitorHandle {
    /// Queue a command. Returns false once the monitor has gone away.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Latest snapshot, marking it as seen
    pub fn latest(&mut self) -> Snapshot {
        self.snapshots.borrow_and_update().clone()
    }

    /// A snapshot newer than the last one seen is waiting
    pub fn has_changed(&self) -> bool {
        self.snapshots.has_changed().unwrap_or(false)
    }

    /// Wait for the next snapshot. Returns false once the monitor has exited.
    pub async fn changed(&mut self) -> bool {
        self.snapshots.changed().await.is_ok()
    }
}

/// Drives a [`Monitor`] from the sample stream and the command queue
pub struct MonitorLoop {
    monitor: Monitor,
    samples: mpsc::Receiver<Sample>,
    commands: mpsc::UnboundedReceiver<Command>,
    snapshots: watch::Sender<Snapshot>,
    /// Per-round snapshots, only when someone asked for them
    rounds: Option<mpsc::Sender<Snapshot>>,
    cancel: CancellationToken,
}

/// Completed-round snapshots buffered for a round subscriber
pub const ROUND_QUEUE_DEPTH: usize = 64;

impl MonitorLoop {
    pub fn new(
        mut monitor: Monitor,
        samples: mpsc::Receiver<Sample>,
        cancel: CancellationToken,
    ) -> (Self, MonitorHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(monitor.snapshot());

        let monitor_loop = Self {
            monitor,
            samples,
            commands: command_rx,
            snapshots: snapshot_tx,
            rounds: None,
            cancel,
        };
        let handle = MonitorHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        };
        (monitor_loop, handle)
    }

    /// Receive one snapshot per completed round, in order. Unlike the
    /// `watch` snapshots these are never coalesced: once the queue is full
    /// the loop waits for the reader before taking more samples.
    pub fn subscribe_rounds(&mut self) -> mpsc::Receiver<Snapshot> {
        let (tx, rx) = mpsc::channel(ROUND_QUEUE_DEPTH);
        self.rounds = Some(tx);
        rx
    }

    /// Run until the stream closes, the user quits, or the token is cancelled.
    /// Returns the final monitor along with the reason.
    pub async fn run(mut self) -> (StopReason, Monitor) {
        tracing::info!(max_hops = self.monitor.routes().max_hops(), "monitor running");
        let mut commands_open = true;

        let reason = loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break StopReason::Cancelled,

                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => {
                        let stopped = self.monitor.apply_command(command);
                        self.publish();
                        if let Some(reason) = stopped {
                            break reason;
                        }
                    }
                    // Surface gone; keep consuming samples
                    None => commands_open = false,
                },

                sample = self.samples.recv() => match sample {
                    Some(sample) => {
                        let rounds = self.monitor.display().counters.rounds;
                        self.monitor.apply_sample(&sample);
                        self.publish();
                        if self.monitor.display().counters.rounds > rounds {
                            self.deliver_round().await;
                        }
                    }
                    None => break StopReason::StreamClosed,
                },
            }
        };

        self.shutdown(reason);
        (reason, self.monitor)
    }

    /// Runs exactly once, after the loop exits
    fn shutdown(&mut self, reason: StopReason) {
        self.monitor.stop();

        // Quit is the only path that has not yet signalled upstream
        if reason == StopReason::Quit {
            self.cancel.cancel();
        }
        self.samples.close();
        self.publish();
        self.rounds = None;

        let counters = self.monitor.display().counters;
        tracing::info!(
            ?reason,
            processed = counters.processed,
            dropped = counters.dropped,
            rounds = counters.rounds,
            "monitor stopped"
        );
    }

    fn publish(&mut self) {
        self.snapshots.send_replace(self.monitor.snapshot());
    }

    async fn deliver_round(&mut self) {
        let Some(tx) = self.rounds.clone() else {
            return;
        };
        let snapshot = self.snapshots.borrow().clone();
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            result = tx.send(snapshot) => {
                if result.is_err() {
                    tracing::debug!("round subscriber gone");
                    self.rounds = None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{HopIdentity, HostMark};
    use chrono::TimeZone;

    fn test_config() -> Config {
        Config {
            width: 30,
            ..Config::default()
        }
    }

    fn at(sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 1, 1, 12, 0, sec).unwrap()
    }

    #[test]
    fn test_two_samples_same_hop() {
        let mut monitor = Monitor::new(&test_config());
        monitor.apply_sample(&Sample::reply(1, "r1", 10.0));
        monitor.apply_sample(&Sample::reply(1, "r1", 20.0));

        let stats = &monitor.routes().hop(1).unwrap().stats;
        assert_eq!(stats.count(), 2);
        assert_eq!(stats.avg(), Some(15.0));
        assert_eq!(stats.min(), Some(10.0));
        assert_eq!(stats.max(), Some(20.0));
        assert_eq!(stats.loss_count(), 0);

        let row = monitor.display().row(1).unwrap();
        assert_eq!(row.avg, "15.00");
        assert_eq!(row.sent, 2);
    }

    #[test]
    fn test_unanswered_hop() {
        let mut monitor = Monitor::new(&test_config());
        monitor.apply_sample(&Sample::timeout(3));

        let route = monitor.routes().hop(3).unwrap();
        assert_eq!(route.displayed, Some(HopIdentity::Unknown));
        assert_eq!(route.stats.loss_count(), 1);
        assert!(route.responders.is_empty());
        assert_eq!(monitor.display().row(3).unwrap().mark, HostMark::Pending);
    }

    #[test]
    fn test_route_change_counted() {
        let mut monitor = Monitor::new(&test_config());
        monitor.apply_sample(&Sample::reply(2, "a", 1.0));
        monitor.apply_sample(&Sample::reply(2, "b", 1.0));
        monitor.apply_sample(&Sample::reply(2, "b", 1.0));

        assert_eq!(monitor.display().counters.route_changes, 1);
        assert_eq!(monitor.display().row(2).unwrap().host, "b");
    }

    #[test]
    fn test_history_keeps_latest_rounds() {
        // width 30 -> capacity 5
        let mut monitor = Monitor::new(&test_config());
        for i in 1..=7u32 {
            monitor.apply_sample_at(&Sample::reply(1, "dst", i as f64).with_last(), at(i));
        }

        let values: Vec<_> = monitor.history().iter().map(|p| p.rtt_ms).collect();
        assert_eq!(values, vec![3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(monitor.display().history.len(), 5);
        assert_eq!(monitor.display().history[0].label, "00:03");
        assert_eq!(monitor.display().counters.rounds, 7);
    }

    #[test]
    fn test_intermediate_hops_do_not_feed_history() {
        let mut monitor = Monitor::new(&test_config());
        monitor.apply_sample(&Sample::reply(1, "r1", 1.0));
        monitor.apply_sample(&Sample::reply(2, "r2", 2.0));
        assert!(monitor.history().is_empty());

        // Lost destination sample completes the round without a point
        monitor.apply_sample(&Sample::timeout(3).with_last());
        assert!(monitor.history().is_empty());
        assert_eq!(monitor.display().dest_hop, Some(3));
    }

    #[test]
    fn test_final_hop_clears_trailing_identities() {
        let mut monitor = Monitor::new(&test_config());
        for hop in 1..=5 {
            monitor.apply_sample(&Sample::reply(hop, format!("r{}", hop), 1.0));
        }
        monitor.apply_sample(&Sample::reply(3, "r3", 1.0).with_last());

        let display = monitor.display();
        assert_eq!(display.row(3).unwrap().host, "r3");
        assert_eq!(display.row(4).unwrap().mark, HostMark::Blank);
        assert_eq!(display.row(5).unwrap().host, "");
        // Statistics for trailing hops are kept
        assert_eq!(display.row(5).unwrap().sent, 1);
        assert_eq!(display.visible_rows().count(), 3);
    }

    #[test]
    fn test_out_of_range_sample_dropped() {
        let mut monitor = Monitor::new(&Config {
            max_hops: 10,
            ..test_config()
        });

        assert!(!monitor.apply_sample(&Sample::reply(0, "x", 1.0)));
        assert!(!monitor.apply_sample(&Sample::reply(11, "x", 1.0)));
        assert!(monitor.apply_sample(&Sample::reply(10, "x", 1.0)));
        assert!(!monitor.apply_sample(&Sample {
            hop: 300,
            ..Sample::timeout(1)
        }));
        assert!(!monitor.apply_sample(&Sample {
            hop: -1,
            ..Sample::timeout(1)
        }));

        let counters = monitor.display().counters;
        assert_eq!(counters.dropped, 4);
        assert_eq!(counters.processed, 1);
    }

    #[test]
    fn test_reset_twice_same_as_once() {
        let mut monitor = Monitor::new(&test_config());
        monitor.apply_sample(&Sample::reply(1, "a", 1.0));
        monitor.apply_sample(&Sample::reply(1, "b", 2.0));
        monitor.apply_sample(&Sample::timeout(2).with_last());
        monitor.apply_sample(&Sample::reply(2, "d", 9.0).with_last());

        monitor.apply_command(Command::ResetStatistics);
        let once = monitor.display().clone();
        monitor.apply_command(Command::ResetStatistics);

        assert_eq!(monitor.display(), &once);
        assert_eq!(monitor.state(), MonitorState::Running);
        assert!(once.loss_series.is_empty());
        assert!(once.history.is_empty());
        assert_eq!(once.visible_rows().count(), 0);
        assert!(monitor.routes().hops().all(|h| h.displayed.is_none()));
    }

    #[test]
    fn test_switch_view_and_resize() {
        let mut monitor = Monitor::new(&Config {
            width: 40,
            ..test_config()
        });
        for i in 0..10 {
            monitor.apply_sample(&Sample::reply(1, "d", i as f64 + 1.0).with_last());
        }
        assert_eq!(monitor.history().len(), 10);

        monitor.apply_command(Command::SwitchView(ViewMode::Charts));
        assert_eq!(monitor.display().view, ViewMode::Charts);

        monitor.apply_command(Command::Resize(30));
        assert_eq!(monitor.display().width, 30);
        assert_eq!(monitor.history().capacity(), 5);
        assert_eq!(monitor.display().history.len(), 5);
        assert_eq!(monitor.display().history[0].rtt_ms, 6.0);

        // Statistics untouched
        assert_eq!(monitor.routes().hop(1).unwrap().stats.count(), 10);
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut monitor = Monitor::new(&test_config());
        assert_eq!(monitor.apply_command(Command::Quit), Some(StopReason::Quit));
        assert_eq!(monitor.state(), MonitorState::Stopped);

        assert!(!monitor.apply_sample(&Sample::reply(1, "r1", 1.0)));
        assert_eq!(monitor.apply_command(Command::Quit), None);
        monitor.apply_command(Command::ResetStatistics);
        monitor.apply_command(Command::SwitchView(ViewMode::Charts));

        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert_eq!(monitor.display().view, ViewMode::Table);
        assert_eq!(monitor.display().counters.processed, 0);
        assert!(!monitor.stop());
    }

    #[tokio::test]
    async fn test_loop_stops_when_stream_closes() {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let (monitor_loop, mut handle) =
            MonitorLoop::new(Monitor::new(&test_config()), rx, cancel.clone());
        let task = tokio::spawn(monitor_loop.run());

        tx.send(Sample::reply(1, "r1", 10.0)).await.unwrap();
        tx.send(Sample::reply(1, "r1", 20.0)).await.unwrap();
        drop(tx);

        let (reason, monitor) = task.await.unwrap();
        assert_eq!(reason, StopReason::StreamClosed);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(!cancel.is_cancelled());

        let snapshot = handle.latest();
        assert_eq!(snapshot.state, MonitorState::Stopped);
        assert_eq!(snapshot.counters.processed, 2);
        assert_eq!(snapshot.row(1).unwrap().avg, "15.00");

        // Sender side is gone with the loop
        assert!(!handle.send(Command::ResetStatistics));
    }

    #[tokio::test]
    async fn test_quit_cancels_and_closes_stream() {
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let (monitor_loop, handle) =
            MonitorLoop::new(Monitor::new(&test_config()), rx, cancel.clone());

        assert!(handle.send(Command::Quit));
        let (reason, _) = monitor_loop.run().await;

        assert_eq!(reason, StopReason::Quit);
        assert!(cancel.is_cancelled());
        assert!(tx.send(Sample::reply(1, "r1", 1.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_external_cancel_stops_loop() {
        let (_tx, rx) = mpsc::channel::<Sample>(16);
        let cancel = CancellationToken::new();
        let (monitor_loop, mut handle) =
            MonitorLoop::new(Monitor::new(&test_config()), rx, cancel.clone());

        cancel.cancel();
        let (reason, _) = monitor_loop.run().await;
        assert_eq!(reason, StopReason::Cancelled);
        assert_eq!(handle.latest().state, MonitorState::Stopped);
    }

    #[tokio::test]
    async fn test_commands_interleave_with_samples() {
        let (tx, rx) = mpsc::channel(16);
        let (monitor_loop, mut handle) =
            MonitorLoop::new(Monitor::new(&test_config()), rx, CancellationToken::new());
        let task = tokio::spawn(monitor_loop.run());

        tx.send(Sample::reply(1, "r1", 5.0)).await.unwrap();
        while handle.latest().counters.processed < 1 {
            assert!(handle.changed().await);
        }

        handle.send(Command::ResetStatistics);
        handle.send(Command::SwitchView(ViewMode::Responders));
        while handle.latest().view != ViewMode::Responders {
            assert!(handle.changed().await);
        }

        let snapshot = handle.latest();
        assert_eq!(snapshot.visible_rows().count(), 0);

        drop(tx);
        let (reason, _) = task.await.unwrap();
        assert_eq!(reason, StopReason::StreamClosed);
    }

    #[tokio::test]
    async fn test_round_subscriber_sees_every_round() {
        let (tx, rx) = mpsc::channel(16);
        let (mut monitor_loop, _handle) =
            MonitorLoop::new(Monitor::new(&test_config()), rx, CancellationToken::new());
        let mut rounds = monitor_loop.subscribe_rounds();
        let task = tokio::spawn(monitor_loop.run());

        // More rounds than the queue holds, sent without pause
        let total = ROUND_QUEUE_DEPTH as u64 + 20;
        let producer = tokio::spawn(async move {
            for i in 0..total {
                tx.send(Sample::reply(1, "gw", 1.0)).await.unwrap();
                tx.send(Sample::reply(2, "d", i as f64 + 1.0).with_last())
                    .await
                    .unwrap();
            }
        });

        let mut seen = Vec::new();
        while let Some(snapshot) = rounds.recv().await {
            seen.push(snapshot.counters.rounds);
        }
        producer.await.unwrap();

        assert_eq!(seen, (1..=total).collect::<Vec<_>>());
        let (reason, _) = task.await.unwrap();
        assert_eq!(reason, StopReason::StreamClosed);
    }

    #[tokio::test]
    async fn test_surface_exit_after_quit_keeps_quit_reason() {
        let (_tx, rx) = mpsc::channel::<Sample>(16);
        let cancel = CancellationToken::new();
        let (monitor_loop, handle) =
            MonitorLoop::new(Monitor::new(&test_config()), rx, cancel.clone());
        let task = tokio::spawn(monitor_loop.run());

        // The surface sends Quit and goes away without touching the token
        assert!(handle.send(Command::Quit));
        drop(handle);

        let (reason, monitor) = task.await.unwrap();
        assert_eq!(reason, StopReason::Quit);
        assert_eq!(monitor.state(), MonitorState::Stopped);
        assert!(cancel.is_cancelled());
    }
}
