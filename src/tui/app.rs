use anyhow::Result;
use crossterm::ExecutableCommand;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use scopeguard::defer;
use std::io::stdout;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::monitor::{Command, MonitorHandle, MonitorState};
use crate::state::{DisplayState, ViewMode};
use crate::tui::theme::Theme;
use crate::tui::views::{ChartsView, HelpView, RespondersView, TableView};

/// What a key press asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    Reset,
    View(ViewMode),
    NextView,
    CycleTheme,
    ToggleHelp,
}

/// Map a key press to an action. Unbound keys map to `None`.
pub fn key_action(code: KeyCode, modifiers: KeyModifiers) -> Option<KeyAction> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(KeyAction::Quit),
        KeyCode::Char('q') | KeyCode::Char('Q') => Some(KeyAction::Quit),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(KeyAction::Reset),
        KeyCode::Char('1') => Some(KeyAction::View(ViewMode::Table)),
        KeyCode::Char('2') => Some(KeyAction::View(ViewMode::Charts)),
        KeyCode::Char('3') => Some(KeyAction::View(ViewMode::Responders)),
        KeyCode::Tab => Some(KeyAction::NextView),
        KeyCode::Char('t') => Some(KeyAction::CycleTheme),
        KeyCode::Char('?') | KeyCode::Char('h') => Some(KeyAction::ToggleHelp),
        _ => None,
    }
}

/// UI state
#[derive(Default)]
pub struct UiState {
    /// Last view requested. The monitor's snapshot is authoritative while it
    /// runs; once it has stopped, switching is handled here alone.
    pub view: ViewMode,
    /// Show help overlay
    pub show_help: bool,
    /// Status message to display
    pub status_message: Option<(String, Instant)>,
    /// Current theme index
    pub theme_index: usize,
}

impl UiState {
    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Drop a status message older than three seconds. Returns true if one was dropped.
    pub fn clear_old_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message
            && time.elapsed() > Duration::from_secs(3)
        {
            self.status_message = None;
            return true;
        }
        false
    }

    /// Follow the view the monitor reports while it is still running
    pub fn sync_view(&mut self, state: &DisplayState) {
        if state.state != MonitorState::Stopped {
            self.view = state.view;
        }
    }

    /// View to draw for this snapshot
    pub fn active_view(&self, state: &DisplayState) -> ViewMode {
        if state.state == MonitorState::Stopped {
            self.view
        } else {
            state.view
        }
    }

    fn theme(&self) -> Theme {
        Theme::by_name(Theme::list()[self.theme_index % Theme::list().len()])
    }

    /// Apply a key action. Returns the command to forward to the monitor, if any.
    pub fn apply(&mut self, action: KeyAction) -> Option<Command> {
        match action {
            KeyAction::Quit => Some(Command::Quit),
            KeyAction::Reset => {
                self.set_status("Stats reset");
                Some(Command::ResetStatistics)
            }
            KeyAction::View(view) => {
                self.view = view;
                Some(Command::SwitchView(view))
            }
            KeyAction::NextView => {
                self.view = self.view.next();
                Some(Command::SwitchView(self.view))
            }
            KeyAction::CycleTheme => {
                self.theme_index = (self.theme_index + 1) % Theme::list().len();
                self.set_status(format!("Theme: {}", Theme::list()[self.theme_index]));
                None
            }
            KeyAction::ToggleHelp => {
                self.show_help = !self.show_help;
                None
            }
        }
    }
}

/// Settings the TUI ended with, for persistence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuiOutcome {
    pub theme: String,
    pub view: ViewMode,
}

/// Run the TUI until the user quits or `cancel` fires.
pub async fn run_tui(
    handle: MonitorHandle,
    cancel: CancellationToken,
    initial_view: ViewMode,
    initial_theme: Theme,
) -> Result<TuiOutcome> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    // Ensure terminal is restored on any exit (success, error, or panic)
    defer! {
        let _ = disable_raw_mode();
        let _ = stdout().execute(LeaveAlternateScreen);
    }

    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend)?;

    let theme_index = Theme::list()
        .iter()
        .position(|&name| name == initial_theme.name())
        .unwrap_or(0);

    let mut ui_state = UiState {
        view: initial_view,
        theme_index,
        ..Default::default()
    };

    // The history window follows the terminal width from the start.
    handle.send(Command::Resize(terminal.size()?.width));

    let tick_rate = Duration::from_millis(100);
    run_app(&mut terminal, handle, &mut ui_state, cancel, tick_rate).await?;

    Ok(TuiOutcome {
        theme: ui_state.theme().name().to_string(),
        view: ui_state.view,
    })
}

async fn run_app<B>(
    terminal: &mut Terminal<B>,
    mut handle: MonitorHandle,
    ui_state: &mut UiState,
    cancel: CancellationToken,
    tick_rate: Duration,
) -> Result<()>
where
    B: ratatui::backend::Backend,
{
    let mut snapshot = handle.latest();
    ui_state.sync_view(&snapshot);
    let mut dirty = true;

    loop {
        if cancel.is_cancelled() {
            break;
        }

        if ui_state.clear_old_status() {
            dirty = true;
        }

        if handle.has_changed() {
            snapshot = handle.latest();
            ui_state.sync_view(&snapshot);
            dirty = true;
        }

        if dirty {
            let theme = ui_state.theme();
            terminal.draw(|f| draw_ui(f, &snapshot, ui_state, &theme))?;
            dirty = false;
        }

        if event::poll(tick_rate)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    dirty = true;

                    // Any key closes the help overlay
                    if ui_state.show_help {
                        ui_state.show_help = false;
                        continue;
                    }

                    let Some(action) = key_action(key.code, key.modifiers) else {
                        continue;
                    };
                    if let Some(command) = ui_state.apply(action) {
                        handle.send(command);
                    }
                    if action == KeyAction::Quit {
                        break;
                    }
                }
                Event::Resize(width, _) => {
                    handle.send(Command::Resize(width));
                    dirty = true;
                }
                _ => {}
            }
        }

        // Input polling blocks this worker; let the monitor task run.
        tokio::task::yield_now().await;
    }

    Ok(())
}

fn header_line(state: &DisplayState, theme: &Theme) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            " hopwatch ",
            Style::default()
                .fg(theme.header_fg)
                .bg(theme.header_bg)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " traceroute to {}, {} hops max \u{2500}\u{2500} {} samples \u{2500}\u{2500} {} rounds",
            state.target, state.max_hops, state.counters.processed, state.counters.rounds
        )),
    ];
    if state.counters.route_changes > 0 {
        spans.push(Span::styled(
            format!(" \u{2500}\u{2500} {} route changes", state.counters.route_changes),
            Style::default().fg(theme.warning),
        ));
    }
    if state.state == MonitorState::Stopped {
        spans.push(Span::styled(
            " [stopped]",
            Style::default().fg(theme.text_dim),
        ));
    }
    Line::from(spans)
}

pub(crate) fn draw_ui(
    f: &mut ratatui::Frame,
    state: &DisplayState,
    ui_state: &UiState,
    theme: &Theme,
) {
    let area = f.area();

    // Layout: header + key menu + main view + status bar
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    f.render_widget(Paragraph::new(header_line(state, theme)), chunks[0]);

    let menu = Line::from(vec![
        Span::raw(" Press "),
        Span::styled("[q]", Style::default().fg(theme.shortcut)),
        Span::raw(" to quit, "),
        Span::styled("[r]", Style::default().fg(theme.shortcut)),
        Span::raw(" to reset statistics, "),
        Span::styled("[1,2,3]", Style::default().fg(theme.shortcut)),
        Span::raw(" to change display mode"),
    ]);
    f.render_widget(Paragraph::new(menu), chunks[1]);

    let view = ui_state.active_view(state);
    match view {
        ViewMode::Table => f.render_widget(TableView::new(state, theme), chunks[2]),
        ViewMode::Charts => f.render_widget(ChartsView::new(state, theme), chunks[2]),
        ViewMode::Responders => f.render_widget(RespondersView::new(state, theme), chunks[2]),
    }

    let status_text = if let Some((ref msg, _)) = ui_state.status_message {
        msg.clone()
    } else {
        format!(
            "view: {} | theme: {} | t theme | Tab next view | ? help",
            view.label(),
            theme.name()
        )
    };
    let status_bar = Paragraph::new(status_text).style(Style::default().fg(theme.text_dim));
    f.render_widget(status_bar, chunks[3]);

    if ui_state.show_help {
        f.render_widget(HelpView::new(theme), area);
    }
}
