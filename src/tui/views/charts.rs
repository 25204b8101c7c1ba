use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph, Widget,
};

use crate::state::DisplayState;
use crate::tui::theme::Theme;

/// Destination RTT history on top, per-hop loss bars below
pub struct ChartsView<'a> {
    state: &'a DisplayState,
    theme: &'a Theme,
}

impl<'a> ChartsView<'a> {
    pub fn new(state: &'a DisplayState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn render_history(&self, area: Rect, buf: &mut Buffer) {
        let title = format!(
            " Destination RTT ({}/{}) ",
            self.state.history.len(),
            self.state.history_capacity
        );
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        if self.state.history.is_empty() {
            Paragraph::new("No data yet...")
                .block(block)
                .style(Style::default().fg(self.theme.text_dim))
                .render(area, buf);
            return;
        }

        let data: Vec<(f64, f64)> = self
            .state
            .history
            .iter()
            .enumerate()
            .map(|(i, point)| (i as f64, point.rtt_ms))
            .collect();

        let max_x = (data.len().saturating_sub(1) as f64).max(1.0);
        let max_y = data.iter().map(|(_, y)| *y).fold(f64::NEG_INFINITY, f64::max).max(1.0);
        let chart_max_y = max_y * 1.1;

        let first_label = self.state.history.first().map(|p| p.label.clone()).unwrap_or_default();
        let last_label = self.state.history.last().map(|p| p.label.clone()).unwrap_or_default();

        let dataset = vec![
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(self.theme.line))
                .data(&data),
        ];

        Chart::new(dataset)
            .block(block)
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(self.theme.text_dim))
                    .bounds([0.0, max_x])
                    .labels(vec![Span::raw(first_label), Span::raw(last_label)]),
            )
            .y_axis(
                Axis::default()
                    .title("ms")
                    .style(Style::default().fg(self.theme.text_dim))
                    .bounds([0.0, chart_max_y])
                    .labels(vec![
                        Span::raw("0.0"),
                        Span::raw(format!("{:.1}", chart_max_y)),
                    ]),
            )
            .render(area, buf);
    }

    fn render_loss(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Loss% per hop ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        if self.state.loss_series.is_empty() {
            Paragraph::new("No data yet...")
                .block(block)
                .style(Style::default().fg(self.theme.text_dim))
                .render(area, buf);
            return;
        }

        let bars: Vec<Bar> = self
            .state
            .loss_series
            .iter()
            .map(|bar| {
                Bar::default()
                    .value(bar.loss_pct.round() as u64)
                    .text_value(format!("{:.0}", bar.loss_pct))
                    .label(Line::from(bar.label.clone()))
                    .style(Style::default().fg(self.theme.bar))
                    .value_style(Style::default().fg(self.theme.bar_value))
            })
            .collect();

        BarChart::default()
            .block(block)
            .data(BarGroup::default().bars(&bars))
            .max(100)
            .bar_width(4)
            .bar_gap(1)
            .render(area, buf);
    }
}

impl Widget for ChartsView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(area);

        self.render_history(chunks[0], buf);
        self.render_loss(chunks[1], buf);
    }
}
