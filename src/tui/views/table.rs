use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style, Stylize};
use ratatui::widgets::{Block, Borders, Cell, Row, Table, Widget};

use crate::state::{DisplayState, HopRow, HostMark};
use crate::tui::theme::Theme;

/// Truncate a string to max_len characters, adding ellipsis if truncated
pub(crate) fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 1).collect();
        format!("{}…", truncated)
    }
}

/// Per-hop statistics table
pub struct TableView<'a> {
    state: &'a DisplayState,
    theme: &'a Theme,
}

impl<'a> TableView<'a> {
    pub fn new(state: &'a DisplayState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }

    fn host_style(&self, row: &HopRow) -> Style {
        let mut style = match row.mark {
            HostMark::TimedOut => Style::default().fg(self.theme.error),
            HostMark::Pending | HostMark::Blank => Style::default().fg(self.theme.text_dim),
            HostMark::Identified => Style::default().fg(self.theme.text),
        };
        if row.changed {
            style = style.add_modifier(Modifier::BOLD);
        }
        style
    }
}

impl Widget for TableView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Hops ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        let inner = block.inner(area);
        block.render(area, buf);

        let header = Row::new(
            ["#", "Host", "ASN", "Loss%", "Sent", "Last", "Avg", "Best", "Wrst"]
                .into_iter()
                .map(|title| Cell::from(title).style(Style::default().bold())),
        )
        .style(
            Style::default()
                .fg(self.theme.header_fg)
                .bg(self.theme.header_bg),
        )
        .height(1);

        let rows: Vec<Row> = self
            .state
            .visible_rows()
            .map(|row| {
                let loss_style = Style::default().fg(self.theme.loss_color(row.loss_pct));
                Row::new(vec![
                    Cell::from(row.hop.to_string()),
                    Cell::from(truncate_with_ellipsis(&row.host, 32)).style(self.host_style(row)),
                    Cell::from(truncate_with_ellipsis(&row.asn, 20))
                        .style(Style::default().fg(self.theme.text_dim)),
                    Cell::from(format!("{}%", row.loss)).style(loss_style),
                    Cell::from(row.sent.to_string()),
                    Cell::from(row.last.clone()),
                    Cell::from(row.avg.clone()),
                    Cell::from(row.min.clone()),
                    Cell::from(row.max.clone()),
                ])
            })
            .collect();

        let widths = [
            Constraint::Length(3),  // #
            Constraint::Min(16),    // Host
            Constraint::Length(20), // ASN
            Constraint::Length(7),  // Loss%
            Constraint::Length(5),  // Sent
            Constraint::Length(8),  // Last
            Constraint::Length(8),  // Avg
            Constraint::Length(8),  // Best
            Constraint::Length(8),  // Wrst
        ];

        Table::new(rows, widths).header(header).render(inner, buf);
    }
}
