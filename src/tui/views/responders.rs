use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style, Stylize};
use ratatui::widgets::{Block, Borders, Cell, Row, Table, Widget};

use crate::state::DisplayState;
use crate::tui::theme::Theme;
use crate::tui::views::table::truncate_with_ellipsis;

/// Every responder seen at each hop, most frequent first
pub struct RespondersView<'a> {
    state: &'a DisplayState,
    theme: &'a Theme,
}

impl<'a> RespondersView<'a> {
    pub fn new(state: &'a DisplayState, theme: &'a Theme) -> Self {
        Self { state, theme }
    }
}

impl Widget for RespondersView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .title(" Responders ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.theme.border));

        let inner = block.inner(area);
        block.render(area, buf);

        let header = Row::new(
            ["#", "Responder", "ASN", "Seen", "Loss%", "Avg", "Best", "Wrst", "Changes"]
                .into_iter()
                .map(|title| Cell::from(title).style(Style::default().bold())),
        )
        .style(
            Style::default()
                .fg(self.theme.header_fg)
                .bg(self.theme.header_bg),
        );

        let mut rows = Vec::new();
        for hop in self.state.visible_rows() {
            if hop.responders.is_empty() {
                rows.push(Row::new(vec![
                    Cell::from(hop.hop.to_string()),
                    Cell::from(hop.host.clone()).style(Style::default().fg(self.theme.text_dim)),
                ]));
                continue;
            }

            for (i, responder) in hop.responders.iter().enumerate() {
                let hop_cell = if i == 0 { hop.hop.to_string() } else { String::new() };
                let changes_cell = if i == 0 && hop.route_changes > 0 {
                    hop.route_changes.to_string()
                } else {
                    String::new()
                };
                let name = if responder.current {
                    format!("* {}", responder.identity)
                } else {
                    format!("  {}", responder.identity)
                };
                let name_style = if responder.current {
                    Style::default()
                        .fg(self.theme.text)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(self.theme.text_dim)
                };
                rows.push(Row::new(vec![
                    Cell::from(hop_cell),
                    Cell::from(truncate_with_ellipsis(&name, 34)).style(name_style),
                    Cell::from(truncate_with_ellipsis(&responder.asn, 20))
                        .style(Style::default().fg(self.theme.text_dim)),
                    Cell::from(responder.count.to_string()),
                    Cell::from(format!("{}%", responder.loss))
                        .style(Style::default().fg(self.theme.loss_color(responder.loss_pct))),
                    Cell::from(responder.avg.clone()),
                    Cell::from(responder.min.clone()),
                    Cell::from(responder.max.clone()),
                    Cell::from(changes_cell).style(Style::default().fg(self.theme.warning)),
                ]));
            }
        }

        let widths = [
            Constraint::Length(3),
            Constraint::Min(18),
            Constraint::Length(20),
            Constraint::Length(5),
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Length(7),
        ];

        Table::new(rows, widths).header(header).render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{HistoryWindow, RouteTable, ViewMode};

    fn buffer_text(buf: &Buffer) -> String {
        let area = buf.area;
        let mut out = String::new();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                out.push_str(buf[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_lists_all_responders_with_current_marked() {
        let mut table = RouteTable::new(4);
        table.observe(1, "a", Some(1.0), None);
        table.observe(1, "a", Some(1.0), None);
        table.observe(1, "b", Some(2.0), None);

        let mut state = DisplayState::new("example", 4, 100, ViewMode::Responders);
        state.project_all(&table, &HistoryWindow::new(10));

        let theme = Theme::dark();
        let area = Rect::new(0, 0, 100, 8);
        let mut buf = Buffer::empty(area);
        RespondersView::new(&state, &theme).render(area, &mut buf);
        let text = buffer_text(&buf);

        assert!(text.contains("  a"));
        assert!(text.contains("* b"));
    }
}
