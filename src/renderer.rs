//! Ratatui-based campaign dashboard.
//!
//! This module is purely presentational -- it takes references to the refresh
//! controller and the UI state and renders into a Ratatui `Frame`. It does
//! **not** own any state.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::campaign::COLUMNS;
use crate::classify::{Counts, Status};
use crate::controller::RefreshController;
use crate::table::{CampaignTable, CellContent, TableRow};

// ---------------------------------------------------------------------------
// Styling
// ---------------------------------------------------------------------------

/// Row style for a status bucket.
fn status_style(status: Option<Status>) -> Style {
    match status {
        Some(Status::Active) => Style::default().fg(Color::Red),
        Some(Status::Upcoming) => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    }
}

/// Style of a single cell within a row.
fn cell_style(content: &CellContent) -> Style {
    match content {
        CellContent::Countdown { display, .. } if display.is_elapsed() => Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
        CellContent::Countdown { .. } => Style::default().fg(Color::Cyan),
        CellContent::Text(_) => Style::default(),
    }
}

fn build_row(row: &TableRow, columns: &[usize]) -> Row<'static> {
    let cells: Vec<Cell<'static>> = columns
        .iter()
        .map(|column| {
            let content = &row.cells[*column];
            Cell::from(content.text()).style(cell_style(content))
        })
        .collect();
    Row::new(cells).style(status_style(row.status()))
}

// ---------------------------------------------------------------------------
// Header / counts
// ---------------------------------------------------------------------------

fn render_header(
    frame: &mut Frame,
    area: Rect,
    controller: &RefreshController<CampaignTable>,
    source: &str,
) {
    let refreshed = controller
        .last_refresh()
        .map(|t| t.format("%H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    let line = Line::from(vec![
        Span::styled(" Source: ", Style::default().fg(Color::DarkGray)),
        Span::styled(source.to_string(), Style::default().fg(Color::White)),
        Span::styled("    Last refresh: ", Style::default().fg(Color::DarkGray)),
        Span::styled(refreshed, Style::default().fg(Color::White)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " SOVEREIGNTY CAMPAIGNS ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

/// The counts line shown above the table.
fn counts_line(counts: Counts, filter_label: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(" Total: ", Style::default().fg(Color::DarkGray)),
        Span::styled(counts.total.to_string(), Style::default().fg(Color::White)),
        Span::styled("   Upcoming: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            counts.upcoming.to_string(),
            Style::default().fg(Color::Yellow),
        ),
        Span::styled("   Active: ", Style::default().fg(Color::DarkGray)),
        Span::styled(counts.active.to_string(), Style::default().fg(Color::Red)),
        Span::styled("   Showing: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            filter_label.to_string(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
    ])
}

// ---------------------------------------------------------------------------
// Campaign table
// ---------------------------------------------------------------------------

fn render_table(
    frame: &mut Frame,
    area: Rect,
    controller: &RefreshController<CampaignTable>,
    source: &str,
    selected: usize,
) {
    let table = controller.table();

    if !controller.is_loaded() {
        let waiting = Paragraph::new(Line::from(Span::styled(
            format!(" Waiting for campaign data from {} ...", source),
            Style::default().fg(Color::DarkGray),
        )));
        frame.render_widget(waiting, area);
        return;
    }

    let columns = table.visible_columns();
    let header_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::UNDERLINED);
    let header = Row::new(
        columns
            .iter()
            .map(|c| Cell::from(COLUMNS[*c].title))
            .collect::<Vec<_>>(),
    )
    .style(header_style);

    let widths: Vec<Constraint> = columns
        .iter()
        .map(|c| Constraint::Min(COLUMNS[*c].width))
        .collect();

    let rows: Vec<Row<'static>> = table
        .visible()
        .iter()
        .filter_map(|index| table.row(*index))
        .map(|row| build_row(row, &columns))
        .collect();

    if rows.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(Span::styled(
                columns
                    .iter()
                    .map(|c| COLUMNS[*c].title)
                    .collect::<Vec<_>>()
                    .join("  "),
                header_style,
            )),
            Line::from(Span::styled(
                " No campaigns match.",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(empty, area);
        return;
    }

    let widget = Table::new(rows, widths)
        .header(header)
        .column_spacing(2)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default().with_selected(Some(selected));
    frame.render_stateful_widget(widget, area, &mut state);
}

// ---------------------------------------------------------------------------
// Detail line
// ---------------------------------------------------------------------------

/// Tooltip and link of the selected row.
fn detail_line(
    controller: &RefreshController<CampaignTable>,
    selected_row: Option<usize>,
    yes: &str,
    no: &str,
) -> Line<'static> {
    let Some(index) = selected_row else {
        return Line::default();
    };
    let Some(row) = controller.table().row(index) else {
        return Line::default();
    };

    let status = row.status().unwrap_or(Status::Other);
    let active = controller
        .live_entry(index)
        .map_or(status == Status::Active, |entry| entry.active);
    let mut spans = vec![
        Span::styled(" Active: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            if active { yes } else { no }.to_string(),
            Style::default().fg(Color::White),
        ),
        Span::styled("   Status: ", Style::default().fg(Color::DarkGray)),
        Span::styled(status.label(), status_style(Some(status))),
    ];

    if let Some(tooltip) = controller.tooltip(index) {
        spans.push(Span::styled("   ", Style::default()));
        spans.push(Span::styled(
            tooltip.to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::ITALIC),
        ));
    }
    if let Some(link) = row.data.link() {
        spans.push(Span::styled("   ", Style::default()));
        spans.push(Span::styled(link, Style::default().fg(Color::Blue)));
    }

    Line::from(spans)
}

// ---------------------------------------------------------------------------
// Legend
// ---------------------------------------------------------------------------

/// Render the legend / key-binding bar at the bottom of the screen.
/// Shows the search input bar when search is active, the filter indicator
/// when a search is applied, or the normal legend otherwise.
fn render_legend(
    frame: &mut Frame,
    area: Rect,
    search_query: &str,
    search_active: bool,
    last_error: Option<&str>,
    notice: Option<&str>,
) {
    let mut spans: Vec<Span<'static>> = if search_active {
        vec![
            Span::styled(
                " / ",
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" {}", search_query),
                Style::default().fg(Color::White),
            ),
            Span::styled(
                "_",
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
            Span::styled("  (Esc to cancel)", Style::default().fg(Color::DarkGray)),
        ]
    } else if !search_query.is_empty() {
        vec![
            Span::styled(" Search: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                format!("\"{}\"", search_query),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  (Esc to clear, / to edit)  |  f status  j/k select  o open",
                Style::default().fg(Color::DarkGray),
            ),
        ]
    } else {
        vec![
            Span::styled(" Legend: ", Style::default().fg(Color::DarkGray)),
            Span::styled(
                "ACTIVE",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                "UPCOMING",
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(
                "ELAPSED",
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                "  |  q quit  / search  f status  j/k select  o open",
                Style::default().fg(Color::DarkGray),
            ),
        ]
    };

    if let Some(notice) = notice {
        spans.push(Span::styled(
            format!("  {}", notice),
            Style::default().fg(Color::Cyan),
        ));
    }

    // Show the last refresh failure, if the most recent refresh failed.
    if let Some(err) = last_error {
        spans.push(Span::styled(
            format!("  [!] {}", err),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ---------------------------------------------------------------------------
// Main render entry point
// ---------------------------------------------------------------------------

/// Top-level render function. Returns the number of table rows that fit on
/// screen, which the caller uses for page-wise selection.
#[allow(clippy::too_many_arguments)]
pub fn render_ui(
    frame: &mut Frame,
    controller: &RefreshController<CampaignTable>,
    source: &str,
    selected: usize,
    search_query: &str,
    search_active: bool,
    notice: Option<&str>,
    tokens: (&str, &str),
) -> u16 {
    let size = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(1), // counts
            Constraint::Min(1),    // table
            Constraint::Length(1), // detail
            Constraint::Length(1), // legend
        ])
        .split(size);

    render_header(frame, chunks[0], controller, source);

    let counts = counts_line(controller.counts(), controller.status_filter().label());
    frame.render_widget(Paragraph::new(counts), chunks[1]);

    render_table(frame, chunks[2], controller, source, selected);

    let selected_row = controller.table().visible().get(selected).copied();
    let detail = detail_line(controller, selected_row, tokens.0, tokens.1);
    frame.render_widget(Paragraph::new(detail), chunks[3]);

    render_legend(
        frame,
        chunks[4],
        search_query,
        search_active,
        controller.last_error(),
        notice,
    );

    // One line of the table area goes to the column header.
    chunks[2].height.saturating_sub(1)
}

// ---------------------------------------------------------------------------
// Plain-text snapshot
// ---------------------------------------------------------------------------

fn pad(text: &str, width: usize) -> String {
    let shown = UnicodeWidthStr::width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(shown)))
}

/// Render the current table as aligned plain-text lines, followed by the
/// counts. Used by `--once`.
pub fn render_plain(controller: &RefreshController<CampaignTable>) -> Vec<String> {
    let table = controller.table();
    let columns = table.visible_columns();

    let body: Vec<Vec<String>> = table
        .visible()
        .iter()
        .filter_map(|index| table.row(*index))
        .map(|row| columns.iter().map(|c| row.cells[*c].text()).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            body.iter()
                .map(|cells| UnicodeWidthStr::width(cells[i].as_str()))
                .chain(std::iter::once(UnicodeWidthStr::width(COLUMNS[*c].title)))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let join = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| pad(cell, *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(body.len() + 3);
    lines.push(join(
        columns.iter().map(|c| COLUMNS[*c].title.to_string()).collect(),
    ));
    for cells in body {
        lines.push(join(cells));
    }

    let counts = controller.counts();
    lines.push(String::new());
    lines.push(format!(
        "Total: {}   Upcoming: {}   Active: {}",
        counts.total, counts.upcoming, counts.active
    ));
    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{Campaign, DisplayOptions, COUNTDOWN_COLUMN};
    use crate::config::Settings;
    use crate::countdown::CountdownDisplay;
    use std::time::Instant;

    fn controller(rows: Vec<Campaign>) -> RefreshController<CampaignTable> {
        let table = CampaignTable::new(
            DisplayOptions {
                datetime_format: "%H:%M".to_string(),
            },
            COUNTDOWN_COLUMN,
            false,
            vec![0, 2, 3, 5, 6],
        );
        let mut c = RefreshController::new(table, &Settings::default());
        c.startup(Ok(Some(rows)), Instant::now());
        c
    }

    #[test]
    fn test_status_style() {
        assert_eq!(status_style(Some(Status::Active)).fg, Some(Color::Red));
        assert_eq!(status_style(Some(Status::Upcoming)).fg, Some(Color::Yellow));
        assert_eq!(status_style(Some(Status::Other)), Style::default());
        assert_eq!(status_style(None), Style::default());
    }

    #[test]
    fn test_cell_style_marks_elapsed() {
        let elapsed = CellContent::Countdown {
            display: CountdownDisplay::of(-1),
            status: Status::Active,
        };
        let running = CellContent::Countdown {
            display: CountdownDisplay::of(1),
            status: Status::Upcoming,
        };
        assert_eq!(cell_style(&elapsed).fg, Some(Color::Magenta));
        assert_eq!(cell_style(&running).fg, Some(Color::Cyan));
    }

    #[test]
    fn test_render_plain() {
        let c = controller(vec![
            Campaign {
                solar_system_name: "Jita".to_string(),
                defender_name: "Caldari State".to_string(),
                remaining_time_in_seconds: 90,
                campaign_progress: "60%".to_string(),
                ..Default::default()
            },
            Campaign {
                solar_system_name: "Amarr".to_string(),
                defender_name: "Empire".to_string(),
                remaining_time_in_seconds: 30,
                active_campaign: "Yes".to_string(),
                campaign_progress: "55%".to_string(),
                ..Default::default()
            },
        ]);

        let lines = render_plain(&c);
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            "System  Defender       Remaining       Progress"
        );
        assert_eq!(
            lines[1],
            "Amarr   Empire         0d 00h 00m 30s  55%"
        );
        assert_eq!(
            lines[2],
            "Jita    Caldari State  0d 00h 01m 30s  60%"
        );
        assert_eq!(lines[4], "Total: 2   Upcoming: 1   Active: 1");
    }

    #[test]
    fn test_pad_uses_display_width() {
        assert_eq!(pad("ab", 4), "ab  ");
        assert_eq!(pad("\u{65e5}", 4), "\u{65e5}  ");
        assert_eq!(pad("long", 2), "long");
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    #[test]
    fn test_detail_line_follows_the_ticking_status() {
        let mut c = controller(vec![Campaign {
            solar_system_name: "Jita".to_string(),
            remaining_time_in_seconds: 14_401,
            active_campaign: "No".to_string(),
            ..Default::default()
        }]);

        let before = line_text(&detail_line(&c, Some(0), "Yes", "No"));
        assert!(before.contains("Active: No"), "{}", before);
        assert!(before.contains("Status: scheduled"), "{}", before);

        c.tick();
        let after = line_text(&detail_line(&c, Some(0), "Yes", "No"));
        assert!(after.contains("Active: No"), "{}", after);
        assert!(after.contains("Status: upcoming"), "{}", after);
        assert_eq!(c.live_entry(0).unwrap().remaining_seconds, 14_400);
    }

    #[test]
    fn test_detail_line_for_active_row() {
        let c = controller(vec![Campaign {
            solar_system_name: "Amarr".to_string(),
            remaining_time_in_seconds: -30,
            active_campaign: "Yes".to_string(),
            ..Default::default()
        }]);
        let text = line_text(&detail_line(&c, Some(0), "Ja", "Nein"));
        assert!(text.contains("Active: Ja"), "{}", text);
        assert!(text.contains("Status: active"), "{}", text);
        assert_eq!(line_text(&detail_line(&c, None, "Ja", "Nein")), "");
    }
}

