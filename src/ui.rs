use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span},
    widgets::{
        Block, Cell, Clear, Paragraph, Row, Scrollbar, ScrollbarOrientation, ScrollbarState,
        Table,
    },
};

use crate::domain::CMDMode;
use crate::model::{RowStatus, UIData};

pub const CMDLINE_HEIGH: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;

const HIGHLIGHT_STYLE: Style = Style::new()
    .fg(Color::Black)
    .bg(Color::Yellow)
    .add_modifier(Modifier::BOLD);

pub fn draw(uidata: &UIData, frame: &mut Frame) {
    let [table_area, status_area] = Layout::vertical([
        Constraint::Min(TABLE_HEADER_HEIGHT as u16),
        Constraint::Length(CMDLINE_HEIGH as u16),
    ])
    .areas(frame.area());
    let [table_area, scrollbar_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(SCROLLBAR_WIDTH as u16),
    ])
    .areas(table_area);

    draw_table(uidata, frame, table_area);
    draw_scrollbar(uidata, frame, scrollbar_area);
    draw_statusline(uidata, frame, status_area);
    if uidata.show_popup {
        draw_popup(&uidata.popup_message, frame);
    }
}

fn draw_table(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let header = Row::new(uidata.headers.iter().enumerate().map(|(cidx, h)| {
        let cell = Cell::from(h.name.clone());
        if h.highlighted {
            cell.style(HIGHLIGHT_STYLE)
        } else if cidx == uidata.selected_column {
            cell.style(Style::new().bold().underlined())
        } else {
            cell.style(Style::new().bold())
        }
    }));

    let rows = uidata.rows.iter().enumerate().map(|(ridx, row)| {
        let style = match row.status {
            RowStatus::Loaded => Style::new(),
            RowStatus::Loading => Style::new().fg(Color::DarkGray).italic(),
            RowStatus::Failed => Style::new().fg(Color::Red),
        };
        Row::new(row.cells.iter().enumerate().map(|(cidx, value)| {
            let cell = Cell::from(value.clone());
            if ridx == uidata.selected_row && cidx == uidata.selected_column {
                cell.style(Style::new().reversed())
            } else {
                cell
            }
        }))
        .style(style)
    });

    let widths = uidata
        .headers
        .iter()
        .map(|h| Constraint::Length(h.width as u16))
        .collect::<Vec<Constraint>>();

    let table = Table::new(rows, widths).header(header).column_spacing(1);
    frame.render_widget(table, area);
}

fn draw_scrollbar(uidata: &UIData, frame: &mut Frame, area: Rect) {
    let mut state = ScrollbarState::new(uidata.nrows).position(uidata.abs_selected_row);
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(None)
            .end_symbol(None),
        area,
        &mut state,
    );
}

fn draw_statusline(uidata: &UIData, frame: &mut Frame, area: Rect) {
    if uidata.active_cmdinput {
        let prompt = match uidata.cmd_mode {
            Some(CMDMode::ColumnSearch) => "Column search: ",
            None => ": ",
        };
        let line = Line::from(vec![
            Span::from(prompt).bold(),
            Span::from(uidata.cmdinput.input.clone()),
        ]);
        frame.render_widget(Paragraph::new(line), area);
        let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
        return;
    }

    let total = if uidata.nrows_known {
        uidata.nrows.to_string()
    } else {
        "?".to_string()
    };
    let position = format!(" {}/{} ", uidata.abs_selected_row + 1, total);
    let mut spans = vec![
        Span::from(format!(" {} ", uidata.name)).reversed(),
        Span::from(" "),
    ];
    if !uidata.column_query.is_empty() {
        spans.push(Span::from(format!("/{} ", uidata.column_query)).yellow());
    }
    spans.push(Span::from(uidata.status_message.clone()));

    let [left, right] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(position.chars().count() as u16),
    ])
    .areas(area);
    frame.render_widget(Paragraph::new(Line::from(spans)), left);
    frame.render_widget(Paragraph::new(position).reversed(), right);
}

fn draw_popup(message: &str, frame: &mut Frame) {
    let area = popup_area(frame.area(), 60, 70);
    let block = Block::bordered()
        .title(Line::from(" Help ".bold()).centered())
        .title_bottom(Line::from(" <Esc> close ".blue()).centered())
        .border_set(border::THICK);
    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(message.to_string()).block(block), area);
}

fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = vertical.areas(area);
    let [area] = horizontal.areas(area);
    area
}
