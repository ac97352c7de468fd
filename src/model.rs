use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace};

use crate::columns::ColumnDescriptor;
use crate::domain::{CMDMode, GridConfig, GridError, HELP_TEXT, Message};
use crate::filter::ColumnFilterController;
use crate::header::ColumnHeader;
use crate::inputter::{InputResult, Inputter};
use crate::paging::{PageRequest, PagingAdapter, RowSource};
use crate::record::{Field, Record};
use crate::row_cache::{RowCache, RowState};
use crate::ui::{CMDLINE_HEIGH, SCROLLBAR_WIDTH, TABLE_HEADER_HEIGHT};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Modus {
    TABLE,
    RECORD,
    POPUP,
    CMDINPUT,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowStatus {
    Loaded,
    Loading,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub name: String,
    pub width: usize,
    pub highlighted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub cells: Vec<String>,
    pub status: RowStatus,
}

pub struct UIData {
    pub name: String,
    pub headers: Vec<HeaderView>,
    pub rows: Vec<RowView>,
    pub nrows: usize, // Total number of rows the view can scroll through
    pub nrows_known: bool,
    pub selected_row: usize,
    pub selected_column: usize,
    pub abs_selected_row: usize,
    pub show_popup: bool,
    pub popup_message: String,
    pub layout: UILayout,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub column_query: String,
    pub status_message: String,
    pub last_update: Instant,
}

impl UIData {
    pub fn empty() -> Self {
        UIData {
            name: String::new(),
            headers: Vec::new(),
            rows: Vec::new(),
            nrows: 0,
            nrows_known: false,
            selected_row: 0,
            selected_column: 0,
            abs_selected_row: 0,
            show_popup: false,
            popup_message: String::new(),
            layout: UILayout::default(),
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            column_query: String::new(),
            status_message: String::new(),
            last_update: Instant::now(),
        }
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub table_width: usize,
    pub table_height: usize,
    pub statusline_width: usize,
    pub statusline_height: usize,
}

impl UILayout {
    pub fn from_values(ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            table_width: ui_width.saturating_sub(SCROLLBAR_WIDTH),
            table_height: ui_height.saturating_sub(CMDLINE_HEIGH + TABLE_HEADER_HEIGHT),
            statusline_width: ui_width,
            statusline_height: CMDLINE_HEIGH,
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

struct RecordView {
    curser_row: usize,
    curser_offset: usize,
}

pub struct Model {
    name: String,
    config: GridConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    paging: PagingAdapter<Box<dyn RowSource>>,
    rows: RowCache,
    header: ColumnHeader,
    filter: ColumnFilterController,
    curser_row: usize,
    offset_row: usize,
    record_view: RecordView,
    uilayout: UILayout,
    uidata: UIData,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    loading_status: bool, // Status line shows a loading message until pages arrive
}

impl Model {
    pub fn init(
        name: &str,
        config: &GridConfig,
        paging: PagingAdapter<Box<dyn RowSource>>,
        columns: Vec<ColumnDescriptor>,
        ui_width: usize,
        ui_height: usize,
    ) -> Self {
        let uilayout = UILayout::from_values(ui_width, ui_height);
        let mut header = ColumnHeader::new(columns, config.max_column_width);
        header.layout(uilayout.table_width);
        let filter = ColumnFilterController::new(header.columns());

        let mut model = Self {
            name: name.to_string(),
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            paging,
            rows: RowCache::new(config.block_size),
            header,
            filter,
            curser_row: 0,
            offset_row: 0,
            record_view: RecordView {
                curser_row: 0,
                curser_offset: 0,
            },
            uilayout,
            uidata: UIData::empty(),
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: String::new(),
            loading_status: false,
        };
        model.set_status_message("Loading ...");
        model.loading_status = true;
        model.refresh_view();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// How long the event loop may block without delaying a page delivery.
    pub fn poll_timeout(&self, now: Instant) -> Duration {
        let poll = Duration::from_millis(self.config.event_poll_time);
        match self.paging.next_due() {
            Some(due) => std::cmp::min(poll, due.saturating_duration_since(now)),
            None => poll,
        }
    }

    /// Delivers due pages into the row cache and requests blocks the view is missing.
    pub fn tick(&mut self, now: Instant) {
        let delivered = self.paging.dispatch_due(now, &mut self.rows);
        if delivered > 0 {
            trace!("Delivered {delivered} pages");
        }

        let failures = self.rows.take_failures();
        if !failures.is_empty() {
            let ranges = failures
                .iter()
                .map(|r| format!("{}-{}", r.start_row, r.end_row))
                .collect::<Vec<String>>()
                .join(", ");
            error!("Loading rows failed for {ranges}");
            self.set_status_message(format!("Loading rows {ranges} failed, press r to reload"));
            self.loading_status = false;
        } else if delivered > 0 && self.loading_status && self.paging.in_flight() == 0 {
            let message = match self.rows.row_count() {
                Some(count) => format!("{count} rows"),
                None => "Ready".to_string(),
            };
            self.set_status_message(message);
            self.loading_status = false;
        }

        self.request_visible_blocks(now);

        let rows_changed = self.rows.take_changed();
        let header_changed = self.header.take_redraw();
        if rows_changed || header_changed {
            self.clamp_selection();
            self.refresh_view();
        }
    }

    fn request_visible_blocks(&mut self, now: Instant) {
        let start = self.offset_row;
        let end = start.saturating_add(self.uilayout.table_height.max(1));
        let window = match PageRequest::new(start, end) {
            Ok(window) => window,
            Err(e) => {
                error!("Invalid view window: {e}");
                return;
            }
        };
        for request in self.rows.claim_missing(&window) {
            self.paging.get_rows(request, now);
            debug!(
                "Requested rows [{}, {}), {} in flight",
                request.start_row,
                request.end_row,
                self.paging.in_flight()
            );
        }
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.uidata.status_message = self.status_message.clone();
        self.uidata.last_update = Instant::now();
    }

    fn view_modus(&self) -> Modus {
        match self.modus {
            Modus::POPUP | Modus::CMDINPUT => self.previous_modus,
            m => m,
        }
    }

    fn refresh_view(&mut self) {
        match self.view_modus() {
            Modus::RECORD => self.update_uidata_for_record(),
            _ => self.update_uidata_for_table(),
        }
    }

    fn update_uidata_for_table(&mut self) {
        let nrows = self.rows.virtual_row_count();
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, nrows);

        let visible = self.header.visible();
        let columns = self.header.columns();
        let headers = visible
            .iter()
            .map(|v| HeaderView {
                name: fit_to_width(&columns[v.idx].header_name, v.width),
                width: v.width,
                highlighted: columns[v.idx].highlighted,
            })
            .collect::<Vec<HeaderView>>();

        let rows = (rbegin..rend)
            .map(|ridx| match self.rows.row(ridx) {
                RowState::Loaded(record) => RowView {
                    cells: visible
                        .iter()
                        .map(|v| fit_to_width(&record.cell(columns[v.idx].field), v.width))
                        .collect(),
                    status: RowStatus::Loaded,
                },
                RowState::Failed => Self::placeholder_row(visible.len(), "✗ failed", RowStatus::Failed),
                RowState::Loading | RowState::Missing => {
                    Self::placeholder_row(visible.len(), "loading …", RowStatus::Loading)
                }
            })
            .collect::<Vec<RowView>>();

        let selected_column = visible
            .iter()
            .position(|v| v.idx == self.header.curser_column)
            .unwrap_or(0);

        self.uidata = UIData {
            name: self.name.clone(),
            headers,
            rows,
            nrows,
            nrows_known: self.rows.row_count().is_some(),
            selected_row: self.curser_row,
            selected_column,
            abs_selected_row: self.offset_row + self.curser_row,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.uidata.popup_message.clone(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            column_query: self.filter.query().to_string(),
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }

    fn placeholder_row(ncolumns: usize, text: &str, status: RowStatus) -> RowView {
        let mut cells = vec![String::new(); ncolumns];
        if let Some(first) = cells.first_mut() {
            *first = text.to_string();
        }
        RowView { cells, status }
    }

    fn field_name(&self, field: Field) -> String {
        self.header
            .columns()
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.header_name.clone())
            .unwrap_or_else(|| {
                let key = field.key();
                key[..1].to_uppercase() + &key[1..]
            })
    }

    fn current_record(&self) -> Option<&Record> {
        match self.rows.row(self.offset_row + self.curser_row) {
            RowState::Loaded(record) => Some(record),
            _ => None,
        }
    }

    fn update_uidata_for_record(&mut self) {
        let record_idx = self.offset_row + self.curser_row;
        let names = Field::ALL
            .iter()
            .map(|f| self.field_name(*f))
            .collect::<Vec<String>>();
        let name_width = names.iter().map(|n| n.chars().count()).max().unwrap_or(0) + 2;
        let value_width = self.uilayout.table_width.saturating_sub(name_width + 1);

        let (values, status) = match self.rows.row(record_idx) {
            RowState::Loaded(record) => (
                Field::ALL.iter().map(|f| record.cell(*f)).collect::<Vec<String>>(),
                RowStatus::Loaded,
            ),
            RowState::Failed => (vec!["✗ failed".to_string(); names.len()], RowStatus::Failed),
            RowState::Loading | RowState::Missing => {
                (vec!["loading …".to_string(); names.len()], RowStatus::Loading)
            }
        };

        let rbegin = self.record_view.curser_offset;
        let rend = std::cmp::min(rbegin + self.uilayout.table_height, names.len());
        let rows = (rbegin..rend)
            .map(|i| RowView {
                cells: vec![
                    fit_to_width(&names[i], name_width),
                    fit_to_width(&values[i], value_width),
                ],
                status,
            })
            .collect::<Vec<RowView>>();

        self.uidata = UIData {
            name: format!("R[{}]", self.name),
            headers: vec![
                HeaderView {
                    name: "Field".to_string(),
                    width: name_width,
                    highlighted: false,
                },
                HeaderView {
                    name: "Value".to_string(),
                    width: value_width,
                    highlighted: false,
                },
            ],
            rows,
            nrows: self.rows.virtual_row_count(),
            nrows_known: self.rows.row_count().is_some(),
            selected_row: self.record_view.curser_row,
            selected_column: 1,
            // In the record view, show which record we are looking at
            abs_selected_row: record_idx,
            show_popup: self.modus == Modus::POPUP,
            popup_message: self.uidata.popup_message.clone(),
            layout: self.uilayout.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            column_query: self.filter.query().to_string(),
            status_message: self.status_message.clone(),
            last_update: Instant::now(),
        };
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), GridError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(1),
                    Message::MoveUp => self.move_table_selection_up(1),
                    Message::MoveLeft => self.header.move_left(),
                    Message::MoveRight => self.header.move_right(),
                    Message::MovePageUp => self.move_table_selection_up(self.uilayout.table_height),
                    Message::MovePageDown => {
                        self.move_table_selection_down(self.uilayout.table_height)
                    }
                    Message::MoveBeginning => self.select_row(0),
                    Message::MoveEnd => {
                        self.select_row(self.rows.virtual_row_count().saturating_sub(1))
                    }
                    Message::MoveToFirstColumn => self.header.select(0),
                    Message::MoveToLastColumn => {
                        self.header.select(self.header.len().saturating_sub(1))
                    }
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::ColumnSearch => self.enter_cmd_mode(CMDMode::ColumnSearch),
                    Message::Reload => self.reload_failed(),
                    Message::Enter => self.enter(),
                    _ => (),
                },
                Modus::RECORD => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_record_selection_down(1),
                    Message::MoveUp => self.move_record_selection_up(1),
                    Message::MoveLeft => self.previous_record(),
                    Message::MoveRight => self.next_record(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::CopyCell => self.copy_record_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_help(),
                    Message::Reload => self.reload_failed(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    Message::Exit | Message::Enter | Message::Help => self.exit(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::RawKey(key) => self.raw_input(key),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
            }
            self.refresh_view();
        }
        Ok(())
    }

    // -------------------- Control handling functions ---------------------- //

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(width, height);
        self.header.layout(self.uilayout.table_width);
        self.header.scroll_to(self.header.curser_column);
        self.select_row(self.offset_row + self.curser_row);
    }

    fn enter(&mut self) {
        if self.current_record().is_some() {
            self.record_view.curser_row = 0;
            self.record_view.curser_offset = 0;
            self.previous_modus = Modus::TABLE;
            self.modus = Modus::RECORD;
        } else {
            self.set_status_message("Row is not loaded yet");
        }
    }

    fn exit(&mut self) {
        match self.modus {
            Modus::RECORD => {
                self.previous_modus = Modus::RECORD;
                self.modus = Modus::TABLE;
            }
            Modus::POPUP => {
                trace!("Close popup ...");
                self.modus = self.previous_modus;
                self.previous_modus = Modus::POPUP;
            }
            Modus::TABLE | Modus::CMDINPUT => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.uidata.popup_message = HELP_TEXT.to_string();
    }

    fn reload_failed(&mut self) {
        let removed = self.rows.reset_failed();
        if removed > 0 {
            info!("Reloading {removed} failed blocks");
            self.set_status_message(format!("Reloading {removed} blocks ..."));
            self.loading_status = true;
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.active_cmdinput = true;

        // Continue editing the current column query
        self.input.reset(self.filter.query());
        self.last_input = self.input.get();
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if !self.active_cmdinput {
            return;
        }
        self.last_input = self.input.read(key);
        match self.cmd_mode {
            Some(CMDMode::ColumnSearch) => {
                self.filter
                    .on_query_change(&self.last_input.input, &mut self.header);
            }
            None => info!("Cmd mode is none!"),
        }
        if self.last_input.finished {
            self.leave_cmd_mode();
        }
    }

    fn leave_cmd_mode(&mut self) {
        trace!("Leaving command mode with \"{}\"", self.last_input.input);
        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;
        self.cmd_mode = None;
        match self.filter.highlighted() {
            Some(field) => {
                let name = self.field_name(field);
                self.set_status_message(format!("Column {name}"));
            }
            None if !self.filter.query().is_empty() => {
                self.set_status_message("No matching column!")
            }
            None => {}
        }
    }

    fn select_row(&mut self, row: usize) {
        let nrows = self.rows.virtual_row_count();
        if nrows == 0 {
            self.offset_row = 0;
            self.curser_row = 0;
            return;
        }
        let row = std::cmp::min(row, nrows - 1);
        let height = self.uilayout.table_height.max(1);
        self.offset_row = std::cmp::min(self.offset_row, nrows.saturating_sub(height));
        if row < self.offset_row {
            self.offset_row = row;
        } else if row >= self.offset_row + height {
            self.offset_row = row + 1 - height;
        }
        self.curser_row = row - self.offset_row;
    }

    // Keeps the selection inside the rows once the end of data is known
    fn clamp_selection(&mut self) {
        let nrows = self.rows.virtual_row_count();
        if self.offset_row + self.curser_row >= nrows {
            self.select_row(nrows.saturating_sub(1));
        }
    }

    fn move_table_selection_up(&mut self, size: usize) {
        let row = (self.offset_row + self.curser_row).saturating_sub(size.max(1));
        self.select_row(row);
    }

    fn move_table_selection_down(&mut self, size: usize) {
        self.select_row(self.offset_row + self.curser_row + size.max(1));
    }

    fn move_record_selection_up(&mut self, size: usize) {
        let record = &mut self.record_view;
        if record.curser_row > 0 {
            record.curser_row = record.curser_row.saturating_sub(size);
        } else {
            record.curser_offset = record.curser_offset.saturating_sub(size);
        }
    }

    fn move_record_selection_down(&mut self, size: usize) {
        let nfields = Field::ALL.len();
        let height = self.uilayout.table_height.max(1);
        let record = &mut self.record_view;
        let current = record.curser_offset + record.curser_row;
        let target = std::cmp::min(current + size, nfields - 1);
        if target < record.curser_offset + height {
            record.curser_row = target - record.curser_offset;
        } else {
            record.curser_offset = target + 1 - height;
            record.curser_row = height - 1;
        }
    }

    fn previous_record(&mut self) {
        self.move_table_selection_up(1);
    }

    fn next_record(&mut self) {
        self.move_table_selection_down(1);
    }

    fn copy_table_cell(&mut self) {
        let field = self.header.current_column().map(|c| c.field);
        let cell = match (self.current_record(), field) {
            (Some(record), Some(field)) => Some(record.cell(field)),
            _ => None,
        };
        match cell {
            Some(cell) => self.copy_to_clipboard(cell, "cell"),
            None => self.set_status_message("Nothing to copy, row is not loaded"),
        }
    }

    fn copy_record_cell(&mut self) {
        let idx = self.record_view.curser_offset + self.record_view.curser_row;
        let cell = match (self.current_record(), Field::ALL.get(idx)) {
            (Some(record), Some(field)) => Some(record.cell(*field)),
            _ => None,
        };
        match cell {
            Some(cell) => self.copy_to_clipboard(cell, "cell"),
            None => self.set_status_message("Nothing to copy, row is not loaded"),
        }
    }

    fn copy_row(&mut self) {
        let content = self.current_record().map(|record| {
            Field::ALL
                .iter()
                .map(|f| Self::wrap_cell_content(&record.cell(*f)))
                .collect::<Vec<String>>()
                .join(",")
        });
        match content {
            Some(content) => self.copy_to_clipboard(content, "row"),
            None => self.set_status_message("Nothing to copy, row is not loaded"),
        }
    }

    fn copy_to_clipboard(&mut self, content: String, what: &str) {
        trace!("Copy {what}: {content}");
        match Clipboard::new().and_then(|mut clipboard| clipboard.set_text(content)) {
            Ok(_) => self.set_status_message(format!("Copied {what} to clipboard")),
            Err(e) => {
                error!("Error copying to clipboard: {:?}", e);
                self.set_status_message("Clipboard is not available");
            }
        }
    }

    fn wrap_cell_content(c: &str) -> String {
        let needs_escaping = c.contains('"');
        let needs_wrapping = c.chars().any(|c| c == ' ' || c == '\t' || c == ',');
        let mut out = String::from(c);

        if needs_escaping {
            out = out.replace('"', "\"\"");
        }
        if needs_wrapping || needs_escaping {
            out = format!("\"{out}\"");
        }
        out
    }
}

/// Cuts `s` to `width` characters, marking the cut with an ellipsis.
pub fn fit_to_width(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len <= width {
        return s.to_string();
    }
    if width == 0 {
        return String::new();
    }
    let mut reduced = s.chars().take(width - 1).collect::<String>();
    reduced.push('…');
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::default_columns;
    use crate::paging::{FakeServer, PageRequest, ServerResponse};
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use std::cell::Cell;

    const DELAY: Duration = Duration::from_millis(500);

    fn dataset(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                athlete: format!("Athlete {i}"),
                country: "Norway".to_string(),
                year: 2000,
                sport: "Biathlon".to_string(),
                gold: 1,
                total: 1,
                ..Default::default()
            })
            .collect()
    }

    fn model_with(source: Box<dyn RowSource>, width: usize) -> Model {
        let config = GridConfig::default()
            .with_page_delay(DELAY)
            .with_block_size(100);
        let paging = PagingAdapter::new(source, config.page_delay);
        Model::init("test", &config, paging, default_columns(), width, 32)
    }

    fn model(n: usize) -> Model {
        model_with(Box::new(FakeServer::new(dataset(n))), 200)
    }

    fn key(model: &mut Model, code: KeyCode) {
        model
            .update(Some(Message::RawKey(KeyEvent::new(code, KeyModifiers::NONE))))
            .unwrap();
    }

    fn highlighted(model: &Model) -> Vec<String> {
        model
            .get_uidata()
            .headers
            .iter()
            .filter(|h| h.highlighted)
            .map(|h| h.name.clone())
            .collect()
    }

    struct BrokenServer;

    impl RowSource for BrokenServer {
        fn get_data(&self, _request: &PageRequest) -> ServerResponse {
            ServerResponse {
                success: false,
                rows: Vec::new(),
                last_row: None,
            }
        }
    }

    #[test]
    fn rows_arrive_after_page_delay() {
        let mut model = model(250);
        let t0 = Instant::now();
        model.tick(t0);
        assert_eq!(model.paging.in_flight(), 1);
        assert!(
            model
                .get_uidata()
                .rows
                .iter()
                .all(|r| r.status == RowStatus::Loading)
        );
        assert!(model.poll_timeout(t0) <= Duration::from_millis(100));

        model.tick(t0 + DELAY);
        let uidata = model.get_uidata();
        assert_eq!(uidata.rows.len(), 30);
        assert_eq!(uidata.rows[0].cells[0], "Athlete 0");
        assert_eq!(uidata.rows[0].status, RowStatus::Loaded);
        assert_eq!(uidata.nrows, 200);
        assert!(!uidata.nrows_known);
    }

    #[test]
    fn scrolling_to_the_end_discovers_row_count() {
        let mut model = model(250);
        let mut now = Instant::now();
        model.tick(now);
        now += DELAY;
        model.tick(now);

        // Each jump to the end reveals one more block
        for _ in 0..3 {
            model.update(Some(Message::MoveEnd)).unwrap();
            model.tick(now);
            now += DELAY;
            model.tick(now);
        }
        let uidata = model.get_uidata();
        assert!(uidata.nrows_known);
        assert_eq!(uidata.nrows, 250);
        assert_eq!(uidata.abs_selected_row, 249);
        assert_eq!(uidata.rows.last().unwrap().cells[0], "Athlete 249");
    }

    #[test]
    fn column_search_highlights_and_scrolls() {
        let mut model = model_with(Box::new(FakeServer::new(dataset(10))), 60);
        model.tick(Instant::now());
        model.update(Some(Message::ColumnSearch)).unwrap();
        assert!(model.raw_keyevents());

        key(&mut model, KeyCode::Char('T'));
        key(&mut model, KeyCode::Char('o'));
        key(&mut model, KeyCode::Char('t'));
        assert_eq!(highlighted(&model), vec!["Total".to_string()]);
        assert!(model.header.offset_column > 0);
        assert_eq!(model.get_uidata().cmdinput.input, "Tot");

        key(&mut model, KeyCode::Enter);
        assert!(!model.raw_keyevents());
        assert_eq!(model.get_uidata().column_query, "Tot");
        assert_eq!(highlighted(&model), vec!["Total".to_string()]);

        // Reopening continues the query, escape clears it
        model.update(Some(Message::ColumnSearch)).unwrap();
        assert_eq!(model.get_uidata().cmdinput.input, "Tot");
        key(&mut model, KeyCode::Esc);
        assert!(highlighted(&model).is_empty());
        assert_eq!(model.get_uidata().column_query, "");
    }

    #[test]
    fn unmatched_search_clears_highlight() {
        let mut model = model(10);
        model.update(Some(Message::ColumnSearch)).unwrap();
        key(&mut model, KeyCode::Char('s'));
        assert_eq!(highlighted(&model), vec!["Sport".to_string()]);
        key(&mut model, KeyCode::Char('q'));
        assert!(highlighted(&model).is_empty());
        key(&mut model, KeyCode::Enter);
        assert_eq!(model.get_uidata().status_message, "No matching column!");
    }

    #[test]
    fn failed_blocks_are_shown_and_reloaded() {
        let mut model = model_with(Box::new(BrokenServer), 200);
        let t0 = Instant::now();
        model.tick(t0);
        model.tick(t0 + DELAY);
        let uidata = model.get_uidata();
        assert_eq!(uidata.rows[0].status, RowStatus::Failed);
        assert!(uidata.status_message.contains("failed"));
        assert_eq!(model.paging.in_flight(), 0);

        model.update(Some(Message::Reload)).unwrap();
        model.tick(t0 + DELAY);
        assert_eq!(model.paging.in_flight(), 1);
        assert_eq!(model.get_uidata().rows[0].status, RowStatus::Loading);
    }

    #[test]
    fn status_line_reports_rows_once_loaded() {
        let mut model = model(5);
        assert_eq!(model.get_uidata().status_message, "Loading ...");
        let t0 = Instant::now();
        model.tick(t0);
        assert_eq!(model.get_uidata().status_message, "Loading ...");

        model.tick(t0 + DELAY);
        assert!(model.get_uidata().nrows_known);
        assert_eq!(model.get_uidata().status_message, "5 rows");
    }

    #[test]
    fn status_line_shows_ready_while_row_count_unknown() {
        let mut model = model(250);
        let t0 = Instant::now();
        model.tick(t0);
        model.tick(t0 + DELAY);
        assert_eq!(model.get_uidata().status_message, "Ready");

        // Later deliveries keep user messages
        model.update(Some(Message::MoveEnd)).unwrap();
        model.set_status_message("Copied cell to clipboard");
        model.tick(t0 + DELAY);
        model.tick(t0 + DELAY * 2);
        assert_eq!(
            model.get_uidata().status_message,
            "Copied cell to clipboard"
        );
    }

    #[test]
    fn successful_reload_clears_loading_status() {
        // Fails the first request only
        struct FlakyServer {
            inner: FakeServer,
            failed: Cell<bool>,
        }

        impl RowSource for FlakyServer {
            fn get_data(&self, request: &PageRequest) -> ServerResponse {
                if !self.failed.replace(true) {
                    return ServerResponse {
                        success: false,
                        rows: Vec::new(),
                        last_row: None,
                    };
                }
                self.inner.get_data(request)
            }
        }

        let mut model = model_with(
            Box::new(FlakyServer {
                inner: FakeServer::new(dataset(5)),
                failed: Cell::new(false),
            }),
            200,
        );
        let t0 = Instant::now();
        model.tick(t0);
        model.tick(t0 + DELAY);
        assert!(model.get_uidata().status_message.contains("failed"));

        model.update(Some(Message::Reload)).unwrap();
        assert_eq!(model.get_uidata().status_message, "Reloading 1 blocks ...");
        model.tick(t0 + DELAY);
        model.tick(t0 + DELAY * 2);
        assert_eq!(model.get_uidata().rows[0].status, RowStatus::Loaded);
        assert_eq!(model.get_uidata().status_message, "5 rows");
    }

    #[test]
    fn record_view_shows_current_row() {
        let mut model = model(20);
        let t0 = Instant::now();
        model.tick(t0);
        model.tick(t0 + DELAY);
        model.update(Some(Message::MoveDown)).unwrap();
        model.update(Some(Message::Enter)).unwrap();

        let uidata = model.get_uidata();
        assert_eq!(uidata.name, "R[test]");
        assert_eq!(uidata.abs_selected_row, 1);
        assert_eq!(uidata.rows[0].cells, vec!["Athlete", "Athlete 1"]);
        assert_eq!(uidata.rows.len(), Field::ALL.len());

        model.update(Some(Message::MoveRight)).unwrap();
        assert_eq!(model.get_uidata().rows[0].cells[1], "Athlete 2");

        model.update(Some(Message::Exit)).unwrap();
        assert_eq!(model.get_uidata().name, "test");
        assert_eq!(model.get_uidata().abs_selected_row, 2);
    }

    #[test]
    fn enter_on_unloaded_row_stays_in_table() {
        let mut model = model(20);
        model.update(Some(Message::Enter)).unwrap();
        assert_eq!(model.get_uidata().name, "test");
        assert_eq!(model.get_uidata().status_message, "Row is not loaded yet");
    }

    #[test]
    fn help_popup_opens_and_closes() {
        let mut model = model(5);
        model.update(Some(Message::Help)).unwrap();
        assert!(model.get_uidata().show_popup);
        assert_eq!(model.get_uidata().popup_message, HELP_TEXT);
        model.update(Some(Message::Exit)).unwrap();
        assert!(!model.get_uidata().show_popup);
    }

    #[test]
    fn resize_keeps_selection_visible() {
        let mut model = model(250);
        let t0 = Instant::now();
        model.tick(t0);
        model.tick(t0 + DELAY);
        for _ in 0..25 {
            model.update(Some(Message::MoveDown)).unwrap();
        }
        model.update(Some(Message::Resize(80, 12))).unwrap();
        let uidata = model.get_uidata();
        assert_eq!(uidata.abs_selected_row, 25);
        assert!(uidata.selected_row < 10);
        assert_eq!(uidata.layout.table_height, 10);
    }

    #[test]
    fn empty_dataset_has_no_rows() {
        let mut model = model(0);
        let t0 = Instant::now();
        model.tick(t0);
        model.tick(t0 + DELAY);
        model.update(Some(Message::MoveEnd)).unwrap();
        let uidata = model.get_uidata();
        assert!(uidata.nrows_known);
        assert_eq!(uidata.nrows, 0);
        assert!(uidata.rows.is_empty());
    }

    #[test]
    fn cells_are_cut_to_column_width() {
        assert_eq!(fit_to_width("Michael Phelps", 20), "Michael Phelps");
        assert_eq!(fit_to_width("Michael Phelps", 8), "Michael…");
        assert_eq!(fit_to_width("abc", 0), "");
    }

    #[test]
    fn csv_row_wrapping() {
        assert_eq!(Model::wrap_cell_content("Swimming"), "Swimming");
        assert_eq!(Model::wrap_cell_content("United States"), "\"United States\"");
        assert_eq!(Model::wrap_cell_content("a\"b"), "\"a\"\"b\"");
    }
}
