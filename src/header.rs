use tracing::{error, trace};

use crate::columns::ColumnDescriptor;
use crate::filter::GridApi;
use crate::record::Field;

/// A column as it is laid out on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleColumn {
    pub idx: usize,
    pub width: usize,
    pub partial: bool,
}

/// Column definitions plus the horizontal viewport of the grid.
pub struct ColumnHeader {
    columns: Vec<ColumnDescriptor>,
    pub(crate) offset_column: usize,
    pub(crate) curser_column: usize, // Absolute column index
    visible: Vec<VisibleColumn>,
    table_width: usize,
    max_column_width: usize,
    needs_redraw: bool,
}

impl ColumnHeader {
    pub fn new(columns: Vec<ColumnDescriptor>, max_column_width: usize) -> Self {
        Self {
            columns,
            offset_column: 0,
            curser_column: 0,
            visible: Vec::new(),
            table_width: 0,
            max_column_width,
            needs_redraw: true,
        }
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn visible(&self) -> &[VisibleColumn] {
        &self.visible
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn current_column(&self) -> Option<&ColumnDescriptor> {
        self.columns.get(self.curser_column)
    }

    /// Returns whether the header changed since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::replace(&mut self.needs_redraw, false)
    }

    fn column_width(&self, column: &ColumnDescriptor) -> usize {
        let width = std::cmp::max(column.min_width, column.header_name.chars().count() + 2);
        std::cmp::min(width, self.max_column_width)
    }

    /// Fits columns starting at the column offset into `table_width`.
    pub fn layout(&mut self, table_width: usize) {
        self.table_width = table_width;
        self.visible.clear();

        let mut used = 0;
        for (idx, column) in self.columns.iter().enumerate().skip(self.offset_column) {
            let width = self.column_width(column);
            if used + width + 1 <= table_width {
                self.visible.push(VisibleColumn {
                    idx,
                    width,
                    partial: false,
                });
                used += width + 1;
            } else {
                // Add the last partial visible column
                if used + 1 < table_width {
                    self.visible.push(VisibleColumn {
                        idx,
                        width: table_width - used - 1,
                        partial: true,
                    });
                }
                used = table_width;
                break;
            }
        }

        // Columns flex to fill the remaining space
        if used < table_width && !self.visible.is_empty() {
            let spare = table_width - used;
            let share = spare / self.visible.len();
            let rest = spare % self.visible.len();
            for (i, column) in self.visible.iter_mut().enumerate() {
                column.width += share + usize::from(i < rest);
            }
        }
        trace!(
            "Header layout: offset {}, visible {:?}",
            self.offset_column,
            self.visible.iter().map(|c| c.idx).collect::<Vec<_>>()
        );
    }

    fn fully_visible(&self, idx: usize) -> bool {
        self.visible.iter().any(|c| c.idx == idx && !c.partial)
    }

    /// Shifts the column offset until column `idx` is completely on screen.
    pub fn scroll_to(&mut self, idx: usize) {
        if idx >= self.columns.len() {
            error!("Trying to scroll to unknown column {idx}!");
            return;
        }
        if idx < self.offset_column {
            self.offset_column = idx;
            self.layout(self.table_width);
        }
        while !self.fully_visible(idx) && self.offset_column < idx {
            self.offset_column += 1;
            self.layout(self.table_width);
        }
        self.needs_redraw = true;
    }

    pub fn select(&mut self, idx: usize) {
        self.curser_column = std::cmp::min(idx, self.columns.len().saturating_sub(1));
        self.scroll_to(self.curser_column);
    }

    pub fn move_left(&mut self) {
        self.select(self.curser_column.saturating_sub(1));
    }

    pub fn move_right(&mut self) {
        self.select(self.curser_column + 1);
    }
}

impl GridApi for ColumnHeader {
    fn ensure_column_visible(&mut self, field: Field) {
        if let Some(idx) = self.columns.iter().position(|c| c.field == field) {
            self.scroll_to(idx);
            // Keep the selection on screen
            if !self.visible.iter().any(|c| c.idx == self.curser_column) {
                self.curser_column = idx;
            }
        }
    }

    fn set_column_highlight(&mut self, field: Option<Field>) {
        for column in self.columns.iter_mut() {
            column.highlighted = Some(column.field) == field;
        }
    }

    fn refresh_header(&mut self) {
        self.needs_redraw = true;
    }
}
