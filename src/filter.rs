use tracing::trace;

use crate::columns::ColumnDescriptor;
use crate::record::Field;

/// Commands the column filter sends to the grid.
pub trait GridApi {
    fn ensure_column_visible(&mut self, field: Field);
    fn set_column_highlight(&mut self, field: Option<Field>);
    fn refresh_header(&mut self);
}

/// Highlights the first column whose header contains the query.
#[derive(Debug, Clone)]
pub struct ColumnFilterController {
    columns: Vec<ColumnDescriptor>,
    query: String,
}

impl ColumnFilterController {
    pub fn new(columns: &[ColumnDescriptor]) -> Self {
        let mut columns = columns.to_vec();
        columns.iter_mut().for_each(|c| c.highlighted = false);
        Self {
            columns,
            query: String::new(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn highlighted(&self) -> Option<Field> {
        self.columns.iter().find(|c| c.highlighted).map(|c| c.field)
    }

    /// Called on every change of the search input.
    pub fn on_query_change<A: GridApi + ?Sized>(&mut self, query: &str, api: &mut A) {
        self.query = query.to_string();

        let focused = if query.is_empty() {
            None
        } else {
            let needle = query.to_lowercase();
            self.columns
                .iter()
                .find(|c| c.header_name.to_lowercase().contains(&needle))
                .map(|c| c.field)
        };
        trace!("Column query \"{query}\" matches {focused:?}");

        if let Some(field) = focused {
            api.ensure_column_visible(field);
        }

        if focused != self.highlighted() {
            for column in self.columns.iter_mut() {
                column.highlighted = Some(column.field) == focused;
            }
            api.set_column_highlight(focused);
            api.refresh_header();
        }
    }
}
