use std::collections::HashMap;
use tracing::{debug, info};

use crate::paging::{PageRequest, PageResponse, RowSink};
use crate::record::Record;

#[derive(Debug, Clone, PartialEq)]
enum Block {
    Loading,
    Loaded(Vec<Record>),
    Failed,
}

#[derive(Debug, PartialEq)]
pub enum RowState<'a> {
    Loaded(&'a Record),
    Loading,
    Failed,
    Missing,
}

/// Block cache of the grid's server side row model.
pub struct RowCache {
    block_size: usize,
    blocks: HashMap<usize, Block>,
    row_count: Option<usize>,
    new_failures: Vec<PageRequest>,
    changed: bool,
}

impl RowCache {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            blocks: HashMap::new(),
            row_count: None,
            new_failures: Vec::new(),
            changed: false,
        }
    }

    /// Exact number of rows, known once a page reported the end of data.
    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }

    /// Rows the grid can scroll through: all rows when the count is known,
    /// otherwise everything loaded so far plus one block of placeholders.
    pub fn virtual_row_count(&self) -> usize {
        if let Some(count) = self.row_count {
            return count;
        }
        let loaded_end = self
            .blocks
            .iter()
            .filter_map(|(idx, block)| match block {
                Block::Loaded(rows) => Some(
                    idx.saturating_mul(self.block_size)
                        .saturating_add(rows.len()),
                ),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        loaded_end.saturating_add(self.block_size)
    }

    pub fn row(&self, ridx: usize) -> RowState<'_> {
        match self.blocks.get(&(ridx / self.block_size)) {
            Some(Block::Loaded(rows)) => rows
                .get(ridx % self.block_size)
                .map(RowState::Loaded)
                .unwrap_or(RowState::Missing),
            Some(Block::Loading) => RowState::Loading,
            Some(Block::Failed) => RowState::Failed,
            None => RowState::Missing,
        }
    }

    /// Blocks covering the `window` that were never requested.
    /// Marks them as loading and returns their requests.
    pub fn claim_missing(&mut self, window: &PageRequest) -> Vec<PageRequest> {
        let start = window.start_row;
        let end = match self.row_count {
            Some(count) => window.end_row.min(count),
            None => window.end_row,
        };
        if start >= end {
            return Vec::new();
        }
        let mut requests = Vec::new();
        for bidx in (start / self.block_size)..=((end - 1) / self.block_size) {
            if !self.blocks.contains_key(&bidx) {
                self.blocks.insert(bidx, Block::Loading);
                requests.push(PageRequest::block(bidx, self.block_size));
            }
        }
        requests
    }

    /// Forgets failed blocks so they get requested again.
    pub fn reset_failed(&mut self) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|_, block| *block != Block::Failed);
        let removed = before - self.blocks.len();
        if removed > 0 {
            self.changed = true;
        }
        removed
    }

    pub fn take_failures(&mut self) -> Vec<PageRequest> {
        std::mem::take(&mut self.new_failures)
    }

    pub fn take_changed(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }
}

impl RowSink for RowCache {
    // Late responses for blocks scrolled out of view are kept, rows never change.
    fn success(&mut self, request: PageRequest, response: PageResponse) {
        let bidx = request.start_row / self.block_size;
        debug!(
            "Block {} loaded with {} rows, last_row {:?}",
            bidx,
            response.rows.len(),
            response.last_row
        );
        if let Some(last_row) = response.last_row
            && self.row_count != Some(last_row)
        {
            info!("End of data reached at row {last_row}");
            self.row_count = Some(last_row);
        }
        self.blocks.insert(bidx, Block::Loaded(response.rows));
        self.changed = true;
    }

    fn fail(&mut self, request: PageRequest) {
        let bidx = request.start_row / self.block_size;
        self.blocks.insert(bidx, Block::Failed);
        self.new_failures.push(request);
        self.changed = true;
    }
}
