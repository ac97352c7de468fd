use std::path::PathBuf;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

/// Where the olympic winners dataset is fetched from when no source is given.
pub const DEFAULT_DATASET_URL: &str = "https://raw.githubusercontent.com/ag-grid/ag-grid/master/grid-packages/ag-grid-docs/src/olympicWinners.json";

/// Artificial latency of every page delivered by the paging adapter.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 500;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(DEFAULT_PAGE_DELAY_MS);

/// Event poll interval of the main loop.
pub const DEFAULT_EVENT_POLL_MS: u64 = 100;

/// Number of rows requested per block by the grid.
pub const DEFAULT_BLOCK_SIZE: usize = 100;

pub const HELP_TEXT: &str = "\
Navigation
  ↑ ↓ ← → / k j h l   move selection
  PgUp PgDn           move one page
  g / G               first / last row
  0 / $               first / last column

Columns
  /                   search column names (Esc clears)

Rows
  Enter               show record
  Esc                 back to table
  c / C               copy cell / row
  r                   reload failed blocks

  ?                   this help
  q                   quit";

#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Loading failed: {0}")]
    LoadingFailed(String),
    #[error("File not found: {0:?}")]
    FileNotFound(PathBuf),
    #[error("Permission denied: {0:?}")]
    PermissionDenied(PathBuf),
    #[error("Unknown file type: {0:?}")]
    UnknownFileType(PathBuf),
    #[error("Invalid page request [{start}, {end})")]
    InvalidPageRequest { start: usize, end: usize },
    #[error("Logging setup failed: {0}")]
    LoggingFailed(String),
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct GridConfig {
    pub event_poll_time: u64,
    pub page_delay: Duration,
    pub block_size: usize,
    pub max_column_width: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            event_poll_time: DEFAULT_EVENT_POLL_MS,
            page_delay: DEFAULT_PAGE_DELAY,
            block_size: DEFAULT_BLOCK_SIZE,
            max_column_width: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    ColumnSearch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    MoveToFirstColumn,
    MoveToLastColumn,
    Resize(usize, usize),
    CopyCell,
    CopyRow,
    Help,
    ColumnSearch,
    Reload,
    Enter,
    Exit,
    RawKey(KeyEvent),
}
