//! A terminal data grid for the olympic medal winners dataset.
//!
//! The dataset is loaded once, then served to the grid through a paging
//! adapter that simulates a remote backend with a fixed latency per page.
//! A column search highlights and scrolls to the first matching header.

pub mod columns;
pub mod controller;
pub mod domain;
pub mod filter;
pub mod header;
pub mod inputter;
pub mod loader;
pub mod model;
pub mod paging;
pub mod record;
pub mod row_cache;
pub mod ui;
