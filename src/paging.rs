//! Simulated server side paging over a fully loaded dataset.
//!
//! The grid asks for row windows with [`PagingAdapter::get_rows`]. The answer is
//! computed right away by a [`RowSource`] but only handed back to the grid once
//! the page delay has passed, when the event loop calls
//! [`PagingAdapter::dispatch_due`]. Every request keeps its own due time, nothing
//! is ever cancelled and responses may arrive out of request order.

use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::domain::GridError;
use crate::record::Record;

/// Half open row range `[start_row, end_row)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub start_row: usize,
    pub end_row: usize,
}

impl PageRequest {
    pub fn new(start_row: usize, end_row: usize) -> Result<Self, GridError> {
        if end_row < start_row {
            return Err(GridError::InvalidPageRequest {
                start: start_row,
                end: end_row,
            });
        }
        Ok(Self { start_row, end_row })
    }

    /// The request covering block `block_idx` of a grid with `block_size` rows per block.
    pub fn block(block_idx: usize, block_size: usize) -> Self {
        let start_row = block_idx.saturating_mul(block_size);
        Self {
            start_row,
            end_row: start_row.saturating_add(block_size),
        }
    }

    pub fn len(&self) -> usize {
        self.end_row - self.start_row
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rows of a single request plus the end of data marker.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResponse {
    pub rows: Vec<Record>,
    /// Index of the first row beyond the dataset, `None` while more rows may exist.
    pub last_row: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerResponse {
    pub success: bool,
    pub rows: Vec<Record>,
    pub last_row: Option<usize>,
}

/// Backend answering page requests.
pub trait RowSource {
    fn get_data(&self, request: &PageRequest) -> ServerResponse;
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn get_data(&self, request: &PageRequest) -> ServerResponse {
        (**self).get_data(request)
    }
}

/// Receiver of delivered pages, implemented by the grid.
pub trait RowSink {
    fn success(&mut self, request: PageRequest, response: PageResponse);
    fn fail(&mut self, request: PageRequest);
}

/// The end of data marker: set when fewer rows than requested came back.
pub fn last_row_index(request: &PageRequest, returned: usize) -> Option<usize> {
    let current_last_row = request.start_row + returned;
    if current_last_row < request.end_row {
        Some(current_last_row)
    } else {
        None
    }
}

/// In memory backend slicing the whole dataset.
#[derive(Debug, Default)]
pub struct FakeServer {
    data: Vec<Record>,
}

impl FakeServer {
    pub fn new(data: Vec<Record>) -> Self {
        Self { data }
    }
}

impl RowSource for FakeServer {
    fn get_data(&self, request: &PageRequest) -> ServerResponse {
        let len = self.data.len();
        let start = request.start_row.min(len);
        let end = request.end_row.min(len);
        let rows = self.data[start..end].to_vec();
        let last_row = last_row_index(request, rows.len());
        ServerResponse {
            success: true,
            rows,
            last_row,
        }
    }
}

/// Identifies one in flight request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageTicket(u64);

struct PendingPage {
    ticket: PageTicket,
    request: PageRequest,
    due: Instant,
    response: ServerResponse,
}

pub struct PagingAdapter<S: RowSource> {
    source: S,
    page_delay: Duration,
    pending: Vec<PendingPage>,
    next_ticket: u64,
}

impl<S: RowSource> PagingAdapter<S> {
    pub fn new(source: S, page_delay: Duration) -> Self {
        Self {
            source,
            page_delay,
            pending: Vec::new(),
            next_ticket: 0,
        }
    }

    /// Queries the source and schedules delivery of the answer at `now + page_delay`.
    pub fn get_rows(&mut self, request: PageRequest, now: Instant) -> PageTicket {
        let ticket = PageTicket(self.next_ticket);
        self.next_ticket += 1;

        let response = self.source.get_data(&request);
        trace!(
            "Scheduled {:?} for rows [{}, {}), {} rows, last_row {:?}",
            ticket,
            request.start_row,
            request.end_row,
            response.rows.len(),
            response.last_row
        );
        self.pending.push(PendingPage {
            ticket,
            request,
            due: now + self.page_delay,
            response,
        });
        ticket
    }

    /// Hands every response that is due at `now` to the sink, earliest due first.
    /// Returns the number of delivered responses.
    pub fn dispatch_due<K: RowSink + ?Sized>(&mut self, now: Instant, sink: &mut K) -> usize {
        let (mut due, waiting): (Vec<PendingPage>, Vec<PendingPage>) =
            std::mem::take(&mut self.pending)
                .into_iter()
                .partition(|p| p.due <= now);
        self.pending = waiting;
        due.sort_by_key(|p| (p.due, p.ticket));

        let delivered = due.len();
        for page in due {
            if page.response.success {
                sink.success(
                    page.request,
                    PageResponse {
                        rows: page.response.rows,
                        last_row: page.response.last_row,
                    },
                );
            } else {
                debug!(
                    "Source failed rows [{}, {}) for {:?}",
                    page.request.start_row, page.request.end_row, page.ticket
                );
                sink.fail(page.request);
            }
        }
        delivered
    }

    /// Earliest due time of all requests still in flight.
    pub fn next_due(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.due).min()
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_millis(500);

    fn dataset(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record {
                athlete: format!("Athlete {i}"),
                year: 2000 + i as u32,
                ..Default::default()
            })
            .collect()
    }

    #[derive(Default)]
    struct Collected {
        successes: Vec<(PageRequest, PageResponse)>,
        failures: Vec<PageRequest>,
    }

    impl RowSink for Collected {
        fn success(&mut self, request: PageRequest, response: PageResponse) {
            self.successes.push((request, response));
        }

        fn fail(&mut self, request: PageRequest) {
            self.failures.push(request);
        }
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

    fn fetch(data: &[Record], start: usize, end: usize) -> PageResponse {
        let mut adapter = PagingAdapter::new(FakeServer::new(data.to_vec()), DELAY);
        let now = Instant::now();
        adapter.get_rows(PageRequest::new(start, end).unwrap(), now);
        let mut sink = Collected::default();
        assert_eq!(adapter.dispatch_due(now + DELAY, &mut sink), 1);
        sink.successes.pop().unwrap().1
    }

    #[test]
    fn request_rejects_inverted_range() {
        assert!(matches!(
            PageRequest::new(10, 5),
            Err(GridError::InvalidPageRequest { start: 10, end: 5 })
        ));
        assert!(PageRequest::new(5, 5).unwrap().is_empty());
    }

    #[test]
    fn huge_blocks_stay_in_range() {
        let request = PageRequest::block(2, usize::MAX);
        assert_eq!(request.start_row, usize::MAX);
        assert_eq!(request.end_row, usize::MAX);
        assert!(request.is_empty());

        let request = PageRequest::block(0, usize::MAX);
        assert_eq!(request.len(), usize::MAX);
    }

    #[test]
    fn window_inside_dataset_has_no_end_marker() {
        let data = dataset(250);
        for (start, end) in [(0, 100), (100, 200), (150, 250), (249, 250)] {
            let response = fetch(&data, start, end);
            assert_eq!(response.rows, data[start..end].to_vec());
            assert_eq!(response.last_row, None);
        }
    }

    #[test]
    fn window_past_the_end_is_clipped_and_marks_end() {
        let data = dataset(250);
        let response = fetch(&data, 200, 300);
        assert_eq!(response.rows, data[200..250].to_vec());
        assert_eq!(response.last_row, Some(250));
    }

    #[test]
    fn empty_window_follows_marker_rule() {
        let data = dataset(10);
        let response = fetch(&data, 4, 4);
        assert!(response.rows.is_empty());
        assert_eq!(response.last_row, None);

        let response = fetch(&data, 20, 30);
        assert!(response.rows.is_empty());
        assert_eq!(response.last_row, Some(20));
    }

    #[test]
    fn delivery_waits_for_page_delay() {
        let mut adapter = PagingAdapter::new(FakeServer::new(dataset(10)), DELAY);
        let now = Instant::now();
        adapter.get_rows(PageRequest::block(0, 5), now);
        assert_eq!(adapter.next_due(), Some(now + DELAY));

        let mut sink = Collected::default();
        assert_eq!(adapter.dispatch_due(now, &mut sink), 0);
        assert_eq!(
            adapter.dispatch_due(now + DELAY - Duration::from_millis(1), &mut sink),
            0
        );
        assert_eq!(adapter.in_flight(), 1);
        assert_eq!(adapter.dispatch_due(now + DELAY, &mut sink), 1);
        assert_eq!(adapter.in_flight(), 0);
        assert_eq!(adapter.next_due(), None);
        assert_eq!(sink.successes.len(), 1);
    }

    #[test]
    fn out_of_order_completion_keeps_ranges_apart() {
        let data = dataset(300);
        let mut adapter = PagingAdapter::new(FakeServer::new(data.clone()), DELAY);
        let now = Instant::now();
        let first = PageRequest::new(0, 100).unwrap();
        let second = PageRequest::new(200, 300).unwrap();
        // The first request is issued later and therefore completes last
        adapter.get_rows(first, now + Duration::from_millis(100));
        adapter.get_rows(second, now);

        let mut sink = Collected::default();
        assert_eq!(adapter.dispatch_due(now + DELAY * 2, &mut sink), 2);
        assert_eq!(sink.successes[0].0, second);
        assert_eq!(sink.successes[0].1.rows, data[200..300].to_vec());
        assert_eq!(sink.successes[1].0, first);
        assert_eq!(sink.successes[1].1.rows, data[0..100].to_vec());
    }

    #[test]
    fn failing_source_is_reported_without_rows() {
        let mut adapter = PagingAdapter::new(BrokenServer, DELAY);
        let now = Instant::now();
        let request = PageRequest::block(1, 100);
        adapter.get_rows(request, now);

        let mut sink = Collected::default();
        adapter.dispatch_due(now + DELAY, &mut sink);
        assert!(sink.successes.is_empty());
        assert_eq!(sink.failures, vec![request]);
    }

    #[test]
    fn boxed_sources_delegate() {
        let source: Box<dyn RowSource> = Box::new(FakeServer::new(dataset(3)));
        let response = source.get_data(&PageRequest::new(0, 10).unwrap());
        assert_eq!(response.rows.len(), 3);
        assert_eq!(response.last_row, Some(3));
    }
}
