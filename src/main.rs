use clap::Parser;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, prelude::*};

use medalgrid::columns;
use medalgrid::controller::Controller;
use medalgrid::domain::{
    DEFAULT_BLOCK_SIZE, DEFAULT_DATASET_URL, DEFAULT_EVENT_POLL_MS, DEFAULT_PAGE_DELAY_MS,
    GridConfig, GridError,
};
use medalgrid::loader::{self, DataSource};
use medalgrid::model::{Model, Status};
use medalgrid::paging::{FakeServer, PagingAdapter, RowSource};
use medalgrid::ui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Olympic medal winners in a paged terminal grid", long_about = None)]
struct Args {
    /// URL or path (json, csv, parquet) of the dataset
    #[arg(default_value = DEFAULT_DATASET_URL)]
    source: String,

    /// Artificial latency of every page in milliseconds
    #[arg(long, default_value_t = DEFAULT_PAGE_DELAY_MS)]
    page_delay_ms: u64,

    /// Rows per requested block
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// How long to wait for terminal events before redrawing, in milliseconds
    #[arg(long, default_value_t = DEFAULT_EVENT_POLL_MS)]
    event_poll_ms: u64,

    /// Log file, the terminal belongs to the grid
    #[arg(long, default_value = "medalgrid.log")]
    log_file: PathBuf,
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(e) = init_logging(&args.log_file) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    match run(args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn init_logging(path: &Path) -> Result<(), GridError> {
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| GridError::LoggingFailed(e.to_string()))
}

fn run(args: Args) -> Result<(), GridError> {
    info!("Starting medalgrid with {:?}", args);

    let config = GridConfig::default()
        .with_event_poll_time(args.event_poll_ms)
        .with_page_delay(Duration::from_millis(args.page_delay_ms))
        .with_block_size(args.block_size.max(1));

    let source = DataSource::parse(&args.source)?;
    println!("Loading {} ...", args.source);
    let dataset = loader::load_dataset(&source)?;
    let name = match &source {
        DataSource::Url(url) => url.rsplit('/').next().unwrap_or("???").to_string(),
        DataSource::File(path) => path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string(),
    };

    let server: Box<dyn RowSource> = Box::new(FakeServer::new(dataset));
    let paging = PagingAdapter::new(server, config.page_delay);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &config, &name, paging);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut ratatui::DefaultTerminal,
    config: &GridConfig,
    name: &str,
    paging: PagingAdapter<Box<dyn RowSource>>,
) -> Result<(), GridError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        name,
        config,
        paging,
        columns::default_columns(),
        size.width as usize,
        size.height as usize,
    );
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        model.tick(Instant::now());

        // Render the current view
        terminal.draw(|f| ui::draw(model.get_uidata(), f))?;

        // Handle events and map to a Message
        let timeout = model.poll_timeout(Instant::now());
        let message = controller.handle_event(&model, Some(timeout))?;
        model.update(message)?;
    }

    Ok(())
}
