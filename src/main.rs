use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use partscrape::spreadsheet::template;
use partscrape::{
    logging, ComponentRecord, Config, EventSink, RowResolver, RunEvent, TableReconciler, TracingSink,
    WebDriverFetcher, XlsxTable,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "partscrape", version, about = "Fill a component spreadsheet with JLCPCB catalog data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new component table with the styled header row
    Template {
        /// Workbook to create (.xlsx)
        file: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
        /// Part number to add as a row (repeatable)
        #[arg(short, long = "part")]
        parts: Vec<String>,
    },
    /// Look up every row in the catalog and save the results into the table
    Run {
        /// Component table (.xlsx)
        file: PathBuf,
        /// TOML config file (default: built-in settings)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// WebDriver endpoint, e.g. http://localhost:9515
        #[arg(long)]
        webdriver: Option<String>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// trace, debug, info, warn or error
        #[arg(long)]
        log_level: Option<String>,
    },
}

/// Feeds run events into a progress bar; log lines are printed above it
struct ProgressSink {
    bar: ProgressBar,
    logs: TracingSink,
}

impl ProgressSink {
    fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}%")?
                .progress_chars("=> "),
        );
        Ok(Self { bar, logs: TracingSink })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl EventSink for ProgressSink {
    fn emit(&mut self, event: RunEvent) {
        match event {
            RunEvent::Progress(percent) => self.bar.set_position(percent as u64),
            event => {
                let logs = &mut self.logs;
                self.bar.suspend(|| logs.emit(event));
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Template { file, force, parts } => {
            logging::init("info");
            let records: Vec<ComponentRecord> = parts
                .iter()
                .map(|part| ComponentRecord::from_cells([part.trim()]))
                .collect();
            template::write(&file, &records, force)
                .with_context(|| format!("Failed to create {}", file.display()))?;
            println!("Created {} ({} rows)", file.display(), records.len());
            Ok(())
        }
        Commands::Run { file, config, webdriver, headful, log_level } => {
            let mut config = match &config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            if let Some(url) = webdriver {
                config.browser.webdriver_url = url;
            }
            if headful {
                config.browser.headless = false;
            }
            if let Some(level) = log_level {
                config.logging.level = level;
            }
            config.validate()?;
            logging::init(&config.logging.level);
            run(&file, &config).await
        }
    }
}

async fn run(file: &Path, config: &Config) -> anyhow::Result<()> {
    let reconciler = TableReconciler::new(RowResolver::from_config(config)?);
    let mut table = XlsxTable::open(file)?;
    let mut sink = ProgressSink::new()?;
    let mut fetcher = WebDriverFetcher::connect(&config.browser)
        .await
        .context("Is chromedriver running? Start it or pass --webdriver")?;

    let result = reconciler.run(&mut table, &mut fetcher, &mut sink).await;
    sink.finish();

    let summary = result?;
    println!(
        "{}: {} rows, {} updated, {} skipped, {} failed",
        file.display(),
        summary.total,
        summary.updated,
        summary.skipped,
        summary.failed
    );
    Ok(())
}
