use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use structopt::StructOpt;
use tokio::sync::Notify;

use loggy::api::{AnalysisApi, HttpApiClient};
use loggy::config::Config;
use loggy::export::DiskFileSaver;
use loggy::models::JobStatus;
use loggy::notifications::{NotificationId, NotificationScheduler};
use loggy::orchestrator::JobOrchestrator;
use loggy::report::{preview, search, view, ReportCatalog, ReportOverview, ResultFilter, RiskFilter, SeverityFilter};
use loggy::upload::Uploader;

/// Log anomaly analysis client
#[derive(StructOpt, Debug)]
#[structopt(name = "loggy", about = "Upload logs, run anomaly analysis and browse security reports")]
struct Cli {
    /// Path to configuration file
    #[structopt(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Upload a .csv, .log or .txt file
    Upload {
        /// Path to log file
        file: PathBuf,
    },
    /// List uploaded files
    Files,
    /// Run the anomaly analysis for a file
    Analyze {
        #[structopt(long)]
        file_id: Option<i64>,
    },
    /// Show the per-line results of an analyzed file
    Results {
        #[structopt(long)]
        file_id: i64,
        /// Case-insensitive text to look for in log lines
        #[structopt(short, long, default_value = "")]
        search: String,
        /// all, anomalies, or a severity such as critical
        #[structopt(long, default_value = "all")]
        severity: SeverityFilter,
        /// Show every match instead of the first page
        #[structopt(long)]
        all: bool,
    },
    /// List security reports
    Reports {
        /// Matches file names and risk levels
        #[structopt(short, long, default_value = "")]
        search: String,
        /// all, critical, high, medium, low or minimal
        #[structopt(long, default_value = "all")]
        level: RiskFilter,
    },
    /// Show one security report in detail
    Show {
        #[structopt(long)]
        report_id: i64,
    },
    /// Download a security report as JSON
    Export {
        #[structopt(long)]
        report_id: i64,
    },
}

/// Prints each notification once, as it appears
struct NotificationPrinter {
    seen: Arc<Mutex<HashSet<NotificationId>>>,
}

impl NotificationPrinter {
    fn spawn(notifier: &NotificationScheduler) -> Self {
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let printer = NotificationPrinter { seen: seen.clone() };
        let mut updates = notifier.subscribe();

        tokio::spawn(async move {
            while updates.changed().await.is_ok() {
                let visible = updates.borrow_and_update().clone();
                print_new(&seen, &visible);
            }
        });

        printer
    }

    /// Print whatever the background task has not reached yet
    fn flush(&self, notifier: &NotificationScheduler) {
        print_new(&self.seen, &notifier.currently_visible());
    }
}

fn print_new(seen: &Mutex<HashSet<NotificationId>>, visible: &[loggy::Notification]) {
    let mut seen = match seen.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    for notification in visible {
        if seen.insert(notification.id) {
            eprintln!("{}", notification);
        }
    }
}

fn print_overview(overview: &ReportOverview) {
    if !overview.analyzed {
        println!("  Not analyzed yet");
        return;
    }
    println!("  Total lines:    {}", overview.total_lines);
    println!("  Anomalies:      {}", overview.anomaly_count);
    println!("  Critical:       {}", overview.critical_count);
    println!("  Anomaly rate:   {:.2}%", overview.anomaly_rate);
    match (overview.risk_score, overview.risk_level) {
        (Some(score), Some(level)) => println!("  Risk:           {} ({}/100)", level, score),
        _ => println!("  Risk:           n/a"),
    }
    if !overview.severity_distribution.is_empty() {
        println!("  By severity:");
        for (severity, count) in &overview.severity_distribution {
            println!("    {:<10} {}", severity.as_str(), count);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::from_args();

    if let Command::Config { output } = &cli.command {
        Config::default().to_file(output)?;
        println!("Default configuration written to: {:?}", output);
        return Ok(());
    }

    let config = if cli.config.exists() {
        Config::from_file(&cli.config)?
    } else {
        log::warn!("Config file {:?} not found, using defaults", cli.config);
        Config::default()
    };

    let api: Arc<dyn AnalysisApi> = Arc::new(HttpApiClient::new(&config.api)?);
    let notifier = NotificationScheduler::with_default_duration(config.notifications.default_duration());
    let printer = NotificationPrinter::spawn(&notifier);

    let succeeded = run(cli.command, &config, api, &notifier).await?;

    printer.flush(&notifier);
    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(
    command: Command,
    config: &Config,
    api: Arc<dyn AnalysisApi>,
    notifier: &NotificationScheduler,
) -> Result<bool, Box<dyn std::error::Error>> {
    let catalog = ReportCatalog::new(
        api.clone(),
        notifier.clone(),
        Arc::new(DiskFileSaver::new(config.export.output_dir.clone())),
    );

    match command {
        Command::Config { .. } => Ok(true),
        Command::Upload { file } => {
            let uploader = Uploader::new(api, notifier.clone());
            match uploader.upload(&file).await {
                Some(file_id) => {
                    println!("Uploaded {:?} as file {}", file, file_id);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
        Command::Files => {
            let files = api.list_files().await?;
            println!("{} file(s):\n", files.len());
            for file in files {
                println!(
                    "  #{:<5} {:<40} {:>8} lines {:>10} bytes  {}",
                    file.id,
                    file.filename,
                    file.total_lines,
                    file.file_size,
                    if file.is_analyzed { "analyzed" } else { "pending" }
                );
            }
            Ok(true)
        }
        Command::Analyze { file_id } => analyze(file_id, config, api, notifier).await,
        Command::Results {
            file_id,
            search,
            severity,
            all,
        } => {
            let orchestrator = JobOrchestrator::new(api, notifier.clone(), config.analysis.clone());
            orchestrator.load_existing(file_id).await;

            println!("File {}:", file_id);
            print_overview(&orchestrator.overview());

            let results = match orchestrator.results() {
                Some(results) => results,
                None => {
                    println!("\nNo results available yet");
                    return Ok(true);
                }
            };
            let limit = if all { usize::MAX } else { config.report.view_limit };
            let page = view(&results.results, &ResultFilter::new(search, severity), limit);

            println!("\nShowing {} of {} matching line(s):\n", page.records.len(), page.total_matches);
            for record in &page.records {
                println!(
                    "  {:>6}  {:<8} {}{}",
                    record.line_number,
                    record.severity.as_str(),
                    if record.is_anomaly { "! " } else { "  " },
                    preview(&record.content, config.report.preview_chars)
                );
            }
            if page.is_truncated() {
                println!("\nUse --all to show every match");
            }
            Ok(true)
        }
        Command::Reports { search: term, level } => {
            let reports = catalog.list().await;
            let matches = search(&reports, &term, level);
            println!("{} report(s):\n", matches.len());
            for report in matches {
                println!(
                    "  #{:<5} {:<40} {:<20} {}",
                    report.id,
                    report.filename,
                    report
                        .created_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_default(),
                    match (report.risk_level(), report.risk_score()) {
                        (Some(level), Some(score)) => format!("{} ({})", level, score),
                        _ => "n/a".to_string(),
                    }
                );
            }
            Ok(true)
        }
        Command::Show { report_id } => {
            let report = match catalog.find(report_id).await {
                Some(report) => report,
                None => {
                    eprintln!("Report not found: {}", report_id);
                    return Ok(false);
                }
            };
            let detail = catalog.open(&report).await;

            println!("Report #{} for {}", detail.report.id, detail.report.filename);
            print_overview(&detail.overview);

            let attacks = detail.report.potential_attacks();
            if !attacks.is_empty() {
                println!("\nPotential attacks:");
                for attack in attacks {
                    println!("  [{}] {}: {}", attack.severity, attack.attack_type, attack.description);
                    if !attack.indicators.is_empty() {
                        println!("      Indicators: {}", attack.indicators);
                    }
                    if !attack.recommendation.is_empty() {
                        println!("      > {}", attack.recommendation);
                    }
                }
            }

            let recommendations = detail.report.recommendations();
            if !recommendations.is_empty() {
                println!("\nRecommendations:");
                for (i, recommendation) in recommendations.iter().enumerate() {
                    println!("  {}. {}", i + 1, recommendation);
                }
            }
            Ok(true)
        }
        Command::Export { report_id } => match catalog.export(report_id).await {
            Some(path) => {
                println!("Saved to {:?}", path);
                Ok(true)
            }
            None => Ok(false),
        },
    }
}

/// Run one analysis with a live progress line. Ctrl+C tears the job down.
async fn analyze(
    file_id: Option<i64>,
    config: &Config,
    api: Arc<dyn AnalysisApi>,
    notifier: &NotificationScheduler,
) -> Result<bool, Box<dyn std::error::Error>> {
    let interrupted = Arc::new(Notify::new());
    let signal = interrupted.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt, abandoning analysis...");
        signal.notify_one();
    })?;

    let orchestrator = JobOrchestrator::new(api, notifier.clone(), config.analysis.clone());
    let run = orchestrator.start(file_id);
    tokio::pin!(run);
    let mut ticker = tokio::time::interval(config.analysis.progress_interval());

    let status = loop {
        tokio::select! {
            status = &mut run => break Some(status),
            _ = interrupted.notified() => break None,
            _ = ticker.tick() => {
                if orchestrator.status() == JobStatus::Running {
                    eprint!("\rProgress: {:>3}%", orchestrator.progress());
                }
            }
        }
    };
    eprintln!();

    match status {
        Some(JobStatus::Completed) => {
            print_overview(&orchestrator.overview());
            Ok(true)
        }
        Some(_) => Ok(false),
        None => {
            orchestrator.teardown();
            println!("Analysis abandoned");
            Ok(false)
        }
    }
}
