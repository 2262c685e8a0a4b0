mod config;
mod delivery;
mod drawdown;
mod error;
mod indicator;
mod model;
mod render;
mod report;
mod source;
mod table;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use tracing::{Instrument, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use config::AppConfig;
use delivery::log::LogDelivery;
use delivery::smtp::{self, SmtpDelivery};
use delivery::{Delivery, Envelope};
use indicator::IndicatorDeriver;
use model::{DrawdownPoint, Lookback};
use render::Renderer;
use render::png::PngRenderer;
use render::svg::SvgTableRenderer;
use report::ReportAssembler;
use source::SeriesSource;
use source::yahoo::YahooSource;

const DEFAULT_SUBJECT: &str = "Market drawdown report";

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("price source error")]
    Source,
    #[display("render error")]
    Render,
    #[display("delivery error")]
    Delivery,
}

#[derive(Parser)]
#[command(name = "mdd-monitor", about = "Drawdown and trend reports for a watchlist")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build every configured report and deliver the images (default)
    Run {
        /// Render and write images but log the mail instead of sending it
        #[arg(long)]
        dry_run: bool,
    },
    /// Drawdown study of one instrument over its full history
    Mdd {
        symbol: String,
        /// Write a daily drawdown chart (SVG) to this path
        #[arg(long)]
        chart: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();

    // A missing .env file is fine; the variables may come from the environment.
    let _ = dotenvy::dotenv();

    let config = config::load(&cli.config).change_context(AppError::Config)?;
    init_tracing(&config);

    let span = tracing::info_span!("run", run_id = %Uuid::new_v4());
    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => run_reports(&config, dry_run).instrument(span).await,
        Command::Mdd { symbol, chart } => {
            study_drawdown(&config, &symbol, chart.as_deref())
                .instrument(span)
                .await
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::new(&config.general.log_level);
    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn build_delivery(config: &AppConfig, dry_run: bool) -> Result<Box<dyn Delivery>, Report<AppError>> {
    match &config.mail {
        Some(mail) if mail.enabled && !dry_run => {
            let password =
                smtp::password_from_env(&mail.password_env).change_context(AppError::Delivery)?;
            let delivery = SmtpDelivery::new(mail, password).change_context(AppError::Delivery)?;
            Ok(Box::new(delivery))
        }
        _ => Ok(Box::new(LogDelivery)),
    }
}

async fn run_reports(config: &AppConfig, dry_run: bool) -> Result<(), Report<AppError>> {
    // Resolve credentials before spending minutes on fetches.
    let delivery = build_delivery(config, dry_run)?;

    let source = YahooSource::new(&config.source).change_context(AppError::Source)?;
    let now = Local::now();
    let deriver = IndicatorDeriver::new(&config.indicators, now.date_naive())
        .change_context(AppError::Config)?;
    let assembler = ReportAssembler::new(
        &source,
        &deriver,
        config.indicators.drawdown_window,
        config.general.concurrency,
        Duration::from_secs(config.general.instrument_timeout_secs),
    );
    let renderer = PngRenderer::new(
        SvgTableRenderer::new(config.styling.font_family.as_str()),
        config.styling.image_scale,
    );
    let caption = format!("As of {}", now.format("%Y-%m-%d %H:%M"));
    let output_dir = Path::new(&config.general.output_dir);

    info!(
        source = source.name(),
        delivery = delivery.name(),
        reports = config.reports.len(),
        "run started"
    );

    let mut attachments = Vec::with_capacity(config.reports.len());
    for report_config in &config.reports {
        let rows = assembler.assemble(report_config).await;
        let table = table::build(
            &report_config.title,
            caption.clone(),
            &report_config.columns,
            &rows,
            &config.indicators,
            &config.styling,
        );
        let image = renderer
            .render(&table, &report_config.file_name)
            .change_context(AppError::Render)
            .attach_with(|| format!("report: {}", report_config.title))?;
        render::write_image(output_dir, &image).change_context(AppError::Render)?;
        attachments.push(image);
    }

    let (subject, body) = match &config.mail {
        Some(mail) => (mail.subject.clone(), mail.body.clone()),
        None => (DEFAULT_SUBJECT.to_string(), String::new()),
    };
    let envelope = Envelope {
        subject: format!("{subject} ({})", now.format("%Y-%m-%d")),
        body,
        attachments,
    };
    delivery
        .deliver(&envelope)
        .await
        .change_context(AppError::Delivery)?;

    info!(images = envelope.attachments.len(), "run complete");
    Ok(())
}

async fn study_drawdown(
    config: &AppConfig,
    symbol: &str,
    chart: Option<&Path>,
) -> Result<(), Report<AppError>> {
    let source = YahooSource::new(&config.source).change_context(AppError::Source)?;
    let series = source
        .fetch_history(symbol, Lookback::Max)
        .await
        .change_context(AppError::Source)?;

    let points: Vec<DrawdownPoint> = drawdown::daily_drawdown(&series).collect();
    let Some(stats) = drawdown::summary_statistics(points.iter().copied()) else {
        return Err(Report::new(AppError::Source).attach(format!("no history for {symbol}")));
    };

    let last = series.last();
    let channel = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
    println!("{symbol} ({} samples since {})", series.len(), series.first().date);
    println!(
        "Latest bar {}:    open {} high {:.2} low {} close {:.2}",
        last.date,
        channel(last.open),
        last.high,
        channel(last.low),
        last.close
    );
    println!("Current price:        {:.2}", last.close);
    println!("Current drawdown:     {:.2}%", drawdown::current_drawdown(&series));
    println!("Daily drawdown (latest):");
    for point in &points[points.len().saturating_sub(5)..] {
        println!("  {}  {:>8.2}%", point.date, point.drawdown_pct);
    }
    println!("Mean daily drawdown:  {:.2}%", stats.mean_pct);
    println!("Worst daily drawdown: {:.2}%", stats.worst_pct);
    println!("Drawdown by year:");
    for (year, pct) in drawdown::yearly_drawdown(&series) {
        println!("  {year}  {pct:>8.2}%");
    }

    if let Some(path) = chart {
        let image = render::chart::render_drawdown_chart(symbol, &points, stats)
            .change_context(AppError::Render)?;
        render::write_file(path, &image.bytes).change_context(AppError::Render)?;
        println!("Chart written to {}", path.display());
    }

    Ok(())
}
