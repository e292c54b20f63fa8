use clap::Parser;
use sidebar_verify::{Checkpoint, SettleStrategy, VerifyConfig};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "sidebar-verify")]
#[command(about = "Click a sidebar toggle twice in a headless browser and screenshot each state")]
#[command(version)]
struct Cli {
    /// YAML file overriding the built-in target, timeouts and output settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate config without running
    #[arg(long)]
    check: bool,

    /// Exit with status 1 when a verification step fails
    #[arg(long)]
    strict: bool,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> sidebar_verify::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    let config = match cli.config {
        Some(ref path) => VerifyConfig::load(path)?,
        None => VerifyConfig::default(),
    };

    if cli.check {
        println!("Config valid");
        println!("  Target: {}", config.target.url);
        println!("  Heading: {}", config.target.heading);
        println!("  Toggle label: {}", config.target.toggle_label);
        println!(
            "  Viewport: {}x{}",
            config.browser.viewport.width, config.browser.viewport.height
        );
        println!("  Heading timeout: {}ms", config.timeouts.heading_ms);
        match config.settle.strategy {
            SettleStrategy::Fixed => println!("  Settle: fixed {}ms", config.settle.max_ms),
            SettleStrategy::StableLayout => println!(
                "  Settle: stable layout, every {}ms, at most {}ms",
                config.settle.poll_interval_ms, config.settle.max_ms
            ),
        }
        println!("  Output: {}", config.output.dir.display());
        if config.round_trip.enabled {
            if config.round_trip.pixels {
                println!(
                    "  Round trip check: layout, max {:.2}% pixel difference",
                    config.round_trip.max_diff_percent
                );
            } else {
                println!("  Round trip check: layout");
            }
        }
        return Ok(());
    }

    let report = sidebar_verify::verify_with(&config, cli.quiet).await?;

    if !cli.quiet {
        println!();
        if report.success() {
            println!("✓ Success");
        } else {
            println!("✗ Failed");
        }
        for checkpoint in Checkpoint::ALL {
            if let Some((_, path)) = report.screenshots.iter().find(|(c, _)| *c == checkpoint) {
                println!("  {}: {}", checkpoint, path.display());
            }
        }
        if let Some(ref rt) = report.round_trip {
            println!(
                "  Round trip: layout restored: {}, {:.2}% pixels differ",
                rt.layout_restored, rt.pixels.diff_percent
            );
        }
        println!("  Duration: {}ms", report.duration.as_millis());
    }

    if cli.strict && !report.success() {
        std::process::exit(1);
    }

    Ok(())
}
