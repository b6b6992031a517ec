use anyhow::Result;
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use video_archiver::pipeline::work_root;
use video_archiver::{
    create_uploader, Config, FfmpegMuxer, JsonWorklistStore, RecordPipeline, ReqwestSource, WorklistRunner,
};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("Video Archiver")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Download, merge and archive the videos linked from worklist pages")
        .arg(
            Arg::new("worklist")
                .short('l')
                .long("worklist")
                .value_name("FILE")
                .help("JSON worklist file (overrides config)"),
        )
        .arg(
            Arg::new("tab")
                .short('t')
                .long("tab")
                .value_name("NAME")
                .help("Worklist tab to process (overrides config)"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file"),
        )
        .arg(
            Arg::new("work-dir")
                .short('w')
                .long("work-dir")
                .value_name("DIR")
                .help("Parent directory for per-record temporary directories"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(if verbose {
            "video_archiver=debug,info"
        } else {
            "video_archiver=info,warn"
        })
        .init();

    // Load configuration
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(&PathBuf::from(path))?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::from_env()
        }),
    };

    if let Some(worklist) = matches.get_one::<String>("worklist") {
        config.worklist.path = PathBuf::from(worklist);
    }
    if let Some(tab) = matches.get_one::<String>("tab") {
        config.worklist.tab = tab.clone();
    }
    if let Some(work_dir) = matches.get_one::<String>("work-dir") {
        config.work.temp_root = Some(PathBuf::from(work_dir));
    }

    config.validate()?;

    info!("🚀 Video Archiver starting...");
    info!("{}", config.summary());
    info!("📁 Work directories under: {}", work_root(&config).display());

    // Collaborators
    let http = ReqwestSource::new(&config.http)?;
    let uploader = create_uploader(&config.archive, http.client().clone())?;
    let muxer = Arc::new(FfmpegMuxer::new(&config.merge));
    let store = Arc::new(JsonWorklistStore::new(config.worklist.path.clone()));
    let tab = config.worklist.tab.clone();

    let pipeline = RecordPipeline::new(config, Arc::new(http), muxer, uploader)?;
    let runner = WorklistRunner::new(pipeline, store);

    let summary = runner.run(&tab).await?;

    // Print results
    info!("🎉 Processing completed in {:.2}s", summary.total_time.as_secs_f64());
    info!("✅ Done: {}", summary.done);
    info!("❌ Failed: {}", summary.failed);
    for result in summary.results.iter().filter(|r| !r.outcome.success) {
        info!("   - row {} ({}): {}", result.row, result.title, result.outcome.message);
    }

    Ok(())
}
