use clap::Parser;
use pickperfect::analysis::{AnalysisMode, AnalysisService, HttpAnalysisService};
use pickperfect::cloud_storage::S3Storage;
use pickperfect::config::Config;
use pickperfect::export::ZipArchivePacker;
use pickperfect::grouping::PhotoGroup;
use pickperfect::sources::{AdmissionReport, DriveApi, HttpDriveApi};
use pickperfect::{SessionError, SessionManager, SessionServices, TeardownReason};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Command-line arguments for pickperfect
#[derive(Parser, Debug)]
#[command(name = "pickperfect")]
#[command(about = "Find duplicate and similar photos and keep the best of each group")]
#[command(version)]
struct Args {
    /// Local photo files to analyze
    files: Vec<PathBuf>,

    /// Drive file id to include (repeatable)
    #[arg(long = "drive-file")]
    drive_files: Vec<String>,

    /// Owner id that scopes stored photos
    #[arg(long, env = "PICKPERFECT_OWNER_ID")]
    owner: String,

    /// Analysis mode: pixel (exact duplicates) or ai (similar content)
    #[arg(long, default_value = "pixel")]
    mode: AnalysisMode,

    /// Write the best photo of each group to this zip archive
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the archive to the default downloads directory
    #[arg(long)]
    export: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pickperfect=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    let Some(s3) = config.s3.clone() else {
        error!("Durable storage is not configured; set PICKPERFECT_S3_ACCESS_KEY_ID and friends");
        std::process::exit(2);
    };

    let storage = match S3Storage::new(s3, config.public_url_base.clone()).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!("Failed to initialize storage: {}", e);
            std::process::exit(2);
        }
    };

    let analysis = Arc::new(HttpAnalysisService::new(config.api_url.clone()));
    if let Err(e) = analysis.health().await {
        warn!("Analysis service at {} is not healthy: {}", config.api_url, e);
    }

    let drive = config
        .drive_access_token
        .clone()
        .map(|token| Arc::new(HttpDriveApi::new(token)) as Arc<dyn DriveApi>);

    let export_path = args.output.clone().or_else(|| {
        args.export
            .then(|| config.default_export_dir().join("pickperfect-best.zip"))
    });

    let manager = SessionManager::new(
        args.owner.clone(),
        config,
        SessionServices {
            storage,
            analysis,
            drive,
            packer: Arc::new(ZipArchivePacker),
        },
        tokio::runtime::Handle::current(),
    );

    let outcome = tokio::select! {
        outcome = run(&manager, &args, export_path) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted");
            Err(SessionError::Stale)
        }
    };

    match manager.teardown(TeardownReason::Reset).await {
        Ok(report) => {
            if let Some(e) = report.cleanup_error {
                warn!("Session cleanup incomplete: {}", e);
            }
        }
        Err(e) => warn!("Teardown failed: {}", e),
    }

    if let Err(e) = outcome {
        error!("{} failed: {}", e.stage(), e);
        std::process::exit(1);
    }
}

async fn run(
    manager: &SessionManager,
    args: &Args,
    export_path: Option<PathBuf>,
) -> Result<(), SessionError> {
    if !args.files.is_empty() {
        let report = manager.add_local_paths(&args.files).await?;
        print_report("local", &report);
    }
    if !args.drive_files.is_empty() {
        let report = manager.add_drive_files(&args.drive_files).await?;
        print_report("drive", &report);
    }

    info!(
        "Session holds {} photos ({})",
        manager.photo_count(),
        manager.total_size_label()
    );

    let session_id = manager.commit_upload().await?;
    info!("Uploaded session {}", session_id);

    manager.set_analysis_mode(args.mode)?;
    let groups = manager.start_analysis().await?;
    print_groups(&groups);

    if let Some(summary) = manager.summary() {
        println!(
            "{} photos in {} groups ({} duplicate, {} similar, {} unique); about {} can be saved",
            summary.total_images,
            summary.total_groups,
            summary.duplicate_groups,
            summary.similar_groups,
            summary.unique_groups,
            summary.space_saved_label
        );
    }

    if let Some(path) = export_path {
        let archive = manager.download_best_per_group().await?;
        tokio::fs::write(&path, &archive)
            .await
            .map_err(|e| SessionError::Export(format!("{}: {}", path.display(), e)))?;
        println!("Wrote {} ({} bytes)", path.display(), archive.len());
    }

    Ok(())
}

fn print_report(source: &str, report: &AdmissionReport) {
    info!(
        "Added {} {} photos ({} duplicates)",
        report.admitted.len(),
        source,
        report.duplicates.len()
    );
    for rejection in &report.rejected {
        warn!("Skipped {}: {}", rejection.id, rejection.error);
    }
}

fn print_groups(groups: &[PhotoGroup]) {
    if groups.is_empty() {
        println!("Nothing to review");
        return;
    }

    for (index, group) in groups.iter().enumerate() {
        println!(
            "[{}/{}] {} group of {} (similarity {:.2})",
            index + 1,
            groups.len(),
            group.group_type,
            group.count,
            group.similarity_score
        );
        for photo in &group.photos {
            let marker = if group.best.as_ref().map(|b| &b.path) == Some(&photo.path) {
                "*"
            } else {
                " "
            };
            println!(
                "  {} {} (score {:.2})",
                marker, photo.filename, photo.quality.overall_score
            );
        }
    }
}
