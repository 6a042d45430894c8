//! Command-line entry point. Generalizes `pens-catalog_1a`'s single
//! subcommand enum to the seven operations this catalog supports.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use walkdir::WalkDir;

use storagemgr::archive::{self, ArchivePolicy};
use storagemgr::catalog::model::File;
use storagemgr::catalog::Catalog;
use storagemgr::config::Config;
use storagemgr::dedup;
use storagemgr::error::{AppError, Result};
use storagemgr::fingerprint;
use storagemgr::logging;
use storagemgr::metadata_reader;
use storagemgr::scan::{self, ScanMode};

#[derive(Parser)]
#[command(name = "smgr", about = "Catalogs, archives, and deduplicates a personal media library")]
struct Cli {
    /// Repeat for more verbose logging (info, debug, trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a source tree into the canonical archive layout.
    Archive(ArchiveArgs),
    /// Reconcile the catalog against one or more roots.
    QuickScan(QuickScanArgs),
    /// Inspect or resolve duplicate content.
    ManageDuplicates(ManageDuplicatesArgs),
    /// Add, remove, or exclude directories from catalog roots.
    #[command(subcommand)]
    ManageRoot(ManageRootCommand),
    /// List images under a directory whose EXIF Make/Model matches a pattern.
    FilterImages(FilterImagesArgs),
    /// Print root paths, keyword count, and live file count.
    Sstats,
    /// Print the content digest of a single file.
    Smhash { file: PathBuf },
}

#[derive(Args)]
struct ArchiveArgs {
    #[arg(long)]
    images: bool,
    #[arg(long)]
    videos: bool,
    #[arg(long)]
    media: bool,
    #[arg(long)]
    files: bool,
    /// Stop before ingesting the first file with no existing match.
    #[arg(long)]
    break_on_add: bool,
    srcdir: PathBuf,
    dstdir: Option<PathBuf>,
}

#[derive(Args)]
struct QuickScanArgs {
    /// Re-fingerprint every live file unconditionally, instead of only
    /// those whose mtime or size changed.
    #[arg(long)]
    full: bool,
    #[arg(required = true)]
    root_path: Vec<PathBuf>,
}

#[derive(Args)]
struct ManageDuplicatesArgs {
    #[arg(long)]
    short_summary: bool,
    #[arg(long)]
    long_summary: bool,
    #[arg(long)]
    show_hash: Option<String>,
    #[arg(long)]
    deduplicate: bool,
}

#[derive(Subcommand)]
enum ManageRootCommand {
    Add { path: PathBuf },
    Remove { path: PathBuf },
    ExcludeDir { regex: String, root_path: Option<PathBuf> },
}

#[derive(Args)]
struct FilterImagesArgs {
    #[arg(long)]
    model: String,
    dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    let catalog = match Catalog::open(&config.database_path) {
        Ok(catalog) => catalog,
        Err(err) => {
            tracing::error!(error = %err, "failed to open catalog");
            return ExitCode::FAILURE;
        }
    };

    match run(&catalog, &config, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "operation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(catalog: &Catalog, config: &Config, command: Command) -> Result<()> {
    match command {
        Command::Archive(args) => run_archive(catalog, config, args),
        Command::QuickScan(args) => run_quick_scan(catalog, args),
        Command::ManageDuplicates(args) => run_manage_duplicates(catalog, config, args),
        Command::ManageRoot(command) => run_manage_root(catalog, command),
        Command::FilterImages(args) => run_filter_images(&args),
        Command::Sstats => run_sstats(catalog),
        Command::Smhash { file } => run_smhash(&file),
    }
}

fn run_archive(catalog: &Catalog, config: &Config, args: ArchiveArgs) -> Result<()> {
    if !(args.images || args.videos || args.media || args.files) {
        return Err(AppError::Config("one of --images, --videos, --media, --files is required".into()));
    }

    let policy: ArchivePolicy = if args.images {
        archive::image_policy()
    } else if args.videos {
        archive::video_policy()
    } else if args.media {
        archive::media_policy()
    } else {
        archive::files_policy()
    };

    let default_dest = if args.images {
        config.images_archive.clone()
    } else if args.videos {
        config.video_archive.clone()
    } else {
        None
    };

    let dest_dir = args
        .dstdir
        .or(default_dest)
        .ok_or_else(|| AppError::Config("no destination directory given and none configured".into()))?;
    std::fs::create_dir_all(&dest_dir)?;

    let dest_root = catalog
        .find_owning_root(&dest_dir.to_string_lossy())?
        .ok_or_else(|| AppError::Config("destination does not lie under any registered RootPath".into()))?;
    let outcome = archive::archive_tree(catalog, &policy, &args.srcdir, &dest_root, &dest_dir, args.break_on_add)?;

    println!(
        "{} policy: {} added, {} merged, {} skipped",
        policy.name, outcome.added, outcome.merged, outcome.skipped
    );
    Ok(())
}

fn run_quick_scan(catalog: &Catalog, args: QuickScanArgs) -> Result<()> {
    let mode = if args.full { ScanMode::Full } else { ScanMode::Quick };
    for root_path in &args.root_path {
        let root = catalog.get_or_create_root(&root_path.to_string_lossy())?;
        let summary = scan::scan_root(catalog, &root, mode)?;
        println!(
            "{}: {} dirs, {} added, {} rehashed, {} deleted",
            root.path, summary.directories_visited, summary.files_added, summary.files_rehashed, summary.files_deleted
        );
    }
    Ok(())
}

fn run_manage_duplicates(catalog: &Catalog, config: &Config, args: ManageDuplicatesArgs) -> Result<()> {
    let hashes = if let Some(prefix) = &args.show_hash {
        catalog.find_hashes_by_prefix(prefix)?
    } else {
        catalog.hashes_with_live_duplicates()?
    };

    if args.deduplicate {
        for hash in &hashes {
            let outcome = dedup::deduplicate_hash(catalog, config, hash.id, &prompt_keep_callback)?;
            if outcome.auto_resolved > 0 || outcome.manually_resolved > 0 {
                println!(
                    "{}: {} auto-resolved, {} manually resolved",
                    hash.digest, outcome.auto_resolved, outcome.manually_resolved
                );
            }
        }
        return Ok(());
    }

    for hash in &hashes {
        let files = catalog.live_non_symlinked_files_for_hash(hash.id)?;
        if files.len() < 2 && args.show_hash.is_none() {
            continue;
        }
        if args.long_summary {
            println!("{} ({} files):", hash.digest, files.len());
            for file in &files {
                println!("  {}", describe_file(catalog, file)?);
            }
        } else {
            println!("{} {} files", hash.digest, files.len());
        }
    }
    Ok(())
}

/// Default manual-resolve policy for the CLI: prints the candidates and
/// prompts on stdin for the survivor's index, defaulting to `0`.
fn prompt_keep_callback(files: &[File]) -> usize {
    println!("multiple files share content, choose the one to keep:");
    for (index, file) in files.iter().enumerate() {
        println!("  [{index}] {}", file.name);
    }
    print!("keep index [0]: ");
    let _ = std::io::stdout().flush();

    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_ok() {
        if let Ok(index) = line.trim().parse::<usize>() {
            if index < files.len() {
                return index;
            }
        }
    }
    0
}

fn describe_file(catalog: &Catalog, file: &File) -> Result<String> {
    let rel_path = catalog.rel_path_by_id(file.rel_path_id)?;
    let abspath = catalog.rel_path_abspath(&rel_path)?;
    Ok(Path::new(&abspath).join(&file.name).display().to_string())
}

fn run_manage_root(catalog: &Catalog, command: ManageRootCommand) -> Result<()> {
    match command {
        ManageRootCommand::Add { path } => {
            let root = catalog.get_or_create_root(&path.to_string_lossy())?;
            println!("added root {}", root.path);
        }
        ManageRootCommand::Remove { path } => {
            catalog.remove_root(&path.to_string_lossy())?;
            println!("removed root {}", path.display());
        }
        ManageRootCommand::ExcludeDir { regex, root_path } => {
            let root_id = match root_path {
                Some(path) => Some(catalog.get_or_create_root(&path.to_string_lossy())?.id),
                None => None,
            };
            catalog.add_exclude_dir(&regex, root_id)?;
            println!("excluded {regex}");
        }
    }
    Ok(())
}

fn run_filter_images(args: &FilterImagesArgs) -> Result<()> {
    let pattern = regex::Regex::new(&args.model).map_err(AppError::parse)?;

    for entry in WalkDir::new(&args.dir).follow_links(false).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || !fingerprint::is_image_extension(path) {
            continue;
        }
        if let Some(make_model) = metadata_reader::read_make_model(path) {
            if pattern.is_match(&make_model) {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}

fn run_sstats(catalog: &Catalog) -> Result<()> {
    let roots = catalog.list_roots()?;
    println!("roots:");
    for root in &roots {
        println!("  {}", root.path);
    }
    println!("keywords: {}", catalog.count_keywords()?);
    println!("files: {}", catalog.count_live_files()?);
    Ok(())
}

fn run_smhash(file: &Path) -> Result<()> {
    println!("{}", fingerprint::digest(file)?);
    Ok(())
}
