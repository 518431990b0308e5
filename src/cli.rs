// Timelapse CLI binary

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use timelapse_lib::config::TimelapseConfig;
use timelapse_lib::constants::DEFAULT_IMAGE_SET_NAME;
use timelapse_lib::data::{DataRowBackedObject, DateTimeAdjustment, FieldDescriptor, FileCapability, Template};
use timelapse_lib::db::{get_db_path, FileDatabase, SqliteDatabase};
use timelapse_lib::metadata::ExifToolReader;
use timelapse_lib::scan;
use timelapse_lib::select::{CustomSelection, FileSelection, LogicalOperator, Operator, SortTerms};

#[derive(Parser)]
#[command(name = "timelapse")]
#[command(about = "Timelapse - camera trap image set maintenance", long_about = None)]
#[command(version)]
struct Cli {
    /// Override the configured log level
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an image set database in a folder
    Init {
        /// Image set root folder
        path: PathBuf,
        /// JSON file with a list of additional controls
        #[arg(short, long)]
        controls: Option<PathBuf>,
    },

    /// Add files found under the root that are not yet in the image set
    Scan {
        /// Image set root (defaults to current directory)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// List the files a selection matches
    Select {
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// One-click selection
        #[arg(short, long, value_enum, default_value = "all")]
        selection: SelectionArg,
        /// Folder for the folders selection
        #[arg(long)]
        folder: Option<String>,
        /// Custom search term, e.g. --term Deer ">=" 2
        #[arg(long = "term", num_args = 3, value_names = ["LABEL", "OP", "VALUE"], action = clap::ArgAction::Append)]
        terms: Vec<String>,
        /// Combine custom terms with OR instead of the configured default
        #[arg(long)]
        or: bool,
        /// Data label to sort by
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        descending: bool,
        /// Mark files that cannot be displayed
        #[arg(long)]
        verify: bool,
    },

    /// List the sort keys this image set offers
    SortTerms {
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Move files marked for deletion to DeletedFiles and drop their rows
    DeleteMarked {
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Compare stored dates with the capture time in each file's metadata
    CheckDates {
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Write metadata dates back to the image set
        #[arg(long)]
        apply: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SelectionArg {
    All,
    Ok,
    Dark,
    Missing,
    Corrupted,
    MarkedForDeletion,
    Folders,
    Custom,
}

impl From<SelectionArg> for FileSelection {
    fn from(arg: SelectionArg) -> Self {
        match arg {
            SelectionArg::All => FileSelection::All,
            SelectionArg::Ok => FileSelection::Ok,
            SelectionArg::Dark => FileSelection::Dark,
            SelectionArg::Missing => FileSelection::Missing,
            SelectionArg::Corrupted => FileSelection::Corrupted,
            SelectionArg::MarkedForDeletion => FileSelection::MarkedForDeletion,
            SelectionArg::Folders => FileSelection::Folders,
            SelectionArg::Custom => FileSelection::Custom,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = TimelapseConfig::load().context("Failed to load configuration")?;
    initialize_logger(&config, cli.log_level)?;

    match cli.command {
        Commands::Init { path, controls } => cmd_init(path, controls),
        Commands::Scan { root } => cmd_scan(root),
        Commands::Select { root, selection, folder, terms, or, sort, descending, verify } => {
            let combinator = if or { LogicalOperator::Or } else { config.combinator()? };
            cmd_select(root, selection.into(), folder, &terms, combinator, sort, descending, verify)
        }
        Commands::SortTerms { root } => cmd_sort_terms(root),
        Commands::DeleteMarked { root } => cmd_delete_marked(root),
        Commands::CheckDates { root, apply } => cmd_check_dates(root, apply, &config),
    }
}

/// Terminal logging, plus a file log when one is configured.
fn initialize_logger(config: &TimelapseConfig, level_override: Option<LevelFilter>) -> Result<()> {
    let level = match level_override {
        Some(level) => level,
        None => config.level_filter()?,
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = &config.log_file {
        match File::create(path) {
            Ok(file) => loggers.push(WriteLogger::new(LevelFilter::max(), Config::default(), file)),
            Err(e) => eprintln!("Cannot open log file {}: {}. Logging to terminal only.", path.display(), e),
        }
    }
    CombinedLogger::init(loggers).context("Failed to initialize logging")?;
    Ok(())
}

fn database_path(root: &Path) -> PathBuf {
    get_db_path(&root.join(DEFAULT_IMAGE_SET_NAME))
}

/// Resolve the image set root, defaulting to the current directory.
fn resolve_root(root: Option<PathBuf>) -> Result<PathBuf> {
    let root = match root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    root.canonicalize()
        .map_err(|_| anyhow::anyhow!("Image set folder does not exist: {}", root.display()))
}

fn open_image_set(root: &Path) -> Result<FileDatabase<SqliteDatabase>> {
    let db_path = database_path(root);
    if !db_path.exists() {
        anyhow::bail!("No image set at {}. Use 'timelapse init' first.", root.display());
    }
    Ok(FileDatabase::open(&db_path)?)
}

fn cmd_init(path: PathBuf, controls: Option<PathBuf>) -> Result<()> {
    let root = path.canonicalize().unwrap_or(path.clone());
    let db_path = database_path(&root);
    if db_path.exists() {
        anyhow::bail!("Image set already exists at {}", db_path.display());
    }

    let user_controls: Vec<FieldDescriptor> = match controls {
        Some(file) => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("Cannot read controls from {}", file.display()))?;
            serde_json::from_str(&json).with_context(|| format!("Invalid controls in {}", file.display()))?
        }
        None => Vec::new(),
    };
    let template = Template::with_user_controls(user_controls)?;
    let db = FileDatabase::create(&db_path, template)?;

    println!("Initialized image set at {}", db_path.display());
    println!("Controls:");
    for descriptor in db.template().descriptors() {
        println!("  {:<16} {}", descriptor.data_label, descriptor.control_type);
    }
    Ok(())
}

fn cmd_scan(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let db = open_image_set(&root)?;
    let known = db.known_files();
    let rows = scan::new_file_rows(&root, &known);
    let inserted = db.insert_files(&rows);
    if inserted < rows.len() {
        log::warn!("{} of {} new files were not added", rows.len() - inserted, rows.len());
    }
    println!("Scan complete: {} new, {} already known", inserted, known.len());
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_select(
    root: Option<PathBuf>,
    file_selection: FileSelection,
    folder: Option<String>,
    terms: &[String],
    combinator: LogicalOperator,
    sort: Option<String>,
    descending: bool,
    verify: bool,
) -> Result<()> {
    let root = resolve_root(root)?;
    let db = open_image_set(&root)?;
    let mut selection = db.custom_selection(combinator);

    let file_selection = if terms.is_empty() { file_selection } else { FileSelection::Custom };
    selection.set_custom_search_from_selection(file_selection, folder.as_deref())?;
    for term in terms.chunks(3) {
        let operator: Operator = term[1].parse()?;
        if !selection.set_search_term(&term[0], operator, &term[2]) {
            anyhow::bail!("No searchable field named '{}'", term[0]);
        }
    }

    let mut session = db.image_set();
    let sort_terms = match sort {
        Some(label) => {
            let available = SortTerms::get_sort_terms(selection.search_terms());
            let mut primary = available
                .into_iter()
                .find(|t| t.data_label == label)
                .ok_or_else(|| anyhow::anyhow!("Cannot sort by '{}'", label))?;
            primary.is_ascending = !descending;
            SortTerms { primary, secondary: None }
        }
        None => session
            .as_ref()
            .map(|s| s.sort_terms().valid_for(selection.search_terms()))
            .unwrap_or_default(),
    };

    log::debug!("{}", selection.select_files_query(&sort_terms));
    let files = db.select_files(&selection, &sort_terms);
    for file in &files {
        let status = if verify && !file.is_displayable(&root) { "  (cannot display)" } else { "" };
        println!(
            "{:>6}  {:<20}  {}{}",
            file.id(),
            file.date_time().map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_default(),
            file.relative_file_path().display(),
            status
        );
    }
    println!("{} files", files.len());

    if let Some(session) = session.as_mut() {
        session.set_file_selection(file_selection);
        session.set_sort_terms(&sort_terms);
        if let Some(folder) = &folder {
            session.set_selected_folder(folder);
        }
        if let Some(first) = files.get(0) {
            session.set_most_recent_file_id(Some(first.id()));
        }
        db.save_image_set(session);
    }
    Ok(())
}

fn cmd_sort_terms(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let db = open_image_set(&root)?;
    let selection = db.custom_selection(LogicalOperator::And);
    let current = db.image_set().map(|s| s.sort_terms()).unwrap_or_default();
    for term in SortTerms::get_sort_terms(selection.search_terms()) {
        let marker = if term.data_label == current.primary.data_label { "*" } else { " " };
        println!("{} {:<16} {}", marker, term.data_label, term.display_label);
    }
    Ok(())
}

fn cmd_delete_marked(root: Option<PathBuf>) -> Result<()> {
    let root = resolve_root(root)?;
    let db = open_image_set(&root)?;
    let deleted = db.delete_files_marked_for_deletion(&root);
    println!("Deleted {} files", deleted);
    Ok(())
}

fn cmd_check_dates(root: Option<PathBuf>, apply: bool, config: &TimelapseConfig) -> Result<()> {
    let root = resolve_root(root)?;
    let db = open_image_set(&root)?;
    let reader = ExifToolReader::new(config.exiftool());
    if !reader.is_available() {
        anyhow::bail!("exiftool not found; set {} or exiftoolPath in the config", timelapse_lib::tools::EXIFTOOL_ENV);
    }

    let mut files = db.select_files(&db.custom_selection(LogicalOperator::And), &SortTerms::default());
    let mut tally: HashMap<String, usize> = HashMap::new();
    let mut batches = Vec::new();
    for id in files.ids() {
        let Some(file) = files.find_mut(id) else { continue };
        let adjustment = file.reconcile_date_time(&root, &reader);
        *tally.entry(format!("{:?}", adjustment)).or_default() += 1;
        if adjustment.is_adjusted() {
            println!("{:>6}  {}  {:?}", file.id(), file.relative_file_path().display(), adjustment);
            batches.push(file.create_column_tuples_with_where_by_id()?);
        } else if adjustment == DateTimeAdjustment::MetadataUnreadable {
            println!("{:>6}  {}  metadata unreadable", file.id(), file.relative_file_path().display());
        }
    }

    let mut summary: Vec<_> = tally.into_iter().collect();
    summary.sort();
    for (outcome, count) in summary {
        println!("  {:<28} {}", outcome, count);
    }
    if apply {
        println!("Updated {} files", db.update_files(&batches));
    } else if !batches.is_empty() {
        println!("Run with --apply to write {} corrected dates", batches.len());
    }
    Ok(())
}
