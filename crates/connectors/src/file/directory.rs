use crate::{
    error::SourceError,
    file::{
        csv::{
            reader::read_csv_file,
            settings::{CsvSettings, encoding_or_utf8},
        },
        spreadsheet::{SheetSelector, SpreadsheetSettings, read_spreadsheet, sheet_selector},
    },
    options::SourceOptions,
    source::{RecordSource, SourceKind, run_blocking},
};
use async_trait::async_trait;
use glob::Pattern;
use model::{
    core::value::Value,
    execution::errors::ConfigError,
    records::table::RecordTable,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub const SOURCE_FILE_COLUMN: &str = "_source_file";

const CSV_EXTENSIONS: &[&str] = &["csv", "txt"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

#[derive(Debug, Clone)]
pub struct DirectorySettings {
    pub root: PathBuf,
    pub pattern: Pattern,
    pub recursive: bool,
    pub csv: CsvSettings,
    pub sheet: SheetSelector,
}

impl DirectorySettings {
    pub fn new(root: impl AsRef<Path>, pattern: &str) -> Result<Self, glob::PatternError> {
        Ok(DirectorySettings {
            root: root.as_ref().to_path_buf(),
            pattern: Pattern::new(pattern)?,
            recursive: false,
            csv: CsvSettings::new(""),
            sheet: SheetSelector::default(),
        })
    }

    pub fn from_options(opts: &SourceOptions) -> Result<Self, ConfigError> {
        let pattern = opts
            .optional_str("pattern")?
            .unwrap_or_else(|| "*.csv".to_string());
        let pattern = Pattern::new(&pattern).map_err(|e| opts.invalid("pattern", &e.to_string()))?;

        let mut csv = CsvSettings::new("");
        csv.delimiter = opts.delimiter_or("delimiter", b',')?;
        csv.encoding = encoding_or_utf8(opts, "encoding")?;

        Ok(DirectorySettings {
            root: PathBuf::from(opts.required_str("path")?),
            pattern,
            recursive: opts.bool_or("recursive", false)?,
            csv,
            sheet: sheet_selector(opts, "sheet_name")?,
        })
    }

    fn matches(&self, relative: &Path) -> bool {
        if self.pattern.as_str().contains('/') {
            return self.pattern.matches_path(relative);
        }
        relative
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.pattern.matches(name))
    }
}

/// Files under the root matching the pattern, ordered by their path relative
/// to the root.
fn matching_files(settings: &DirectorySettings) -> Vec<PathBuf> {
    let max_depth = if settings.recursive { usize::MAX } else { 1 };
    let mut files: Vec<PathBuf> = WalkDir::new(&settings.root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {e}", settings.root.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(&settings.root).ok()?.to_path_buf();
            settings.matches(&relative).then_some(relative)
        })
        .collect();

    files.sort();
    files
}

fn read_file(settings: &DirectorySettings, path: &Path) -> Option<Result<RecordTable, SourceError>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if CSV_EXTENSIONS.contains(&extension.as_str()) {
        Some(read_csv_file(&settings.csv.for_path(path)))
    } else if SPREADSHEET_EXTENSIONS.contains(&extension.as_str()) {
        let mut sheet = SpreadsheetSettings::new(path);
        sheet.sheet = settings.sheet.clone();
        Some(read_spreadsheet(&sheet))
    } else {
        None
    }
}

/// Reads and concatenates every matching file. Unsupported or unreadable
/// files are skipped with a warning; an empty match set yields zero rows.
pub fn read_directory(settings: &DirectorySettings) -> Result<RecordTable, SourceError> {
    let root = &settings.root;
    if !root.exists() {
        return Err(SourceError::NotFound(root.display().to_string()));
    }
    if !root.is_dir() {
        return Err(SourceError::Format(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let files = matching_files(settings);
    info!(
        "Found {} files matching '{}' in {}",
        files.len(),
        settings.pattern,
        root.display()
    );

    let mut tables = Vec::with_capacity(files.len());
    for relative in &files {
        let path = root.join(relative);
        let mut table = match read_file(settings, &path) {
            Some(Ok(table)) => table,
            Some(Err(e)) => {
                warn!("Failed to read file {}: {e}", path.display());
                continue;
            }
            None => {
                warn!("Skipping unsupported file type: {}", path.display());
                continue;
            }
        };

        let file_name = relative
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for row in &mut table.rows {
            row.set(SOURCE_FILE_COLUMN, Value::String(file_name.clone()));
        }
        if !table.has_column(SOURCE_FILE_COLUMN) {
            table.columns.push(SOURCE_FILE_COLUMN.to_string());
        }
        tables.push(table);
    }

    Ok(RecordTable::concat(tables))
}

pub struct DirectorySource {
    id: String,
    settings: DirectorySettings,
}

impl DirectorySource {
    pub fn new(id: &str, settings: DirectorySettings) -> Self {
        DirectorySource {
            id: id.to_string(),
            settings,
        }
    }

    pub fn from_options(id: &str, opts: &SourceOptions) -> Result<Self, ConfigError> {
        Ok(Self::new(id, DirectorySettings::from_options(opts)?))
    }
}

#[async_trait]
impl RecordSource for DirectorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Folder
    }

    fn describe(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "type": self.kind(),
            "path": self.settings.root.display().to_string(),
            "pattern": self.settings.pattern.as_str(),
            "recursive": self.settings.recursive,
        })
    }

    async fn read(&self) -> Result<RecordTable, SourceError> {
        let settings = self.settings.clone();
        run_blocking(move || read_directory(&settings)).await
    }
}
