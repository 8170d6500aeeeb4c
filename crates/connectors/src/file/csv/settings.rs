use crate::options::SourceOptions;
use encoding_rs::{Encoding, UTF_8};
use model::execution::errors::ConfigError;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CsvSettings {
    pub path: PathBuf,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub skip_rows: usize,
    pub has_headers: bool,
    pub infer_types: bool,
}

impl CsvSettings {
    pub fn new(path: impl AsRef<Path>) -> Self {
        CsvSettings {
            path: path.as_ref().to_path_buf(),
            delimiter: b',',
            encoding: UTF_8,
            skip_rows: 0,
            has_headers: true,
            infer_types: true,
        }
    }

    pub fn from_options(opts: &SourceOptions) -> Result<Self, ConfigError> {
        let path = opts.required_str("path")?;
        Ok(CsvSettings {
            path: PathBuf::from(path),
            delimiter: opts.delimiter_or("delimiter", b',')?,
            encoding: encoding_or_utf8(opts, "encoding")?,
            skip_rows: opts.usize_or("skip_rows", 0)?,
            has_headers: opts.bool_or("has_headers", true)?,
            infer_types: opts.bool_or("infer_types", true)?,
        })
    }

    /// Same parsing options applied to another file.
    pub fn for_path(&self, path: impl AsRef<Path>) -> Self {
        CsvSettings {
            path: path.as_ref().to_path_buf(),
            ..self.clone()
        }
    }
}

/// Resolves a WHATWG encoding label such as `utf-8`, `latin1` or
/// `windows-1252`.
pub(crate) fn encoding_or_utf8(
    opts: &SourceOptions,
    key: &str,
) -> Result<&'static Encoding, ConfigError> {
    match opts.optional_str(key)? {
        None => Ok(UTF_8),
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| opts.invalid(key, &format!("unknown encoding `{label}`"))),
    }
}
