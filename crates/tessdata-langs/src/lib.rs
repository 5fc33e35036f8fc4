//! # tessdata-langs
//!
//! The ISO 639-2 language table used to present tesseract languages by
//! name, plus discovery of the trained models installed in a `tessdata`
//! directory.
//!
//! ## How it works
//!
//! The table is embedded at compile time (`data/iso639-2.tsv`) and parsed
//! into an owned, immutable [`LanguageCatalog`]. There is no process-wide
//! state: callers load the catalog once at startup and pass it around.
//!
//! [`LanguageCatalog::installed`] scans a tessdata directory for files named
//! `<alpha3>.traineddata`. Names containing an underscore (`chi_sim`,
//! `deu_latf`) denote script variants and are skipped, as are the non-language
//! `osd` and `equ` models. Every remaining code
//! must resolve to a catalog entry; an unknown code is reported as
//! [`CatalogError::UnknownCode`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tessdata_langs::{default_tessdata_dir, LanguageCatalog};
//!
//! let catalog = LanguageCatalog::builtin();
//! assert_eq!(catalog.by_alpha3("eng").map(|l| l.name()), Some("English"));
//!
//! for lang in catalog.installed(&default_tessdata_dir()).unwrap() {
//!     println!("{} ({})", lang.name(), lang.alpha3());
//! }
//! ```
//!
//! ## Environment variable overrides
//!
//! - `TESSDATA_PREFIX`: the tessdata directory (same meaning as for
//!   tesseract itself).

use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

// ── Public constants ─────────────────────────────────────────────────────────

/// File extension of tesseract trained models.
pub const MODEL_EXTENSION: &str = "traineddata";

/// Marker used in the table for languages without an ISO 639-1 code.
const NO_ALPHA2: &str = "<na>";

/// Models shipped in tessdata that are not languages: orientation/script
/// detection and the legacy equation model.
const AUXILIARY_MODELS: [&str; 2] = ["osd", "equ"];

static BUILTIN_TABLE: &str = include_str!("../data/iso639-2.tsv");

static MODEL_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([a-z]{3})\.traineddata$").expect("valid model regex"));

// ── Error type ───────────────────────────────────────────────────────────────

/// Errors returned by catalog operations.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// A table row did not have the `name<TAB>alpha3<TAB>alpha2` shape.
    #[error("Malformed language table row {line}: {row:?}")]
    MalformedRow { line: usize, row: String },

    /// The tessdata directory could not be listed.
    #[error("Cannot read tessdata directory '{path}': {source}")]
    TessdataUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An installed model uses a code the table does not know.
    #[error("Installed model '{code}.traineddata' does not match any known language code")]
    UnknownCode { code: String },
}

// ── Language ─────────────────────────────────────────────────────────────────

/// One row of the language table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Language {
    name: String,
    /// ISO 639-2 code, also the tesseract model name.
    alpha3: String,
    /// ISO 639-1 code, when the language has one.
    alpha2: Option<String>,
}

impl Language {
    pub fn new(name: impl Into<String>, alpha3: impl Into<String>, alpha2: Option<String>) -> Self {
        Self {
            name: name.into(),
            alpha3: alpha3.into(),
            alpha2,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alpha3(&self) -> &str {
        &self.alpha3
    }

    pub fn alpha2(&self) -> Option<&str> {
        self.alpha2.as_deref()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

// ── Catalog ──────────────────────────────────────────────────────────────────

/// Immutable name ↔ code lookup table.
///
/// A language can carry two codes: the bibliographic one (`ger`, `cze`) and
/// the terminological one (`deu`, `ces`). The table lists the bibliographic
/// code first, either as its own row or joined as `cze/ces`; parsing yields
/// one entry per code. Tesseract names its models after the terminological
/// code, so name lookups return the last matching row while code lookups
/// return the first.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    entries: Vec<Language>,
}

impl LanguageCatalog {
    /// The embedded ISO 639-2 table.
    pub fn builtin() -> Self {
        // The embedded table is covered by `builtin_table_parses`.
        Self::parse(BUILTIN_TABLE).unwrap_or_else(|_| Self { entries: Vec::new() })
    }

    /// Parse a tab-separated table. Blank lines and `#` comments are ignored.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut entries = Vec::new();
        for (i, row) in text.lines().enumerate() {
            let trimmed = row.trim_end_matches('\r');
            if trimmed.trim().is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut cols = trimmed.split('\t');
            match (cols.next(), cols.next(), cols.next(), cols.next()) {
                (Some(name), Some(alpha3), Some(alpha2), None)
                    if !name.is_empty() && !alpha3.is_empty() =>
                {
                    let alpha2 = (alpha2 != NO_ALPHA2 && !alpha2.is_empty())
                        .then(|| alpha2.to_string());
                    for code in alpha3.split('/').map(str::trim).filter(|c| !c.is_empty()) {
                        entries.push(Language::new(name, code, alpha2.clone()));
                    }
                }
                _ => {
                    return Err(CatalogError::MalformedRow {
                        line: i + 1,
                        row: trimmed.to_string(),
                    })
                }
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Language> {
        self.entries.iter()
    }

    /// First language whose ISO 639-2 code equals `code`.
    pub fn by_alpha3(&self, code: &str) -> Option<&Language> {
        self.entries.iter().find(|l| l.alpha3 == code)
    }

    /// Language whose name matches `name`, ignoring case. Prefers the
    /// terminological code when the language has two.
    pub fn by_name(&self, name: &str) -> Option<&Language> {
        let name = name.trim();
        self.entries
            .iter()
            .rev()
            .find(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// Resolve user input that is either an alpha-3 code or a language name.
    pub fn resolve(&self, query: &str) -> Option<&Language> {
        let query = query.trim();
        self.by_alpha3(&query.to_ascii_lowercase())
            .or_else(|| self.by_name(query))
    }

    /// Like [`resolve`](Self::resolve), but when the language is known under
    /// several codes, pick the one with a model in `tessdata_dir`.
    ///
    /// `ger` and `German` both give `deu` when only `deu.traineddata` is
    /// installed. Without any installed match the plain lookup is returned.
    pub fn resolve_installed(&self, query: &str, tessdata_dir: &Path) -> Option<&Language> {
        let resolved = self.resolve(query)?;
        if has_model(tessdata_dir, &resolved.alpha3) {
            return Some(resolved);
        }
        self.entries
            .iter()
            .rev()
            .filter(|l| l.name == resolved.name)
            .find(|l| has_model(tessdata_dir, &l.alpha3))
            .or(Some(resolved))
    }

    /// Languages with a trained model in `tessdata_dir`, sorted by name.
    pub fn installed(&self, tessdata_dir: &Path) -> Result<Vec<Language>, CatalogError> {
        let mut languages = installed_codes(tessdata_dir)?
            .into_iter()
            .map(|code| {
                self.by_alpha3(&code)
                    .cloned()
                    .ok_or(CatalogError::UnknownCode { code })
            })
            .collect::<Result<Vec<_>, _>>()?;
        languages.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(languages)
    }
}

// ── Tessdata discovery ───────────────────────────────────────────────────────

/// Alpha-3 codes of the models installed in `tessdata_dir`, sorted.
///
/// Only regular files named `<alpha3>.traineddata` count; script variants
/// (`chi_sim.traineddata`), auxiliary models (`osd`, `equ`) and
/// subdirectories (`script/`) are skipped.
pub fn installed_codes(tessdata_dir: &Path) -> Result<Vec<String>, CatalogError> {
    let unreadable = |source| CatalogError::TessdataUnreadable {
        path: tessdata_dir.to_path_buf(),
        source,
    };

    let mut codes = Vec::new();
    for entry in std::fs::read_dir(tessdata_dir).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        if entry.file_type().map_err(unreadable)?.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.contains('_') {
            continue;
        }
        if let Some(caps) = MODEL_FILE_RE.captures(name) {
            if !AUXILIARY_MODELS.contains(&&caps[1]) {
                codes.push(caps[1].to_string());
            }
        }
    }
    codes.sort_unstable();
    codes.dedup();
    Ok(codes)
}

/// Path of the trained model for `code` inside `tessdata_dir`.
pub fn model_path(tessdata_dir: &Path, code: &str) -> PathBuf {
    tessdata_dir.join(format!("{code}.{MODEL_EXTENSION}"))
}

/// Returns `true` if `tessdata_dir` contains a model for `code`.
pub fn has_model(tessdata_dir: &Path, code: &str) -> bool {
    model_path(tessdata_dir, code).is_file()
}

/// The tessdata directory to use when none is configured.
///
/// Resolution order (first match wins):
/// 1. `TESSDATA_PREFIX`
/// 2. `./tessdata` when it exists
/// 3. `{data_dir}/tessdata` when it exists (e.g. `~/.local/share/tessdata`)
/// 4. `./tessdata`
pub fn default_tessdata_dir() -> PathBuf {
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        if !prefix.is_empty() {
            return PathBuf::from(prefix);
        }
    }

    let local = PathBuf::from("tessdata");
    if local.is_dir() {
        return local;
    }

    if let Some(user) = dirs::data_dir().map(|d| d.join("tessdata")) {
        if user.is_dir() {
            return user;
        }
    }

    local
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn builtin_table_parses() {
        LanguageCatalog::parse(BUILTIN_TABLE).expect("embedded table must parse");
        let catalog = LanguageCatalog::builtin();
        assert!(catalog.len() > 500, "got {} rows", catalog.len());
    }

    #[test]
    fn lookup_by_code_and_name() {
        let catalog = LanguageCatalog::builtin();

        let eng = catalog.by_alpha3("eng").unwrap();
        assert_eq!(eng.name(), "English");
        assert_eq!(eng.alpha2(), Some("en"));

        assert_eq!(catalog.by_name("german").unwrap().alpha3(), "deu");
        assert_eq!(catalog.by_name("French").unwrap().alpha3(), "fra");
        assert_eq!(catalog.by_alpha3("ger").unwrap().name(), "German");
        assert_eq!(catalog.by_alpha3("deu").unwrap().name(), "German");
        assert_eq!(catalog.by_alpha3("ace").unwrap().alpha2(), None);
        assert!(catalog.by_alpha3("xxx").is_none());
    }

    #[test]
    fn resolve_accepts_code_or_name() {
        let catalog = LanguageCatalog::builtin();
        assert_eq!(catalog.resolve("HUN").unwrap().name(), "Hungarian");
        assert_eq!(catalog.resolve(" Hungarian ").unwrap().alpha3(), "hun");
        assert!(catalog.resolve("Elvish").is_none());
    }

    #[test]
    fn duplicate_codes_resolve_to_first_row() {
        let catalog = LanguageCatalog::parse("Welsh\twel\tcy\nCymraeg\twel\tcy\n").unwrap();
        assert_eq!(catalog.by_alpha3("wel").unwrap().name(), "Welsh");
    }

    #[test]
    fn joined_codes_become_separate_entries() {
        let catalog = LanguageCatalog::builtin();
        for (name, bibliographic, terminological) in [
            ("Czech", "cze", "ces"),
            ("Dutch", "dut", "nld"),
            ("Albanian", "alb", "sqi"),
            ("Chinese", "chi", "zho"),
        ] {
            assert_eq!(catalog.by_alpha3(bibliographic).unwrap().name(), name);
            assert_eq!(catalog.by_alpha3(terminological).unwrap().name(), name);
            assert_eq!(catalog.resolve(name).unwrap().alpha3(), terminological);
        }
        assert!(catalog.iter().all(|l| !l.alpha3().contains('/')));
    }

    #[test]
    fn resolve_installed_prefers_installed_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("deu.traineddata"), b"").unwrap();
        let catalog = LanguageCatalog::builtin();

        assert_eq!(catalog.resolve_installed("German", dir.path()).unwrap().alpha3(), "deu");
        assert_eq!(catalog.resolve_installed("ger", dir.path()).unwrap().alpha3(), "deu");
        assert_eq!(catalog.resolve_installed("french", dir.path()).unwrap().alpha3(), "fra");
        assert!(catalog.resolve_installed("Elvish", dir.path()).is_none());
    }

    #[test]
    fn resolve_installed_keeps_bibliographic_model() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ger.traineddata"), b"").unwrap();
        let catalog = LanguageCatalog::builtin();
        assert_eq!(catalog.resolve_installed("German", dir.path()).unwrap().alpha3(), "ger");
    }

    #[test]
    fn malformed_row_is_rejected() {
        let err = LanguageCatalog::parse("# header\nEnglish\teng\n").unwrap_err();
        assert!(matches!(err, CatalogError::MalformedRow { line: 2, .. }), "got {err:?}");
    }

    #[test]
    fn installed_skips_variants_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "eng.traineddata",
            "hun.traineddata",
            "chi_sim.traineddata",
            "osd.traineddata",
            "eng.user-words",
            "README",
        ] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("script")).unwrap();

        assert_eq!(installed_codes(dir.path()).unwrap(), vec!["eng", "hun"]);

        let names: Vec<_> = LanguageCatalog::builtin()
            .installed(dir.path())
            .unwrap()
            .into_iter()
            .map(|l| l.name().to_string())
            .collect();
        assert_eq!(names, vec!["English", "Hungarian"]);
    }

    #[test]
    fn installed_recognises_terminological_codes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ces.traineddata", "nld.traineddata", "deu.traineddata"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }

        let found: Vec<_> = LanguageCatalog::builtin()
            .installed(dir.path())
            .unwrap()
            .into_iter()
            .map(|l| (l.name().to_string(), l.alpha3().to_string()))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Czech".to_string(), "ces".to_string()),
                ("Dutch".to_string(), "nld".to_string()),
                ("German".to_string(), "deu".to_string()),
            ]
        );
    }

    #[test]
    fn installed_unknown_code_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("eng.traineddata"), b"").unwrap();
        fs::write(dir.path().join("xyz.traineddata"), b"").unwrap();

        let err = LanguageCatalog::builtin().installed(dir.path()).unwrap_err();
        match err {
            CatalogError::UnknownCode { code } => assert_eq!(code, "xyz"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_tessdata_dir_is_an_error() {
        let err = installed_codes(Path::new("/definitely/not/tessdata")).unwrap_err();
        assert!(err.to_string().contains("/definitely/not/tessdata"));
    }

    #[test]
    fn model_path_layout() {
        let p = model_path(Path::new("/usr/share/tessdata"), "eng");
        assert_eq!(p, PathBuf::from("/usr/share/tessdata/eng.traineddata"));
    }
}
