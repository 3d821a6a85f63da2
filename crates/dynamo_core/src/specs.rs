//! Specification-file reader.
//!
//! A specification is a TOML document whose top-level keys are driver
//! names.  Each driver table carries:
//!
//! - `path` (required) — filesystem path to the driver's DSL source,
//!   resolved relative to the specification file;
//! - `config` (optional) — string→string placeholder environment used
//!   when lexing this driver;
//! - `depends` (optional) — names of drivers to compile first.
//!
//! ```toml
//! [i2c]
//! path = "drivers/i2c.drv"
//!
//! [display]
//! path = "drivers/display.drv"
//! config = { ADDRESS = "0x3C" }
//! depends = ["i2c"]
//! ```
//!
//! All file I/O happens up front in [`SpecsFile::load`]; the rest of the
//! compiler only ever sees owned source buffers.  Driver iteration order
//! is the sorted key order.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// SpecError
// ─────────────────────────────────────────────────────────────────────────────

/// All errors the specification reader can produce.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The specification file itself could not be read.
    #[error("cannot read specification file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The specification is not valid TOML or violates the expected shape
    /// (missing `path`, wrong value types, …).
    #[error("malformed specification: {0}")]
    Malformed(#[from] toml::de::Error),

    /// A driver's `path` does not name a readable file.
    #[error("cannot read source for driver \"{driver}\" from {path}: {source}")]
    MissingSource {
        driver: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// SpecsFile
// ─────────────────────────────────────────────────────────────────────────────

/// The on-disk shape of one driver table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    path: PathBuf,
    #[serde(default)]
    config: BTreeMap<String, String>,
    #[serde(default)]
    depends: Vec<String>,
}

/// One driver's compilation inputs, fully loaded into memory.
#[derive(Debug, Clone, Default)]
pub struct DriverEntry {
    /// The driver's DSL source text.
    pub source: String,
    /// Placeholder environment for lexing this driver.
    pub config: BTreeMap<String, String>,
    /// Names of drivers to compile before this one, in order.
    pub depends: Vec<String>,
}

/// A validated, fully-loaded specification.
///
/// Owns every driver's source buffer and placeholder environment for the
/// lifetime of the compilation; all lexeme views borrow from here.
#[derive(Debug, Clone, Default)]
pub struct SpecsFile {
    drivers: BTreeMap<String, DriverEntry>,
}

impl SpecsFile {
    /// Read and validate the specification at `path`, loading every
    /// driver's source file eagerly.
    pub fn load(path: &Path) -> Result<Self, SpecError> {
        let text = std::fs::read_to_string(path).map_err(|source| SpecError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: BTreeMap<String, RawEntry> = toml::from_str(&text)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut drivers = BTreeMap::new();
        for (name, entry) in raw {
            let source_path = if entry.path.is_absolute() {
                entry.path
            } else {
                base.join(&entry.path)
            };
            let source =
                std::fs::read_to_string(&source_path).map_err(|source| SpecError::MissingSource {
                    driver: name.clone(),
                    path: source_path.clone(),
                    source,
                })?;

            debug!("loaded driver \"{name}\" from {}", source_path.display());
            drivers.insert(
                name,
                DriverEntry {
                    source,
                    config: entry.config,
                    depends: entry.depends,
                },
            );
        }

        Ok(Self { drivers })
    }

    /// Build a specification from in-memory entries, bypassing the
    /// filesystem.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, DriverEntry)>) -> Self {
        Self {
            drivers: entries.into_iter().collect(),
        }
    }

    /// The driver map, keyed by name, in sorted iteration order.
    pub fn drivers(&self) -> &BTreeMap<String, DriverEntry> {
        &self.drivers
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_entries(text: &str) -> Result<BTreeMap<String, RawEntry>, toml::de::Error> {
        toml::from_str(text)
    }

    // ── Document shape ────────────────────────────────────────────────────

    #[test]
    fn specs_minimal_entry() {
        let raw = raw_entries(r#"i2c = { path = "i2c.drv" }"#).unwrap();
        let entry = &raw["i2c"];
        assert_eq!(entry.path, PathBuf::from("i2c.drv"));
        assert!(entry.config.is_empty());
        assert!(entry.depends.is_empty());
    }

    #[test]
    fn specs_full_entry() {
        let raw = raw_entries(
            r#"
            [display]
            path = "display.drv"
            config = { ADDRESS = "0x3C", WIDTH = "128" }
            depends = ["i2c", "gpio"]
            "#,
        )
        .unwrap();
        let entry = &raw["display"];
        assert_eq!(entry.config["ADDRESS"], "0x3C");
        assert_eq!(entry.depends, ["i2c", "gpio"]);
    }

    #[test]
    fn specs_missing_path_is_malformed() {
        assert!(raw_entries(r#"i2c = { depends = ["gpio"] }"#).is_err());
    }

    #[test]
    fn specs_wrong_types_are_malformed() {
        assert!(raw_entries(r#"i2c = { path = 42 }"#).is_err());
        assert!(raw_entries(r#"i2c = { path = "x", depends = "gpio" }"#).is_err());
        assert!(raw_entries(r#"i2c = { path = "x", config = { A = 1 } }"#).is_err());
    }

    #[test]
    fn specs_driver_value_must_be_a_table() {
        assert!(raw_entries(r#"i2c = "i2c.drv""#).is_err());
    }

    #[test]
    fn specs_unknown_keys_are_malformed() {
        assert!(raw_entries(r#"i2c = { path = "x", pth = "y" }"#).is_err());
    }

    // ── Loading ───────────────────────────────────────────────────────────

    /// Scratch directory for filesystem tests, removed on drop.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(label: &str) -> Self {
            let dir = std::env::temp_dir().join(format!(
                "dynamo_specs_{label}_{}",
                std::process::id()
            ));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }

        fn write(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.0.join(name);
            std::fs::write(&path, contents).unwrap();
            path
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn specs_load_reads_sources_relative_to_the_specs_file() {
        let scratch = Scratch::new("load");
        scratch.write("blink.drv", "driver Blink { }");
        let specs_path = scratch.write("spec.toml", r#"blink = { path = "blink.drv" }"#);

        let specs = SpecsFile::load(&specs_path).unwrap();
        assert_eq!(specs.drivers()["blink"].source, "driver Blink { }");
    }

    #[test]
    fn specs_load_missing_source_file() {
        let scratch = Scratch::new("missing");
        let specs_path = scratch.write("spec.toml", r#"blink = { path = "nope.drv" }"#);

        match SpecsFile::load(&specs_path) {
            Err(SpecError::MissingSource { driver, .. }) => assert_eq!(driver, "blink"),
            other => panic!("expected MissingSource, got {other:?}"),
        }
    }

    #[test]
    fn specs_load_missing_specs_file() {
        let result = SpecsFile::load(Path::new("/nonexistent/spec.toml"));
        assert!(matches!(result, Err(SpecError::Read { .. })));
    }

    #[test]
    fn specs_iteration_order_is_sorted() {
        let specs = SpecsFile::from_entries([
            ("zeta".to_string(), DriverEntry::default()),
            ("alpha".to_string(), DriverEntry::default()),
        ]);
        let names: Vec<_> = specs.drivers().keys().cloned().collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }
}
