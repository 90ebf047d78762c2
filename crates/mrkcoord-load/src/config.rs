//! QC run configuration
//!
//! Resolved once from the environment (and an optional `.env` file) before
//! the run starts and never changed afterwards.

use std::path::{Path, PathBuf};

use mrkcoord_common::{MrkCoordError, Result};

use crate::report::{ReportKind, ReportPaths};

/// Staging table used when `TEMP_TABLE` is not set
pub const DEFAULT_TEMP_TABLE: &str = "mrkcoord_qc_tmp";

/// Suffix of the staging file when `INPUT_FILE_BCP` is not set
pub const DEFAULT_BCP_SUFFIX: &str = "bcp";

/// Suffix of the load-ready file when `INPUT_FILE_LOAD` is not set
pub const DEFAULT_LOAD_SUFFIX: &str = "load";

/// How the staging file reaches the staging table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderKind {
    /// External bcp-style script
    Command(PathBuf),
    /// In-process PostgreSQL `COPY`
    Copy,
}

/// Configuration of one QC run
#[derive(Debug, Clone)]
pub struct QcConfig {
    pub input: PathBuf,
    /// Tab-delimited file handed to the bulk loader
    pub staging_file: PathBuf,
    /// Filtered feed written by live runs
    pub load_ready_file: PathBuf,
    pub temp_table: String,
    pub live: bool,
    pub reports: ReportPaths,
    pub loader: LoaderKind,
}

impl QcConfig {
    /// Load configuration from the process environment
    ///
    /// `live` overrides `LIVE_RUN` when given.
    pub fn from_env(input: PathBuf, live: Option<bool>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(input, live, |key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(input: PathBuf, live: Option<bool>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let staging_file = var("INPUT_FILE_BCP")
            .map(PathBuf::from)
            .unwrap_or_else(|| with_suffix(&input, DEFAULT_BCP_SUFFIX));
        let load_ready_file = var("INPUT_FILE_LOAD")
            .map(PathBuf::from)
            .unwrap_or_else(|| with_suffix(&input, DEFAULT_LOAD_SUFFIX));
        let temp_table = var("TEMP_TABLE").unwrap_or_else(|| DEFAULT_TEMP_TABLE.to_string());

        let live = match live {
            Some(live) => live,
            None => var("LIVE_RUN").map(|v| parse_flag(&v)).unwrap_or(false),
        };

        let report_dir = var("RPTDIR").map(PathBuf::from).unwrap_or_else(|| {
            input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        });
        let mut reports = ReportPaths::in_dir(&report_dir);
        for kind in ReportKind::ALL {
            if let Some(path) = var(kind.env_var()) {
                reports.set(kind, path);
            }
        }
        if let Some(path) = var("RPT_NAMES_RPT") {
            reports.manifest = PathBuf::from(path);
        }

        let loader = match (var("BCP_COMMAND"), var("PG_DBUTILS")) {
            (Some(command), _) => LoaderKind::Command(PathBuf::from(command)),
            (None, Some(utils)) => LoaderKind::Command(Path::new(&utils).join("bin/bcpin.csh")),
            (None, None) => LoaderKind::Copy,
        };

        let config = Self {
            input,
            staging_file,
            load_ready_file,
            temp_table,
            live,
            reports,
            loader,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.input.as_os_str().is_empty() {
            return Err(MrkCoordError::Config("input file path cannot be empty".to_string()));
        }
        if self.staging_file == self.input || self.load_ready_file == self.input {
            return Err(MrkCoordError::Config(format!(
                "output files must differ from the input file {}",
                self.input.display()
            )));
        }
        if !is_valid_table_name(&self.temp_table) {
            return Err(MrkCoordError::Config(format!(
                "TEMP_TABLE {:?} is not a plain table name",
                self.temp_table
            )));
        }
        if let LoaderKind::Command(command) = &self.loader {
            if command.as_os_str().is_empty() {
                return Err(MrkCoordError::Config("bulk load command cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// `1`, `true`, `yes` (any case) mean "on"
fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Whether `name` is a plain, optionally schema-qualified, SQL identifier
///
/// The staging table name is interpolated into `COPY` and loader commands,
/// so anything beyond `[A-Za-z_][A-Za-z0-9_]*` is refused.
pub fn is_valid_table_name(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        return false;
    }
    parts.iter().all(|part| {
        let mut chars = part.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            },
            _ => false,
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            QcConfig::from_lookup(PathBuf::from("/data/coords.txt"), None, lookup(&[])).unwrap();

        assert_eq!(config.staging_file, PathBuf::from("/data/coords.txt.bcp"));
        assert_eq!(config.load_ready_file, PathBuf::from("/data/coords.txt.load"));
        assert_eq!(config.temp_table, DEFAULT_TEMP_TABLE);
        assert!(!config.live);
        assert_eq!(config.loader, LoaderKind::Copy);
        assert_eq!(
            config.reports.path(ReportKind::Build),
            Path::new("/data/build.rpt")
        );
        assert_eq!(config.reports.manifest, PathBuf::from("/data/rpt_names.rpt"));
    }

    #[test]
    fn test_environment_overrides() {
        let config = QcConfig::from_lookup(
            PathBuf::from("coords.txt"),
            None,
            lookup(&[
                ("LIVE_RUN", "1"),
                ("TEMP_TABLE", "radar.MRK_CoordQC"),
                ("RPTDIR", "/reports"),
                ("BUILD_RPT", "/elsewhere/build.rpt"),
                ("RPT_NAMES_RPT", "/reports/names.rpt"),
                ("PG_DBUTILS", "/usr/local/mgi/pgdbutilities"),
            ]),
        )
        .unwrap();

        assert!(config.live);
        assert_eq!(config.temp_table, "radar.MRK_CoordQC");
        assert_eq!(
            config.reports.path(ReportKind::Build),
            Path::new("/elsewhere/build.rpt")
        );
        assert_eq!(
            config.reports.path(ReportKind::InvalidMarker),
            Path::new("/reports/invalid_marker.rpt")
        );
        assert_eq!(config.reports.manifest, PathBuf::from("/reports/names.rpt"));
        assert_eq!(
            config.loader,
            LoaderKind::Command(PathBuf::from("/usr/local/mgi/pgdbutilities/bin/bcpin.csh"))
        );
    }

    #[test]
    fn test_cli_live_flag_wins() {
        let config = QcConfig::from_lookup(
            PathBuf::from("coords.txt"),
            Some(false),
            lookup(&[("LIVE_RUN", "1")]),
        )
        .unwrap();
        assert!(!config.live);
    }

    #[test]
    fn test_bcp_command_wins_over_dbutils() {
        let config = QcConfig::from_lookup(
            PathBuf::from("coords.txt"),
            None,
            lookup(&[("BCP_COMMAND", "/bin/loader"), ("PG_DBUTILS", "/opt")]),
        )
        .unwrap();
        assert_eq!(config.loader, LoaderKind::Command(PathBuf::from("/bin/loader")));
    }

    #[test]
    fn test_rejects_bad_table_name() {
        let err = QcConfig::from_lookup(
            PathBuf::from("coords.txt"),
            None,
            lookup(&[("TEMP_TABLE", "tmp; drop table mrk_marker")]),
        )
        .unwrap_err();
        assert!(matches!(err, MrkCoordError::Config(_)));
    }

    #[test]
    fn test_rejects_output_overwriting_input() {
        let err = QcConfig::from_lookup(
            PathBuf::from("coords.txt"),
            None,
            lookup(&[("INPUT_FILE_LOAD", "coords.txt")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("differ"));
    }

    #[test]
    fn test_table_names() {
        assert!(is_valid_table_name("MrkCoordQC_tmp"));
        assert!(is_valid_table_name("radar._tmp1"));
        assert!(!is_valid_table_name(""));
        assert!(!is_valid_table_name("1tmp"));
        assert!(!is_valid_table_name("a.b.c"));
        assert!(!is_valid_table_name("tmp-table"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("1"));
        assert!(parse_flag(" TRUE "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("no"));
    }
}
