use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::catalog::{CatalogLayout, CatalogSource, CsvFileSource, HttpCsvSource};
use crate::error::{InvoiceError, Result};
use crate::model::IssuerConfig;

const DEFAULT_ISSUER_TEMPLATE: &str = include_str!("../issuer.toml");

pub const DEFAULT_DATA_ROOT: &str = "~/Documents/Proforma";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppSettings {
    pub data_root: String,
    #[serde(default)]
    pub catalog: CatalogSettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_root: DEFAULT_DATA_ROOT.to_string(),
            catalog: CatalogSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct CatalogSettings {
    /// File path or http(s) URL of the CSV export. Empty means
    /// `<data_root>/catalog.csv`.
    pub location: String,
    pub delimiter: char,
    pub name_column: String,
    pub tier_columns: [String; 3],
}

impl Default for CatalogSettings {
    fn default() -> Self {
        let layout = CatalogLayout::default();
        Self {
            location: String::new(),
            delimiter: layout.delimiter as char,
            name_column: layout.name_column,
            tier_columns: layout.tier_columns,
        }
    }
}

impl CatalogSettings {
    pub fn layout(&self) -> Result<CatalogLayout> {
        if !self.delimiter.is_ascii() {
            return Err(InvoiceError::Settings(format!(
                "catalog delimiter '{}' must be a single ASCII character",
                self.delimiter
            )));
        }
        Ok(CatalogLayout {
            name_column: self.name_column.trim().to_string(),
            tier_columns: self.tier_columns.clone().map(|c| c.trim().to_string()),
            delimiter: self.delimiter as u8,
        })
    }

    pub fn source(&self, data_root: &Path) -> Result<Box<dyn CatalogSource>> {
        let layout = self.layout()?;
        let location = self.location.trim();
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Box::new(HttpCsvSource {
                url: location.to_string(),
                layout,
            }));
        }
        let path = if location.is_empty() {
            data_root.join("catalog.csv")
        } else {
            let expanded = PathBuf::from(expand_home_dir(location));
            if expanded.is_relative() {
                data_root.join(expanded)
            } else {
                expanded
            }
        };
        Ok(Box::new(CsvFileSource { path, layout }))
    }
}

pub fn config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "proforma-maker", "app") {
        return proj_dirs.config_dir().join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn load_settings() -> Result<Option<AppSettings>> {
    load_settings_from(&config_path())
}

pub fn load_settings_from(path: &Path) -> Result<Option<AppSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let settings = toml::from_str(&content)
        .map_err(|e| InvoiceError::Settings(format!("{}: {}", path.display(), e)))?;
    debug!(path = %path.display(), "settings loaded");
    Ok(Some(settings))
}

pub fn save_settings_to(settings: &AppSettings, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let toml_str = toml::to_string_pretty(settings).map_err(|e| InvoiceError::Settings(e.to_string()))?;
    fs::write(path, toml_str)?;
    info!(path = %path.display(), "settings saved");
    Ok(())
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}

/// Reads `issuer.toml` from the data root, writing the bundled default first
/// if there is none yet.
pub fn load_issuer(root: &Path) -> Result<IssuerConfig> {
    let path = root.join("issuer.toml");
    if !path.exists() {
        println!("✨ Initializing default issuer details at {}", path.display());
        fs::create_dir_all(root)?;
        fs::write(&path, DEFAULT_ISSUER_TEMPLATE)?;
    }
    let content = fs::read_to_string(&path)?;
    toml::from_str(&content).map_err(|e| InvoiceError::Settings(format!("{}: {}", path.display(), e)))
}

/// Logo bytes, if the issuer configured one and it can be read.
pub fn load_logo(root: &Path, issuer: &IssuerConfig) -> Option<Vec<u8>> {
    let logo = issuer.logo.as_deref()?;
    let path = root.join(expand_home_dir(logo));
    match fs::read(&path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "logo not readable");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_fill_catalog_defaults() {
        let settings: AppSettings = toml::from_str("data_root = \"/srv/proforma\"").unwrap();
        assert_eq!(settings.catalog.name_column, "Denomination");
        assert_eq!(settings.catalog.tier_columns[2], "prix-detaille");
        assert_eq!(settings.catalog.delimiter, ',');
    }

    #[test]
    fn settings_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.toml");
        let mut settings = AppSettings::default();
        settings.catalog.location = "https://example.com/sheet.csv".into();
        settings.catalog.delimiter = ';';
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(&path).unwrap().unwrap();
        assert_eq!(loaded.catalog.location, "https://example.com/sheet.csv");
        assert_eq!(loaded.catalog.delimiter, ';');
    }

    #[test]
    fn missing_settings_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_settings_from(&dir.path().join("absent.toml")).unwrap().is_none());
    }

    #[test]
    fn catalog_source_follows_location() {
        let root = Path::new("/srv/proforma");
        let mut catalog = CatalogSettings::default();
        assert_eq!(catalog.source(root).unwrap().describe(), "/srv/proforma/catalog.csv");

        catalog.location = "exports/stock.csv".into();
        assert_eq!(catalog.source(root).unwrap().describe(), "/srv/proforma/exports/stock.csv");

        catalog.location = "https://docs.example.com/export?format=csv".into();
        assert_eq!(
            catalog.source(root).unwrap().describe(),
            "https://docs.example.com/export?format=csv"
        );
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let catalog = CatalogSettings {
            delimiter: '§',
            ..CatalogSettings::default()
        };
        assert!(matches!(catalog.layout(), Err(InvoiceError::Settings(_))));
    }

    #[test]
    fn issuer_default_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = load_issuer(dir.path()).unwrap();
        assert_eq!(issuer.currency, "DA");
        assert_eq!(issuer.terms.deposit_percent, 50);
        assert!(dir.path().join("issuer.toml").exists());

        fs::write(
            dir.path().join("issuer.toml"),
            DEFAULT_ISSUER_TEMPLATE.replace("Ameublement El Bahia", "Meubles Nour"),
        )
        .unwrap();
        assert_eq!(load_issuer(dir.path()).unwrap().name, "Meubles Nour");
    }

    #[test]
    fn home_is_expanded() {
        let expanded = expand_home_dir("~/Documents");
        assert!(!expanded.starts_with('~') || BaseDirs::new().is_none());
        assert_eq!(expand_home_dir("/abs/path"), "/abs/path");
    }
}
