//! Application settings loaded from config.toml
//!
//! Every section is optional and falls back to defaults, so an empty file (or no file at
//! the default location) still yields a working configuration. Secrets such as the AI API
//! key are read from the environment right before use and never stored here.

use crate::core::cart::{CartPolicy, TaxRate};
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_VAR: &str = "POS_CONFIG";

/// Default config file location
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Store-wide pricing and cart behavior
    pub store: StoreSettings,
    /// Database location
    pub database: DatabaseSettings,
    /// AI analysis service
    pub analysis: AnalysisSettings,
    /// Categories to seed into an empty catalog
    pub categories: Vec<CategorySeed>,
    /// Products to seed into an empty catalog
    pub products: Vec<ProductSeed>,
}

/// `[store]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Store name shown in logs and reports
    pub name: String,
    /// Currency code used when formatting amounts
    pub currency: String,
    /// The single tax rate applied to every sale, as a fraction (0.10 = 10%)
    pub tax_rate: Decimal,
    /// Clamp cart quantities to the product's available stock
    pub clamp_quantity_to_stock: bool,
    /// Stock level below which a product counts as low on stock
    pub low_stock_threshold: i32,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            name: "POS Buddy".to_string(),
            currency: "USD".to_string(),
            tax_rate: Decimal::new(10, 2),
            clamp_quantity_to_stock: true,
            low_stock_threshold: 10,
        }
    }
}

/// `[database]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// `SeaORM` connection URL
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: crate::config::database::DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

/// `[analysis]` section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Base URL of the generative language API
    pub endpoint: String,
    /// Model name
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Maximum number of transactions sent along with a request
    pub max_transactions: usize,
    /// Maximum number of catalog products sent along with a request
    pub max_products: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Language the analysis should be written in
    pub language: String,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            max_transactions: 10,
            max_products: 10,
            timeout_secs: 30,
            language: "English".to_string(),
        }
    }
}

/// Category seed entry
#[derive(Debug, Clone, Deserialize)]
pub struct CategorySeed {
    /// Category name
    pub name: String,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Product seed entry
#[derive(Debug, Clone, Deserialize)]
pub struct ProductSeed {
    /// Product name
    pub name: String,
    /// Unit price
    pub price: Decimal,
    /// Initial stock
    #[serde(default)]
    pub stock: i32,
    /// Category label
    pub category: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Image reference
    #[serde(default)]
    pub image: Option<String>,
}

impl Settings {
    /// Checks the values serde cannot check on its own.
    pub fn validate(&self) -> Result<()> {
        TaxRate::new(self.store.tax_rate).map_err(|_| Error::Config {
            message: format!(
                "store.tax_rate must be between 0 and 1, got {}",
                self.store.tax_rate
            ),
        })?;

        if self.store.low_stock_threshold < 0 {
            return Err(Error::Config {
                message: "store.low_stock_threshold cannot be negative".to_string(),
            });
        }

        for seed in &self.products {
            if seed.price < Decimal::ZERO || seed.stock < 0 {
                return Err(Error::Config {
                    message: format!("Seed product '{}' has a negative price or stock", seed.name),
                });
            }
        }

        Ok(())
    }

    /// Builds the cart policy from the `[store]` section.
    pub fn cart_policy(&self) -> Result<CartPolicy> {
        Ok(CartPolicy {
            tax_rate: TaxRate::new(self.store.tax_rate)?,
            clamp_to_stock: self.store.clamp_quantity_to_stock,
        })
    }
}

/// Parses and validates settings from a TOML string.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    settings.validate()?;
    Ok(settings)
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range (e.g. a tax rate above 1)
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `POS_CONFIG`, or from ./config.toml.
///
/// A missing file at the default location is not an error: defaults are used instead.
/// A missing file named explicitly through `POS_CONFIG` is.
pub fn load_default_settings() -> Result<Settings> {
    if let Ok(path) = std::env::var(CONFIG_PATH_VAR) {
        return load_settings(path);
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        load_settings(DEFAULT_CONFIG_PATH)
    } else {
        tracing::info!("No {DEFAULT_CONFIG_PATH} found, using default settings");
        Ok(Settings::default())
    }
}
