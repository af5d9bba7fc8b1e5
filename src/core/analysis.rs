//! AI sales analysis - Asking a generative model about recent sales.
//!
//! The service sits behind the [`SalesAnalyst`] trait so the register and tests never depend
//! on the network. [`GeminiAnalyst`] is the HTTP implementation. The `*_or_fallback` helpers
//! are what callers normally use: they never fail, logging the problem and handing back a
//! fixed fallback instead.
//!
//! Three questions can be asked: a general sales analysis, category suggestions for a
//! product, and stock advice for the catalog.

use crate::{
    config::settings::AnalysisSettings,
    core::{
        report::{self, ProductSales},
        transaction::Transaction,
    },
    entities::product,
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use tracing::{debug, warn};

/// Caller-chosen knobs for an analysis request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AnalysisOptions {
    /// Language the answer should be written in
    pub language: String,
    /// Topics the answer should focus on
    pub keywords: Vec<String>,
}

/// Everything sent to the analyst for a sales analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    /// Most recent transactions, capped
    pub transactions: Vec<Transaction>,
    /// Catalog products with price and stock, capped
    pub products: Vec<product::Model>,
    /// Products ranked by revenue over all given transactions
    pub top_products: Vec<ProductSales>,
    /// Language and focus
    pub options: AnalysisOptions,
}

impl AnalysisRequest {
    /// Builds a request from newest-first transactions and the catalog, keeping at most
    /// `max_transactions` transactions and `max_products` products.
    /// Rankings are computed over every transaction passed in, not just the capped ones.
    #[must_use]
    pub fn new(
        transactions: &[Transaction],
        products: &[product::Model],
        max_transactions: usize,
        max_products: usize,
        options: AnalysisOptions,
    ) -> Self {
        Self {
            transactions: transactions.iter().take(max_transactions).cloned().collect(),
            products: products.iter().take(max_products).cloned().collect(),
            top_products: report::top_products(transactions, report::DEFAULT_TOP_PRODUCTS),
            options,
        }
    }

    /// Renders the prompt text.
    ///
    /// # Errors
    /// Returns an error if the transactions or products cannot be serialized.
    pub fn prompt(&self) -> Result<String> {
        let language = if self.options.language.trim().is_empty() {
            "English"
        } else {
            self.options.language.trim()
        };
        let focus = if self.options.keywords.is_empty() {
            String::new()
        } else {
            format!(
                "Focus especially on: {}.\n",
                self.options.keywords.join(", ")
            )
        };

        Ok(format!(
            "You are a retail analyst for a small shop. Analyze the sales data below and answer \
             in {language}.\n{focus}\
             Recent transactions: {}\n\
             Products: {}\n\
             Top products by revenue: {}\n\
             Respond with JSON only, in this shape: \
             {{\"insights\": [string], \"recommendations\": [string], \"trends\": [string], \
             \"predictions\": [string]}}",
            serde_json::to_string(&self.transactions)?,
            serde_json::to_string(&self.products)?,
            serde_json::to_string(&self.top_products)?,
        ))
    }
}

/// The analyst's answer. Every list may be missing from the response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesAnalysis {
    /// Observations about the sales data
    pub insights: Vec<String>,
    /// Suggested actions
    pub recommendations: Vec<String>,
    /// Trends spotted in the data
    pub trends: Vec<String>,
    /// Expectations for the coming period
    pub predictions: Vec<String>,
}

impl SalesAnalysis {
    /// Fixed answer shown when the analyst is unavailable.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            insights: vec!["Sales data could not be analyzed right now".to_string()],
            recommendations: vec![
                "Check the connection to the analysis service and try again".to_string(),
            ],
            trends: vec!["Not enough data to identify trends".to_string()],
            predictions: vec!["Collect more sales history for predictions".to_string()],
        }
    }

    /// True when every list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
            && self.recommendations.is_empty()
            && self.trends.is_empty()
            && self.predictions.is_empty()
    }
}

/// Product details sent when asking for category suggestions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryRequest {
    /// Product to categorize
    pub product_name: String,
    /// Its description
    pub product_description: String,
    /// Recent sales, ranked by revenue
    pub recent_sales: Vec<ProductSales>,
    /// Categories that already exist
    pub existing_categories: Vec<String>,
}

impl CategoryRequest {
    /// Renders the prompt text.
    ///
    /// # Errors
    /// Returns an error if the sales figures cannot be serialized.
    pub fn prompt(&self) -> Result<String> {
        Ok(format!(
            "You help shop owners categorize their products. Suggest a few relevant categories \
             for the product below and explain your reasoning.\n\
             Product name: {}\n\
             Product description: {}\n\
             Recent sales: {}\n\
             Existing categories: {}\n\
             Respond with JSON only, in this shape: \
             {{\"suggestedCategories\": [string], \"reasoning\": string}}",
            self.product_name,
            self.product_description,
            serde_json::to_string(&self.recent_sales)?,
            self.existing_categories.join(", "),
        ))
    }
}

/// Suggested categories for one product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CategorySuggestion {
    /// Category names, best first
    pub suggested_categories: Vec<String>,
    /// Why these were suggested
    pub reasoning: String,
}

/// Catalog and sales sent when asking for stock advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryRequest {
    /// Every active product with its current stock
    pub products: Vec<product::Model>,
    /// Most recent transactions, capped
    pub transactions: Vec<Transaction>,
    /// Units sold per product over all given transactions, best first
    pub units_sold: Vec<ProductSales>,
    /// Stock level below which the shop considers a product low
    pub low_stock_threshold: i32,
}

impl InventoryRequest {
    /// Builds a request from the catalog and newest-first transactions, keeping at most
    /// `max_transactions` transactions. Units sold are counted over all of them.
    #[must_use]
    pub fn new(
        products: &[product::Model],
        transactions: &[Transaction],
        max_transactions: usize,
        low_stock_threshold: i32,
    ) -> Self {
        Self {
            products: products.to_vec(),
            transactions: transactions.iter().take(max_transactions).cloned().collect(),
            units_sold: report::rank_by_quantity(transactions, usize::MAX),
            low_stock_threshold,
        }
    }

    /// Renders the prompt text.
    ///
    /// # Errors
    /// Returns an error if the products or transactions cannot be serialized.
    pub fn prompt(&self) -> Result<String> {
        Ok(format!(
            "You manage stock for a small shop. Review the catalog and recent sales below and \
             recommend stock changes. Products with fewer than {} units are considered low.\n\
             Products: {}\n\
             Recent transactions: {}\n\
             Units sold: {}\n\
             Respond with JSON only, in this shape: \
             {{\"lowStockAlerts\": [{{\"productName\": string, \"currentStock\": number, \
             \"recommendedStock\": number, \"urgency\": \"high\"|\"medium\"|\"low\"}}], \
             \"overstockedProducts\": [{{\"productName\": string, \"currentStock\": number, \
             \"recommendedAction\": string}}], \
             \"reorderRecommendations\": [{{\"productName\": string, \"quantity\": number, \
             \"reason\": string}}]}}",
            self.low_stock_threshold,
            serde_json::to_string(&self.products)?,
            serde_json::to_string(&self.transactions)?,
            serde_json::to_string(&self.units_sold)?,
        ))
    }
}

/// How soon a low-stock product needs attention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    /// Restock now
    High,
    /// Restock soon
    #[default]
    Medium,
    /// Keep an eye on it
    Low,
}

/// A product running short.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LowStockAlert {
    /// Product name
    pub product_name: String,
    /// Stock at the time of the request
    pub current_stock: i64,
    /// Stock level the analyst recommends
    pub recommended_stock: i64,
    /// How soon to act
    pub urgency: Urgency,
}

/// A product with more stock than its sales justify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverstockNotice {
    /// Product name
    pub product_name: String,
    /// Stock at the time of the request
    pub current_stock: i64,
    /// What to do about it
    pub recommended_action: String,
}

/// A suggested purchase order line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReorderRecommendation {
    /// Product name
    pub product_name: String,
    /// Units to order
    pub quantity: i64,
    /// Why
    pub reason: String,
}

/// The analyst's stock advice. An empty answer means nothing needs doing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InventoryAdvice {
    /// Products running short
    pub low_stock_alerts: Vec<LowStockAlert>,
    /// Products with too much stock
    pub overstocked_products: Vec<OverstockNotice>,
    /// Suggested orders
    pub reorder_recommendations: Vec<ReorderRecommendation>,
}

/// Something that can analyze sales, suggest categories and advise on stock.
#[async_trait]
pub trait SalesAnalyst: Send + Sync {
    /// Analyzes the given sales.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<SalesAnalysis>;

    /// Suggests categories for a product.
    async fn suggest_categories(&self, request: &CategoryRequest) -> Result<CategorySuggestion>;

    /// Recommends stock changes for the catalog.
    async fn optimize_inventory(&self, request: &InventoryRequest) -> Result<InventoryAdvice>;
}

/// Runs an analysis, returning [`SalesAnalysis::fallback`] on any failure.
///
/// An empty transaction list returns the fallback without calling the analyst.
pub async fn analyze_or_fallback(
    analyst: &dyn SalesAnalyst,
    request: &AnalysisRequest,
) -> SalesAnalysis {
    if request.transactions.is_empty() {
        debug!("No transactions to analyze, using fallback");
        return SalesAnalysis::fallback();
    }

    match analyst.analyze(request).await {
        Ok(analysis) if !analysis.is_empty() => analysis,
        Ok(_) => {
            warn!("Analysis service returned nothing usable, using fallback");
            SalesAnalysis::fallback()
        }
        Err(e) => {
            warn!("Sales analysis failed, using fallback: {e}");
            SalesAnalysis::fallback()
        }
    }
}

/// Asks for category suggestions, returning an empty suggestion on any failure.
pub async fn suggest_or_fallback(
    analyst: &dyn SalesAnalyst,
    request: &CategoryRequest,
) -> CategorySuggestion {
    if request.product_name.trim().is_empty() {
        debug!("No product name given, skipping category suggestion");
        return CategorySuggestion::default();
    }

    analyst
        .suggest_categories(request)
        .await
        .inspect_err(|e| warn!("Category suggestion failed: {e}"))
        .unwrap_or_default()
}

/// Asks for stock advice, returning empty advice on any failure.
///
/// An empty catalog returns empty advice without calling the analyst.
pub async fn optimize_or_fallback(
    analyst: &dyn SalesAnalyst,
    request: &InventoryRequest,
) -> InventoryAdvice {
    if request.products.is_empty() {
        debug!("No products to review, skipping inventory advice");
        return InventoryAdvice::default();
    }

    analyst
        .optimize_inventory(request)
        .await
        .inspect_err(|e| warn!("Inventory advice failed: {e}"))
        .unwrap_or_default()
}

/// Removes a surrounding Markdown code fence (```` ```json ... ``` ````), if any.
#[must_use]
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the language tag line
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Parses the analyst's text into a [`SalesAnalysis`].
///
/// # Errors
/// Returns `Error::Analysis` when the text is not JSON of the expected shape or every
/// list is empty.
pub fn parse_analysis(text: &str) -> Result<SalesAnalysis> {
    let analysis: SalesAnalysis =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| Error::Analysis {
            message: format!("Response does not match the analysis schema: {e}"),
        })?;

    if analysis.is_empty() {
        return Err(Error::Analysis {
            message: "Response contained no analysis".to_string(),
        });
    }
    Ok(analysis)
}

/// Parses the analyst's text into a [`CategorySuggestion`].
///
/// # Errors
/// Returns `Error::Analysis` when the text is not JSON of the expected shape or suggests
/// no categories.
pub fn parse_category_suggestion(text: &str) -> Result<CategorySuggestion> {
    let suggestion: CategorySuggestion =
        serde_json::from_str(strip_code_fences(text)).map_err(|e| Error::Analysis {
            message: format!("Response does not match the category schema: {e}"),
        })?;

    if suggestion.suggested_categories.is_empty() {
        return Err(Error::Analysis {
            message: "Response suggested no categories".to_string(),
        });
    }
    Ok(suggestion)
}

/// Parses the analyst's text into [`InventoryAdvice`].
///
/// # Errors
/// Returns `Error::Analysis` when the text is not JSON of the expected shape.
pub fn parse_inventory_advice(text: &str) -> Result<InventoryAdvice> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| Error::Analysis {
        message: format!("Response does not match the inventory schema: {e}"),
    })
}

/// Header carrying the API key.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// [`SalesAnalyst`] backed by the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiAnalyst {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for GeminiAnalyst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiAnalyst")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GeminiAnalyst {
    /// Creates a client with the configured endpoint, model and timeout.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(settings: &AnalysisSettings, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
        })
    }

    /// Creates a client, reading the API key from the variable named in the settings.
    ///
    /// # Errors
    /// Returns an error if the variable is unset or the HTTP client cannot be built.
    pub fn from_env(settings: &AnalysisSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env)?;
        Self::new(settings, api_key)
    }

    fn request_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!(model = %self.model, "Sending analysis request");
        let response: GenerateResponse = self
            .client
            .post(self.request_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::Http(e.without_url()))?
            .json()
            .await
            .map_err(|e| Error::Http(e.without_url()))?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| Error::Analysis {
                message: "Response contained no candidates".to_string(),
            })
    }
}

#[async_trait]
impl SalesAnalyst for GeminiAnalyst {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<SalesAnalysis> {
        let text = self.generate(request.prompt()?).await?;
        parse_analysis(&text)
    }

    async fn suggest_categories(&self, request: &CategoryRequest) -> Result<CategorySuggestion> {
        let text = self.generate(request.prompt()?).await?;
        parse_category_suggestion(&text)
    }

    async fn optimize_inventory(&self, request: &InventoryRequest) -> Result<InventoryAdvice> {
        let text = self.generate(request.prompt()?).await?;
        parse_inventory_advice(&text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<Part>,
}
