//! In-process catalog with keyword relevance search.

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use toolrelay_core::error::CatalogError;
use toolrelay_core::tool::{ToolCatalog, ToolDescriptor};
use tracing::debug;

const NAME_WEIGHT: u32 = 3;
const TAG_WEIGHT: u32 = 2;
const DESCRIPTION_WEIGHT: u32 = 1;

/// The backend of one catalog tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value, CatalogError>;
}

/// A handler backed by an async closure.
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, CatalogError>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value, CatalogError> {
        (self.0)(arguments).await
    }
}

/// Wrap an async closure as a tool handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CatalogError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

struct Entry {
    descriptor: ToolDescriptor,
    handler: Arc<dyn ToolHandler>,
}

/// A catalog whose tools are registered in-process.
pub struct StaticCatalog {
    entries: Arc<RwLock<Vec<Entry>>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a tool. A tool with the same name is replaced.
    pub async fn register(&self, descriptor: ToolDescriptor, handler: Arc<dyn ToolHandler>) {
        let mut entries = self.entries.write().await;
        entries.retain(|e| e.descriptor.name != descriptor.name);
        debug!(tool = %descriptor.name, "Registered tool");
        entries.push(Entry { descriptor, handler });
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Every registered descriptor, sorted by name.
    pub async fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut all: Vec<ToolDescriptor> = self
            .entries
            .read()
            .await
            .iter()
            .map(|e| e.descriptor.clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }
}

impl Default for StaticCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercase alphanumeric terms of `text`.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

fn score(descriptor: &ToolDescriptor, terms: &[String]) -> u32 {
    let name = descriptor.name.to_lowercase();
    let description = descriptor.description.to_lowercase();
    let tags: Vec<String> = descriptor.tags.iter().map(|t| t.to_lowercase()).collect();

    terms
        .iter()
        .map(|term| {
            let mut s = 0;
            if name.contains(term.as_str()) {
                s += NAME_WEIGHT;
            }
            if tags.iter().any(|t| t.contains(term.as_str())) {
                s += TAG_WEIGHT;
            }
            if description.contains(term.as_str()) {
                s += DESCRIPTION_WEIGHT;
            }
            s
        })
        .sum()
}

#[async_trait]
impl ToolCatalog for StaticCatalog {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ToolDescriptor>, CatalogError> {
        let terms = tokenize(query);
        let entries = self.entries.read().await;

        let mut scored: Vec<(u32, &ToolDescriptor)> = entries
            .iter()
            .map(|e| {
                let s = if terms.is_empty() { 1 } else { score(&e.descriptor, &terms) };
                (s, &e.descriptor)
            })
            .filter(|(s, _)| *s > 0)
            .collect();

        scored.sort_by(|(sa, a), (sb, b)| sb.cmp(sa).then_with(|| a.name.cmp(&b.name)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn invoke(&self, canonical_name: &str, arguments: Value) -> Result<Value, CatalogError> {
        let handler = {
            let entries = self.entries.read().await;
            entries
                .iter()
                .find(|e| e.descriptor.name == canonical_name)
                .map(|e| e.handler.clone())
                .ok_or_else(|| CatalogError::NotFound(canonical_name.to_string()))?
        };

        handler.call(arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn catalog() -> StaticCatalog {
        let catalog = StaticCatalog::new();
        catalog
            .register(
                ToolDescriptor::new("orders.lookup", "Find the status of a customer order", json!({}))
                    .with_tags(["orders", "shipping"]),
                handler_fn(|args| async move {
                    Ok(json!({"order_id": args["order_id"], "status": "shipped"}))
                }),
            )
            .await;
        catalog
            .register(
                ToolDescriptor::new("weather.today", "Current weather for a city", json!({}))
                    .with_tags(["forecast"]),
                handler_fn(|_| async { Ok(json!({"temp_c": 21})) }),
            )
            .await;
        catalog
            .register(
                ToolDescriptor::new("news.top_headlines", "Top news, including shipping news", json!({})),
                handler_fn(|_| async { Ok(json!([])) }),
            )
            .await;
        catalog
    }

    #[test]
    fn tokenize_splits_on_symbols() {
        assert_eq!(tokenize("Where is order A1?"), vec!["where", "is", "order", "a1"]);
        assert!(tokenize("  ?! ").is_empty());
    }

    #[tokio::test]
    async fn search_ranks_name_over_description() {
        let catalog = catalog().await;
        let results = catalog.search("shipping orders", 10).await.unwrap();
        let names: Vec<&str> = results.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["orders.lookup", "news.top_headlines"]);
    }

    #[tokio::test]
    async fn search_respects_limit() {
        let catalog = catalog().await;
        let results = catalog.search("", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "news.top_headlines");
    }

    #[tokio::test]
    async fn search_without_hits_is_empty() {
        let catalog = catalog().await;
        assert!(catalog.search("cryptocurrency", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invoke_dispatches_by_name() {
        let catalog = catalog().await;
        let value = catalog
            .invoke("orders.lookup", json!({"order_id": "A1"}))
            .await
            .unwrap();
        assert_eq!(value, json!({"order_id": "A1", "status": "shipped"}));
    }

    #[tokio::test]
    async fn invoke_unknown_is_not_found() {
        let catalog = catalog().await;
        let err = catalog.invoke("orders_lookup", json!({})).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(name) if name == "orders_lookup"));
    }

    #[tokio::test]
    async fn register_replaces_same_name() {
        let catalog = catalog().await;
        catalog
            .register(
                ToolDescriptor::new("weather.today", "Replaced", json!({})),
                handler_fn(|_| async { Ok(json!("replaced")) }),
            )
            .await;
        assert_eq!(catalog.len().await, 3);
        assert_eq!(
            catalog.invoke("weather.today", json!({})).await.unwrap(),
            json!("replaced")
        );
    }
}
