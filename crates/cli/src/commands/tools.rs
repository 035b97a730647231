//! `toolrelay tools` — Query and call catalog tools without a model.

use serde_json::Value;
use toolrelay_config::AppConfig;
use toolrelay_core::tool::ToolCatalog;

pub async fn search(query: &str, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = super::load_catalog(&config).await?;

    let tools = catalog.search(query, limit).await?;
    if tools.is_empty() {
        println!("No tools match '{query}'.");
        return Ok(());
    }

    for tool in tools {
        println!("  {}", tool.name);
        if !tool.description.is_empty() {
            println!("      {}", tool.description);
        }
    }
    Ok(())
}

pub async fn call(name: &str, args: &str) -> Result<(), Box<dyn std::error::Error>> {
    let arguments: Value =
        serde_json::from_str(args).map_err(|e| format!("--args is not valid JSON: {e}"))?;
    if !arguments.is_object() {
        return Err("--args must be a JSON object".into());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let catalog = super::load_catalog(&config).await?;

    let value = catalog.invoke(name, arguments).await?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
