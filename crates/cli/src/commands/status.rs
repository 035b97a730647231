//! `toolrelay status` — Show resolved configuration.

use toolrelay_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let orchestration = &config.orchestration;

    println!("toolrelay Status");
    println!("================");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Provider:        {}", config.default_provider);
    println!("  Model:           {}", config.default_model);
    println!("  Temperature:     {}", config.default_temperature);
    println!("  API key:         {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Search limit:    {}", orchestration.search_limit);
    println!("  Max rounds:      {}", orchestration.max_rounds);
    println!(
        "  Tool calls:      {}",
        if orchestration.parallel_tool_calls { "parallel" } else { "sequential" }
    );
    match orchestration.tool_timeout_secs {
        0 => println!("  Tool timeout:    none"),
        secs => println!("  Tool timeout:    {secs}s"),
    }

    match config.manifest_path() {
        Some(path) => {
            let catalog = super::load_catalog(&config).await?;
            println!("  Manifest:        {}", path.display());
            println!("  Catalog tools:   {}", catalog.len().await);
        }
        None => println!("  Manifest:        (none)"),
    }

    for (name, provider) in &config.providers {
        println!("  [providers.{name}] {provider:?}");
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `toolrelay init` first");
    }

    Ok(())
}
