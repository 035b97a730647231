//! `toolrelay init` — First-time setup.

use toolrelay_config::AppConfig;

const SAMPLE_MANIFEST: &str = r#"{
  "tools": [
    {
      "name": "geo.city_search",
      "description": "Find a city's coordinates, country and population by name",
      "tags": ["geography", "city", "location"],
      "inputs": {
        "type": "object",
        "properties": {
          "name": {"type": "string", "description": "City name"},
          "count": {"type": "integer", "description": "Maximum number of matches"}
        },
        "required": ["name"]
      },
      "call": {"type": "http", "url": "https://geocoding-api.open-meteo.com/v1/search", "method": "GET"}
    }
  ]
}
"#;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let manifest_path = config_dir.join("tools.json");

    println!("toolrelay — First-Time Setup");
    println!("============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("  Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if !manifest_path.exists() {
        std::fs::write(&manifest_path, SAMPLE_MANIFEST)?;
        println!("  Created sample tool manifest: {}", manifest_path.display());
    }

    if config_path.exists() {
        println!("\n  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete and re-run init.\n");
        return Ok(());
    }

    let mut config = AppConfig::default();
    config.catalog.manifest_path = Some("tools.json".into());
    std::fs::write(&config_path, config.to_toml())?;
    println!("  Created config.toml at: {}", config_path.display());
    println!("\n  Next steps:");
    println!("   1. Set ANTHROPIC_API_KEY (or add api_key to {})", config_path.display());
    println!("   2. Describe your tools in {}", manifest_path.display());
    println!("   3. Run: toolrelay chat\n");

    Ok(())
}
