use anyhow::{Context, Result};

use flowcost::core::config::AppConfig;

pub fn init() -> Result<()> {
    let path = AppConfig::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    let path = AppConfig::default()
        .save()
        .context("Failed to generate config")?;
    println!("Generated config at {}", path.display());
    println!("  Pricing source: embedded table");
    println!("  Set [pricing] source to a registry file or HTTPS URL to load more models.");
    Ok(())
}

pub fn check() -> Result<()> {
    let path = AppConfig::config_path();
    if !path.exists() {
        eprintln!("No config file found at {}", path.display());
        eprintln!("Run `flowcost config init` to create one.");
        return Ok(());
    }

    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config is valid: {}", path.display());
        println!("  Pricing source: {}", config.pricing_source());
        println!("  Fallback model: {}", config.pricing.fallback_model);
        if !config.pricing.hardware.is_empty() {
            let ids: Vec<_> = config.pricing.hardware.iter().map(|h| h.id.as_str()).collect();
            println!("  Hardware overrides: {}", ids.join(", "));
        }
    } else {
        eprintln!("Config issues found in {}:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Print the effective configuration, env overrides included.
pub fn show(config: &AppConfig) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    println!("# {}", AppConfig::config_path().display());
    print!("{}", content);
    Ok(())
}
