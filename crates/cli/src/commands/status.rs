//! `lectern status`: Show configuration status.

use lectern_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let agent = &config.agent;

    println!("Lectern Status");
    println!("==============");
    println!("  Config dir:      {}", AppConfig::config_dir().display());
    println!("  Provider:        {}", config.default_provider);
    println!("  Model:           {}", config.default_model);
    println!("  Temperature:     {}", config.default_temperature);
    println!("  API key:         {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Toolset:         {}", agent.toolset);
    println!("  Max iterations:  {}", agent.max_iterations);
    println!("  Tool errors:     {}", agent.tool_error_mode);
    println!("  Busy sessions:   {}", agent.session_policy);
    println!("  On cancel:       {}", agent.cancel_save);
    println!("  Run timeout:     {}", seconds(agent.run_timeout_secs));
    println!("  Tool timeout:    {}", seconds(agent.tool_timeout_secs));
    println!("  Courses dir:     {}", config.courses.data_dir.display());
    println!("  Gateway:         {}:{}", config.gateway.host, config.gateway.port);

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file, run `lectern onboard` first");
    }

    Ok(())
}

fn seconds(secs: u64) -> String {
    if secs == 0 {
        "none".into()
    } else {
        format!("{secs}s")
    }
}
