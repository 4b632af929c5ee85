//! `lectern gateway`: Start the HTTP API server.

use lectern_config::AppConfig;

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("Lectern Gateway");
    println!("   Listening:   {}:{}", config.gateway.host, config.gateway.port);
    println!("   CORS origin: {}", config.gateway.cors_origin);
    println!("   Toolset:     {}", config.agent.toolset);

    lectern_gateway::start(config).await?;

    Ok(())
}
