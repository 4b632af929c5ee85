//! `lectern onboard`: First-time setup.

use lectern_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");
    let defaults = AppConfig::default();

    println!("Lectern: First-Time Setup");
    println!("==========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    let courses_dir = &defaults.courses.data_dir;
    if !courses_dir.exists() {
        std::fs::create_dir_all(courses_dir)?;
        println!("Created courses directory: {}", courses_dir.display());
    }

    if config_path.exists() {
        println!("\nConfig already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("Created config.toml at: {}", config_path.display());
        println!("\nNext steps:");
        println!("   1. Set LECTERN_API_KEY or edit {}", config_path.display());
        println!(
            "   2. Put course markdown under {}/<slug>/<slug>.md",
            courses_dir.display()
        );
        println!("   3. Run: lectern agent\n");
    }

    Ok(())
}
