//! Configuration display.

use attachd::Settings;

/// Print the fully resolved settings.
pub fn cmd_config_show(settings: &Settings) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(settings)?;
    println!("{}", json);
    Ok(())
}
