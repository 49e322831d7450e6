//! List presets command.

use anyhow::Result;
use stratum_engine::PresetRegistry;

pub fn run() -> Result<()> {
    let registry = PresetRegistry::new();

    println!("Available Presets");
    println!("═══════════════════════════════════════════════════════════");
    println!();

    for info in registry.list() {
        println!("  {}", info.name);
        println!("  ───────────────────────────────────────────────────────");
        println!("  {}", info.description);
        for (key, value) in info.defaults.iter() {
            println!("    {key:<28} {value}");
        }
        println!();
    }

    println!("Use --preset <name> to select a preset and --param key=value to override a default.");

    Ok(())
}
