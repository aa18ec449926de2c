//! `hotloop new` command implementation

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use colored::Colorize;
use hotloop_plugins::LoaderConfig;
use hotloop_plugins::hot_reload::entry::render_template;

/// Execute the `new` command: write `<plugins_dir>/<name>.<ext>` from the
/// template, refusing to overwrite.
pub fn run(config: &LoaderConfig, name: &str) -> anyhow::Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        anyhow::bail!("invalid plugin name '{}': use letters, digits, '_' or '-'", name);
    }

    let dir = &config.plugins_dir;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let path: PathBuf = dir.join(format!("{}.{}", name, config.source_extension));
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    file.write_all(render_template(name).as_bytes())?;

    println!("{} Created plugin {}", "✓".green(), path.display().to_string().cyan());
    Ok(())
}
