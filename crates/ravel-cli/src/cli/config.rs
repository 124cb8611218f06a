//! `ravel config`: show the configuration a run would use.

use std::path::Path;

use anyhow::Context;

pub async fn show(path: &Path) -> anyhow::Result<()> {
    let config = ravel_infra::config::load_engine_config(path)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
