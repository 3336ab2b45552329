mod bootstrap;
mod views;

use anyhow::{Context, Result};
use clap::Parser;
use tracker_core::settings::{Settings, SourceLayout};
use tracker_runtime::fetch::FetchOptions;
use tracker_runtime::processor;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    bootstrap::setup_logging(settings.effective_log_level(), settings.log_file.as_deref())?;

    tracing::info!("covid-tracker v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Scope: {}, Statistic: {}, View: {}",
        settings.scope,
        settings.stat,
        settings.view
    );

    let mut layout = SourceLayout::load(settings.config.as_deref()).context("failed to load source layout")?;
    if let Some(root) = &settings.data_dir {
        layout = layout.with_root(root.clone());
    }

    if settings.init_config {
        let path = match &settings.config {
            Some(path) => path.clone(),
            None => {
                bootstrap::ensure_directories()?;
                SourceLayout::config_path()
            }
        };
        layout.save_to(&path)?;
        println!("Wrote source layout to {}", path.display());
        return Ok(());
    }

    let options = FetchOptions::new(settings.timeout_secs, settings.as_of);
    let store = processor::load(&layout, &options)
        .await
        .context("failed to build statistics store")?;

    let scope = settings.scope;
    let stat = settings.stat;
    let output = match settings.view.as_str() {
        "summary" => views::summary(&store, scope, stat)?,
        "table" => views::table(&store, scope, stat)?,
        "top" => views::top(&store, scope, stat, settings.value_type, settings.count)?,
        "bottom" => views::bottom(&store, scope, stat, settings.count)?,
        "latest" => views::latest(&store, scope, stat, settings.location.as_deref())?,
        "series" => views::series(
            &store,
            scope,
            stat,
            settings.value_type,
            settings.location.as_deref(),
            settings.overall,
        )?,
        unknown => anyhow::bail!("Unknown view: {}", unknown),
    };
    print!("{}", output);

    Ok(())
}
