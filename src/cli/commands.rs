use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use crate::app::{one_shot_synchronizer, open_store, Result};
use crate::cache::export_snapshot;
use crate::config::Config;
use crate::domain::FeedSnapshot;
use crate::store::{PostStore, SqliteStore};

pub async fn sync_once(config: &Config) -> Result<()> {
    let store = Arc::new(open_store(config)?);
    let start = Instant::now();

    let sync = one_shot_synchronizer(config, store.clone()).await?;
    let (report, snapshot) = sync.run_cycle().await?;
    drop(sync);

    println!(
        "Sync complete: {} new items, {} total ({:.1}s)",
        report.new_items,
        report.total_items,
        start.elapsed().as_secs_f64()
    );
    if report.skipped > 0 {
        eprintln!("  {} items without an id were skipped", report.skipped);
    }

    if let Some(ref path) = config.cache.export_path {
        if let Err(e) = export_snapshot(&snapshot, path) {
            eprintln!("Failed to export feed to {}: {}", path.display(), e);
        }
    }

    if let Ok(store) = Arc::try_unwrap(store) {
        if let Err(e) = store.close() {
            warn!("Failed to close database: {}", e);
        }
    }
    Ok(())
}

/// Snapshot of everything in the local store, without touching the network.
pub fn local_snapshot(config: &Config, store: &impl PostStore) -> Result<FeedSnapshot> {
    let stored = store.scan_all()?;
    Ok(FeedSnapshot::build(
        &config.reddit.username,
        &config.reddit.site_origin,
        &stored,
    ))
}

pub fn render(config: &Config, output: Option<&Path>) -> Result<()> {
    let store = open_store(config)?;
    let snapshot = local_snapshot(config, &store)?;

    match output {
        Some(path) => {
            export_snapshot(&snapshot, path)?;
            println!("Wrote {} items to {}", snapshot.len(), path.display());
        }
        None => {
            let mut stdout = snapshot.write_rss(io::stdout().lock())?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

pub fn list_items(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let lines = item_lines(config, &store)?;

    if lines.is_empty() {
        println!("No items");
        return Ok(());
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn item_lines(config: &Config, store: &SqliteStore) -> Result<Vec<String>> {
    Ok(store
        .scan_all()?
        .into_iter()
        .map(|(seq, item)| {
            format!(
                "{:>6}  {}\n        {}",
                seq.0,
                item.display_title(),
                item.display_link(&config.reddit.site_origin)
            )
        })
        .collect())
}
