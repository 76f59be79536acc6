//! Command handlers

use crate::args::Command;
use crate::error::{CliError, Result};
use recent_files::{
    format_byte_size, format_relative_time, record_summary, DocumentRecord, OpenedDocument,
    RecentFilesCache, Rotation, ViewStatePatch,
};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

/// Content fingerprint: SHA-256 of the bytes, hex encoded
pub fn fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

fn view_patch(
    page: Option<u32>,
    zoom: Option<f64>,
    rotation: Option<i64>,
    scroll: (Option<f64>, Option<f64>),
) -> Result<ViewStatePatch> {
    let rotation = rotation.map(Rotation::try_from).transpose()?;
    Ok(ViewStatePatch {
        page,
        zoom_factor: zoom,
        scroll_offset_x: scroll.0,
        scroll_offset_y: scroll.1,
        rotation,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list_line(record: &DocumentRecord, now: i64) -> String {
    let cached = if record.is_content_cached {
        format_byte_size(record.cached_byte_size)
    } else {
        "-".to_string()
    };
    let short: String = record.fingerprint.chars().take(12).collect();
    format!(
        "{}  {}  {}  {}",
        short,
        record.display_name,
        format_relative_time(now, record.last_opened_at),
        cached
    )
}

fn require(found: bool, fingerprint: &str) -> Result<()> {
    if found {
        Ok(())
    } else {
        Err(CliError::NotTracked(fingerprint.to_string()))
    }
}

pub async fn run(cache: &RecentFilesCache, command: Command) -> Result<()> {
    match command {
        Command::Open {
            path,
            name,
            page,
            zoom,
            rotation,
            no_cache,
        } => {
            let content = tokio::fs::read(&path).await?;
            let fp = fingerprint(&content);
            let locator = tokio::fs::canonicalize(&path)
                .await
                .unwrap_or_else(|_| path.clone());
            let display_name = name.unwrap_or_else(|| file_name(&path));

            let mut opened = OpenedDocument::new(&fp, display_name, locator.display().to_string())
                .with_view_state(view_patch(page, zoom, rotation, (None, None))?);
            if !no_cache {
                opened = opened.with_content(content);
            }
            cache.record_opened(opened).settled().await;

            let record = cache.get(&fp).ok_or_else(|| CliError::NotTracked(fp.clone()))?;
            println!("{}  {}", record.fingerprint, record.display_name);
        }

        Command::List { search } => {
            let records = match search {
                Some(query) => cache.search(&query),
                None => cache.list_recent(),
            };
            if records.is_empty() {
                println!("No recent files");
            }
            let now = cache.now_millis();
            for record in &records {
                println!("{}", list_line(record, now));
            }
        }

        Command::Info { fingerprint } => {
            let record = cache
                .get(&fingerprint)
                .ok_or(CliError::NotTracked(fingerprint))?;
            println!("{}", record_summary(&record, cache.now_millis()));
        }

        Command::Fetch {
            fingerprint,
            output,
        } => {
            let record = cache
                .get(&fingerprint)
                .ok_or_else(|| CliError::NotTracked(fingerprint.clone()))?;
            match cache.fetch_cached_content(&fingerprint).await {
                Some(content) => match output {
                    Some(path) => {
                        tokio::fs::write(&path, &content).await?;
                        println!(
                            "Wrote {} to {}",
                            format_byte_size(content.len() as u64),
                            path.display()
                        );
                    }
                    None => println!("Cached: {}", format_byte_size(content.len() as u64)),
                },
                None => println!("Not cached, open from {}", record.source_locator),
            }
        }

        Command::View {
            fingerprint,
            page,
            zoom,
            rotation,
            scroll_x,
            scroll_y,
        } => {
            let patch = view_patch(page, zoom, rotation, (scroll_x, scroll_y))?;
            require(cache.update_view_state(&fingerprint, &patch), &fingerprint)?;
        }

        Command::Edits {
            fingerprint,
            has_edits,
        } => {
            require(
                cache.set_has_unsaved_edits(&fingerprint, has_edits),
                &fingerprint,
            )?;
        }

        Command::Replace { fingerprint, path } => {
            let content = tokio::fs::read(&path).await?;
            cache.replace_cached_content(&fingerprint, content).await?;
            println!("Replaced cached content for {}", fingerprint);
        }

        Command::Thumbnail {
            fingerprint,
            encoded,
        } => {
            require(cache.update_thumbnail(&fingerprint, encoded), &fingerprint)?;
        }

        Command::Remove { fingerprint } => {
            let tracked = cache.get(&fingerprint).is_some();
            cache.remove(&fingerprint).settled().await;
            debug!(fingerprint = %fingerprint, tracked, "Remove finished");
        }

        Command::Clear => {
            let count = cache.len();
            cache.clear_all().settled().await;
            println!("Cleared {} recent files", count);
        }

        Command::Sweep => {
            let removed = cache.sweep_expired().await;
            println!("Removed {} expired cached documents", removed);
        }

        Command::Stats => {
            let records = cache.list_recent();
            let cached: Vec<&DocumentRecord> =
                records.iter().filter(|r| r.is_content_cached).collect();
            let cached_bytes: u64 = cached.iter().map(|r| r.cached_byte_size).sum();
            println!("Documents: {} / {}", records.len(), cache.capacity());
            println!(
                "Cached: {} ({})",
                cached.len(),
                format_byte_size(cached_bytes)
            );
            println!(
                "Content cache: {}",
                if cache.content_available() {
                    "available"
                } else {
                    "unavailable"
                }
            );
        }
    }
    Ok(())
}
