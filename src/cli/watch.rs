//! Thin watch-mode glue: an mtime-polling scanner feeding batched updates
//! into the project.
//!
//! The core only consumes ordered update batches; everything filesystem-y
//! stays out here. Batches apply in arrival order, and the next scan waits
//! for the previous cycle to complete (the loop itself is the single-writer
//! queue). A failing cycle is logged and raises the eventual exit code, but
//! the loop keeps running.

use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use colored::Colorize;
use walkdir::WalkDir;

use crate::project::{Project, Update};

const POLL_INTERVAL: Duration = Duration::from_millis(400);

pub(super) fn watch_loop(
    project: &mut Project,
    external_files: &[PathBuf],
    had_error: &Rc<Cell<bool>>,
    mut cycle: impl FnMut(&mut Project) -> Result<()>,
) -> Result<()> {
    let mut snapshot = scan(project, external_files);
    loop {
        thread::sleep(POLL_INTERVAL);
        let current = scan(project, external_files);
        let updates = diff(&snapshot, &current);
        snapshot = current;
        if updates.is_empty() {
            continue;
        }

        let result = match project.apply_updates(updates) {
            Ok(()) => cycle(project),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            eprintln!("{} {:#}", "Error:".bold().red(), err);
            had_error.set(true);
        }
    }
}

/// Modification times of everything watched: the translation-data file, the
/// external locale files, and the source tree.
fn scan(project: &Project, external_files: &[PathBuf]) -> HashMap<PathBuf, SystemTime> {
    let mut times = HashMap::new();
    let options = project.options();

    record(&mut times, &options.translation_data_path);
    for path in external_files {
        record(&mut times, path);
    }
    for entry in WalkDir::new(&options.src_root).into_iter().flatten() {
        if entry.file_type().is_file() && super::run::is_source_path(entry.path()) {
            record(&mut times, entry.path());
        }
    }
    times
}

fn record(times: &mut HashMap<PathBuf, SystemTime>, path: &Path) {
    if let Ok(metadata) = fs::metadata(path) {
        if let Ok(modified) = metadata.modified() {
            times.insert(path.to_path_buf(), modified);
        }
    }
}

fn diff(
    before: &HashMap<PathBuf, SystemTime>,
    after: &HashMap<PathBuf, SystemTime>,
) -> Vec<Update> {
    let mut updates = Vec::new();
    for (path, time) in after {
        if before.get(path) != Some(time) {
            if let Ok(text) = fs::read_to_string(path) {
                updates.push(Update::Upsert {
                    filename: path.to_string_lossy().to_string(),
                    text,
                });
            }
        }
    }
    for path in before.keys() {
        if !after.contains_key(path) {
            updates.push(Update::Delete {
                filename: path.to_string_lossy().to_string(),
            });
        }
    }
    // Deletions after upserts within a batch is arbitrary but stable; the
    // scanner cannot observe true arrival order anyway.
    updates
}
