//! One-shot pipeline driver: load config and database, enumerate sources and
//! external locales, process, flush, compile, write outputs.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use walkdir::WalkDir;

use super::args::{Arguments, ExitStatus};
use super::watch;
use crate::config::{self, Config, Options};
use crate::db;
use crate::diagnostics::{DiagnosticReport, Diagnostics, Handling};
use crate::externals;
use crate::project::{Project, WriteHooks};
use crate::report::{self, ResolvedDiagnostic};

const SOURCE_EXTENSIONS: &[&str] = &["html", "htm", "json"];

/// Collected per-cycle reporting state shared with the diagnostics sink.
struct Collected {
    items: Rc<RefCell<Vec<ResolvedDiagnostic>>>,
    had_error: Rc<Cell<bool>>,
}

pub fn run_cli(args: Arguments) -> Result<ExitStatus> {
    if args.init {
        return init();
    }

    let config_path = args
        .config
        .canonicalize()
        .with_context(|| format!("Config file not found: {}", args.config.display()))?;
    let base_dir = config_path
        .parent()
        .ok_or_else(|| anyhow!("config file has no parent directory"))?
        .to_path_buf();
    let config = config::load_config(&config_path)?;
    let options = Options::compile(&config, &base_dir)?;

    if args.verbose {
        print_resolved_config(&config, &options)?;
    }

    let collected = Collected {
        items: Rc::new(RefCell::new(Vec::new())),
        had_error: Rc::new(Cell::new(false)),
    };
    let mut diagnostics = Diagnostics::new();
    {
        let policy = options.handling.clone();
        let items = Rc::clone(&collected.items);
        let had_error = Rc::clone(&collected.had_error);
        diagnostics.subscribe(move |diagnostic| {
            let handling = policy.resolve(diagnostic.code());
            if handling == Handling::Ignore {
                return;
            }
            if handling == Handling::Error {
                had_error.set(true);
            }
            items.borrow_mut().push(ResolvedDiagnostic {
                diagnostic: diagnostic.clone(),
                handling,
            });
        });
    }

    let mut project = Project::new(options, args.dev, diagnostics);
    load_translation_data(&mut project)?;
    let source_count = enumerate_sources(&mut project)?;
    let external_files = populate_external_locales(&mut project)?;
    if args.verbose {
        println!("{} source files, {} external locale files", source_count, external_files.len());
    }

    run_cycle(&mut project)?;
    let reported = flush_report(&collected);

    if args.watch_enabled() {
        println!("{}", "Watching for changes...".cyan());
        watch::watch_loop(&mut project, &external_files, &collected.had_error, |project| {
            let result = run_cycle(project);
            flush_report(&collected);
            result
        })?;
    }

    if collected.had_error.get() {
        Ok(ExitStatus::Failure)
    } else {
        if reported == 0 {
            report::print_success(source_count, project.options().locales.len());
        }
        Ok(ExitStatus::Success)
    }
}

fn init() -> Result<ExitStatus> {
    let path = Path::new(config::DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!("{} already exists", config::DEFAULT_CONFIG_FILE);
    }
    fs::write(path, config::default_config_json()?)?;
    println!(
        "{} {}",
        report::SUCCESS_MARK.green(),
        format!("Created {}", config::DEFAULT_CONFIG_FILE).green()
    );
    Ok(ExitStatus::Success)
}

fn print_resolved_config(config: &Config, options: &Options) -> Result<()> {
    let rendered =
        serde_json::to_string_pretty(config).context("Failed to render resolved config")?;
    println!("{}", rendered);
    println!("source root: {}", options.src_root.display());
    println!(
        "translation data: {}",
        options.translation_data_path.display()
    );
    Ok(())
}

fn load_translation_data(project: &mut Project) -> Result<()> {
    let path = project.options().translation_data_path.clone();
    match fs::read_to_string(&path) {
        Ok(text) => {
            let data = db::parse(&text, &project.options().base_dir)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            project.set_translation_data(data);
            Ok(())
        }
        // Absent means a new project; anything else is fatal.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("Failed to read {}", path.display()))
        }
    }
}

pub(super) fn is_source_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn enumerate_sources(project: &mut Project) -> Result<usize> {
    let src_root = project.options().src_root.clone();
    if !src_root.exists() {
        anyhow::bail!("source root does not exist: {}", src_root.display());
    }
    let mut count = 0;
    for entry in WalkDir::new(&src_root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to scan {}", src_root.display()))?;
        if !entry.file_type().is_file() || !is_source_path(entry.path()) {
            continue;
        }
        let filename = entry.path().to_string_lossy().to_string();
        let text = fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read source {}", filename))?;
        if project.update_source(&filename, text)? {
            count += 1;
        }
    }
    Ok(count)
}

fn populate_external_locales(project: &mut Project) -> Result<Vec<PathBuf>> {
    let external_config = project.options().external_locales.clone();
    let base_dir = project.options().base_dir.clone();
    let mut all_files = Vec::new();

    for (locale, patterns) in external_config {
        let mut filenames = Vec::new();
        for pattern in patterns {
            let absolute = if Path::new(&pattern).is_absolute() {
                pattern.clone()
            } else {
                base_dir.join(&pattern).to_string_lossy().to_string()
            };
            let matches = glob::glob(&absolute)
                .with_context(|| format!("Invalid external locale pattern: {}", pattern))?;
            for path in matches {
                let path =
                    path.with_context(|| format!("Failed to scan pattern: {}", pattern))?;
                if path.is_file() {
                    filenames.push(path.to_string_lossy().to_string());
                }
            }
        }
        for filename in externals::deduplicate_module_filenames(filenames) {
            let text = fs::read_to_string(&filename)
                .with_context(|| format!("Failed to read external locale {}", filename))?;
            let tree = project.with_diagnostics(|diagnostics| {
                externals::parse_locale_tree(&filename, &text, diagnostics)
            });
            project.set_external_locale(&locale, &filename, tree);
            all_files.push(PathBuf::from(filename));
        }
    }
    Ok(all_files)
}

/// Filesystem write hooks used in development mode.
struct FsWriteHooks {
    translation_data_path: PathBuf,
}

impl WriteHooks for FsWriteHooks {
    fn write_source(&mut self, filename: &str, text: &str) -> Result<()> {
        fs::write(filename, text).with_context(|| format!("Failed to write {}", filename))
    }

    fn write_translation_data(&mut self, text: &str) -> Result<()> {
        if let Some(parent) = self.translation_data_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&self.translation_data_path, text).with_context(|| {
            format!("Failed to write {}", self.translation_data_path.display())
        })
    }
}

/// One full process → flush → compile → emit cycle.
pub(super) fn run_cycle(project: &mut Project) -> Result<()> {
    project.process_sources()?;
    let mut hooks = FsWriteHooks {
        translation_data_path: project.options().translation_data_path.clone(),
    };
    project.handle_modified(&mut hooks)?;
    let locales = project.compile_locales();

    let base_dir = project.options().base_dir.clone();
    let template = project.options().output_template.clone();
    for (locale, tree) in locales {
        let output_path = base_dir.join(template.replace("[locale]", &locale));
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&output_path, tree.to_minified_json())
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
    }
    Ok(())
}

fn flush_report(collected: &Collected) -> usize {
    let items: Vec<ResolvedDiagnostic> = collected.items.borrow_mut().drain(..).collect();
    report::report(&items);
    items.len()
}
