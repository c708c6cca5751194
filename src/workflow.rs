use crate::agents::{
    FileFailure, FileReport, RunMode, RunObserver, RunReport, UpdateOrchestrator, UpdaterOutcome,
};
use crate::cli::{ConfigAction, RunArgs};
use crate::error::Result;
use crate::settings::{DEFAULT_SETTINGS_FILE, DiffTheme, Settings, SettingsEditor};
use crate::updaters::UpdaterRegistry;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};

/// Execute the detect workflow (dry-run). Returns whether anything needs
/// attention: a file with changes or a file that could not be processed.
pub fn execute_detect(
    settings_file: Option<&Path>,
    token: Option<String>,
    args: &RunArgs,
    quiet: bool,
) -> Result<bool> {
    println!("{}", "Detecting outdated workflow syntax...".cyan().bold());

    let report = run(settings_file, token, args, RunMode::Detect, quiet)?;
    print_failures(&report);

    let changed = report.changed_files().count();
    if changed == 0 {
        println!("\n{}", "✨ All workflows are up to date!".green().bold());
    } else {
        println!(
            "\n{}",
            format!("Found changes in {changed} file(s)").yellow().bold()
        );
        println!("{}", "To apply these updates, run:".dimmed());
        println!("  {}", "action-updater update <PATH>...".cyan());
    }

    Ok(report.has_changes() || report.has_failures())
}

/// Execute the update workflow
pub fn execute_update(
    settings_file: Option<&Path>,
    token: Option<String>,
    args: &RunArgs,
    quiet: bool,
) -> Result<()> {
    println!("{}", "Updating workflows...".cyan().bold());

    let report = run(settings_file, token, args, RunMode::Update, quiet)?;
    print_failures(&report);

    let written = report.written_files();
    if written == 0 {
        println!("\n{}", "No updates were applied".yellow());
    } else {
        println!(
            "\n{}",
            format!("✨ Updated {written} file(s)").green().bold()
        );
    }
    Ok(())
}

fn run(
    settings_file: Option<&Path>,
    token: Option<String>,
    args: &RunArgs,
    mode: RunMode,
    quiet: bool,
) -> Result<RunReport> {
    let settings = Settings::load(settings_file)?;
    let theme = settings.diff_theme;
    let mut orchestrator = UpdateOrchestrator::new(settings, token, &args.selectors())?
        .with_details(!args.no_details);

    let mut console = ConsoleObserver::new(theme, quiet);
    let report = orchestrator.run_with(&args.paths, mode, &mut console)?;
    console.finish();
    Ok(report)
}

/// List the compiled-in updaters
pub fn execute_list_updaters() -> Result<()> {
    println!("{}", "Available updaters:".cyan().bold());
    for metadata in UpdaterRegistry::discover().metadata() {
        println!(
            "\n  {} ({})",
            metadata.title.white().bold(),
            metadata.id.bright_cyan()
        );
        println!("    {}", metadata.description.dimmed());
        if let Some(schema) = metadata.schema {
            for (name, description) in schema.fields() {
                println!(
                    "    {} {}",
                    format!("[updaters.{}] {name}:", metadata.id).yellow(),
                    description
                );
            }
        }
    }
    Ok(())
}

/// Read or edit the settings file
pub fn execute_config(settings_file: Option<&Path>, action: &ConfigAction) -> Result<()> {
    let path = settings_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));

    match action {
        ConfigAction::Get { key: None } => {
            let settings = Settings::load(settings_file)?;
            print!("{}", settings.to_toml_string()?);
        }
        ConfigAction::Get { key: Some(key) } => {
            let editor = SettingsEditor::open(&path)?;
            match editor.get(key)? {
                Some(value) => println!("{value}"),
                None => println!("{}", format!("'{key}' is not set in {}", path.display()).yellow()),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut editor = SettingsEditor::open(&path)?;
            editor.set(key, value)?;
            editor.save()?;
            println!("{}", format!("✓ Set {key} in {}", path.display()).green());
        }
        ConfigAction::Add { key, value } => {
            let mut editor = SettingsEditor::open(&path)?;
            editor.add(key, value)?;
            editor.save()?;
            println!("{}", format!("✓ Added {value} to {key}").green());
        }
        ConfigAction::Remove { key, value } => {
            let mut editor = SettingsEditor::open(&path)?;
            if editor.remove(key, value.as_deref())? {
                editor.save()?;
                println!("{}", format!("✓ Removed from {key}").green());
            } else {
                println!("{}", format!("Nothing to remove at '{key}'").yellow());
            }
        }
    }
    Ok(())
}

/// Prints each file as soon as it is processed, above a progress bar.
struct ConsoleObserver {
    bar: ProgressBar,
    theme: DiffTheme,
    quiet: bool,
}

impl ConsoleObserver {
    fn new(theme: DiffTheme, quiet: bool) -> Self {
        let bar = ProgressBar::new(0);
        if quiet {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40}] {pos}/{len} {msg}")
                .expect("progress template is valid")
                .progress_chars("=>-"),
        );
        Self { bar, theme, quiet }
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl RunObserver for ConsoleObserver {
    fn on_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        if !self.quiet {
            println!("   Found {total} workflow file(s)\n");
        }
    }

    fn on_file(&mut self, report: &FileReport) {
        if !self.quiet {
            self.bar.suspend(|| print_file_report(report, self.theme));
        }
        if let Some(name) = report.path.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
        self.bar.inc(1);
    }

    fn on_failure(&mut self, failure: &FileFailure) {
        self.bar.suspend(|| {
            println!(
                "{} {}",
                "⚠".red(),
                failure.path.display().to_string().red()
            )
        });
        self.bar.inc(1);
    }
}

fn print_file_report(report: &FileReport, theme: DiffTheme) {
    println!("{}", report.path.display().to_string().white().bold());
    for outcome in &report.outcomes {
        let line = outcome_line(outcome);
        if outcome.changed {
            println!("  {}", line.red());
        } else {
            println!("  {}", line.green());
        }
    }
    if let Some(diff) = &report.diff {
        println!();
        print_diff(diff, theme);
    }
    println!();
}

fn outcome_line(outcome: &UpdaterOutcome) -> String {
    if outcome.changed {
        format!("✖️ {} Updater: {} updates", outcome.title, outcome.count)
    } else {
        format!("✔ {}: No updates", outcome.title)
    }
}

fn print_diff(diff: &str, theme: DiffTheme) {
    for line in diff.lines() {
        match theme {
            DiffTheme::Monochrome => println!("    {line}"),
            DiffTheme::Vim => {
                let styled = if line.starts_with("+++") || line.starts_with("---") {
                    line.bold()
                } else if line.starts_with("@@") {
                    line.cyan()
                } else if line.starts_with('+') {
                    line.green()
                } else if line.starts_with('-') {
                    line.red()
                } else {
                    line.normal()
                };
                println!("    {styled}");
            }
        }
    }
}

fn print_failures(report: &RunReport) {
    if !report.has_failures() {
        return;
    }
    println!(
        "\n{}",
        format!("{} file(s) could not be processed:", report.failures.len())
            .red()
            .bold()
    );
    for failure in &report.failures {
        println!("  • {}", failure.error.red());
    }
}
