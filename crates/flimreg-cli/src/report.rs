use std::fmt::Write;
use std::path::Path;

use colored::Colorize;
use flimreg_common::ConfigError;
use flimreg_plugins::{PathKind, ReaderContribution, RegistrationTable};

/// Outcome line(s) for one validated manifest.
pub fn validation(path: &Path, errors: &[ConfigError]) -> String {
    let mut out = String::new();
    if errors.is_empty() {
        let _ = writeln!(out, "{} {}", "✓".green(), path.display());
    } else {
        let _ = writeln!(
            out,
            "{} {} ({} error{})",
            "✗".red(),
            path.display(),
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        );
        for err in errors {
            let _ = writeln!(out, "    {err}");
        }
    }
    out
}

/// One-line summary used by `plugin list`.
pub fn summary(table: &RegistrationTable) -> String {
    format!(
        "  {} - {} ({} commands, {} readers, {} samples, {} widgets)",
        table.name().as_str().bold(),
        table.display_name(),
        table.commands().len(),
        table.readers().len(),
        table.sample_data().len(),
        table.widgets().len()
    )
}

/// Full listing of one plugin's contributions.
pub fn details(table: &RegistrationTable) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", table.display_name().bold(), table.name());

    let _ = writeln!(out, "\n{}", "Commands:".bold());
    for command in table.commands() {
        let _ = writeln!(out, "  {}  {}", command.id, command.title);
        let _ = writeln!(out, "      -> {}", command.entry_point.to_string().dimmed());
    }

    if !table.readers().is_empty() {
        let _ = writeln!(out, "\n{}", "Readers:".bold());
        for reader in table.readers() {
            let dirs = if reader.accepts_directories {
                ", directories"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  {}  [{}{}]",
                reader.command,
                reader.filename_patterns.join(", "),
                dirs
            );
        }
    }

    if !table.sample_data().is_empty() {
        let _ = writeln!(out, "\n{}", "Sample data:".bold());
        for sample in table.sample_data() {
            let _ = writeln!(
                out,
                "  {}  {} ({})",
                sample.key, sample.display_name, sample.command
            );
        }
    }

    if !table.widgets().is_empty() {
        let _ = writeln!(out, "\n{}", "Widgets:".bold());
        for widget in table.widgets() {
            let _ = writeln!(out, "  {} ({})", widget.display_name, widget.command);
        }
    }
    out
}

/// Reader claims for one opened path.
pub fn claims(path: &Path, kind: PathKind, readers: &[&ReaderContribution]) -> String {
    let label = match kind {
        PathKind::File => "file",
        PathKind::Directory => "dir",
    };
    if readers.is_empty() {
        return format!("{} [{label}] {}", path.display(), "no reader".yellow());
    }
    let commands: Vec<_> = readers.iter().map(|r| r.command.as_str()).collect();
    format!("{} [{label}] -> {}", path.display(), commands.join(", ").green())
}
