// ctree - current tree reconciliation for data archives
// Copyright (C) 2026 ctree Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Terminal output helpers
//!
//! Every command prints through these functions so the binary keeps one
//! look. Log lines go to stderr through `tracing`; what is printed here is
//! the result of the command.

use console::style;

/// Print a success message with a green check mark.
pub fn success(msg: &str) {
    println!("{} {}", style("✅").green().bold(), msg);
}

/// Print an error message to stderr with a red cross.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("❌").red().bold(), msg);
}

/// Print an informational message.
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ️").cyan(), msg);
}

/// Print a warning message.
pub fn warning(msg: &str) {
    println!("{} {}", style("⚠️").yellow(), msg);
}

/// Print a key/value detail line, value highlighted.
///
/// ```text
///   Run id: 0b7c...
///   State: Diffed
/// ```
pub fn detail(key: &str, value: &str) {
    println!("  {}: {}", key, style(value).cyan());
}

/// Print a section header.
pub fn header(msg: &str) {
    println!("{} {}", style("🌲").green().bold(), msg);
}

/// Print one changed path with a marker for its bucket.
pub fn change(marker: char, path: &str) {
    let marker = match marker {
        '+' => style(marker).green(),
        '-' => style(marker).red(),
        '~' => style(marker).yellow(),
        _ => style(marker).cyan(),
    };
    println!("    {} {}", marker, path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_functions_compile() {
        let _ = success;
        let _ = error;
        let _ = info;
        let _ = warning;
        let _ = detail;
        let _ = header;
        let _ = change;
    }
}
