//! Shared styling utilities for terminal output.

use branchdiff_core::{Category, ComparisonStatus};
use comfy_table::{Cell, Color};
use console::Style;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// One-line status for a branch comparison.
pub fn comparison_status(status: ComparisonStatus) -> String {
    match status {
        ComparisonStatus::Clean => success("merges cleanly"),
        ComparisonStatus::Conflicted => warn("merge has conflicts"),
        ComparisonStatus::Error => error("comparison failed"),
    }
}

/// Table cell colored by how much attention the category needs.
pub fn category_cell(category: Category) -> Cell {
    let cell = Cell::new(category.to_string());
    match category {
        Category::Conflict => cell.fg(Color::Red),
        Category::Semantic => cell.fg(Color::Yellow),
        Category::Moved | Category::Reordered => cell.fg(Color::Cyan),
        Category::CommentOnly | Category::FormattingOnly => cell.fg(Color::Green),
        Category::Unchanged => cell.fg(Color::DarkGrey),
    }
}
