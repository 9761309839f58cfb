use crate::link::{ClosureViolation, LinkDiff};
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().header.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// Print the membership change of one link cell write
pub fn link_diff(diff: &LinkDiff) {
    if diff.is_empty() {
        println!("  {}", dim("links unchanged"));
        return;
    }
    for id in &diff.added {
        println!("  {} {}", Icons::ADDED.style(theme().success.clone()), id.style(theme().link.clone()));
    }
    for id in &diff.removed {
        println!("  {} {}", Icons::REMOVED.style(theme().error.clone()), id.style(theme().link.clone()));
    }
}

pub fn violation(v: &ClosureViolation) {
    eprintln!("  {} {}", Icons::LINK.style(theme().warn.clone()), v);
}
