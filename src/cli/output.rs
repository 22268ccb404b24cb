//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use std::collections::{HashMap, HashSet};

use colored::Colorize;
use termtree::Tree;

use crate::application::{NodeOutput, PartitionOutput, PartitionReport};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print failure status (red X, indented)
pub fn failure(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Print one line per partition with its validation outcome.
pub fn validation_report(reports: &[PartitionReport]) {
    for report in reports {
        let v = &report.validation;
        let line = format!(
            "{}: {}/{} reachable, {} cycles",
            report.partition, v.reachable_nodes, v.total_nodes, v.cycle_count
        );
        if v.all_valid {
            success(&line);
        } else {
            println!("{} {}", "✗".red(), line);
            for id in &v.unreachable_ids {
                failure(&format!("unreachable: {}", id));
            }
            for cycle in &v.cycles {
                failure(&format!("cycle: {}", cycle.join(" -> ")));
            }
        }
        for note in &v.warnings {
            detail(note);
        }
        if report.repairs > 0 {
            detail(&format!("{} repairs applied", report.repairs));
        }
    }
}

fn label(node: &NodeOutput) -> String {
    let name = node.name.as_deref().unwrap_or(&node.form_id);
    let mut label = format!("{} [{}]", name, node.form_id);
    if let Some(level) = &node.skill_level {
        label.push_str(&format!(" {}", level.dimmed()));
    }
    if let Some(theme) = &node.theme {
        label.push_str(&format!(" #{}", theme.cyan()));
    }
    label
}

/// Outline of a partition from its root.
///
/// A node reachable through several prerequisites is expanded once; later
/// occurrences are marked with `^`.
pub fn partition_tree(name: &str, partition: &PartitionOutput) -> Tree<String> {
    let nodes: HashMap<&str, &NodeOutput> = partition
        .nodes
        .iter()
        .map(|n| (n.form_id.as_str(), n))
        .collect();
    let mut seen = HashSet::new();
    let mut top = Tree::new(format!("{} ({})", name.bold(), partition.layout_style));
    top.push(subtree(&partition.root, &nodes, &mut seen));
    top
}

fn subtree<'a>(
    id: &'a str,
    nodes: &HashMap<&'a str, &'a NodeOutput>,
    seen: &mut HashSet<&'a str>,
) -> Tree<String> {
    let Some(&node) = nodes.get(id) else {
        return Tree::new(format!("{} (missing)", id.red()));
    };
    if !seen.insert(id) {
        return Tree::new(format!("{} ^", label(node)));
    }
    let mut tree = Tree::new(label(node));
    for child in &node.children {
        tree.push(subtree(child, nodes, seen));
    }
    tree
}
