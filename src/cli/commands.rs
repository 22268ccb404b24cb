//! Command dispatch

use std::io;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::{IoResultExt, ScoreService, TreeBuildService, TreeOutput};
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, Settings};
use crate::domain::BuilderKind;
use crate::infrastructure::di::ServiceContainer;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, see `skilltree --help`".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "skilltree", &mut io::stdout());
            Ok(())
        }
        Commands::Config {
            command: ConfigCommands::Path,
        } => config_path(cli.config.as_deref()),
        _ => {
            let settings = Settings::load(cli.config.as_deref())?;
            let container = ServiceContainer::new(settings);
            dispatch(&container, command)
        }
    }
}

fn dispatch(container: &ServiceContainer, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Build {
            items,
            builder,
            seed,
            max_children,
            output,
        } => build(
            container,
            items,
            *builder,
            *seed,
            *max_children,
            output.as_deref(),
        ),
        Commands::Validate {
            tree,
            fix,
            max_children,
        } => validate(container, tree, *fix, *max_children),
        Commands::Show { tree, partition } => show(container, tree, partition.as_deref()),
        Commands::Themes { items, top } => themes(container, items, *top),
        Commands::Score { request } => score(container, request),
        Commands::Config {
            command: ConfigCommands::Show,
        } => {
            output::info(&container.settings.to_toml()?);
            Ok(())
        }
        Commands::Config {
            command: ConfigCommands::Path,
        }
        | Commands::Completion { .. } => Ok(()),
    }
}

#[instrument(skip(container))]
fn build(
    container: &ServiceContainer,
    items: &Path,
    builder: Option<BuilderKind>,
    seed: Option<u64>,
    max_children: Option<usize>,
    out: Option<&Path>,
) -> CliResult<()> {
    let records = container.corpus.load(items)?;

    let mut config = container.settings.build.clone();
    if let Some(seed) = seed {
        config.seed = seed;
    }
    if let Some(max_children) = max_children {
        if max_children == 0 {
            return Err(CliError::InvalidArgs(
                "--max-children must be at least 1".to_string(),
            ));
        }
        config.max_children_per_node = max_children;
    }
    let kind = builder.unwrap_or(container.settings.builder);
    debug!(%kind, seed = config.seed, "build parameters");

    let tree = container.build_service.build(&records, kind, &config)?;
    let json = TreeBuildService::render_tree(&tree)?;

    match out {
        Some(path) => {
            let path = resolve_output(&container.settings.output_dir, path);
            write_tree(container, &path, &json)?;
            output::action(
                "Wrote",
                &format!(
                    "{} ({} partitions, {} nodes, seed {})",
                    path.display(),
                    tree.partitions.len(),
                    tree.validation.total_nodes,
                    tree.seed
                ),
            );
        }
        None => output::info(&json),
    }

    if !tree.validation.all_valid {
        output::warning(&format!(
            "{} of {} nodes unreachable",
            tree.validation.total_nodes - tree.validation.reachable_nodes,
            tree.validation.total_nodes
        ));
    }
    Ok(())
}

#[instrument(skip(container))]
fn validate(
    container: &ServiceContainer,
    path: &Path,
    fix: bool,
    max_children: Option<usize>,
) -> CliResult<()> {
    let mut tree = read_tree(container, path)?;
    let max_children = max_children
        .unwrap_or_else(|| container.settings.build.effective_max_children())
        .max(1);

    let reports = container
        .build_service
        .revalidate(&mut tree, fix, max_children)?;
    output::validation_report(&reports);

    if fix && tree.validation.repairs > 0 {
        let json = TreeBuildService::render_tree(&tree)?;
        write_tree(container, path, &json)?;
        output::action(
            "Repaired",
            &format!("{} ({} fixes)", path.display(), tree.validation.repairs),
        );
    }

    if tree.validation.all_valid {
        Ok(())
    } else {
        Err(CliError::Invalid)
    }
}

fn show(container: &ServiceContainer, path: &Path, partition: Option<&str>) -> CliResult<()> {
    let tree = read_tree(container, path)?;
    if let Some(name) = partition {
        if !tree.partitions.contains_key(name) {
            return Err(CliError::InvalidArgs(format!("no partition named {}", name)));
        }
    }
    for (name, part) in &tree.partitions {
        if partition.is_some_and(|p| p != name) {
            continue;
        }
        output::info(&output::partition_tree(name, part));
    }
    Ok(())
}

fn themes(container: &ServiceContainer, items: &Path, top: Option<usize>) -> CliResult<()> {
    let records = container.corpus.load(items)?;
    let top = top.unwrap_or(container.settings.build.top_themes_per_partition);
    for (partition, themes) in container.build_service.themes(&records, top) {
        output::header(&partition);
        if themes.is_empty() {
            output::detail("(none)");
        }
        for theme in themes {
            output::detail(&theme);
        }
    }
    Ok(())
}

fn score(container: &ServiceContainer, path: &Path) -> CliResult<()> {
    let content = container
        .fs
        .read_to_string(path)
        .with_path_context("read request", path)?;
    let response = container.score_service.score_json(&content)?;
    output::info(&ScoreService::render(&response)?);
    Ok(())
}

fn config_path(local: Option<&Path>) -> CliResult<()> {
    match global_config_path() {
        Some(path) => {
            let state = if path.exists() { "" } else { " (not found)" };
            output::info(&format!("global: {}{}", path.display(), state));
        }
        None => output::info("global: (no config directory)"),
    }
    if let Some(path) = local {
        let state = if path.exists() { "" } else { " (not found)" };
        output::info(&format!("local:  {}{}", path.display(), state));
    }
    Ok(())
}

fn read_tree(container: &ServiceContainer, path: &Path) -> CliResult<TreeOutput> {
    let content = container
        .fs
        .read_to_string(path)
        .with_path_context("read tree", path)?;
    Ok(TreeBuildService::parse_tree(&content)?)
}

fn write_tree(container: &ServiceContainer, path: &Path, json: &str) -> CliResult<()> {
    container
        .fs
        .ensure_parent(path)
        .with_path_context("create directory for", path)?;
    container
        .fs
        .write(path, json)
        .with_path_context("write tree", path)?;
    Ok(())
}

/// Relative output paths land under the configured output directory.
fn resolve_output(output_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        output_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output_keeps_absolute_paths() {
        assert_eq!(
            resolve_output(Path::new("/out"), Path::new("/tmp/tree.json")),
            PathBuf::from("/tmp/tree.json")
        );
        assert_eq!(
            resolve_output(Path::new("/out"), Path::new("tree.json")),
            PathBuf::from("/out/tree.json")
        );
    }
}
