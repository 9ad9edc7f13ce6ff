use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use revise_diff::{element_marker, DiffSummary, RemovedPlacement};
use revise_engine::{DiffEngine, EngineConfig, InMemoryRegistry, Registration};
use revise_types::{DiffMarker, IdRule};
use serde_json::Value;
use tracing::debug;

use crate::cli::*;
use crate::script::{Outcome, Script};

const KEY: &str = "snapshot";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Diff(args) => cmd_diff(args, config, cli.format),
        Command::Resolve(args) => cmd_resolve(args, config, cli.format),
        Command::Replay(args) => cmd_replay(args, config, cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn read_json(path: &Path) -> anyhow::Result<Value> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("{} is not valid JSON", path.display()))
}

fn apply_overrides(mut config: EngineConfig, args: &SnapshotArgs) -> EngineConfig {
    if let Some(field) = &args.id_field {
        config.id_field = field.clone();
    }
    if let Some(scope) = &args.scope {
        config.marker_scope = scope.clone();
    }
    if let Some(placement) = args.removed_at {
        config.removed_placement = match placement {
            Placement::Original => RemovedPlacement::Original,
            Placement::End => RemovedPlacement::End,
        };
    }
    config
}

/// Register the old snapshot and diff the new one against it.
fn open_session(args: &SnapshotArgs, config: EngineConfig) -> anyhow::Result<DiffEngine> {
    let config = apply_overrides(config, args);
    let old = read_json(&args.old)?;
    let new = read_json(&args.new)?;
    let engine = DiffEngine::with_config(Arc::new(InMemoryRegistry::new()), config)?;
    engine.register_diff_state(KEY, Registration::new(old))?;
    engine.new_diff_state(KEY, new, true)?;
    Ok(engine)
}

fn computed(engine: &DiffEngine) -> Value {
    engine
        .get_diff_history_state(KEY)
        .map(|state| state.diff_state.computed_state)
        .unwrap_or(Value::Null)
}

fn cmd_diff(args: DiffArgs, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let engine = open_session(&args.snapshots, config)?;
    let state = computed(&engine);
    let summary = DiffSummary::of(&state);

    match format {
        OutputFormat::Json if args.stat => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => {
            if !args.stat {
                print_records(&state, &engine.config().id_rule());
            }
            print_summary(&summary);
        }
    }
    Ok(())
}

fn cmd_resolve(args: ResolveArgs, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let engine = open_session(&args.snapshots, config)?;
    let rule = engine.config().id_rule();
    let changed = match (args.action, args.path.as_deref()) {
        (Action::Accept, Some(path)) => engine.accept_diff(KEY, path, rule)?,
        (Action::Reject, Some(path)) => engine.reject_diff(KEY, path, rule)?,
        (Action::Accept, None) => engine.accept_all_diffs(KEY)?,
        (Action::Reject, None) => engine.reject_all_diffs(KEY)?,
    };
    let state = computed(&engine);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Text => {
            if changed {
                let verb = match args.action {
                    Action::Accept => "Accepted",
                    Action::Reject => "Rejected",
                };
                let path = args.path.as_deref().unwrap_or("/");
                println!("{} {} changes under {}", "✓".green().bold(), verb, path.cyan());
            } else {
                println!("Nothing to resolve.");
            }
            println!("{}", serde_json::to_string_pretty(&state)?);
            print_summary(&DiffSummary::of(&state));
        }
    }
    Ok(())
}

fn cmd_replay(args: ReplayArgs, config: EngineConfig, format: OutputFormat) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("failed to read {}", args.script.display()))?;
    let script = Script::parse(&source)?;
    let engine = DiffEngine::with_config(Arc::new(InMemoryRegistry::new()), config)?;
    let outcomes = script.run(&engine)?;
    debug!(key = %script.key, steps = outcomes.len(), "replay finished");

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcomes)?),
        OutputFormat::Text => {
            for (index, outcome) in outcomes.iter().enumerate() {
                print_outcome(index + 1, outcome);
            }
            let final_state = outcomes
                .last()
                .map(|o| o.state.clone())
                .unwrap_or_else(|| script.initial.clone());
            println!("\n{}", serde_json::to_string_pretty(&final_state)?);
        }
    }
    Ok(())
}

fn print_outcome(number: usize, outcome: &Outcome) {
    let status = if outcome.applied {
        "✓".green().bold()
    } else {
        "·".dimmed()
    };
    let mode = if outcome.is_diff_mode {
        format!("{}", outcome.summary).yellow()
    } else {
        "clean".green()
    };
    println!("{:>3} {} {:<20} {}", number, status, outcome.step, mode);
}

fn print_summary(summary: &DiffSummary) {
    if summary.is_empty() {
        println!("No changes.");
        return;
    }
    println!(
        "{} added, {} changed, {} removed",
        summary.added.to_string().green().bold(),
        summary.changed.to_string().yellow().bold(),
        summary.removed.to_string().red().bold()
    );
}

/// One line per record: a sigil for its marker and its identity.
fn print_records(state: &Value, rule: &IdRule) {
    let Some(records) = state.as_array() else {
        println!("{}", serde_json::to_string_pretty(state).unwrap_or_default());
        return;
    };
    for record in records {
        let label = rule
            .identify(record)
            .map(|id| id.to_string())
            .unwrap_or_else(|| record.to_string());
        match element_marker(record).map(|(_, marker)| marker) {
            Some(DiffMarker::Added) => println!("{} {}", "+".green().bold(), label.green()),
            Some(DiffMarker::Changed) => println!("{} {}", "~".yellow().bold(), label.yellow()),
            Some(DiffMarker::Removed) => println!("{} {}", "-".red().bold(), label.red()),
            None => println!("  {}", label.dimmed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use std::path::PathBuf;

    fn write_json(dir: &tempfile::TempDir, name: &str, value: Value) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{value}").unwrap();
        path
    }

    fn snapshot_args(dir: &tempfile::TempDir, old: Value, new: Value) -> SnapshotArgs {
        SnapshotArgs {
            old: write_json(dir, "old.json", old),
            new: write_json(dir, "new.json", new),
            id_field: None,
            scope: None,
            removed_at: None,
        }
    }

    #[test]
    fn session_annotates_new_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let args = snapshot_args(&dir, json!([{"id": 1}, {"id": 2}]), json!([{"id": 2}, {"id": 3}]));
        let engine = open_session(&args, EngineConfig::default()).unwrap();
        assert_eq!(
            computed(&engine),
            json!([{"id": 1, "diff": "removed"}, {"id": 2}, {"id": 3, "diff": "added"}])
        );
    }

    #[test]
    fn flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = snapshot_args(&dir, json!([{"key": "a"}]), json!([{"key": "b"}]));
        args.id_field = Some("key".into());
        args.removed_at = Some(Placement::End);
        let engine = open_session(&args, EngineConfig::default()).unwrap();
        assert_eq!(
            computed(&engine),
            json!([{"key": "b", "diff": "added"}, {"key": "a", "diff": "removed"}])
        );
    }

    #[test]
    fn invalid_json_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = read_json(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn missing_config_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("absent.toml").as_path())).is_err());
        assert_eq!(load_config(None).unwrap(), EngineConfig::default());
    }
}
