//! Fixtures declared in `docfence.toml`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use docfence_config::Config;
use docfence_engine::FixtureRegistry;
use serde_json::Value;

/// Run `command` with `sh -c` in `dir` and return its standard output.
fn run_shell(command: &str, dir: &Path) -> Result<String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .output()
        .with_context(|| format!("Failed to run `{command}`"))?;
    if !output.status.success() {
        bail!("`{command}` exited with {}", output.status);
    }
    String::from_utf8(output.stdout).with_context(|| format!("`{command}` printed invalid UTF-8"))
}

/// JSON output becomes structured data; anything else is a string.
fn parse_output(output: &str) -> Value {
    let trimmed = output.trim_end_matches(['\r', '\n']);
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

pub fn fixture_registry(config: &Config, root: &Path) -> FixtureRegistry {
    let mut registry = FixtureRegistry::new();

    for (name, fixture) in &config.fixtures {
        match (&fixture.value, &fixture.command) {
            (Some(value), _) => registry.add_value(name, value.clone(), fixture.autouse),
            (None, Some(command)) => {
                let setup_command = command.clone();
                let setup_dir: PathBuf = root.to_path_buf();
                let setup = move || run_shell(&setup_command, &setup_dir).map(|o| parse_output(&o));

                match &fixture.teardown {
                    Some(teardown) => {
                        let teardown_command = teardown.clone();
                        let teardown_dir = root.to_path_buf();
                        registry.add_setup_with_teardown(
                            name,
                            setup,
                            move || run_shell(&teardown_command, &teardown_dir).map(|_| ()),
                            fixture.autouse,
                        );
                    }
                    None => registry.add_setup(name, setup, fixture.autouse),
                }
            }
            (None, None) => log::warn!("Fixture '{name}' has neither a value nor a command"),
        }
    }

    registry
}
