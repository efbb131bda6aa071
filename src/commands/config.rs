use std::process::ExitCode;

use heck::ToTitleCase;
use miette::{IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::{
    cli::ConfigCommand,
    settings::{ConfigStore, Settings},
};

pub fn run(command: &ConfigCommand, store: &ConfigStore, effective: &Settings) -> Result<ExitCode> {
    match command {
        ConfigCommand::Show => {
            println!("Configuration file: {}\n", store.path().display());
            print!("{}", render(effective)?);
        }
        ConfigCommand::Set {
            section,
            key,
            value,
        } => {
            store.set(section, key, value)?;
            println!("{} {section}.{key} = {value}", "✓".green());
        }
        ConfigCommand::Reset => {
            store.reset()?;
            println!("{} Configuration reset to defaults", "✓".green());
        }
        ConfigCommand::Export { file } => {
            store.export(file)?;
            println!("{} Configuration exported to {}", "✓".green(), file.display());
        }
        ConfigCommand::Import { file } => {
            store.import(file)?;
            println!("{} Configuration imported from {}", "✓".green(), file.display());
        }
        ConfigCommand::Validate => {
            let issues = effective.validate();
            for error in &issues.errors {
                println!("{} {error}", "error:".red());
            }
            for warning in &issues.warnings {
                println!("{} {warning}", "warning:".yellow());
            }

            if !issues.errors.is_empty() {
                return Ok(ExitCode::FAILURE);
            }
            println!("{} Configuration is valid", "✓".green());
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// One block per section, titled, with `key = value` lines
fn render(settings: &Settings) -> Result<String> {
    let doc = serde_json::to_value(settings).into_diagnostic()?;
    let mut out = String::new();

    if let Value::Object(sections) = doc {
        for (section, values) in sections {
            out.push_str(&format!("[{}]\n", section.to_title_case()));
            if let Value::Object(values) = values {
                for (key, value) in values {
                    let value = match value {
                        Value::Null => "none".to_string(),
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    out.push_str(&format!("  {key} = {value}\n"));
                }
            }
            out.push('\n');
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_section() {
        let text = render(&Settings::default()).unwrap();
        assert!(text.contains("[Download]\n"));
        assert!(text.contains("[Video Processing]\n"));
        assert!(text.contains("  quality = best\n"));
        assert!(text.contains("  proxy_url = none\n"));
    }

    #[test]
    fn export_then_import_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        store.set("download", "quality", "720p").unwrap();
        let exported = dir.path().join("export.json");
        run(&ConfigCommand::Export { file: exported.clone() }, &store, &Settings::default()).unwrap();
        let before = store.read_file().unwrap();

        run(&ConfigCommand::Reset, &store, &Settings::default()).unwrap();
        assert_ne!(store.read_file().unwrap(), before);

        run(&ConfigCommand::Import { file: exported }, &store, &Settings::default()).unwrap();
        assert_eq!(store.read_file().unwrap(), before);
    }

    #[test]
    fn invalid_values_abort() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.toml"));
        let command = ConfigCommand::Set {
            section: "download".into(),
            key: "concurrent_downloads".into(),
            value: "many".into(),
        };
        assert!(run(&command, &store, &Settings::default()).is_err());
        assert_eq!(store.read_file().unwrap(), Settings::default());
    }
}
