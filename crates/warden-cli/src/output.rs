//! Rendering command results as text or JSON.

use clap::ValueEnum;
use serde::Serialize;
use serde_json::json;
use std::fmt::{Display, Write};
use warden_acl::{ActorId, Permission, Role, SyncChanges};

use crate::error::CliError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Renders results in the selected format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    format: OutputFormat,
}

impl Printer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<String, CliError> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    pub fn message(&self, text: impl Into<String>) -> Result<String, CliError> {
        let text = text.into();
        match self.format {
            OutputFormat::Text => Ok(text),
            OutputFormat::Json => self.json(&json!({ "message": text })),
        }
    }

    pub fn permissions(&self, permissions: &[Permission]) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => self.json(permissions),
            OutputFormat::Text => {
                let mut out = String::new();
                for p in permissions {
                    let _ = writeln!(out, "{}\t{}\t{}", p.slug, p.name, p.model.as_deref().unwrap_or("-"));
                }
                Ok(out.trim_end().to_string())
            }
        }
    }

    pub fn roles(&self, roles: &[Role]) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => self.json(roles),
            OutputFormat::Text => {
                let mut out = String::new();
                for r in roles {
                    let marker = if r.system { " (system)" } else { "" };
                    let _ = writeln!(out, "{}\t{}{}\t{}", r.slug, r.name, marker, r.permission_slugs().join(","));
                }
                Ok(out.trim_end().to_string())
            }
        }
    }

    pub fn actors(&self, actors: &[ActorId]) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => self.json(actors),
            OutputFormat::Text => Ok(actors.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")),
        }
    }

    pub fn sync<Id: Display + Serialize>(&self, changes: &SyncChanges<Id>) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => self.json(changes),
            OutputFormat::Text => {
                let join = |ids: &[Id]| ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
                Ok(format!(
                    "attached: {}\ndetached: {}\nunchanged: {}",
                    join(&changes.attached),
                    join(&changes.detached),
                    join(&changes.unchanged)
                ))
            }
        }
    }

    pub fn decision(&self, actor: Option<ActorId>, required: &[String], granted: bool) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => self.json(&json!({
                "actor": actor,
                "required": required,
                "granted": granted,
            })),
            OutputFormat::Text => Ok(if granted { "granted" } else { "denied" }.to_string()),
        }
    }

    /// `(ability, delegated)` pairs.
    pub fn abilities(&self, abilities: &[(String, bool)]) -> Result<String, CliError> {
        match self.format {
            OutputFormat::Json => {
                let items: Vec<_> = abilities
                    .iter()
                    .map(|(ability, delegated)| json!({ "ability": ability, "delegated": delegated }))
                    .collect();
                self.json(&items)
            }
            OutputFormat::Text => Ok(abilities
                .iter()
                .map(|(ability, delegated)| {
                    if *delegated {
                        format!("{ability}\t(delegated)")
                    } else {
                        ability.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}
