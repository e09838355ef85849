//! Typed entity store over a [`KvStore`].
//!
//! Every accessor reads or writes a whole collection. Getters always return a
//! list, even when nothing is stored or the stored document is damaged;
//! savers replace the collection (last write wins). Feature templates are
//! upgraded on read through the [`migrate`](crate::migrate) chain and the
//! upgraded form is written straight back.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::config::*;
use crate::error::Result;
use crate::fields::same_name;
use crate::kv::KvStore;
use crate::migrate;
use crate::model::{Epic, FeatureTemplate, Settings, Sprint, Task};

/// Repository of planner collections.
#[derive(Debug)]
pub struct EntityStore<S> {
    kv: S,
}

impl<S: KvStore> EntityStore<S> {
    pub fn new(kv: S) -> Self {
        EntityStore { kv }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.kv.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => decode_items(key, items),
            Some(_) => {
                warn!(key, "stored collection is not a list, reading as empty");
                Vec::new()
            }
        }
    }

    fn write_list<T: Serialize>(&mut self, key: &str, items: &[T]) -> Result<()> {
        let value = serde_json::to_value(items)?;
        self.kv.set(key, &value)
    }

    // Sprints

    pub fn sprints(&self) -> Vec<Sprint> {
        self.read_list(KEY_SPRINTS)
    }

    pub fn save_sprints(&mut self, sprints: &[Sprint]) -> Result<()> {
        self.write_list(KEY_SPRINTS, sprints)
    }

    pub fn sprint_by_id(&self, id: &str) -> Option<Sprint> {
        self.sprints().into_iter().find(|s| s.id == id)
    }

    pub fn sprint_by_name(&self, name: &str) -> Option<Sprint> {
        self.sprints().into_iter().find(|s| s.name == name)
    }

    // Tasks

    pub fn tasks(&self) -> Vec<Task> {
        self.read_list(KEY_TASKS)
    }

    pub fn save_tasks(&mut self, tasks: &[Task]) -> Result<()> {
        self.write_list(KEY_TASKS, tasks)
    }

    pub fn task_by_id(&self, id: &str) -> Option<Task> {
        self.tasks().into_iter().find(|t| t.id == id)
    }

    /// Tasks whose stored container is the given sprint, in board order.
    pub fn tasks_in_sprint(&self, sprint_id: &str) -> Vec<Task> {
        self.tasks()
            .into_iter()
            .filter(|t| t.sprint_id.as_ref().and_then(|c| c.sprint_id()) == Some(sprint_id))
            .collect()
    }

    // Epics

    pub fn epics(&self) -> Vec<Epic> {
        self.read_list(KEY_EPICS)
    }

    pub fn save_epics(&mut self, epics: &[Epic]) -> Result<()> {
        self.write_list(KEY_EPICS, epics)
    }

    pub fn epic_by_id(&self, id: &str) -> Option<Epic> {
        self.epics().into_iter().find(|e| e.id == id)
    }

    pub fn epic_by_name(&self, name: &str) -> Option<Epic> {
        self.epics().into_iter().find(|e| e.name == name)
    }

    // Dependent teams

    pub fn dependent_teams(&self) -> Vec<String> {
        self.read_list(KEY_DEPENDENT_TEAMS)
    }

    /// Save the team list, trimmed and deduplicated case-insensitively.
    pub fn save_dependent_teams(&mut self, teams: &[String]) -> Result<()> {
        let teams = dedup_names(teams.iter().map(String::as_str));
        self.write_list(KEY_DEPENDENT_TEAMS, &teams)
    }

    // Feature templates

    /// Read templates, upgrading and re-persisting legacy shapes first.
    pub fn feature_templates(&mut self) -> Vec<FeatureTemplate> {
        let Some(doc) = self.kv.get(KEY_FEATURE_TEMPLATES) else {
            return Vec::new();
        };
        let migrated = migrate::upgrade(doc);
        if migrated.changed {
            if let Err(e) = self.kv.set(KEY_FEATURE_TEMPLATES, &migrated.value) {
                warn!(error = %e, "could not persist migrated feature templates");
            }
        }
        match migrated.value {
            Value::Array(items) => decode_items(KEY_FEATURE_TEMPLATES, items),
            Value::Null => Vec::new(),
            _ => {
                warn!("stored feature templates are not a list, reading as empty");
                Vec::new()
            }
        }
    }

    pub fn save_feature_templates(&mut self, templates: &[FeatureTemplate]) -> Result<()> {
        self.write_list(KEY_FEATURE_TEMPLATES, templates)
    }

    // Settings

    pub fn settings(&self) -> Settings {
        self.kv
            .get(KEY_SETTINGS)
            .and_then(|v| match serde_json::from_value(v) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(error = %e, "unreadable settings, using defaults");
                    None
                }
            })
            .unwrap_or_default()
    }

    pub fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        let value = serde_json::to_value(settings)?;
        self.kv.set(KEY_SETTINGS, &value)
    }

    /// Remove every collection owned by the planner.
    pub fn clear_all(&mut self) -> Result<()> {
        for key in ALL_KEYS {
            self.kv.remove(key)?;
        }
        Ok(())
    }
}

fn decode_items<T: DeserializeOwned>(key: &str, items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| match serde_json::from_value(item) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(key, index = i, error = %e, "skipping unreadable record");
                None
            }
        })
        .collect()
}

/// Trim, drop empties and deduplicate case-insensitively, keeping first spelling.
pub fn dedup_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.trim();
        if name.is_empty() || out.iter().any(|n| same_name(n, name)) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}
