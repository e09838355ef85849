//! Planning records persisted by the entity store.
//!
//! Field names serialize in camelCase so collections written by earlier
//! releases of the planner load without conversion.

use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::config::{DEFAULT_SPRINT_CAPACITY, DEFAULT_SPRINT_LENGTH_WEEKS, DEFAULT_TASK_COLOR};
use crate::fields::{Container, TrafficLight};

/// Generate a fresh opaque identity.
pub fn new_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// A time-boxed container with a story-point budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub capacity: u32,
}

impl Sprint {
    pub fn new(name: &str, start: NaiveDate, end: NaiveDate, capacity: u32) -> Self {
        Sprint {
            id: new_id(),
            name: name.to_string(),
            start_date: Some(start),
            end_date: Some(end),
            capacity,
        }
    }

    /// Placeholder for a sprint only known by a token seen on a task row.
    pub fn placeholder(token: &str, capacity: u32) -> Self {
        Sprint {
            id: token.to_string(),
            name: token.to_string(),
            start_date: None,
            end_date: None,
            capacity,
        }
    }
}

/// A grouping of tasks. Points and dates are always derived from members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epic {
    pub id: String,
    pub name: String,
}

impl Epic {
    pub fn new(name: &str) -> Self {
        Epic { id: new_id(), name: name.to_string() }
    }
}

/// A unit of work on the board.
///
/// Position within a container is the task's index in the stored task
/// collection; there is no ordinal field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub story_points: f64,
    #[serde(default)]
    pub epic_id: Option<String>,
    #[serde(default, deserialize_with = "crate::fields::optional_container")]
    pub sprint_id: Option<Container>,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub dependent_team: Option<String>,
    #[serde(default)]
    pub traffic_light_status: Option<TrafficLight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<String>,
}

fn default_color() -> String {
    DEFAULT_TASK_COLOR.to_string()
}

impl Task {
    pub fn new(name: &str, story_points: f64, epic_id: &str) -> Self {
        Task {
            id: new_id(),
            name: name.to_string(),
            story_points,
            epic_id: Some(epic_id.to_string()),
            sprint_id: Some(Container::Backlog),
            color: default_color(),
            dependent_team: None,
            traffic_light_status: None,
            issue_type: None,
        }
    }

    /// The container this task displays in, healing references to sprints
    /// that no longer exist into the Backlog.
    pub fn effective_container(&self, sprint_ids: &HashSet<&str>) -> Container {
        match &self.sprint_id {
            Some(Container::Sprint(id)) if sprint_ids.contains(id.as_str()) => {
                Container::Sprint(id.clone())
            }
            _ => Container::Backlog,
        }
    }
}

/// One task blueprint inside a feature template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateItem {
    pub task_name: String,
    #[serde(default)]
    pub points: f64,
}

/// Ordered list of task blueprints used to bulk-generate tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub items: Vec<TemplateItem>,
}

impl FeatureTemplate {
    pub fn new(name: &str, items: Vec<TemplateItem>) -> Self {
        FeatureTemplate { id: new_id(), name: name.to_string(), items }
    }
}

/// Application settings stored alongside the collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub default_sprint_capacity: u32,
    pub sprint_length_weeks: u32,
    pub last_view: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            default_sprint_capacity: DEFAULT_SPRINT_CAPACITY,
            sprint_length_weeks: DEFAULT_SPRINT_LENGTH_WEEKS,
            last_view: None,
        }
    }
}
