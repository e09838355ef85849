//! Direct edits to epics, dependent teams, feature templates and tasks.
//!
//! Every operation validates against the current collections first and then
//! saves once, so a rejected edit leaves storage untouched.

use tracing::info;

use crate::board::target_container;
use crate::error::{PlannerError, Result};
use crate::fields::{normalise_color, same_name, Container, TrafficLight};
use crate::kv::KvStore;
use crate::model::{Epic, FeatureTemplate, Task, TemplateItem};
use crate::resolve::{resolve, Referable, Resolution};
use crate::store::EntityStore;

fn find<T: Referable>(items: &[T], token: &str, kind: &'static str) -> Result<usize> {
    match resolve(Some(token), items) {
        Resolution::Found(hit) => items
            .iter()
            .position(|i| i.id() == hit.id())
            .ok_or_else(|| PlannerError::not_found(kind, token)),
        _ => Err(PlannerError::not_found(kind, token)),
    }
}

fn unique_name<'a>(
    existing: impl IntoIterator<Item = &'a str>,
    name: &str,
    kind: &'static str,
) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PlannerError::validation("name", format!("{kind} name cannot be empty")));
    }
    if existing.into_iter().any(|n| same_name(n, name)) {
        return Err(PlannerError::Duplicate { kind, name: name.to_string() });
    }
    Ok(name.to_string())
}

fn check_points(points: f64) -> Result<f64> {
    if points.is_finite() && points >= 0.0 {
        Ok(points)
    } else {
        Err(PlannerError::validation("points", format!("{points} must be zero or more")))
    }
}

fn check_color(color: &str) -> Result<String> {
    normalise_color(color)
        .ok_or_else(|| PlannerError::validation("color", format!("'{color}' is not a #RRGGBB colour")))
}

/// Match a team label against the team list. Empty labels clear the team.
fn check_team(teams: &[String], team: Option<&str>) -> Result<Option<String>> {
    let Some(team) = team.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    teams
        .iter()
        .find(|t| same_name(t, team))
        .map(|t| Some(t.clone()))
        .ok_or_else(|| PlannerError::not_found("dependent team", team))
}

// Epics

pub fn add_epic<S: KvStore>(store: &mut EntityStore<S>, name: &str) -> Result<Epic> {
    let mut epics = store.epics();
    let name = unique_name(epics.iter().map(|e| e.name.as_str()), name, "epic")?;
    let epic = Epic::new(&name);
    epics.push(epic.clone());
    store.save_epics(&epics)?;
    Ok(epic)
}

pub fn rename_epic<S: KvStore>(store: &mut EntityStore<S>, token: &str, name: &str) -> Result<Epic> {
    let mut epics = store.epics();
    let idx = find(&epics, token, "epic")?;
    let others = epics.iter().enumerate().filter(|(i, _)| *i != idx).map(|(_, e)| e.name.as_str());
    let name = unique_name(others, name, "epic")?;
    epics[idx].name = name;
    store.save_epics(&epics)?;
    Ok(epics[idx].clone())
}

/// Delete an epic that no task references.
pub fn delete_epic<S: KvStore>(store: &mut EntityStore<S>, token: &str) -> Result<Epic> {
    let mut epics = store.epics();
    let idx = find(&epics, token, "epic")?;
    let id = epics[idx].id.clone();
    let count = store.tasks().iter().filter(|t| t.epic_id.as_deref() == Some(id.as_str())).count();
    if count > 0 {
        return Err(PlannerError::EpicInUse { id, count });
    }
    let epic = epics.remove(idx);
    store.save_epics(&epics)?;
    info!(epic = %epic.id, name = %epic.name, "epic deleted");
    Ok(epic)
}

// Dependent teams

pub fn add_team<S: KvStore>(store: &mut EntityStore<S>, name: &str) -> Result<String> {
    let mut teams = store.dependent_teams();
    let name = unique_name(teams.iter().map(String::as_str), name, "dependent team")?;
    teams.push(name.clone());
    store.save_dependent_teams(&teams)?;
    Ok(name)
}

/// Rename a team and relabel the tasks that carried the old name.
/// Returns the number of tasks relabelled.
pub fn rename_team<S: KvStore>(store: &mut EntityStore<S>, old: &str, new: &str) -> Result<usize> {
    let mut teams = store.dependent_teams();
    let idx = teams
        .iter()
        .position(|t| same_name(t, old))
        .ok_or_else(|| PlannerError::not_found("dependent team", old))?;
    let others = teams.iter().enumerate().filter(|(i, _)| *i != idx).map(|(_, t)| t.as_str());
    let new = unique_name(others, new, "dependent team")?;
    let previous = std::mem::replace(&mut teams[idx], new.clone());

    let mut tasks = store.tasks();
    let mut relabelled = 0;
    for task in &mut tasks {
        if task.dependent_team.as_deref().is_some_and(|t| same_name(t, &previous)) {
            task.dependent_team = Some(new.clone());
            relabelled += 1;
        }
    }
    store.save_dependent_teams(&teams)?;
    if relabelled > 0 {
        store.save_tasks(&tasks)?;
    }
    Ok(relabelled)
}

/// Delete a team and clear it from tasks. Returns the number of tasks cleared.
pub fn delete_team<S: KvStore>(store: &mut EntityStore<S>, name: &str) -> Result<usize> {
    let mut teams = store.dependent_teams();
    let idx = teams
        .iter()
        .position(|t| same_name(t, name))
        .ok_or_else(|| PlannerError::not_found("dependent team", name))?;
    let removed = teams.remove(idx);

    let mut tasks = store.tasks();
    let mut cleared = 0;
    for task in &mut tasks {
        if task.dependent_team.as_deref().is_some_and(|t| same_name(t, &removed)) {
            task.dependent_team = None;
            cleared += 1;
        }
    }
    store.save_dependent_teams(&teams)?;
    if cleared > 0 {
        store.save_tasks(&tasks)?;
    }
    info!(team = %removed, cleared, "dependent team deleted");
    Ok(cleared)
}

// Feature templates

pub fn add_template<S: KvStore>(store: &mut EntityStore<S>, name: &str) -> Result<FeatureTemplate> {
    let mut templates = store.feature_templates();
    let name = unique_name(templates.iter().map(|t| t.name.as_str()), name, "feature template")?;
    let template = FeatureTemplate::new(&name, Vec::new());
    templates.push(template.clone());
    store.save_feature_templates(&templates)?;
    Ok(template)
}

pub fn add_template_item<S: KvStore>(
    store: &mut EntityStore<S>,
    token: &str,
    task_name: &str,
    points: f64,
) -> Result<FeatureTemplate> {
    let mut templates = store.feature_templates();
    let idx = find(&templates, token, "feature template")?;
    let task_name = task_name.trim();
    if task_name.is_empty() {
        return Err(PlannerError::validation("task name", "template item needs a task name"));
    }
    let points = check_points(points)?;
    templates[idx].items.push(TemplateItem { task_name: task_name.to_string(), points });
    store.save_feature_templates(&templates)?;
    Ok(templates[idx].clone())
}

pub fn rename_template<S: KvStore>(store: &mut EntityStore<S>, token: &str, name: &str) -> Result<FeatureTemplate> {
    let mut templates = store.feature_templates();
    let idx = find(&templates, token, "feature template")?;
    let others = templates.iter().enumerate().filter(|(i, _)| *i != idx).map(|(_, t)| t.name.as_str());
    let name = unique_name(others, name, "feature template")?;
    templates[idx].name = name;
    store.save_feature_templates(&templates)?;
    Ok(templates[idx].clone())
}

pub fn delete_template<S: KvStore>(store: &mut EntityStore<S>, token: &str) -> Result<FeatureTemplate> {
    let mut templates = store.feature_templates();
    let idx = find(&templates, token, "feature template")?;
    let removed = templates.remove(idx);
    store.save_feature_templates(&templates)?;
    Ok(removed)
}

/// Parameters for bulk-generating a feature's tasks from a template.
#[derive(Debug, Clone)]
pub struct FeatureRequest<'a> {
    pub feature: &'a str,
    pub template: &'a str,
    pub epic: &'a str,
    pub color: Option<&'a str>,
    pub team: Option<&'a str>,
}

/// Append one Backlog task per template item, named `<feature> - <item>`.
pub fn generate_feature_tasks<S: KvStore>(store: &mut EntityStore<S>, req: &FeatureRequest<'_>) -> Result<Vec<Task>> {
    let feature = req.feature.trim();
    if feature.is_empty() {
        return Err(PlannerError::validation("feature", "feature name cannot be empty"));
    }
    let templates = store.feature_templates();
    let template = &templates[find(&templates, req.template, "feature template")?];
    if template.items.is_empty() {
        return Err(PlannerError::validation("template", format!("'{}' has no items", template.name)));
    }
    let epics = store.epics();
    let epic = &epics[find(&epics, req.epic, "epic")?];
    let color = req.color.map(check_color).transpose()?;
    let team = check_team(&store.dependent_teams(), req.team)?;

    let generated: Vec<Task> = template
        .items
        .iter()
        .map(|item| {
            let mut task = Task::new(&format!("{feature} - {}", item.task_name), item.points, &epic.id);
            if let Some(color) = &color {
                task.color = color.clone();
            }
            task.dependent_team = team.clone();
            task
        })
        .collect();

    let mut tasks = store.tasks();
    tasks.extend(generated.iter().cloned());
    store.save_tasks(&tasks)?;
    info!(feature, template = %template.name, count = generated.len(), "feature tasks generated");
    Ok(generated)
}

// Tasks

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask<'a> {
    pub name: &'a str,
    pub points: f64,
    pub epic: &'a str,
    /// Sprint id, name or `Backlog`; `None` places the task in the Backlog.
    pub sprint: Option<&'a str>,
    pub color: Option<&'a str>,
    pub team: Option<&'a str>,
    pub issue_type: Option<&'a str>,
}

pub fn add_task<S: KvStore>(store: &mut EntityStore<S>, new: &NewTask<'_>) -> Result<Task> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(PlannerError::validation("name", "task name cannot be empty"));
    }
    let points = check_points(new.points)?;
    let epics = store.epics();
    let epic = &epics[find(&epics, new.epic, "epic")?];
    let container = match new.sprint {
        Some(token) => target_container(&store.sprints(), token)?,
        None => Container::Backlog,
    };
    let color = new.color.map(check_color).transpose()?;
    let team = check_team(&store.dependent_teams(), new.team)?;

    let mut task = Task::new(name, points, &epic.id);
    task.sprint_id = Some(container);
    if let Some(color) = color {
        task.color = color;
    }
    task.dependent_team = team;
    task.issue_type = new.issue_type.map(str::to_string);

    let mut tasks = store.tasks();
    tasks.push(task.clone());
    store.save_tasks(&tasks)?;
    Ok(task)
}

/// Field changes for an existing task. `None` leaves a field as it is; an
/// empty team string clears the team.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit<'a> {
    pub name: Option<&'a str>,
    pub points: Option<f64>,
    pub epic: Option<&'a str>,
    pub color: Option<&'a str>,
    pub team: Option<&'a str>,
}

pub fn edit_task<S: KvStore>(store: &mut EntityStore<S>, id: &str, edit: &TaskEdit<'_>) -> Result<Task> {
    let mut tasks = store.tasks();
    let idx = tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| PlannerError::not_found("task", id))?;

    let name = match edit.name.map(str::trim) {
        Some("") => return Err(PlannerError::validation("name", "task name cannot be empty")),
        other => other.map(str::to_string),
    };
    let points = edit.points.map(check_points).transpose()?;
    let epic_id = match edit.epic {
        Some(token) => {
            let epics = store.epics();
            Some(epics[find(&epics, token, "epic")?].id.clone())
        }
        None => None,
    };
    let color = edit.color.map(check_color).transpose()?;
    let team = match edit.team {
        Some(team) => Some(check_team(&store.dependent_teams(), Some(team))?),
        None => None,
    };

    let task = &mut tasks[idx];
    if let Some(name) = name {
        task.name = name;
    }
    if let Some(points) = points {
        task.story_points = points;
    }
    if let Some(epic_id) = epic_id {
        task.epic_id = Some(epic_id);
    }
    if let Some(color) = color {
        task.color = color;
    }
    if let Some(team) = team {
        task.dependent_team = team;
    }
    let updated = task.clone();
    store.save_tasks(&tasks)?;
    Ok(updated)
}

/// Set a task's traffic light, or clear it when `light` is already set.
pub fn toggle_traffic_light<S: KvStore>(
    store: &mut EntityStore<S>,
    id: &str,
    light: TrafficLight,
) -> Result<Option<TrafficLight>> {
    let mut tasks = store.tasks();
    let task = tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| PlannerError::not_found("task", id))?;
    task.traffic_light_status = match task.traffic_light_status {
        Some(current) if current == light => None,
        _ => Some(light),
    };
    let status = task.traffic_light_status;
    store.save_tasks(&tasks)?;
    Ok(status)
}

pub fn delete_task<S: KvStore>(store: &mut EntityStore<S>, id: &str) -> Result<Task> {
    let mut tasks = store.tasks();
    let idx = tasks
        .iter()
        .position(|t| t.id == id)
        .ok_or_else(|| PlannerError::not_found("task", id))?;
    let removed = tasks.remove(idx);
    store.save_tasks(&tasks)?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::container_loads;
    use crate::kv::MemoryStore;
    use crate::model::Sprint;

    fn seeded() -> EntityStore<MemoryStore> {
        let mut store = EntityStore::new(MemoryStore::new());
        store.save_epics(&[Epic { id: "e1".into(), name: "Core".into() }]).unwrap();
        store.save_dependent_teams(&["QA Team".to_string()]).unwrap();
        store.save_sprints(&[Sprint { name: "Sprint 1".into(), ..Sprint::placeholder("s1", 10) }]).unwrap();
        store
    }

    fn new_task<'a>(name: &'a str, points: f64) -> NewTask<'a> {
        NewTask { name, points, epic: "Core", ..Default::default() }
    }

    #[test]
    fn test_epic_crud() {
        let mut store = seeded();
        let epic = add_epic(&mut store, " Edge ").unwrap();
        assert_eq!(epic.name, "Edge");
        assert!(matches!(add_epic(&mut store, "core"), Err(PlannerError::Duplicate { .. })));
        assert!(add_epic(&mut store, "  ").is_err());

        assert_eq!(rename_epic(&mut store, "Edge", "Outer").unwrap().id, epic.id);
        assert!(rename_epic(&mut store, &epic.id, "CORE").is_err());
        // Renaming to a different case of the same name is allowed.
        assert_eq!(rename_epic(&mut store, &epic.id, "OUTER").unwrap().name, "OUTER");

        add_task(&mut store, &NewTask { epic: &epic.id, ..new_task("t", 1.0) }).unwrap();
        assert!(matches!(delete_epic(&mut store, &epic.id), Err(PlannerError::EpicInUse { count: 1, .. })));
        let id = store.tasks()[0].id.clone();
        delete_task(&mut store, &id).unwrap();
        delete_epic(&mut store, "OUTER").unwrap();
        assert_eq!(store.epics().len(), 1);
    }

    #[test]
    fn test_team_rename_and_delete_propagate() {
        let mut store = seeded();
        add_team(&mut store, "Ops").unwrap();
        assert!(add_team(&mut store, "ops").is_err());
        let task = add_task(&mut store, &NewTask { team: Some("qa team"), ..new_task("t", 1.0) }).unwrap();
        assert_eq!(task.dependent_team.as_deref(), Some("QA Team"));

        assert_eq!(rename_team(&mut store, "QA Team", "Quality").unwrap(), 1);
        assert_eq!(store.tasks()[0].dependent_team.as_deref(), Some("Quality"));
        assert!(rename_team(&mut store, "Quality", "OPS").is_err());

        assert_eq!(delete_team(&mut store, "quality").unwrap(), 1);
        assert_eq!(store.tasks()[0].dependent_team, None);
        assert_eq!(store.dependent_teams(), vec!["Ops"]);
    }

    #[test]
    fn test_add_task_validation_does_not_write() {
        let mut store = seeded();
        let writes = store.kv().writes;
        assert!(add_task(&mut store, &new_task("", 1.0)).is_err());
        assert!(add_task(&mut store, &new_task("t", -1.0)).is_err());
        assert!(add_task(&mut store, &NewTask { epic: "Nope", ..new_task("t", 1.0) }).is_err());
        assert!(add_task(&mut store, &NewTask { team: Some("Unknown"), ..new_task("t", 1.0) }).is_err());
        assert!(add_task(&mut store, &NewTask { color: Some("red"), ..new_task("t", 1.0) }).is_err());
        assert!(add_task(&mut store, &NewTask { sprint: Some("Sprint 9"), ..new_task("t", 1.0) }).is_err());
        assert_eq!(store.kv().writes, writes);

        let task = add_task(
            &mut store,
            &NewTask { sprint: Some("Sprint 1"), color: Some("#ffdab9"), ..new_task("t", 2.0) },
        )
        .unwrap();
        assert_eq!(task.sprint_id, Some(Container::Sprint("s1".into())));
        assert_eq!(task.color, "#FFDAB9");
        assert_eq!(task.epic_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_edit_task_clears_over_capacity() {
        let mut store = seeded();
        let a = add_task(&mut store, &NewTask { sprint: Some("s1"), ..new_task("a", 7.0) }).unwrap();
        add_task(&mut store, &NewTask { sprint: Some("s1"), ..new_task("b", 5.0) }).unwrap();
        assert!(container_loads(&store.tasks(), &store.sprints())[1].over_capacity);

        let edited = edit_task(&mut store, &a.id, &TaskEdit { points: Some(5.0), ..Default::default() }).unwrap();
        assert_eq!(edited.story_points, 5.0);
        assert!(!container_loads(&store.tasks(), &store.sprints())[1].over_capacity);
    }

    #[test]
    fn test_edit_task_fields() {
        let mut store = seeded();
        let t = add_task(&mut store, &NewTask { team: Some("QA Team"), ..new_task("a", 1.0) }).unwrap();
        let writes = store.kv().writes;
        assert!(edit_task(&mut store, &t.id, &TaskEdit { name: Some(" "), ..Default::default() }).is_err());
        assert!(edit_task(&mut store, &t.id, &TaskEdit { points: Some(-2.0), ..Default::default() }).is_err());
        assert!(edit_task(&mut store, "missing", &TaskEdit::default()).is_err());
        assert_eq!(store.kv().writes, writes);

        let edit = TaskEdit { name: Some("Renamed"), team: Some(""), color: Some("#aec6cf"), ..Default::default() };
        let updated = edit_task(&mut store, &t.id, &edit).unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.dependent_team, None);
        assert_eq!(updated.color, "#AEC6CF");
    }

    #[test]
    fn test_toggle_traffic_light() {
        let mut store = seeded();
        let t = add_task(&mut store, &new_task("a", 1.0)).unwrap();
        assert_eq!(toggle_traffic_light(&mut store, &t.id, TrafficLight::Red).unwrap(), Some(TrafficLight::Red));
        assert_eq!(toggle_traffic_light(&mut store, &t.id, TrafficLight::Green).unwrap(), Some(TrafficLight::Green));
        assert_eq!(toggle_traffic_light(&mut store, &t.id, TrafficLight::Green).unwrap(), None);
        assert_eq!(store.tasks()[0].traffic_light_status, None);
    }

    #[test]
    fn test_templates_and_feature_generation() {
        let mut store = seeded();
        let template = add_template(&mut store, "Std").unwrap();
        assert!(add_template(&mut store, "STD").is_err());
        let req = FeatureRequest { feature: "Login", template: "Std", epic: "Core", color: None, team: None };
        assert!(generate_feature_tasks(&mut store, &req).is_err());

        add_template_item(&mut store, "Std", "Design", 2.0).unwrap();
        add_template_item(&mut store, &template.id, "Build", 5.0).unwrap();
        assert!(add_template_item(&mut store, "Std", "Bad", -1.0).is_err());

        let req = FeatureRequest { color: Some("#ffdab9"), team: Some("QA Team"), ..req };
        let tasks = generate_feature_tasks(&mut store, &req).unwrap();
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Login - Design", "Login - Build"]);
        assert!(tasks.iter().all(|t| t.sprint_id == Some(Container::Backlog)));
        assert_eq!(tasks[1].story_points, 5.0);
        assert_eq!(tasks[0].color, "#FFDAB9");
        assert_eq!(store.tasks().len(), 2);

        rename_template(&mut store, "Std", "Standard").unwrap();
        delete_template(&mut store, "Standard").unwrap();
        assert!(store.feature_templates().is_empty());
    }
}
