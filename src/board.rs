//! Board mutations and the aggregates derived from board state.
//!
//! The board is the Backlog column followed by one column per sprint in stored
//! order. A task's position is its index in the stored task collection, so a
//! move rebuilds and saves the whole collection from a [`BoardLayout`].
//! Capacity is advisory: moves into a full sprint are accepted and reported
//! as over capacity.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::error::{PlannerError, Result};
use crate::fields::{is_backlog_token, same_name, Container, BACKLOG};
use crate::kv::KvStore;
use crate::model::{Epic, Sprint, Task};
use crate::resolve::{resolve, Resolution};
use crate::store::EntityStore;

/// One column of the board: a container and its tasks in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn {
    pub container: Container,
    pub task_ids: Vec<String>,
}

/// The visible order of every column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoardLayout {
    pub columns: Vec<BoardColumn>,
}

impl BoardLayout {
    /// The layout implied by stored state. Unassigned tasks and tasks pointing
    /// at missing sprints show in the Backlog.
    pub fn current(tasks: &[Task], sprints: &[Sprint]) -> Self {
        let known: HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
        let mut columns = vec![BoardColumn { container: Container::Backlog, task_ids: Vec::new() }];
        columns.extend(sprints.iter().map(|s| BoardColumn {
            container: Container::Sprint(s.id.clone()),
            task_ids: Vec::new(),
        }));
        let mut layout = BoardLayout { columns };
        for task in tasks {
            let container = task.effective_container(&known);
            if let Some(col) = layout.column_mut(&container) {
                col.task_ids.push(task.id.clone());
            }
        }
        layout
    }

    pub fn column_mut(&mut self, container: &Container) -> Option<&mut BoardColumn> {
        self.columns.iter_mut().find(|c| &c.container == container)
    }

    /// Take a task out of whichever column holds it.
    pub fn remove_task(&mut self, task_id: &str) -> Option<Container> {
        for col in &mut self.columns {
            if let Some(pos) = col.task_ids.iter().position(|id| id == task_id) {
                col.task_ids.remove(pos);
                return Some(col.container.clone());
            }
        }
        None
    }
}

/// Rebuild and save the task collection from a layout.
///
/// Each task takes the container of the column listing it and the stored order
/// becomes the column-by-column concatenation. Ids that match no task, or that
/// repeat, are dropped. Tasks no column mentions are appended in their prior
/// order. The collection is written with a single full replace.
pub fn apply_layout<S: KvStore>(store: &mut EntityStore<S>, layout: &BoardLayout) -> Result<Vec<Task>> {
    let sprints = store.sprints();
    let known: HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
    let mut pending: Vec<Option<Task>> = store.tasks().into_iter().map(Some).collect();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (i, task) in pending.iter().flatten().enumerate() {
        positions.entry(task.id.clone()).or_insert(i);
    }

    let mut ordered = Vec::with_capacity(pending.len());
    for column in &layout.columns {
        let container = match &column.container {
            Container::Sprint(id) if !known.contains(id.as_str()) => {
                warn!(sprint = %id, "layout column names a missing sprint, using Backlog");
                Container::Backlog
            }
            other => other.clone(),
        };
        for id in &column.task_ids {
            let Some(&pos) = positions.get(id) else {
                warn!(task = %id, "layout names an unknown task, dropped");
                continue;
            };
            let Some(mut task) = pending[pos].take() else {
                warn!(task = %id, "task listed twice in layout, later entry dropped");
                continue;
            };
            task.sprint_id = Some(container.clone());
            ordered.push(task);
        }
    }

    let missing: Vec<Task> = pending.into_iter().flatten().collect();
    if !missing.is_empty() {
        warn!(count = missing.len(), "tasks missing from layout appended");
        ordered.extend(missing);
    }
    store.save_tasks(&ordered)?;
    Ok(ordered)
}

/// Load of a sprint against its capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityCheck {
    pub sprint_id: String,
    pub used: f64,
    pub capacity: u32,
    pub over_capacity: bool,
}

/// Points a sprint would hold once `moving` lands in it.
pub fn capacity_check(tasks: &[Task], sprint: &Sprint, moving: &Task) -> CapacityCheck {
    let others: f64 = tasks
        .iter()
        .filter(|t| t.id != moving.id)
        .filter(|t| t.sprint_id.as_ref().and_then(Container::sprint_id) == Some(sprint.id.as_str()))
        .map(|t| t.story_points)
        .sum();
    let used = others + moving.story_points;
    CapacityCheck {
        sprint_id: sprint.id.clone(),
        used,
        capacity: sprint.capacity,
        over_capacity: used > f64::from(sprint.capacity),
    }
}

/// Result of a single-task move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome {
    pub task_id: String,
    pub from: Option<Container>,
    pub to: Container,
    /// Present when the target is a sprint.
    pub capacity: Option<CapacityCheck>,
}

/// Resolve a user-supplied container token. Unknown sprints are an error here
/// because the user named them directly.
pub fn target_container(sprints: &[Sprint], token: &str) -> Result<Container> {
    match resolve(Some(token), sprints) {
        Resolution::Backlog => Ok(Container::Backlog),
        Resolution::Found(s) => Ok(Container::Sprint(s.id.clone())),
        Resolution::Unassigned => Err(PlannerError::not_found("sprint", token)),
    }
}

/// Move one task into `target` at `index` (end of column when `None` or past the end).
pub fn move_task<S: KvStore>(
    store: &mut EntityStore<S>,
    task_id: &str,
    target: &Container,
    index: Option<usize>,
) -> Result<MoveOutcome> {
    let sprints = store.sprints();
    let tasks = store.tasks();
    let task = tasks
        .iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| PlannerError::not_found("task", task_id))?;

    let capacity = match target {
        Container::Backlog => None,
        Container::Sprint(id) => {
            let sprint = sprints
                .iter()
                .find(|s| &s.id == id)
                .ok_or_else(|| PlannerError::not_found("sprint", id.as_str()))?;
            Some(capacity_check(&tasks, sprint, task))
        }
    };

    let mut layout = BoardLayout::current(&tasks, &sprints);
    let from = layout.remove_task(task_id);
    let column = layout
        .column_mut(target)
        .ok_or_else(|| PlannerError::not_found("sprint", target.as_str()))?;
    let at = index.unwrap_or(column.task_ids.len()).min(column.task_ids.len());
    column.task_ids.insert(at, task_id.to_string());
    apply_layout(store, &layout)?;

    if let Some(check) = capacity.as_ref().filter(|c| c.over_capacity) {
        warn!(sprint = %check.sprint_id, used = check.used, capacity = check.capacity, "sprint over capacity");
    }
    debug!(task = task_id, to = %target, index = at, "task moved");
    Ok(MoveOutcome { task_id: task_id.to_string(), from, to: target.clone(), capacity })
}

/// Load shown on one board column.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerLoad {
    pub container: Container,
    pub name: String,
    pub tasks: usize,
    pub used: f64,
    /// `None` for the Backlog, which has no budget.
    pub capacity: Option<u32>,
    pub over_capacity: bool,
}

/// Per-column loads, Backlog first. Orphaned tasks count toward the Backlog.
pub fn container_loads(tasks: &[Task], sprints: &[Sprint]) -> Vec<ContainerLoad> {
    let known: HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
    let mut loads = vec![ContainerLoad {
        container: Container::Backlog,
        name: BACKLOG.to_string(),
        tasks: 0,
        used: 0.0,
        capacity: None,
        over_capacity: false,
    }];
    loads.extend(sprints.iter().map(|s| ContainerLoad {
        container: Container::Sprint(s.id.clone()),
        name: s.name.clone(),
        tasks: 0,
        used: 0.0,
        capacity: Some(s.capacity),
        over_capacity: false,
    }));
    for task in tasks {
        let container = task.effective_container(&known);
        if let Some(load) = loads.iter_mut().find(|l| l.container == container) {
            load.tasks += 1;
            load.used += task.story_points;
        }
    }
    for load in &mut loads {
        load.over_capacity = load.capacity.is_some_and(|c| load.used > f64::from(c));
    }
    loads
}

/// Totals across the whole planning increment.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PiTotals {
    pub sprints: usize,
    pub capacity: u64,
    pub planned_points: f64,
    pub backlog_points: f64,
    pub total_points: f64,
    pub over_capacity_sprints: usize,
}

pub fn pi_totals(tasks: &[Task], sprints: &[Sprint]) -> PiTotals {
    let loads = container_loads(tasks, sprints);
    let mut totals = PiTotals {
        sprints: sprints.len(),
        capacity: sprints.iter().map(|s| u64::from(s.capacity)).sum(),
        ..Default::default()
    };
    for load in &loads {
        totals.total_points += load.used;
        if load.container.is_backlog() {
            totals.backlog_points += load.used;
        } else {
            totals.planned_points += load.used;
            totals.over_capacity_sprints += usize::from(load.over_capacity);
        }
    }
    totals
}

/// Figures derived for one epic from its tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct EpicRollup {
    pub epic: Epic,
    pub tasks: usize,
    pub total_points: f64,
    /// Points sitting in sprints rather than the Backlog.
    pub planned_points: f64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

pub fn epic_rollups(epics: &[Epic], tasks: &[Task], sprints: &[Sprint]) -> Vec<EpicRollup> {
    let known: HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
    epics
        .iter()
        .map(|epic| {
            let mut rollup = EpicRollup {
                epic: epic.clone(),
                tasks: 0,
                total_points: 0.0,
                planned_points: 0.0,
                start: None,
                end: None,
            };
            for task in tasks.iter().filter(|t| t.epic_id.as_deref() == Some(epic.id.as_str())) {
                rollup.tasks += 1;
                rollup.total_points += task.story_points;
                let Container::Sprint(id) = task.effective_container(&known) else {
                    continue;
                };
                rollup.planned_points += task.story_points;
                if let Some(sprint) = sprints.iter().find(|s| s.id == id) {
                    rollup.start = min_date(rollup.start, sprint.start_date);
                    rollup.end = max_date(rollup.end, sprint.end_date);
                }
            }
            rollup
        })
        .collect()
}

fn min_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn max_date(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Option<NaiveDate> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

// Sprint edits. Every check runs before the single save, so a rejected edit
// never writes.

fn find_sprint(sprints: &[Sprint], token: &str) -> Result<usize> {
    match resolve(Some(token), sprints) {
        Resolution::Found(s) => sprints
            .iter()
            .position(|x| x.id == s.id)
            .ok_or_else(|| PlannerError::not_found("sprint", token)),
        Resolution::Backlog => Err(PlannerError::ReservedIdentity(BACKLOG.to_string())),
        Resolution::Unassigned => Err(PlannerError::not_found("sprint", token)),
    }
}

fn check_sprint_name(sprints: &[Sprint], name: &str, except: Option<&str>) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(PlannerError::validation("name", "sprint name cannot be empty"));
    }
    if is_backlog_token(name) {
        return Err(PlannerError::ReservedIdentity(name.to_string()));
    }
    if sprints.iter().any(|s| Some(s.id.as_str()) != except && same_name(&s.name, name)) {
        return Err(PlannerError::Duplicate { kind: "sprint", name: name.to_string() });
    }
    Ok(name.to_string())
}

fn check_dates(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end <= start {
        return Err(PlannerError::validation(
            "dates",
            format!("end date {end} must be after start date {start}"),
        ));
    }
    Ok(())
}

/// Create a sprint. Capacity defaults to the configured sprint capacity.
pub fn add_sprint<S: KvStore>(
    store: &mut EntityStore<S>,
    name: &str,
    start: NaiveDate,
    end: NaiveDate,
    capacity: Option<u32>,
) -> Result<Sprint> {
    let mut sprints = store.sprints();
    let name = check_sprint_name(&sprints, name, None)?;
    check_dates(start, end)?;
    let capacity = capacity.unwrap_or_else(|| store.settings().default_sprint_capacity);
    let sprint = Sprint::new(&name, start, end, capacity);
    sprints.push(sprint.clone());
    store.save_sprints(&sprints)?;
    info!(sprint = %sprint.id, name = %sprint.name, "sprint added");
    Ok(sprint)
}

pub fn rename_sprint<S: KvStore>(store: &mut EntityStore<S>, token: &str, name: &str) -> Result<Sprint> {
    let mut sprints = store.sprints();
    let idx = find_sprint(&sprints, token)?;
    let name = check_sprint_name(&sprints, name, Some(sprints[idx].id.as_str()))?;
    sprints[idx].name = name;
    store.save_sprints(&sprints)?;
    Ok(sprints[idx].clone())
}

pub fn set_sprint_dates<S: KvStore>(
    store: &mut EntityStore<S>,
    token: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Sprint> {
    let mut sprints = store.sprints();
    let idx = find_sprint(&sprints, token)?;
    check_dates(start, end)?;
    sprints[idx].start_date = Some(start);
    sprints[idx].end_date = Some(end);
    store.save_sprints(&sprints)?;
    Ok(sprints[idx].clone())
}

/// Set a sprint's capacity. Must be a non-negative whole number of points.
pub fn set_sprint_capacity<S: KvStore>(store: &mut EntityStore<S>, token: &str, capacity: i64) -> Result<Sprint> {
    let mut sprints = store.sprints();
    let idx = find_sprint(&sprints, token)?;
    let capacity = u32::try_from(capacity).map_err(|_| {
        PlannerError::validation("capacity", format!("{capacity} is not a non-negative whole number"))
    })?;
    sprints[idx].capacity = capacity;
    store.save_sprints(&sprints)?;
    Ok(sprints[idx].clone())
}

/// Delete a sprint, first moving its tasks to the Backlog. Returns the number
/// of tasks moved.
pub fn delete_sprint<S: KvStore>(store: &mut EntityStore<S>, token: &str) -> Result<usize> {
    let mut sprints = store.sprints();
    let idx = find_sprint(&sprints, token)?;
    let removed = sprints.remove(idx);

    let mut tasks = store.tasks();
    let mut moved = 0;
    for task in &mut tasks {
        if task.sprint_id.as_ref().and_then(Container::sprint_id) == Some(removed.id.as_str()) {
            task.sprint_id = Some(Container::Backlog);
            moved += 1;
        }
    }
    if moved > 0 {
        store.save_tasks(&tasks)?;
    }
    store.save_sprints(&sprints)?;
    info!(sprint = %removed.id, name = %removed.name, moved, "sprint deleted");
    Ok(moved)
}
