//! Command implementations for the CLI interface.
//!
//! Each handler opens nothing itself: it receives the entity store, performs
//! one operation through the engine modules and prints the result. Failures
//! are printed to stderr and end the process with a non-zero status.

use std::fmt::Display;
use std::io::{self, Write};
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::Subcommand;
use clap_complete::{generate, Shell};
use tracing::warn;

use crate::board::{self, container_loads, epic_rollups, pi_totals, target_container};
use crate::catalog::{self, FeatureRequest, NewTask, TaskEdit};
use crate::export::export_file;
use crate::fields::*;
use crate::import::{import_file, ImportSummary};
use crate::kv::FileStore;
use crate::model::{Sprint, Task};
use crate::setup::{quick_setup, SetupPlan};
use crate::store::EntityStore;

/// The store every command works against.
pub type Store = EntityStore<FileStore>;

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a fresh set of sprints and seed epics, teams and templates.
    Setup {
        /// First day of the increment: YYYY-MM-DD. Defaults to today.
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Sprint length in weeks. Defaults to the stored setting.
        #[arg(long)]
        weeks: Option<u32>,
        /// Story-point capacity per sprint. Defaults to the stored setting.
        #[arg(long)]
        capacity: Option<u32>,
        /// Number of sprints to create.
        #[arg(long, default_value_t = crate::config::DEFAULT_SPRINT_COUNT)]
        sprints: u32,
    },

    /// Manage sprints.
    Sprint {
        #[command(subcommand)]
        action: SprintAction,
    },

    /// Manage epics.
    Epic {
        #[command(subcommand)]
        action: EpicAction,
    },

    /// Manage dependent teams.
    Team {
        #[command(subcommand)]
        action: TeamAction,
    },

    /// Manage feature templates.
    Template {
        #[command(subcommand)]
        action: TemplateAction,
    },

    /// Generate a feature's tasks from a template into the Backlog.
    Feature {
        /// Feature name, used as the task name prefix.
        name: String,
        /// Template ID or name.
        #[arg(long)]
        template: String,
        /// Epic ID or name.
        #[arg(long)]
        epic: String,
        /// Task colour: #RRGGBB.
        #[arg(long)]
        color: Option<String>,
        /// Dependent team.
        #[arg(long)]
        team: Option<String>,
    },

    /// Manage tasks.
    Task {
        #[command(subcommand)]
        action: TaskAction,
    },

    /// Move a task to a sprint or the Backlog.
    Move {
        /// Task ID or name.
        task: String,
        /// Sprint ID, sprint name, or "Backlog".
        container: String,
        /// Position within the target column, 0-based. Defaults to the end.
        #[arg(long)]
        index: Option<usize>,
    },

    /// Show the board with sprint loads, PI totals and epic rollups.
    Board,

    /// Import a workbook (CSV directory or .json file).
    Import {
        /// Workbook path.
        input: PathBuf,
        /// Sheet convention. Detected from sheet names when omitted.
        #[arg(long, value_enum)]
        format: Option<Convention>,
        /// Skip the automatic backup before importing.
        #[arg(long)]
        no_backup: bool,
    },

    /// Export to a workbook (.json file, or a CSV directory for any other path).
    Export {
        /// Output path.
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = Convention::Structured)]
        format: Convention,
    },

    /// Snapshot every collection into a timestamped backup directory.
    Backup,

    /// Remove all planner data.
    Clear {
        /// Do not ask for confirmation.
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum SprintAction {
    /// Add a sprint.
    Add {
        name: String,
        /// Start date: YYYY-MM-DD.
        #[arg(long)]
        start: NaiveDate,
        /// End date: YYYY-MM-DD, after the start date.
        #[arg(long)]
        end: NaiveDate,
        /// Story-point capacity. Defaults to the stored setting.
        #[arg(long)]
        capacity: Option<u32>,
    },
    /// List sprints with their load.
    List,
    /// Rename a sprint.
    Rename {
        /// Sprint ID or name
        sprint: String,
        name: String,
    },
    /// Change a sprint's dates.
    Dates {
        /// Sprint ID or name
        sprint: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Change a sprint's capacity.
    Capacity {
        /// Sprint ID or name
        sprint: String,
        #[arg(allow_hyphen_values = true)]
        capacity: i64,
    },
    /// Delete a sprint, moving its tasks to the Backlog.
    Delete {
        /// Sprint ID or name
        sprint: String,
    },
}

#[derive(Subcommand)]
pub enum EpicAction {
    /// Add an epic.
    Add { name: String },
    /// List epics with derived points and dates.
    List,
    /// Rename an epic.
    Rename {
        /// Epic ID or name
        epic: String,
        name: String,
    },
    /// Delete an epic that has no tasks.
    Delete {
        /// Epic ID or name
        epic: String,
    },
}

#[derive(Subcommand)]
pub enum TeamAction {
    /// Add a dependent team.
    Add { name: String },
    /// List dependent teams.
    List,
    /// Rename a team, relabelling its tasks.
    Rename { team: String, name: String },
    /// Delete a team, clearing it from tasks.
    Delete { team: String },
}

#[derive(Subcommand)]
pub enum TemplateAction {
    /// Create an empty feature template.
    Add { name: String },
    /// List templates and their items.
    List,
    /// Append an item to a template.
    Item {
        /// Template ID or name
        template: String,
        /// Task name suffix for generated tasks.
        task_name: String,
        /// Default story points.
        #[arg(long, default_value_t = 0.0)]
        points: f64,
    },
    /// Rename a template.
    Rename { template: String, name: String },
    /// Delete a template.
    Delete { template: String },
}

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task.
    Add {
        name: String,
        /// Epic ID or name.
        #[arg(long)]
        epic: String,
        #[arg(long, default_value_t = 0.0)]
        points: f64,
        /// Sprint ID, name, or "Backlog". Defaults to the Backlog.
        #[arg(long)]
        sprint: Option<String>,
        /// Colour: #RRGGBB.
        #[arg(long)]
        color: Option<String>,
        /// Dependent team.
        #[arg(long)]
        team: Option<String>,
        /// Issue type written to flat exports (Story, Task, Bug).
        #[arg(long)]
        issue_type: Option<String>,
    },
    /// List tasks in board order.
    List {
        /// Only tasks in this sprint (ID, name, or "Backlog").
        #[arg(long)]
        sprint: Option<String>,
        /// Only tasks in this epic (ID or name).
        #[arg(long)]
        epic: Option<String>,
    },
    /// Edit task fields.
    Edit {
        /// Task ID or name
        task: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        points: Option<f64>,
        #[arg(long)]
        epic: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// Dependent team; pass "" to clear.
        #[arg(long)]
        team: Option<String>,
    },
    /// Toggle a traffic-light status. Setting the current colour clears it.
    Status {
        /// Task ID or name
        task: String,
        #[arg(value_enum)]
        light: TrafficLight,
    },
    /// Delete a task.
    Delete {
        /// Task ID or name
        task: String,
    },
}

/// Print an error and exit.
fn fail(context: &str, e: impl Display) -> ! {
    eprintln!("{context}: {e}");
    std::process::exit(1);
}

/// Find a task by ID, then by exact name. Names must be unambiguous.
fn resolve_task_id(store: &Store, token: &str) -> String {
    let tasks = store.tasks();
    if tasks.iter().any(|t| t.id == token) {
        return token.to_string();
    }
    let named: Vec<&Task> = tasks.iter().filter(|t| t.name == token).collect();
    match named.as_slice() {
        [one] => one.id.clone(),
        [] => fail("Error resolving task", format!("no task with ID or name '{token}'")),
        many => fail(
            "Error resolving task",
            format!("'{token}' matches {} tasks, use the task ID", many.len()),
        ),
    }
}

fn sprint_label(sprints: &[Sprint], container: Option<&Container>) -> String {
    match container {
        None => "-".to_string(),
        Some(Container::Backlog) => BACKLOG.to_string(),
        Some(Container::Sprint(id)) => sprints
            .iter()
            .find(|s| &s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_else(|| format!("{BACKLOG} (was {id})")),
    }
}

fn date_label(d: Option<NaiveDate>) -> String {
    d.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
}

fn remember_view(store: &mut Store, view: &str) {
    let mut settings = store.settings();
    if settings.last_view.as_deref() == Some(view) {
        return;
    }
    settings.last_view = Some(view.to_string());
    if let Err(e) = store.save_settings(&settings) {
        warn!(error = %e, "could not record last view");
    }
}

/// Quick setup of a new increment.
pub fn cmd_setup(store: &mut Store, start: Option<NaiveDate>, weeks: Option<u32>, capacity: Option<u32>, sprints: u32) {
    let settings = store.settings();
    let plan = SetupPlan {
        start: start.unwrap_or_else(|| Local::now().date_naive()),
        sprint_length_weeks: weeks.unwrap_or(settings.sprint_length_weeks),
        capacity: capacity.unwrap_or(settings.default_sprint_capacity),
        sprint_count: sprints,
    };
    match quick_setup(store, &plan) {
        Ok(report) => {
            println!(
                "Created {} sprints, {} epics and {} dependent teams.",
                report.sprints.len(),
                report.epics,
                report.dependent_teams
            );
            if report.seeded_template {
                println!("Added the standard feature template.");
            }
            if let (Some(first), Some(last)) = (report.sprints.first(), report.sprints.last()) {
                println!(
                    "{} to {}: {} ({}) .. {} ({})",
                    date_label(first.start_date),
                    date_label(last.end_date),
                    first.name,
                    first.id,
                    last.name,
                    last.id
                );
            }
        }
        Err(e) => fail("Setup failed", e),
    }
}

/// Handle sprint management commands.
pub fn cmd_sprint(store: &mut Store, action: SprintAction) {
    match action {
        SprintAction::Add { name, start, end, capacity } => match board::add_sprint(store, &name, start, end, capacity) {
            Ok(s) => println!("Added sprint '{}' ({}), capacity {}", s.name, s.id, s.capacity),
            Err(e) => fail("Failed to add sprint", e),
        },
        SprintAction::List => {
            let sprints = store.sprints();
            if sprints.is_empty() {
                println!("No sprints. Run `piplan setup` or `piplan sprint add`.");
                return;
            }
            let loads = container_loads(&store.tasks(), &sprints);
            println!(
                "{:<26} {:<28} {:<10} {:<10} {:>7} {:>5}",
                "ID", "Name", "Start", "End", "Used", "Cap"
            );
            for (sprint, load) in sprints.iter().zip(loads.iter().skip(1)) {
                println!(
                    "{:<26} {:<28} {:<10} {:<10} {:>7} {:>5}{}",
                    truncate(&sprint.id, 26),
                    truncate(&sprint.name, 28),
                    date_label(sprint.start_date),
                    date_label(sprint.end_date),
                    format_points(load.used),
                    sprint.capacity,
                    if load.over_capacity { "  OVER" } else { "" }
                );
            }
        }
        SprintAction::Rename { sprint, name } => match board::rename_sprint(store, &sprint, &name) {
            Ok(s) => println!("Renamed sprint {} to '{}'", s.id, s.name),
            Err(e) => fail("Failed to rename sprint", e),
        },
        SprintAction::Dates { sprint, start, end } => match board::set_sprint_dates(store, &sprint, start, end) {
            Ok(s) => println!("Sprint '{}' now runs {} to {}", s.name, start, end),
            Err(e) => fail("Failed to change dates", e),
        },
        SprintAction::Capacity { sprint, capacity } => match board::set_sprint_capacity(store, &sprint, capacity) {
            Ok(s) => println!("Sprint '{}' capacity set to {}", s.name, s.capacity),
            Err(e) => fail("Failed to change capacity", e),
        },
        SprintAction::Delete { sprint } => match board::delete_sprint(store, &sprint) {
            Ok(moved) => println!("Deleted sprint {sprint}. {moved} task(s) moved to the Backlog."),
            Err(e) => fail("Failed to delete sprint", e),
        },
    }
}

/// Handle epic management commands.
pub fn cmd_epic(store: &mut Store, action: EpicAction) {
    match action {
        EpicAction::Add { name } => match catalog::add_epic(store, &name) {
            Ok(epic) => println!("Added epic '{}' ({})", epic.name, epic.id),
            Err(e) => fail("Failed to add epic", e),
        },
        EpicAction::List => {
            let rollups = epic_rollups(&store.epics(), &store.tasks(), &store.sprints());
            if rollups.is_empty() {
                println!("No epics found.");
                return;
            }
            println!(
                "{:<26} {:<24} {:>5} {:>7} {:>7} {:<10} {:<10}",
                "ID", "Name", "Tasks", "Points", "Planned", "Start", "End"
            );
            for r in rollups {
                println!(
                    "{:<26} {:<24} {:>5} {:>7} {:>7} {:<10} {:<10}",
                    truncate(&r.epic.id, 26),
                    truncate(&r.epic.name, 24),
                    r.tasks,
                    format_points(r.total_points),
                    format_points(r.planned_points),
                    date_label(r.start),
                    date_label(r.end)
                );
            }
        }
        EpicAction::Rename { epic, name } => match catalog::rename_epic(store, &epic, &name) {
            Ok(e) => println!("Renamed epic {} to '{}'", e.id, e.name),
            Err(e) => fail("Failed to rename epic", e),
        },
        EpicAction::Delete { epic } => match catalog::delete_epic(store, &epic) {
            Ok(e) => println!("Deleted epic '{}'", e.name),
            Err(e) => fail("Failed to delete epic", e),
        },
    }
}

/// Handle dependent team commands.
pub fn cmd_team(store: &mut Store, action: TeamAction) {
    match action {
        TeamAction::Add { name } => match catalog::add_team(store, &name) {
            Ok(name) => println!("Added dependent team '{name}'"),
            Err(e) => fail("Failed to add team", e),
        },
        TeamAction::List => {
            let teams = store.dependent_teams();
            if teams.is_empty() {
                println!("No dependent teams found.");
                return;
            }
            let tasks = store.tasks();
            println!("{:<24} {}", "Team", "Tasks");
            for team in teams {
                let count = tasks
                    .iter()
                    .filter(|t| t.dependent_team.as_deref().is_some_and(|d| same_name(d, &team)))
                    .count();
                println!("{:<24} {}", truncate(&team, 24), count);
            }
        }
        TeamAction::Rename { team, name } => match catalog::rename_team(store, &team, &name) {
            Ok(n) => println!("Renamed team '{team}' to '{}'. {n} task(s) relabelled.", name.trim()),
            Err(e) => fail("Failed to rename team", e),
        },
        TeamAction::Delete { team } => match catalog::delete_team(store, &team) {
            Ok(n) => println!("Deleted team '{team}'. {n} task(s) cleared."),
            Err(e) => fail("Failed to delete team", e),
        },
    }
}

/// Handle feature template commands.
pub fn cmd_template(store: &mut Store, action: TemplateAction) {
    match action {
        TemplateAction::Add { name } => match catalog::add_template(store, &name) {
            Ok(t) => println!("Created template '{}' ({})", t.name, t.id),
            Err(e) => fail("Failed to create template", e),
        },
        TemplateAction::List => {
            let templates = store.feature_templates();
            if templates.is_empty() {
                println!("No templates found.");
                return;
            }
            for t in templates {
                let total: f64 = t.items.iter().map(|i| i.points).sum();
                println!("{} ({}) - {} item(s), {} pts", t.name, t.id, t.items.len(), format_points(total));
                for item in &t.items {
                    println!("  {:<32} {:>5}", truncate(&item.task_name, 32), format_points(item.points));
                }
            }
        }
        TemplateAction::Item { template, task_name, points } => {
            match catalog::add_template_item(store, &template, &task_name, points) {
                Ok(t) => println!("Template '{}' now has {} item(s)", t.name, t.items.len()),
                Err(e) => fail("Failed to add item", e),
            }
        }
        TemplateAction::Rename { template, name } => match catalog::rename_template(store, &template, &name) {
            Ok(t) => println!("Renamed template {} to '{}'", t.id, t.name),
            Err(e) => fail("Failed to rename template", e),
        },
        TemplateAction::Delete { template } => match catalog::delete_template(store, &template) {
            Ok(t) => println!("Deleted template '{}'", t.name),
            Err(e) => fail("Failed to delete template", e),
        },
    }
}

/// Generate the tasks of a feature from a template.
pub fn cmd_feature(
    store: &mut Store,
    name: String,
    template: String,
    epic: String,
    color: Option<String>,
    team: Option<String>,
) {
    let req = FeatureRequest {
        feature: &name,
        template: &template,
        epic: &epic,
        color: color.as_deref(),
        team: team.as_deref(),
    };
    match catalog::generate_feature_tasks(store, &req) {
        Ok(tasks) => {
            println!("Generated {} task(s) in the Backlog:", tasks.len());
            for t in tasks {
                println!("  {:<26} {:<40} {:>5}", t.id, truncate(&t.name, 40), format_points(t.story_points));
            }
        }
        Err(e) => fail("Failed to generate feature", e),
    }
}

/// Handle task commands.
pub fn cmd_task(store: &mut Store, action: TaskAction) {
    match action {
        TaskAction::Add { name, epic, points, sprint, color, team, issue_type } => {
            let new = NewTask {
                name: &name,
                points,
                epic: &epic,
                sprint: sprint.as_deref(),
                color: color.as_deref(),
                team: team.as_deref(),
                issue_type: issue_type.as_deref(),
            };
            match catalog::add_task(store, &new) {
                Ok(t) => println!("Added task '{}' ({})", t.name, t.id),
                Err(e) => fail("Failed to add task", e),
            }
        }
        TaskAction::List { sprint, epic } => cmd_task_list(store, sprint, epic),
        TaskAction::Edit { task, name, points, epic, color, team } => {
            let id = resolve_task_id(store, &task);
            let edit = TaskEdit {
                name: name.as_deref(),
                points,
                epic: epic.as_deref(),
                color: color.as_deref(),
                team: team.as_deref(),
            };
            match catalog::edit_task(store, &id, &edit) {
                Ok(t) => println!("Updated task '{}' ({})", t.name, t.id),
                Err(e) => fail("Failed to update task", e),
            }
        }
        TaskAction::Status { task, light } => {
            let id = resolve_task_id(store, &task);
            match catalog::toggle_traffic_light(store, &id, light) {
                Ok(status) => println!("Task {id} status: {}", format_traffic_light(status)),
                Err(e) => fail("Failed to set status", e),
            }
        }
        TaskAction::Delete { task } => {
            let id = resolve_task_id(store, &task);
            match catalog::delete_task(store, &id) {
                Ok(t) => println!("Deleted task '{}'", t.name),
                Err(e) => fail("Failed to delete task", e),
            }
        }
    }
}

fn cmd_task_list(store: &mut Store, sprint: Option<String>, epic: Option<String>) {
    let sprints = store.sprints();
    let epics = store.epics();
    let container = sprint.map(|s| target_container(&sprints, &s).unwrap_or_else(|e| fail("Invalid sprint", e)));
    let epic_id = epic.map(|token| {
        epics
            .iter()
            .find(|e| e.id == token || e.name == token)
            .map(|e| e.id.clone())
            .unwrap_or_else(|| fail("Invalid epic", format!("no epic with ID or name '{token}'")))
    });

    let known: std::collections::HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
    let tasks: Vec<Task> = store
        .tasks()
        .into_iter()
        .filter(|t| container.as_ref().map_or(true, |c| &t.effective_container(&known) == c))
        .filter(|t| epic_id.is_none() || t.epic_id == epic_id)
        .collect();
    print_task_table(&tasks, &sprints, &epics);
    remember_view(store, "tasks");
}

fn print_task_table(tasks: &[Task], sprints: &[Sprint], epics: &[crate::model::Epic]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    println!(
        "{:<26} {:<32} {:>5} {:<16} {:<20} {:<16} {:<6}",
        "ID", "Name", "Pts", "Epic", "Sprint", "Team", "Status"
    );
    for t in tasks {
        let epic = t
            .epic_id
            .as_deref()
            .map(|id| epics.iter().find(|e| e.id == id).map_or(id, |e| e.name.as_str()))
            .unwrap_or("-");
        println!(
            "{:<26} {:<32} {:>5} {:<16} {:<20} {:<16} {:<6}",
            truncate(&t.id, 26),
            truncate(&t.name, 32),
            format_points(t.story_points),
            truncate(epic, 16),
            truncate(&sprint_label(sprints, t.sprint_id.as_ref()), 20),
            truncate(t.dependent_team.as_deref().unwrap_or("-"), 16),
            format_traffic_light(t.traffic_light_status)
        );
    }
}

/// Move a task between columns.
pub fn cmd_move(store: &mut Store, task: String, container: String, index: Option<usize>) {
    let id = resolve_task_id(store, &task);
    let sprints = store.sprints();
    let target = target_container(&sprints, &container).unwrap_or_else(|e| fail("Invalid target", e));
    match board::move_task(store, &id, &target, index) {
        Ok(outcome) => {
            println!("Moved task {} to {}", outcome.task_id, sprint_label(&sprints, Some(&outcome.to)));
            if let Some(check) = outcome.capacity.filter(|c| c.over_capacity) {
                println!(
                    "Warning: sprint is over capacity ({} / {} pts)",
                    format_points(check.used),
                    check.capacity
                );
            }
        }
        Err(e) => fail("Failed to move task", e),
    }
}

/// Print every column of the board followed by increment totals.
pub fn cmd_board(store: &mut Store) {
    let sprints = store.sprints();
    let tasks = store.tasks();
    let epics = store.epics();
    let layout = board::BoardLayout::current(&tasks, &sprints);

    for (column, load) in layout.columns.iter().zip(container_loads(&tasks, &sprints)) {
        let header = match load.capacity {
            None => format!("{} ({} tasks, {} pts)", load.name, load.tasks, format_points(load.used)),
            Some(cap) => {
                let dates = sprints
                    .iter()
                    .find(|s| Some(s.id.as_str()) == column.container.sprint_id())
                    .map(|s| format!(" [{} - {}]", date_label(s.start_date), date_label(s.end_date)))
                    .unwrap_or_default();
                format!(
                    "{}{} {}/{} pts{}",
                    load.name,
                    dates,
                    format_points(load.used),
                    cap,
                    if load.over_capacity { " OVER CAPACITY" } else { "" }
                )
            }
        };
        println!("== {header}");
        for id in &column.task_ids {
            let Some(t) = tasks.iter().find(|t| &t.id == id) else { continue };
            let epic = t
                .epic_id
                .as_deref()
                .map(|id| epics.iter().find(|e| e.id == id).map_or(id, |e| e.name.as_str()))
                .unwrap_or("-");
            println!(
                "   {:<32} {:>5}  {:<16} {:<6} {}",
                truncate(&t.name, 32),
                format_points(t.story_points),
                truncate(epic, 16),
                format_traffic_light(t.traffic_light_status),
                t.dependent_team.as_deref().unwrap_or("")
            );
        }
    }

    let totals = pi_totals(&tasks, &sprints);
    println!();
    println!(
        "PI: {} sprints, {} / {} pts planned, {} pts in Backlog, {} sprint(s) over capacity",
        totals.sprints,
        format_points(totals.planned_points),
        totals.capacity,
        format_points(totals.backlog_points),
        totals.over_capacity_sprints
    );
    remember_view(store, "board");
}

fn print_import_summary(summary: &ImportSummary) {
    let convention = summary.convention.map(|c| c.to_string()).unwrap_or_default();
    println!(
        "Import completed ({convention}). {} sprint(s) ({} created from task references), {} epic(s), {} task(s), {} team(s), {} template(s).",
        summary.sprints,
        summary.placeholder_sprints,
        summary.epics,
        summary.tasks,
        summary.dependent_teams,
        summary.feature_templates
    );
    if summary.dropped_rows > 0 {
        println!("{} row(s) skipped for missing required fields.", summary.dropped_rows);
    }
    if summary.unassigned_tasks > 0 {
        println!("{} task(s) left unassigned.", summary.unassigned_tasks);
    }
    if !summary.skipped_sheets.is_empty() {
        println!("Ignored sheets: {}", summary.skipped_sheets.join(", "));
    }
}

/// Import a workbook with automatic backup.
pub fn cmd_import(store: &mut Store, input: PathBuf, format: Option<Convention>, no_backup: bool) {
    if !no_backup {
        match store.kv().backup() {
            Ok(Some(dir)) => println!("Created backup: {}", dir.display()),
            Ok(None) => {}
            Err(e) => {
                eprintln!("Warning: Failed to create backup: {e}");
                print!("Continue without backup? (y/N): ");
                let _ = io::stdout().flush();
                let mut response = String::new();
                if io::stdin().read_line(&mut response).is_err() || !response.trim().to_lowercase().starts_with('y') {
                    println!("Import cancelled.");
                    return;
                }
            }
        }
    }

    import_file(store, &input, format, |summary| print_import_summary(&summary), |message| {
        eprintln!("{message}");
        std::process::exit(1);
    });
}

/// Export the board to a workbook.
pub fn cmd_export(store: &mut Store, output: PathBuf, format: Convention) {
    export_file(
        store,
        &output,
        format,
        |summary| {
            let rows: usize = summary.sheets.iter().map(|(_, n)| n).sum();
            println!(
                "Exported {} sheet(s), {} row(s) to {} ({})",
                summary.sheets.len(),
                rows,
                summary.path.display(),
                summary.convention
            );
        },
        |message| {
            eprintln!("{message}");
            std::process::exit(1);
        },
    );
}

/// Create a backup of every collection.
pub fn cmd_backup(store: &Store) {
    match store.kv().backup() {
        Ok(Some(dir)) => println!("Backup created: {}", dir.display()),
        Ok(None) => println!("Nothing to back up."),
        Err(e) => fail("Failed to create backup", e),
    }
}

/// Remove all planner collections.
pub fn cmd_clear(store: &mut Store, yes: bool) {
    if !yes {
        print!("Delete all sprints, epics, tasks, teams, templates and settings? (y/N): ");
        let _ = io::stdout().flush();
        let mut response = String::new();
        if io::stdin().read_line(&mut response).is_err() || !response.trim().to_lowercase().starts_with('y') {
            println!("Clear cancelled.");
            return;
        }
    }
    match store.clear_all() {
        Ok(()) => println!("All planner data removed from {}", store.kv().dir().display()),
        Err(e) => fail("Failed to clear data", e),
    }
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use crate::cli::Cli;
    use clap::CommandFactory;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}
