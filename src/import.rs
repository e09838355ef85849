//! Workbook import: per-convention row parsers and the two-pass
//! reconciliation that turns rows into a cross-referenced entity graph.
//!
//! Pass 1 parses every recognised sheet into canonical [`Record`]s, collecting
//! epics, declared sprints and every sprint token seen on task rows. Declared
//! sprints plus placeholders for unknown tokens are committed to the store
//! before pass 2, which resolves each task's epic and sprint references
//! against the committed data. Rows that cannot yield a record are dropped;
//! unknown sheets are skipped. Neither is fatal.

use std::collections::HashSet;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_TASK_COLOR, LEGACY_IMPORT_TEMPLATE_NAME};
use crate::error::Result;
use crate::fields::{is_backlog_token, normalise_sheet_name, parse_traffic_light, same_name, Convention, TrafficLight};
use crate::kv::KvStore;
use crate::migrate;
use crate::model::{new_id, Epic, FeatureTemplate, Sprint, Task, TemplateItem};
use crate::resolve::{resolve, resolve_container, resolve_epic_id, Resolution};
use crate::store::{dedup_names, EntityStore};
use crate::workbook::{cell_number, first_of, number_of, text_of, Row, Workbook};

// Flat-issue columns, current name first.
pub const COL_ISSUE_TYPE: &[&str] = &["Issue Type"];
pub const COL_ISSUE_KEY: &[&str] = &["Issue key"];
pub const COL_SUMMARY: &[&str] = &["Summary"];
pub const COL_POINTS: &[&str] = &["Story Points", "Custom field (Story Points)"];
pub const COL_EPIC_LINK: &[&str] = &["Epic Link", "Parent key"];
pub const COL_SPRINT: &[&str] = &["Sprint", "SprintAssignment"];
pub const COL_COLOR: &[&str] = &["Custom field (Issue color)", "Issue color"];
pub const COL_TEAM: &[&str] = &["Custom field (Dependent Team)", "Dependent Team"];
pub const COL_STATUS: &[&str] = &["Custom field (Traffic Light Status)", "Traffic Light Status"];

// Structured columns, current name first.
pub const COL_SPRINT_ID: &[&str] = &["id", "ID"];
pub const COL_SPRINT_NAME: &[&str] = &["Name", "name"];
pub const COL_SPRINT_START: &[&str] = &["StartDate", "startDate"];
pub const COL_SPRINT_END: &[&str] = &["EndDate", "endDate"];
pub const COL_SPRINT_CAPACITY: &[&str] = &["Capacity", "capacity"];
pub const COL_EPIC_ID: &[&str] = &["ID", "id"];
pub const COL_EPIC_NAME: &[&str] = &["Name", "name"];
pub const COL_TASK_ID: &[&str] = &["id", "ID"];
pub const COL_TASK_NAME: &[&str] = &["Name", "name"];
pub const COL_TASK_POINTS: &[&str] = &["StoryPoints", "Story Points"];
pub const COL_TASK_EPIC: &[&str] = &["Epic", "EpicId"];
pub const COL_TASK_SPRINT: &[&str] = &["SprintAssignment", "Sprint"];
pub const COL_TASK_COLOR: &[&str] = &["Color"];
pub const COL_TASK_TEAM: &[&str] = &["DependentTeam", "Dependent Team"];
pub const COL_TASK_STATUS: &[&str] = &["Traffic Light Status", "TrafficLightStatus"];
pub const COL_TEAM_NAME: &[&str] = &["Dependent Team Name", "Team Name"];
pub const COL_TEMPLATE_ID: &[&str] = &["Template ID"];
pub const COL_TEMPLATE_NAME: &[&str] = &["Template Name", "Feature Template"];
pub const COL_TEMPLATE_ITEMS: &[&str] = &["Items (JSON)"];

/// Sheet names per convention.
pub const SHEET_JIRA_TASKS: &str = "JIRA Tasks";
pub const SHEET_JIRA_EPICS: &str = "JIRA Epics";
pub const SHEET_SPRINTS: &str = "Sprints";
pub const SHEET_EPICS: &str = "Epics";
pub const SHEET_TASKS: &str = "Tasks";
pub const SHEET_DEPENDENT_TEAMS: &str = "Dependent Teams";
pub const SHEET_FEATURE_TEMPLATES: &str = "Feature Templates";

/// What a sheet holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetKind {
    Issues,
    Sprints,
    Epics,
    Tasks,
    DependentTeams,
    FeatureTemplates,
}

/// Route a sheet to its parser, or `None` for unknown sheets.
pub fn classify_sheet(convention: Convention, name: &str) -> Option<SheetKind> {
    let name = normalise_sheet_name(name);
    let shared = match name.as_str() {
        "sprints" => Some(SheetKind::Sprints),
        "dependent teams" => Some(SheetKind::DependentTeams),
        "feature templates" => Some(SheetKind::FeatureTemplates),
        _ => None,
    };
    shared.or(match (convention, name.as_str()) {
        (Convention::Flat, "jira tasks" | "jira epics") => Some(SheetKind::Issues),
        (Convention::Structured, "epics") => Some(SheetKind::Epics),
        (Convention::Structured, "tasks") => Some(SheetKind::Tasks),
        _ => None,
    })
}

/// Pick the convention a workbook was written in.
pub fn detect_convention(book: &Workbook) -> Convention {
    if book.has_sheet(SHEET_JIRA_TASKS) || book.has_sheet(SHEET_JIRA_EPICS) {
        Convention::Flat
    } else {
        Convention::Structured
    }
}

/// A task row whose references are not yet resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub id: Option<String>,
    pub name: String,
    pub story_points: f64,
    pub epic_ref: Option<String>,
    pub sprint_ref: Option<String>,
    pub color: Option<String>,
    pub dependent_team: Option<String>,
    pub status: Option<TrafficLight>,
    pub issue_type: Option<String>,
}

/// Canonical intermediate record shared by both conventions.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Epic(Epic),
    Sprint(Sprint),
    Task(TaskDraft),
    Team(String),
    Template(FeatureTemplate),
    /// A bare template name from the oldest template sheet layout.
    LegacyTemplate(String),
}

/// A raw row tagged with the layout it came from.
#[derive(Debug, Clone, Copy)]
pub enum SourceRow<'a> {
    FlatIssue(&'a Row),
    Structured(SheetKind, &'a Row),
}

impl SourceRow<'_> {
    /// Parse into a canonical record. `None` means the row is dropped.
    pub fn parse(&self, default_capacity: u32) -> Option<Record> {
        match *self {
            SourceRow::FlatIssue(row) => parse_issue(row),
            SourceRow::Structured(kind, row) => match kind {
                SheetKind::Sprints => parse_sprint(row, default_capacity).map(Record::Sprint),
                SheetKind::Epics => parse_epic(row).map(Record::Epic),
                SheetKind::Tasks => parse_task(row).map(Record::Task),
                SheetKind::DependentTeams => text_of(row, COL_TEAM_NAME).map(Record::Team),
                SheetKind::FeatureTemplates => parse_template(row),
                SheetKind::Issues => parse_issue(row),
            },
        }
    }
}

fn parse_issue(row: &Row) -> Option<Record> {
    let issue_type = text_of(row, COL_ISSUE_TYPE)?;
    let summary = text_of(row, COL_SUMMARY);
    match issue_type.to_lowercase().as_str() {
        "epic" => {
            let token = text_of(row, COL_ISSUE_KEY).or_else(|| text_of(row, COL_EPIC_LINK))?;
            Some(Record::Epic(Epic { id: token, name: summary? }))
        }
        "story" | "task" | "bug" => Some(Record::Task(TaskDraft {
            id: text_of(row, COL_ISSUE_KEY),
            name: summary?,
            story_points: points(row, COL_POINTS),
            epic_ref: text_of(row, COL_EPIC_LINK),
            sprint_ref: text_of(row, COL_SPRINT),
            color: text_of(row, COL_COLOR),
            dependent_team: text_of(row, COL_TEAM),
            status: text_of(row, COL_STATUS).and_then(|s| parse_traffic_light(&s)),
            issue_type: Some(issue_type),
        })),
        other => {
            debug!(issue_type = other, "issue type not planned, row ignored");
            None
        }
    }
}

fn parse_task(row: &Row) -> Option<TaskDraft> {
    Some(TaskDraft {
        id: text_of(row, COL_TASK_ID),
        name: text_of(row, COL_TASK_NAME)?,
        story_points: points(row, COL_TASK_POINTS),
        epic_ref: text_of(row, COL_TASK_EPIC),
        sprint_ref: text_of(row, COL_TASK_SPRINT),
        color: text_of(row, COL_TASK_COLOR),
        dependent_team: text_of(row, COL_TASK_TEAM),
        status: text_of(row, COL_TASK_STATUS).and_then(|s| parse_traffic_light(&s)),
        issue_type: text_of(row, COL_ISSUE_TYPE),
    })
}

fn points(row: &Row, names: &[&str]) -> f64 {
    match number_of(row, names) {
        Some(p) if p >= 0.0 => p,
        Some(p) => {
            warn!(points = p, "negative story points clamped to zero");
            0.0
        }
        None => 0.0,
    }
}

fn parse_epic(row: &Row) -> Option<Epic> {
    let name = text_of(row, COL_EPIC_NAME)?;
    let id = text_of(row, COL_EPIC_ID).unwrap_or_else(new_id);
    Some(Epic { id, name })
}

fn parse_sprint(row: &Row, default_capacity: u32) -> Option<Sprint> {
    let id = text_of(row, COL_SPRINT_ID);
    let name = text_of(row, COL_SPRINT_NAME);
    let (id, name) = match (id, name) {
        (None, None) => return None,
        (Some(id), None) => (id.clone(), id),
        (None, Some(name)) => (new_id(), name),
        (Some(id), Some(name)) => (id, name),
    };
    if is_backlog_token(&id) {
        warn!(sprint = %name, "sprint row uses the reserved Backlog identity, dropped");
        return None;
    }

    let mut start_date = first_of(row, COL_SPRINT_START).and_then(parse_date_cell);
    let mut end_date = first_of(row, COL_SPRINT_END).and_then(parse_date_cell);
    if let (Some(start), Some(end)) = (start_date, end_date) {
        if end <= start {
            warn!(sprint = %name, %start, %end, "sprint ends before it starts, dates cleared");
            start_date = None;
            end_date = None;
        }
    }

    let capacity = match number_of(row, COL_SPRINT_CAPACITY) {
        Some(c) if c >= 0.0 && c.round() <= f64::from(u32::MAX) => c.round() as u32,
        Some(c) => {
            warn!(sprint = %name, capacity = c, "sprint capacity out of range, using default");
            default_capacity
        }
        None => default_capacity,
    };
    Some(Sprint { id, name, start_date, end_date, capacity })
}

fn parse_template(row: &Row) -> Option<Record> {
    let Some(encoded) = text_of(row, COL_TEMPLATE_ITEMS) else {
        return text_of(row, COL_TEMPLATE_NAME).map(Record::LegacyTemplate);
    };
    let items: Value = match serde_json::from_str(&encoded) {
        Ok(v @ Value::Array(_)) => v,
        Ok(_) => {
            warn!("template items are not a list, row dropped");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "template items are not valid JSON, row dropped");
            return None;
        }
    };
    let name = text_of(row, COL_TEMPLATE_NAME)?;
    let id = text_of(row, COL_TEMPLATE_ID).unwrap_or_else(new_id);
    let doc = migrate::upgrade(json!([{ "id": id, "name": name, "items": items }])).value;
    match serde_json::from_value::<Vec<FeatureTemplate>>(doc) {
        Ok(mut list) if !list.is_empty() => Some(Record::Template(list.remove(0))),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "template items unreadable, row dropped");
            None
        }
    }
}

/// Parse a date cell: ISO `YYYY-MM-DD` (optionally with a time part) or a
/// spreadsheet serial day number.
pub fn parse_date_cell(v: &Value) -> Option<NaiveDate> {
    if let Value::Number(_) = v {
        let serial = cell_number(v)?.trunc();
        if !serial.is_finite() {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        return epoch.checked_add_signed(Duration::try_days(serial as i64)?);
    }
    let text = v.as_str()?.trim();
    let date_part = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Counts reported after a successful import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub convention: Option<Convention>,
    pub sprints: usize,
    pub placeholder_sprints: usize,
    pub epics: usize,
    pub tasks: usize,
    pub dependent_teams: usize,
    pub feature_templates: usize,
    pub dropped_rows: usize,
    pub unassigned_tasks: usize,
    pub skipped_sheets: Vec<String>,
}

#[derive(Default)]
struct Collected {
    epics: Vec<Epic>,
    sprints: Vec<Sprint>,
    drafts: Vec<TaskDraft>,
    sprint_tokens: Vec<String>,
    teams: Vec<String>,
    templates: Vec<FeatureTemplate>,
    legacy_templates: Vec<String>,
    saw_tasks: bool,
    saw_sprints: bool,
    saw_teams: bool,
    saw_templates: bool,
}

impl Collected {
    fn take(&mut self, record: Record) {
        match record {
            Record::Epic(epic) => {
                if self.epics.iter().any(|e| e.id == epic.id) {
                    debug!(epic = %epic.id, "duplicate epic declaration ignored");
                } else {
                    self.epics.push(epic);
                }
            }
            Record::Sprint(sprint) => {
                if self.sprints.iter().any(|s| s.id == sprint.id) {
                    debug!(sprint = %sprint.id, "duplicate sprint declaration ignored");
                } else {
                    self.sprints.push(sprint);
                }
            }
            Record::Task(draft) => {
                if let Some(token) = &draft.sprint_ref {
                    if !self.sprint_tokens.contains(token) {
                        self.sprint_tokens.push(token.clone());
                    }
                }
                self.drafts.push(draft);
            }
            Record::Team(team) => self.teams.push(team),
            Record::Template(t) => self.templates.push(t),
            Record::LegacyTemplate(name) => self.legacy_templates.push(name),
        }
    }

    fn mark(&mut self, kind: SheetKind) {
        match kind {
            SheetKind::Issues | SheetKind::Tasks => self.saw_tasks = true,
            SheetKind::Epics => {}
            SheetKind::Sprints => self.saw_sprints = true,
            SheetKind::DependentTeams => self.saw_teams = true,
            SheetKind::FeatureTemplates => self.saw_templates = true,
        }
    }
}

/// Reconcile a workbook into the store.
///
/// Sprints and epics are merged into the existing collections (declared rows
/// replace stored records with the same id). Every other collection that the
/// workbook supplies is replaced; collections it does not mention are left
/// untouched.
pub fn import_workbook<S: KvStore>(
    store: &mut EntityStore<S>,
    book: &Workbook,
    convention: Convention,
) -> Result<ImportSummary> {
    let default_capacity = store.settings().default_sprint_capacity;
    let mut summary = ImportSummary { convention: Some(convention), ..Default::default() };
    let mut collected = Collected::default();

    // Pass 1: declarations.
    for sheet in &book.sheets {
        let Some(kind) = classify_sheet(convention, &sheet.name) else {
            warn!(sheet = %sheet.name, %convention, "unknown sheet skipped");
            summary.skipped_sheets.push(sheet.name.clone());
            continue;
        };
        collected.mark(kind);
        for row in &sheet.rows {
            let source = match kind {
                SheetKind::Issues => SourceRow::FlatIssue(row),
                other => SourceRow::Structured(other, row),
            };
            match source.parse(default_capacity) {
                Some(record) => collected.take(record),
                None => {
                    debug!(sheet = %sheet.name, "row dropped");
                    summary.dropped_rows += 1;
                }
            }
        }
    }

    // Commit declared and provisional sprints before resolving tasks.
    let mut sprints = store.sprints();
    for declared in &collected.sprints {
        match sprints.iter_mut().find(|s| s.id == declared.id) {
            Some(existing) => *existing = declared.clone(),
            None => sprints.push(declared.clone()),
        }
    }
    for token in &collected.sprint_tokens {
        if is_backlog_token(token) {
            continue;
        }
        if let Resolution::Unassigned = resolve(Some(token.as_str()), &sprints) {
            debug!(token = %token, "placeholder sprint created");
            sprints.push(Sprint::placeholder(token, default_capacity));
            summary.placeholder_sprints += 1;
        }
    }
    if collected.saw_sprints || !collected.sprint_tokens.is_empty() {
        store.save_sprints(&sprints)?;
    }
    summary.sprints = collected.sprints.len() + summary.placeholder_sprints;

    let mut epics = store.epics();
    for declared in &collected.epics {
        match epics.iter_mut().find(|e| e.id == declared.id) {
            Some(existing) => *existing = declared.clone(),
            None => epics.push(declared.clone()),
        }
    }

    // Pass 2: resolve tasks against the committed sprints.
    let sprints = store.sprints();
    let mut teams = if collected.saw_teams {
        dedup_names(collected.teams.iter().map(String::as_str))
    } else {
        store.dependent_teams()
    };
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut tasks = Vec::with_capacity(collected.drafts.len());

    for draft in collected.drafts {
        let id = draft.id.unwrap_or_else(new_id);
        if !seen_ids.insert(id.clone()) {
            warn!(task = %id, "duplicate task id, later row dropped");
            summary.dropped_rows += 1;
            continue;
        }
        let sprint_id = resolve_container(draft.sprint_ref.as_deref(), &sprints);
        if draft.sprint_ref.is_some() && sprint_id.is_none() {
            summary.unassigned_tasks += 1;
        }
        if let Some(team) = &draft.dependent_team {
            if !teams.iter().any(|t| same_name(t, team)) {
                debug!(team = %team, "dependent team added from task row");
                teams.push(team.clone());
            }
        }
        tasks.push(Task {
            id,
            name: draft.name,
            story_points: draft.story_points,
            epic_id: resolve_import_epic(draft.epic_ref.as_deref(), &collected.epics, &epics),
            sprint_id,
            color: draft.color.unwrap_or_else(|| DEFAULT_TASK_COLOR.to_string()),
            dependent_team: draft.dependent_team,
            traffic_light_status: draft.status,
            issue_type: draft.issue_type,
        });
    }

    if !collected.epics.is_empty() {
        store.save_epics(&epics)?;
        summary.epics = collected.epics.len();
    }
    if collected.saw_tasks {
        store.save_tasks(&tasks)?;
        summary.tasks = tasks.len();
    }
    if collected.saw_teams || teams.len() != store.dependent_teams().len() {
        store.save_dependent_teams(&teams)?;
        summary.dependent_teams = teams.len();
    }
    if collected.saw_templates {
        let mut templates = collected.templates;
        if !collected.legacy_templates.is_empty() {
            let items = collected
                .legacy_templates
                .into_iter()
                .map(|task_name| TemplateItem { task_name, points: 0.0 })
                .collect();
            templates.push(FeatureTemplate::new(LEGACY_IMPORT_TEMPLATE_NAME, items));
        }
        store.save_feature_templates(&templates)?;
        summary.feature_templates = templates.len();
    }

    info!(
        %convention,
        sprints = summary.sprints,
        epics = summary.epics,
        tasks = summary.tasks,
        dropped = summary.dropped_rows,
        "import committed"
    );
    Ok(summary)
}

/// Epic tokens match the workbook's own epics first, then any epic already
/// stored. Unmatched tokens are kept as given.
fn resolve_import_epic(token: Option<&str>, declared: &[Epic], known: &[Epic]) -> Option<String> {
    match resolve(token, declared) {
        Resolution::Found(epic) => Some(epic.id.clone()),
        _ => resolve_epic_id(token, known),
    }
}

/// Import a workbook file, reporting through callbacks only.
///
/// A file that cannot be read or parsed aborts before anything is written.
pub fn import_file<S: KvStore>(
    store: &mut EntityStore<S>,
    path: &Path,
    convention: Option<Convention>,
    on_complete: impl FnOnce(ImportSummary),
    on_error: impl FnOnce(String),
) {
    let book = match Workbook::load(path) {
        Ok(book) => book,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "import aborted");
            on_error(format!("Failed to import {}: {e}", path.display()));
            return;
        }
    };
    let convention = convention.unwrap_or_else(|| detect_convention(&book));
    match import_workbook(store, &book, convention) {
        Ok(summary) => on_complete(summary),
        Err(e) => on_error(format!("Failed to import {}: {e}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::Container;
    use crate::kv::MemoryStore;
    use crate::workbook::Sheet;

    fn sheet(name: &str, rows: Value) -> Sheet {
        Sheet {
            name: name.to_string(),
            columns: Vec::new(),
            rows: rows
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r.as_object().unwrap().clone())
                .collect(),
        }
    }

    fn store() -> EntityStore<MemoryStore> {
        EntityStore::new(MemoryStore::new())
    }

    fn scenario_book() -> Workbook {
        Workbook {
            sheets: vec![
                sheet(
                    "JIRA Tasks",
                    json!([
                        {"Issue Type": "Epic", "Issue key": "E1", "Summary": "Core"},
                        {"Issue Type": "Story", "Issue key": "T1", "Summary": "Build",
                         "Story Points": 5, "Epic Link": "E1", "Sprint": "Sprint 1"}
                    ]),
                ),
                sheet("Sprints", json!([{"id": "S1", "name": "Sprint 1", "capacity": 20}])),
            ],
        }
    }

    #[test]
    fn test_flat_scenario() {
        let mut store = store();
        let summary = import_workbook(&mut store, &scenario_book(), Convention::Flat).unwrap();

        assert_eq!(store.epics(), vec![Epic { id: "E1".into(), name: "Core".into() }]);
        let sprints = store.sprints();
        assert_eq!(sprints.len(), 1);
        assert_eq!((sprints[0].id.as_str(), sprints[0].name.as_str(), sprints[0].capacity), ("S1", "Sprint 1", 20));
        let tasks = store.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "T1");
        assert_eq!(tasks[0].epic_id.as_deref(), Some("E1"));
        assert_eq!(tasks[0].sprint_id, Some(Container::Sprint("S1".into())));
        assert_eq!(tasks[0].story_points, 5.0);
        assert_eq!(summary.placeholder_sprints, 0);
    }

    #[test]
    fn test_sheet_order_does_not_matter() {
        let mut book = scenario_book();
        book.sheets.reverse();
        let mut store = store();
        import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(store.tasks()[0].sprint_id, Some(Container::Sprint("S1".into())));
        assert_eq!(store.sprints().len(), 1);
    }

    #[test]
    fn test_name_fallback_to_existing_sprint() {
        let mut store = store();
        let existing = Sprint { name: "Sprint 7".into(), ..Sprint::placeholder("abc", 30) };
        store.save_sprints(&[existing]).unwrap();
        let book = Workbook {
            sheets: vec![sheet(
                "jira tasks",
                json!([{"Issue Type": "Task", "Issue key": "T9", "Summary": "Ship", "Sprint": "Sprint 7"}]),
            )],
        };
        let summary = import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(summary.placeholder_sprints, 0);
        assert_eq!(store.tasks()[0].sprint_id, Some(Container::Sprint("abc".into())));
        assert_eq!(store.sprints().len(), 1);
    }

    #[test]
    fn test_unknown_sprint_token_gets_placeholder() {
        let mut store = store();
        let book = Workbook {
            sheets: vec![sheet(
                "JIRA Tasks",
                json!([
                    {"Issue Type": "Bug", "Issue key": "B1", "Summary": "Fix", "SprintAssignment": "Sprint X"},
                    {"Issue Type": "Bug", "Issue key": "B2", "Summary": "Fix 2", "Sprint": "backlog"}
                ]),
            )],
        };
        let summary = import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(summary.placeholder_sprints, 1);
        let sprints = store.sprints();
        assert_eq!((sprints[0].id.as_str(), sprints[0].name.as_str()), ("Sprint X", "Sprint X"));
        let tasks = store.tasks();
        assert_eq!(tasks[0].sprint_id, Some(Container::Sprint("Sprint X".into())));
        assert_eq!(tasks[1].sprint_id, Some(Container::Backlog));
    }

    #[test]
    fn test_malformed_rows_dropped_and_unknown_sheet_skipped() {
        let mut store = store();
        let book = Workbook {
            sheets: vec![
                sheet(
                    "JIRA Tasks",
                    json!([
                        {"Issue Type": "Story", "Issue key": "T1"},
                        {"Issue Type": "Epic", "Summary": "No key"},
                        {"Issue Type": "Story", "Issue key": "T2", "Summary": "Ok", "Epic Link": "E404"}
                    ]),
                ),
                sheet("Notes", json!([{"a": 1}])),
            ],
        };
        let summary = import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(summary.dropped_rows, 2);
        assert_eq!(summary.skipped_sheets, vec!["Notes"]);
        let tasks = store.tasks();
        assert_eq!(tasks.len(), 1);
        // Unresolved epic keeps the token it was given.
        assert_eq!(tasks[0].epic_id.as_deref(), Some("E404"));
        assert_eq!(tasks[0].sprint_id, None);
    }

    #[test]
    fn test_first_epic_declaration_wins() {
        let mut store = store();
        let book = Workbook {
            sheets: vec![
                sheet("JIRA Tasks", json!([{"Issue Type": "Epic", "Issue key": "E1", "Summary": "First"}])),
                sheet("JIRA Epics", json!([{"Issue Type": "Epic", "Issue key": "E1", "Summary": "Second"}])),
            ],
        };
        import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(store.epics(), vec![Epic { id: "E1".into(), name: "First".into() }]);
    }

    #[test]
    fn test_field_aliases_priority() {
        let mut store = store();
        let book = Workbook {
            sheets: vec![sheet(
                "JIRA Tasks",
                json!([{
                    "Issue Type": "Story", "Issue key": "T1", "Summary": "Build",
                    "Custom field (Story Points)": "8",
                    "Parent key": "E1",
                    "Issue color": "#FFDAB9",
                    "Custom field (Dependent Team)": "QA Team", "Dependent Team": "Ops",
                    "Traffic Light Status": "Green"
                }]),
            )],
        };
        import_workbook(&mut store, &book, Convention::Flat).unwrap();
        let task = &store.tasks()[0];
        assert_eq!(task.story_points, 8.0);
        assert_eq!(task.epic_id.as_deref(), Some("E1"));
        assert_eq!(task.color, "#FFDAB9");
        assert_eq!(task.dependent_team.as_deref(), Some("QA Team"));
        assert_eq!(task.traffic_light_status, Some(TrafficLight::Green));
        assert_eq!(store.dependent_teams(), vec!["QA Team"]);
    }

    #[test]
    fn test_structured_resolves_epic_by_name() {
        let mut store = store();
        let book = Workbook {
            sheets: vec![
                sheet("Epics", json!([{"ID": "e1", "Name": "Frontend"}])),
                sheet("Sprints", json!([{"id": "s1", "Name": "Sprint 1", "StartDate": "2026-01-05",
                                         "EndDate": "2026-01-18", "Capacity": "25"}])),
                sheet("Tasks", json!([{"id": "t1", "Name": "Login", "Epic": "Frontend",
                                       "SprintAssignment": "Sprint 1", "StoryPoints": "3"}])),
                sheet("Dependent Teams", json!([{"Dependent Team Name": "QA Team"}])),
            ],
        };
        import_workbook(&mut store, &book, Convention::Structured).unwrap();
        let task = &store.tasks()[0];
        assert_eq!(task.epic_id.as_deref(), Some("e1"));
        assert_eq!(task.sprint_id, Some(Container::Sprint("s1".into())));
        let sprint = &store.sprints()[0];
        assert_eq!(sprint.capacity, 25);
        assert_eq!(sprint.start_date, NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(store.dependent_teams(), vec!["QA Team"]);
    }

    #[test]
    fn test_feature_template_sheet_formats() {
        let mut store = store();
        let book = Workbook {
            sheets: vec![sheet(
                "Feature Templates",
                json!([
                    {"Template ID": "ft1", "Template Name": "Std",
                     "Items (JSON)": "[{\"suffix\":\"Design\",\"points\":2},{\"taskName\":\"Build\",\"points\":5}]"},
                    {"Template Name": "Requirements"},
                    {"Feature Template": "Testing"},
                    {"Template Name": "Broken", "Items (JSON)": "[{"}
                ]),
            )],
        };
        let summary = import_workbook(&mut store, &book, Convention::Structured).unwrap();
        assert_eq!(summary.dropped_rows, 1);
        let templates = store.feature_templates();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].id, "ft1");
        assert_eq!(templates[0].items[0], TemplateItem { task_name: "Design".into(), points: 2.0 });
        assert_eq!(templates[1].name, LEGACY_IMPORT_TEMPLATE_NAME);
        let legacy: Vec<&str> = templates[1].items.iter().map(|i| i.task_name.as_str()).collect();
        assert_eq!(legacy, vec!["Requirements", "Testing"]);
    }

    #[test]
    fn test_untouched_collections_survive() {
        let mut store = store();
        store.save_epics(&[Epic::new("Keep")]).unwrap();
        let book = Workbook { sheets: vec![sheet("Dependent Teams", json!([{"Team Name": "Ops"}]))] };
        import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(store.epics().len(), 1);
        assert_eq!(store.dependent_teams(), vec!["Ops"]);
    }

    #[test]
    fn test_detect_and_classify() {
        assert_eq!(detect_convention(&scenario_book()), Convention::Flat);
        assert_eq!(detect_convention(&Workbook::default()), Convention::Structured);
        assert_eq!(classify_sheet(Convention::Flat, " Tasks "), None);
        assert_eq!(classify_sheet(Convention::Structured, " Tasks "), Some(SheetKind::Tasks));
        assert_eq!(classify_sheet(Convention::Flat, "SPRINTS"), Some(SheetKind::Sprints));
    }

    #[test]
    fn test_parse_date_cell() {
        assert_eq!(parse_date_cell(&json!("2026-03-02")), NaiveDate::from_ymd_opt(2026, 3, 2));
        assert_eq!(parse_date_cell(&json!("2026-03-02T00:00:00Z")), NaiveDate::from_ymd_opt(2026, 3, 2));
        assert_eq!(parse_date_cell(&json!(45658)), NaiveDate::from_ymd_opt(2025, 1, 1));
        assert_eq!(parse_date_cell(&json!("soon")), None);
    }

    #[test]
    fn test_import_file_reports_file_errors_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, "not json").unwrap();
        let mut store = store();
        let mut error = None;
        import_file(&mut store, &bad, None, |_| panic!("should fail"), |msg| error = Some(msg));
        assert!(error.unwrap().contains("broken.json"));
        assert_eq!(store.kv().writes, 0);
    }

    #[test]
    fn test_import_file_detects_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jira.json");
        scenario_book().save(&path).unwrap();
        let mut store = store();
        let mut done = None;
        import_file(&mut store, &path, None, |s| done = Some(s), |e| panic!("{e}"));
        assert_eq!(done.unwrap().convention, Some(Convention::Flat));
        assert_eq!(store.tasks().len(), 1);
    }

    #[test]
    fn test_out_of_range_cells_clear_only_that_field() {
        assert_eq!(parse_date_cell(&json!(1e18)), None);
        assert_eq!(parse_date_cell(&json!(-1e18)), None);

        let mut store = store();
        let book = Workbook {
            sheets: vec![sheet(
                "Sprints",
                json!([
                    {"id": "S2", "Name": "Sprint 2", "StartDate": 1e18, "EndDate": "2026-02-01", "Capacity": 1e20},
                    {"id": "S3", "Name": "Sprint 3", "Capacity": -4}
                ]),
            )],
        };
        let summary = import_workbook(&mut store, &book, Convention::Structured).unwrap();
        assert_eq!(summary.dropped_rows, 0);
        let sprints = store.sprints();
        assert_eq!(sprints[0].start_date, None);
        assert_eq!(sprints[0].end_date, NaiveDate::from_ymd_opt(2026, 2, 1));
        let default_capacity = store.settings().default_sprint_capacity;
        assert_eq!(sprints[0].capacity, default_capacity);
        assert_eq!(sprints[1].capacity, default_capacity);
    }

    #[test]
    fn test_task_only_sheet_keeps_and_links_stored_epics() {
        let mut store = store();
        store.save_epics(&[Epic { id: "e1".into(), name: "Core".into() }]).unwrap();
        let book = Workbook {
            sheets: vec![sheet(
                "JIRA Tasks",
                json!([{"Issue Type": "Story", "Issue key": "T1", "Summary": "Build", "Epic Link": "Core"}]),
            )],
        };
        let summary = import_workbook(&mut store, &book, Convention::Flat).unwrap();
        assert_eq!(summary.epics, 0);
        assert_eq!(store.epics(), vec![Epic { id: "e1".into(), name: "Core".into() }]);
        assert_eq!(store.tasks()[0].epic_id.as_deref(), Some("e1"));
    }

    #[test]
    fn test_declared_epics_merge_and_win_over_stored_names() {
        let mut store = store();
        store
            .save_epics(&[
                Epic { id: "e1".into(), name: "Core".into() },
                Epic { id: "e2".into(), name: "Old name".into() },
            ])
            .unwrap();
        let book = Workbook {
            sheets: vec![sheet(
                "JIRA Tasks",
                json!([
                    {"Issue Type": "Epic", "Issue key": "E9", "Summary": "Core"},
                    {"Issue Type": "Epic", "Issue key": "e2", "Summary": "Renamed"},
                    {"Issue Type": "Story", "Issue key": "T1", "Summary": "Build", "Epic Link": "Core"}
                ]),
            )],
        };
        import_workbook(&mut store, &book, Convention::Flat).unwrap();
        let names: Vec<(String, String)> = store.epics().into_iter().map(|e| (e.id, e.name)).collect();
        assert_eq!(
            names,
            vec![
                ("e1".to_string(), "Core".to_string()),
                ("e2".to_string(), "Renamed".to_string()),
                ("E9".to_string(), "Core".to_string()),
            ]
        );
        assert_eq!(store.tasks()[0].epic_id.as_deref(), Some("E9"));
    }

    #[test]
    fn test_sprint_token_matching_stored_id_needs_no_placeholder() {
        let mut store = store();
        let existing = Sprint { name: "Sprint 4".into(), ..Sprint::placeholder("s4", 30) };
        store.save_sprints(&[existing]).unwrap();
        let book = Workbook {
            sheets: vec![sheet(
                "Tasks",
                json!([{"id": "t1", "Name": "Wire up", "SprintAssignment": "s4"}]),
            )],
        };
        let summary = import_workbook(&mut store, &book, Convention::Structured).unwrap();
        assert_eq!(summary.placeholder_sprints, 0);
        assert_eq!(store.sprints().len(), 1);
        assert_eq!(store.tasks()[0].sprint_id, Some(Container::Sprint("s4".into())));
    }
}
