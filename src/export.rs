//! Workbook export in either convention.
//!
//! Exports are written so the matching importer reads them back into the same
//! entity graph: structured exports carry ids everywhere, flat exports carry
//! issue keys for epics and names for sprint and epic references.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::Result;
use crate::fields::{Container, Convention};
use crate::import::*;
use crate::kv::KvStore;
use crate::model::{Epic, Sprint, Task};
use crate::store::EntityStore;
use crate::workbook::{Row, Sheet, Workbook};

/// What was written.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub convention: Convention,
    /// Sheet name and row count, in write order.
    pub sheets: Vec<(String, usize)>,
}

/// Build a workbook from the current store contents.
pub fn export_workbook<S: KvStore>(store: &mut EntityStore<S>, convention: Convention) -> Workbook {
    let sprints = store.sprints();
    let epics = store.epics();
    let tasks = store.tasks();
    let teams = store.dependent_teams();
    let templates = store.feature_templates();

    let mut book = Workbook::default();
    match convention {
        Convention::Structured => {
            book.sheets.push(structured_sprints(&sprints));
            book.sheets.push(rows_sheet(
                SHEET_EPICS,
                &[COL_EPIC_ID[0], COL_EPIC_NAME[0]],
                epics.iter().map(|e| vec![json!(e.id), json!(e.name)]),
            ));
            book.sheets.push(structured_tasks(&tasks, &sprints));
            book.sheets.push(rows_sheet(
                SHEET_DEPENDENT_TEAMS,
                &[COL_TEAM_NAME[0]],
                teams.iter().map(|t| vec![json!(t)]),
            ));
        }
        Convention::Flat => {
            book.sheets.push(flat_tasks(&tasks, &sprints, &epics));
            book.push_non_empty(rows_sheet(
                SHEET_JIRA_EPICS,
                &[COL_ISSUE_TYPE[0], COL_ISSUE_KEY[0], COL_SUMMARY[0]],
                epics.iter().map(|e| vec![json!("Epic"), json!(e.id), json!(e.name)]),
            ));
            book.sheets.push(rows_sheet(
                SHEET_SPRINTS,
                &["id", "name", "startDate", "endDate", "capacity"],
                sprints.iter().map(sprint_cells),
            ));
            book.sheets.push(rows_sheet(
                SHEET_DEPENDENT_TEAMS,
                &[COL_TEAM_NAME[1]],
                teams.iter().map(|t| vec![json!(t)]),
            ));
        }
    }

    let template_rows = templates.iter().filter_map(|t| match serde_json::to_string(&t.items) {
        Ok(items) => Some(vec![json!(t.id), json!(t.name), json!(items)]),
        Err(e) => {
            warn!(template = %t.id, error = %e, "template items not serializable, skipped");
            None
        }
    });
    book.sheets.push(rows_sheet(
        SHEET_FEATURE_TEMPLATES,
        &[COL_TEMPLATE_ID[0], COL_TEMPLATE_NAME[0], COL_TEMPLATE_ITEMS[0]],
        template_rows,
    ));
    book
}

fn rows_sheet(name: &str, columns: &[&str], rows: impl Iterator<Item = Vec<Value>>) -> Sheet {
    let mut sheet = Sheet::new(name, columns);
    for cells in rows {
        let row: Row = columns.iter().map(|c| c.to_string()).zip(cells).collect();
        sheet.rows.push(row);
    }
    sheet
}

fn date_cell(d: Option<chrono::NaiveDate>) -> Value {
    d.map(|d| json!(d.format("%Y-%m-%d").to_string())).unwrap_or_else(|| json!(""))
}

fn sprint_cells(s: &Sprint) -> Vec<Value> {
    vec![json!(s.id), json!(s.name), date_cell(s.start_date), date_cell(s.end_date), json!(s.capacity)]
}

fn structured_sprints(sprints: &[Sprint]) -> Sheet {
    rows_sheet(
        SHEET_SPRINTS,
        &[
            COL_SPRINT_ID[0],
            COL_SPRINT_NAME[0],
            COL_SPRINT_START[0],
            COL_SPRINT_END[0],
            COL_SPRINT_CAPACITY[0],
        ],
        sprints.iter().map(sprint_cells),
    )
}

/// The stored container, with references to missing sprints written as unassigned.
fn live_container<'a>(task: &'a Task, sprint_ids: &HashSet<&str>) -> Option<&'a Container> {
    match &task.sprint_id {
        Some(Container::Sprint(id)) if !sprint_ids.contains(id.as_str()) => {
            warn!(task = %task.id, sprint = %id, "task references a missing sprint, exported unassigned");
            None
        }
        other => other.as_ref(),
    }
}

fn status_cell(task: &Task) -> Value {
    json!(task.traffic_light_status.map(|s| s.as_str()).unwrap_or(""))
}

fn opt_cell(v: &Option<String>) -> Value {
    json!(v.as_deref().unwrap_or(""))
}

fn structured_tasks(tasks: &[Task], sprints: &[Sprint]) -> Sheet {
    let sprint_ids: HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
    rows_sheet(
        SHEET_TASKS,
        &[
            COL_TASK_ID[0],
            COL_TASK_NAME[0],
            COL_TASK_POINTS[0],
            COL_TASK_EPIC[0],
            COL_TASK_SPRINT[0],
            COL_TASK_COLOR[0],
            COL_TASK_TEAM[0],
            COL_TASK_STATUS[0],
            COL_ISSUE_TYPE[0],
        ],
        tasks.iter().map(|t| {
            let container = live_container(t, &sprint_ids).map(Container::as_str).unwrap_or("");
            vec![
                json!(t.id),
                json!(t.name),
                json!(t.story_points),
                opt_cell(&t.epic_id),
                json!(container),
                json!(t.color),
                opt_cell(&t.dependent_team),
                status_cell(t),
                opt_cell(&t.issue_type),
            ]
        }),
    )
}

fn flat_tasks(tasks: &[Task], sprints: &[Sprint], epics: &[Epic]) -> Sheet {
    let sprint_ids: HashSet<&str> = sprints.iter().map(|s| s.id.as_str()).collect();
    rows_sheet(
        SHEET_JIRA_TASKS,
        &[
            COL_ISSUE_TYPE[0],
            COL_ISSUE_KEY[0],
            COL_SUMMARY[0],
            COL_POINTS[0],
            COL_EPIC_LINK[0],
            COL_SPRINT[0],
            COL_COLOR[0],
            COL_TEAM[0],
            COL_STATUS[0],
        ],
        tasks.iter().map(|t| {
            let epic_link = t.epic_id.as_deref().map(|id| {
                epics.iter().find(|e| e.id == id).map_or(id, |e| e.name.as_str())
            });
            let sprint = match live_container(t, &sprint_ids) {
                Some(Container::Sprint(id)) => {
                    sprints.iter().find(|s| &s.id == id).map_or("", |s| s.name.as_str())
                }
                Some(Container::Backlog) => crate::fields::BACKLOG,
                None => "",
            };
            vec![
                json!(t.issue_type.as_deref().unwrap_or("Story")),
                json!(t.id),
                json!(t.name),
                json!(t.story_points),
                json!(epic_link.unwrap_or("")),
                json!(sprint),
                json!(t.color),
                opt_cell(&t.dependent_team),
                status_cell(t),
            ]
        }),
    )
}

/// Export to a file or CSV directory, reporting through callbacks only.
pub fn export_file<S: KvStore>(
    store: &mut EntityStore<S>,
    path: &Path,
    convention: Convention,
    on_complete: impl FnOnce(ExportSummary),
    on_error: impl FnOnce(String),
) {
    let book = export_workbook(store, convention);
    match book.save(path) {
        Ok(()) => {
            let sheets: Vec<(String, usize)> =
                book.sheets.iter().map(|s| (s.name.clone(), s.rows.len())).collect();
            info!(path = %path.display(), %convention, sheets = sheets.len(), "export written");
            on_complete(ExportSummary { path: path.to_path_buf(), convention, sheets });
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "export failed");
            on_error(format!("Failed to export {}: {e}", path.display()));
        }
    }
}

/// Export, returning errors instead of reporting them.
pub fn export_to<S: KvStore>(
    store: &mut EntityStore<S>,
    path: &Path,
    convention: Convention,
) -> Result<ExportSummary> {
    let book = export_workbook(store, convention);
    book.save(path)?;
    Ok(ExportSummary {
        path: path.to_path_buf(),
        convention,
        sheets: book.sheets.iter().map(|s| (s.name.clone(), s.rows.len())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::TrafficLight;
    use crate::kv::MemoryStore;
    use crate::model::{FeatureTemplate, TemplateItem};
    use chrono::NaiveDate;

    fn populated() -> EntityStore<MemoryStore> {
        let mut store = EntityStore::new(MemoryStore::new());
        let d = |m, day| NaiveDate::from_ymd_opt(2026, m, day).unwrap();
        let s1 = Sprint { id: "s1".into(), ..Sprint::new("Sprint 1", d(1, 5), d(1, 18), 20) };
        let s2 = Sprint::placeholder("s2", 15);
        store.save_sprints(&[s1, s2]).unwrap();
        store
            .save_epics(&[
                Epic { id: "e1".into(), name: "Core".into() },
                Epic { id: "e2".into(), name: "Edge".into() },
            ])
            .unwrap();

        let mut a = Task::new("Build", 5.0, "e1");
        a.id = "t1".into();
        a.sprint_id = Some(Container::Sprint("s1".into()));
        a.dependent_team = Some("QA Team".into());
        a.traffic_light_status = Some(TrafficLight::Amber);
        let mut b = Task::new("Polish", 2.5, "e2");
        b.id = "t2".into();
        b.color = "#FFDAB9".into();
        let mut c = Task::new("Loose", 1.0, "e1");
        c.id = "t3".into();
        c.sprint_id = None;
        store.save_tasks(&[a, b, c]).unwrap();
        store.save_dependent_teams(&["QA Team".to_string()]).unwrap();
        store
            .save_feature_templates(&[FeatureTemplate {
                id: "ft".into(),
                name: "Std".into(),
                items: vec![TemplateItem { task_name: "Design".into(), points: 2.0 }],
            }])
            .unwrap();
        store
    }

    fn assert_same_graph(a: &mut EntityStore<MemoryStore>, b: &mut EntityStore<MemoryStore>) {
        assert_eq!(a.sprints(), b.sprints());
        assert_eq!(a.epics(), b.epics());
        assert_eq!(a.tasks(), b.tasks());
        assert_eq!(a.dependent_teams(), b.dependent_teams());
        assert_eq!(a.feature_templates(), b.feature_templates());
    }

    #[test]
    fn test_structured_round_trip_via_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let mut source = populated();
        export_to(&mut source, &path, Convention::Structured).unwrap();

        let mut target = EntityStore::new(MemoryStore::new());
        let book = Workbook::load(&path).unwrap();
        assert_eq!(detect_convention(&book), Convention::Structured);
        import_workbook(&mut target, &book, Convention::Structured).unwrap();
        assert_same_graph(&mut source, &mut target);
    }

    #[test]
    fn test_structured_round_trip_via_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan");
        let mut source = populated();
        export_to(&mut source, &path, Convention::Structured).unwrap();
        assert!(path.join("Tasks.csv").is_file());

        let mut target = EntityStore::new(MemoryStore::new());
        import_workbook(&mut target, &Workbook::load(&path).unwrap(), Convention::Structured).unwrap();
        assert_same_graph(&mut source, &mut target);
    }

    #[test]
    fn test_flat_export_round_trip() {
        let mut source = populated();
        let book = export_workbook(&mut source, Convention::Flat);
        assert_eq!(detect_convention(&book), Convention::Flat);

        let tasks = &book.sheet(SHEET_JIRA_TASKS).unwrap().rows;
        assert_eq!(tasks[0]["Epic Link"], "Core");
        assert_eq!(tasks[0]["Sprint"], "Sprint 1");
        assert_eq!(tasks[1]["Sprint"], "Backlog");
        assert_eq!(tasks[2]["Sprint"], "");
        assert_eq!(tasks[0]["Issue Type"], "Story");

        let mut target = EntityStore::new(MemoryStore::new());
        import_workbook(&mut target, &book, Convention::Flat).unwrap();
        let mut expected = source.tasks();
        for t in &mut expected {
            t.issue_type = Some("Story".into());
        }
        assert_eq!(target.tasks(), expected);
        assert_eq!(target.epics(), source.epics());
        assert_eq!(target.sprints(), source.sprints());
    }

    #[test]
    fn test_orphan_sprint_exported_unassigned() {
        let mut store = populated();
        let mut tasks = store.tasks();
        tasks[0].sprint_id = Some(Container::Sprint("gone".into()));
        store.save_tasks(&tasks).unwrap();
        let book = export_workbook(&mut store, Convention::Structured);
        let rows = &book.sheet(SHEET_TASKS).unwrap().rows;
        assert_eq!(rows[0]["SprintAssignment"], "");
    }

    #[test]
    fn test_export_file_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, "file").unwrap();
        let mut store = populated();
        let mut error = None;
        export_file(&mut store, &blocker.join("out"), Convention::Flat, |_| panic!("should fail"), |e| {
            error = Some(e)
        });
        assert!(error.unwrap().starts_with("Failed to export"));
    }

    #[test]
    fn test_export_file_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = populated();
        let mut done = None;
        export_file(&mut store, &dir.path().join("x.json"), Convention::Flat, |s| done = Some(s), |e| {
            panic!("{e}")
        });
        let summary = done.unwrap();
        assert_eq!(summary.sheets[0], (SHEET_JIRA_TASKS.to_string(), 3));
    }
}
