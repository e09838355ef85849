//! Quick setup of a planning increment.

use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;

use crate::config::{
    DEFAULT_DEPENDENT_TEAMS, DEFAULT_EPICS, DEFAULT_FEATURE_TASK_POINTS, FEATURE_TASK_SUFFIXES,
    MAX_SPRINT_COUNT, STANDARD_TEMPLATE_NAME,
};
use crate::error::{PlannerError, Result};
use crate::kv::KvStore;
use crate::model::{Epic, FeatureTemplate, Sprint, TemplateItem};
use crate::store::EntityStore;

/// Inputs for [`quick_setup`].
#[derive(Debug, Clone, PartialEq)]
pub struct SetupPlan {
    pub start: NaiveDate,
    pub sprint_length_weeks: u32,
    pub capacity: u32,
    pub sprint_count: u32,
}

/// What quick setup wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SetupReport {
    pub sprints: Vec<Sprint>,
    pub epics: usize,
    pub dependent_teams: usize,
    /// Whether the standard feature template was seeded.
    pub seeded_template: bool,
}

/// Consecutive sprints named `PI <year>.<quarter> - Sprint <n>`. Each sprint
/// ends the day before the next one starts. Fails when a date would fall
/// outside the supported calendar.
pub fn generate_sprints(plan: &SetupPlan) -> Result<Vec<Sprint>> {
    let out_of_range = || PlannerError::validation("sprint length", "sprints run past the supported date range");
    let length = Duration::try_days(i64::from(plan.sprint_length_weeks) * 7).ok_or_else(out_of_range)?;
    let mut start = plan.start;
    let mut sprints = Vec::new();
    for n in 1..=plan.sprint_count {
        let quarter = start.month0() / 3 + 1;
        let name = format!("PI {}.{} - Sprint {}", start.year(), quarter, n);
        let next = start.checked_add_signed(length).ok_or_else(out_of_range)?;
        let end = next.pred_opt().ok_or_else(out_of_range)?;
        sprints.push(Sprint::new(&name, start, end, plan.capacity));
        start = next;
    }
    Ok(sprints)
}

pub fn standard_template() -> FeatureTemplate {
    let items = FEATURE_TASK_SUFFIXES
        .iter()
        .map(|suffix| TemplateItem { task_name: suffix.to_string(), points: DEFAULT_FEATURE_TASK_POINTS })
        .collect();
    FeatureTemplate::new(STANDARD_TEMPLATE_NAME, items)
}

/// Replace sprints, epics and dependent teams with a fresh increment.
///
/// Tasks are left alone; any that pointed at the old sprints now display in
/// the Backlog. The standard feature template is only added when no
/// templates exist.
pub fn quick_setup<S: KvStore>(store: &mut EntityStore<S>, plan: &SetupPlan) -> Result<SetupReport> {
    if plan.sprint_length_weeks == 0 {
        return Err(PlannerError::validation("sprint length", "must be at least one week"));
    }
    if plan.sprint_count == 0 || plan.sprint_count > MAX_SPRINT_COUNT {
        return Err(PlannerError::validation(
            "sprints",
            format!("must create between 1 and {MAX_SPRINT_COUNT} sprints"),
        ));
    }

    let sprints = generate_sprints(plan)?;
    let epics: Vec<Epic> = DEFAULT_EPICS.iter().map(|name| Epic::new(name)).collect();
    let teams: Vec<String> = DEFAULT_DEPENDENT_TEAMS.iter().map(|t| t.to_string()).collect();

    store.save_sprints(&sprints)?;
    store.save_epics(&epics)?;
    store.save_dependent_teams(&teams)?;
    let seeded_template = store.feature_templates().is_empty();
    if seeded_template {
        store.save_feature_templates(&[standard_template()])?;
    }

    let mut settings = store.settings();
    settings.default_sprint_capacity = plan.capacity;
    settings.sprint_length_weeks = plan.sprint_length_weeks;
    store.save_settings(&settings)?;

    info!(sprints = sprints.len(), start = %plan.start, "quick setup complete");
    Ok(SetupReport { sprints, epics: epics.len(), dependent_teams: teams.len(), seeded_template })
}
