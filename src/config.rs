//! Defaults and storage keys.

/// Collection keys in the key-value store.
pub const KEY_SPRINTS: &str = "piPlannerSprints";
pub const KEY_TASKS: &str = "piPlannerTasks";
pub const KEY_EPICS: &str = "piPlannerEpics";
pub const KEY_DEPENDENT_TEAMS: &str = "piPlannerDependentTeams";
pub const KEY_FEATURE_TEMPLATES: &str = "piPlannerFeatureTemplates";
pub const KEY_SETTINGS: &str = "piPlannerSettings";

/// Every key owned by the application, in the order `clear_all` removes them.
pub const ALL_KEYS: [&str; 6] = [
    KEY_SPRINTS,
    KEY_TASKS,
    KEY_EPICS,
    KEY_DEPENDENT_TEAMS,
    KEY_FEATURE_TEMPLATES,
    KEY_SETTINGS,
];

/// Story points per sprint when nothing else is known.
pub const DEFAULT_SPRINT_CAPACITY: u32 = 40;
pub const DEFAULT_SPRINT_LENGTH_WEEKS: u32 = 2;
pub const DEFAULT_SPRINT_COUNT: u32 = 12;
/// Most sprints quick setup will create.
pub const MAX_SPRINT_COUNT: u32 = 104;

pub const DEFAULT_TASK_COLOR: &str = "#D3D3D3";

/// Points given to items of the seeded feature template.
pub const DEFAULT_FEATURE_TASK_POINTS: f64 = 3.0;

pub const DEFAULT_EPICS: [&str; 5] = ["Frontend", "Backend", "Database", "Testing", "Design"];

pub const DEFAULT_DEPENDENT_TEAMS: [&str; 8] = [
    "Frontend Team",
    "Backend Team",
    "QA Team",
    "DevOps Team",
    "Design Team",
    "Product Team",
    "External Team A",
    "External Team B",
];

pub const FEATURE_TASK_SUFFIXES: [&str; 7] = [
    "Requirements",
    "Design",
    "Build and Unit Test",
    "Deploy to DEV",
    "Deploy to TEST",
    "Testing",
    "Deploy to PROD",
];

/// Name of the template synthesised from legacy plain-string template rows.
pub const LEGACY_IMPORT_TEMPLATE_NAME: &str = "Imported (Legacy)";
pub const MIGRATED_TEMPLATE_NAME: &str = "Default Template";
pub const STANDARD_TEMPLATE_NAME: &str = "Standard Feature";
