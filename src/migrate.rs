//! Versioned upgrade chain for the stored feature-template collection.
//!
//! The collection shape changed twice:
//!
//! 1. `PlainNames`: a list of strings, each one a task-name suffix.
//! 2. `SuffixItems`: template objects whose items name the suffix `suffix`.
//! 3. `TaskNameItems`: the current shape, items use `taskName`.
//!
//! [`upgrade`] detects the stored version and applies each step until the
//! document is current. Applying it to a current document is a no-op, so the
//! chain is idempotent.

use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::MIGRATED_TEMPLATE_NAME;
use crate::model::new_id;

/// Historical shapes of the feature-template collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TemplateSchema {
    PlainNames,
    SuffixItems,
    TaskNameItems,
}

pub const CURRENT: TemplateSchema = TemplateSchema::TaskNameItems;

struct Step {
    from: TemplateSchema,
    name: &'static str,
    apply: fn(Value) -> Value,
}

const CHAIN: [Step; 2] = [
    Step {
        from: TemplateSchema::PlainNames,
        name: "plain names to template objects",
        apply: plain_names_to_templates,
    },
    Step {
        from: TemplateSchema::SuffixItems,
        name: "item suffix to taskName",
        apply: rename_suffix_fields,
    },
];

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Migrated {
    pub value: Value,
    pub from: TemplateSchema,
    pub changed: bool,
}

/// Detect the oldest shape present in a stored collection.
pub fn detect(doc: &Value) -> TemplateSchema {
    let Some(list) = doc.as_array() else {
        return CURRENT;
    };
    if list.iter().any(Value::is_string) {
        return TemplateSchema::PlainNames;
    }
    let has_suffix_items = list.iter().any(|t| {
        t.get("items")
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|i| i.get("suffix").is_some()))
    });
    if has_suffix_items {
        TemplateSchema::SuffixItems
    } else {
        CURRENT
    }
}

/// Bring a stored collection up to the current shape.
pub fn upgrade(doc: Value) -> Migrated {
    let from = detect(&doc);
    let mut value = doc;
    let mut changed = false;

    for _ in 0..=CHAIN.len() {
        let version = detect(&value);
        if version == CURRENT {
            break;
        }
        let Some(step) = CHAIN.iter().find(|s| s.from == version) else {
            break;
        };
        info!(step = step.name, "migrating feature templates");
        value = (step.apply)(value);
        changed = true;
    }

    Migrated { value, from, changed }
}

/// Gather every plain string into one synthesized template with zero points.
/// Object entries already present are kept as they are.
fn plain_names_to_templates(doc: Value) -> Value {
    let list = match doc {
        Value::Array(list) => list,
        other => return other,
    };
    let mut names = Vec::new();
    let mut kept = Vec::new();
    for entry in list {
        match entry {
            Value::String(s) => names.push(json!({ "taskName": s, "points": 0 })),
            other => kept.push(other),
        }
    }
    let synthesized = json!({
        "id": format!("default-template-{}", new_id()),
        "name": MIGRATED_TEMPLATE_NAME,
        "items": names,
    });
    let mut out = vec![synthesized];
    out.extend(kept);
    Value::Array(out)
}

fn rename_suffix_fields(doc: Value) -> Value {
    let mut doc = doc;
    let Some(list) = doc.as_array_mut() else {
        return doc;
    };
    for template in list.iter_mut() {
        let Some(items) = template.get_mut("items").and_then(Value::as_array_mut) else {
            continue;
        };
        for item in items.iter_mut() {
            if let Some(obj) = item.as_object_mut() {
                rename_suffix(obj);
            }
        }
    }
    doc
}

fn rename_suffix(item: &mut Map<String, Value>) {
    if let Some(suffix) = item.remove("suffix") {
        item.entry("taskName").or_insert(suffix);
    }
}
