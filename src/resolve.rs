//! Foreign-key resolution for loosely typed reference tokens.
//!
//! A token may be the Backlog sentinel, an id, or a name. Resolution order is
//! fixed: sentinel (case-insensitive), exact id, exact name. A token that
//! matches nothing is an orphan and resolves to "unassigned"; it is never an
//! error.

use tracing::debug;

use crate::fields::{is_backlog_token, Container};
use crate::model::{Epic, FeatureTemplate, Sprint};

/// Anything addressable by either an id or a display name.
pub trait Referable {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
}

impl Referable for Sprint {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Referable for Epic {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

impl Referable for FeatureTemplate {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        &self.name
    }
}

/// Outcome of resolving one token.
#[derive(Debug, PartialEq)]
pub enum Resolution<'a, T> {
    Backlog,
    Found(&'a T),
    Unassigned,
}

/// Resolve a token against a collection with an id space and a name space.
pub fn resolve<'a, T: Referable>(token: Option<&str>, items: &'a [T]) -> Resolution<'a, T> {
    let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
        return Resolution::Unassigned;
    };
    if is_backlog_token(token) {
        return Resolution::Backlog;
    }
    if let Some(hit) = items.iter().find(|i| i.id() == token) {
        return Resolution::Found(hit);
    }
    if let Some(hit) = items.iter().find(|i| i.name() == token) {
        debug!(token, id = hit.id(), "resolved by name");
        return Resolution::Found(hit);
    }
    debug!(token, "unresolved reference, leaving unassigned");
    Resolution::Unassigned
}

/// Resolve a sprint token to a task container. `None` means unassigned.
pub fn resolve_container(token: Option<&str>, sprints: &[Sprint]) -> Option<Container> {
    match resolve(token, sprints) {
        Resolution::Backlog => Some(Container::Backlog),
        Resolution::Found(s) => Some(Container::Sprint(s.id.clone())),
        Resolution::Unassigned => None,
    }
}

/// Resolve an epic token to an epic id.
///
/// Unresolved tokens are kept verbatim so the task still carries the value it
/// was given; only an absent token yields `None`.
pub fn resolve_epic_id(token: Option<&str>, epics: &[Epic]) -> Option<String> {
    match resolve(token, epics) {
        Resolution::Found(e) => Some(e.id.clone()),
        Resolution::Backlog | Resolution::Unassigned => token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprints() -> Vec<Sprint> {
        vec![
            Sprint::placeholder("S1", 20),
            Sprint { name: "Sprint 1".into(), ..Sprint::placeholder("S2", 20) },
            // An id that collides with another sprint's name: id wins.
            Sprint { name: "S1".into(), ..Sprint::placeholder("S3", 20) },
        ]
    }

    #[test]
    fn test_backlog_sentinel_first() {
        let sprints = vec![Sprint::placeholder("Backlog", 1)];
        assert_eq!(resolve(Some("backlog"), &sprints), Resolution::Backlog);
    }

    #[test]
    fn test_id_before_name() {
        let sprints = sprints();
        match resolve(Some("S1"), &sprints) {
            Resolution::Found(s) => assert_eq!(s.id, "S1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_name_fallback() {
        let sprints = sprints();
        assert_eq!(
            resolve_container(Some("Sprint 1"), &sprints),
            Some(Container::Sprint("S2".into()))
        );
    }

    #[test]
    fn test_unmatched_is_unassigned() {
        let sprints = sprints();
        assert_eq!(resolve(Some("Sprint 9"), &sprints), Resolution::Unassigned);
        assert_eq!(resolve::<Sprint>(None, &sprints), Resolution::Unassigned);
        assert_eq!(resolve(Some("  "), &sprints), Resolution::Unassigned);
        assert_eq!(resolve_container(Some("Sprint 9"), &sprints), None);
    }

    #[test]
    fn test_epic_keeps_unresolved_token() {
        let epics = vec![Epic { id: "E1".into(), name: "Core".into() }];
        assert_eq!(resolve_epic_id(Some("Core"), &epics), Some("E1".into()));
        assert_eq!(resolve_epic_id(Some("E404"), &epics), Some("E404".into()));
        assert_eq!(resolve_epic_id(None, &epics), None);
    }
}
