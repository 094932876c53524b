//! Step-level comparison of two catalogs

use envbake_types::{Pipeline, Step};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A step present in both catalogs with different declarations
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepChange {
    pub name: String,
    pub fields: Vec<&'static str>,
}

/// A step whose position relative to the other shared steps changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepMove {
    pub name: String,
    pub from: usize,
    pub to: usize,
}

/// Differences between two catalogs, keyed by step name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<StepChange>,
    pub moved: Vec<StepMove>,
}

impl CatalogDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.changed.is_empty()
            && self.moved.is_empty()
    }
}

impl fmt::Display for CatalogDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in &self.removed {
            writeln!(f, "- {name}")?;
        }
        for name in &self.added {
            writeln!(f, "+ {name}")?;
        }
        for change in &self.changed {
            writeln!(f, "~ {} ({})", change.name, change.fields.join(", "))?;
        }
        for step in &self.moved {
            writeln!(f, "> {} #{} -> #{}", step.name, step.from + 1, step.to + 1)?;
        }
        Ok(())
    }
}

/// Compare `old` against `new`
///
/// Moves are judged on the order of the steps both catalogs share, so
/// inserting or removing a step does not mark everything after it as moved.
#[must_use]
pub fn diff(old: &Pipeline, new: &Pipeline) -> CatalogDiff {
    let old_steps: BTreeMap<&str, (usize, &Step)> = old
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), (i, s)))
        .collect();
    let new_steps: BTreeMap<&str, (usize, &Step)> = new
        .iter()
        .enumerate()
        .map(|(i, s)| (s.name.as_str(), (i, s)))
        .collect();

    let mut result = CatalogDiff {
        removed: old
            .iter()
            .filter(|s| !new_steps.contains_key(s.name.as_str()))
            .map(|s| s.name.clone())
            .collect(),
        added: new
            .iter()
            .filter(|s| !old_steps.contains_key(s.name.as_str()))
            .map(|s| s.name.clone())
            .collect(),
        ..CatalogDiff::default()
    };

    let shared_old: Vec<&str> = old
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| new_steps.contains_key(name))
        .collect();
    let shared_new: Vec<&str> = new
        .iter()
        .map(|s| s.name.as_str())
        .filter(|name| old_steps.contains_key(name))
        .collect();

    for (rank, name) in shared_old.iter().enumerate() {
        let (from, before) = old_steps[name];
        let (to, after) = new_steps[name];

        let fields = changed_fields(before, after);
        if !fields.is_empty() {
            result.changed.push(StepChange {
                name: (*name).to_string(),
                fields,
            });
        }
        if shared_new.get(rank) != Some(name) {
            result.moved.push(StepMove {
                name: (*name).to_string(),
                from,
                to,
            });
        }
    }

    result
}

fn changed_fields(a: &Step, b: &Step) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if a.kind != b.kind {
        fields.push("kind");
    }
    if a.inputs != b.inputs {
        fields.push("inputs");
    }
    if a.idempotent != b.idempotent {
        fields.push("idempotent");
    }
    if a.repository != b.repository {
        fields.push("repository");
    }
    if a.index_url != b.index_url {
        fields.push("index_url");
    }
    if a.upgrade != b.upgrade {
        fields.push("upgrade");
    }
    if a.editable != b.editable {
        fields.push("editable");
    }
    if a.destination != b.destination {
        fields.push("destination");
    }
    if a.requires != b.requires {
        fields.push("requires");
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;

    #[test]
    fn test_identical_catalogs() {
        assert!(diff(&builtin(), &builtin()).is_empty());
    }

    #[test]
    fn test_removed_step_is_not_a_move() {
        let old = builtin();
        let new = old.without("register-interpreter-repo");
        let result = diff(&old, &new);
        assert_eq!(result.removed, vec!["register-interpreter-repo".to_string()]);
        assert!(result.moved.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn test_changed_index_and_swap() {
        let old = builtin();
        let mut new = old.clone();
        new.steps[6].index_url = Some("https://download.pytorch.org/whl/cu121".to_string());
        new.steps.swap(5, 6);

        let result = diff(&old, &new);
        assert_eq!(
            result.changed,
            vec![StepChange {
                name: "install-framework".to_string(),
                fields: vec!["index_url"],
            }]
        );
        let moved: Vec<_> = result.moved.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(moved, ["install-opengl-bindings", "install-framework"]);
        assert!(result.to_string().contains("~ install-framework (index_url)"));
    }
}
