//! Region selector parsing and contact targeting.
//!
//! A selector is either empty ("all regions") or a `|`-separated list of
//! state names. Contacts store a free-text region, either `"State"` or
//! `"City, State"`; a contact matches a state token when the whole region
//! or its trailing comma-separated component equals the token. Matching is
//! case-sensitive and only surrounding whitespace is ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::Contact;

pub const ALL_REGIONS_LABEL: &str = "All Regions";

/// Parsed, deduplicated region selector.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionSelector {
    states: Vec<String>,
}

impl RegionSelector {
    /// Split on `|`, trim, drop empty tokens, keep the first occurrence of
    /// each state.
    pub fn parse(raw: &str) -> Self {
        let mut states: Vec<String> = Vec::new();
        for token in raw.split('|').map(str::trim).filter(|t| !t.is_empty()) {
            if !states.iter().any(|s| s == token) {
                states.push(token.to_string());
            }
        }
        Self { states }
    }

    pub fn states(&self) -> &[String] {
        &self.states
    }

    /// No usable tokens means every contact is targeted.
    pub fn is_all(&self) -> bool {
        self.states.is_empty()
    }

    pub fn location_label(&self) -> String {
        if self.is_all() {
            ALL_REGIONS_LABEL.to_string()
        } else {
            self.states.join(", ")
        }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        if self.is_all() {
            return true;
        }
        let region = contact.region.trim();
        let state = trailing_component(region);
        self.states.iter().any(|s| s == region || s == state)
    }
}

/// `"Kochi, Kerala"` → `"Kerala"`, `"Kerala"` → `"Kerala"`.
fn trailing_component(region: &str) -> &str {
    match region.rsplit_once(',') {
        Some((_, state)) => state.trim(),
        None => region,
    }
}

/// Contacts targeted by a selector, plus the label used in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedTargets {
    pub contacts: Vec<Contact>,
    pub location_label: String,
}

impl ResolvedTargets {
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

/// Resolve `selector` against a directory snapshot.
///
/// The result is ordered by contact id with duplicate ids removed. Never
/// fails: zero matches is a valid outcome.
pub fn resolve(selector: &RegionSelector, directory: &[Contact]) -> ResolvedTargets {
    let mut by_id: BTreeMap<i64, &Contact> = BTreeMap::new();
    for contact in directory.iter().filter(|c| selector.matches(c)) {
        by_id.entry(contact.id).or_insert(contact);
    }

    ResolvedTargets {
        contacts: by_id.into_values().cloned().collect(),
        location_label: selector.location_label(),
    }
}
