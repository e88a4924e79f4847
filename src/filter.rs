//! Category / region / state selection.
//!
//! The state selector depends on the region selector: only states that have
//! at least one record in a selected region are offered, and the `All`
//! sentinel expands to exactly that set.

use crate::types::SalesRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

pub const EMPTY_STATES_WARNING: &str = "Please select at least one state.";

/// A value of the state multiselect.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum StateSelector {
    /// Expand to every eligible state.
    All,
    Named(String),
}

impl StateSelector {
    /// `label` is the sentinel's display text.
    pub fn parse(value: &str, label: &str) -> Self {
        if value == label {
            StateSelector::All
        } else {
            StateSelector::Named(value.to_string())
        }
    }
}

/// What to do when the state multiselect is left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmptyStatesPolicy {
    /// Treat it as every eligible state and warn.
    #[default]
    AllEligible,
    /// Treat it like any other empty selection.
    Empty,
}

/// One snapshot of the sidebar.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FilterSelection {
    pub categories: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub states: Vec<StateSelector>,
}

impl FilterSelection {
    pub fn new<C, R, S>(categories: C, regions: R, states: S) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
        S: IntoIterator<Item = StateSelector>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
            regions: regions.into_iter().map(Into::into).collect(),
            states: states.into_iter().collect(),
        }
    }

    /// Every category and region checked, states on `All`.
    pub fn everything(records: &[SalesRecord]) -> Self {
        Self::new(
            unique_values(records, |r| &r.category),
            unique_values(records, |r| &r.region),
            [StateSelector::All],
        )
    }
}

/// States after sentinel expansion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedStates {
    pub states: BTreeSet<String>,
    /// Set when the empty-multiselect fallback kicked in.
    pub fell_back: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FilterOutcome<'a> {
    pub records: Vec<&'a SalesRecord>,
    pub states: ResolvedStates,
}

/// Distinct values of one field in first-appearance order.
pub fn unique_values<F>(records: &[SalesRecord], field: F) -> Vec<String>
where
    F: Fn(&SalesRecord) -> &String,
{
    let mut seen = HashSet::new();
    records
        .iter()
        .map(field)
        .filter(|value| seen.insert(value.as_str()))
        .cloned()
        .collect()
}

/// States with at least one record in a selected region, in first-appearance order.
pub fn eligible_states(records: &[SalesRecord], regions: &BTreeSet<String>) -> Vec<String> {
    if regions.is_empty() {
        return Vec::new();
    }
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| regions.contains(&r.region))
        .filter(|r| seen.insert(r.state.as_str()))
        .map(|r| r.state.clone())
        .collect()
}

/// Options for the state multiselect: sentinel first, then eligible states.
pub fn state_options(records: &[SalesRecord], regions: &BTreeSet<String>) -> Vec<StateSelector> {
    let eligible = eligible_states(records, regions);
    if eligible.is_empty() {
        return Vec::new();
    }
    std::iter::once(StateSelector::All)
        .chain(eligible.into_iter().map(StateSelector::Named))
        .collect()
}

/// Expands `All` to the eligible states; otherwise keeps the named states.
pub fn expand_states(
    records: &[SalesRecord],
    regions: &BTreeSet<String>,
    states: &[StateSelector],
) -> BTreeSet<String> {
    if states.contains(&StateSelector::All) {
        return eligible_states(records, regions).into_iter().collect();
    }
    states
        .iter()
        .filter_map(|s| match s {
            StateSelector::Named(name) => Some(name.clone()),
            StateSelector::All => None,
        })
        .collect()
}

/// Applies the empty-multiselect policy, then expands the sentinel.
pub fn resolve_states(
    records: &[SalesRecord],
    selection: &FilterSelection,
    policy: EmptyStatesPolicy,
) -> ResolvedStates {
    if selection.states.is_empty() {
        return match policy {
            EmptyStatesPolicy::AllEligible => {
                warn!("State selection is empty, falling back to all eligible states");
                ResolvedStates {
                    states: eligible_states(records, &selection.regions).into_iter().collect(),
                    fell_back: true,
                }
            }
            EmptyStatesPolicy::Empty => ResolvedStates::default(),
        };
    }

    ResolvedStates {
        states: expand_states(records, &selection.regions, &selection.states),
        fell_back: false,
    }
}

/// Records matching every selector. Any empty selector yields nothing.
pub fn filter<'a>(
    records: &'a [SalesRecord],
    selection: &FilterSelection,
    policy: EmptyStatesPolicy,
) -> FilterOutcome<'a> {
    let states = resolve_states(records, selection, policy);

    if selection.categories.is_empty() || selection.regions.is_empty() || states.states.is_empty() {
        return FilterOutcome { records: Vec::new(), states };
    }

    let matched = records
        .iter()
        .filter(|r| selection.categories.contains(&r.category))
        .filter(|r| states.states.contains(&r.state))
        .filter(|r| selection.regions.contains(&r.region))
        .collect();

    FilterOutcome { records: matched, states }
}
