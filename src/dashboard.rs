//! One recompute cycle: selection in, everything the charts need out.

use crate::aggregate::{aggregate_by_city_state, aggregate_by_state};
use crate::correlation::{correlate, sales_profit_correlation, CorrelationMatrix, SalesProfitCorrelation};
use crate::data::Dataset;
use crate::filter::{self, EmptyStatesPolicy, FilterSelection, StateSelector, EMPTY_STATES_WARNING};
use crate::geocode::GeocodeResolver;
use crate::types::{AggregatedCityRow, SalesRecord, StateTotal};
use serde::Serialize;

/// Values the sidebar may offer for the current selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectorOptions {
    pub categories: Vec<String>,
    pub regions: Vec<String>,
    pub states: Vec<StateSelector>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub options: SelectorOptions,
    pub selection: FilterSelection,
    /// States actually applied after expansion and fallback.
    pub applied_states: Vec<String>,
    pub warnings: Vec<String>,
    pub map: Vec<AggregatedCityRow>,
    pub state_totals: Vec<StateTotal>,
    pub scatter: Vec<SalesRecord>,
    pub correlation: CorrelationMatrix,
    pub sales_profit: SalesProfitCorrelation,
    pub summary: String,
}

impl Dashboard {
    pub fn has_data(&self) -> bool {
        !self.scatter.is_empty()
    }
}

pub fn render<G>(
    dataset: &Dataset,
    selection: &FilterSelection,
    resolver: &G,
    policy: EmptyStatesPolicy,
) -> Dashboard
where
    G: GeocodeResolver + ?Sized,
{
    let records = &dataset.records;
    let options = SelectorOptions {
        categories: dataset.categories(),
        regions: dataset.regions(),
        states: filter::state_options(records, &selection.regions),
    };

    let outcome = filter::filter(records, selection, policy);
    let mut warnings = Vec::new();
    if outcome.states.fell_back {
        warnings.push(EMPTY_STATES_WARNING.to_string());
    }

    let filtered = &outcome.records;
    let sales_profit = sales_profit_correlation(filtered.iter().copied());

    Dashboard {
        options,
        selection: selection.clone(),
        applied_states: outcome.states.states.iter().cloned().collect(),
        warnings,
        map: aggregate_by_city_state(filtered.iter().copied(), resolver),
        state_totals: aggregate_by_state(filtered.iter().copied()),
        scatter: filtered.iter().map(|r| (*r).clone()).collect(),
        correlation: correlate(filtered.iter().copied()),
        sales_profit,
        summary: sales_profit.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::tests::record;
    use crate::types::GeoPoint;
    use std::collections::HashMap;

    fn dataset() -> Dataset {
        let mut records = vec![
            record("Furniture", "East", "NY", 100.0, 10.0),
            record("Tech", "West", "CA", 200.0, 50.0),
            record("Tech", "East", "PA", 20.0, 1.0),
        ];
        records[1].postal_code = "90001".to_string();
        records[2].postal_code = "19104".to_string();
        Dataset::new(records)
    }

    fn resolver() -> HashMap<String, GeoPoint> {
        HashMap::from([
            ("10001".to_string(), GeoPoint::new(40.75, -73.99)),
            ("90001".to_string(), GeoPoint::new(33.97, -118.24)),
        ])
    }

    #[test]
    fn default_selection_uses_everything() {
        let dataset = dataset();
        let selection = FilterSelection::everything(&dataset.records);
        let dashboard = render(&dataset, &selection, &resolver(), EmptyStatesPolicy::AllEligible);

        assert_eq!(dashboard.options.categories, vec!["Furniture", "Tech"]);
        assert_eq!(dashboard.options.states[0], StateSelector::All);
        assert_eq!(dashboard.options.states.len(), 4);
        assert_eq!(dashboard.applied_states, vec!["CA", "NY", "PA"]);
        assert_eq!(dashboard.scatter.len(), 3);
        // PA has no coordinates
        assert_eq!(dashboard.map.len(), 2);
        assert_eq!(dashboard.state_totals.last().unwrap().state, "CA");
        assert!(dashboard.warnings.is_empty());
        assert!(matches!(dashboard.sales_profit, SalesProfitCorrelation::Coefficient(_)));
        assert!(dashboard.correlation.is_defined());
    }

    #[test]
    fn example_selection() {
        let dataset = dataset();
        let selection = FilterSelection::new(
            ["Furniture"],
            ["East"],
            [StateSelector::Named("NY".to_string())],
        );
        let dashboard = render(&dataset, &selection, &resolver(), EmptyStatesPolicy::AllEligible);
        assert_eq!(dashboard.scatter, vec![dataset.records[0].clone()]);
        assert_eq!(
            dashboard.state_totals,
            vec![StateTotal { state: "NY".to_string(), sales: 100.0 }]
        );
        assert_eq!(dashboard.options.states.len(), 3);
    }

    #[test]
    fn nothing_selected_denotes_no_data() {
        let dataset = dataset();
        let selection = FilterSelection::default();
        let dashboard = render(&dataset, &selection, &resolver(), EmptyStatesPolicy::AllEligible);

        assert!(!dashboard.has_data());
        assert!(dashboard.map.is_empty());
        assert!(dashboard.state_totals.is_empty());
        assert!(dashboard.options.states.is_empty());
        assert_eq!(dashboard.sales_profit, SalesProfitCorrelation::NoData);
        assert!(!dashboard.correlation.is_defined());
        assert!(dashboard.summary.starts_with("No category selected"));
    }

    #[test]
    fn deselected_region_drops_its_states_from_options() {
        let dataset = dataset();
        let selection = FilterSelection::new(
            ["Tech"],
            ["East"],
            [StateSelector::Named("CA".to_string())],
        );
        let dashboard = render(&dataset, &selection, &resolver(), EmptyStatesPolicy::AllEligible);
        assert!(!dashboard.options.states.contains(&StateSelector::Named("CA".to_string())));
        assert!(dashboard.scatter.is_empty());
        assert!(dashboard.warnings.is_empty());
    }

    #[test]
    fn empty_state_selection_warns() {
        let dataset = dataset();
        let selection = FilterSelection::new(["Tech"], ["East", "West"], Vec::new());
        let dashboard = render(&dataset, &selection, &resolver(), EmptyStatesPolicy::AllEligible);
        assert_eq!(dashboard.warnings, vec![EMPTY_STATES_WARNING.to_string()]);
        assert_eq!(dashboard.scatter.len(), 2);
    }
}
