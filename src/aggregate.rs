use crate::geocode::GeocodeResolver;
use crate::types::{AggregatedCityRow, GeoPoint, SalesRecord, StateTotal};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type CityKey<'a> = (&'a str, &'a str, &'a str, &'a str);

/// Sums sales per (state, city, postal code, category), in key order.
/// Rows carry no location.
pub fn group_by_city_state<'a, I>(records: I) -> Vec<AggregatedCityRow>
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    let mut groups: BTreeMap<CityKey<'a>, f64> = BTreeMap::new();
    for r in records {
        let key = (r.state.as_str(), r.city.as_str(), r.postal_code.as_str(), r.category.as_str());
        *groups.entry(key).or_insert(0.0) += r.sales;
    }

    groups
        .into_iter()
        .map(|((state, city, postal_code, category), sales)| AggregatedCityRow {
            state: state.to_string(),
            city: city.to_string(),
            postal_code: postal_code.to_string(),
            category: category.to_string(),
            sales,
            location: None,
        })
        .collect()
}

/// City groups with coordinates attached. Codes the resolver cannot place
/// are dropped; each distinct code is looked up once.
pub fn aggregate_by_city_state<'a, I, G>(records: I, resolver: &G) -> Vec<AggregatedCityRow>
where
    I: IntoIterator<Item = &'a SalesRecord>,
    G: GeocodeResolver + ?Sized,
{
    let rows = group_by_city_state(records);

    let mut locations: HashMap<String, Option<GeoPoint>> = HashMap::new();
    for row in &rows {
        if !locations.contains_key(&row.postal_code) {
            locations.insert(row.postal_code.clone(), resolver.resolve(&row.postal_code));
        }
    }

    let total = rows.len();
    let located: Vec<AggregatedCityRow> = rows
        .into_iter()
        .filter_map(|mut row| {
            row.location = locations.get(&row.postal_code).copied().flatten();
            row.location.map(|_| row)
        })
        .collect();

    if located.len() < total {
        debug!(
            "Dropped {} of {} city rows with unresolved postal codes",
            total - located.len(),
            total
        );
    }
    located
}

/// Sales per state, smallest first so a horizontal bar chart puts the
/// largest bar on top. Ties keep state-name order.
///
/// Folded from the city groups so both totals add the same floats in the
/// same order.
pub fn aggregate_by_state<'a, I>(records: I) -> Vec<StateTotal>
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for row in group_by_city_state(records) {
        *totals.entry(row.state).or_insert(0.0) += row.sales;
    }

    let mut totals: Vec<StateTotal> = totals
        .into_iter()
        .map(|(state, sales)| StateTotal { state, sales })
        .collect();
    // stable sort
    totals.sort_by(|a, b| a.sales.total_cmp(&b.sales));
    totals
}
