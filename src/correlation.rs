use crate::types::SalesRecord;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    Sales,
    Profit,
    Discount,
}

impl Measure {
    pub const ALL: [Measure; 3] = [Measure::Sales, Measure::Profit, Measure::Discount];

    pub fn label(self) -> &'static str {
        match self {
            Measure::Sales => "Sales",
            Measure::Profit => "Profit",
            Measure::Discount => "Discount",
        }
    }

    fn value(self, record: &SalesRecord) -> f64 {
        match self {
            Measure::Sales => record.sales,
            Measure::Profit => record.profit,
            Measure::Discount => record.discount,
        }
    }
}

/// Pearson coefficients between every pair of measures. Undefined entries
/// are NaN (serialized as `null`).
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub labels: [Measure; 3],
    pub values: [[f64; 3]; 3],
}

impl CorrelationMatrix {
    pub fn undefined() -> Self {
        Self {
            labels: Measure::ALL,
            values: [[f64::NAN; 3]; 3],
        }
    }

    #[cfg(test)]
    pub fn get(&self, row: Measure, col: Measure) -> f64 {
        let index = |m: Measure| self.labels.iter().position(|l| *l == m).unwrap_or(0);
        self.values[index(row)][index(col)]
    }

    pub fn is_defined(&self) -> bool {
        self.values.iter().flatten().any(|v| !v.is_nan())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SalesProfitCorrelation {
    NoData,
    Coefficient(f64),
}

impl fmt::Display for SalesProfitCorrelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SalesProfitCorrelation::Coefficient(r) => write!(
                f,
                "Correlation between sales and profit for the selected categories: {:.2}",
                r
            ),
            SalesProfitCorrelation::NoData => write!(
                f,
                "No category selected or no data available for the selected categories."
            ),
        }
    }
}

/// Pearson correlation. NaN with fewer than two samples or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return f64::NAN;
    }
    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return f64::NAN;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

pub fn correlate<'a, I>(records: I) -> CorrelationMatrix
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    let mut columns: [Vec<f64>; 3] = Default::default();
    for r in records {
        for (column, measure) in columns.iter_mut().zip(Measure::ALL) {
            column.push(measure.value(r));
        }
    }
    if columns[0].is_empty() {
        return CorrelationMatrix::undefined();
    }

    let mut matrix = CorrelationMatrix::undefined();
    for i in 0..3 {
        for j in i..3 {
            let r = pearson(&columns[i], &columns[j]);
            matrix.values[i][j] = r;
            matrix.values[j][i] = r;
        }
    }
    matrix
}

pub fn sales_profit_correlation<'a, I>(records: I) -> SalesProfitCorrelation
where
    I: IntoIterator<Item = &'a SalesRecord>,
{
    let (sales, profit): (Vec<f64>, Vec<f64>) = records.into_iter().map(|r| (r.sales, r.profit)).unzip();
    if sales.is_empty() {
        return SalesProfitCorrelation::NoData;
    }
    SalesProfitCorrelation::Coefficient(pearson(&sales, &profit))
}
