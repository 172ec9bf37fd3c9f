/*
Pretty printing of identification results as tables.
*/
use crate::identification::regression::RegressionResult;
use crate::identification::tangent_method::TangentMethodResult;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, PartialEq, Tabled)]
pub struct ReportRow {
    quantity: String,
    value: String,
}

impl ReportRow {
    fn new(quantity: &str, value: impl ToString) -> Self {
        ReportRow {
            quantity: quantity.to_string(),
            value: value.to_string(),
        }
    }

    pub fn quantity(&self) -> &str {
        &self.quantity
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

pub fn regression_rows(result: &RegressionResult) -> Vec<ReportRow> {
    let mut rows = vec![ReportRow::new("Model", &result.model_name)];
    rows.extend(
        result
            .params
            .iter()
            .map(|(name, value)| ReportRow::new(&format!("p[\"{}\"]", name), value)),
    );
    rows.push(ReportRow::new("Fitted function", &result.fitted_formula));
    rows.push(ReportRow::new("R^2", format!("{:.6}", result.r_squared)));
    if result.shift > 0.0 {
        rows.push(ReportRow::new("Shift", result.shift));
    }
    rows
}

pub fn tangent_method_rows(result: &TangentMethodResult) -> Vec<ReportRow> {
    let mut rows = vec![
        ReportRow::new(
            "Tangent",
            format!("{}x + {}", result.slope, result.intercept),
        ),
        ReportRow::new("Tu", result.tu),
        ReportRow::new("Tg", result.tg),
        ReportRow::new("Tu/Tg", result.tu_tg_ratio()),
        ReportRow::new("Tg/Tu", result.tg_tu_ratio()),
        ReportRow::new(
            "Inflection point",
            format!(
                "#{} at ({}, {})",
                result.inflection_index, result.inflection.x, result.inflection.y
            ),
        ),
        ReportRow::new("Split point", result.split_point),
        ReportRow::new("Height", result.height),
        ReportRow::new("End time", result.end_time),
    ];
    if result.shift > 0.0 {
        rows.push(ReportRow::new("Shift", result.shift));
    }
    rows
}

fn render(title: &str, rows: &[ReportRow]) -> String {
    let mut table = Table::new(rows);
    table.with(Style::modern_rounded());
    format!("{}\n{}", title, table)
}

pub fn regression_report(result: &RegressionResult) -> String {
    render("Regression", &regression_rows(result))
}

pub fn tangent_method_report(result: &TangentMethodResult) -> String {
    render("Inflectional tangent method", &tangent_method_rows(result))
}
