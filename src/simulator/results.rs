use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};

use crate::error::AftImputeError;
use crate::imputation::{PooledEstimate, ReplicateEstimate};

/// Coefficient and variance estimates of one method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub method: String,
    pub b1: f64,
    pub b2: f64,
    pub var_b1: f64,
    pub var_b2: f64,
}

impl ResultRow {
    pub fn from_fit(method: impl Into<String>, estimate: &ReplicateEstimate) -> Self {
        Self {
            method: method.into(),
            b1: estimate.b1,
            b2: estimate.b2,
            var_b1: estimate.var_b1,
            var_b2: estimate.var_b2,
        }
    }

    pub fn from_pooled(method: impl Into<String>, pooled: &PooledEstimate) -> Self {
        Self {
            method: method.into(),
            b1: pooled.b1.estimate,
            b2: pooled.b2.estimate,
            var_b1: pooled.b1.variance,
            var_b2: pooled.b2.variance,
        }
    }
}

/// One row per estimation method, in the order the methods ran
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTable {
    rows: Vec<ResultRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    pub fn push(&mut self, row: ResultRow) {
        self.rows.push(row);
    }

    /// The row of a method by name
    pub fn row(&self, method: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|row| row.method == method)
    }

    /// Write the table as CSV with a `method,b1,b2,var_b1,var_b2` header
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), AftImputeError> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row).map_err(csv_error)?;
        }
        writer
            .flush()
            .map_err(|e| AftImputeError::Output(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, AftImputeError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AftImputeError::Output(e.to_string()))
    }
}

fn csv_error(e: csv::Error) -> AftImputeError {
    AftImputeError::Output(e.to_string())
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<20} {:>10} {:>10} {:>10} {:>10}",
            "method", "b1", "b2", "V(b1)", "V(b2)"
        )?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<20} {:>10.4} {:>10.4} {:>10.5} {:>10.5}",
                row.method, row.b1, row.b2, row.var_b1, row.var_b2
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ResultTable {
        ResultTable::new(vec![
            ResultRow {
                method: "complete-case".to_string(),
                b1: 0.71,
                b2: 0.98,
                var_b1: 0.004,
                var_b2: 0.003,
            },
            ResultRow {
                method: "multiple-imputation".to_string(),
                b1: 0.69,
                b2: 1.01,
                var_b1: 0.003,
                var_b2: 0.002,
            },
        ])
    }

    #[test]
    fn csv_has_header_and_rows() {
        let mut buffer = Vec::new();
        table().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "method,b1,b2,var_b1,var_b2");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("multiple-imputation,0.69,1.01"));
    }

    #[test]
    fn json_round_trips() {
        let table = table();
        let decoded: ResultTable = serde_json::from_str(&table.to_json().unwrap()).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn lookup_by_method() {
        assert_eq!(table().row("complete-case").map(|r| r.b1), Some(0.71));
        assert!(table().row("unknown").is_none());
    }
}
