//! Plain-text tables for listing output.

use std::fmt;

/// A resource that renders as one table row.
pub trait Tabular {
    /// Column headers, in row order.
    fn columns() -> Vec<&'static str>;
    /// Cell values, one per column.
    fn row(&self) -> Vec<String>;
}

/// A fully materialized table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// An empty table with the columns of `T`.
    pub fn for_type<T: Tabular>() -> Self {
        Self {
            columns: T::columns().into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_items<'a, T: Tabular + 'a>(items: impl IntoIterator<Item = &'a T>) -> Self {
        let mut table = Self::for_type::<T>();
        table.rows = items.into_iter().map(Tabular::row).collect();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) {
                    *w = (*w).max(cell.chars().count());
                }
            }
        }
        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();

        let write_line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let line: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, w)| format!("{cell:<w$}"))
                .collect();
            writeln!(f, "{}", line.join("  ").trim_end())
        };

        write_line(f, &self.columns)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("  "))?;
        for row in &self.rows {
            write_line(f, row)?;
        }
        Ok(())
    }
}
