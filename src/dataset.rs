//! Training table loading and row partitioning.

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Numeric table with one row per project and uniquely named columns.
///
/// Column order is the order of the source file and is significant: the
/// feature selector's keep-first rules depend on it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    data: Array2<f64>,
}

impl FeatureTable {
    /// Build a table from named columns of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let n_rows = columns.first().map(|(_, values)| values.len()).unwrap_or(0);

        let mut seen = HashSet::new();
        for (name, values) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::Data(format!("duplicate column '{}'", name)));
            }
            if values.len() != n_rows {
                return Err(PipelineError::Data(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    values.len(),
                    n_rows
                )));
            }
        }

        let data = Array2::from_shape_fn((n_rows, columns.len()), |(r, c)| columns[c].1[r]);
        Ok(Self {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            data,
        })
    }

    /// Convert a DataFrame, keeping numeric columns not listed in `excluded`.
    ///
    /// Nulls read as 0.
    pub fn from_dataframe(df: &DataFrame, excluded: &[String]) -> Result<Self> {
        let mut columns = Vec::new();
        let mut dropped = Vec::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            if excluded.contains(&name) {
                dropped.push(name);
                continue;
            }
            match column.dtype() {
                DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64 => {
                    let casted = column
                        .cast(&DataType::Float64)
                        .map_err(|e| PipelineError::Data(e.to_string()))?;
                    let values: Vec<f64> = casted
                        .f64()
                        .map_err(|e| PipelineError::Data(e.to_string()))?
                        .into_iter()
                        .map(|v| v.unwrap_or(0.0))
                        .collect();
                    columns.push((name, values));
                }
                _ => dropped.push(name),
            }
        }

        if !dropped.is_empty() {
            debug!(columns = ?dropped, "Dropped non-feature columns");
        }

        Self::from_columns(columns)
    }

    /// Load a CSV file with a header row.
    pub fn from_csv<P: AsRef<Path>>(path: P, excluded: &[String]) -> Result<Self> {
        let path = path.as_ref();
        let df = CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .and_then(|reader| reader.finish())
            .map_err(|e| PipelineError::Data(format!("{}: {}", path.display(), e)))?;

        let table = Self::from_dataframe(&df, excluded)?;
        info!(
            path = %path.display(),
            rows = table.n_rows(),
            columns = table.n_columns(),
            "Loaded feature table"
        );
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name).map(|idx| self.data.column(idx))
    }

    /// Owned copy of one column.
    pub fn target(&self, name: &str) -> Result<Array1<f64>> {
        self.column(name)
            .map(|c| c.to_owned())
            .ok_or_else(|| PipelineError::Data(format!("missing target column '{}'", name)))
    }

    /// Matrix of the named columns, in the given order.
    pub fn matrix(&self, names: &[String]) -> Result<Array2<f64>> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| PipelineError::Data(format!("missing column '{}'", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Array2::from_shape_fn((self.n_rows(), indices.len()), |(r, c)| {
            self.data[[r, indices[c]]]
        }))
    }
}

/// Row indices of a train/test partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Shuffle `n_rows` indices with `seed` and hold out `ceil(n * test_size)` of them.
///
/// At least one row lands on each side when there are two or more rows.
pub fn train_test_split(n_rows: usize, test_size: f64, seed: u64) -> Split {
    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut n_test = (n_rows as f64 * test_size.clamp(0.0, 1.0)).ceil() as usize;
    if n_rows >= 2 {
        n_test = n_test.clamp(1, n_rows - 1);
    } else {
        n_test = 0;
    }

    let train = indices.split_off(n_test);
    Split {
        train,
        test: indices,
    }
}

/// Partition shuffled row indices into `k` folds of near-equal size.
///
/// Each returned split uses one fold as its test rows.
pub fn k_fold(n_rows: usize, k: usize, seed: u64) -> Vec<Split> {
    if k < 2 || n_rows < k {
        return Vec::new();
    }

    let mut indices: Vec<usize> = (0..n_rows).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let base = n_rows / k;
    let extra = n_rows % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        folds.push(indices[start..start + size].to_vec());
        start += size;
    }

    (0..k)
        .map(|i| Split {
            test: folds[i].clone(),
            train: folds
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .flat_map(|(_, f)| f.iter().copied())
                .collect(),
        })
        .collect()
}

/// Rows of a matrix, in the given order.
pub fn take_rows(x: &Array2<f64>, rows: &[usize]) -> Array2<f64> {
    x.select(ndarray::Axis(0), rows)
}

/// Entries of a vector, in the given order.
pub fn take_values(y: &Array1<f64>, rows: &[usize]) -> Array1<f64> {
    y.select(ndarray::Axis(0), rows)
}
