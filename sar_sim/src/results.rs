//! Result tables: dense α × λ × iteration × time arrays with CSV persistence.
//!
//! The CSV layout is one row per value with header
//! `alpha,lambda,iteration,time,value`, rows in row-major order (α outermost,
//! time innermost). Reading only trusts the `value` column and rebuilds the
//! array from the expected shape.

use crate::error::SimError;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// CSV header of every result file.
pub const CSV_HEADER: &str = "alpha,lambda,iteration,time,value";

/// One observable over a full parameter sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    alphas: Vec<f64>,
    lambdas: Vec<f64>,
    iterations: usize,
    time_len: usize,
    values: Vec<f64>,
}

impl ResultTable {
    /// Zero-filled table.
    pub fn zeros(alphas: Vec<f64>, lambdas: Vec<f64>, iterations: usize, time_len: usize) -> Self {
        let len = alphas.len() * lambdas.len() * iterations * time_len;
        Self {
            alphas,
            lambdas,
            iterations,
            time_len,
            values: vec![0.0; len],
        }
    }

    /// Wraps row-major values; fails with `ShapeMismatch` on a size mismatch.
    pub fn from_values(
        alphas: Vec<f64>,
        lambdas: Vec<f64>,
        iterations: usize,
        time_len: usize,
        values: Vec<f64>,
    ) -> Result<Self, SimError> {
        let expected = alphas.len() * lambdas.len() * iterations * time_len;
        if values.len() != expected {
            return Err(SimError::shape(expected, values.len()));
        }
        Ok(Self {
            alphas,
            lambdas,
            iterations,
            time_len,
            values,
        })
    }

    /// `[alpha, lambda, iteration, time]` extents.
    pub fn shape(&self) -> [usize; 4] {
        [self.alphas.len(), self.lambdas.len(), self.iterations, self.time_len]
    }

    pub fn alphas(&self) -> &[f64] {
        &self.alphas
    }

    pub fn lambdas(&self) -> &[f64] {
        &self.lambdas
    }

    /// Flat row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn offset(&self, alpha: usize, lambda: usize, iteration: usize) -> usize {
        ((alpha * self.lambdas.len() + lambda) * self.iterations + iteration) * self.time_len
    }

    pub fn get(&self, alpha: usize, lambda: usize, iteration: usize, time: usize) -> f64 {
        self.values[self.offset(alpha, lambda, iteration) + time]
    }

    /// Time series of one (α, λ, iteration) cell.
    pub fn series(&self, alpha: usize, lambda: usize, iteration: usize) -> &[f64] {
        let start = self.offset(alpha, lambda, iteration);
        &self.values[start..start + self.time_len]
    }

    pub fn series_mut(&mut self, alpha: usize, lambda: usize, iteration: usize) -> &mut [f64] {
        let start = self.offset(alpha, lambda, iteration);
        &mut self.values[start..start + self.time_len]
    }

    /// Mean over iterations of one (α, λ) cell.
    pub fn mean_series(&self, alpha: usize, lambda: usize) -> Vec<f64> {
        let mut mean = vec![0.0; self.time_len];
        if self.iterations == 0 {
            return mean;
        }
        for it in 0..self.iterations {
            for (m, v) in mean.iter_mut().zip(self.series(alpha, lambda, it)) {
                *m += v;
            }
        }
        for m in &mut mean {
            *m /= self.iterations as f64;
        }
        mean
    }

    /// Writes the table as CSV.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), SimError> {
        let mut out = BufWriter::new(writer);
        writeln!(out, "{}", CSV_HEADER)?;

        let mut values = self.values.iter();
        for &alpha in &self.alphas {
            for &lambda in &self.lambdas {
                for iteration in 0..self.iterations {
                    for time in 0..self.time_len {
                        let value = values.next().copied().unwrap_or_default();
                        writeln!(out, "{},{},{},{},{}", alpha, lambda, iteration, time, value)?;
                    }
                }
            }
        }

        out.flush()?;
        Ok(())
    }

    /// Writes the table to `path`, creating or truncating it.
    pub fn write_csv_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let path = path.as_ref();
        self.write_csv(File::create(path)?)?;
        debug!("Wrote {} values to {}", self.values.len(), path.display());
        Ok(())
    }

    /// Rebuilds a table of the given shape from CSV.
    ///
    /// # Errors
    /// * `Parse` - missing header, short row or unparsable value
    /// * `ShapeMismatch` - row count differs from the product of the extents
    pub fn read_csv<R: BufRead>(
        reader: R,
        alphas: Vec<f64>,
        lambdas: Vec<f64>,
        iterations: usize,
        time_len: usize,
    ) -> Result<Self, SimError> {
        let mut lines = reader.lines();
        match lines.next() {
            Some(header) => {
                let header = header?;
                if header.trim() != CSV_HEADER {
                    return Err(SimError::parse(1, format!("unexpected header `{}`", header.trim())));
                }
            }
            None => return Err(SimError::parse(1, "empty file")),
        }

        let mut values = Vec::new();
        for (i, line) in lines.enumerate() {
            let line = line?;
            let line_no = i + 2;
            if line.trim().is_empty() {
                continue;
            }
            let field = line
                .split(',')
                .nth(4)
                .ok_or_else(|| SimError::parse(line_no, "expected 5 columns"))?;
            let value = field
                .trim()
                .parse::<f64>()
                .map_err(|e| SimError::parse(line_no, format!("bad value `{}`: {}", field.trim(), e)))?;
            values.push(value);
        }

        Self::from_values(alphas, lambdas, iterations, time_len, values)
    }

    /// Reads a table from `path`.
    pub fn read_csv_file(
        path: impl AsRef<Path>,
        alphas: Vec<f64>,
        lambdas: Vec<f64>,
        iterations: usize,
        time_len: usize,
    ) -> Result<Self, SimError> {
        let file = File::open(path)?;
        Self::read_csv(BufReader::new(file), alphas, lambdas, iterations, time_len)
    }
}

/// Shifts `series` so its first maximum lands on `ref_index`.
///
/// A right shift fills the vacated front with zeros; a left shift fills the
/// vacated tail with the series' last value.
pub fn align_to_max(series: &[f64], ref_index: usize) -> Result<Vec<f64>, SimError> {
    let len = series.len();
    if ref_index >= len {
        return Err(SimError::invalid(format!(
            "reference index {} outside series of length {}",
            ref_index, len
        )));
    }

    let peak = series
        .iter()
        .enumerate()
        .fold(0, |best, (i, &v)| if v > series[best] { i } else { best });

    let mut aligned = vec![0.0; len];
    if ref_index >= peak {
        let shift = ref_index - peak;
        aligned[shift..].copy_from_slice(&series[..len - shift]);
    } else {
        let shift = peak - ref_index;
        aligned[..len - shift].copy_from_slice(&series[shift..]);
        let last = series[len - 1];
        for v in &mut aligned[len - shift..] {
            *v = last;
        }
    }

    Ok(aligned)
}
