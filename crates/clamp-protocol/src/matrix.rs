//! Condition-matrix string parsing and padding.
//!
//! A condition matrix encodes one value per protocol condition cell. Cells
//! are separated by commas or whitespace, rows by semicolons or newlines.
//! Numeric cells may be ranges `a:b` (step 1) or `a:step:b`, which expand in
//! place to explicit element lists. String matrices use cell splitting only.

use clamp_core::{ClampError, ErrorInfo, Result};

fn split_rows(src: &str) -> Vec<&str> {
    src.split(|c| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .collect()
}

fn split_cells(row: &str) -> Vec<&str> {
    row.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect()
}

fn parse_number(cell: &str) -> Result<f64> {
    cell.parse::<f64>().map_err(|_| {
        ClampError::Parse(
            ErrorInfo::new("condition_cell", "unparseable condition-matrix cell")
                .with_context("cell", cell),
        )
    })
}

fn expand_range(cell: &str, out: &mut Vec<f64>) -> Result<()> {
    let parts: Vec<&str> = cell.split(':').collect();
    let (a, step, b) = match parts.len() {
        2 => (parse_number(parts[0])?, 1.0, parse_number(parts[1])?),
        3 => (
            parse_number(parts[0])?,
            parse_number(parts[1])?,
            parse_number(parts[2])?,
        ),
        _ => {
            return Err(ClampError::Parse(
                ErrorInfo::new("condition_range", "malformed range cell").with_context("cell", cell),
            ))
        }
    };
    if step == 0.0 {
        return Err(ClampError::Parse(
            ErrorInfo::new("condition_range", "range step must be non-zero")
                .with_context("cell", cell),
        ));
    }
    let tolerance = step.abs() * 1e-9;
    let mut k = 0usize;
    loop {
        let value = a + k as f64 * step;
        let past_end = if step > 0.0 {
            value > b + tolerance
        } else {
            value < b - tolerance
        };
        if past_end {
            break;
        }
        out.push(value);
        k += 1;
    }
    Ok(())
}

/// Parses a numeric condition matrix, expanding range cells.
pub fn parse_numeric_matrix(src: &str) -> Result<Vec<Vec<f64>>> {
    let mut matrix = Vec::new();
    for row in split_rows(src) {
        let mut values = Vec::new();
        for cell in split_cells(row) {
            if cell.contains(':') {
                expand_range(cell, &mut values)?;
            } else {
                values.push(parse_number(cell)?);
            }
        }
        matrix.push(values);
    }
    Ok(matrix)
}

/// Parses a string condition matrix (expressions); no range expansion.
pub fn parse_string_matrix(src: &str) -> Vec<Vec<String>> {
    split_rows(src)
        .into_iter()
        .map(|row| split_cells(row).into_iter().map(str::to_string).collect())
        .collect()
}

/// Grows `rows`/`cols` to cover the matrix dimensions.
pub fn mat_lims<T>(matrix: &[Vec<T>], rows: &mut usize, cols: &mut usize) {
    *rows = (*rows).max(matrix.len());
    for row in matrix {
        *cols = (*cols).max(row.len());
    }
}

/// Pads a matrix out to `rows × cols` with the provided default.
pub fn pad_matrix<T: Clone>(matrix: &mut Vec<Vec<T>>, rows: usize, cols: usize, default: T) {
    matrix.resize(rows, Vec::new());
    for row in matrix.iter_mut() {
        row.resize(cols, default.clone());
    }
}
