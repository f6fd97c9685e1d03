//! Plain-text rendering of integer matrices.

use std::fmt::Write;

use ndarray::Array2;

/// Render `matrix` as right-aligned columns, one row per line.
pub fn render_matrix(matrix: &Array2<i32>) -> String {
    let width = matrix
        .iter()
        .map(|v| v.to_string().len())
        .max()
        .unwrap_or(1);

    let mut out = String::new();
    for row in matrix.outer_iter() {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>width$}", v, width = width)).collect();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{}", cells.join(" "));
    }
    out
}
