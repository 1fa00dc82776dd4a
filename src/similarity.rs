//! Vector primitives shared by the self-similarity and repetition stages.

/// Dense row-major matrix.
pub type Matrix = Vec<Vec<f64>>;

/// Euclidean norm of a vector.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Euclidean distance between two equal-length vectors.
pub fn euclidean_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Scale every row to unit length: `row / (‖row‖ + eps)`.
/// A zero row stays zero instead of dividing by zero.
pub fn normalize_rows(rows: &[Vec<f64>], eps: f64) -> Matrix {
    rows.iter()
        .map(|row| {
            let norm = l2_norm(row) + eps;
            row.iter().map(|x| x / norm).collect()
        })
        .collect()
}

/// Pairwise dot products of all rows (`X · Xᵀ`).
/// Only the upper triangle is computed; the lower one is mirrored so the
/// result is exactly symmetric.
pub fn gram_matrix(rows: &[Vec<f64>]) -> Matrix {
    let n = rows.len();
    let mut out = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in i..n {
            let dot: f64 = rows[i].iter().zip(&rows[j]).map(|(a, b)| a * b).sum();
            out[i][j] = dot;
            out[j][i] = dot;
        }
    }
    out
}

/// Per-column mean and population standard deviation.
pub fn column_stats(rows: &[Vec<f64>], dim: usize) -> (Vec<f64>, Vec<f64>) {
    let n = rows.len();
    if n == 0 {
        return (vec![0.0; dim], vec![0.0; dim]);
    }

    let mut means = vec![0.0_f64; dim];
    let mut vars = vec![0.0_f64; dim];

    for row in rows {
        for (d, &val) in row.iter().enumerate() {
            means[d] += val;
        }
    }
    for m in &mut means {
        *m /= n as f64;
    }

    for row in rows {
        for (d, &val) in row.iter().enumerate() {
            let diff = val - means[d];
            vars[d] += diff * diff;
        }
    }
    let stds = vars.iter().map(|v| (v / n as f64).sqrt()).collect();

    (means, stds)
}

/// Z-score every column: `(val - mean) / (std + eps)`.
pub fn standardize(rows: &[Vec<f64>], means: &[f64], stds: &[f64], eps: f64) -> Matrix {
    rows.iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(d, &val)| (val - means[d]) / (stds[d] + eps))
                .collect()
        })
        .collect()
}

/// Cosine similarity of every pair of rows, with `eps` added to each norm.
pub fn cosine_matrix(rows: &[Vec<f64>], eps: f64) -> Matrix {
    gram_matrix(&normalize_rows(rows, eps))
}
