//! Small dense linear systems.
//!
//! Sizes are bounded by the engine's channel limit, so everything lives in
//! fixed stack arrays and nothing allocates.

/// Largest system handled by [`solve_dense`] and [`least_squares`].
pub const MAX_DIM: usize = 16;

/// Solves the `n x n` system `a * x = b` in place with partial pivoting.
///
/// `a` is row-major; on success `b` holds `x`. Returns `false` when the
/// matrix is singular (a pivot smaller than `1e-14`).
pub fn solve_dense(a: &mut [[f64; MAX_DIM]; MAX_DIM], b: &mut [f64; MAX_DIM], n: usize) -> bool {
    debug_assert!(n <= MAX_DIM);

    for col in 0..n {
        // Pivot
        let mut piv = col;
        for row in col + 1..n {
            if a[row][col].abs() > a[piv][col].abs() {
                piv = row;
            }
        }
        if a[piv][col].abs() < 1.0e-14 {
            return false;
        }
        if piv != col {
            a.swap(piv, col);
            b.swap(piv, col);
        }

        for row in col + 1..n {
            let f = a[row][col] / a[col][col];
            if f == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= f * a[col][k];
            }
            b[row] -= f * b[col];
        }
    }

    // Back substitution
    for col in (0..n).rev() {
        let mut s = b[col];
        for k in col + 1..n {
            s -= a[col][k] * b[k];
        }
        b[col] = s / a[col][col];
    }
    true
}

/// Solves `min |j * x - r|` for an `m x n` Jacobian `j` (row-major).
///
/// Uses the normal equations with a tiny ridge term so rank-deficient
/// systems still produce a step. Returns `None` if even that fails.
pub fn least_squares(
    j: &[[f64; MAX_DIM]; MAX_DIM],
    r: &[f64; MAX_DIM],
    m: usize,
    n: usize,
) -> Option<[f64; MAX_DIM]> {
    let mut jtj = [[0.0f64; MAX_DIM]; MAX_DIM];
    let mut jtr = [0.0f64; MAX_DIM];

    for a in 0..n {
        for b in 0..n {
            jtj[a][b] = (0..m).map(|k| j[k][a] * j[k][b]).sum();
        }
        jtr[a] = (0..m).map(|k| j[k][a] * r[k]).sum();
        jtj[a][a] += 1.0e-12;
    }

    solve_dense(&mut jtj, &mut jtr, n).then_some(jtr)
}
