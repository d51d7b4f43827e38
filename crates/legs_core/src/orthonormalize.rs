//! Classical Gram-Schmidt over the columns of an n×k tangent basis.

use crate::legs::LegsError;
use nalgebra::DMatrix;

/// Orthogonalizes the columns of `basis` left to right.
///
/// Column 0 keeps its direction; column j has its projections onto the
/// already-orthogonalized columns 0..j removed, in a single pass. With
/// `normalize == false` the surviving column norms are kept, which is what
/// the growth-rate estimate needs.
pub fn gram_schmidt(basis: &DMatrix<f64>, normalize: bool) -> Result<DMatrix<f64>, LegsError> {
    let (mut orthogonal, norms) = orthogonalize_with_norms(basis)?;
    if normalize {
        normalize_columns(&mut orthogonal, &norms);
    }
    Ok(orthogonal)
}

/// Non-normalizing pass that also returns the column norms.
///
/// Fails with [`LegsError::DegenerateDirection`] when a column collapses to
/// (numerically) zero norm or turns non-finite; its logarithm would be
/// undefined.
pub fn orthogonalize_with_norms(
    basis: &DMatrix<f64>,
) -> Result<(DMatrix<f64>, Vec<f64>), LegsError> {
    let mut orthogonal = basis.clone();
    let mut norms = Vec::with_capacity(basis.ncols());
    let mut norms_sq: Vec<f64> = Vec::with_capacity(basis.ncols());

    for j in 0..basis.ncols() {
        let original = basis.column(j);
        let mut column = original.clone_owned();
        for i in 0..j {
            let previous = orthogonal.column(i);
            let coefficient = original.dot(&previous) / norms_sq[i];
            column.axpy(-coefficient, &previous, 1.0);
        }

        let norm = column.norm();
        if !norm.is_finite() || norm <= f64::EPSILON * original.norm() {
            return Err(LegsError::DegenerateDirection { column: j });
        }
        orthogonal.set_column(j, &column);
        norms.push(norm);
        norms_sq.push(norm * norm);
    }

    Ok((orthogonal, norms))
}

/// Scales column j by `1 / norms[j]`.
pub fn normalize_columns(basis: &mut DMatrix<f64>, norms: &[f64]) {
    for (j, norm) in norms.iter().enumerate() {
        basis.column_mut(j).unscale_mut(*norm);
    }
}

/// Largest deviation of `basisᵀ basis` from the identity.
pub fn orthonormality_defect(basis: &DMatrix<f64>) -> f64 {
    let gram = basis.transpose() * basis;
    let identity = DMatrix::<f64>::identity(basis.ncols(), basis.ncols());
    (gram - identity).amax()
}
