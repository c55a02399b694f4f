use crate::error::{FsegError, Result, Stage};
use crate::types::FeatureMatrix;
use log::debug;
use nalgebra::DMatrix;

/// Singular values below `RANK_TOLERANCE × σ_max` count as zero.
const RANK_TOLERANCE: f64 = 1e-10;

/// Least-squares projector `(ZᵀZ)⁻¹ Zᵀ` for templates `z` (`dim × k`, one
/// template per column).
///
/// Fails with [`FsegError::SingularMatrix`] when the templates are linearly
/// dependent.
pub fn template_coefficients(z: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let k = z.ncols();
    if k == 0 || z.nrows() < k {
        return Err(FsegError::invalid(
            Stage::Regression,
            format!("{} templates of dimension {}", k, z.nrows()),
        ));
    }
    let normal = z.transpose() * z;
    let singular = normal.clone().singular_values();
    let largest = singular.iter().copied().fold(0.0, f64::max);
    let rank = singular
        .iter()
        .filter(|&&s| largest > 0.0 && s > RANK_TOLERANCE * largest)
        .count();
    if rank < k {
        return Err(FsegError::SingularMatrix {
            stage: Stage::Regression,
            rank,
            size: k,
        });
    }
    let inverse = normal.try_inverse().ok_or(FsegError::SingularMatrix {
        stage: Stage::Regression,
        rank,
        size: k,
    })?;
    Ok(inverse * z.transpose())
}

/// Index of the first largest entry.
pub(crate) fn first_argmax<'a>(values: impl IntoIterator<Item = &'a f64>) -> usize {
    let mut best = 0;
    let mut best_val = f64::NEG_INFINITY;
    for (i, &v) in values.into_iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Label each pixel of `features` with the template whose least-squares
/// coefficient is largest.
pub fn regression_labels<F: FeatureMatrix>(z: &DMatrix<f64>, features: &F) -> Result<Vec<u32>> {
    if z.nrows() != features.dim() {
        return Err(FsegError::invalid(
            Stage::Regression,
            format!(
                "templates have dimension {}, features have {}",
                z.nrows(),
                features.dim()
            ),
        ));
    }
    let coefficients = template_coefficients(z)?;
    let dim = features.dim();
    let k = coefficients.nrows();
    debug!(
        "regression_labels pixels={} dim={} templates={}",
        features.len(),
        dim,
        k
    );

    let label = |column: &mut Vec<f64>, scores: &mut Vec<f64>, idx: usize| -> u32 {
        features.column_into(idx, column);
        for (r, s) in scores.iter_mut().enumerate() {
            *s = coefficients
                .row(r)
                .iter()
                .zip(column.iter())
                .map(|(a, b)| a * b)
                .sum();
        }
        first_argmax(scores.iter()) as u32
    };

    #[cfg(feature = "parallel")]
    let labels = {
        use rayon::prelude::*;
        (0..features.len())
            .into_par_iter()
            .map_init(
                || (vec![0.0f64; dim], vec![0.0f64; k]),
                |(column, scores), idx| label(column, scores, idx),
            )
            .collect()
    };
    #[cfg(not(feature = "parallel"))]
    let labels = {
        let mut column = vec![0.0f64; dim];
        let mut scores = vec![0.0f64; k];
        (0..features.len())
            .map(|idx| label(&mut column, &mut scores, idx))
            .collect()
    };
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ProjectedFeatures;

    #[test]
    fn coefficients_invert_the_templates() {
        let z = DMatrix::from_column_slice(3, 2, &[1.0, 0.0, 1.0, 0.0, 2.0, 0.0]);
        let c = template_coefficients(&z).unwrap();
        let identity = &c * &z;
        assert!((identity - DMatrix::<f64>::identity(2, 2)).norm() < 1e-12);
    }

    #[test]
    fn dependent_templates_are_singular() {
        let z = DMatrix::from_column_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        match template_coefficients(&z) {
            Err(FsegError::SingularMatrix { rank, size, .. }) => {
                assert_eq!(rank, 1);
                assert_eq!(size, 2);
            }
            other => panic!("expected singular matrix, got {other:?}"),
        }
    }

    #[test]
    fn labels_follow_the_dominant_template() {
        let z = DMatrix::from_column_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let pts = DMatrix::from_column_slice(2, 3, &[0.9, 0.1, 0.2, 0.8, 0.5, 0.5]);
        let f = ProjectedFeatures::from_matrix(3, 1, pts).unwrap();
        // the tie in the last column resolves to the first template
        assert_eq!(regression_labels(&z, &f).unwrap(), vec![0, 1, 0]);
    }
}
