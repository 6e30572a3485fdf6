use rand::Rng;

use crate::data::Dataset;

/// Draw a bootstrap sample of the same size as `data`
///
/// Each of the `n` draws independently selects a row uniformly, with
/// replacement. Imputed values carried by the source rows are dropped.
pub fn bootstrap<R: Rng + ?Sized>(data: &Dataset, rng: &mut R) -> Dataset {
    let n = data.len();
    let observations = (0..n)
        .map(|_| {
            let mut row = data.observations()[rng.random_range(0..n)].clone();
            row.clear_imputation();
            row
        })
        .collect();
    Dataset::from_validated(observations)
}
