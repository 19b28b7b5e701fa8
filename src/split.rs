use crate::error::LedgerError;

/// Equal share of `amount` for each of the `participants`, at full precision.
///
/// Round with [`round_to_2_decimals`] only when displaying the value; sums
/// must be done on the unrounded share.
pub fn split_amount<T>(amount: f64, participants: &[T]) -> Result<f64, LedgerError> {
    if participants.is_empty() {
        return Err(LedgerError::EmptySplit);
    }
    Ok(amount / participants.len() as f64)
}

pub fn round_to_2_decimals(n: f64) -> f64 {
    let rounded = (n * 100.0).round() / 100.0;
    // Avoid showing "-0" for tiny negative residues
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
