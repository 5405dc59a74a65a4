//! Sequence shaping between the tokenizer and the encoder.

use crate::vocab::SEPARATOR_ID;
use ndarray::{Array1, Array2, Array3};

/// Place `item` between every element of `ids` and at both ends.
///
/// The result has length `2 * ids.len() + 1`; odd positions hold `ids` in
/// order.
pub fn intersperse(ids: &[i64], item: i64) -> Vec<i64> {
    let mut result = vec![item; ids.len() * 2 + 1];
    for (i, &id) in ids.iter().enumerate() {
        result[i * 2 + 1] = id;
    }
    result
}

/// Right-pad sequences with the separator to the longest one.
///
/// Returns the `[batch, max_len]` token array and the original lengths.
pub fn pad_batch(sequences: &[Vec<i64>]) -> (Array2<i64>, Vec<usize>) {
    let lengths: Vec<usize> = sequences.iter().map(Vec::len).collect();
    let max_len = lengths.iter().copied().max().unwrap_or(0);

    let mut padded = Array2::<i64>::from_elem((sequences.len(), max_len), SEPARATOR_ID);
    for (row, sequence) in sequences.iter().enumerate() {
        for (col, &id) in sequence.iter().enumerate() {
            padded[[row, col]] = id;
        }
    }

    (padded, lengths)
}

/// Lengths as the `[batch]` i64 tensor the encoder takes.
pub fn lengths_tensor(lengths: &[usize]) -> Array1<i64> {
    lengths.iter().map(|&len| len as i64).collect()
}

/// Sequence mask of shape `[batch, 1, max_len]`: 1.0 at valid positions,
/// 0.0 at padding.
pub fn sequence_mask(lengths: &[usize], max_len: usize) -> Array3<f32> {
    let mut mask = Array3::<f32>::zeros((lengths.len(), 1, max_len));
    for (row, &len) in lengths.iter().enumerate() {
        for col in 0..len.min(max_len) {
            mask[[row, 0, col]] = 1.0;
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersperse() {
        assert_eq!(intersperse(&[13, 14, 15], 0), vec![0, 13, 0, 14, 0, 15, 0]);
        assert_eq!(intersperse(&[], 0), vec![0]);
        assert_eq!(intersperse(&[5], 9), vec![9, 5, 9]);
    }

    #[test]
    fn test_pad_batch() {
        let sequences = vec![vec![0, 1, 0], vec![0, 2, 0, 3, 0], vec![0]];
        let (padded, lengths) = pad_batch(&sequences);

        assert_eq!(lengths, vec![3, 5, 1]);
        assert_eq!(padded.shape(), &[3, 5]);
        assert_eq!(padded.row(0).to_vec(), vec![0, 1, 0, 0, 0]);
        assert_eq!(padded.row(1).to_vec(), vec![0, 2, 0, 3, 0]);
        assert_eq!(padded.row(2).to_vec(), vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn pad_empty_batch() {
        let (padded, lengths) = pad_batch(&[]);
        assert_eq!(padded.shape(), &[0, 0]);
        assert!(lengths.is_empty());
    }

    #[test]
    fn test_lengths_tensor() {
        assert_eq!(lengths_tensor(&[3, 7]).to_vec(), vec![3i64, 7]);
    }

    #[test]
    fn test_sequence_mask() {
        let mask = sequence_mask(&[2, 4], 4);

        assert_eq!(mask.shape(), &[2, 1, 4]);
        assert_eq!(mask[[0, 0, 1]], 1.0); // Valid position
        assert_eq!(mask[[0, 0, 2]], 0.0); // Padding position
        assert_eq!(mask[[1, 0, 3]], 1.0);
    }
}
