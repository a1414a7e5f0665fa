//! Repeated-row detection
//!
//! Remotes send every command several times. Picking the row that recurs
//! most filters out captures mangled by noise.

use super::store::BitBuffer;

impl BitBuffer {
    /// Rows are equal when their bit lengths match and their valid bytes match
    pub fn compare_rows(&self, row_a: usize, row_b: usize) -> bool {
        let a = self.row_or_empty(row_a);
        let b = self.row_or_empty(row_b);
        let num_bytes = (a.len() + 7) / 8;
        a.len() == b.len() && a.bytes().get(..num_bytes) == b.bytes().get(..num_bytes)
    }

    /// Number of rows equal to `row`, itself included
    pub fn count_repeats(&self, row: usize) -> usize {
        (0..self.num_rows())
            .filter(|&i| self.compare_rows(row, i))
            .count()
    }

    /// First row with at least `min_bits` bits that occurs at least
    /// `min_repeats` times
    pub fn find_repeated_row(&self, min_repeats: usize, min_bits: usize) -> Option<usize> {
        (0..self.num_rows()).find(|&i| {
            self.bits_per_row(i) >= min_bits && self.count_repeats(i) >= min_repeats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_rows() {
        let bits = BitBuffer::parse("{12}abc {12}abc {12}abd {16}abc0");
        assert!(bits.compare_rows(0, 1));
        assert!(!bits.compare_rows(0, 2));
        // same leading bytes, different length
        assert!(!bits.compare_rows(0, 3));
    }

    #[test]
    fn test_count_repeats() {
        let bits = BitBuffer::parse("{8}aa {8}55 {8}aa {8}aa");
        assert_eq!(bits.count_repeats(0), 3);
        assert_eq!(bits.count_repeats(1), 1);
    }

    #[test]
    fn test_find_repeated_row() {
        // two noise rows and three copies of the same 40-bit transmission
        let bits = BitBuffer::parse(
            "{40}1fc90c0022 {40}1fc90c0022 {37}9a12 {40}1fc90c0022 {40}e00f0c0022",
        );
        assert_eq!(bits.find_repeated_row(3, 40), Some(0));
        assert_eq!(bits.find_repeated_row(4, 40), None);
    }

    #[test]
    fn test_find_repeated_row_skips_short_rows() {
        let bits = BitBuffer::parse("{4}f {4}f {4}f {24}c0ffee {24}c0ffee");
        assert_eq!(bits.find_repeated_row(2, 0), Some(0));
        assert_eq!(bits.find_repeated_row(2, 8), Some(3));
        assert_eq!(bits.find_repeated_row(3, 8), None);
    }

    #[test]
    fn test_find_repeated_row_noise_first() {
        let bits = BitBuffer::parse("{40}0123456789 {40}1fc90c0022 {40}1fc90c0022 {40}1fc90c0022");
        assert_eq!(bits.find_repeated_row(3, 40), Some(1));
    }

    #[test]
    fn test_find_repeated_row_empty_buffer() {
        assert_eq!(BitBuffer::new().find_repeated_row(1, 0), None);
    }
}
