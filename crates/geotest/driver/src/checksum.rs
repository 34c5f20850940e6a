//! Reference pixel checksum.
//!
//! Drivers report checksums through [`RasterBand::checksum`](crate::RasterBand::checksum);
//! this is the digest every driver in the library agrees on, so a driver
//! built on [`checksum_values`] stays comparable with recorded expectations.

/// Prime cycle folded over the pixel stream.
pub const CHECKSUM_PRIMES: [i32; 11] = [7, 11, 13, 17, 19, 23, 29, 31, 37, 41, 43];

/// Fold pixel values, in row-major window order, into a 16-bit checksum.
///
/// The prime index carries across rows. Floating values are rounded to the
/// nearest integer first; NaN folds as zero.
pub fn checksum_values<I>(values: I) -> u32
where
    I: IntoIterator<Item = f64>,
{
    let mut checksum: i32 = 0;
    let mut prime = 0usize;

    for value in values {
        let v = value.round() as i32;
        checksum = checksum.wrapping_add(v % CHECKSUM_PRIMES[prime]);
        prime += 1;
        if prime >= CHECKSUM_PRIMES.len() {
            prime = 0;
        }
        checksum &= 0xffff;
    }

    checksum as u32
}
