//! Fixed-width dot product over padded rows.
//!
//! Rows are zero-padded to a multiple of [`LANES`], so every kernel walks
//! whole chunks without a remainder loop. The widest kernel the CPU
//! supports is selected once at first use; results differ from the scalar
//! kernel only in float rounding.

use std::sync::OnceLock;

/// Row length granularity shared by all kernels.
pub const LANES: usize = 16;

type DotKernel = fn(&[f32], &[f32]) -> f32;

/// Round `len` up to the next multiple of [`LANES`] (at least one chunk).
pub fn padded_width(len: usize) -> usize {
    len.max(1).div_ceil(LANES) * LANES
}

/// Dot product of two padded rows of equal length.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    debug_assert_eq!(a.len() % LANES, 0);
    (kernel())(a, b)
}

/// Name of the kernel in use, for diagnostics.
pub fn kernel_name() -> &'static str {
    select().1
}

fn kernel() -> DotKernel {
    select().0
}

fn select() -> (DotKernel, &'static str) {
    static SELECTED: OnceLock<(DotKernel, &'static str)> = OnceLock::new();
    *SELECTED.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") && is_x86_feature_detected!("fma") {
                tracing::debug!("dot kernel: avx2+fma");
                return (dot_avx2_entry as DotKernel, "avx2");
            }
        }
        tracing::debug!("dot kernel: portable");
        (dot_portable as DotKernel, "portable")
    })
}

/// Portable kernel: sixteen independent accumulators per chunk, which the
/// compiler vectorizes to whatever width the target offers.
pub fn dot_portable(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];
    for (ca, cb) in a.chunks_exact(LANES).zip(b.chunks_exact(LANES)) {
        for lane in 0..LANES {
            acc[lane] += ca[lane] * cb[lane];
        }
    }
    acc.iter().sum()
}

#[cfg(target_arch = "x86_64")]
fn dot_avx2_entry(a: &[f32], b: &[f32]) -> f32 {
    // SAFETY: only selected after runtime detection of avx2 and fma; rows
    // are padded to LANES so every load is in bounds.
    unsafe { dot_avx2(a, b) }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[target_feature(enable = "fma")]
unsafe fn dot_avx2(a: &[f32], b: &[f32]) -> f32 {
    use std::arch::x86_64::*;

    let len = a.len().min(b.len());
    let chunks = len / LANES;
    let mut acc_lo = _mm256_setzero_ps();
    let mut acc_hi = _mm256_setzero_ps();

    for i in 0..chunks {
        let offset = i * LANES;
        let a_lo = _mm256_loadu_ps(a.as_ptr().add(offset));
        let b_lo = _mm256_loadu_ps(b.as_ptr().add(offset));
        let a_hi = _mm256_loadu_ps(a.as_ptr().add(offset + 8));
        let b_hi = _mm256_loadu_ps(b.as_ptr().add(offset + 8));
        acc_lo = _mm256_fmadd_ps(a_lo, b_lo, acc_lo);
        acc_hi = _mm256_fmadd_ps(a_hi, b_hi, acc_hi);
    }

    let acc = _mm256_add_ps(acc_lo, acc_hi);
    let hi = _mm256_extractf128_ps(acc, 1);
    let lo = _mm256_castps256_ps128(acc);
    let sum128 = _mm_add_ps(lo, hi);
    let shuf = _mm_movehdup_ps(sum128);
    let sums = _mm_add_ps(sum128, shuf);
    let shuf2 = _mm_movehl_ps(sums, sums);
    _mm_cvtss_f32(_mm_add_ss(sums, shuf2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[f32]) -> Vec<f32> {
        let mut r = vec![0.0; padded_width(values.len())];
        r[..values.len()].copy_from_slice(values);
        r
    }

    #[test]
    fn test_padded_width() {
        assert_eq!(padded_width(0), LANES);
        assert_eq!(padded_width(1), LANES);
        assert_eq!(padded_width(LANES), LANES);
        assert_eq!(padded_width(LANES + 1), 2 * LANES);
    }

    #[test]
    fn test_dot_matches_scalar() {
        let values: Vec<f32> = (0..37).map(|i| (i as f32) * 0.1).collect();
        let a = row(&values);
        let b = row(&values.iter().rev().copied().collect::<Vec<_>>());
        let expected: f32 = a.iter().zip(&b).map(|(x, y)| x * y).sum();
        assert!((dot(&a, &b) - expected).abs() < 1e-3);
        assert!((dot_portable(&a, &b) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_zero_rows() {
        let z = vec![0.0f32; LANES];
        assert_eq!(dot(&z, &z), 0.0);
        assert!(!kernel_name().is_empty());
    }
}
