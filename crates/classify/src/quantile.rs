use foundation::math::stable_total_cmp_f64;

/// Linear-interpolated quantile of an ascending, non-empty slice.
///
/// `p` is clamped to `[0, 1]`; position `h = (len - 1) * p`.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let h = last as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(last);
    let frac = h - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// `n` upper breaks at `p = i / n` for `i` in `1..=n`.
///
/// Non-finite values are ignored. The last break is always the maximum.
/// Returns an empty list for no values or `n == 0`.
pub fn quantile_breaks(values: &[f64], n: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() || n == 0 {
        return Vec::new();
    }
    sorted.sort_by(|a, b| stable_total_cmp_f64(*a, *b));
    (1..=n)
        .filter_map(|i| quantile_sorted(&sorted, i as f64 / n as f64))
        .collect()
}
