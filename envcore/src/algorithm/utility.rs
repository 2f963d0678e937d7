use statrs::statistics::Statistics;

/// Index of the first element whose key is not less than `value`.
///
/// # Example
///
/// ```
/// use envcore::algorithm::utility::lower_bound;
///
/// let mz = vec![100.0, 200.0, 300.0];
/// assert_eq!(lower_bound(&mz, 150.0, |x| *x), 1);
/// assert_eq!(lower_bound(&mz, 200.0, |x| *x), 1);
/// assert_eq!(lower_bound(&mz, 400.0, |x| *x), 3);
/// ```
pub fn lower_bound<T, F>(sorted: &[T], value: f64, key: F) -> usize
where
    F: Fn(&T) -> f64,
{
    sorted.partition_point(|element| key(element) < value)
}

/// Index of the element whose key is closest to `value`, the lower one on a tie.
///
/// Returns 0 for an empty slice, callers must check emptiness themselves.
///
/// # Example
///
/// ```
/// use envcore::algorithm::utility::find_nearest_index;
///
/// let mz = vec![100.0, 200.0, 300.0];
/// assert_eq!(find_nearest_index(&mz, 90.0, |x| *x), 0);
/// assert_eq!(find_nearest_index(&mz, 240.0, |x| *x), 1);
/// assert_eq!(find_nearest_index(&mz, 250.0, |x| *x), 1);
/// assert_eq!(find_nearest_index(&mz, 251.0, |x| *x), 2);
/// assert_eq!(find_nearest_index(&mz, 900.0, |x| *x), 2);
/// ```
pub fn find_nearest_index<T, F>(sorted: &[T], value: f64, key: F) -> usize
where
    F: Fn(&T) -> f64,
{
    let upper = lower_bound(sorted, value, &key);
    if upper == 0 {
        return 0;
    }
    if upper == sorted.len() {
        return sorted.len() - 1;
    }
    let below = upper - 1;
    if key(&sorted[upper]) - value < value - key(&sorted[below]) {
        upper
    } else {
        below
    }
}

/// Pearson correlation coefficient of two equally long samples.
///
/// NaN when the samples differ in length, hold fewer than two values,
/// or either sample is constant.
///
/// # Example
///
/// ```
/// use envcore::algorithm::utility::pearson_correlation;
///
/// let r = pearson_correlation(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.5]);
/// assert!(r > 0.99);
/// assert!(pearson_correlation(&[1.0, 1.0], &[0.5, 0.7]).is_nan());
/// ```
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.len() < 2 {
        return f64::NAN;
    }

    let std_a = a.iter().std_dev();
    let std_b = b.iter().std_dev();
    if std_a == 0.0 || std_b == 0.0 {
        return f64::NAN;
    }

    a.iter().covariance(b.iter()) / (std_a * std_b)
}
