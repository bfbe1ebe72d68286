//! Turning raw classifier scores into a single reported class.

/// Numerically stable softmax. Non-finite results (from infinite or NaN
/// logits) are left as NaN and ignored by [`argmax`].
pub fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .map(|&x| x as f64)
        .filter(|x| !x.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = logits.iter().map(|&x| (x as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().filter(|x| !x.is_nan()).sum();

    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest value. On exact ties the lowest index wins; NaN never
/// wins. `None` when no value is comparable.
pub fn argmax(values: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some(b) if v <= values[b] => {}
            _ => best = Some(i),
        }
    }

    best
}

/// Probability as a percentage in [0, 100].
pub fn to_percent(probability: f64) -> f64 {
    (probability * 100.0).clamp(0.0, 100.0)
}

/// Two decimals and a trailing `%`, e.g. `"97.31%"`.
pub fn format_confidence(percent: f64) -> String {
    format!("{:.2}%", percent)
}
