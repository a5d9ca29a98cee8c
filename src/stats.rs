use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

pub const Z_975: f64 = 1.959_963_984_540_054;

pub fn normal_two_sided_p(z: f64) -> f64 {
    if !z.is_finite() {
        return if z.is_nan() { f64::NAN } else { 0.0 };
    }
    match Normal::new(0.0, 1.0) {
        Ok(normal) => (2.0 * normal.sf(z.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

pub fn t_two_sided_p(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return if t.is_nan() { f64::NAN } else { 0.0 };
    }
    match StudentsT::new(0.0, 1.0, df) {
        Ok(dist) => (2.0 * dist.sf(t.abs())).min(1.0),
        Err(_) => f64::NAN,
    }
}

pub fn t_quantile_975(df: f64) -> f64 {
    StudentsT::new(0.0, 1.0, df)
        .map(|dist| dist.inverse_cdf(0.975))
        .unwrap_or(Z_975)
}

pub fn chi_square_sf(q: f64, df: usize) -> f64 {
    if df == 0 || !q.is_finite() {
        return f64::NAN;
    }
    match ChiSquared::new(df as f64) {
        Ok(chi) => chi.sf(q.max(0.0)),
        Err(_) => f64::NAN,
    }
}

pub fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    (ss / (n as f64 - 1.0)).sqrt()
}
