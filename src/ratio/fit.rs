/// Least-squares line through `(log10 x, log10 y)`, i.e. `y = 10^intercept * x^slope`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogLogFit {
    pub slope: f64,
    pub intercept: f64,
    pub points: usize,
}

impl LogLogFit {
    /// Fit over strictly positive points; others are ignored.
    /// `None` with fewer than two points or when every x is the same.
    pub fn fit(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let logs: Vec<(f64, f64)> = points
            .into_iter()
            .filter(|(x, y)| *x > 0.0 && *y > 0.0 && x.is_finite() && y.is_finite())
            .map(|(x, y)| (x.log10(), y.log10()))
            .collect();
        if logs.len() < 2 {
            return None;
        }

        let n = logs.len() as f64;
        let mean_x = logs.iter().map(|(x, _)| x).sum::<f64>() / n;
        let mean_y = logs.iter().map(|(_, y)| y).sum::<f64>() / n;
        let (sxy, sxx) = logs.iter().fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
            let dx = x - mean_x;
            (sxy + dx * (y - mean_y), sxx + dx * dx)
        });
        if sxx == 0.0 {
            return None;
        }

        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
            points: logs.len(),
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        x.powf(self.slope) * 10f64.powf(self.intercept)
    }
}
