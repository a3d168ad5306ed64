use std::ops::Range;
use std::str::FromStr;

/// How raw values are mapped onto [0, 1] before a color ramp is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    #[default]
    Linear,
    Log,
}

impl FromStr for Normalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" => Ok(Normalization::Linear),
            "log" | "log10" => Ok(Normalization::Log),
            other => Err(format!("Unknown normalization '{}' (expected \"linear\" or \"log\")", other)),
        }
    }
}

/// Observed [min, max] of a field, in the normalization's own space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub min: f64,
    pub max: f64,
    pub normalization: Normalization,
}

impl Domain {
    /// Domain over the given values. `None` when no value qualifies
    /// (log ignores non-positive values).
    pub fn from_values<I>(values: I, normalization: Normalization) -> Option<Domain>
    where
        I: IntoIterator<Item = f64>,
    {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for v in values {
            if !v.is_finite() {
                continue;
            }
            if normalization == Normalization::Log && v <= 0.0 {
                continue;
            }
            if v < min { min = v; }
            if v > max { max = v; }
        }

        if min == f64::INFINITY {
            None
        } else {
            Some(Domain { min, max, normalization })
        }
    }

    /// Position of `v` in [0, 1]. Out-of-range values clip; a degenerate domain maps to 0.
    pub fn normalize(&self, v: f64) -> f64 {
        let (lo, hi, x) = match self.normalization {
            Normalization::Linear => (self.min, self.max, v),
            Normalization::Log => {
                if v <= 0.0 {
                    return 0.0;
                }
                (self.min.ln(), self.max.ln(), v.ln())
            }
        };

        if hi <= lo {
            return 0.0;
        }
        ((x - lo) / (hi - lo)).clamp(0.0, 1.0)
    }
}

/// Axis range covering `values` with 5% padding (±1 around a single value).
/// Falls back to 0..1 when there is nothing to cover.
pub fn axis_range<I>(values: I) -> Range<f64>
where
    I: IntoIterator<Item = f64>,
{
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        if v < min { min = v; }
        if v > max { max = v; }
    }

    if min == f64::INFINITY {
        return 0.0..1.0;
    }
    pad_range(min, max)
}

fn pad_range(min: f64, max: f64) -> Range<f64> {
    if min == max {
        (min - 1.0)..(max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding)..(max + padding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_endpoints() {
        let d = Domain::from_values(vec![2.0, 10.0, 6.0], Normalization::Linear).unwrap();
        assert_eq!(d.normalize(2.0), 0.0);
        assert_eq!(d.normalize(10.0), 1.0);
        assert_eq!(d.normalize(6.0), 0.5);
    }

    #[test]
    fn test_linear_clipping() {
        let d = Domain { min: 0.0, max: 10.0, normalization: Normalization::Linear };
        assert_eq!(d.normalize(-5.0), 0.0);
        assert_eq!(d.normalize(50.0), 1.0);
    }

    #[test]
    fn test_log_normalization() {
        let d = Domain::from_values(vec![1.0, 10.0, 100.0, 0.0, -3.0], Normalization::Log).unwrap();
        assert_eq!(d.min, 1.0);
        assert_eq!(d.max, 100.0);
        assert_eq!(d.normalize(1.0), 0.0);
        assert_eq!(d.normalize(100.0), 1.0);
        assert!((d.normalize(10.0) - 0.5).abs() < 1e-12);
        assert_eq!(d.normalize(0.0), 0.0);
    }

    #[test]
    fn test_degenerate_domain() {
        let d = Domain::from_values(vec![4.0, 4.0], Normalization::Linear).unwrap();
        assert_eq!(d.normalize(4.0), 0.0);
    }

    #[test]
    fn test_empty_domain() {
        assert!(Domain::from_values(Vec::<f64>::new(), Normalization::Linear).is_none());
        assert!(Domain::from_values(vec![0.0, -1.0], Normalization::Log).is_none());
    }

    #[test]
    fn test_axis_range_padding() {
        let r = axis_range(vec![0.0, 10.0]);
        assert!(r.start < 0.0);
        assert!(r.end > 10.0);

        assert_eq!(axis_range(vec![5.0]), 4.0..6.0);
        assert_eq!(axis_range(Vec::<f64>::new()), 0.0..1.0);
    }

    #[test]
    fn test_normalization_parse() {
        assert_eq!("log".parse::<Normalization>().unwrap(), Normalization::Log);
        assert_eq!("Linear".parse::<Normalization>().unwrap(), Normalization::Linear);
        assert!("sqrt".parse::<Normalization>().is_err());
    }
}
