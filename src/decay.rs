use crate::error::{Error, Result};

/// Exploration rate as a function of the number of finished episodes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Epsilon {
    /// The same rate for every episode
    Constant(f32),
    /// v(t) = end + (start - end) * e<sup>-rate * t</sup>
    Exponential { rate: f32, start: f32, end: f32 },
    /// v(t) = max(start - rate * t, end)
    Linear { rate: f32, start: f32, end: f32 },
}

impl Epsilon {
    /// **Errors** unless `start` decays toward `end` and both are probabilities
    pub fn exponential(rate: f32, start: f32, end: f32) -> Result<Self> {
        let epsilon = Self::Exponential { rate, start, end };
        epsilon.validate()?;
        Ok(epsilon)
    }

    /// **Errors** unless `start` decays toward `end` and both are probabilities
    pub fn linear(rate: f32, start: f32, end: f32) -> Result<Self> {
        let epsilon = Self::Linear { rate, start, end };
        epsilon.validate()?;
        Ok(epsilon)
    }

    pub fn validate(&self) -> Result<()> {
        let is_probability = |v: f32| (0.0..=1.0).contains(&v);
        match *self {
            Self::Constant(value) if is_probability(value) => Ok(()),
            Self::Constant(_) => Err(Error::InvalidSchedule("epsilon must lie in [0, 1]")),
            Self::Exponential { rate, start, end } | Self::Linear { rate, start, end } => {
                if !is_probability(start) || !is_probability(end) {
                    return Err(Error::InvalidSchedule("`start` and `end` must lie in [0, 1]"));
                }
                if rate < 0.0 || start < end {
                    return Err(Error::InvalidSchedule("epsilon must not grow over time"));
                }
                Ok(())
            }
        }
    }

    /// Rate for the episode numbered `episode`, counting from zero
    pub fn value(&self, episode: u32) -> f32 {
        let t = episode as f32;
        match *self {
            Self::Constant(value) => value,
            Self::Exponential { rate, start, end } => end + (start - end) * (-rate * t).exp(),
            Self::Linear { rate, start, end } => (start - rate * t).max(end),
        }
    }
}

impl Default for Epsilon {
    fn default() -> Self {
        Self::Constant(0.1)
    }
}

impl From<f32> for Epsilon {
    fn from(value: f32) -> Self {
        Self::Constant(value)
    }
}
