/// Labial oscillator: normal form of a Takens-Bogdanov unfolding.
///
///   dx/dt = y
///   dy/dt = (-alpha - beta*x - x^3 + x^2) * gamma^2 - (x^2*y + x*y) * gamma
///
/// x is the labial midpoint displacement, y its velocity. alpha and beta move
/// the system across the Hopf / saddle-node curves (silence vs. oscillation,
/// tonal vs. rich spectra); gamma sets the time scale so that frequencies land
/// in the kHz range.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    gamma: f64,
    gamma2: f64,
}

impl Oscillator {
    pub fn new(gamma: f64) -> Self {
        Self {
            gamma,
            gamma2: gamma * gamma,
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Labial acceleration dy/dt at (x, y) under the given parameters.
    #[inline]
    pub fn acceleration(&self, x: f64, y: f64, alpha: f64, beta: f64) -> f64 {
        let x2 = x * x;
        (-alpha - beta * x - x2 * x + x2) * self.gamma2 - (x2 * y + x * y) * self.gamma
    }

    /// (dx/dt, dy/dt).
    #[inline]
    pub fn derivatives(&self, x: f64, y: f64, alpha: f64, beta: f64) -> [f64; 2] {
        [y, self.acceleration(x, y, alpha, beta)]
    }
}
