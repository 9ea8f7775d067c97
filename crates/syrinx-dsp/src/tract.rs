//! Tracheal feedback: lumped transmission line as a single round-trip delay.
//!
//! The trachea is collapsed to one delay D = round(L / c / dt) steps and one
//! reflection coefficient r at the far end:
//!
//!   p_in[t]   = s(t) + p_back[t - D]           s = 0.5 * envelope * dy/dt
//!   p_back[t] = -r * p_in[t - D]
//!   p_out     = (1 - r) * p_in[t - D]
//!   dp_out/dt = (p_back[t] - p_back[t - 1]) / dt
//!
//! Both buffers span the whole oversampled run and are indexed by absolute
//! step. Reads before step 0 are zero: nothing returns from the tract until it
//! has had time to travel. With D = 0 the tract is a pass-through scaled by
//! (1 - r).

/// Tract outputs that force the acoustic sub-system for one step.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TractDrive {
    /// Transmitted pressure (1 - r) * p_in[t - D].
    pub p_out: f64,
    /// Finite-difference derivative of the backward wave.
    pub dp_out: f64,
}

/// Forward/backward pressure delay lines owned by one synthesis run.
pub struct TractDelayLine {
    p_in: Vec<f64>,
    p_back: Vec<f64>,
    delay: usize,
    reflection: f64,
    dt: f64,
}

impl TractDelayLine {
    /// - `steps`: oversampled run length (buffer size)
    /// - `delay`: round-trip delay in steps
    /// - `reflection`: reflection coefficient r
    /// - `dt`: integration step (s)
    pub fn new(steps: usize, delay: usize, reflection: f64, dt: f64) -> Self {
        Self {
            p_in: vec![0.0; steps],
            p_back: vec![0.0; steps],
            delay,
            reflection,
            dt,
        }
    }

    pub fn delay(&self) -> usize {
        self.delay
    }

    /// `buf[t - delay]`, or zero before the start of the run.
    #[inline]
    fn delayed(buf: &[f64], t: usize, delay: usize) -> f64 {
        t.checked_sub(delay).map_or(0.0, |i| buf[i])
    }

    /// Write step `t` with the labial source pressure and return the drive.
    ///
    /// Steps must be advanced in order; step `t` must be within the run.
    pub fn advance(&mut self, t: usize, source: f64) -> TractDrive {
        debug_assert!(t < self.p_in.len());
        let r = self.reflection;

        // With D = 0 this reads p_back[t] before it is written, i.e. zero.
        let returning = Self::delayed(&self.p_back, t, self.delay);
        self.p_in[t] = source + returning;

        let incident = Self::delayed(&self.p_in, t, self.delay);
        let back = -r * incident;
        let previous = if t > 0 { self.p_back[t - 1] } else { 0.0 };
        self.p_back[t] = back;

        TractDrive {
            p_out: (1.0 - r) * incident,
            dp_out: (back - previous) / self.dt,
        }
    }

    pub fn forward(&self) -> &[f64] {
        &self.p_in
    }

    pub fn backward(&self) -> &[f64] {
        &self.p_back
    }

    /// Hand the buffers to the caller: (p_in, p_back).
    pub fn into_buffers(self) -> (Vec<f64>, Vec<f64>) {
        (self.p_in, self.p_back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_feedback_before_delay() {
        let d = 10;
        let mut line = TractDelayLine::new(100, d, 0.5, 1.0);
        assert_eq!(line.delay(), d);
        for t in 0..d {
            let drive = line.advance(t, 1.0);
            assert_eq!(drive.p_out, 0.0, "p_out leaked at step {t}");
            assert_eq!(drive.dp_out, 0.0, "dp_out leaked at step {t}");
            assert_eq!(line.backward()[t], 0.0);
        }
        let drive = line.advance(d, 1.0);
        assert_eq!(drive.p_out, 0.5);
        assert_eq!(line.backward()[d], -0.5);
    }

    #[test]
    fn test_zero_delay_is_pass_through() {
        let r = 0.25;
        let mut line = TractDelayLine::new(8, 0, r, 1.0);
        for (t, s) in [0.3, -1.0, 2.0, 0.0].into_iter().enumerate() {
            let drive = line.advance(t, s);
            assert!((drive.p_out - (1.0 - r) * s).abs() < 1e-15);
            assert!((line.backward()[t] + r * s).abs() < 1e-15);
            assert_eq!(line.forward()[t], s);
        }
    }

    #[test]
    fn test_zero_reflection_transmits_delayed_source() {
        let d = 3;
        let mut line = TractDelayLine::new(20, d, 0.0, 0.5);
        let source: Vec<f64> = (0..20).map(|i| i as f64).collect();
        for t in 0..20 {
            let drive = line.advance(t, source[t]);
            let expected = if t >= d { source[t - d] } else { 0.0 };
            assert_eq!(drive.p_out, expected);
            assert_eq!(drive.dp_out, 0.0);
        }
    }

    #[test]
    fn test_echo_returns_after_round_trip() {
        // A single impulse re-enters p_in after 2D steps, scaled by -r.
        let d = 4;
        let r = 0.5;
        let mut line = TractDelayLine::new(32, d, r, 1.0);
        for t in 0..32 {
            line.advance(t, if t == 0 { 1.0 } else { 0.0 });
        }
        let p_in = line.forward();
        assert_eq!(p_in[0], 1.0);
        assert_eq!(p_in[2 * d], -r);
        assert_eq!(p_in[4 * d], r * r);
        assert_eq!(p_in[d], 0.0);
    }

    #[test]
    fn test_backward_derivative() {
        let mut line = TractDelayLine::new(4, 1, 1.0, 0.1);
        line.advance(0, 2.0);
        let drive = line.advance(1, 0.0);
        // p_back[1] = -1 * p_in[0] = -2, previous 0 -> (-2 - 0) / 0.1
        assert!((drive.dp_out + 20.0).abs() < 1e-12);
    }
}
