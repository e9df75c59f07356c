//! RTT/RTO estimation.
//!
//! Mean-deviation smoothed RTT per RFC 6298, with the smoothing weights
//! scaled by the number of expected samples per RTT as suggested by
//! RFC 7323 appendix G.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RttEstimatorOptions {
    /// Weight of the new sample in the smoothed RTT.
    pub alpha: f64,
    /// Weight of the new sample in the RTT variation.
    pub beta: f64,
    /// RTO = sRTT + k * RTTvar.
    pub k: u32,
    pub initial_rto: Duration,
    pub min_rto: Duration,
    pub max_rto: Duration,
    pub rto_backoff_multiplier: u32,
}

impl Default for RttEstimatorOptions {
    fn default() -> Self {
        Self {
            alpha: 0.125,
            beta: 0.25,
            k: 4,
            initial_rto: Duration::from_secs(1),
            min_rto: Duration::from_millis(200),
            max_rto: Duration::from_secs(60),
            rto_backoff_multiplier: 2,
        }
    }
}

/// RTT estimator with exponential backoff of the retransmission timeout.
#[derive(Debug, Clone)]
pub struct RttEstimator {
    options: RttEstimatorOptions,
    srtt: Option<Duration>,
    rttvar: Duration,
    rto: Duration,
}

impl RttEstimator {
    pub fn new(options: RttEstimatorOptions) -> Self {
        debug_assert!((0.0..=1.0).contains(&options.alpha));
        debug_assert!((0.0..=1.0).contains(&options.beta));
        debug_assert!(options.max_rto >= options.min_rto);
        debug_assert!(options.rto_backoff_multiplier >= 1);
        let rto = options.initial_rto;
        Self {
            options,
            srtt: None,
            rttvar: Duration::ZERO,
            rto,
        }
    }

    pub fn has_samples(&self) -> bool {
        self.srtt.is_some()
    }

    pub fn smoothed_rtt(&self) -> Option<Duration> {
        self.srtt
    }

    pub fn rtt_variation(&self) -> Duration {
        self.rttvar
    }

    pub fn estimated_rto(&self) -> Duration {
        self.rto
    }

    /// Records one RTT sample.
    ///
    /// `n_expected_samples` is the number of samples expected within the
    /// current RTT (at least 1); larger windows weaken each sample's
    /// influence per RFC 7323 appendix G.
    pub fn add_measurement(&mut self, rtt: Duration, n_expected_samples: usize) {
        debug_assert!(n_expected_samples > 0);
        let n = n_expected_samples.max(1) as f64;

        match self.srtt {
            None => {
                self.srtt = Some(rtt);
                self.rttvar = rtt / 2;
            }
            Some(srtt) => {
                let alpha = self.options.alpha / n;
                let beta = self.options.beta / n;
                let error = if srtt > rtt { srtt - rtt } else { rtt - srtt };
                self.rttvar = Duration::from_secs_f64(
                    (1.0 - beta) * self.rttvar.as_secs_f64() + beta * error.as_secs_f64(),
                );
                self.srtt = Some(Duration::from_secs_f64(
                    (1.0 - alpha) * srtt.as_secs_f64() + alpha * rtt.as_secs_f64(),
                ));
            }
        }

        let srtt = self.srtt.unwrap_or(rtt);
        self.rto = (srtt + self.rttvar * self.options.k)
            .clamp(self.options.min_rto, self.options.max_rto);
    }

    /// Backs off the RTO after a loss event.
    pub fn backoff_rto(&mut self) {
        self.rto = (self.rto * self.options.rto_backoff_multiplier)
            .clamp(self.options.min_rto, self.options.max_rto);
    }
}

/// [`RttEstimator`] that additionally tracks min/max/average RTT.
#[derive(Debug, Clone)]
pub struct RttEstimatorWithStats {
    estimator: RttEstimator,
    rtt_min: Duration,
    rtt_max: Duration,
    rtt_avg: Duration,
    n_samples: u64,
}

impl RttEstimatorWithStats {
    pub fn new(options: RttEstimatorOptions) -> Self {
        Self {
            estimator: RttEstimator::new(options),
            rtt_min: Duration::MAX,
            rtt_max: Duration::ZERO,
            rtt_avg: Duration::ZERO,
            n_samples: 0,
        }
    }

    pub fn add_measurement(&mut self, rtt: Duration, n_expected_samples: usize) {
        self.estimator.add_measurement(rtt, n_expected_samples);

        self.rtt_avg = (self.rtt_avg * self.n_samples as u32 + rtt) / (self.n_samples as u32 + 1);
        self.rtt_min = self.rtt_min.min(rtt);
        self.rtt_max = self.rtt_max.max(rtt);
        self.n_samples += 1;
    }

    pub fn backoff_rto(&mut self) {
        self.estimator.backoff_rto();
    }

    pub fn estimated_rto(&self) -> Duration {
        self.estimator.estimated_rto()
    }

    pub fn smoothed_rtt(&self) -> Option<Duration> {
        self.estimator.smoothed_rtt()
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        (self.n_samples > 0).then_some(self.rtt_min)
    }

    pub fn max_rtt(&self) -> Option<Duration> {
        (self.n_samples > 0).then_some(self.rtt_max)
    }

    pub fn avg_rtt(&self) -> Option<Duration> {
        (self.n_samples > 0).then_some(self.rtt_avg)
    }

    pub fn n_samples(&self) -> u64 {
        self.n_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn first_measurement_seeds_srtt_and_var() {
        let mut estimator = RttEstimator::new(RttEstimatorOptions::default());
        assert_eq!(estimator.estimated_rto(), Duration::from_secs(1));

        estimator.add_measurement(ms(100), 1);
        assert_eq!(estimator.smoothed_rtt(), Some(ms(100)));
        assert_eq!(estimator.rtt_variation(), ms(50));
        // rto = 100ms + 4 * 50ms
        assert_eq!(estimated_ms(&estimator), 300);
    }

    fn estimated_ms(estimator: &RttEstimator) -> u128 {
        estimator.estimated_rto().as_millis()
    }

    #[test]
    fn smoothing_follows_rfc6298() {
        let mut estimator = RttEstimator::new(RttEstimatorOptions::default());
        estimator.add_measurement(ms(100), 1);
        estimator.add_measurement(ms(200), 1);

        // rttvar = 0.75*50 + 0.25*100 = 62.5ms, srtt = 0.875*100 + 0.125*200 = 112.5ms
        assert_eq!(estimator.rtt_variation(), Duration::from_micros(62_500));
        assert_eq!(estimator.smoothed_rtt(), Some(Duration::from_micros(112_500)));
    }

    #[test]
    fn sample_scaling_weakens_updates() {
        let mut single = RttEstimator::new(RttEstimatorOptions::default());
        let mut windowed = RttEstimator::new(RttEstimatorOptions::default());
        for estimator in [&mut single, &mut windowed] {
            estimator.add_measurement(ms(100), 1);
        }

        single.add_measurement(ms(500), 1);
        windowed.add_measurement(ms(500), 10);
        // the windowed sample moves the estimate far less
        assert!(windowed.smoothed_rtt().unwrap() < single.smoothed_rtt().unwrap());
    }

    #[test]
    fn rto_stays_clamped() {
        let mut estimator = RttEstimator::new(RttEstimatorOptions::default());
        estimator.add_measurement(Duration::from_micros(10), 1);
        assert_eq!(estimator.estimated_rto(), ms(200)); // min clamp

        for _ in 0..20 {
            estimator.backoff_rto();
        }
        assert_eq!(estimator.estimated_rto(), Duration::from_secs(60)); // max clamp
    }

    #[test]
    fn backoff_doubles() {
        let mut estimator = RttEstimator::new(RttEstimatorOptions::default());
        estimator.backoff_rto();
        assert_eq!(estimator.estimated_rto(), Duration::from_secs(2));
        estimator.backoff_rto();
        assert_eq!(estimator.estimated_rto(), Duration::from_secs(4));
    }

    #[test]
    fn stats_track_min_max_avg() {
        let mut estimator = RttEstimatorWithStats::new(RttEstimatorOptions::default());
        assert!(estimator.min_rtt().is_none());

        estimator.add_measurement(ms(100), 1);
        estimator.add_measurement(ms(300), 1);
        assert_eq!(estimator.min_rtt(), Some(ms(100)));
        assert_eq!(estimator.max_rtt(), Some(ms(300)));
        assert_eq!(estimator.avg_rtt(), Some(ms(200)));
        assert_eq!(estimator.n_samples(), 2);
    }
}
