//! Synthetic test-data generator standing in for the serial line.
//!
//! Emits plain-text sensor lines at a fixed interval and, optionally, a bare
//! fall keyword every 60-120 s.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use fallsight_common::Origin;

use super::{Transport, TransportError};

const FALL_INTERVAL_SECS: Range<u64> = 60..121;

pub struct SyntheticTransport {
    interval: Duration,
    simulate_falls: bool,
    rng: SmallRng,
    ticker: Option<Interval>,
    next_fall: Option<Instant>,
}

impl SyntheticTransport {
    pub fn new(interval: Duration, simulate_falls: bool) -> Self {
        Self::with_rng(interval, simulate_falls, SmallRng::from_os_rng())
    }

    /// Deterministic generator for tests.
    pub fn with_rng(interval: Duration, simulate_falls: bool, rng: SmallRng) -> Self {
        Self {
            interval,
            simulate_falls,
            rng,
            ticker: None,
            next_fall: None,
        }
    }

    fn schedule_fall(&mut self) {
        let delay = Duration::from_secs(self.rng.random_range(FALL_INTERVAL_SECS));
        tracing::debug!(in_secs = delay.as_secs(), "Next simulated fall scheduled");
        self.next_fall = Some(Instant::now() + delay);
    }

    fn reading_line(&mut self) -> Vec<u8> {
        let rng = &mut self.rng;
        format!(
            "temp:{:.2},hum:{:.2},press:{:.2},acc_x:{:.3},acc_y:{:.3},acc_z:{:.3},gyro_x:{:.3},gyro_y:{:.3},gyro_z:{:.3}",
            20.0 + rng.random_range(-5.0..15.0),
            50.0 + rng.random_range(-20.0..30.0),
            1013.0 + rng.random_range(-10.0..20.0),
            rng.random_range(-2.0..2.0),
            rng.random_range(-2.0..2.0),
            rng.random_range(-2.0..2.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
            rng.random_range(-50.0..50.0),
        )
        .into_bytes()
    }
}

#[async_trait]
impl Transport for SyntheticTransport {
    fn origin(&self) -> Origin {
        Origin::Synthetic
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.ticker = Some(ticker);

        if self.simulate_falls {
            self.schedule_fall();
        }

        tracing::info!(
            interval = ?self.interval,
            simulate_falls = self.simulate_falls,
            "Synthetic data generator started"
        );
        Ok(())
    }

    async fn next_record(&mut self) -> Result<Vec<u8>, TransportError> {
        let ticker = self
            .ticker
            .as_mut()
            .ok_or_else(|| TransportError::lost("generator not started"))?;

        match self.next_fall {
            Some(fall_at) => {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tokio::time::sleep_until(fall_at) => {
                        self.schedule_fall();
                        return Ok(b"CAIDA".to_vec());
                    }
                }
            }
            None => {
                ticker.tick().await;
            }
        }

        Ok(self.reading_line())
    }

    async fn is_alive(&mut self) -> bool {
        self.ticker.is_some()
    }

    async fn disconnect(&mut self) {
        self.ticker = None;
        self.next_fall = None;
    }
}
