use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::LiveEvent;

/// Synthesizes plausible live events while the push channel is unavailable.
pub struct Simulator {
    rng: StdRng,
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn next_event(&mut self) -> LiveEvent {
        LiveEvent {
            timestamp: Utc::now(),
            active_sessions: self.rng.gen_range(1..=10),
            predictions_processed: self.rng.gen_range(100..500),
            alerts: self.rng.gen_range(0..3),
            system_health: "optimal".to_string(),
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
