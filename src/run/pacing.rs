use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::record::step_model::{Sequence, Step};

fn default_min_ms() -> u64 {
    300
}

fn default_max_ms() -> u64 {
    800
}

/// Human-like pacing between steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    #[serde(default = "default_min_ms")]
    pub random_delay_min_ms: u64,

    #[serde(default = "default_max_ms")]
    pub random_delay_max_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            random_delay_min_ms: default_min_ms(),
            random_delay_max_ms: default_max_ms(),
        }
    }
}

impl PacingConfig {
    pub fn fixed(ms: u64) -> Self {
        Self {
            random_delay_min_ms: ms,
            random_delay_max_ms: ms,
        }
    }

    /// Step override, else the sequence default, else a random pause in range.
    pub fn step_delay<R: Rng>(&self, step: &Step, sequence: &Sequence, rng: &mut R) -> Duration {
        let ms = step.delay_ms.or(sequence.global_delay_ms).unwrap_or_else(|| {
            let lo = self.random_delay_min_ms.min(self.random_delay_max_ms);
            let hi = self.random_delay_min_ms.max(self.random_delay_max_ms);
            rng.gen_range(lo..=hi)
        });
        Duration::from_millis(ms)
    }
}

/// Suspension point between steps.
pub trait Pacer {
    fn pause(&mut self, duration: Duration);
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pause(&mut self, duration: Duration) {
        (**self).pause(duration)
    }
}

/// Sleeps the calling thread.
#[derive(Debug, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

/// Records requested pauses without waiting.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    pub pauses: Vec<Duration>,
}

impl Pacer for RecordingPacer {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

/// Cooperative stop flag shared between a run and its observers.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::bundle::bundle_model::{ContextChain, ElementBundle, LocatorSet};

    fn step() -> Step {
        let locators = LocatorSet {
            id: Some("go".into()),
            ..LocatorSet::default()
        };
        Step::click(ElementBundle::new(locators, ContextChain::default()).unwrap())
    }

    #[test]
    fn delay_precedence_is_step_then_sequence_then_random() {
        let config = PacingConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut sequence = Sequence::new(vec![]);

        let random = config.step_delay(&step(), &sequence, &mut rng);
        assert!((300..=800).contains(&(random.as_millis() as u64)));

        sequence.global_delay_ms = Some(50);
        assert_eq!(config.step_delay(&step(), &sequence, &mut rng), Duration::from_millis(50));
        assert_eq!(
            config.step_delay(&step().with_delay(5), &sequence, &mut rng),
            Duration::from_millis(5)
        );
    }

    #[test]
    fn cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let observer = token.clone();
        observer.cancel();
        assert!(token.is_cancelled());
    }
}
