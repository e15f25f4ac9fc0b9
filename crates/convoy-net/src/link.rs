//! Seeded, in-memory one-way link with a reliable and an unreliable channel.
//!
//! Stands in for a real connection in tests and in the headless simulator.
//! The reliable channel behaves like an ordered stream: nothing is lost and
//! nothing overtakes. The unreliable channel loses, duplicates and (through
//! jitter) reorders datagrams.

use convoy_config::LinkConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Which delivery guarantees a message gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Never lost, delivered in send order.
    Reliable,
    /// May be lost, duplicated or reordered.
    Unreliable,
}

/// A message arriving at the far end.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Arrival time on the link's clock.
    pub at: f64,
    /// Channel it was sent on.
    pub channel: Channel,
    /// Payload bytes.
    pub bytes: Vec<u8>,
}

/// Link behaviour, in seconds and probabilities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConditions {
    /// Probability that an unreliable message is lost.
    pub loss: f64,
    /// Base one-way delay applied to both channels.
    pub latency: f64,
    /// Upper bound of the extra uniform delay on the unreliable channel.
    pub jitter: f64,
    /// Probability that an unreliable message arrives twice.
    pub duplicate: f64,
}

impl LinkConditions {
    /// A link that delivers everything after `latency` seconds.
    pub fn perfect(latency: f64) -> Self {
        Self {
            loss: 0.0,
            latency,
            jitter: 0.0,
            duplicate: 0.0,
        }
    }

    /// Clamps probabilities into `[0, 1]` and delays to non-negative values.
    pub fn sanitized(self) -> Self {
        Self {
            loss: clamp_probability(self.loss),
            latency: non_negative(self.latency),
            jitter: non_negative(self.jitter),
            duplicate: clamp_probability(self.duplicate),
        }
    }
}

impl From<&LinkConfig> for LinkConditions {
    fn from(config: &LinkConfig) -> Self {
        Self {
            loss: config.loss,
            latency: config.latency_ms / 1000.0,
            jitter: config.jitter_ms / 1000.0,
            duplicate: config.duplicate,
        }
        .sanitized()
    }
}

fn clamp_probability(p: f64) -> f64 {
    if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { 0.0 }
}

/// Lifetime counters for one link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Messages handed to [`SimulatedLink::send`].
    pub sent: u64,
    /// Unreliable messages lost.
    pub dropped: u64,
    /// Extra copies created.
    pub duplicated: u64,
    /// Messages returned from [`SimulatedLink::poll`].
    pub delivered: u64,
}

#[derive(Debug, Clone)]
struct InFlight {
    delivery: Delivery,
    sequence: u64,
}

/// A one-way link between two peers.
#[derive(Debug, Clone)]
pub struct SimulatedLink {
    conditions: LinkConditions,
    rng: StdRng,
    in_flight: Vec<InFlight>,
    next_sequence: u64,
    /// Arrival time of the most recent reliable message, so later ones never
    /// overtake it.
    reliable_tail: f64,
    stats: LinkStats,
}

impl SimulatedLink {
    /// Creates a link whose randomness is fully determined by `seed`.
    pub fn new(conditions: LinkConditions, seed: u64) -> Self {
        Self {
            conditions: conditions.sanitized(),
            rng: StdRng::seed_from_u64(seed),
            in_flight: Vec::new(),
            next_sequence: 0,
            reliable_tail: f64::NEG_INFINITY,
            stats: LinkStats::default(),
        }
    }

    pub fn conditions(&self) -> &LinkConditions {
        &self.conditions
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Messages sent but not yet polled.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Sends `bytes` at time `now`.
    pub fn send(&mut self, now: f64, channel: Channel, bytes: Vec<u8>) {
        self.stats.sent += 1;
        match channel {
            Channel::Reliable => {
                let at = (now + self.conditions.latency).max(self.reliable_tail);
                self.reliable_tail = at;
                self.enqueue(at, channel, bytes);
            }
            Channel::Unreliable => {
                if self.rng.random_bool(self.conditions.loss) {
                    self.stats.dropped += 1;
                    tracing::trace!(now, "link dropped datagram");
                    return;
                }
                if self.rng.random_bool(self.conditions.duplicate) {
                    self.stats.duplicated += 1;
                    let at = self.unreliable_arrival(now);
                    self.enqueue(at, channel, bytes.clone());
                }
                let at = self.unreliable_arrival(now);
                self.enqueue(at, channel, bytes);
            }
        }
    }

    fn unreliable_arrival(&mut self, now: f64) -> f64 {
        let jitter = if self.conditions.jitter > 0.0 {
            self.rng.random_range(0.0..self.conditions.jitter)
        } else {
            0.0
        };
        now + self.conditions.latency + jitter
    }

    fn enqueue(&mut self, at: f64, channel: Channel, bytes: Vec<u8>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.in_flight.push(InFlight {
            delivery: Delivery { at, channel, bytes },
            sequence,
        });
    }

    /// Returns every message that has arrived by `now`, earliest first.
    /// Messages arriving at the same instant keep their send order.
    pub fn poll(&mut self, now: f64) -> Vec<Delivery> {
        let (mut arrived, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight)
            .into_iter()
            .partition(|flight| flight.delivery.at <= now);
        self.in_flight = pending;

        arrived.sort_by(|a, b| {
            a.delivery
                .at
                .total_cmp(&b.delivery.at)
                .then(a.sequence.cmp(&b.sequence))
        });
        self.stats.delivered += arrived.len() as u64;
        arrived.into_iter().map(|flight| flight.delivery).collect()
    }
}
