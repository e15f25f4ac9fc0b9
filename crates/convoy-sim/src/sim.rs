//! Deterministic multi-peer run of one synchronized vehicle.
//!
//! Peer 0 is the server. Peers `1..=observers` are clients. Every ordered
//! pair of peers is joined by its own [`SimulatedLink`], and each peer keeps
//! its own clock with an unrelated epoch, as real peers would.
//!
//! Each peer only accepts traffic from the server and from the peer it
//! believes controls the vehicle. A previous owner keeps streaming until the
//! possession change reaches it, and its snapshots are stamped on a
//! different clock, so they must not reach the new owner's observers.

use std::collections::BTreeMap;

use convoy_config::Config;
use convoy_net::{Dispatched, LinkConditions, Outbox, PeerBinding, SimulatedLink, dispatch};
use convoy_sync::{Clock, KinematicBody, ManualClock, Role, RoleFlags, SyncedVehicle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::error::SimError;
use crate::script::DriveScript;
use crate::stats::{DivergenceStats, EventCounts, PeerReport, SimReport};
use crate::stepper::FixedStepper;

/// Id of the one vehicle in the run.
pub const VEHICLE_ID: u32 = 1;

/// Peer id of the server.
pub const SERVER_PEER: u32 = 0;

/// Velocity bleed on observing bodies, standing in for ground friction.
const OBSERVER_DAMPING: f32 = 2.0;

/// Spacing between peer clock epochs, in seconds.
const CLOCK_EPOCH_STEP: f64 = 17.0;

/// Upper bound on observers, keeping the link mesh small.
pub const MAX_OBSERVERS: u32 = 32;

struct Peer {
    id: u32,
    /// Peer this one currently takes vehicle state from.
    authority: u32,
    vehicle: SyncedVehicle,
    body: KinematicBody,
    clock: ManualClock,
    outbox: Outbox,
    events: EventCounts,
    divergence: DivergenceStats,
}

/// A scheduled possession change, announced by the server.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Handoff {
    at: f64,
    owner_peer: Option<u32>,
}

/// The whole simulated session.
pub struct Simulation {
    duration: f64,
    frame_rate: u32,
    frame_seed: u64,
    peers: Vec<Peer>,
    links: BTreeMap<(u32, u32), SimulatedLink>,
    script: DriveScript,
    handoffs: Vec<Handoff>,
    next_handoff: usize,
    time: f64,
}

impl Simulation {
    /// Builds the peers and links described by `config`.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        let sim = &config.sim;
        if !sim.duration_s.is_finite() || sim.duration_s <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "duration must be positive, got {}",
                sim.duration_s
            )));
        }
        if sim.frame_rate == 0 {
            return Err(SimError::InvalidConfig("frame rate must be non-zero".into()));
        }
        if sim.observers > MAX_OBSERVERS {
            return Err(SimError::InvalidConfig(format!(
                "at most {MAX_OBSERVERS} observers supported, got {}",
                sim.observers
            )));
        }
        if !(config.sync.send_rate.is_finite() && config.sync.send_rate > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "send rate must be positive, got {}",
                config.sync.send_rate
            )));
        }

        let peers: Vec<Peer> = (0..=sim.observers)
            .map(|id| {
                let flags = if id == SERVER_PEER {
                    RoleFlags::server()
                } else {
                    RoleFlags::remote_client()
                };
                Peer {
                    id,
                    authority: SERVER_PEER,
                    vehicle: SyncedVehicle::new(config.sync.clone(), flags),
                    body: KinematicBody::default(),
                    clock: ManualClock::new(f64::from(id) * CLOCK_EPOCH_STEP),
                    outbox: Outbox::new(VEHICLE_ID),
                    events: EventCounts::default(),
                    divergence: DivergenceStats::default(),
                }
            })
            .collect();

        let conditions = LinkConditions::from(&config.link);
        let mut links = BTreeMap::new();
        for from in 0..=sim.observers {
            for to in 0..=sim.observers {
                if from != to {
                    let seed = config
                        .link
                        .seed
                        .wrapping_add(u64::from(from) * 1000 + u64::from(to));
                    links.insert((from, to), SimulatedLink::new(conditions, seed));
                }
            }
        }

        let handoffs = if sim.possession_handoff && sim.observers > 0 {
            vec![
                Handoff {
                    at: sim.duration_s * 0.4,
                    owner_peer: Some(1),
                },
                Handoff {
                    at: sim.duration_s * 0.7,
                    owner_peer: None,
                },
            ]
        } else {
            Vec::new()
        };

        info!(
            observers = sim.observers,
            duration = sim.duration_s,
            loss = conditions.loss,
            latency = conditions.latency,
            jitter = conditions.jitter,
            "simulation configured"
        );

        Ok(Self {
            duration: sim.duration_s,
            frame_rate: sim.frame_rate,
            frame_seed: config.link.seed ^ 0x5EED,
            peers,
            links,
            script: DriveScript::new(sim.duration_s),
            handoffs,
            next_handoff: 0,
            time: 0.0,
        })
    }

    /// Runs to completion with irregular frame times and returns the summary.
    pub fn run(mut self) -> SimReport {
        let mut stepper = FixedStepper::new(self.frame_rate);
        let mut frames = StdRng::seed_from_u64(self.frame_seed);
        let base = stepper.dt();

        while stepper.total_sim_time() < self.duration {
            let frame_time = base * frames.random_range(0.5..1.5_f64);
            stepper.tick(frame_time, |dt, _| self.step(dt));
        }

        self.report(stepper.update_count())
    }

    /// Sim time elapsed so far.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Advances every peer by one fixed update.
    pub fn step(&mut self, dt: f64) {
        let now = self.time;
        self.deliver(now);
        self.run_handoffs(now);

        let frame_dt = dt as f32;
        for peer in &mut self.peers {
            let local_now = peer.clock.now();
            if peer.vehicle.role().is_owner() {
                self.script.drive(now, frame_dt, &mut peer.body);
                peer.body.integrate(frame_dt);
                peer.vehicle
                    .advance_send_timer(dt, local_now, &peer.body, &mut peer.outbox);
            } else {
                peer.body.integrate(frame_dt);
                peer.body.apply_damping(OBSERVER_DAMPING, frame_dt);
                peer.vehicle.tick(local_now, frame_dt, &mut peer.body);
            }
        }

        self.flush(now);
        self.collect_events();
        self.sample_divergence();

        for peer in &self.peers {
            peer.clock.advance(dt);
        }
        self.time += dt;
    }

    fn deliver(&mut self, now: f64) {
        let Self { links, peers, .. } = self;
        for (&(from, to), link) in links.iter_mut() {
            let Some(peer) = peers.get_mut(to as usize) else {
                continue;
            };
            let binding = PeerBinding {
                vehicle_id: VEHICLE_ID,
                local_peer: to,
            };
            for delivery in link.poll(now) {
                if from != SERVER_PEER && from != peer.authority {
                    debug!(from, to, "ignored message from previous owner");
                    continue;
                }
                let local_now = peer.clock.now();
                match dispatch(&delivery.bytes, binding, &mut peer.vehicle, local_now) {
                    Ok(Dispatched::OwnerChanged { owner_peer, .. }) => {
                        peer.authority = owner_peer.unwrap_or(SERVER_PEER);
                    }
                    Ok(_) => {}
                    Err(e) => warn!(from, to, "undecodable sync message: {e}"),
                }
            }
        }
    }

    fn run_handoffs(&mut self, now: f64) {
        while let Some(handoff) = self.handoffs.get(self.next_handoff).copied() {
            if handoff.at > now {
                break;
            }
            self.next_handoff += 1;

            let Some(server) = self.peers.first_mut() else {
                return;
            };
            info!(owner_peer = ?handoff.owner_peer, "possession handoff");
            server.outbox.announce_owner(handoff.owner_peer);
            server.authority = handoff.owner_peer.unwrap_or(SERVER_PEER);
            server.vehicle.on_possession_changed(
                handoff.owner_peer == Some(server.id),
                handoff.owner_peer.is_some(),
            );
        }
    }

    fn flush(&mut self, now: f64) {
        let Self { links, peers, .. } = self;
        for peer in peers.iter_mut() {
            for outgoing in peer.outbox.drain() {
                for (&(from, _), link) in links.iter_mut() {
                    if from == peer.id {
                        link.send(now, outgoing.channel, outgoing.bytes.clone());
                    }
                }
            }
        }
    }

    fn collect_events(&mut self) {
        for peer in &mut self.peers {
            for event in peer.vehicle.drain_events() {
                debug!(peer = peer.id, ?event, "sync event");
                peer.events.record(&event);
            }
        }
    }

    fn sample_divergence(&mut self) {
        let Some(owner) = self
            .peers
            .iter()
            .find(|peer| peer.vehicle.role().is_owner())
            .map(|peer| (peer.id, peer.body.position))
        else {
            return;
        };

        for peer in &mut self.peers {
            if peer.id != owner.0 && !peer.vehicle.role().is_owner() {
                peer.divergence.record(peer.body.position.distance(owner.1));
            }
        }
    }

    fn report(&self, updates: u64) -> SimReport {
        SimReport {
            sim_time: self.time,
            updates,
            peers: self
                .peers
                .iter()
                .map(|peer| PeerReport {
                    peer: peer.id,
                    final_role: peer.vehicle.role(),
                    events: peer.events,
                    divergence: peer.divergence,
                })
                .collect(),
            links: self
                .links
                .iter()
                .map(|(&(from, to), link)| (from, to, link.stats()))
                .collect(),
        }
    }

    /// Role of every peer, by id.
    pub fn roles(&self) -> Vec<Role> {
        self.peers.iter().map(|peer| peer.vehicle.role()).collect()
    }
}
