//! Demo source that generates a synthetic race session
//!
//! Simulates laps around an elliptical circuit with straights, braking zones,
//! corners and acceleration phases. Produces one snapshot per 200 ms tick
//! without requiring a running simulator. The circuit's centerline and
//! reference lap are available through [`DemoSource::track_data`] so the
//! analytics engine can map and plan the demo session.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use pitwall_analytics::{normalize_track_key, MemoryBackend};
use pitwall_core::units::{Celsius, Liters, Meters, Psi, Radians, Seconds};
use pitwall_core::{
    CarPosition, SessionFlag, TelemetrySnapshot, TelemetrySource, WheelSample, WheelSet,
};
use std::f32::consts::TAU;
use tracing::{debug, info};

/// Simulated time between snapshots
pub const TICK_MS: i64 = 200;
const TICK_SECS: f32 = TICK_MS as f32 / 1000.0;

pub const TRACK_NAME: &str = "Demo Circuit";
const SEMI_MAJOR: f32 = 420.0;
const SEMI_MINOR: f32 = 260.0;
const CENTERLINE_POINTS: usize = 160;

const SESSION_LENGTH: f32 = 1800.0;
const FUEL_CAPACITY: f32 = 60.0;
const FUEL_PER_LAP: f32 = 2.8;

const PLAYER_CAR: u32 = 0;

// =============================================================================
// Track definition: a sequence of segments that form a lap
// =============================================================================

#[derive(Clone, Copy)]
enum SegmentKind {
    Straight,
    Braking,
    Corner,
    Accel,
}

#[derive(Clone, Copy)]
struct TrackSegment {
    kind: SegmentKind,
    duration: f32,     // seconds to traverse at representative pace
    target_speed: f32, // m/s at end of segment
    steering: f32,     // peak steering angle in radians (+ = right)
    lateral_g: f32,    // peak lateral G
}

/// A simple circuit: ~84s lap, mix of corners and straights
fn demo_track() -> Vec<TrackSegment> {
    use SegmentKind::*;
    let seg = |kind, duration, target_speed, steering, lateral_g| TrackSegment {
        kind,
        duration,
        target_speed,
        steering,
        lateral_g,
    };
    vec![
        // Start/finish straight
        seg(Straight, 8.0, 75.0, 0.0, 0.0),
        // T1: heavy braking into slow right-hander
        seg(Braking, 3.0, 28.0, 0.02, 0.1),
        seg(Corner, 4.0, 25.0, 0.35, 1.8),
        seg(Accel, 3.5, 55.0, 0.1, 0.4),
        seg(Straight, 4.0, 62.0, 0.0, 0.0),
        // T2: medium braking into fast left-hander
        seg(Braking, 2.0, 45.0, -0.02, -0.1),
        seg(Corner, 3.5, 42.0, -0.22, -1.5),
        seg(Accel, 3.0, 58.0, -0.05, -0.3),
        // Back straight
        seg(Straight, 10.0, 80.0, 0.0, 0.0),
        // T3: chicane
        seg(Braking, 2.5, 35.0, 0.05, 0.2),
        seg(Corner, 2.0, 32.0, 0.30, 1.6),
        seg(Corner, 2.0, 30.0, -0.32, -1.7),
        seg(Accel, 3.0, 50.0, -0.05, -0.2),
        seg(Straight, 6.0, 68.0, 0.0, 0.0),
        // T4: long sweeping right
        seg(Braking, 1.5, 52.0, 0.03, 0.1),
        seg(Corner, 5.0, 50.0, 0.18, 1.3),
        seg(Accel, 3.0, 60.0, 0.05, 0.3),
        // T5: tight hairpin left
        seg(Braking, 3.5, 22.0, -0.03, -0.1),
        seg(Corner, 4.5, 20.0, -0.42, -1.2),
        seg(Accel, 4.0, 55.0, -0.1, -0.3),
        // Run to start/finish
        seg(Straight, 6.0, 72.0, 0.0, 0.0),
    ]
}

// =============================================================================
// Interpolation state, derived from lap time
// =============================================================================

struct LapState {
    speed: f32,
    throttle: f32,
    brake: f32,
    steering: f32,
    lateral_g: f32,
    longitudinal_g: f32,
}

fn compute_lap_state(track: &[TrackSegment], lap_time: f32) -> LapState {
    let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
    let t = lap_time.rem_euclid(lap_duration);

    let mut elapsed = 0.0_f32;
    let mut seg_idx = 0;
    for (i, seg) in track.iter().enumerate() {
        seg_idx = i;
        if elapsed + seg.duration > t || i == track.len() - 1 {
            break;
        }
        elapsed += seg.duration;
    }

    let seg = track[seg_idx];
    let seg_t = ((t - elapsed) / seg.duration).clamp(0.0, 1.0);
    let prev_target_speed = track[(seg_idx + track.len() - 1) % track.len()].target_speed;

    let smooth_t = smoothstep(seg_t);
    let speed = lerp(prev_target_speed, seg.target_speed, smooth_t);

    let (throttle, brake) = match seg.kind {
        // Slight lift approaching the end of the straight
        SegmentKind::Straight => (0.95 + 0.05 * (1.0 - seg_t), 0.0),
        // Starts heavy, eases off
        SegmentKind::Braking => (0.0, (1.0 - smooth_t * 0.3).clamp(0.0, 1.0)),
        SegmentKind::Corner => (0.2 + 0.3 * seg_t, 0.0),
        SegmentKind::Accel => (0.5 + 0.5 * smooth_t, 0.0),
    };

    // Ramp in during the first half, out during the second
    let envelope = if seg_t < 0.5 {
        smoothstep(seg_t * 2.0)
    } else {
        smoothstep((1.0 - seg_t) * 2.0)
    };

    LapState {
        speed,
        throttle,
        brake,
        steering: seg.steering * envelope,
        lateral_g: seg.lateral_g * envelope,
        longitudinal_g: (seg.target_speed - prev_target_speed) / seg.duration / 9.81,
    }
}

fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Simple deterministic noise from a seed
fn noise(seed: f32) -> f32 {
    let x = (seed * 12.9898 + 78.233).sin() * 43_758.547;
    x - x.floor()
}

/// Small jitter centered around 0
fn jitter(seed: f32, amplitude: f32) -> f32 {
    (noise(seed) - 0.5) * 2.0 * amplitude
}

/// Point on the circuit at a fraction of the lap, in the (x, z) plane
fn circuit_point(fraction: f32) -> (f32, f32) {
    let angle = TAU * fraction.rem_euclid(1.0);
    (SEMI_MAJOR * angle.cos(), SEMI_MINOR * angle.sin())
}

// =============================================================================
// DemoSource
// =============================================================================

/// A rival lapping at a constant pace
struct Rival {
    car_id: u32,
    lap_time: f32,
    offset: f32,
}

impl Rival {
    fn fraction(&self, elapsed: f32) -> f32 {
        ((elapsed + self.offset) / self.lap_time).fract()
    }
}

pub struct DemoSource {
    active: bool,
    started_at: Option<DateTime<Utc>>,
    tick: u64,
    track: Vec<TrackSegment>,
    lap_duration: f32,
    /// Fraction of the current lap completed
    lap_progress: f32,
    /// Multiplier on the lap duration for the lap in progress
    lap_pace: f32,
    laps_completed: u32,
    last_lap: f32,
    fuel_left: f32,
    rivals: Vec<Rival>,
}

impl DemoSource {
    pub fn new() -> Self {
        let track = demo_track();
        let lap_duration: f32 = track.iter().map(|s| s.duration).sum();
        Self {
            active: false,
            started_at: None,
            tick: 0,
            rivals: vec![
                Rival {
                    car_id: 1,
                    lap_time: lap_duration - 1.5,
                    offset: 10.0,
                },
                Rival {
                    car_id: 2,
                    lap_time: lap_duration + 1.0,
                    offset: 25.0,
                },
            ],
            track,
            lap_duration,
            lap_progress: 0.0,
            lap_pace: 1.0,
            laps_completed: 0,
            last_lap: 0.0,
            fuel_left: FUEL_CAPACITY,
        }
    }

    /// Cache key of the demo circuit
    pub fn track_key() -> String {
        normalize_track_key(TRACK_NAME)
    }

    /// Lap time at representative pace, used as the reference lap
    pub fn reference_lap() -> Seconds {
        Seconds(demo_track().iter().map(|s| s.duration).sum())
    }

    /// Centerline record of the demo circuit as `[{"x": .., "z": ..}, ..]`
    pub fn centerline_json() -> String {
        let points: Vec<serde_json::Value> = (0..CENTERLINE_POINTS)
            .map(|i| {
                let (x, z) = circuit_point(i as f32 / CENTERLINE_POINTS as f32);
                serde_json::json!({ "x": x, "z": z })
            })
            .collect();
        serde_json::Value::Array(points).to_string()
    }

    /// Track data for the demo circuit, to chain in front of the file store
    pub fn track_data() -> MemoryBackend {
        let key = Self::track_key();
        MemoryBackend::new()
            .with_centerline(&key, Self::centerline_json())
            .with_reference_lap(&key, format!("{:.1}", Self::reference_lap().0))
    }

    pub fn laps_completed(&self) -> u32 {
        self.laps_completed
    }

    fn advance_player(&mut self) {
        let lap_time = self.lap_duration * self.lap_pace;
        self.lap_progress += TICK_SECS / lap_time;
        self.fuel_left = (self.fuel_left - FUEL_PER_LAP * TICK_SECS / lap_time).max(0.0);

        if self.lap_progress >= 1.0 {
            self.lap_progress -= 1.0;
            self.laps_completed += 1;
            self.last_lap = lap_time;
            // Vary pace lap to lap so sector dominance has something to show
            self.lap_pace = 1.0 + jitter(self.laps_completed as f32, 0.03);
            debug!(lap = self.laps_completed, lap_time, "demo lap completed");
        }
    }

    fn generate_snapshot(&mut self) -> TelemetrySnapshot {
        let started_at = *self.started_at.get_or_insert_with(Utc::now);
        let timestamp = started_at + Duration::milliseconds(self.tick as i64 * TICK_MS);
        let elapsed = self.tick as f32 * TICK_SECS;
        self.tick += 1;
        let n = self.tick as f32; // noise seed

        self.advance_player();
        let state = compute_lap_state(&self.track, self.lap_progress * self.lap_duration);

        let speed = (state.speed + jitter(n, 0.3)).max(0.0);
        let throttle = (state.throttle + jitter(n * 1.2, 0.02)).clamp(0.0, 1.0);
        let brake = (state.brake + jitter(n * 1.3, 0.02)).clamp(0.0, 1.0);
        let steering = state.steering + jitter(n * 1.4, 0.005);
        let lat_g = state.lateral_g + jitter(n * 1.5, 0.05);
        let long_g = state.longitudinal_g + jitter(n * 1.6, 0.03);

        let make_wheel = |is_left: bool, is_front: bool| {
            let seed = n + if is_left { 0.0 } else { 1.0 } + if is_front { 0.0 } else { 2.0 };
            let lat_load = if is_left { -lat_g } else { lat_g } * 0.008;
            let long_load = if is_front { long_g } else { -long_g } * 0.006;
            let travel = (0.05 + lat_load + long_load + jitter(seed, 0.001)).max(0.01);

            // Fronts take the braking, rears the traction
            let slip_ratio = if is_front {
                brake * 0.08 + jitter(seed * 3.0, 0.01)
            } else {
                throttle * 0.05 + jitter(seed * 3.0, 0.01)
            };
            let heat_base = if is_front { 82.0 } else { 76.0 };
            let heat = speed * 0.15 + lat_g.abs() * 3.0 + brake * 6.0;

            WheelSample {
                slip_ratio,
                slip_angle: Radians(steering.abs() * 0.1 + jitter(seed * 3.1, 0.005)),
                suspension_travel: Meters(travel),
                core_temp: Celsius(heat_base + heat + jitter(seed * 2.2, 0.5)),
                pressure: Psi(26.0 + heat * 0.05 + jitter(seed * 2.4, 0.1)),
            }
        };

        let (x, z) = circuit_point(self.lap_progress);
        let mut cars = vec![CarPosition::new(PLAYER_CAR, x, 0.5, z)];
        cars.extend(self.rivals.iter().map(|rival| {
            let (x, z) = circuit_point(rival.fraction(elapsed));
            CarPosition::new(rival.car_id, x, 0.5, z)
        }));
        // Empty grid slot, reported at the origin like the simulator does
        cars.push(CarPosition::new(3, 0.0, 0.0, 0.0));

        let session_time_left = (SESSION_LENGTH - elapsed).max(0.0);
        let session_flag = if session_time_left > 0.0 {
            SessionFlag::Green
        } else {
            SessionFlag::Checkered
        };

        TelemetrySnapshot {
            timestamp,
            source: "Demo".to_string(),
            fuel_left: Liters(self.fuel_left),
            fuel_per_lap: Liters(FUEL_PER_LAP),
            last_lap_time: Seconds(self.last_lap),
            session_time_left: Seconds(session_time_left),
            track_id: TRACK_NAME.to_string(),
            session_flag,
            brake,
            throttle,
            abs_level: 2.0,
            tc_level: 3.0,
            wheels: WheelSet::new(
                make_wheel(true, true),
                make_wheel(false, true),
                make_wheel(true, false),
                make_wheel(false, false),
            ),
            tyre_wear_aid_rate: 1.0,
            cars,
            player_car_id: Some(PLAYER_CAR),
        }
    }
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for DemoSource {
    fn name(&self) -> &str {
        "Demo"
    }

    fn detect(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<()> {
        let fresh = Self::new();
        *self = Self {
            active: true,
            ..fresh
        };
        info!(track = TRACK_NAME, "demo session started");
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.active = false;
        self.started_at = None;
        Ok(())
    }

    fn read_snapshot(&mut self) -> Result<Option<TelemetrySnapshot>> {
        if !self.active {
            return Ok(None);
        }
        Ok(Some(self.generate_snapshot()))
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
