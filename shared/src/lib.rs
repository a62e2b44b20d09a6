//! Types and rules shared by the authoritative host and every controlling peer.
//!
//! The host owns the physical truth for each actor and interactable; peers only
//! propose changes. Everything that both sides must agree on lives here: the
//! wire envelope, the world tables with holder and seat bookkeeping, the
//! authority predicate, and the rotation math used for both the look and the
//! body rotation.

pub mod authority;
pub mod config;
pub mod ids;
pub mod input;
pub mod keys;
pub mod math;
pub mod physics;
pub mod protocol;
pub mod rotation;
pub mod world;

pub use authority::{Authority, SessionRole};
pub use config::{ConfigError, ControllerConfig, NetConfig, PitchLimits};
pub use ids::{ActorId, BodyHandle, InteractableId, JointHandle, PeerId};
pub use input::PendingInput;
pub use keys::{KeyCode, RelayKeys, RemoteKey};
pub use protocol::{NetError, Outgoing, Packet, Recipient};
pub use world::{Actor, Interactable, InteractableKind, SeatState, Started, Transform, World};

pub const PROTOCOL_VERSION: u32 = 1;

/// Fixed simulation rate of the authority.
pub const FIXED_TICK_HZ: u32 = 50;
pub const FIXED_TIMESTEP: f32 = 1.0 / FIXED_TICK_HZ as f32;

/// Direction/rotation relay cadence: one SetInput every N fixed ticks.
pub const INPUT_RELAY_INTERVAL: u64 = 5;

pub const CROUCH_SPEED_FACTOR: f32 = 0.5;
pub const SEAT_APPROACH_SPEED: f32 = 16.0;
pub const SEAT_SNAP_DISTANCE: f32 = 0.2;
pub const SEAT_OFFSET_STANDING: f32 = 1.75;
pub const SEAT_OFFSET_CROUCHED: f32 = 0.75;

/// Acceleration ceiling used while standing on a moving body.
pub const UNBOUNDED_ACCELERATION: f32 = 1_000_000.0;

pub const LOOK_PITCH_LIMIT: f32 = 85.0;
pub const BODY_ROTATION_STEP_DEGREES: f32 = 10.0;

pub const GROUND_RAY_LENGTH: f32 = 0.75;
pub const GROUND_CAST_RADIUS: f32 = 0.24;
pub const GROUND_CAST_DROP: f32 = 1.5;
pub const GROUND_RING_PROBES: usize = 8;

pub const HEADROOM_PROBE_RADIUS: f32 = 0.25;
pub const HEADROOM_PROBE_DISTANCE: f32 = 1.0;

pub const CORPSE_MASS: f32 = 0.3;
pub const CONDITION_DAMAGE_PER_TICK: f32 = 0.004;
