//! # Controlling Peer
//!
//! The client drives one actor on a host it does not own. It samples input,
//! runs the look rotation every frame, and relays intent to the authority.
//! Nothing physical is simulated locally: the world here is a mirror that
//! only changes when the authority says so.
//!
//! ## No local tentative state
//!
//! Pressing interact sends a start request and nothing else. The actor
//! becomes the holder when the RemoteStartInteraction broadcast comes back.
//! A request that is lost or rejected simply never completes; the player
//! presses again.
//!
//! ## Relay cadence
//!
//! Direction and look rotation go out on the fixed tick, every fifth tick
//! over the wire and every tick when the local process is the authority.
//! Jump, crouch, the controlling flag and seat keys are sent immediately.
//!
//! ## Modules
//!
//! - `input`: devices, axis smoothing and button edges
//! - `look`: look rotation, zoom and camera placement
//! - `channel`: outbound requests and the relay cadence
//! - `interaction`: look-target acquisition, press/release handling
//! - `session`: local role and the single controlled actor
//! - `mirror`: applies authority notifications and snapshots
//! - `scene`: look-ray picking against the mirror
//! - `controller`: the per-frame driver tying these together
//! - `network`: the UDP client loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::WanderDevice;
//! use client::network::Client;
//! use shared::NetConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Box::new(WanderDevice::new(1));
//!     let mut client = Client::new("127.0.0.1:8080", NetConfig::default(), device, true).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod controller;
pub mod input;
pub mod interaction;
pub mod look;
pub mod mirror;
pub mod network;
pub mod scene;
pub mod session;
