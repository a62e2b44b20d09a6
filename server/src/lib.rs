//! # Authoritative Host
//!
//! The host owns the physical truth for every actor. Peers send requests;
//! the host validates the sender, applies them to its world, and broadcasts
//! the outcome of discrete events. Continuous state (transforms) goes out
//! every tick as a world snapshot.
//!
//! ## Tick order
//!
//! Per fixed tick, for every actor: condition damage, the death check and
//! Hit report, grab joint health, then the movement solver (crouch, ground
//! carrier, seat approach, body rotation). Afterwards seat and controlled
//! key edges are flushed and the engine steps; new contacts feed impact
//! damage.
//!
//! ## Modules
//!
//! - `physics`: a small reference engine implementing the shared query port
//! - `movement`: the movement solver and jump
//! - `rotation`: rate-limited body rotation towards the replicated look
//! - `interaction`: authority side of the start/stop handshake and grabs
//! - `seat`: seat binding and relayed key edges
//! - `health`: impact, explosion and condition damage, the death transition
//! - `emulation`: emulated key events raised by buttons, seats and actors
//! - `host`: the request dispatcher with sender authentication
//! - `client_manager`: peer addresses, actor binding, timeouts
//! - `scene`: the demo level
//! - `network`: the UDP host loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use shared::{ControllerConfig, NetConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server =
//!         Server::new("127.0.0.1:8080", NetConfig::default(), ControllerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod emulation;
pub mod health;
pub mod host;
pub mod interaction;
pub mod movement;
pub mod network;
pub mod physics;
pub mod rotation;
pub mod scene;
pub mod seat;
