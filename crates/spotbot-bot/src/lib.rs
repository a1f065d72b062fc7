//! RSI/moving-average spot trading bot.
//!
//! Wires the components together and drives them:
//! - REST client and trading rules for one symbol
//! - Signal engine evaluated on a fixed cadence
//! - Order manager fed by the signal and by the user data stream
//! - Graceful shutdown that stops the stream and cancels open orders

pub mod app;
pub mod config;
pub mod error;

pub use app::{Application, ShutdownHandle};
pub use config::{credentials_from_env, AppConfig};
pub use error::{AppError, AppResult};
