//! IEEE 802.11 MAC header decoding.
//!
//! The frame control field selects the frame type and subtype; together with
//! the `toDs`/`fromDs` flags it decides which address fields follow and which
//! role (receiver, transmitter, destination, source, BSSID) each one plays.
//!
//! Only the MAC header is decoded. Frame bodies and the FCS are left alone,
//! and four-address (WDS) data frames are rejected explicitly.
pub mod error;
pub mod layout;
pub mod parser;
pub mod reader;

pub use error::Ieee80211Error;
pub use parser::{FrameSubtype, FrameType, Ieee80211Frame, decode_ieee80211};
