//! Command handlers, grouped by what drives them: [`intents`] answers
//! [`raven_types::intents::ControlIntent`]s from the UI, [`mesh`] answers
//! inbound packets from the BLE mesh (design spec §4.6/§4.7).

pub mod channel;
pub mod intents;
pub mod mesh;
