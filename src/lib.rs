//! Bridge between a home-automation hub's normalized entity contracts and two
//! vendor device clouds: a smart-thermostat API (polled over HTTP) and a
//! robotic-vacuum SDK (push-based stats reports).

pub mod models {
    pub mod tado;
    pub mod vacuum;
}

pub mod client;
pub mod config;
pub mod connector;
pub mod entities;
pub mod hub;
pub mod utils;
pub mod vacuum;
