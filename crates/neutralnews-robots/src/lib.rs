mod gate;

pub use gate::{Decision, Purpose, RobotsGate};
