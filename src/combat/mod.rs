pub mod abilities;
pub mod actions;
pub mod ai;
pub mod combatant;
pub mod conditions;
pub mod engine;
pub mod resolution;
pub mod rng;
pub mod snapshot;
pub mod state;
pub mod turns;

#[cfg(test)]
pub mod tests;
