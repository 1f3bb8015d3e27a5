pub mod constraints;
pub mod engine;
pub mod forces;
pub mod integrator;
pub mod states;
