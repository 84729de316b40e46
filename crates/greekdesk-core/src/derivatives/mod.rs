pub mod composite;
pub mod forwards;
pub mod options;
pub mod payoff;
