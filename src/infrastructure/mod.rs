//! Infrastructure layer - implementations of the domain ports

pub mod accounting;
pub mod accounts;
pub mod chain;
pub mod oracles;
pub mod protocols;
