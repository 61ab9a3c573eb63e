//! EVM chain client

mod evm;

pub use evm::EvmChainClient;
