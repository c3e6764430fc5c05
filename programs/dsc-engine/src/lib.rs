// Multi-collateral stablecoin engine
// Native Solana implementation - NO ANCHOR

use solana_program::entrypoint;

pub mod constants;
pub mod controller;
pub mod cpi;
pub mod custody;
pub mod engine;
pub mod error;
pub mod instructions;
pub mod math;
pub mod oracle;
pub mod pda;
pub mod processor;
pub mod state;
pub mod valuation;

pub use error::{DscError, ErrorCategory};

use processor::process_instruction;

// Declare program ID
solana_program::declare_id!("DscEngine1111111111111111111111111111111111");

#[cfg(not(feature = "no-entrypoint"))]
entrypoint!(process_instruction);
