// Autoraffle: a periodically settled, multi-winner raffle on Solana

pub mod error;
pub mod instruction;
pub mod processor;
pub mod state;
pub mod utils;

// Randomness request/fulfillment bookkeeping
pub mod vrf;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;

use solana_program::{account_info::AccountInfo, entrypoint::ProgramResult, pubkey::Pubkey};

pub fn process_instruction(
    program_id: &Pubkey,
    accounts: &[AccountInfo],
    instruction_data: &[u8],
) -> ProgramResult {
    processor::Processor::process(program_id, accounts, instruction_data)
}
