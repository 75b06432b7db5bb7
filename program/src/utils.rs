// Autoraffle Program - Utility Functions
use solana_program::pubkey::Pubkey;

use crate::{
    error::RaffleError,
    state::{CONFIG_SEED, ROUND_SEED, VAULT_SEED},
};

/// Calculate number of tickets bought by a deposit.
///
/// Any remainder below one full entrance fee stays in the pool.
pub fn calculate_tickets(amount: u64, entrance_fee: u64) -> Result<u64, RaffleError> {
    if entrance_fee == 0 {
        return Err(RaffleError::InvalidConfiguration);
    }
    if amount < entrance_fee {
        return Err(RaffleError::InsufficientPayment);
    }
    Ok(amount / entrance_fee)
}

/// Per-winner amount and admin amount for a settled pool
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Payouts {
    /// Amount sent to every winner
    pub per_winner: u64,
    /// Everything else, including rounding dust
    pub owner_share: u64,
}

/// Split the pool between `number_of_winners` winners and the admin.
///
/// Both divisions truncate; the admin receives whatever the winners do not.
pub fn calculate_payouts(
    pool: u64,
    winner_share_percent: u8,
    number_of_winners: u8,
) -> Result<Payouts, RaffleError> {
    if number_of_winners == 0 || winner_share_percent > 100 {
        return Err(RaffleError::InvalidConfiguration);
    }

    // u128 so pool * percent cannot overflow
    let winners_total = (pool as u128) * (winner_share_percent as u128) / 100;
    let per_winner = (winners_total / number_of_winners as u128) as u64;

    let paid_to_winners = per_winner
        .checked_mul(number_of_winners as u64)
        .ok_or(RaffleError::AmountOverflow)?;
    let owner_share = pool
        .checked_sub(paid_to_winners)
        .ok_or(RaffleError::AmountOverflow)?;

    Ok(Payouts {
        per_winner,
        owner_share,
    })
}

/// Reduce a random word onto the roster
pub fn winner_index(random_word: u64, player_count: usize) -> Option<usize> {
    if player_count == 0 {
        return None;
    }
    Some((random_word % player_count as u64) as usize)
}

/// Pool held by the vault above its rent-exempt reserve
pub fn pool_balance(vault_lamports: u64, rent_reserve: u64) -> u64 {
    vault_lamports.saturating_sub(rent_reserve)
}

/// Find the program derived address of the config account
pub fn find_config_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[CONFIG_SEED], program_id)
}

/// Find the program derived address of the round account
pub fn find_round_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ROUND_SEED], program_id)
}

/// Find the program derived address of the vault holding the pool
pub fn find_vault_address(program_id: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED], program_id)
}

/// Convert lamports to SOL (for display purposes)
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / 1_000_000_000.0
}
