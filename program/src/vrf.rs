// Randomness request/fulfillment bookkeeping for the raffle program
use solana_program::{hash::hashv, msg, pubkey::Pubkey};

use crate::{
    error::RaffleError,
    state::{Config, Round, RoundState},
};

/// Issue the correlator for a new randomness request.
///
/// Derived from the round's request nonce and the current slot.
pub fn next_request_id(round: &mut Round, slot: u64) -> u64 {
    round.request_nonce = round.request_nonce.wrapping_add(1);
    let digest = hashv(&[
        b"request".as_ref(),
        &round.request_nonce.to_le_bytes(),
        &slot.to_le_bytes(),
    ]);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.to_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Check that a fulfillment comes from the coordinator and answers the
/// outstanding request with the right number of words
pub fn verify_fulfillment(
    config: &Config,
    round: &Round,
    signer: &Pubkey,
    request_id: u64,
    random_words: &[u64],
) -> Result<(), RaffleError> {
    if config.coordinator != *signer {
        msg!("Fulfillment signer {} is not the coordinator", signer);
        return Err(RaffleError::InvalidCoordinator);
    }

    if round.state != RoundState::Calculating || round.pending_request_id != Some(request_id) {
        msg!(
            "No outstanding request {} (pending: {:?})",
            request_id,
            round.pending_request_id
        );
        return Err(RaffleError::UnknownRequest);
    }

    if random_words.len() != round.requested_winners as usize {
        msg!(
            "Expected {} random words, got {}",
            round.requested_winners,
            random_words.len()
        );
        return Err(RaffleError::InvalidRandomness);
    }

    Ok(())
}
