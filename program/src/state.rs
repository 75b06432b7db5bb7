// Autoraffle Program - State
use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use borsh::{BorshDeserialize, BorshSerialize};
use solana_program::{
    clock::UnixTimestamp,
    program_error::ProgramError,
    program_pack::{IsInitialized, Pack, Sealed},
    pubkey::Pubkey,
};

use crate::{
    error::RaffleError,
    utils::{calculate_tickets, winner_index},
};

pub const CONFIG_SEED: &[u8] = b"config";
pub const ROUND_SEED: &[u8] = b"round";
pub const VAULT_SEED: &[u8] = b"vault";

/// Roster capacity, in tickets
pub const MAX_PLAYERS: usize = 256;
/// Upper bound on winners per draw
pub const MAX_WINNERS: usize = 8;

/// Lifecycle of the current round
#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundState {
    /// Accepting entries, a draw may start once ready
    Open,
    /// Randomness requested, waiting for fulfillment
    Calculating,
}

/// Program configuration account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Is the account initialized
    pub is_initialized: bool,
    /// Admin authority, receives the non-winner share of every pool
    pub admin: Pubkey,
    /// Signing key of the randomness provider
    pub coordinator: Pubkey,
    /// Price of one ticket in lamports
    pub entrance_fee: u64,
    /// Share of the pool split across all winners, 0..=100
    pub winner_share_percent: u8,
    /// Minimum seconds between settlements
    pub interval: UnixTimestamp,
    /// Winners picked per draw
    pub number_of_winners: u8,
    pub round_bump: u8,
    pub vault_bump: u8,
}

impl Config {
    /// Validate construction parameters
    pub fn validate(
        entrance_fee: u64,
        winner_share_percent: u8,
        interval: UnixTimestamp,
        number_of_winners: u8,
    ) -> Result<(), RaffleError> {
        if entrance_fee == 0 || winner_share_percent > 100 || interval <= 0 {
            return Err(RaffleError::InvalidConfiguration);
        }
        Self::validate_number_of_winners(number_of_winners)
    }

    fn validate_number_of_winners(number_of_winners: u8) -> Result<(), RaffleError> {
        if number_of_winners == 0 || number_of_winners as usize > MAX_WINNERS {
            return Err(RaffleError::InvalidConfiguration);
        }
        Ok(())
    }

    /// Gate for admin-only instructions
    pub fn check_admin(&self, signer: &Pubkey) -> Result<(), RaffleError> {
        if self.admin != *signer {
            return Err(RaffleError::InvalidAdmin);
        }
        Ok(())
    }

    /// Replace the interval; allowed in any round state
    pub fn set_interval(&mut self, interval: UnixTimestamp) -> Result<(), RaffleError> {
        if interval <= 0 {
            return Err(RaffleError::InvalidConfiguration);
        }
        self.interval = interval;
        Ok(())
    }

    /// Replace the winner count; rejected while a draw is in flight
    pub fn set_number_of_winners(
        &mut self,
        number_of_winners: u8,
        round: &Round,
    ) -> Result<(), RaffleError> {
        if round.state != RoundState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        Self::validate_number_of_winners(number_of_winners)?;
        self.number_of_winners = number_of_winners;
        Ok(())
    }
}

impl Sealed for Config {}

impl IsInitialized for Config {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }
}

impl Pack for Config {
    const LEN: usize = 1 + 32 + 32 + 8 + 1 + 8 + 1 + 1 + 1;

    fn unpack_from_slice(src: &[u8]) -> Result<Self, ProgramError> {
        let src = array_ref![src, 0, Config::LEN];
        let (
            is_initialized,
            admin,
            coordinator,
            entrance_fee,
            winner_share_percent,
            interval,
            number_of_winners,
            round_bump,
            vault_bump,
        ) = array_refs![src, 1, 32, 32, 8, 1, 8, 1, 1, 1];

        Ok(Config {
            is_initialized: is_initialized[0] != 0,
            admin: Pubkey::new_from_array(*admin),
            coordinator: Pubkey::new_from_array(*coordinator),
            entrance_fee: u64::from_le_bytes(*entrance_fee),
            winner_share_percent: winner_share_percent[0],
            interval: UnixTimestamp::from_le_bytes(*interval),
            number_of_winners: number_of_winners[0],
            round_bump: round_bump[0],
            vault_bump: vault_bump[0],
        })
    }

    fn pack_into_slice(&self, dst: &mut [u8]) {
        let dst = array_mut_ref![dst, 0, Config::LEN];
        let (
            is_initialized_dst,
            admin_dst,
            coordinator_dst,
            entrance_fee_dst,
            winner_share_percent_dst,
            interval_dst,
            number_of_winners_dst,
            round_bump_dst,
            vault_bump_dst,
        ) = mut_array_refs![dst, 1, 32, 32, 8, 1, 8, 1, 1, 1];

        is_initialized_dst[0] = self.is_initialized as u8;
        admin_dst.copy_from_slice(self.admin.as_ref());
        coordinator_dst.copy_from_slice(self.coordinator.as_ref());
        *entrance_fee_dst = self.entrance_fee.to_le_bytes();
        winner_share_percent_dst[0] = self.winner_share_percent;
        *interval_dst = self.interval.to_le_bytes();
        number_of_winners_dst[0] = self.number_of_winners;
        round_bump_dst[0] = self.round_bump;
        vault_bump_dst[0] = self.vault_bump;
    }
}

/// Snapshot of the draw preconditions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Readiness {
    pub state: RoundState,
    pub interval_elapsed: bool,
    pub player_count: u64,
    pub balance: u64,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.state == RoundState::Open
            && self.interval_elapsed
            && self.player_count > 0
            && self.balance > 0
    }
}

/// Current round. Only the most recent draw is remembered.
#[derive(BorshSerialize, BorshDeserialize, Clone, Debug, PartialEq, Eq)]
pub struct Round {
    /// Is the account initialized
    pub is_initialized: bool,
    pub state: RoundState,
    /// One slot per ticket, in entry order
    pub players: Vec<Pubkey>,
    /// Winners of the last settled draw, cleared when the next draw starts
    pub recent_winners: Vec<Pubkey>,
    /// Amount paid to each entry of `recent_winners`
    pub recent_winning_amounts: Vec<u64>,
    /// Time of the last settlement
    pub last_timestamp: UnixTimestamp,
    /// Correlator of the outstanding randomness request
    pub pending_request_id: Option<u64>,
    /// Winner count captured when the request was made
    pub requested_winners: u8,
    /// Source of request ids
    pub request_nonce: u64,
}

impl Round {
    /// Borsh size with every collection at capacity
    pub const LEN: usize = 1
        + 1
        + (4 + 32 * MAX_PLAYERS)
        + (4 + 32 * MAX_WINNERS)
        + (4 + 8 * MAX_WINNERS)
        + 8
        + (1 + 8)
        + 1
        + 8;

    pub fn new(now: UnixTimestamp) -> Self {
        Self {
            is_initialized: true,
            state: RoundState::Open,
            players: Vec::new(),
            recent_winners: Vec::new(),
            recent_winning_amounts: Vec::new(),
            last_timestamp: now,
            pending_request_id: None,
            requested_winners: 0,
            request_nonce: 0,
        }
    }

    /// Deserialize from an account buffer, ignoring trailing capacity
    pub fn unpack(src: &[u8]) -> Result<Self, ProgramError> {
        Self::deserialize(&mut &src[..]).map_err(|_| ProgramError::InvalidAccountData)
    }

    pub fn pack(&self, dst: &mut [u8]) -> Result<(), ProgramError> {
        let data = self
            .try_to_vec()
            .map_err(|_| ProgramError::InvalidAccountData)?;
        if data.len() > dst.len() {
            return Err(ProgramError::AccountDataTooSmall);
        }
        dst[..data.len()].copy_from_slice(&data);
        Ok(())
    }

    pub fn players(&self) -> &[Pubkey] {
        &self.players
    }

    pub fn player(&self, index: usize) -> Option<&Pubkey> {
        self.players.get(index)
    }

    pub fn player_count(&self) -> u64 {
        self.players.len() as u64
    }

    pub fn recent_winners(&self) -> &[Pubkey] {
        &self.recent_winners
    }

    pub fn recent_winning_amounts(&self) -> &[u64] {
        &self.recent_winning_amounts
    }

    /// True if `player` won the last settled draw
    pub fn is_recent_winner(&self, player: &Pubkey) -> bool {
        self.recent_winners.iter().any(|winner| winner == player)
    }

    /// Validate a deposit and append one roster slot per ticket.
    ///
    /// Returns the number of tickets added. Nothing is mutated on error.
    pub fn add_entry(
        &mut self,
        player: &Pubkey,
        amount: u64,
        entrance_fee: u64,
    ) -> Result<u64, RaffleError> {
        if self.is_recent_winner(player) {
            return Err(RaffleError::NotEligible);
        }
        if amount < entrance_fee {
            return Err(RaffleError::InsufficientPayment);
        }
        if self.state != RoundState::Open {
            return Err(RaffleError::RoundNotOpen);
        }

        let tickets = calculate_tickets(amount, entrance_fee)?;
        let capacity = (MAX_PLAYERS - self.players.len()) as u64;
        if tickets > capacity {
            return Err(RaffleError::RosterFull);
        }

        self.players
            .extend(std::iter::repeat(*player).take(tickets as usize));
        Ok(tickets)
    }

    pub fn check_readiness(
        &self,
        now: UnixTimestamp,
        interval: UnixTimestamp,
        balance: u64,
    ) -> Readiness {
        Readiness {
            state: self.state,
            interval_elapsed: now.saturating_sub(self.last_timestamp) > interval,
            player_count: self.player_count(),
            balance,
        }
    }

    /// Move to `Calculating` and forget the previous winners.
    ///
    /// Callers must have checked readiness against live state first.
    pub fn begin_draw(
        &mut self,
        request_id: u64,
        number_of_winners: u8,
    ) -> Result<(), RaffleError> {
        if self.state != RoundState::Open {
            return Err(RaffleError::RoundNotOpen);
        }
        self.state = RoundState::Calculating;
        self.recent_winners.clear();
        self.recent_winning_amounts.clear();
        self.pending_request_id = Some(request_id);
        self.requested_winners = number_of_winners;
        Ok(())
    }

    /// Map each random word onto the roster, in order, with replacement
    pub fn select_winners(&self, random_words: &[u64]) -> Result<Vec<Pubkey>, RaffleError> {
        random_words
            .iter()
            .map(|word| {
                winner_index(*word, self.players.len())
                    .map(|index| self.players[index])
                    .ok_or(RaffleError::InvalidRandomness)
            })
            .collect()
    }

    /// Record the paid winners and reopen the round
    pub fn complete_settlement(
        &mut self,
        winners: Vec<Pubkey>,
        per_winner: u64,
        now: UnixTimestamp,
    ) {
        self.recent_winning_amounts = vec![per_winner; winners.len()];
        self.recent_winners = winners;
        self.players.clear();
        self.last_timestamp = now;
        self.pending_request_id = None;
        self.requested_winners = 0;
        self.state = RoundState::Open;
    }
}
