use solana_program::{
    clock::UnixTimestamp,
    instruction::{AccountMeta, Instruction},
    program_error::ProgramError,
    pubkey::Pubkey,
    system_program,
};
use std::mem::size_of;

use crate::{
    error::RaffleError,
    state::MAX_WINNERS,
    utils::{find_config_address, find_round_address, find_vault_address},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RaffleInstruction {
    /// Create the config, round and vault accounts
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The admin account, pays for the program accounts
    /// 1. `[writable]` Config account (PDA)
    /// 2. `[writable]` Round account (PDA)
    /// 3. `[writable]` Vault account (PDA)
    /// 4. `[]` Randomness coordinator
    /// 5. `[]` The system program
    Initialize {
        /// Price of one ticket in lamports
        entrance_fee: u64,
        /// Share of the pool paid to winners, 0..=100
        winner_share_percent: u8,
        /// Seconds between draws
        interval: UnixTimestamp,
        /// Winners per draw
        number_of_winners: u8,
    },

    /// Deposit lamports for `amount / entrance_fee` tickets
    ///
    /// Accounts expected:
    /// 0. `[signer, writable]` The player
    /// 1. `[]` Config account
    /// 2. `[writable]` Round account
    /// 3. `[writable]` Vault account
    /// 4. `[]` The system program
    Enter { amount: u64 },

    /// Read-only readiness check. Sets one byte of return data: 1 if a draw
    /// can start, 0 otherwise.
    ///
    /// Accounts expected:
    /// 0. `[]` Config account
    /// 1. `[]` Round account
    /// 2. `[]` Vault account
    CheckUpkeep,

    /// Start a draw and request randomness (anyone can call this)
    ///
    /// Accounts expected:
    /// 0. `[]` Config account
    /// 1. `[writable]` Round account
    /// 2. `[]` Vault account
    PerformUpkeep,

    /// Randomness callback: pick winners and pay out the pool
    ///
    /// Accounts expected:
    /// 0. `[signer]` Randomness coordinator
    /// 1. `[]` Config account
    /// 2. `[writable]` Round account
    /// 3. `[writable]` Vault account
    /// 4. `[writable]` Admin account
    /// 5. `[]` The system program
    /// 6.. `[writable]` One account per random word, the drawn winners in order
    FulfillRandomness {
        request_id: u64,
        random_words: Vec<u64>,
    },

    /// Update the draw interval (admin only)
    ///
    /// Accounts expected:
    /// 0. `[signer]` Admin authority
    /// 1. `[writable]` Config account
    SetInterval { interval: UnixTimestamp },

    /// Update the winner count (admin only, round must be open)
    ///
    /// Accounts expected:
    /// 0. `[signer]` Admin authority
    /// 1. `[writable]` Config account
    /// 2. `[]` Round account
    SetNumberOfWinners { number_of_winners: u8 },
}

impl RaffleInstruction {
    /// Unpacks a byte buffer into a RaffleInstruction
    pub fn unpack(input: &[u8]) -> Result<Self, ProgramError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;

        Ok(match tag {
            0 => {
                let (entrance_fee, rest) = Self::unpack_u64(rest)?;
                let (winner_share_percent, rest) = Self::unpack_u8(rest)?;
                let (interval, rest) = Self::unpack_i64(rest)?;
                let (number_of_winners, _) = Self::unpack_u8(rest)?;
                Self::Initialize {
                    entrance_fee,
                    winner_share_percent,
                    interval,
                    number_of_winners,
                }
            }
            1 => {
                let (amount, _) = Self::unpack_u64(rest)?;
                Self::Enter { amount }
            }
            2 => Self::CheckUpkeep,
            3 => Self::PerformUpkeep,
            4 => {
                let (request_id, rest) = Self::unpack_u64(rest)?;
                let (count, mut rest) = Self::unpack_u8(rest)?;
                if count as usize > MAX_WINNERS {
                    return Err(RaffleError::InvalidInstructionData.into());
                }
                let mut random_words = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let (word, next) = Self::unpack_u64(rest)?;
                    random_words.push(word);
                    rest = next;
                }
                Self::FulfillRandomness {
                    request_id,
                    random_words,
                }
            }
            5 => {
                let (interval, _) = Self::unpack_i64(rest)?;
                Self::SetInterval { interval }
            }
            6 => {
                let (number_of_winners, _) = Self::unpack_u8(rest)?;
                Self::SetNumberOfWinners { number_of_winners }
            }
            _ => return Err(RaffleError::InvalidInstructionData.into()),
        })
    }

    /// Packs a RaffleInstruction into a byte buffer
    pub fn pack(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(size_of::<Self>());
        match self {
            Self::Initialize {
                entrance_fee,
                winner_share_percent,
                interval,
                number_of_winners,
            } => {
                buf.push(0);
                buf.extend_from_slice(&entrance_fee.to_le_bytes());
                buf.push(*winner_share_percent);
                buf.extend_from_slice(&interval.to_le_bytes());
                buf.push(*number_of_winners);
            }
            Self::Enter { amount } => {
                buf.push(1);
                buf.extend_from_slice(&amount.to_le_bytes());
            }
            Self::CheckUpkeep => buf.push(2),
            Self::PerformUpkeep => buf.push(3),
            Self::FulfillRandomness {
                request_id,
                random_words,
            } => {
                buf.push(4);
                buf.extend_from_slice(&request_id.to_le_bytes());
                buf.push(random_words.len() as u8);
                for word in random_words {
                    buf.extend_from_slice(&word.to_le_bytes());
                }
            }
            Self::SetInterval { interval } => {
                buf.push(5);
                buf.extend_from_slice(&interval.to_le_bytes());
            }
            Self::SetNumberOfWinners { number_of_winners } => {
                buf.push(6);
                buf.push(*number_of_winners);
            }
        }
        buf
    }

    fn unpack_u8(input: &[u8]) -> Result<(u8, &[u8]), ProgramError> {
        let (value, rest) = input
            .split_first()
            .ok_or(RaffleError::InvalidInstructionData)?;
        Ok((*value, rest))
    }

    fn unpack_u64(input: &[u8]) -> Result<(u64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or(RaffleError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }

    fn unpack_i64(input: &[u8]) -> Result<(i64, &[u8]), ProgramError> {
        let value = input
            .get(..8)
            .and_then(|slice| slice.try_into().ok())
            .map(i64::from_le_bytes)
            .ok_or(RaffleError::InvalidInstructionData)?;
        Ok((value, &input[8..]))
    }
}

/// Create initialize instruction
pub fn initialize(
    program_id: &Pubkey,
    admin: &Pubkey,
    coordinator: &Pubkey,
    entrance_fee: u64,
    winner_share_percent: u8,
    interval: UnixTimestamp,
    number_of_winners: u8,
) -> Instruction {
    let data = RaffleInstruction::Initialize {
        entrance_fee,
        winner_share_percent,
        interval,
        number_of_winners,
    }
    .pack();

    let accounts = vec![
        AccountMeta::new(*admin, true),
        AccountMeta::new(find_config_address(program_id).0, false),
        AccountMeta::new(find_round_address(program_id).0, false),
        AccountMeta::new(find_vault_address(program_id).0, false),
        AccountMeta::new_readonly(*coordinator, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create enter instruction
pub fn enter(program_id: &Pubkey, player: &Pubkey, amount: u64) -> Instruction {
    let data = RaffleInstruction::Enter { amount }.pack();

    let accounts = vec![
        AccountMeta::new(*player, true),
        AccountMeta::new_readonly(find_config_address(program_id).0, false),
        AccountMeta::new(find_round_address(program_id).0, false),
        AccountMeta::new(find_vault_address(program_id).0, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create check_upkeep instruction
pub fn check_upkeep(program_id: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(find_config_address(program_id).0, false),
        AccountMeta::new_readonly(find_round_address(program_id).0, false),
        AccountMeta::new_readonly(find_vault_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::CheckUpkeep.pack(),
    }
}

/// Create perform_upkeep instruction
pub fn perform_upkeep(program_id: &Pubkey) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(find_config_address(program_id).0, false),
        AccountMeta::new(find_round_address(program_id).0, false),
        AccountMeta::new_readonly(find_vault_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::PerformUpkeep.pack(),
    }
}

/// Create fulfill_randomness instruction. `winners` must be the roster
/// entries drawn by `random_words`, in order (see `Round::select_winners`).
pub fn fulfill_randomness(
    program_id: &Pubkey,
    coordinator: &Pubkey,
    admin: &Pubkey,
    request_id: u64,
    random_words: Vec<u64>,
    winners: &[Pubkey],
) -> Instruction {
    let data = RaffleInstruction::FulfillRandomness {
        request_id,
        random_words,
    }
    .pack();

    let mut accounts = vec![
        AccountMeta::new_readonly(*coordinator, true),
        AccountMeta::new_readonly(find_config_address(program_id).0, false),
        AccountMeta::new(find_round_address(program_id).0, false),
        AccountMeta::new(find_vault_address(program_id).0, false),
        AccountMeta::new(*admin, false),
        AccountMeta::new_readonly(system_program::id(), false),
    ];
    accounts.extend(winners.iter().map(|winner| AccountMeta::new(*winner, false)));

    Instruction {
        program_id: *program_id,
        accounts,
        data,
    }
}

/// Create set_interval instruction
pub fn set_interval(program_id: &Pubkey, admin: &Pubkey, interval: UnixTimestamp) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*admin, true),
        AccountMeta::new(find_config_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::SetInterval { interval }.pack(),
    }
}

/// Create set_number_of_winners instruction
pub fn set_number_of_winners(
    program_id: &Pubkey,
    admin: &Pubkey,
    number_of_winners: u8,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new_readonly(*admin, true),
        AccountMeta::new(find_config_address(program_id).0, false),
        AccountMeta::new_readonly(find_round_address(program_id).0, false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: RaffleInstruction::SetNumberOfWinners { number_of_winners }.pack(),
    }
}
