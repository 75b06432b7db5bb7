// Autoraffle Program - Errors
use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Errors that may be returned by the Autoraffle program
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RaffleError {
    /// Invalid instruction data passed
    #[error("Invalid instruction data")]
    InvalidInstructionData,

    /// Initialization or admin parameters out of range
    #[error("Invalid raffle configuration")]
    InvalidConfiguration,

    /// Deposit below the entrance fee
    #[error("Payment is below the entrance fee")]
    InsufficientPayment,

    /// A draw is in flight
    #[error("Round is not open")]
    RoundNotOpen,

    /// Sender won the most recent draw
    #[error("Sender is not eligible to enter")]
    NotEligible,

    /// Readiness predicate was false when a draw was attempted
    #[error("Upkeep not needed")]
    UpkeepNotNeeded,

    /// A payout could not be delivered
    #[error("Transfer failed")]
    TransferFailed,

    /// Only the raffle admin can perform this action
    #[error("Only the raffle admin can perform this action")]
    InvalidAdmin,

    /// Fulfillment not signed by the randomness coordinator
    #[error("Fulfillment must be signed by the randomness coordinator")]
    InvalidCoordinator,

    /// No outstanding request matches the fulfillment
    #[error("Unknown randomness request")]
    UnknownRequest,

    /// Wrong number of random words
    #[error("Invalid randomness")]
    InvalidRandomness,

    /// Supplied winner account does not match the drawn winner
    #[error("Winner account does not match the drawn winner")]
    WinnerAccountMismatch,

    /// Player roster is at capacity
    #[error("Player roster is full")]
    RosterFull,

    /// Account address does not match the expected program address
    #[error("Unexpected account address")]
    InvalidAccount,

    /// Raffle already initialized
    #[error("Raffle already initialized")]
    AlreadyInitialized,

    /// Arithmetic overflow
    #[error("Amount overflow")]
    AmountOverflow,
}

impl From<RaffleError> for ProgramError {
    fn from(e: RaffleError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
