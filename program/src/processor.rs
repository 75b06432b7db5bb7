// Autoraffle Program - Instruction Processor
use solana_program::{
    account_info::{next_account_info, AccountInfo},
    clock::{Clock, UnixTimestamp},
    entrypoint::ProgramResult,
    msg,
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    program_pack::Pack,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction, system_program,
    sysvar::Sysvar,
};

use crate::{
    error::RaffleError,
    instruction::RaffleInstruction,
    state::{Config, Readiness, Round, CONFIG_SEED, ROUND_SEED, VAULT_SEED},
    utils::{
        calculate_payouts, find_config_address, find_round_address, find_vault_address,
        lamports_to_sol, pool_balance,
    },
    vrf,
};

/// Program state handler.
pub struct Processor {}

impl Processor {
    /// Process an Autoraffle instruction
    pub fn process(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        instruction_data: &[u8],
    ) -> ProgramResult {
        let instruction = RaffleInstruction::unpack(instruction_data)?;

        match instruction {
            RaffleInstruction::Initialize {
                entrance_fee,
                winner_share_percent,
                interval,
                number_of_winners,
            } => {
                msg!("Instruction: Initialize");
                Self::process_initialize(
                    program_id,
                    accounts,
                    entrance_fee,
                    winner_share_percent,
                    interval,
                    number_of_winners,
                )
            }
            RaffleInstruction::Enter { amount } => {
                msg!("Instruction: Enter");
                Self::process_enter(program_id, accounts, amount)
            }
            RaffleInstruction::CheckUpkeep => {
                msg!("Instruction: Check Upkeep");
                Self::process_check_upkeep(program_id, accounts)
            }
            RaffleInstruction::PerformUpkeep => {
                msg!("Instruction: Perform Upkeep");
                Self::process_perform_upkeep(program_id, accounts)
            }
            RaffleInstruction::FulfillRandomness {
                request_id,
                random_words,
            } => {
                msg!("Instruction: Fulfill Randomness");
                Self::process_fulfill_randomness(program_id, accounts, request_id, &random_words)
            }
            RaffleInstruction::SetInterval { interval } => {
                msg!("Instruction: Set Interval");
                Self::process_set_interval(program_id, accounts, interval)
            }
            RaffleInstruction::SetNumberOfWinners { number_of_winners } => {
                msg!("Instruction: Set Number Of Winners");
                Self::process_set_number_of_winners(program_id, accounts, number_of_winners)
            }
        }
    }

    fn process_initialize(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        entrance_fee: u64,
        winner_share_percent: u8,
        interval: UnixTimestamp,
        number_of_winners: u8,
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let coordinator_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        // Verify admin is signer
        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        // Verify program account addresses
        let (config_key, config_bump) = find_config_address(program_id);
        let (round_key, round_bump) = find_round_address(program_id);
        let (vault_key, vault_bump) = find_vault_address(program_id);
        if *config_info.key != config_key
            || *round_info.key != round_key
            || *vault_info.key != vault_key
        {
            msg!("Invalid program account address");
            return Err(RaffleError::InvalidAccount.into());
        }
        if *system_program_info.key != system_program::id() {
            return Err(ProgramError::IncorrectProgramId);
        }

        if config_info.owner == program_id {
            msg!("Config account is already initialized");
            return Err(RaffleError::AlreadyInitialized.into());
        }

        if let Err(err) =
            Config::validate(entrance_fee, winner_share_percent, interval, number_of_winners)
        {
            msg!(
                "Invalid configuration: fee={} share={}% interval={} winners={}",
                entrance_fee,
                winner_share_percent,
                interval,
                number_of_winners
            );
            return Err(err.into());
        }

        let rent = Rent::get()?;
        let clock = Clock::get()?;

        // Create config and round accounts
        invoke_signed(
            &system_instruction::create_account(
                admin_info.key,
                config_info.key,
                rent.minimum_balance(Config::LEN),
                Config::LEN as u64,
                program_id,
            ),
            &[
                admin_info.clone(),
                config_info.clone(),
                system_program_info.clone(),
            ],
            &[&[CONFIG_SEED, &[config_bump]]],
        )?;

        invoke_signed(
            &system_instruction::create_account(
                admin_info.key,
                round_info.key,
                rent.minimum_balance(Round::LEN),
                Round::LEN as u64,
                program_id,
            ),
            &[
                admin_info.clone(),
                round_info.clone(),
                system_program_info.clone(),
            ],
            &[&[ROUND_SEED, &[round_bump]]],
        )?;

        // The vault keeps its rent-exempt reserve; the pool sits on top of it
        let reserve = rent.minimum_balance(0).saturating_sub(vault_info.lamports());
        if reserve > 0 {
            invoke(
                &system_instruction::transfer(admin_info.key, vault_info.key, reserve),
                &[
                    admin_info.clone(),
                    vault_info.clone(),
                    system_program_info.clone(),
                ],
            )?;
        }

        // Save initial state
        let config = Config {
            is_initialized: true,
            admin: *admin_info.key,
            coordinator: *coordinator_info.key,
            entrance_fee,
            winner_share_percent,
            interval,
            number_of_winners,
            round_bump,
            vault_bump,
        };
        Config::pack(config, &mut config_info.data.borrow_mut())?;
        Round::new(clock.unix_timestamp).pack(&mut round_info.data.borrow_mut())?;

        msg!(
            "Raffle initialized: Admin={}, Coordinator={}, EntranceFee={} SOL, WinnerShare={}%, Interval={}s, Winners={}",
            admin_info.key,
            coordinator_info.key,
            lamports_to_sol(entrance_fee),
            winner_share_percent,
            interval,
            number_of_winners
        );
        Ok(())
    }

    fn process_enter(program_id: &Pubkey, accounts: &[AccountInfo], amount: u64) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let player_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;

        // Verify player is signer
        if !player_info.is_signer {
            msg!("Player must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let config = Self::load_config(program_id, config_info)?;
        let mut round = Self::load_round(program_id, &config, round_info)?;
        Self::check_vault(program_id, &config, vault_info)?;

        // Record tickets
        let tickets = match round.add_entry(player_info.key, amount, config.entrance_fee) {
            Ok(tickets) => tickets,
            Err(err) => {
                match err {
                    RaffleError::NotEligible => {
                        msg!("{} won the last draw and cannot enter yet", player_info.key)
                    }
                    RaffleError::InsufficientPayment => msg!(
                        "Paid {} lamports, entrance fee is {} lamports",
                        amount,
                        config.entrance_fee
                    ),
                    RaffleError::RoundNotOpen => msg!("Round is calculating, entries are closed"),
                    _ => msg!("Entry rejected: {}", err),
                }
                return Err(err.into());
            }
        };

        // The full deposit goes to the pool, including any remainder below one fee
        invoke(
            &system_instruction::transfer(player_info.key, vault_info.key, amount),
            &[
                player_info.clone(),
                vault_info.clone(),
                system_program_info.clone(),
            ],
        )?;

        round.pack(&mut round_info.data.borrow_mut())?;

        msg!(
            "RaffleEntered: player={} amount={} tickets={}",
            player_info.key,
            amount,
            tickets
        );
        Ok(())
    }

    fn process_check_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;

        let config = Self::load_config(program_id, config_info)?;
        let round = Self::load_round(program_id, &config, round_info)?;
        let readiness = Self::readiness(program_id, &config, &round, vault_info)?;

        msg!(
            "Upkeep needed: {} (state={:?}, interval_elapsed={}, players={}, balance={})",
            readiness.is_ready(),
            readiness.state,
            readiness.interval_elapsed,
            readiness.player_count,
            readiness.balance
        );
        set_return_data(&[readiness.is_ready() as u8]);
        Ok(())
    }

    fn process_perform_upkeep(program_id: &Pubkey, accounts: &[AccountInfo]) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;

        let config = Self::load_config(program_id, config_info)?;
        let mut round = Self::load_round(program_id, &config, round_info)?;

        // Never trust an earlier CheckUpkeep; evaluate live state again
        let readiness = Self::readiness(program_id, &config, &round, vault_info)?;
        if !readiness.is_ready() {
            msg!(
                "UpkeepNotNeeded: balance={} players={} state={:?}",
                readiness.balance,
                readiness.player_count,
                readiness.state
            );
            return Err(RaffleError::UpkeepNotNeeded.into());
        }

        // Get current slot and open the request
        let clock = Clock::get()?;
        let request_id = vrf::next_request_id(&mut round, clock.slot);
        round.begin_draw(request_id, config.number_of_winners)?;
        round.pack(&mut round_info.data.borrow_mut())?;

        msg!(
            "RandomnessRequested: request_id={} num_words={}",
            request_id,
            config.number_of_winners
        );
        Ok(())
    }

    fn process_fulfill_randomness(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        request_id: u64,
        random_words: &[u64],
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let coordinator_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;
        let vault_info = next_account_info(account_info_iter)?;
        let admin_info = next_account_info(account_info_iter)?;
        let system_program_info = next_account_info(account_info_iter)?;
        let winner_infos = account_info_iter.as_slice();

        // Verify coordinator is signer
        if !coordinator_info.is_signer {
            msg!("Coordinator must sign the fulfillment");
            return Err(ProgramError::MissingRequiredSignature);
        }

        let config = Self::load_config(program_id, config_info)?;
        let mut round = Self::load_round(program_id, &config, round_info)?;
        Self::check_vault(program_id, &config, vault_info)?;

        vrf::verify_fulfillment(
            &config,
            &round,
            coordinator_info.key,
            request_id,
            random_words,
        )?;

        if *admin_info.key != config.admin {
            msg!("Admin account does not match config");
            return Err(RaffleError::InvalidAdmin.into());
        }

        // Calculate prizes from the vault surplus
        let rent = Rent::get()?;
        let pool = pool_balance(vault_info.lamports(), rent.minimum_balance(0));
        let payouts = calculate_payouts(
            pool,
            config.winner_share_percent,
            round.requested_winners,
        )?;
        msg!(
            "Settling pool of {} lamports: {} per winner, {} to admin",
            pool,
            payouts.per_winner,
            payouts.owner_share
        );

        // Map random words to ticket slots
        let winners = round.select_winners(random_words)?;
        if winner_infos.len() != winners.len() {
            msg!(
                "Expected {} winner accounts, got {}",
                winners.len(),
                winner_infos.len()
            );
            return Err(RaffleError::WinnerAccountMismatch.into());
        }

        for (winner, winner_info) in winners.iter().zip(winner_infos) {
            if winner_info.key != winner {
                msg!(
                    "Drawn winner {} but account {} was supplied",
                    winner,
                    winner_info.key
                );
                return Err(RaffleError::WinnerAccountMismatch.into());
            }
        }

        // Reject payouts the system program would refuse before any lamports move
        if let Some(info) = winner_infos
            .iter()
            .chain(std::iter::once(admin_info))
            .find(|info| !info.is_writable)
        {
            msg!("Payout account {} is not writable", info.key);
            return Err(RaffleError::TransferFailed.into());
        }
        let total = payouts
            .per_winner
            .checked_mul(winners.len() as u64)
            .and_then(|paid| paid.checked_add(payouts.owner_share));
        if total.map_or(true, |total| total > pool) {
            msg!(
                "Vault surplus of {} lamports cannot cover the payouts",
                pool
            );
            return Err(RaffleError::TransferFailed.into());
        }

        // Pay the winners, then the admin
        for winner_info in winner_infos {
            Self::transfer_from_vault(
                &config,
                vault_info,
                winner_info,
                system_program_info,
                payouts.per_winner,
            )?;
        }

        Self::transfer_from_vault(
            &config,
            vault_info,
            admin_info,
            system_program_info,
            payouts.owner_share,
        )?;

        // Get current time and reset the round
        let clock = Clock::get()?;
        for winner in &winners {
            msg!(
                "WinnersPicked: winner={} amount={}",
                winner,
                payouts.per_winner
            );
        }
        round.complete_settlement(winners, payouts.per_winner, clock.unix_timestamp);
        round.pack(&mut round_info.data.borrow_mut())?;

        Ok(())
    }

    fn process_set_interval(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        interval: UnixTimestamp,
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;

        let mut config = Self::load_config(program_id, config_info)?;
        Self::check_admin(&config, admin_info)?;

        if let Err(err) = config.set_interval(interval) {
            msg!("Interval must be positive, got {}", interval);
            return Err(err.into());
        }
        Config::pack(config, &mut config_info.data.borrow_mut())?;

        msg!("IntervalUpdated: {}s", interval);
        Ok(())
    }

    fn process_set_number_of_winners(
        program_id: &Pubkey,
        accounts: &[AccountInfo],
        number_of_winners: u8,
    ) -> ProgramResult {
        // Get accounts
        let account_info_iter = &mut accounts.iter();
        let admin_info = next_account_info(account_info_iter)?;
        let config_info = next_account_info(account_info_iter)?;
        let round_info = next_account_info(account_info_iter)?;

        let mut config = Self::load_config(program_id, config_info)?;
        Self::check_admin(&config, admin_info)?;
        let round = Self::load_round(program_id, &config, round_info)?;

        if let Err(err) = config.set_number_of_winners(number_of_winners, &round) {
            msg!(
                "Cannot set number of winners to {} (state={:?})",
                number_of_winners,
                round.state
            );
            return Err(err.into());
        }
        Config::pack(config, &mut config_info.data.borrow_mut())?;

        msg!("NumberOfWinnersUpdated: {}", number_of_winners);
        Ok(())
    }

    fn check_admin(config: &Config, admin_info: &AccountInfo) -> ProgramResult {
        if !admin_info.is_signer {
            msg!("Admin must sign the transaction");
            return Err(ProgramError::MissingRequiredSignature);
        }
        if let Err(err) = config.check_admin(admin_info.key) {
            msg!("Only the admin can update the raffle configuration");
            return Err(err.into());
        }
        Ok(())
    }

    fn load_config(program_id: &Pubkey, config_info: &AccountInfo) -> Result<Config, ProgramError> {
        if config_info.owner != program_id {
            msg!("Config account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        if *config_info.key != find_config_address(program_id).0 {
            msg!("Invalid config account address");
            return Err(RaffleError::InvalidAccount.into());
        }
        Config::unpack(&config_info.data.borrow())
    }

    fn load_round(
        program_id: &Pubkey,
        config: &Config,
        round_info: &AccountInfo,
    ) -> Result<Round, ProgramError> {
        if round_info.owner != program_id {
            msg!("Round account must be owned by this program");
            return Err(ProgramError::IncorrectProgramId);
        }
        let expected =
            Pubkey::create_program_address(&[ROUND_SEED, &[config.round_bump]], program_id)?;
        if *round_info.key != expected {
            msg!("Invalid round account address");
            return Err(RaffleError::InvalidAccount.into());
        }
        let round = Round::unpack(&round_info.data.borrow())?;
        if !round.is_initialized {
            return Err(ProgramError::UninitializedAccount);
        }
        Ok(round)
    }

    fn check_vault(
        program_id: &Pubkey,
        config: &Config,
        vault_info: &AccountInfo,
    ) -> ProgramResult {
        let expected =
            Pubkey::create_program_address(&[VAULT_SEED, &[config.vault_bump]], program_id)?;
        if *vault_info.key != expected {
            msg!("Invalid vault account address");
            return Err(RaffleError::InvalidAccount.into());
        }
        Ok(())
    }

    fn readiness(
        program_id: &Pubkey,
        config: &Config,
        round: &Round,
        vault_info: &AccountInfo,
    ) -> Result<Readiness, ProgramError> {
        Self::check_vault(program_id, config, vault_info)?;
        let clock = Clock::get()?;
        let rent = Rent::get()?;
        let balance = pool_balance(vault_info.lamports(), rent.minimum_balance(0));
        Ok(round.check_readiness(clock.unix_timestamp, config.interval, balance))
    }

    fn transfer_from_vault<'a>(
        config: &Config,
        vault_info: &AccountInfo<'a>,
        recipient_info: &AccountInfo<'a>,
        system_program_info: &AccountInfo<'a>,
        amount: u64,
    ) -> ProgramResult {
        invoke_signed(
            &system_instruction::transfer(vault_info.key, recipient_info.key, amount),
            &[
                vault_info.clone(),
                recipient_info.clone(),
                system_program_info.clone(),
            ],
            &[&[VAULT_SEED, &[config.vault_bump]]],
        )
        .map_err(|err| {
            msg!(
                "Transfer of {} lamports to {} failed: {}",
                amount,
                recipient_info.key,
                err
            );
            ProgramError::from(RaffleError::TransferFailed)
        })
    }
}
