use solana_program::program_pack::Pack;
use solana_program_test::*;
use solana_sdk::{
    clock::Clock,
    instruction::{Instruction, InstructionError},
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::{Transaction, TransactionError},
};

use autoraffle::{
    error::RaffleError,
    instruction,
    process_instruction,
    state::{Config, Round, RoundState},
    utils::{find_config_address, find_round_address, find_vault_address},
};

const ENTRANCE_FEE: u64 = 10_000_000; // 0.01 SOL
const WINNER_SHARE_PERCENT: u8 = 60;
const INTERVAL: i64 = 60;
const NUMBER_OF_WINNERS: u8 = 2;

struct Raffle {
    context: ProgramTestContext,
    program_id: Pubkey,
    admin: Keypair,
    coordinator: Keypair,
}

// Setup program test with an initialized raffle
async fn setup() -> Raffle {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new("autoraffle", program_id, processor!(process_instruction));
    let mut context = program_test.start_with_context().await;

    let admin = Keypair::new();
    let coordinator = Keypair::new();
    fund(&mut context, &admin.pubkey(), 1_000_000_000).await;
    fund(&mut context, &coordinator.pubkey(), 1_000_000_000).await;

    let initialize_ix = instruction::initialize(
        &program_id,
        &admin.pubkey(),
        &coordinator.pubkey(),
        ENTRANCE_FEE,
        WINNER_SHARE_PERCENT,
        INTERVAL,
        NUMBER_OF_WINNERS,
    );
    process(
        &mut context.banks_client,
        &[initialize_ix],
        &[&context.payer, &admin],
    )
    .await
    .unwrap();

    Raffle {
        context,
        program_id,
        admin,
        coordinator,
    }
}

// The first signer pays the transaction fee
async fn process(
    banks_client: &mut BanksClient,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let recent_blockhash = banks_client.get_latest_blockhash().await.unwrap();
    let signers: Vec<&Keypair> = signers.to_vec();
    let transaction = Transaction::new_signed_with_payer(
        instructions,
        Some(&signers[0].pubkey()),
        &signers,
        recent_blockhash,
    );
    banks_client.process_transaction(transaction).await
}

async fn fund(context: &mut ProgramTestContext, to: &Pubkey, lamports: u64) {
    let fund_ix = system_instruction::transfer(&context.payer.pubkey(), to, lamports);
    process(&mut context.banks_client, &[fund_ix], &[&context.payer])
        .await
        .unwrap();
}

async fn new_player(context: &mut ProgramTestContext) -> Keypair {
    let player = Keypair::new();
    fund(context, &player.pubkey(), 10_000_000_000).await; // 10 SOL
    player
}

async fn enter(raffle: &mut Raffle, player: &Keypair, amount: u64) -> Result<(), BanksClientError> {
    let enter_ix = instruction::enter(&raffle.program_id, &player.pubkey(), amount);
    process(&mut raffle.context.banks_client, &[enter_ix], &[player]).await
}

// Anyone can act as the keeper
async fn perform_upkeep(raffle: &mut Raffle, keeper: &Keypair) -> Result<(), BanksClientError> {
    let perform_ix = instruction::perform_upkeep(&raffle.program_id);
    process(&mut raffle.context.banks_client, &[perform_ix], &[keeper]).await
}

async fn fulfill(
    raffle: &mut Raffle,
    request_id: u64,
    random_words: Vec<u64>,
    winners: &[Pubkey],
) -> Result<(), BanksClientError> {
    let fulfill_ix = instruction::fulfill_randomness(
        &raffle.program_id,
        &raffle.coordinator.pubkey(),
        &raffle.admin.pubkey(),
        request_id,
        random_words,
        winners,
    );
    process(
        &mut raffle.context.banks_client,
        &[fulfill_ix],
        &[&raffle.coordinator],
    )
    .await
}

async fn get_round(raffle: &mut Raffle) -> Round {
    let round_account = raffle
        .context
        .banks_client
        .get_account(find_round_address(&raffle.program_id).0)
        .await
        .unwrap()
        .unwrap();
    Round::unpack(&round_account.data).unwrap()
}

async fn get_config(raffle: &mut Raffle) -> Config {
    let config_account = raffle
        .context
        .banks_client
        .get_account(find_config_address(&raffle.program_id).0)
        .await
        .unwrap()
        .unwrap();
    Config::unpack(&config_account.data).unwrap()
}

async fn get_balance(raffle: &mut Raffle, address: &Pubkey) -> u64 {
    raffle.context.banks_client.get_balance(*address).await.unwrap()
}

async fn vault_reserve(raffle: &mut Raffle) -> u64 {
    raffle
        .context
        .banks_client
        .get_rent()
        .await
        .unwrap()
        .minimum_balance(0)
}

async fn advance_clock(raffle: &mut Raffle, seconds: i64) {
    let mut clock: Clock = raffle.context.banks_client.get_sysvar().await.unwrap();
    clock.unix_timestamp += seconds;
    raffle.context.set_sysvar(&clock);
}

fn assert_raffle_error(result: Result<(), BanksClientError>, error: RaffleError) {
    assert_eq!(
        result.unwrap_err().unwrap(),
        TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
    );
}

#[tokio::test]
async fn test_initialize() {
    let mut raffle = setup().await;

    let config = get_config(&mut raffle).await;
    assert!(config.is_initialized);
    assert_eq!(config.admin, raffle.admin.pubkey());
    assert_eq!(config.coordinator, raffle.coordinator.pubkey());
    assert_eq!(config.entrance_fee, ENTRANCE_FEE);
    assert_eq!(config.winner_share_percent, WINNER_SHARE_PERCENT);
    assert_eq!(config.interval, INTERVAL);
    assert_eq!(config.number_of_winners, NUMBER_OF_WINNERS);

    let round = get_round(&mut raffle).await;
    assert_eq!(round.state, RoundState::Open);
    assert!(round.players().is_empty());
    assert!(round.recent_winners().is_empty());
    assert_eq!(round.pending_request_id, None);
    assert!(round.last_timestamp > 0);

    // Only the rent reserve, the pool is empty
    let vault = find_vault_address(&raffle.program_id).0;
    let reserve = vault_reserve(&mut raffle).await;
    assert_eq!(get_balance(&mut raffle, &vault).await, reserve);

    // Second initialization is rejected
    let initialize_ix = instruction::initialize(
        &raffle.program_id,
        &raffle.admin.pubkey(),
        &raffle.coordinator.pubkey(),
        ENTRANCE_FEE,
        WINNER_SHARE_PERCENT,
        INTERVAL,
        NUMBER_OF_WINNERS,
    );
    let result = process(
        &mut raffle.context.banks_client,
        &[initialize_ix],
        &[&raffle.admin],
    )
    .await;
    assert_raffle_error(result, RaffleError::AlreadyInitialized);
}

#[tokio::test]
async fn test_initialize_rejects_share_above_hundred() {
    let program_id = Pubkey::new_unique();
    let program_test = ProgramTest::new("autoraffle", program_id, processor!(process_instruction));
    let (mut banks_client, payer, _recent_blockhash) = program_test.start().await;

    let initialize_ix = instruction::initialize(
        &program_id,
        &payer.pubkey(),
        &Pubkey::new_unique(),
        ENTRANCE_FEE,
        101,
        INTERVAL,
        NUMBER_OF_WINNERS,
    );
    let result = process(&mut banks_client, &[initialize_ix], &[&payer]).await;
    assert_raffle_error(result, RaffleError::InvalidConfiguration);

    let config_account = banks_client
        .get_account(find_config_address(&program_id).0)
        .await
        .unwrap();
    assert!(config_account.is_none());
}

#[tokio::test]
async fn test_enter_adds_one_slot_per_ticket() {
    let mut raffle = setup().await;
    let alice = new_player(&mut raffle.context).await;
    let bob = new_player(&mut raffle.context).await;

    // 2.5 fees buys two tickets; the remainder stays in the pool
    enter(&mut raffle, &alice, 25_000_000).await.unwrap();
    enter(&mut raffle, &bob, ENTRANCE_FEE).await.unwrap();

    let round = get_round(&mut raffle).await;
    assert_eq!(
        round.players(),
        &[alice.pubkey(), alice.pubkey(), bob.pubkey()]
    );

    let vault = find_vault_address(&raffle.program_id).0;
    let reserve = vault_reserve(&mut raffle).await;
    assert_eq!(
        get_balance(&mut raffle, &vault).await,
        reserve + 25_000_000 + ENTRANCE_FEE
    );
}

#[tokio::test]
async fn test_enter_below_fee_rejected() {
    let mut raffle = setup().await;
    let alice = new_player(&mut raffle.context).await;

    let result = enter(&mut raffle, &alice, ENTRANCE_FEE - 1).await;
    assert_raffle_error(result, RaffleError::InsufficientPayment);

    let round = get_round(&mut raffle).await;
    assert!(round.players().is_empty());
}

#[tokio::test]
async fn test_perform_upkeep_not_needed() {
    let mut raffle = setup().await;

    // Interval elapsed but nobody entered
    let keeper = new_player(&mut raffle.context).await;
    advance_clock(&mut raffle, INTERVAL + 1).await;
    assert_raffle_error(
        perform_upkeep(&mut raffle, &keeper).await,
        RaffleError::UpkeepNotNeeded,
    );

    // Players present but the interval has not elapsed
    let alice = new_player(&mut raffle.context).await;
    enter(&mut raffle, &alice, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut raffle, -(INTERVAL + 1)).await;
    assert_raffle_error(
        perform_upkeep(&mut raffle, &alice).await,
        RaffleError::UpkeepNotNeeded,
    );

    let round = get_round(&mut raffle).await;
    assert_eq!(round.state, RoundState::Open);
    assert_eq!(round.players(), &[alice.pubkey()]);
    assert_eq!(round.pending_request_id, None);
}

#[tokio::test]
async fn test_check_upkeep_is_read_only() {
    let mut raffle = setup().await;
    let before = get_round(&mut raffle).await;

    let check_ix = instruction::check_upkeep(&raffle.program_id);
    process(
        &mut raffle.context.banks_client,
        &[check_ix],
        &[&raffle.context.payer],
    )
    .await
    .unwrap();

    assert_eq!(get_round(&mut raffle).await, before);
}

#[tokio::test]
async fn test_full_round() {
    let mut raffle = setup().await;
    let alice = new_player(&mut raffle.context).await;
    let bob = new_player(&mut raffle.context).await;
    let carol = new_player(&mut raffle.context).await;

    enter(&mut raffle, &alice, 25_000_000).await.unwrap(); // 2 tickets
    enter(&mut raffle, &bob, ENTRANCE_FEE).await.unwrap(); // 1 ticket
    enter(&mut raffle, &carol, 30_000_000).await.unwrap(); // 3 tickets
    let pool = 65_000_000;

    advance_clock(&mut raffle, INTERVAL + 1).await;
    perform_upkeep(&mut raffle, &bob).await.unwrap();

    let round = get_round(&mut raffle).await;
    assert_eq!(round.state, RoundState::Calculating);
    assert_eq!(round.requested_winners, NUMBER_OF_WINNERS);
    assert!(round.recent_winners().is_empty());
    let request_id = round.pending_request_id.unwrap();

    // A draw is in flight
    let dave = new_player(&mut raffle.context).await;
    assert_raffle_error(
        enter(&mut raffle, &dave, ENTRANCE_FEE).await,
        RaffleError::RoundNotOpen,
    );
    assert_raffle_error(
        perform_upkeep(&mut raffle, &dave).await,
        RaffleError::UpkeepNotNeeded,
    );

    let set_winners_ix =
        instruction::set_number_of_winners(&raffle.program_id, &raffle.admin.pubkey(), 3);
    let result = process(
        &mut raffle.context.banks_client,
        &[set_winners_ix],
        &[&raffle.admin],
    )
    .await;
    assert_raffle_error(result, RaffleError::RoundNotOpen);

    let set_interval_ix =
        instruction::set_interval(&raffle.program_id, &raffle.admin.pubkey(), INTERVAL * 2);
    process(
        &mut raffle.context.banks_client,
        &[set_interval_ix],
        &[&raffle.admin],
    )
    .await
    .unwrap();
    assert_eq!(get_config(&mut raffle).await.interval, INTERVAL * 2);

    let random_words = vec![7, 12];
    let winners = round.select_winners(&random_words).unwrap();
    assert_eq!(winners, vec![alice.pubkey(), alice.pubkey()]);

    // Wrong correlator
    assert_raffle_error(
        fulfill(&mut raffle, request_id.wrapping_add(1), random_words.clone(), &winners).await,
        RaffleError::UnknownRequest,
    );

    // Wrong winner accounts roll the whole settlement back
    let impostors = vec![bob.pubkey(), carol.pubkey()];
    assert_raffle_error(
        fulfill(&mut raffle, request_id, random_words.clone(), &impostors).await,
        RaffleError::WinnerAccountMismatch,
    );
    assert_eq!(get_round(&mut raffle).await, round);

    let vault = find_vault_address(&raffle.program_id).0;
    let reserve = vault_reserve(&mut raffle).await;
    let admin = raffle.admin.pubkey();
    let admin_before = get_balance(&mut raffle, &admin).await;
    let alice_before = get_balance(&mut raffle, &alice.pubkey()).await;
    assert_eq!(get_balance(&mut raffle, &vault).await, reserve + pool);

    fulfill(&mut raffle, request_id, random_words, &winners)
        .await
        .unwrap();

    // 60% of 65_000_000 split two ways, the rest to the admin
    let per_winner = 19_500_000;
    let owner_share = 26_000_000;
    assert_eq!(
        get_balance(&mut raffle, &alice.pubkey()).await,
        alice_before + 2 * per_winner
    );
    assert_eq!(get_balance(&mut raffle, &admin).await, admin_before + owner_share);
    assert_eq!(get_balance(&mut raffle, &vault).await, reserve);

    let round = get_round(&mut raffle).await;
    assert_eq!(round.state, RoundState::Open);
    assert!(round.players().is_empty());
    assert_eq!(round.recent_winners(), &[alice.pubkey(), alice.pubkey()]);
    assert_eq!(round.recent_winning_amounts(), &[per_winner, per_winner]);
    assert_eq!(round.pending_request_id, None);

    // Recent winners sit out until the next draw starts
    assert_raffle_error(
        enter(&mut raffle, &alice, ENTRANCE_FEE).await,
        RaffleError::NotEligible,
    );
    enter(&mut raffle, &dave, 2 * ENTRANCE_FEE).await.unwrap();
    assert_eq!(
        get_round(&mut raffle).await.players(),
        &[dave.pubkey(), dave.pubkey()]
    );
}

#[tokio::test]
async fn test_fulfill_requires_coordinator() {
    let mut raffle = setup().await;
    let alice = new_player(&mut raffle.context).await;
    enter(&mut raffle, &alice, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut raffle, INTERVAL + 1).await;
    perform_upkeep(&mut raffle, &alice).await.unwrap();

    let request_id = get_round(&mut raffle).await.pending_request_id.unwrap();
    let impostor = new_player(&mut raffle.context).await;
    let fulfill_ix = instruction::fulfill_randomness(
        &raffle.program_id,
        &impostor.pubkey(),
        &raffle.admin.pubkey(),
        request_id,
        vec![1, 2],
        &[alice.pubkey(), alice.pubkey()],
    );
    let result = process(&mut raffle.context.banks_client, &[fulfill_ix], &[&impostor]).await;
    assert_raffle_error(result, RaffleError::InvalidCoordinator);

    assert_eq!(get_round(&mut raffle).await.state, RoundState::Calculating);
}

#[tokio::test]
async fn test_fulfill_transfer_failure_rolls_back() {
    let mut raffle = setup().await;
    let alice = new_player(&mut raffle.context).await;
    enter(&mut raffle, &alice, ENTRANCE_FEE).await.unwrap();
    advance_clock(&mut raffle, INTERVAL + 1).await;
    perform_upkeep(&mut raffle, &alice).await.unwrap();

    let round = get_round(&mut raffle).await;
    let request_id = round.pending_request_id.unwrap();
    let winners = vec![alice.pubkey(), alice.pubkey()];

    // Winner accounts passed read-only cannot receive their prize
    let mut fulfill_ix = instruction::fulfill_randomness(
        &raffle.program_id,
        &raffle.coordinator.pubkey(),
        &raffle.admin.pubkey(),
        request_id,
        vec![1, 2],
        &winners,
    );
    for meta in fulfill_ix.accounts.iter_mut().skip(6) {
        meta.is_writable = false;
    }

    let vault = find_vault_address(&raffle.program_id).0;
    let admin = raffle.admin.pubkey();
    let vault_before = get_balance(&mut raffle, &vault).await;
    let admin_before = get_balance(&mut raffle, &admin).await;
    let alice_before = get_balance(&mut raffle, &alice.pubkey()).await;

    let result = process(
        &mut raffle.context.banks_client,
        &[fulfill_ix],
        &[&raffle.coordinator],
    )
    .await;
    assert_raffle_error(result, RaffleError::TransferFailed);

    let after = get_round(&mut raffle).await;
    assert_eq!(after.state, RoundState::Calculating);
    assert_eq!(after.players(), &[alice.pubkey()]);
    assert_eq!(after, round);
    assert_eq!(get_balance(&mut raffle, &vault).await, vault_before);
    assert_eq!(get_balance(&mut raffle, &admin).await, admin_before);
    assert_eq!(get_balance(&mut raffle, &alice.pubkey()).await, alice_before);

    // The same draw still settles once the accounts are writable
    fulfill(&mut raffle, request_id, vec![1, 2], &winners)
        .await
        .unwrap();
    assert_eq!(get_round(&mut raffle).await.state, RoundState::Open);
}

#[tokio::test]
async fn test_admin_only_configuration() {
    let mut raffle = setup().await;
    let mallory = new_player(&mut raffle.context).await;

    let set_interval_ix =
        instruction::set_interval(&raffle.program_id, &mallory.pubkey(), INTERVAL * 10);
    let result = process(&mut raffle.context.banks_client, &[set_interval_ix], &[&mallory]).await;
    assert_raffle_error(result, RaffleError::InvalidAdmin);

    let set_winners_ix =
        instruction::set_number_of_winners(&raffle.program_id, &raffle.admin.pubkey(), 3);
    process(
        &mut raffle.context.banks_client,
        &[set_winners_ix],
        &[&raffle.admin],
    )
    .await
    .unwrap();

    let config = get_config(&mut raffle).await;
    assert_eq!(config.interval, INTERVAL);
    assert_eq!(config.number_of_winners, 3);
}
