#![no_std]

//! # Escape Velocity
//!
//! A confidential wealth game. Providers submit each player's wealth as
//! an opaque ciphertext handle, and a per-batch "escape velocity"
//! threshold grows with every round. Wealth is never decrypted in
//! place: the only way to learn whether a player has escaped is the
//! asynchronous decryption protocol below.
//!
//! ## Game flow
//! 1. The owner opens a batch. The encrypted threshold for the batch is
//!    derived as `base_threshold + growth_rate * batch_id`, all through
//!    the external cipher engine.
//! 2. Providers submit player wealth ciphertexts (cooldown-gated per
//!    provider; each submission fully replaces the previous handle).
//! 3. Anyone asks for an escape check on a player. The contract
//!    snapshots [wealth, threshold, encrypted `wealth >= threshold`],
//!    binds the snapshot with a keccak256 digest, and opens an
//!    asynchronous decryption request with the engine.
//! 4. The engine's gateway later calls back with the cleartexts and a
//!    proof. The callback is accepted only if the request was never
//!    answered before, the snapshot recomputed from *current* state
//!    still matches the bound digest, and the proof verifies. Only then
//!    is the plaintext result trusted and published.
//!
//! ## Why the digest re-check
//! The callback races against later submissions and batch transitions.
//! Rather than locking, the stored digest makes every interleaving
//! either safe (state unchanged, decryption is fresh) or explicitly
//! rejected (state changed, the stale decryption is discarded). A
//! rejected context is permanently stale; callers issue a new check.
//!
//! ## Ciphertext handles
//! Handles are the engine's 32-byte transport form. The contract never
//! inspects them; it only stores, compares, and forwards them. A handle
//! the engine does not recognise, or a player slot that was never
//! submitted, is "uninitialized" and never reaches arithmetic or
//! comparison.

use soroban_sdk::{
    contract, contractclient, contracterror, contractevent, contractimpl, contracttype, vec,
    Address, Bytes, BytesN, Env, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvOwnershipTransferred {
    pub previous_owner: Address,
    pub new_owner: Address,
}

#[contractevent]
pub struct EvProviderAdded {
    pub provider: Address,
}

#[contractevent]
pub struct EvProviderRemoved {
    pub provider: Address,
}

#[contractevent]
pub struct EvPaused {
    pub owner: Address,
}

#[contractevent]
pub struct EvUnpaused {
    pub owner: Address,
}

#[contractevent]
pub struct EvCooldownUpdated {
    pub cooldown_secs: u64,
}

#[contractevent]
pub struct EvGameParamsUpdated {
    pub base_wealth: u32,
    pub base_threshold: u32,
    pub growth_rate: u32,
}

#[contractevent]
pub struct EvEngineUpdated {
    pub engine: Address,
}

#[contractevent]
pub struct EvBatchOpened {
    pub batch_id: u32,
}

#[contractevent]
pub struct EvBatchClosed {
    pub batch_id: u32,
}

/// Emitted on submission. The wealth value itself stays encrypted.
#[contractevent]
pub struct EvWealthSubmitted {
    pub batch_id: u32,
    pub provider: Address,
    pub player: Address,
}

#[contractevent]
pub struct EvEscapeCheckRequested {
    pub request_id: u64,
    pub batch_id: u32,
    pub player: Address,
}

/// Emitted once a decryption callback passes every integrity check.
/// This is the only place plaintext wealth ever becomes visible.
#[contractevent]
pub struct EvEscapeCheckCompleted {
    pub request_id: u64,
    pub batch_id: u32,
    pub player: Address,
    pub wealth: u32,
    pub threshold: u32,
    pub escaped: bool,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  External trait interfaces
// ═══════════════════════════════════════════════════════════════════════════════

/// The external homomorphic cipher engine.
///
/// Handles are the engine's 32-byte transport form. Derived operations
/// (`add`, `mul`, `ge`) are deterministic in their operand handles, so
/// re-running a comparison over unchanged operands reproduces the same
/// handle — the snapshot digest below relies on this.
///
/// `request_decryption` is asynchronous: it returns a request id and the
/// engine's gateway later invokes `fulfill_decryption` on this contract
/// with the cleartexts and a proof. Engine operations panic on handles
/// they do not recognise.
#[contractclient(name = "CipherEngineClient")]
pub trait CipherEngine {
    fn encode(env: Env, value: u32) -> BytesN<32>;
    fn add(env: Env, a: BytesN<32>, b: BytesN<32>) -> BytesN<32>;
    fn mul(env: Env, a: BytesN<32>, scalar: u32) -> BytesN<32>;
    fn ge(env: Env, a: BytesN<32>, b: BytesN<32>) -> BytesN<32>;
    fn is_initialized(env: Env, handle: BytesN<32>) -> bool;
    fn request_decryption(env: Env, handles: Vec<BytesN<32>>) -> u64;
    fn verify_decryption_proof(env: Env, request_id: u64, cleartexts: Vec<u32>, proof: Bytes)
        -> bool;
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum EscapeError {
    NotOwner = 1,
    NotProvider = 2,
    NotOracle = 3,
    Paused = 4,
    AlreadyPaused = 5,
    NotPaused = 6,
    BatchNotOpen = 7,
    CooldownActive = 8,
    InvalidParameters = 9,
    NotInitialized = 10,
    RequestNotFound = 11,
    RequestAlreadyExists = 12,
    ReplayAttempt = 13,
    StateMismatch = 14,
    InvalidProof = 15,
    OwnerNotSet = 16,
    EngineNotSet = 17,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Types & storage keys
// ═══════════════════════════════════════════════════════════════════════════════

/// Owner-settable knobs. Cooldown applies immediately; the three game
/// constants are re-encoded at the next batch open.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GameConfig {
    pub cooldown_secs: u64,
    pub base_wealth: u32,
    pub base_threshold: u32,
    pub growth_rate: u32,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchState {
    pub id: u32,
    pub open: bool,
}

/// Pending decryption request. `state_hash` binds the exact snapshot
/// submitted to the engine; `player` is the key the callback uses to
/// recompute it. Finalized (processed = true) at most once.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecryptionContext {
    pub batch_id: u32,
    pub player: Address,
    pub state_hash: BytesN<32>,
    pub processed: bool,
}

/// Completed escape check, stored per player (ring buffer).
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EscapeRecord {
    pub request_id: u64,
    pub batch_id: u32,
    pub wealth: u32,
    pub threshold: u32,
    pub escaped: bool,
    pub timestamp: u64,
}

#[contracttype]
#[derive(Clone)]
enum DataKey {
    Owner,
    Engine,
    Paused,
    Providers,
    Config,
    Batch,
    /// Current batch's encrypted threshold handle.
    Threshold,
    /// Encrypted starting-wealth handle, re-derived each batch open.
    BaseWealth,
    /// Player wealth handle: DataKey::Wealth(player) → BytesN<32>
    Wealth(Address),
    /// Last submission timestamp per provider.
    SubmitAt(Address),
    /// Last escape-check request timestamp per caller.
    RequestAt(Address),
    /// Pending/processed decryption contexts by request id.
    Request(u64),
    /// Completed escape checks per player (ring buffer).
    EscapeLog(Address),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

const DEFAULT_COOLDOWN_SECS: u64 = 60;
const DEFAULT_BASE_WEALTH: u32 = 100;
const DEFAULT_BASE_THRESHOLD: u32 = 1_000;
const DEFAULT_GROWTH_RATE: u32 = 50;

/// Domain separator for the snapshot digest.
const SNAPSHOT_DOMAIN: &[u8] = b"ESCAPE_SNAPSHOT_V1";

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL expressed in human-readable time units (30 days)
const TTL_SECONDS: u32 = 30 * 24 * 60 * 60;
const STATE_TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

// Escape log TTL: 120 days — persistent storage for per-player results
const LOG_TTL_SECONDS: u32 = 120 * 24 * 60 * 60;
const LOG_TTL_LEDGERS: u32 = LOG_TTL_SECONDS / LEDGER_RATE_SECS;

/// Max completed checks stored per player (ring buffer)
const MAX_ESCAPE_LOG: u32 = 50;

/// Snapshot shape: [wealth, threshold, verdict]
const SNAPSHOT_LEN: u32 = 3;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct EscapeVelocityContract;

#[contractimpl]
impl EscapeVelocityContract {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Constructor
    // ───────────────────────────────────────────────────────────────────────────

    pub fn __constructor(env: Env, owner: Address, engine: Address) {
        env.storage().instance().set(&DataKey::Owner, &owner);
        env.storage().instance().set(&DataKey::Engine, &engine);
        let providers: Vec<Address> = Vec::new(&env);
        env.storage().instance().set(&DataKey::Providers, &providers);
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Access control & configuration
    // ───────────────────────────────────────────────────────────────────────────

    pub fn transfer_ownership(
        env: Env,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;

        env.storage().instance().set(&DataKey::Owner, &new_owner);

        EvOwnershipTransferred {
            previous_owner: caller,
            new_owner,
        }
        .publish(&env);
        Ok(())
    }

    /// Authorize a provider. Adding an existing provider is a no-op
    /// that still succeeds.
    pub fn add_provider(env: Env, caller: Address, provider: Address) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;

        let mut providers = Self::load_providers(&env);
        if !providers.contains(&provider) {
            providers.push_back(provider.clone());
            env.storage().instance().set(&DataKey::Providers, &providers);
            EvProviderAdded { provider }.publish(&env);
        }
        Ok(())
    }

    /// Revoke a provider. Removing a non-provider is a no-op that still
    /// succeeds.
    pub fn remove_provider(
        env: Env,
        caller: Address,
        provider: Address,
    ) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;

        let mut providers = Self::load_providers(&env);
        let mut found: Option<u32> = None;
        for i in 0..providers.len() {
            if providers.get(i).unwrap() == provider {
                found = Some(i);
                break;
            }
        }
        if let Some(index) = found {
            providers.remove(index);
            env.storage().instance().set(&DataKey::Providers, &providers);
            EvProviderRemoved { provider }.publish(&env);
        }
        Ok(())
    }

    /// Halt every mutating entry point except `unpause`.
    pub fn pause(env: Env, caller: Address) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        if Self::paused(&env) {
            return Err(EscapeError::AlreadyPaused);
        }
        env.storage().instance().set(&DataKey::Paused, &true);
        EvPaused { owner: caller }.publish(&env);
        Ok(())
    }

    pub fn unpause(env: Env, caller: Address) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        if !Self::paused(&env) {
            return Err(EscapeError::NotPaused);
        }
        env.storage().instance().set(&DataKey::Paused, &false);
        EvUnpaused { owner: caller }.publish(&env);
        Ok(())
    }

    pub fn set_cooldown_secs(
        env: Env,
        caller: Address,
        cooldown_secs: u64,
    ) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;
        if cooldown_secs == 0 {
            return Err(EscapeError::InvalidParameters);
        }

        let mut config = Self::load_config(&env);
        config.cooldown_secs = cooldown_secs;
        env.storage().instance().set(&DataKey::Config, &config);

        EvCooldownUpdated { cooldown_secs }.publish(&env);
        Ok(())
    }

    /// Update the game constants. They take effect at the next batch
    /// open, when the threshold is re-derived.
    pub fn set_game_params(
        env: Env,
        caller: Address,
        base_wealth: u32,
        base_threshold: u32,
        growth_rate: u32,
    ) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;

        let mut config = Self::load_config(&env);
        config.base_wealth = base_wealth;
        config.base_threshold = base_threshold;
        config.growth_rate = growth_rate;
        env.storage().instance().set(&DataKey::Config, &config);

        EvGameParamsUpdated {
            base_wealth,
            base_threshold,
            growth_rate,
        }
        .publish(&env);
        Ok(())
    }

    /// Swap the cipher engine. Contexts bound to the old engine's
    /// handles will fail their snapshot or proof checks and must be
    /// re-requested.
    pub fn set_engine(env: Env, caller: Address, engine: Address) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;
        env.storage().instance().set(&DataKey::Engine, &engine);
        EvEngineUpdated { engine }.publish(&env);
        Ok(())
    }

    pub fn upgrade(env: Env, caller: Address, new_wasm_hash: BytesN<32>) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        env.deployer().update_current_contract_wasm(new_wasm_hash);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Batch lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    /// Open a new batch and return its id. Opening while a batch is
    /// already open closes-and-reopens: the id advances either way.
    /// The encrypted threshold and starting-wealth handles are
    /// re-derived from the current config through the engine.
    pub fn open_batch(env: Env, caller: Address) -> Result<u32, EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;

        let mut batch = Self::load_batch(&env);
        batch.id = batch.id.saturating_add(1);
        batch.open = true;

        let config = Self::load_config(&env);
        let engine_addr = Self::load_engine(&env)?;
        let engine = CipherEngineClient::new(&env, &engine_addr);

        let base_wealth = engine.encode(&config.base_wealth);
        let base_threshold = engine.encode(&config.base_threshold);
        let growth_rate = engine.encode(&config.growth_rate);

        // threshold = base_threshold + growth_rate * batch_id
        let growth = engine.mul(&growth_rate, &batch.id);
        let threshold = engine.add(&base_threshold, &growth);

        env.storage().instance().set(&DataKey::BaseWealth, &base_wealth);
        env.storage().instance().set(&DataKey::Threshold, &threshold);
        Self::write_batch(&env, &batch);

        EvBatchOpened { batch_id: batch.id }.publish(&env);
        Ok(batch.id)
    }

    /// Close the open batch. The id does not advance here — it advances
    /// lazily on the next open, so contexts issued during the
    /// just-closed batch still match the batch they were requested in.
    pub fn close_batch(env: Env, caller: Address) -> Result<(), EscapeError> {
        Self::require_owner(&env, &caller)?;
        Self::require_not_paused(&env)?;

        let mut batch = Self::load_batch(&env);
        if !batch.open {
            return Err(EscapeError::BatchNotOpen);
        }
        batch.open = false;
        Self::write_batch(&env, &batch);

        EvBatchClosed { batch_id: batch.id }.publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Wealth submission
    // ───────────────────────────────────────────────────────────────────────────

    /// Submit a player's encrypted wealth. Provider-only, batch must be
    /// open, the handle must be engine-initialized, and the provider's
    /// submission cooldown must have elapsed. Fully replaces any prior
    /// handle for the player and restarts the provider's clock.
    pub fn submit_wealth(
        env: Env,
        provider: Address,
        player: Address,
        handle: BytesN<32>,
    ) -> Result<(), EscapeError> {
        provider.require_auth();

        Self::require_not_paused(&env)?;
        Self::require_provider(&env, &provider)?;

        let batch = Self::load_batch(&env);
        if !batch.open {
            return Err(EscapeError::BatchNotOpen);
        }
        Self::check_cooldown(&env, &DataKey::SubmitAt(provider.clone()))?;

        let engine_addr = Self::load_engine(&env)?;
        let engine = CipherEngineClient::new(&env, &engine_addr);
        if !engine.is_initialized(&handle) {
            return Err(EscapeError::NotInitialized);
        }

        Self::store_wealth(&env, &player, &handle);
        Self::touch(&env, &DataKey::SubmitAt(provider.clone()));

        EvWealthSubmitted {
            batch_id: batch.id,
            provider,
            player,
        }
        .publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Escape checks (asynchronous decryption protocol)
    // ───────────────────────────────────────────────────────────────────────────

    /// Ask whether a player has escaped. Open to anyone; cooldown-gated
    /// per caller. Snapshots [wealth, threshold, `wealth >= threshold`],
    /// binds the snapshot digest, and opens an asynchronous decryption
    /// request with the engine. Returns the request id; the result
    /// arrives later through `fulfill_decryption`.
    pub fn request_escape_check(
        env: Env,
        caller: Address,
        player: Address,
    ) -> Result<u64, EscapeError> {
        caller.require_auth();

        Self::require_not_paused(&env)?;

        let batch = Self::load_batch(&env);
        if !batch.open {
            return Err(EscapeError::BatchNotOpen);
        }
        Self::check_cooldown(&env, &DataKey::RequestAt(caller.clone()))?;

        let (wealth, threshold, verdict) = Self::snapshot(&env, &player)?;
        let state_hash = Self::snapshot_digest(&env, &wealth, &threshold, &verdict);

        let engine_addr = Self::load_engine(&env)?;
        let engine = CipherEngineClient::new(&env, &engine_addr);
        let request_id = engine.request_decryption(&vec![&env, wealth, threshold, verdict]);

        let key = DataKey::Request(request_id);
        if env.storage().persistent().has(&key) {
            return Err(EscapeError::RequestAlreadyExists);
        }
        let context = DecryptionContext {
            batch_id: batch.id,
            player: player.clone(),
            state_hash,
            processed: false,
        };
        Self::write_request(&env, request_id, &context);
        Self::touch(&env, &DataKey::RequestAt(caller));

        EvEscapeCheckRequested {
            request_id,
            batch_id: batch.id,
            player,
        }
        .publish(&env);
        Ok(request_id)
    }

    /// Decryption callback, invoked by the engine's gateway.
    ///
    /// Check order matters:
    /// 1. context must exist and must not be processed (replay);
    /// 2. the snapshot recomputed from current state for the context's
    ///    player must still hash to the bound digest — any submission or
    ///    batch transition in the meantime invalidates the context;
    /// 3. the proof must verify against the claimed cleartexts.
    ///
    /// Only then is the context finalized and the plaintext result
    /// published. A `StateMismatch` context stays unprocessed and can
    /// never be completed; callers issue a fresh request instead.
    pub fn fulfill_decryption(
        env: Env,
        oracle: Address,
        request_id: u64,
        cleartexts: Vec<u32>,
        proof: Bytes,
    ) -> Result<(), EscapeError> {
        oracle.require_auth();
        if oracle != Self::load_engine(&env)? {
            return Err(EscapeError::NotOracle);
        }
        Self::require_not_paused(&env)?;

        let key = DataKey::Request(request_id);
        let mut context: DecryptionContext = env
            .storage()
            .persistent()
            .get(&key)
            .ok_or(EscapeError::RequestNotFound)?;
        if context.processed {
            return Err(EscapeError::ReplayAttempt);
        }
        if cleartexts.len() != SNAPSHOT_LEN {
            return Err(EscapeError::InvalidParameters);
        }

        // Recompute the snapshot from current on-chain state, keyed by
        // the player recorded at request time.
        let (wealth, threshold, verdict) = Self::snapshot(&env, &context.player)?;
        let digest = Self::snapshot_digest(&env, &wealth, &threshold, &verdict);
        if digest != context.state_hash {
            return Err(EscapeError::StateMismatch);
        }

        let engine_addr = Self::load_engine(&env)?;
        let engine = CipherEngineClient::new(&env, &engine_addr);
        if !engine.verify_decryption_proof(&request_id, &cleartexts, &proof) {
            return Err(EscapeError::InvalidProof);
        }

        context.processed = true;
        Self::write_request(&env, request_id, &context);

        let wealth_clear = cleartexts.get(0).unwrap_or(0);
        let threshold_clear = cleartexts.get(1).unwrap_or(0);
        let escaped = cleartexts.get(2).unwrap_or(0) != 0;

        Self::append_escape_record(
            &env,
            &context.player,
            EscapeRecord {
                request_id,
                batch_id: context.batch_id,
                wealth: wealth_clear,
                threshold: threshold_clear,
                escaped,
                timestamp: env.ledger().timestamp(),
            },
        );

        EvEscapeCheckCompleted {
            request_id,
            batch_id: context.batch_id,
            player: context.player,
            wealth: wealth_clear,
            threshold: threshold_clear,
            escaped,
        }
        .publish(&env);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Read methods
    // ───────────────────────────────────────────────────────────────────────────

    pub fn get_owner(env: Env) -> Result<Address, EscapeError> {
        Self::load_owner(&env)
    }

    pub fn get_engine(env: Env) -> Result<Address, EscapeError> {
        Self::load_engine(&env)
    }

    pub fn is_paused(env: Env) -> bool {
        Self::paused(&env)
    }

    pub fn is_provider(env: Env, addr: Address) -> bool {
        Self::load_providers(&env).contains(&addr)
    }

    pub fn get_providers(env: Env) -> Vec<Address> {
        Self::load_providers(&env)
    }

    pub fn get_config(env: Env) -> GameConfig {
        Self::load_config(&env)
    }

    pub fn get_batch(env: Env) -> BatchState {
        Self::load_batch(&env)
    }

    /// A player's current wealth handle, if any was ever submitted.
    pub fn get_wealth_handle(env: Env, player: Address) -> Option<BytesN<32>> {
        env.storage().persistent().get(&DataKey::Wealth(player))
    }

    /// The current batch's encrypted threshold handle.
    pub fn get_threshold_handle(env: Env) -> Option<BytesN<32>> {
        env.storage().instance().get(&DataKey::Threshold)
    }

    /// The encrypted starting-wealth handle derived at the last open.
    pub fn get_base_wealth_handle(env: Env) -> Option<BytesN<32>> {
        env.storage().instance().get(&DataKey::BaseWealth)
    }

    pub fn get_request(env: Env, request_id: u64) -> Option<DecryptionContext> {
        env.storage().persistent().get(&DataKey::Request(request_id))
    }

    /// Completed escape checks for a player (up to 50 most recent).
    pub fn get_escape_log(env: Env, player: Address) -> Vec<EscapeRecord> {
        env.storage()
            .persistent()
            .get(&DataKey::EscapeLog(player))
            .unwrap_or_else(|| Vec::new(&env))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Snapshot binding
    // ═══════════════════════════════════════════════════════════════════════════

    /// Build the three-handle snapshot for a player: wealth, the current
    /// threshold, and the encrypted `wealth >= threshold` verdict.
    ///
    /// Called at request time and again at callback time; keeping both
    /// sites on this one function is what makes the digest comparison
    /// meaningful.
    fn snapshot(
        env: &Env,
        player: &Address,
    ) -> Result<(BytesN<32>, BytesN<32>, BytesN<32>), EscapeError> {
        let wealth = Self::load_wealth(env, player)?;
        let threshold = Self::load_threshold(env)?;

        let engine_addr = Self::load_engine(env)?;
        let engine = CipherEngineClient::new(env, &engine_addr);
        let verdict = engine.ge(&wealth, &threshold);

        Ok((wealth, threshold, verdict))
    }

    /// Digest over the snapshot handles plus this contract's own
    /// address, so a decryption bound here can never validate against
    /// another contract's state.
    fn snapshot_digest(
        env: &Env,
        wealth: &BytesN<32>,
        threshold: &BytesN<32>,
        verdict: &BytesN<32>,
    ) -> BytesN<32> {
        let mut data = Bytes::from_slice(env, SNAPSHOT_DOMAIN);
        data.append(&Bytes::from_array(env, &wealth.to_array()));
        data.append(&Bytes::from_array(env, &threshold.to_array()));
        data.append(&Bytes::from_array(env, &verdict.to_array()));
        data.append(&env.current_contract_address().to_string().to_bytes());
        env.crypto().keccak256(&data).into()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Guards
    // ═══════════════════════════════════════════════════════════════════════════

    fn require_owner(env: &Env, caller: &Address) -> Result<(), EscapeError> {
        caller.require_auth();
        if *caller != Self::load_owner(env)? {
            return Err(EscapeError::NotOwner);
        }
        Ok(())
    }

    fn require_provider(env: &Env, caller: &Address) -> Result<(), EscapeError> {
        if !Self::load_providers(env).contains(caller) {
            return Err(EscapeError::NotProvider);
        }
        Ok(())
    }

    fn require_not_paused(env: &Env) -> Result<(), EscapeError> {
        if Self::paused(env) {
            return Err(EscapeError::Paused);
        }
        Ok(())
    }

    fn paused(env: &Env) -> bool {
        env.storage()
            .instance()
            .get(&DataKey::Paused)
            .unwrap_or(false)
    }

    /// Side-effect-free cooldown check for one action clock.
    fn check_cooldown(env: &Env, key: &DataKey) -> Result<(), EscapeError> {
        let last: Option<u64> = env.storage().persistent().get(key);
        if let Some(last) = last {
            let config = Self::load_config(env);
            if env.ledger().timestamp() < last.saturating_add(config.cooldown_secs) {
                return Err(EscapeError::CooldownActive);
            }
        }
        Ok(())
    }

    /// Restart an action clock at the current ledger time.
    fn touch(env: &Env, key: &DataKey) {
        env.storage().persistent().set(key, &env.ledger().timestamp());
        env.storage()
            .persistent()
            .extend_ttl(key, STATE_TTL_LEDGERS, STATE_TTL_LEDGERS);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    //  Internal: Storage
    // ═══════════════════════════════════════════════════════════════════════════

    fn load_owner(env: &Env) -> Result<Address, EscapeError> {
        env.storage()
            .instance()
            .get(&DataKey::Owner)
            .ok_or(EscapeError::OwnerNotSet)
    }

    fn load_engine(env: &Env) -> Result<Address, EscapeError> {
        env.storage()
            .instance()
            .get(&DataKey::Engine)
            .ok_or(EscapeError::EngineNotSet)
    }

    fn load_providers(env: &Env) -> Vec<Address> {
        env.storage()
            .instance()
            .get(&DataKey::Providers)
            .unwrap_or_else(|| Vec::new(env))
    }

    fn load_config(env: &Env) -> GameConfig {
        env.storage()
            .instance()
            .get(&DataKey::Config)
            .unwrap_or(GameConfig {
                cooldown_secs: DEFAULT_COOLDOWN_SECS,
                base_wealth: DEFAULT_BASE_WEALTH,
                base_threshold: DEFAULT_BASE_THRESHOLD,
                growth_rate: DEFAULT_GROWTH_RATE,
            })
    }

    fn load_batch(env: &Env) -> BatchState {
        env.storage()
            .instance()
            .get(&DataKey::Batch)
            .unwrap_or(BatchState { id: 0, open: false })
    }

    fn write_batch(env: &Env, batch: &BatchState) {
        env.storage().instance().set(&DataKey::Batch, batch);
        env.storage()
            .instance()
            .extend_ttl(STATE_TTL_LEDGERS, STATE_TTL_LEDGERS);
    }

    fn load_wealth(env: &Env, player: &Address) -> Result<BytesN<32>, EscapeError> {
        env.storage()
            .persistent()
            .get(&DataKey::Wealth(player.clone()))
            .ok_or(EscapeError::NotInitialized)
    }

    fn store_wealth(env: &Env, player: &Address, handle: &BytesN<32>) {
        let key = DataKey::Wealth(player.clone());
        env.storage().persistent().set(&key, handle);
        env.storage()
            .persistent()
            .extend_ttl(&key, STATE_TTL_LEDGERS, STATE_TTL_LEDGERS);
    }

    fn load_threshold(env: &Env) -> Result<BytesN<32>, EscapeError> {
        env.storage()
            .instance()
            .get(&DataKey::Threshold)
            .ok_or(EscapeError::NotInitialized)
    }

    fn write_request(env: &Env, request_id: u64, context: &DecryptionContext) {
        let key = DataKey::Request(request_id);
        env.storage().persistent().set(&key, context);
        env.storage()
            .persistent()
            .extend_ttl(&key, STATE_TTL_LEDGERS, STATE_TTL_LEDGERS);
    }

    /// Append to a player's escape log (ring buffer, max 50).
    fn append_escape_record(env: &Env, player: &Address, record: EscapeRecord) {
        let key = DataKey::EscapeLog(player.clone());
        let mut log: Vec<EscapeRecord> = env
            .storage()
            .persistent()
            .get(&key)
            .unwrap_or_else(|| Vec::new(env));

        while log.len() >= MAX_ESCAPE_LOG {
            log.remove(0);
        }
        log.push_back(record);

        env.storage().persistent().set(&key, &log);
        env.storage()
            .persistent()
            .extend_ttl(&key, LOG_TTL_LEDGERS, LOG_TTL_LEDGERS);
    }
}
