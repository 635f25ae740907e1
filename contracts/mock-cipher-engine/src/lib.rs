#![no_std]

//! # Mock Cipher Engine
//!
//! A deterministic stand-in for the external homomorphic ciphertext
//! engine consumed by the escape-velocity game contract. Used by tests
//! and local deployments; it is NOT an encryption scheme.
//!
//! Plaintexts are kept in contract storage behind opaque 32-byte
//! handles. Handles are derived symbolically:
//!
//! ```text
//! encode(v)   handle = keccak256("MOCK_ENC" || nonce_be8 || v_be4)
//! add(a, b)   handle = keccak256("MOCK_ADD" || a || b)
//! mul(a, k)   handle = keccak256("MOCK_MUL" || a || k_be4)
//! ge(a, b)    handle = keccak256("MOCK_GE"  || a || b)
//! ```
//!
//! Fresh encodings of the same value get distinct handles (nonce), but
//! derived operations are deterministic in their operand handles, so a
//! caller that re-runs `ge` over unchanged operands reproduces the same
//! handle. Arithmetic wraps modulo 2^32.
//!
//! ## Decryption requests
//!
//! `request_decryption` assigns a monotonically increasing request id
//! and records the handle list. The gateway role is played by the test
//! harness: `reveal_request` returns the plaintexts and `sign_request`
//! mints the matching proof, `keccak256("MOCK_DECRYPT_PROOF_V1" ||
//! request_id_be8 || cleartext_be4...)`. `verify_decryption_proof`
//! checks the claimed cleartexts against the recorded handles and the
//! proof against that digest.

use soroban_sdk::{
    contract, contracterror, contractevent, contractimpl, contracttype, panic_with_error, Bytes,
    BytesN, Env, Vec,
};

// ═══════════════════════════════════════════════════════════════════════════════
//  Events
// ═══════════════════════════════════════════════════════════════════════════════

#[contractevent]
pub struct EvDecryptionRequested {
    pub request_id: u64,
    pub handle_count: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum MockEngineError {
    UnknownHandle = 1,
    UnknownRequest = 2,
    EmptyRequest = 3,
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Storage keys
// ═══════════════════════════════════════════════════════════════════════════════

#[contracttype]
#[derive(Clone)]
enum DataKey {
    /// Plaintext behind a ciphertext handle.
    Cipher(BytesN<32>),
    /// Next encode nonce.
    NextNonce,
    /// Next decryption request id.
    NextRequestId,
    /// Handle list recorded for a decryption request.
    Request(u64),
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Constants
// ═══════════════════════════════════════════════════════════════════════════════

const TAG_ENC: &[u8] = b"MOCK_ENC";
const TAG_ADD: &[u8] = b"MOCK_ADD";
const TAG_MUL: &[u8] = b"MOCK_MUL";
const TAG_GE: &[u8] = b"MOCK_GE";
const PROOF_DOMAIN: &[u8] = b"MOCK_DECRYPT_PROOF_V1";

// Ledger rate is approximately 5 seconds per ledger on Stellar
const LEDGER_RATE_SECS: u32 = 5;

// TTL expressed in human-readable time units (30 days)
const TTL_SECONDS: u32 = 30 * 24 * 60 * 60;
const CIPHER_TTL_LEDGERS: u32 = TTL_SECONDS / LEDGER_RATE_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
//  Contract
// ═══════════════════════════════════════════════════════════════════════════════

#[contract]
pub struct MockCipherEngine;

#[contractimpl]
impl MockCipherEngine {
    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Homomorphic surface
    // ───────────────────────────────────────────────────────────────────────────

    /// Encrypt a 32-bit value and return its opaque handle. Repeated
    /// encodings of the same value yield distinct handles.
    pub fn encode(env: Env, value: u32) -> BytesN<32> {
        let nonce: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextNonce)
            .unwrap_or(0);
        env.storage()
            .instance()
            .set(&DataKey::NextNonce, &nonce.wrapping_add(1));

        let mut parts = Bytes::from_array(&env, &nonce.to_be_bytes());
        parts.append(&Bytes::from_array(&env, &value.to_be_bytes()));
        let handle = Self::derive_handle(&env, TAG_ENC, &parts);

        Self::write_cipher(&env, &handle, value);
        handle
    }

    /// Homomorphic addition, wrapping modulo 2^32. Panics with
    /// `UnknownHandle` when an operand was never produced by this engine.
    pub fn add(env: Env, a: BytesN<32>, b: BytesN<32>) -> BytesN<32> {
        let pa = Self::read_cipher(&env, &a);
        let pb = Self::read_cipher(&env, &b);

        let mut parts = Bytes::from_array(&env, &a.to_array());
        parts.append(&Bytes::from_array(&env, &b.to_array()));
        let handle = Self::derive_handle(&env, TAG_ADD, &parts);

        Self::write_cipher(&env, &handle, pa.wrapping_add(pb));
        handle
    }

    /// Homomorphic multiplication by a plaintext scalar, wrapping
    /// modulo 2^32.
    pub fn mul(env: Env, a: BytesN<32>, scalar: u32) -> BytesN<32> {
        let pa = Self::read_cipher(&env, &a);

        let mut parts = Bytes::from_array(&env, &a.to_array());
        parts.append(&Bytes::from_array(&env, &scalar.to_be_bytes()));
        let handle = Self::derive_handle(&env, TAG_MUL, &parts);

        Self::write_cipher(&env, &handle, pa.wrapping_mul(scalar));
        handle
    }

    /// Homomorphic greater-or-equal. Returns the handle of an encrypted
    /// boolean (1 = true, 0 = false). Deterministic in its operand
    /// handles.
    pub fn ge(env: Env, a: BytesN<32>, b: BytesN<32>) -> BytesN<32> {
        let pa = Self::read_cipher(&env, &a);
        let pb = Self::read_cipher(&env, &b);

        let mut parts = Bytes::from_array(&env, &a.to_array());
        parts.append(&Bytes::from_array(&env, &b.to_array()));
        let handle = Self::derive_handle(&env, TAG_GE, &parts);

        Self::write_cipher(&env, &handle, if pa >= pb { 1 } else { 0 });
        handle
    }

    /// True when the handle was produced by this engine.
    pub fn is_initialized(env: Env, handle: BytesN<32>) -> bool {
        env.storage().persistent().has(&DataKey::Cipher(handle))
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Asynchronous decryption
    // ───────────────────────────────────────────────────────────────────────────

    /// Open a decryption request over a list of handles and return its
    /// id. The actual decryption is delivered out-of-band: the gateway
    /// (in tests, the harness) obtains the cleartexts and proof and
    /// invokes the requesting contract's callback.
    pub fn request_decryption(env: Env, handles: Vec<BytesN<32>>) -> u64 {
        if handles.is_empty() {
            panic_with_error!(&env, MockEngineError::EmptyRequest);
        }
        for handle in handles.iter() {
            Self::read_cipher(&env, &handle);
        }

        let request_id: u64 = env
            .storage()
            .instance()
            .get(&DataKey::NextRequestId)
            .unwrap_or(0u64)
            .wrapping_add(1);
        env.storage()
            .instance()
            .set(&DataKey::NextRequestId, &request_id);

        let key = DataKey::Request(request_id);
        env.storage().persistent().set(&key, &handles);
        env.storage()
            .persistent()
            .extend_ttl(&key, CIPHER_TTL_LEDGERS, CIPHER_TTL_LEDGERS);

        EvDecryptionRequested {
            request_id,
            handle_count: handles.len(),
        }
        .publish(&env);

        request_id
    }

    /// Verify claimed cleartexts + proof for a request. Returns false on
    /// unknown request id, arity mismatch, any cleartext that differs
    /// from the recorded handle's plaintext, or a proof that does not
    /// match the expected digest.
    pub fn verify_decryption_proof(
        env: Env,
        request_id: u64,
        cleartexts: Vec<u32>,
        proof: Bytes,
    ) -> bool {
        let handles: Option<Vec<BytesN<32>>> =
            env.storage().persistent().get(&DataKey::Request(request_id));
        let handles = match handles {
            Some(h) => h,
            None => return false,
        };

        if cleartexts.len() != handles.len() {
            return false;
        }
        let mut i: u32 = 0;
        while i < handles.len() {
            let handle = handles.get(i).unwrap();
            let expected: Option<u32> = env.storage().persistent().get(&DataKey::Cipher(handle));
            match expected {
                Some(value) if Some(value) == cleartexts.get(i) => {}
                _ => return false,
            }
            i += 1;
        }

        proof == Self::proof_digest(&env, request_id, &cleartexts)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Public: Gateway-side helpers (test harness plays the gateway)
    // ───────────────────────────────────────────────────────────────────────────

    /// Decrypt a single handle.
    pub fn decrypt(env: Env, handle: BytesN<32>) -> u32 {
        Self::read_cipher(&env, &handle)
    }

    /// Cleartexts for a request's handles, in request order.
    pub fn reveal_request(env: Env, request_id: u64) -> Vec<u32> {
        let handles: Vec<BytesN<32>> = env
            .storage()
            .persistent()
            .get(&DataKey::Request(request_id))
            .unwrap_or_else(|| panic_with_error!(&env, MockEngineError::UnknownRequest));

        let mut cleartexts = Vec::new(&env);
        for handle in handles.iter() {
            cleartexts.push_back(Self::read_cipher(&env, &handle));
        }
        cleartexts
    }

    /// Mint the proof the verifier expects for a request's true
    /// cleartexts.
    pub fn sign_request(env: Env, request_id: u64) -> Bytes {
        let cleartexts = Self::reveal_request(env.clone(), request_id);
        Self::proof_digest(&env, request_id, &cleartexts)
    }

    // ───────────────────────────────────────────────────────────────────────────
    //  Internal
    // ───────────────────────────────────────────────────────────────────────────

    fn derive_handle(env: &Env, tag: &[u8], parts: &Bytes) -> BytesN<32> {
        let mut data = Bytes::from_slice(env, tag);
        data.append(parts);
        env.crypto().keccak256(&data).into()
    }

    fn read_cipher(env: &Env, handle: &BytesN<32>) -> u32 {
        env.storage()
            .persistent()
            .get(&DataKey::Cipher(handle.clone()))
            .unwrap_or_else(|| panic_with_error!(env, MockEngineError::UnknownHandle))
    }

    fn write_cipher(env: &Env, handle: &BytesN<32>, value: u32) {
        let key = DataKey::Cipher(handle.clone());
        env.storage().persistent().set(&key, &value);
        env.storage()
            .persistent()
            .extend_ttl(&key, CIPHER_TTL_LEDGERS, CIPHER_TTL_LEDGERS);
    }

    /// proof = keccak256(domain || request_id_be8 || cleartext_be4 ...)
    fn proof_digest(env: &Env, request_id: u64, cleartexts: &Vec<u32>) -> Bytes {
        let mut data = Bytes::from_slice(env, PROOF_DOMAIN);
        data.append(&Bytes::from_array(env, &request_id.to_be_bytes()));
        for value in cleartexts.iter() {
            data.append(&Bytes::from_array(env, &value.to_be_bytes()));
        }
        let digest: BytesN<32> = env.crypto().keccak256(&data).into();
        Bytes::from_array(env, &digest.to_array())
    }
}

#[cfg(test)]
mod test;
