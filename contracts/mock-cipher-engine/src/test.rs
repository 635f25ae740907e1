#![cfg(test)]

//! Unit tests for the mock cipher engine: homomorphic arithmetic laws,
//! handle determinism, and the request/proof surface the game contract
//! relies on.

use crate::{MockCipherEngine, MockCipherEngineClient, MockEngineError};
use soroban_sdk::{vec, Bytes, BytesN, Env, Vec};

fn setup() -> (Env, MockCipherEngineClient<'static>) {
    let env = Env::default();
    let engine_addr = env.register(MockCipherEngine, ());
    let client = MockCipherEngineClient::new(&env, &engine_addr);
    (env, client)
}

/// The engine panics with `panic_with_error!`, so `try_*` calls surface
/// the raw contract error code rather than the typed enum.
fn assert_engine_error<T, E1>(
    result: &Result<
        Result<T, E1>,
        Result<soroban_sdk::Error, soroban_sdk::InvokeError>,
    >,
    expected: MockEngineError,
) {
    match result {
        Err(Ok(actual)) => assert_eq!(
            *actual,
            soroban_sdk::Error::from_contract_error(expected as u32),
            "Expected error {:?} ({})",
            expected,
            expected as u32
        ),
        Err(Err(invoke_err)) => panic!(
            "Expected {:?} ({}), got invoke error: {:?}",
            expected, expected as u32, invoke_err
        ),
        Ok(_) => panic!(
            "Expected error {:?} ({}), but operation succeeded",
            expected, expected as u32
        ),
    }
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Encode / decrypt
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn encode_decrypt_round_trip() {
    let (_env, engine) = setup();
    for value in [0u32, 1, 100, 1_000, 123_456_789, u32::MAX] {
        let handle = engine.encode(&value);
        assert_eq!(engine.decrypt(&handle), value);
        assert!(engine.is_initialized(&handle));
    }
}

#[test]
fn same_value_gets_distinct_handles() {
    let (_env, engine) = setup();
    let a = engine.encode(&42);
    let b = engine.encode(&42);
    assert_ne!(a, b);
    assert_eq!(engine.decrypt(&a), engine.decrypt(&b));
}

#[test]
fn foreign_handle_not_initialized() {
    let (env, engine) = setup();
    let foreign = BytesN::<32>::from_array(&env, &[0x5Au8; 32]);
    assert!(!engine.is_initialized(&foreign));

    let result = engine.try_decrypt(&foreign);
    assert_engine_error(&result, MockEngineError::UnknownHandle);
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Homomorphic arithmetic
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn add_produces_sum() {
    let (_env, engine) = setup();
    let a = engine.encode(&900);
    let b = engine.encode(&150);
    let sum = engine.add(&a, &b);
    assert_eq!(engine.decrypt(&sum), 1_050);
}

#[test]
fn add_wraps_modulo_u32() {
    let (_env, engine) = setup();
    let a = engine.encode(&u32::MAX);
    let b = engine.encode(&2);
    let sum = engine.add(&a, &b);
    assert_eq!(engine.decrypt(&sum), 1);
}

#[test]
fn mul_by_plaintext_scalar() {
    let (_env, engine) = setup();
    let a = engine.encode(&50);
    let scaled = engine.mul(&a, &7);
    assert_eq!(engine.decrypt(&scaled), 350);

    let zeroed = engine.mul(&a, &0);
    assert_eq!(engine.decrypt(&zeroed), 0);
}

#[test]
fn ge_encodes_comparison_verdict() {
    let (_env, engine) = setup();
    let low = engine.encode(&100);
    let high = engine.encode(&1_000);

    assert_eq!(engine.decrypt(&engine.ge(&low, &high)), 0);
    assert_eq!(engine.decrypt(&engine.ge(&high, &low)), 1);
    // Equality counts as >=
    let also_low = engine.encode(&100);
    assert_eq!(engine.decrypt(&engine.ge(&low, &also_low)), 1);
}

#[test]
fn derived_handles_are_deterministic() {
    let (_env, engine) = setup();
    let a = engine.encode(&10);
    let b = engine.encode(&20);

    assert_eq!(engine.ge(&a, &b), engine.ge(&a, &b));
    assert_eq!(engine.add(&a, &b), engine.add(&a, &b));
    // ...but sensitive to operand order
    assert_ne!(engine.ge(&a, &b), engine.ge(&b, &a));
}

#[test]
fn arithmetic_on_unknown_handle_rejected() {
    let (env, engine) = setup();
    let a = engine.encode(&10);
    let foreign = BytesN::<32>::from_array(&env, &[0u8; 32]);

    let result = engine.try_add(&a, &foreign);
    assert_engine_error(&result, MockEngineError::UnknownHandle);
}

// ════════════════════════════════════════════════════════════════════════════
//  Tests: Decryption requests & proofs
// ════════════════════════════════════════════════════════════════════════════

#[test]
fn request_records_handles_in_order() {
    let (env, engine) = setup();
    let a = engine.encode(&100);
    let b = engine.encode(&1_000);
    let verdict = engine.ge(&a, &b);

    let request_id = engine.request_decryption(&vec![&env, a, b, verdict]);
    assert_eq!(request_id, 1);

    let cleartexts = engine.reveal_request(&request_id);
    assert_eq!(cleartexts, vec![&env, 100u32, 1_000u32, 0u32]);
}

#[test]
fn request_ids_are_monotonic() {
    let (env, engine) = setup();
    let a = engine.encode(&1);
    let first = engine.request_decryption(&vec![&env, a.clone()]);
    let second = engine.request_decryption(&vec![&env, a]);
    assert_eq!(second, first + 1);
}

#[test]
fn empty_request_rejected() {
    let (env, engine) = setup();
    let empty: Vec<BytesN<32>> = Vec::new(&env);
    let result = engine.try_request_decryption(&empty);
    assert_engine_error(&result, MockEngineError::EmptyRequest);
}

#[test]
fn valid_proof_accepted() {
    let (env, engine) = setup();
    let a = engine.encode(&7);
    let request_id = engine.request_decryption(&vec![&env, a]);

    let cleartexts = engine.reveal_request(&request_id);
    let proof = engine.sign_request(&request_id);
    assert!(engine.verify_decryption_proof(&request_id, &cleartexts, &proof));
}

#[test]
fn wrong_cleartexts_rejected() {
    let (env, engine) = setup();
    let a = engine.encode(&7);
    let request_id = engine.request_decryption(&vec![&env, a]);
    let proof = engine.sign_request(&request_id);

    let forged = vec![&env, 8u32];
    assert!(!engine.verify_decryption_proof(&request_id, &forged, &proof));
}

#[test]
fn tampered_proof_rejected() {
    let (env, engine) = setup();
    let a = engine.encode(&7);
    let request_id = engine.request_decryption(&vec![&env, a]);
    let cleartexts = engine.reveal_request(&request_id);

    let tampered = Bytes::from_array(&env, &[0xEEu8; 32]);
    assert!(!engine.verify_decryption_proof(&request_id, &cleartexts, &tampered));

    let empty = Bytes::new(&env);
    assert!(!engine.verify_decryption_proof(&request_id, &cleartexts, &empty));
}

#[test]
fn unknown_request_rejected() {
    let (env, engine) = setup();
    let cleartexts = vec![&env, 1u32];
    let proof = Bytes::from_array(&env, &[0u8; 32]);
    assert!(!engine.verify_decryption_proof(&99, &cleartexts, &proof));
}

#[test]
fn cleartext_arity_mismatch_rejected() {
    let (env, engine) = setup();
    let a = engine.encode(&7);
    let b = engine.encode(&9);
    let request_id = engine.request_decryption(&vec![&env, a, b]);
    let proof = engine.sign_request(&request_id);

    let short = vec![&env, 7u32];
    assert!(!engine.verify_decryption_proof(&request_id, &short, &proof));
}
