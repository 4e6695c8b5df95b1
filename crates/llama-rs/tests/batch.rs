// Batch capacity contract. `llama_batch_init` is plain allocation, so
// these run without any model on disk.

use llama_rs::batch::LlamaBatch;
use llama_rs::token::LlamaToken;

#[test]
fn fill_to_capacity_then_overflow() {
    let mut batch = LlamaBatch::new(8);
    assert_eq!(batch.capacity(), 8);
    assert!(batch.is_empty());

    for i in 0..8 {
        batch
            .add(LlamaToken(i), i, &[0], false)
            .expect("within capacity");
    }
    assert_eq!(batch.len(), 8);

    // One past capacity without an intervening clear must fail.
    assert!(batch.add(LlamaToken(8), 8, &[0], true).is_err());
    assert_eq!(batch.len(), 8);
}

#[test]
fn clear_resets_count_and_allows_refill() {
    let mut batch = LlamaBatch::new(4);
    for i in 0..4 {
        batch.add(LlamaToken(i), i, &[0], false).unwrap();
    }
    batch.clear();
    assert!(batch.is_empty());
    assert_eq!(batch.capacity(), 4);

    for i in 0..4 {
        batch.add(LlamaToken(10 + i), i, &[0], false).unwrap();
    }
    assert_eq!(batch.len(), 4);
}

#[test]
fn only_last_record_requests_logits_after_marking() {
    let mut batch = LlamaBatch::new(4);
    for i in 0..3 {
        batch.add(LlamaToken(i), i, &[0], true).unwrap();
    }
    batch.mark_last_for_logits();

    assert!(!batch.wants_logits(0));
    assert!(!batch.wants_logits(1));
    assert!(batch.wants_logits(2));
}

#[test]
fn more_than_one_seq_id_is_rejected() {
    // Storage is allocated with n_seq_max = 1; a second id has nowhere to
    // go and must fail instead of writing past the slot.
    let mut batch = LlamaBatch::new(4);
    assert!(batch.add(LlamaToken(1), 0, &[0, 1], true).is_err());
    assert!(batch.is_empty());

    // A single id still works afterwards.
    batch.add(LlamaToken(1), 0, &[0], true).unwrap();
    assert_eq!(batch.len(), 1);
}

#[test]
fn single_token_generation_record_requests_logits() {
    let mut batch = LlamaBatch::new(4);
    batch.add(LlamaToken(42), 17, &[0], true).unwrap();
    assert_eq!(batch.len(), 1);
    assert!(batch.wants_logits(0));
}
