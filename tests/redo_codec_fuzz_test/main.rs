//! Property test: redo record encode/decode round-trips for arbitrary offset/payload, and
//! decoding never panics on an arbitrarily truncated tail.

use bolero::check;
use rvm::codec::{decode_records, RedoRecord};

fn main() {
    check!()
        .with_type()
        .for_each(|input: &(u64, Vec<u8>, u8)| {
            let (offset, payload, truncate_by) = input;
            let record = RedoRecord::new(*offset, payload.clone());

            let mut encoded = Vec::new();
            record.encode(&mut encoded).expect("encode into a Vec cannot fail");

            let decoded = decode_records(encoded.as_slice()).expect("decode of a Vec cannot fail");
            assert_eq!(decoded, vec![record]);

            // Truncating the tail by any amount must never panic, and must only ever yield a
            // prefix of fully-written records (possibly none).
            let cut = (*truncate_by as usize).min(encoded.len());
            let truncated = &encoded[..encoded.len() - cut];
            let records = decode_records(truncated).expect("decode of a truncated buffer cannot fail");
            assert!(records.len() <= 1);
        });
}
