//! Fuzz test for the task entry document decoder
//!
//! Feeds arbitrary JSON to `TaskEntry::from_document` looking for panics.
//! Whatever decodes must encode back to a document that decodes to the same
//! entry.
//!
//! Run with: cargo +nightly fuzz run entry_document_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use questline_core::TaskEntry;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(entry) = TaskEntry::from_document(&doc) {
        let again = TaskEntry::from_document(&entry.to_document())
            .expect("an encoded entry must decode");
        assert_eq!(again, entry);
    }
});
