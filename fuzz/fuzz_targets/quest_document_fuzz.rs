//! Fuzz test for the quest definition document decoder
//!
//! Any byte sequence must either decode to a valid definition or produce a
//! `DefinitionError`; a decoded definition always has at least one entry and
//! a stable revision.
//!
//! Run with: cargo +nightly fuzz run quest_document_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use questline_core::{QuestDefinition, DEFAULT_NAMESPACE};

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(def) = QuestDefinition::from_keyed_document("fuzz/quest", &doc, DEFAULT_NAMESPACE) {
        assert!(!def.is_empty(), "a definition always has entries");
        let again = QuestDefinition::from_document(def.id().clone(), &def.to_document(), DEFAULT_NAMESPACE)
            .expect("an encoded definition must decode");
        assert_eq!(again.revision(), def.revision());
    }
});
