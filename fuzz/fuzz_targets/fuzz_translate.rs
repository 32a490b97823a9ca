// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz inference and translation with arbitrary JSON.
//!
//! Verifies no panics on any input, that validation results are internally
//! consistent, and that every successful translation serialises.
#![no_main]
use libfuzzer_sys::fuzz_target;

use convo_metadata::MetadataMode;
use convo_provider::RawInput;
use convo_providers::default_registry;
use convo_translate::{TranslateOptions, default_translator};

const TARGETS: &[&str] = &["canonical", "openai", "anthropic", "gemini"];
const MODES: &[MetadataMode] = &[MetadataMode::Strip, MetadataMode::Passthrough, MetadataMode::Preserve];

fuzz_target!(|data: &[u8]| {
    let value: serde_json::Value = match serde_json::from_slice(data) {
        Ok(v) => v,
        Err(_) => return,
    };
    let Ok(input) = RawInput::try_from(value) else {
        return;
    };

    // --- valid == errors.is_empty() for every provider ---
    if let RawInput::Messages(messages) = &input {
        for provider in default_registry().iter() {
            let result = provider.validate_messages(messages);
            assert_eq!(result.valid, result.errors.is_empty(), "{}", provider.name());
        }
    }

    // --- inference always lands on a registered provider ---
    let translator = default_translator();
    let inferred = translator.infer(&input, None);
    assert!(default_registry().contains(inferred.provider));

    // --- translation never panics, and output serialises ---
    for (i, target) in TARGETS.iter().enumerate() {
        let opts = TranslateOptions::new()
            .to_format(*target)
            .metadata_mode(MODES[i % MODES.len()]);
        match translator.translate(&input, &opts) {
            Ok(out) => {
                assert_eq!(out.format(), *target);
                assert!(out.to_value().is_ok(), "serialisation failed for {target}");
            }
            Err(err) => {
                let _ = err.to_string();
            }
        }
    }
});
