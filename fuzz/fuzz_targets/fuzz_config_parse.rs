// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz translator config parsing with arbitrary TOML text.
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(config) = convo_config::parse_toml(s) else {
        return;
    };
    // Validation must not panic, and a valid config must build a translator.
    if convo_config::validate_config(&config).is_ok() {
        let built = convo_translate::Translator::from_config(convo_providers::default_registry(), &config);
        assert!(built.is_ok());
    }
});
