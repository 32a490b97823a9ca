// SPDX-License-Identifier: MIT OR Apache-2.0
//! Translate chat-model conversations between provider wire formats.
//!
//! This crate re-exports the workspace members behind one name. The
//! [`translate`] function covers the common case:
//!
//! ```
//! use convo_bridge::{MetadataMode, TranslateOptions, translate};
//! use serde_json::json;
//!
//! let raw = vec![
//!     json!({"role": "system", "content": "Be brief"}),
//!     json!({"role": "user", "content": "Hi"}),
//! ];
//! let opts = TranslateOptions::new()
//!     .to_format("anthropic")
//!     .metadata_mode(MetadataMode::Strip);
//! let out = translate(raw, &opts).unwrap().into_output().unwrap();
//! assert_eq!(out.system, Some(json!([{"type": "text", "text": "Be brief"}])));
//! ```
#![deny(unsafe_code)]

pub use convo_config as config;
pub use convo_error as error;
pub use convo_inference as inference;
pub use convo_ir as ir;
pub use convo_metadata as metadata;
pub use convo_provider as provider;
pub use convo_providers as providers;
pub use convo_system as system;

pub use convo_error::{ConvoError, ErrorCode};
pub use convo_ir::{Conversation, Message, Part, PartKind};
pub use convo_metadata::MetadataMode;
pub use convo_provider::{Direction, Provider, ProviderOutput, ProviderRegistry, RawInput};
pub use convo_providers::default_registry;
pub use convo_translate::{
    TranslateOptions, Translation, Translator, default_translator, translate,
};
