//! Property test strategies for vault types

use proptest::prelude::*;

pub use proptest;

use vault_core::BlobId;
use vault_crypto::{KeySize, SecretKey};

/// Blob ids over the whole account/container/partition space
pub fn arb_blob_id() -> impl Strategy<Value = BlobId> {
    (any::<u16>(), any::<u16>(), any::<u64>())
        .prop_map(|(account, container, partition)| BlobId::new(account, container, partition))
}

/// Either supported AES key size
pub fn arb_key_size() -> impl Strategy<Value = KeySize> {
    prop_oneof![Just(KeySize::Aes128), Just(KeySize::Aes256)]
}

/// Valid secret keys of either size
pub fn arb_secret_key() -> impl Strategy<Value = SecretKey> {
    arb_key_size().prop_flat_map(|size| {
        proptest::collection::vec(any::<u8>(), size.bytes())
            .prop_filter("all-zero keys are rejected", |bytes| bytes.iter().any(|b| *b != 0))
            .prop_map(|bytes| SecretKey::from_bytes(bytes).unwrap())
    })
}

/// Payloads up to 4 KiB, including empty
pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(any::<u8>(), 0..4096)
}
