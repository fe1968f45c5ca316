use rand::prelude::RngExt;
use rand::rng;

/// Length in characters of an auth token key.
pub const TOKEN_KEY_LENGTH: usize = 40;

/// Generates an auth token key: 20 bytes (160 bits) of random data, hex encoded.
pub fn generate_token_key() -> String {
    let mut key_bytes = [0u8; TOKEN_KEY_LENGTH / 2];
    rng().fill(&mut key_bytes);
    hex::encode(key_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_token_key() {
        let key1 = generate_token_key();
        let key2 = generate_token_key();

        assert_ne!(key1, key2);
        assert_eq!(key1.len(), TOKEN_KEY_LENGTH);
        assert!(key1.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_token_key_decodes_to_twenty_bytes() {
        let bytes = hex::decode(generate_token_key()).unwrap();
        assert_eq!(bytes.len(), TOKEN_KEY_LENGTH / 2);
    }
}
