use rand::Rng;
use sha2::{Digest, Sha256};

/// Uppercase letters and digits minus the easily confused 0/O and 1/I.
const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const DEFAULT_CODE_LENGTH: usize = 8;

pub trait TokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Short human-enterable reset codes drawn from the thread-local CSPRNG.
pub struct CodeGenerator {
    length: usize,
}

impl CodeGenerator {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(6),
        }
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_LENGTH)
    }
}

impl TokenGenerator for CodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::rng();
        (0..self.length)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect()
    }
}

/// Codes are typed by people, so surrounding whitespace and case are ignored.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(normalize_code(code).as_bytes()))
}
