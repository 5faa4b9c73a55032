//! Short, shareable room codes.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub const MEETING_CODE_LEN: usize = 6;

/// A fresh six-character code such as `K3Q9ZD`.
pub fn generate_meeting_code() -> String {
    generate_with(&mut rand::thread_rng())
}

pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..MEETING_CODE_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Whether `code` has the shape of a generated code.
pub fn is_meeting_code(code: &str) -> bool {
    code.len() == MEETING_CODE_LEN && code.bytes().all(|b| ALPHABET.contains(&b))
}
