//! Initial passwords for imported rows that did not supply one

use rand::Rng;

/// Letters and digits without look-alikes (no I, O, l, i, o, 0, 1)
pub const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghjkmnpqrstuvwxyz23456789";

pub const GENERATED_PASSWORD_LEN: usize = 8;

pub fn generate_password() -> String {
    generate_password_with(&mut rand::thread_rng())
}

pub fn generate_password_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())] as char)
        .collect()
}
