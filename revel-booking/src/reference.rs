//! Booking reference codes.
//!
//! Eight characters drawn from an unambiguous alphabet: no I, L, O, 0 or 1,
//! so a code read out over the phone survives the trip.

use rand::Rng;

pub const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
pub const REFERENCE_LENGTH: usize = 8;

/// Source of candidate reference codes. Candidates are random, so the
/// confirmation flow probes each one for uniqueness before using it.
pub trait ReferenceGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ShortCodeGenerator;

impl ReferenceGenerator for ShortCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..REFERENCE_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..REFERENCE_ALPHABET.len());
                REFERENCE_ALPHABET[idx] as char
            })
            .collect()
    }
}

/// Whether `code` has the shape of a generated reference.
pub fn is_valid_reference(code: &str) -> bool {
    code.len() == REFERENCE_LENGTH
        && code.bytes().all(|b| REFERENCE_ALPHABET.contains(&b))
}
