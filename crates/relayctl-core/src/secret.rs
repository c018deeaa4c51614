//! Account secret generation.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use tracing::warn;

use crate::defaults::MIN_SECRET_LEN;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Largest multiple of the alphabet size that fits in a byte; bytes at or
/// above it are rejected to keep the output unbiased.
const REJECT_AT: u8 = (256 / ALPHABET.len() * ALPHABET.len()) as u8;

const URANDOM: &str = "/dev/urandom";

/// Generate an alphanumeric secret of at least [`MIN_SECRET_LEN`] characters
/// from the OS generator.
pub fn generate_secret(len: usize) -> String {
    generate_secret_from(&mut OsRng, len)
}

/// Generate a secret from `primary`.
///
/// When `primary` fails, bytes are read from `/dev/urandom` directly, and if
/// that fails too a generator seeded from time, process id and a counter is
/// used. None of the fallbacks go through the primary source.
pub fn generate_secret_from<R: RngCore + ?Sized>(primary: &mut R, len: usize) -> String {
    let mut sources = Sources {
        primary,
        urandom: Path::new(URANDOM),
    };
    collect(&mut sources, len)
}

struct Sources<'a, R: ?Sized> {
    primary: &'a mut R,
    urandom: &'a Path,
}

impl<R: RngCore + ?Sized> Sources<'_, R> {
    fn fill(&mut self, buf: &mut [u8]) {
        let Err(e) = self.primary.try_fill_bytes(buf) else {
            return;
        };
        warn!(error = %e, "primary entropy source failed, reading {}", self.urandom.display());
        let read = File::open(self.urandom).and_then(|mut f| f.read_exact(buf));
        if let Err(e) = read {
            warn!(error = %e, "entropy device unavailable, using a locally seeded generator");
            StdRng::from_seed(local_seed()).fill_bytes(buf);
        }
    }
}

fn collect<R: RngCore + ?Sized>(sources: &mut Sources<'_, R>, len: usize) -> String {
    let len = len.max(MIN_SECRET_LEN);
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 64];

    while out.len() < len {
        sources.fill(&mut buf);
        for &b in &buf {
            if b >= REJECT_AT {
                continue;
            }
            out.push(ALPHABET[usize::from(b) % ALPHABET.len()] as char);
            if out.len() == len {
                break;
            }
        }
    }
    out
}

/// Seed material for when no entropy source works at all.
fn local_seed() -> [u8; 32] {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let words = [
        nanos,
        u64::from(std::process::id()),
        COUNTER.fetch_add(1, Ordering::Relaxed),
        &nanos as *const u64 as usize as u64,
    ];

    let mut seed = [0u8; 32];
    let mut state = 0u64;
    for (chunk, word) in seed.chunks_exact_mut(8).zip(words) {
        state = splitmix64(state ^ word);
        chunk.copy_from_slice(&state.to_le_bytes());
    }
    seed
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Entropy source that never delivers.
    struct Broken;

    impl RngCore for Broken {
        fn next_u32(&mut self) -> u32 {
            unreachable!()
        }

        fn next_u64(&mut self) -> u64 {
            unreachable!()
        }

        fn fill_bytes(&mut self, _: &mut [u8]) {
            unreachable!()
        }

        fn try_fill_bytes(&mut self, _: &mut [u8]) -> Result<(), rand::Error> {
            Err(rand::Error::new(std::io::Error::other("no entropy")))
        }
    }

    fn is_secret(s: &str, len: usize) -> bool {
        s.len() == len && s.chars().all(|c| c.is_ascii_alphanumeric())
    }

    #[test]
    fn length_and_charset() {
        assert!(is_secret(&generate_secret(24), 24));
    }

    #[test]
    fn short_request_is_raised_to_minimum() {
        assert_eq!(generate_secret(4).len(), MIN_SECRET_LEN);
    }

    #[test]
    fn long_request_spans_several_buffers() {
        assert_eq!(generate_secret(200).len(), 200);
    }

    #[test]
    fn secrets_differ() {
        assert_ne!(generate_secret(24), generate_secret(24));
    }

    #[test]
    fn failing_primary_falls_back() {
        let a = generate_secret_from(&mut Broken, 32);
        let b = generate_secret_from(&mut Broken, 32);
        assert!(is_secret(&a, 32), "{a}");
        assert_ne!(a, b);
    }

    #[test]
    fn no_entropy_device_uses_local_seed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("urandom");
        let mut sources = Sources {
            primary: &mut Broken,
            urandom: &missing,
        };
        let a = collect(&mut sources, 24);
        let b = collect(&mut sources, 24);
        assert!(is_secret(&a, 24), "{a}");
        assert_ne!(a, b);
    }

    #[test]
    fn local_seeds_never_repeat() {
        assert_ne!(local_seed(), local_seed());
    }
}
