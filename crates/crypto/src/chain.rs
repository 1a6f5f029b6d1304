//! BLAKE3 hash chain
//!
//! Each link commits to the previous link's hash, so any modification,
//! removal or reordering of an earlier link breaks every later one.

use thiserror::Error;

/// A BLAKE3 hash represented as a 32-byte array.
pub type Blake3Hash = [u8; 32];

/// Previous-hash sentinel for the first link in a chain.
pub const GENESIS_HASH: Blake3Hash = [0u8; 32];

/// Chain verification errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    /// Stored hash does not match the recomputed one
    #[error("Hash mismatch at link {index}")]
    HashMismatch { index: usize },

    /// Link does not point at its predecessor
    #[error("Broken link at index {index}")]
    BrokenLink { index: usize },
}

/// Something that can sit in a hash chain.
pub trait ChainLink {
    /// Hash stored on the link
    fn stored_hash(&self) -> Blake3Hash;
    /// Hash of the predecessor stored on the link
    fn prev_hash(&self) -> Blake3Hash;
    /// Hash recomputed from the link's content
    fn recompute_hash(&self) -> Blake3Hash;
}

/// Hash length-prefixed `parts` together with `prev`
pub fn compute_link_hash(parts: &[&[u8]], prev: &Blake3Hash) -> Blake3Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Verify a whole chain starting from [`GENESIS_HASH`]
pub fn verify_links<L: ChainLink>(links: &[L]) -> Result<(), ChainError> {
    let mut expected_prev = GENESIS_HASH;
    for (index, link) in links.iter().enumerate() {
        if link.prev_hash() != expected_prev {
            tracing::warn!(index, "hash chain broken: prev pointer mismatch");
            return Err(ChainError::BrokenLink { index });
        }
        let hash = link.recompute_hash();
        if hash != link.stored_hash() {
            tracing::warn!(index, "hash chain broken: stored hash mismatch");
            return Err(ChainError::HashMismatch { index });
        }
        expected_prev = hash;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Link {
        body: Vec<u8>,
        prev: Blake3Hash,
        hash: Blake3Hash,
    }

    impl Link {
        fn new(body: &[u8], prev: Blake3Hash) -> Self {
            let hash = compute_link_hash(&[body], &prev);
            Self {
                body: body.to_vec(),
                prev,
                hash,
            }
        }
    }

    impl ChainLink for Link {
        fn stored_hash(&self) -> Blake3Hash {
            self.hash
        }
        fn prev_hash(&self) -> Blake3Hash {
            self.prev
        }
        fn recompute_hash(&self) -> Blake3Hash {
            compute_link_hash(&[&self.body], &self.prev)
        }
    }

    fn chain(n: usize) -> Vec<Link> {
        let mut links: Vec<Link> = Vec::new();
        for i in 0..n {
            let prev = links.last().map(|l| l.hash).unwrap_or(GENESIS_HASH);
            links.push(Link::new(format!("event-{}", i).as_bytes(), prev));
        }
        links
    }

    #[test]
    fn test_valid_chain() {
        assert!(verify_links(&chain(5)).is_ok());
        assert!(verify_links::<Link>(&[]).is_ok());
    }

    #[test]
    fn test_tampered_body_detected() {
        let mut links = chain(3);
        links[1].body = b"forged".to_vec();
        assert_eq!(verify_links(&links), Err(ChainError::HashMismatch { index: 1 }));
    }

    #[test]
    fn test_removed_link_detected() {
        let mut links = chain(3);
        links.remove(1);
        assert_eq!(verify_links(&links), Err(ChainError::BrokenLink { index: 1 }));
    }

    #[test]
    fn test_prefix_lengths_bound() {
        let a = compute_link_hash(&[b"ab", b"c"], &GENESIS_HASH);
        let b = compute_link_hash(&[b"a", b"bc"], &GENESIS_HASH);
        assert_ne!(a, b);
    }
}
