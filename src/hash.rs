use crate::{
    name::{Name, NameComponent},
    tlv::{Encode, Write},
};

pub type HashValue = u64;

/// One hash per prefix: index 0 is the root, index `i` covers the first `i` components.
pub type HashSequence = Vec<HashValue>;

/// Hash of the first `prefix_len` components of `name` (all of them if `prefix_len` is larger).
/// The root name always hashes to 0.
pub fn compute_hash(name: &Name, prefix_len: usize) -> HashValue {
    name.components()
        .take(prefix_len)
        .fold(0, |hash, component| extend_hash(hash, component))
}

/// Hashes of every prefix of `name` up to `prefix_len` components, computed in a single pass.
pub fn compute_hashes(name: &Name, prefix_len: usize) -> HashSequence {
    let last = prefix_len.min(name.len());
    let mut hashes = HashSequence::with_capacity(last + 1);
    let mut hash = 0;
    hashes.push(hash);
    for component in name.components().take(last) {
        hash = extend_hash(hash, component);
        hashes.push(hash);
    }
    hashes
}

fn extend_hash(prefix_hash: HashValue, component: &NameComponent) -> HashValue {
    let mut hasher = ComponentHasher::default();
    component.encode(&mut hasher);
    let mut hash = prefix_hash;
    add_to_hash(&mut hash, hasher.finish());
    hash
}

// Hashes the TLV encoding of a component as it is written, eight bytes at a time.
#[derive(Default)]
struct ComponentHasher {
    hash: u64,
    chunk: [u8; 8],
    filled: usize,
}

impl ComponentHasher {
    fn finish(mut self) -> u64 {
        if self.filled > 0 {
            self.chunk[self.filled..].fill(0);
            add_to_hash(&mut self.hash, u64::from_be_bytes(self.chunk));
        }
        self.hash
    }
}

impl Write for ComponentHasher {
    fn write(&mut self, mut bytes: &[u8]) {
        while !bytes.is_empty() {
            let n = (8 - self.filled).min(bytes.len());
            self.chunk[self.filled..self.filled + n].copy_from_slice(&bytes[..n]);
            self.filled += n;
            bytes = &bytes[n..];
            if self.filled == 8 {
                add_to_hash(&mut self.hash, u64::from_be_bytes(self.chunk));
                self.filled = 0;
            }
        }
    }
}

#[inline]
fn add_to_hash(hash: &mut u64, i: u64) {
    use core::ops::BitXor;
    *hash = hash
        .rotate_left(5)
        .bitxor(i)
        .wrapping_mul(0x517cc1b727220a95);
}
