// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Derives an independent 64-bit seed for `stream` from a base `seed`.
///
/// Uses the SplitMix64 finalizer, so neighbouring `(seed, stream)` pairs map
/// to well-separated outputs. Chains use `stream = chain_index`; detector
/// iterations use `stream = iteration`.
pub fn mix_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed
        .wrapping_add(GOLDEN_GAMMA)
        .wrapping_add(stream.wrapping_add(1).wrapping_mul(GOLDEN_GAMMA));
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}
