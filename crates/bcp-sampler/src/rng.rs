// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::mix_seed;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Per-chain pseudo-random stream.
pub type ChainRng = Xoshiro256PlusPlus;

/// Seed of chain `chain` for a run started with `seed`.
pub fn chain_seed(seed: u64, chain: usize) -> u64 {
    mix_seed(seed, chain as u64)
}

pub fn chain_rng(seed: u64, chain: usize) -> ChainRng {
    ChainRng::seed_from_u64(chain_seed(seed, chain))
}
