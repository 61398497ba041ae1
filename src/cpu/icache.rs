//! Decoded instruction cache
//!
//! Caches decoded instructions per 4KB page so hot loops skip the decode
//! tables. Entries are validated against the raw word, and stores into a
//! cached page or a FLUSH drop the affected entries.

use std::collections::HashMap;

use super::decode::{decode, Instruction};

/// Instruction slots per page (4KB / 4 bytes)
const INSTS_PER_PAGE: usize = 1024;

#[derive(Clone, Copy)]
struct CachedInst {
    raw: u32,
    insn: Instruction,
    valid: bool,
}

impl Default for CachedInst {
    fn default() -> Self {
        CachedInst {
            raw: 0,
            insn: Instruction::Illegal,
            valid: false,
        }
    }
}

#[derive(Clone)]
struct CachedPage {
    instructions: Box<[CachedInst; INSTS_PER_PAGE]>,
    generation: u32,
}

impl CachedPage {
    fn new(generation: u32) -> Self {
        CachedPage {
            instructions: Box::new([CachedInst::default(); INSTS_PER_PAGE]),
            generation,
        }
    }
}

#[derive(Clone)]
pub struct ICache {
    pages: HashMap<u32, CachedPage>,
    /// Bumped by `invalidate_all`; pages from older generations are stale
    generation: u32,
    pub hits: u64,
    pub misses: u64,
}

impl Default for ICache {
    fn default() -> Self {
        ICache::new()
    }
}

impl ICache {
    pub fn new() -> Self {
        ICache {
            pages: HashMap::with_capacity(64),
            generation: 1,
            hits: 0,
            misses: 0,
        }
    }

    /// Lookup or decode the instruction word `raw` fetched from `addr`
    #[inline(always)]
    pub fn get_or_decode(&mut self, addr: u32, raw: u32) -> Instruction {
        let page_num = addr >> 12;
        let offset = ((addr >> 2) & 0x3FF) as usize;

        if let Some(page) = self.pages.get(&page_num) {
            if page.generation == self.generation {
                let cached = &page.instructions[offset];
                if cached.valid && cached.raw == raw {
                    self.hits += 1;
                    return cached.insn;
                }
            }
        }

        self.misses += 1;
        let insn = decode(raw);

        let generation = self.generation;
        let page = self
            .pages
            .entry(page_num)
            .or_insert_with(|| CachedPage::new(generation));
        if page.generation != generation {
            page.generation = generation;
            page.instructions = Box::new([CachedInst::default(); INSTS_PER_PAGE]);
        }
        page.instructions[offset] = CachedInst {
            raw,
            insn,
            valid: true,
        };
        insn
    }

    /// Drop entries overlapping a store of `len` bytes at `addr`
    #[inline(always)]
    pub fn invalidate_range(&mut self, addr: u32, len: u32) {
        let first = addr & !3;
        let last = addr.wrapping_add(len.saturating_sub(1)) & !3;
        let mut word = first;
        loop {
            self.invalidate_word(word);
            if word == last {
                break;
            }
            word = word.wrapping_add(4);
        }
    }

    fn invalidate_word(&mut self, addr: u32) {
        let page_num = addr >> 12;
        if let Some(page) = self.pages.get_mut(&page_num) {
            if page.generation == self.generation {
                page.instructions[((addr >> 2) & 0x3FF) as usize].valid = false;
            }
        }
    }

    /// Invalidate everything (FLUSH, image reload)
    pub fn invalidate_all(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn reset(&mut self) {
        self.pages.clear();
        self.generation = 1;
        self.hits = 0;
        self.misses = 0;
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
