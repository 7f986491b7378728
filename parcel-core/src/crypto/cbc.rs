//! CBC streaming mode over the block cipher in `aes`.
//!
//! The context holds the running IV as state so the wire codec can encrypt
//! the fixed-size header block first, then the variable-length data region,
//! with the two calls chaining correctly — matching
//! `original_source/src/aes128.h`'s `aes128_encrypt`/`aes128_decrypt`, which
//! keep the IV inside the same `aes128_t` the caller reuses across calls.

use super::aes::{decrypt_block, encrypt_block, RoundKey, BLOCK_SIZE};

pub struct CbcCipher {
    round_key: RoundKey,
    iv: [u8; BLOCK_SIZE],
}

impl CbcCipher {
    pub fn new(key: &[u8; 16], iv: &[u8; BLOCK_SIZE]) -> CbcCipher {
        CbcCipher {
            round_key: RoundKey::expand(key),
            iv: *iv,
        }
    }

    /// Encrypt `buf` in place. `buf.len()` must be a multiple of 16.
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        assert_eq!(buf.len() % BLOCK_SIZE, 0, "CBC input must be block-aligned");

        for chunk in buf.chunks_mut(BLOCK_SIZE) {
            let mut block = [0u8; BLOCK_SIZE];
            block.copy_from_slice(chunk);
            for i in 0..BLOCK_SIZE {
                block[i] ^= self.iv[i];
            }
            encrypt_block(&self.round_key, &mut block);
            chunk.copy_from_slice(&block);
            self.iv.copy_from_slice(&block);
        }
    }

    /// Decrypt `buf` in place. `buf.len()` must be a multiple of 16.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        assert_eq!(buf.len() % BLOCK_SIZE, 0, "CBC input must be block-aligned");

        for chunk in buf.chunks_mut(BLOCK_SIZE) {
            let mut cipher_block = [0u8; BLOCK_SIZE];
            cipher_block.copy_from_slice(chunk);

            let mut block = cipher_block;
            decrypt_block(&self.round_key, &mut block);
            for i in 0..BLOCK_SIZE {
                block[i] ^= self.iv[i];
            }
            chunk.copy_from_slice(&block);
            self.iv = cipher_block;
        }
    }
}
