//! CMAC (OMAC1) over AES-128, per NIST SP 800-38B / RFC 4493.

use super::aes::{encrypt_block, RoundKey, BLOCK_SIZE};
use subtle::ConstantTimeEq;

const RB: u8 = 0x87;

pub type Tag = [u8; BLOCK_SIZE];

fn shift_left_xor_rb(block: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    let mut out = [0u8; BLOCK_SIZE];
    let mut carry = 0u8;
    for i in (0..BLOCK_SIZE).rev() {
        let b = block[i];
        out[i] = (b << 1) | carry;
        carry = (b >> 7) & 1;
    }
    let msb = (block[0] >> 7) & 1;
    if msb == 1 {
        out[BLOCK_SIZE - 1] ^= RB;
    }
    out
}

pub struct Cmac {
    round_key: RoundKey,
    k1: [u8; BLOCK_SIZE],
    k2: [u8; BLOCK_SIZE],
}

impl Cmac {
    pub fn new(key: &[u8; 16]) -> Cmac {
        let round_key = RoundKey::expand(key);

        let mut zero = [0u8; BLOCK_SIZE];
        encrypt_block(&round_key, &mut zero);

        let k1 = shift_left_xor_rb(&zero);
        let k2 = shift_left_xor_rb(&k1);

        Cmac { round_key, k1, k2 }
    }

    /// Compute the 16-byte tag over `msg`.
    pub fn tag(&self, msg: &[u8]) -> Tag {
        if msg.is_empty() {
            return self.finish_last_block([0u8; BLOCK_SIZE], &[], &self.k2, false);
        }

        let num_blocks = (msg.len() + BLOCK_SIZE - 1) / BLOCK_SIZE;
        let complete = msg.len() % BLOCK_SIZE == 0;

        let mut mac = [0u8; BLOCK_SIZE];
        for block_idx in 0..num_blocks - 1 {
            let start = block_idx * BLOCK_SIZE;
            for i in 0..BLOCK_SIZE {
                mac[i] ^= msg[start + i];
            }
            encrypt_block(&self.round_key, &mut mac);
        }

        let last_start = (num_blocks - 1) * BLOCK_SIZE;
        let last_chunk = &msg[last_start..];

        let subkey = if complete { &self.k1 } else { &self.k2 };
        self.finish_last_block(mac, last_chunk, subkey, complete)
    }

    fn finish_last_block(
        &self,
        mut mac: [u8; BLOCK_SIZE],
        last_chunk: &[u8],
        subkey: &[u8; BLOCK_SIZE],
        complete: bool,
    ) -> Tag {
        let mut last_block = [0u8; BLOCK_SIZE];
        last_block[..last_chunk.len()].copy_from_slice(last_chunk);
        if !complete {
            last_block[last_chunk.len()] = 0x80;
        }

        for i in 0..BLOCK_SIZE {
            mac[i] ^= last_block[i] ^ subkey[i];
        }
        encrypt_block(&self.round_key, &mut mac);
        mac
    }

    /// Constant-time verification of `msg` against an expected `tag`.
    pub fn verify(&self, msg: &[u8], tag: &Tag) -> bool {
        let computed = self.tag(msg);
        computed.ct_eq(tag).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // RFC 4493 section 4 test vectors.
    const KEY: [u8; 16] = [
        0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf, 0x4f,
        0x3c,
    ];

    const MSG: [u8; 64] = [
        0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93, 0x17,
        0x2a, 0xae, 0x2d, 0x8a, 0x57, 0x1e, 0x03, 0xac, 0x9c, 0x9e, 0xb7, 0x6f, 0xac, 0x45, 0xaf,
        0x8e, 0x51, 0x30, 0xc8, 0x1c, 0x46, 0xa3, 0x5c, 0xe4, 0x11, 0xe5, 0xfb, 0xc1, 0x19, 0x1a,
        0x0a, 0x52, 0xef, 0xf6, 0x9f, 0x24, 0x45, 0xdf, 0x4f, 0x9b, 0x17, 0xad, 0x2b, 0x41, 0x7b,
        0xe6, 0x6c, 0x37, 0x10,
    ];

    #[test]
    fn rfc4493_example_1_empty_message() {
        let cmac = Cmac::new(&KEY);
        let expected: Tag = [
            0xbb, 0x1d, 0x69, 0x29, 0xe9, 0x59, 0x37, 0x28, 0x7f, 0xa3, 0x7d, 0x12, 0x9b, 0x75,
            0x67, 0x46,
        ];
        assert_eq!(cmac.tag(&[]), expected);
    }

    #[test]
    fn rfc4493_example_2_one_block() {
        let cmac = Cmac::new(&KEY);
        let expected: Tag = [
            0x07, 0x0a, 0x16, 0xb4, 0x6b, 0x4d, 0x41, 0x44, 0xf7, 0x9b, 0xdd, 0x9d, 0xd0, 0x4a,
            0x28, 0x7c,
        ];
        assert_eq!(cmac.tag(&MSG[..16]), expected);
    }

    #[test]
    fn rfc4493_example_3_partial_block() {
        let cmac = Cmac::new(&KEY);
        let expected: Tag = [
            0xdf, 0xa6, 0x67, 0x47, 0xde, 0x9a, 0xe6, 0x30, 0x30, 0xca, 0x32, 0x61, 0x14, 0x97,
            0xc8, 0x27,
        ];
        assert_eq!(cmac.tag(&MSG[..40]), expected);
    }

    #[test]
    fn rfc4493_example_4_two_blocks() {
        let cmac = Cmac::new(&KEY);
        let expected: Tag = [
            0x51, 0xf0, 0xbe, 0xbf, 0x7e, 0x3b, 0x9d, 0x92, 0xfc, 0x49, 0x74, 0x17, 0x79, 0x36,
            0x3c, 0xfe,
        ];
        assert_eq!(cmac.tag(&MSG), expected);
    }

    #[test]
    fn verify_rejects_tampered_tag() {
        let cmac = Cmac::new(&KEY);
        let mut tag = cmac.tag(&MSG[..16]);
        tag[0] ^= 1;
        assert!(!cmac.verify(&MSG[..16], &tag));
    }
}
