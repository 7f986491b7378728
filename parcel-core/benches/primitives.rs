use criterion::{black_box, criterion_group, criterion_main, Criterion};

use parcel_core::crypto::aes::{self, RoundKey};
use parcel_core::crypto::cbc::CbcCipher;
use parcel_core::crypto::cmac::Cmac;
use parcel_core::crypto::sha256::Sha256;
use parcel_core::crypto::x25519;

fn aes_block_bench(c: &mut Criterion) {
    let key = [0x2bu8; 16];
    let round_key = RoundKey::expand(&key);
    let mut block = [0x11u8; 16];

    c.bench_function("aes encrypt block", move |b| {
        b.iter(|| {
            aes::encrypt_block(&round_key, black_box(&mut block));
        })
    });
}

fn cbc_bench(c: &mut Criterion) {
    let key = [0x2bu8; 16];
    let iv = [0u8; 16];
    let mut data = vec![0x42u8; 1 << 16];

    c.bench_function("cbc encrypt 64kb", move |b| {
        b.iter(|| {
            let mut cipher = CbcCipher::new(&key, &iv);
            cipher.encrypt(black_box(&mut data));
        })
    });
}

fn cmac_bench(c: &mut Criterion) {
    let key = [0x2bu8; 16];
    let data = vec![0x42u8; 1 << 16];

    c.bench_function("cmac tag 64kb", move |b| {
        b.iter(|| {
            let cmac = Cmac::new(&key);
            black_box(cmac.tag(black_box(&data)));
        })
    });
}

fn sha256_bench(c: &mut Criterion) {
    let data = vec![0x42u8; 1 << 16];

    c.bench_function("sha256 64kb", move |b| {
        b.iter(|| {
            let mut hasher = Sha256::new();
            hasher.update(black_box(&data));
            black_box(hasher.finalize());
        })
    });
}

fn x25519_bench(c: &mut Criterion) {
    let mut alice_secret = [0x11u8; 32];
    x25519::clamp(&mut alice_secret);
    let alice_public = x25519::public_key(&alice_secret);

    let mut bob_secret = [0x22u8; 32];
    x25519::clamp(&mut bob_secret);
    let bob_public = x25519::public_key(&bob_secret);

    c.bench_function("x25519 public key", move |b| {
        b.iter(|| black_box(x25519::public_key(black_box(&alice_secret))));
    });

    c.bench_function("x25519 shared secret", move |b| {
        b.iter(|| black_box(x25519::shared_secret(black_box(&alice_secret), black_box(&bob_public))));
    });

    let _ = alice_public;
}

criterion_group!(benches, aes_block_bench, cbc_bench, cmac_bench, sha256_bench, x25519_bench);
criterion_main!(benches);
