#![feature(test)]

extern crate test;

use hex_literal::hex;
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use rsa_masked_crt::{
    init_key, private_mod_prerand, private_mod_rand, update_key, BigUint, PublicKeyParts,
    RsaCrtKey, ScratchBuf, Workspace, SCRATCH_WORDS,
};
use test::Bencher;

fn get_key() -> RsaCrtKey {
    // 2048 bits
    let p = hex!(
        "ba69948f830c296242da6bf9ae3fddb76a63dbf0761ed3f644bc"
        "a96a2e1eb75fd1bbd9cd93c72330bcc2a97cfafd12ee27bfde0f"
        "b6ac152df2ec4ab12b11265b41bcb531e39f347fdf09e9562a6e"
        "5a7c020c6534df61c955dd772cc7b9d461fdeea2f3b83663302c"
        "fe5656c235d4ac94c81658ad179919cded8ab1be1e9aa369"
    );
    let q = hex!(
        "9bb7d344184526d29c689eddf0141bf65f013477e36b260e32ae"
        "42c680b2c5ada9181bff32b9f1bfbdd3c29f59fcc3f4b9ee4ce6"
        "766d18ca2fa4fe5c19d24b436c39a781f7a2972e59e616f58cab"
        "bb6132084008fe10ff4dddd054fd2e91cd7d043b8f9795a07881"
        "6cdb5f2e895394e29c37c3e12de41d4f67f17e64baf92c65"
    );
    let dp = hex!(
        "7c46630a575d70ec2c919d511ed53e7a46ed3d4af969e2a42dd3"
        "1b9c1ebf24ea8bd29133b7da1775d32c70fdfca8b7496fd53eb5"
        "2472b8c94c9d8720c760c43cd67dce21426a22ffea069b8ec6f4"
        "3c52ac08437894ebdb8e93a4c885268d96a949c1f7d02442201d"
        "fee439d6ce8dc863300ee5c8ba661133f3b1cbd41467179b"
    );
    let dq = hex!(
        "67cfe22d65836f3712f069e94ab812a43f5622fa979cc409771e"
        "d72f00772e73c61012aa21d14bd52937d714e6a882a3269eddee"
        "f99e1086ca6dfee81136dcd79d7bc5014fc1ba1ee69964a3b31d"
        "2796215ad55b540b54de93e038a8c9b688fe02d25fba63c05056"
        "48923f745b8d0dec68252d40c942be34eff654432750c843"
    );
    let iq = hex!(
        "3ac767dcfae787f9a30bde6fada1c22daa746d10527b131dc7be"
        "c898782d15451c49a4fc0c91ecf8d670d5174c49903427ecd543"
        "cabb075d63220cf984ccfe72179dc284634cbedaf15453287166"
        "9811f4ce512e57b2fbf70e87911090551835d0650dea17862efd"
        "1a3876cf7686dcb950c7e2c80eaa94f54273ae71edf8b10b"
    );

    RsaCrtKey::from_be_bytes(&[3], &p, &q, &dp, &dq, &iq).unwrap()
}

fn get_ciphertext(key: &RsaCrtKey) -> Vec<u8> {
    let m = BigUint::from_bytes_be(b"testing");
    let c = m.modpow(key.e(), key.n()).to_bytes_be();
    let mut out = vec![0u8; key.size()];
    out[key.size() - c.len()..].copy_from_slice(&c);
    out
}

#[bench]
fn bench_rsa_2048_init_key(b: &mut Bencher) {
    let key = get_key();
    let mut rng = ChaCha8Rng::from_seed([42; 32]);
    let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
    let mut ws = Workspace::new(&mut buf);

    b.iter(|| {
        let state = init_key(&mut rng, &key, &mut ws).unwrap();
        test::black_box(state);
    });
}

#[bench]
fn bench_rsa_2048_update_key(b: &mut Bencher) {
    let key = get_key();
    let mut rng = ChaCha8Rng::from_seed([42; 32]);
    let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
    let mut ws = Workspace::new(&mut buf);
    let mut state = init_key(&mut rng, &key, &mut ws).unwrap();

    b.iter(|| {
        update_key(&mut rng, &mut state, &mut ws).unwrap();
    });
}

#[bench]
fn bench_rsa_2048_private_mod_rand(b: &mut Bencher) {
    let key = get_key();
    let c = get_ciphertext(&key);
    let mut rng = ChaCha8Rng::from_seed([42; 32]);
    let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
    let mut ws = Workspace::new(&mut buf);

    b.iter(|| {
        let mut x = c.clone();
        let ok = private_mod_rand(&mut rng, &key, &mut x, &mut ws);
        assert!(bool::from(ok));
        test::black_box(x);
    });
}

#[bench]
fn bench_rsa_2048_private_mod_prerand(b: &mut Bencher) {
    let key = get_key();
    let c = get_ciphertext(&key);
    let mut rng = ChaCha8Rng::from_seed([42; 32]);
    let mut buf: ScratchBuf = [0u32; SCRATCH_WORDS];
    let mut ws = Workspace::new(&mut buf);
    let mut state = init_key(&mut rng, &key, &mut ws).unwrap();

    b.iter(|| {
        let mut x = c.clone();
        let ok = private_mod_prerand(&mut rng, &mut state, &mut x, &mut ws);
        assert!(bool::from(ok));
        test::black_box(x);
    });
}
