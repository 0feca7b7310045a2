//! RC4 stream cipher.
//!
//! PDF Spec: Section 7.6.2 - General Encryption Algorithm
//!
//! Used by security handler revisions 2 and 3 and by the password
//! algorithms of every revision up to 4.

/// RC4 keystream state.
pub struct Rc4 {
    s: [u8; 256],
    i: u8,
    j: u8,
}

impl Rc4 {
    /// Run the key schedule. An empty key yields the identity permutation state.
    pub fn new(key: &[u8]) -> Self {
        let mut s = [0u8; 256];
        for (i, val) in s.iter_mut().enumerate() {
            *val = i as u8;
        }
        if !key.is_empty() {
            let mut j = 0u8;
            for i in 0..256 {
                j = j.wrapping_add(s[i]).wrapping_add(key[i % key.len()]);
                s.swap(i, j as usize);
            }
        }
        Self { s, i: 0, j: 0 }
    }

    /// XOR the keystream into `data` in place.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.i = self.i.wrapping_add(1);
            self.j = self.j.wrapping_add(self.s[self.i as usize]);
            self.s.swap(self.i as usize, self.j as usize);
            let k = self.s[self.i as usize].wrapping_add(self.s[self.j as usize]);
            *byte ^= self.s[k as usize];
        }
    }
}

/// Encrypt or decrypt `data` with `key` (RC4 is symmetric).
pub fn rc4_crypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    Rc4::new(key).apply(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rc4_known_vector() {
        // Key "Key", plaintext "Plaintext"
        let ciphertext = rc4_crypt(b"Key", b"Plaintext");
        assert_eq!(ciphertext, [0xBB, 0xF3, 0x16, 0xE8, 0xD9, 0x40, 0xAF, 0x0A, 0xD3]);
    }

    #[test]
    fn test_rc4_symmetric() {
        let ciphertext = rc4_crypt(b"testkey", b"Hello, World!");
        assert_ne!(&ciphertext[..], b"Hello, World!");
        assert_eq!(rc4_crypt(b"testkey", &ciphertext), b"Hello, World!");
    }

    #[test]
    fn test_rc4_streaming_matches_one_shot() {
        let mut cipher = Rc4::new(b"Secret");
        let mut first = b"Attack at".to_vec();
        let mut second = b" dawn".to_vec();
        cipher.apply(&mut first);
        cipher.apply(&mut second);
        first.extend(second);
        assert_eq!(first, rc4_crypt(b"Secret", b"Attack at dawn"));
    }

    #[test]
    fn test_rc4_empty() {
        assert!(rc4_crypt(b"testkey", b"").is_empty());
    }
}
