use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

/// Random string of exactly `len` ASCII letters and digits drawn from the OS
/// CSPRNG. Fails only if the OS entropy source does.
pub fn random_alphanumeric(len: usize) -> Result<String, rand::Error> {
    let mut out = String::with_capacity(len);
    let mut buf = [0u8; 48];

    while out.len() < len {
        OsRng.try_fill_bytes(&mut buf)?;
        let missing = len - out.len();
        out.extend(
            STANDARD_NO_PAD
                .encode(buf)
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(missing),
        );
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_length_and_alphabet() {
        for len in [0, 10, 40, 200] {
            let value = random_alphanumeric(len).unwrap();
            assert_eq!(value.len(), len);
            assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_values_differ() {
        let a = random_alphanumeric(40).unwrap();
        let b = random_alphanumeric(40).unwrap();
        assert_ne!(a, b);
    }
}
