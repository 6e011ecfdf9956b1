//! Re-encodes the signing primitive's fixed-width output for the verifier.
//!
//! The primitive emits r and s as two 32-byte big-endian integers; the
//! verifier expects the tagged variable-length form: each integer wrapped as
//! `0x02 <len> <value>` with leading zeros stripped and a zero byte prepended
//! when the top bit is set, the pair wrapped as `0x30 <len> <r><s>`.
//! Single-byte lengths always suffice on this curve (at most 33 bytes per
//! integer); a larger curve would need multi-byte length encoding.

use common::{AuthError, Result};

const INTEGER_TAG: u8 = 0x02;
const SEQUENCE_TAG: u8 = 0x30;

pub const RAW_SIGNATURE_LEN: usize = 64;
const SCALAR_LEN: usize = 32;

pub fn encode(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.len() != RAW_SIGNATURE_LEN {
        return Err(AuthError::MalformedSignature(format!(
            "raw signature must be {} bytes, got {}",
            RAW_SIGNATURE_LEN,
            raw.len()
        )));
    }

    let r = encode_integer(&raw[..SCALAR_LEN]);
    let s = encode_integer(&raw[SCALAR_LEN..]);

    let mut out = Vec::with_capacity(2 + r.len() + s.len());
    out.push(SEQUENCE_TAG);
    out.push((r.len() + s.len()) as u8);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    Ok(out)
}

pub fn decode(encoded: &[u8]) -> Result<[u8; RAW_SIGNATURE_LEN]> {
    if encoded.len() < 2 {
        return Err(AuthError::MalformedSignature(
            "truncated sequence header".to_string(),
        ));
    }
    if encoded[0] != SEQUENCE_TAG {
        return Err(AuthError::MalformedSignature(format!(
            "expected sequence tag 0x{:02x}, got 0x{:02x}",
            SEQUENCE_TAG, encoded[0]
        )));
    }
    let body_len = encoded[1] as usize;
    if body_len != encoded.len() - 2 {
        return Err(AuthError::MalformedSignature(format!(
            "sequence length {} does not match body length {}",
            body_len,
            encoded.len() - 2
        )));
    }

    let body = &encoded[2..];
    let (r, rest) = decode_integer(body)?;
    let (s, rest) = decode_integer(rest)?;
    if !rest.is_empty() {
        return Err(AuthError::MalformedSignature(format!(
            "{} trailing bytes after second integer",
            rest.len()
        )));
    }

    let mut raw = [0u8; RAW_SIGNATURE_LEN];
    raw[SCALAR_LEN - r.len()..SCALAR_LEN].copy_from_slice(&r);
    raw[RAW_SIGNATURE_LEN - s.len()..].copy_from_slice(&s);
    Ok(raw)
}

fn encode_integer(scalar: &[u8]) -> Vec<u8> {
    let mut value: Vec<u8> = match scalar.iter().position(|&b| b != 0) {
        Some(first) => scalar[first..].to_vec(),
        None => vec![0x00],
    };
    // keep the signed-integer interpretation non-negative
    if value[0] & 0x80 != 0 {
        value.insert(0, 0x00);
    }

    let mut out = Vec::with_capacity(2 + value.len());
    out.push(INTEGER_TAG);
    out.push(value.len() as u8);
    out.extend_from_slice(&value);
    out
}

fn decode_integer(input: &[u8]) -> Result<(Vec<u8>, &[u8])> {
    if input.len() < 2 {
        return Err(AuthError::MalformedSignature(
            "truncated integer header".to_string(),
        ));
    }
    if input[0] != INTEGER_TAG {
        return Err(AuthError::MalformedSignature(format!(
            "expected integer tag 0x{:02x}, got 0x{:02x}",
            INTEGER_TAG, input[0]
        )));
    }
    let len = input[1] as usize;
    if len == 0 {
        return Err(AuthError::MalformedSignature(
            "zero-length integer".to_string(),
        ));
    }
    if input.len() < 2 + len {
        return Err(AuthError::MalformedSignature(format!(
            "integer length {} exceeds remaining {} bytes",
            len,
            input.len() - 2
        )));
    }

    let value = &input[2..2 + len];
    let magnitude = match value.iter().position(|&b| b != 0) {
        Some(first) => &value[first..],
        None => &[],
    };
    if magnitude.len() > SCALAR_LEN {
        return Err(AuthError::MalformedSignature(format!(
            "integer magnitude is {} bytes, at most {} allowed",
            magnitude.len(),
            SCALAR_LEN
        )));
    }

    Ok((magnitude.to_vec(), &input[2 + len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(r: [u8; 32], s: [u8; 32]) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&r);
        out[32..].copy_from_slice(&s);
        out
    }

    #[test]
    fn test_zero_signature() {
        let input = raw([0u8; 32], [0u8; 32]);
        let encoded = encode(&input).unwrap();
        assert_eq!(encoded, vec![0x30, 0x06, 0x02, 0x01, 0x00, 0x02, 0x01, 0x00]);
        assert_eq!(decode(&encoded).unwrap(), input);
    }

    #[test]
    fn test_high_bit_gets_zero_padded() {
        let mut r = [0u8; 32];
        r[0] = 0x80;
        let input = raw(r, [0u8; 32]);
        let encoded = encode(&input).unwrap();
        // r should encode as 33 bytes: a zero pad plus the 32-byte value
        assert_eq!(encoded[2], 0x02);
        assert_eq!(encoded[3], 33);
        assert_eq!(encoded[4], 0x00);
        assert_eq!(encoded[5], 0x80);
        assert_eq!(decode(&encoded).unwrap(), input);
    }

    #[test]
    fn test_leading_zeros_are_stripped() {
        let mut s = [0u8; 32];
        s[31] = 0x01;
        let input = raw([0u8; 32], s);
        let encoded = encode(&input).unwrap();
        assert_eq!(&encoded[5..], &[0x02, 0x01, 0x01]);
        assert_eq!(decode(&encoded).unwrap(), input);
    }

    #[test]
    fn test_max_value_round_trip() {
        let input = raw([0xff; 32], [0xff; 32]);
        let encoded = encode(&input).unwrap();
        // both integers padded to 33 bytes, 70-byte body behind the header
        assert_eq!(encoded.len(), 72);
        assert_eq!(decode(&encoded).unwrap(), input);
    }

    #[test]
    fn test_random_round_trips() {
        for _ in 0..200 {
            let input = raw(rand::random(), rand::random());
            let encoded = encode(&input).unwrap();
            assert_eq!(decode(&encoded).unwrap(), input);
        }
    }

    #[test]
    fn test_encode_rejects_wrong_length() {
        assert!(matches!(
            encode(&[0u8; 63]),
            Err(AuthError::MalformedSignature(_))
        ));
        assert!(matches!(
            encode(&[0u8; 65]),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_sequence_tag() {
        let mut encoded = encode(&[1u8; 64]).unwrap();
        encoded[0] = 0x31;
        assert!(matches!(
            decode(&encoded),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_integer_tag() {
        let mut encoded = encode(&[1u8; 64]).unwrap();
        encoded[2] = 0x04;
        assert!(matches!(
            decode(&encoded),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_input() {
        let encoded = encode(&[1u8; 64]).unwrap();
        assert!(matches!(
            decode(&encoded[..encoded.len() - 1]),
            Err(AuthError::MalformedSignature(_))
        ));
        assert!(matches!(
            decode(&[0x30]),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut encoded = encode(&[1u8; 64]).unwrap();
        encoded.push(0x00);
        assert!(matches!(
            decode(&encoded),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_integer() {
        // 33 bytes of magnitude without a zero pad cannot fit a 32-byte scalar
        let mut encoded = vec![0x30, 0x26, 0x02, 0x21];
        encoded.extend_from_slice(&[0x01; 33]);
        encoded.extend_from_slice(&[0x02, 0x01, 0x00]);
        assert!(matches!(
            decode(&encoded),
            Err(AuthError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_decode_rejects_zero_length_integer() {
        let encoded = vec![0x30, 0x05, 0x02, 0x00, 0x02, 0x01, 0x00];
        assert!(matches!(
            decode(&encoded),
            Err(AuthError::MalformedSignature(_))
        ));
    }
}
