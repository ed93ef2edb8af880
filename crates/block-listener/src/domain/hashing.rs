//! # Block Header Hashing
//!
//! `block_hash = SHA-256(DER(SEQUENCE { INTEGER number, OCTET STRING previous_hash,
//! OCTET STRING data_hash }))`, rendered as lowercase hex.
//!
//! The encoding is fixed: field order never changes, the integer is the
//! minimal two's-complement form, and lengths follow DER definite-length
//! rules. Any implementation producing the same bytes yields the same hash.

use sha2::{Digest, Sha256};

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_SEQUENCE: u8 = 0x30;

/// Hash a block header triple.
pub fn compute_block_hash(number: u64, previous_hash: &[u8], data_hash: &[u8]) -> String {
    let encoded = encode_header(number, previous_hash, data_hash);
    hex::encode(Sha256::digest(&encoded))
}

/// Canonical DER encoding of the header triple.
pub fn encode_header(number: u64, previous_hash: &[u8], data_hash: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(16 + previous_hash.len() + data_hash.len());
    write_tlv(&mut body, TAG_INTEGER, &integer_content(number));
    write_tlv(&mut body, TAG_OCTET_STRING, previous_hash);
    write_tlv(&mut body, TAG_OCTET_STRING, data_hash);

    let mut out = Vec::with_capacity(body.len() + 4);
    write_tlv(&mut out, TAG_SEQUENCE, &body);
    out
}

fn write_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    write_length(out, content.len());
    out.extend_from_slice(content);
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    out.push(0x80 | significant.len() as u8);
    out.extend_from_slice(significant);
}

/// Minimal big-endian two's-complement content octets of an unsigned value.
fn integer_content(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes
        .iter()
        .take_while(|b| **b == 0)
        .count()
        .min(bytes.len() - 1);
    let mut content = Vec::with_capacity(9);
    // High bit set would read as negative.
    if bytes[skip] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[skip..]);
    content
}
