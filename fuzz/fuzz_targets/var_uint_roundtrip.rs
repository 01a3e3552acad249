#![no_main]

use libfuzzer_sys::fuzz_target;
use ion_wire::varint::{decode_var_uint, encode_var_uint, var_uint_len, MAX_VAR_INT_BYTES};

// Fuzz target: VarUInt encode->decode roundtrip.
//
// Takes 8 bytes of fuzz input as a u64, encodes it, decodes it and
// asserts the value and length match.
fuzz_target!(|data: &[u8]| {
    if data.len() < 8 {
        return;
    }
    let value = u64::from_le_bytes(data[..8].try_into().unwrap());

    let mut buf = [0u8; MAX_VAR_INT_BYTES];
    let encoded_len = encode_var_uint(value, &mut buf);
    assert_eq!(encoded_len, var_uint_len(value));

    let (decoded, decoded_len) = decode_var_uint(&buf[..encoded_len]).unwrap();
    assert_eq!(decoded, value);
    assert_eq!(decoded_len, encoded_len);
});
