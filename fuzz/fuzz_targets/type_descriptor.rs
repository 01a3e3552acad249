#![no_main]

use libfuzzer_sys::fuzz_target;
use ion_wire::TypeDescriptor;

// Fuzz target: type descriptor classification.
//
// Every octet either parses or is rejected; a parsed descriptor must
// give back the octet it came from.
fuzz_target!(|data: &[u8]| {
    for &byte in data {
        if let Ok(descriptor) = TypeDescriptor::from_byte(byte) {
            assert_eq!(descriptor.raw(), byte);
            assert!(!(descriptor.is_null() && descriptor.is_nop_pad()));
            assert_eq!(descriptor.is_null(), descriptor.low_nibble() == 0x0F);
        }
    }
});
