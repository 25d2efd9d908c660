#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let _ = nfse_publica::soap::unwrap_response(s);
        let _ = nfse_publica::soap::fault_message(s);
    }
});
