#![no_main]
use libfuzzer_sys::fuzz_target;
use research_core::Config;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Malformed TOML must produce an error, never a panic.
        let _ = Config::from_toml_str(s);
    }
});
