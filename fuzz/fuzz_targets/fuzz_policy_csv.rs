#![no_main]
use libfuzzer_sys::fuzz_target;
use warden_rs::MemoryAdapter;

// Policy text that parses must survive a write/read cycle unchanged
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(adapter) = MemoryAdapter::from_csv_str(text) else {
        return;
    };

    let again = MemoryAdapter::from_csv_str(&adapter.to_csv_string())
        .expect("rendered policy text must parse");
    assert_eq!(adapter.rows(), again.rows());
});
