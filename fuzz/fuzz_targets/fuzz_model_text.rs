#![no_main]
use libfuzzer_sys::fuzz_target;
use warden_rs::{Enforcer, Model};

// Arbitrary model text must parse or fail cleanly
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(model) = Model::from_text(text) else {
        return;
    };

    // A model that parses must also print back to parseable text
    let printed = model.to_string();
    assert!(Model::from_text(&printed).is_ok());

    if let Ok(e) = Enforcer::new(model) {
        let _ = e.enforce(["alice", "data1", "read"]);
    }
});
