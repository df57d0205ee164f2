//! Fuzz target for endpoint parsing.
//!
//! This tests that endpoint validation never panics on arbitrary input
//! and that every accepted endpoint displays back to its input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use redis_keysync::Endpoint;

fuzz_target!(|raw: &str| {
    // Should never panic
    let parsed = Endpoint::parse(raw);
    let _ = Endpoint::parse_optional(raw);

    if let Ok(endpoint) = parsed {
        assert_eq!(endpoint.to_string(), raw);
        assert!(endpoint.redis_url().starts_with("redis://"));

        // Accepted endpoints stay accepted
        assert_eq!(Endpoint::parse(&endpoint.to_string()).ok(), Some(endpoint));
    }
});
