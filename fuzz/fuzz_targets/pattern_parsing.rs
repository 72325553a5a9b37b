#![no_main]

use ferrous_web::routing::PathPattern;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(pattern) = PathPattern::parse(raw) {
        assert_eq!(pattern.as_str(), raw);
        assert!(pattern.same_shape(&pattern));
        assert_eq!(pattern.precedence(&pattern), std::cmp::Ordering::Equal);
    }
});
