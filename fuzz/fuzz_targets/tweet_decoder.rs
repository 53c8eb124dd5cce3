#![no_main]

use libfuzzer_sys::fuzz_target;
use tweetcount::decode::decode;
use tweetcount::Matcher;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Decode errors are fine; we only care about panics.
        if let Ok(tweet) = decode(input) {
            let _ = Matcher::mentions().count(&tweet.text);
            let _ = Matcher::topics().count(&tweet.text);
        }
    }
});
