#![no_main]

use libfuzzer_sys::fuzz_target;
use tweetcount::cluster::{Command, Envelope, Message};
use tweetcount::Rank;

fuzz_target!(|data: &[u8]| {
    if let Ok(envelope) = serde_json::from_slice::<Envelope>(data) {
        if let Ok(Message::Command { command }) = envelope.open_for(Rank::new(1)) {
            let _ = command.parse::<Command>();
        }
    }
});
