#![allow(dead_code)]

use std::{
    collections::VecDeque,
    str::FromStr,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use log::{debug, LevelFilter};
use simplelog::SimpleLogger;

use ledger_acre::{Error, Exchange};

/// Setup logging for tests, level from `LOG_LEVEL`
pub fn setup_logging() {
    let log_level = match std::env::var("LOG_LEVEL").map(|v| LevelFilter::from_str(&v)) {
        Ok(Ok(l)) => l,
        _ => LevelFilter::Debug,
    };

    let _ = SimpleLogger::init(log_level, simplelog::Config::default());
}

/// Transport replaying a recorded `=>` / `<=` APDU trace
///
/// Each sent frame must match the next recorded command.
pub struct ReplayTransport {
    frames: VecDeque<(Vec<u8>, Vec<u8>)>,
}

impl ReplayTransport {
    pub fn new(trace: &str) -> Self {
        let mut frames = VecDeque::new();
        let mut command = None;

        for l in trace.lines().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            if let Some(c) = l.strip_prefix("=>") {
                command = Some(hex::decode(c.trim()).expect("invalid command hex"));
            } else if let Some(r) = l.strip_prefix("<=") {
                let c = command.take().expect("response without command");
                frames.push_back((c, hex::decode(r.trim()).expect("invalid response hex")));
            } else {
                panic!("invalid trace line: {l}");
            }
        }

        Self { frames }
    }

    /// Check whether all recorded frames have been consumed
    pub fn is_done(&self) -> bool {
        self.frames.is_empty()
    }
}

#[async_trait]
impl Exchange for ReplayTransport {
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        let (expected, resp) = self.frames.pop_front().expect("trace exhausted");

        assert_eq!(
            hex::encode(command),
            hex::encode(expected),
            "command mismatch"
        );

        Ok(resp)
    }
}

/// Transport returning scripted responses and recording sent frames
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response body with the provided status word
    pub fn respond(&self, body: &[u8], sw: u16) -> &Self {
        let mut r = body.to_vec();
        r.extend_from_slice(&sw.to_be_bytes());
        self.responses.lock().unwrap().push_back(r);
        self
    }

    /// Queue a client command (interrupted execution)
    pub fn interrupt(&self, command: &[u8]) -> &Self {
        self.respond(command, 0xe000)
    }

    /// Queue a successful completion
    pub fn complete(&self, body: &[u8]) -> &Self {
        self.respond(body, 0x9000)
    }

    /// Frames sent so far
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of unused scripted responses
    pub fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait]
impl Exchange for ScriptedTransport {
    async fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        debug!("scripted => {}", hex::encode(command));

        self.sent.lock().unwrap().push(command.to_vec());

        let r = self.responses.lock().unwrap().pop_front();
        r.ok_or(Error::UnexpectedResponse)
    }
}

/// Split a continuation frame into its payload, checking the header
pub fn continuation_payload(frame: &[u8]) -> &[u8] {
    assert_eq!(&frame[..4], &[0xf8, 0x01, 0x00, 0x00], "not a continuation");
    assert_eq!(frame[4] as usize, frame.len() - 5, "Lc mismatch");
    &frame[5..]
}
