use anyhow::Result;
use crossbeam_channel::Sender;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::thread;

#[cfg(unix)]
use signal_hook::{consts::SIGINT, consts::SIGTERM, iterator::Signals};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Set once a shutdown signal arrives; counting loops poll it per row
pub static SHOULD_TERMINATE: AtomicBool = AtomicBool::new(false);

/// Signal that requested shutdown, 0 while none has arrived
static SHUTDOWN_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// Control messages sent by the signal handler to blocked receivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctrl {
    Shutdown,
}

/// True once SIGINT or SIGTERM has been received
pub fn shutdown_requested() -> bool {
    SHOULD_TERMINATE.load(Ordering::Relaxed)
}

fn request_shutdown(sig: i32, ctrl_sender: &Sender<Ctrl>) {
    SHUTDOWN_SIGNAL.store(sig, Ordering::Relaxed);
    SHOULD_TERMINATE.store(true, Ordering::Relaxed);
    let _ = ctrl_sender.send(Ctrl::Shutdown);
}

/// Exit code matching the signal that stopped the run, if any
pub fn signal_exit_code() -> Option<ExitCode> {
    match SHUTDOWN_SIGNAL.load(Ordering::Relaxed) {
        0 => None,
        #[cfg(unix)]
        SIGTERM => Some(ExitCode::SignalTerm),
        _ => Some(ExitCode::SignalInt),
    }
}

/// Turns SIGINT/SIGTERM into `SHOULD_TERMINATE` and `Ctrl::Shutdown` messages.
///
/// The first signal stops counting at every local rank and wakes blocked
/// receives, so the coordinator can still release its workers. A second one
/// exits immediately.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new(ctrl_sender: Sender<Ctrl>) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGTERM])?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                for sig in signals.forever() {
                    request_shutdown(sig, &ctrl_sender);
                    shutdown_count += 1;
                    if shutdown_count > 1 {
                        match sig {
                            SIGTERM => ExitCode::SignalTerm.exit(),
                            _ => ExitCode::SignalInt.exit(),
                        }
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let term_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let handle = thread::spawn(move || {
                let mut shutdown_count = 0;
                loop {
                    thread::sleep(std::time::Duration::from_millis(100));
                    if term_flag.swap(false, Ordering::Relaxed) {
                        request_shutdown(SIGINT, &ctrl_sender);
                        shutdown_count += 1;
                        if shutdown_count > 1 {
                            ExitCode::SignalInt.exit();
                        }
                    }
                }
            });

            Ok(SignalHandler { _handle: handle })
        }
    }
}
