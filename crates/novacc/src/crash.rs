//! Crash log writer (spec §6.4): installs a panic hook that writes
//! `compiler_crash_YYYYMMDD_HHMMSS.log` to the working directory with a
//! timestamp, the panic payload/location, and a best-effort backtrace.
//! Signal-level (SIGSEGV) crash handling is the out-of-scope
//! "crash-handler installation" collaborator (spec §1); this covers the
//! Rust-panic half of that interface point.

use std::backtrace::Backtrace;
use std::panic::PanicInfo;

fn payload_message(info: &PanicInfo) -> String {
    if let Some(s) = info.payload().downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = info.payload().downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Installs the crash-log panic hook; the previous hook still runs
/// afterwards so stderr output is unchanged.
pub fn install() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_crash_log(info);
        previous(info);
    }));
}

fn write_crash_log(info: &PanicInfo) {
    let now = chrono::Local::now();
    let name = format!("compiler_crash_{}.log", now.format("%Y%m%d_%H%M%S"));
    let backtrace = Backtrace::force_capture();
    let location = info
        .location()
        .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
        .unwrap_or_else(|| "<unknown location>".to_string());
    let body = format!(
        "novacc crash report\ntimestamp: {now}\nlocation: {location}\nmessage: {}\nos: {}\narch: {}\n\nbacktrace:\n{backtrace}\n",
        payload_message(info),
        std::env::consts::OS,
        std::env::consts::ARCH,
    );
    let _ = std::fs::write(name, body);
}
