//! Structured logging (A2): breadcrumb-gated debug lines plus the four
//! always-on `IN`/`OUT`/`BUF`/`STAT` sinks required by the error design
//! (spec §7). Adapted from the reference crate's C-ABI log sink, with
//! the callback boundary dropped in favour of a plain `eprintln!` sink
//! in normal builds and an in-memory ring buffer under `#[cfg(test)]`
//! so tests can assert on emitted lines.

use bitflags::bitflags;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BreadcrumbFlags: u32 {
        const FLOW_TABLE   = 0b0000_0001;
        const PACKET_BUFFER = 0b0000_0010;
        const SRH          = 0b0000_0100;
        const USDN         = 0b0000_1000;
        const CONTROLLER   = 0b0001_0000;
        const NET_MODEL    = 0b0010_0000;
        const ALL          = u32::MAX;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

struct LogManager {
    mask: Mutex<BreadcrumbFlags>,
    min_level: Mutex<LogLevel>,
}

impl LogManager {
    fn new() -> Self {
        Self {
            mask: Mutex::new(BreadcrumbFlags::empty()),
            min_level: Mutex::new(LogLevel::Info),
        }
    }

    fn dispatch(&self, level: LogLevel, line: String) {
        if level > *self.min_level.lock() {
            return;
        }
        self.emit(line);
    }

    fn breadcrumb(&self, flag: BreadcrumbFlags, line: String) {
        if !self.mask.lock().intersects(flag) {
            return;
        }
        self.emit(format!("[{}] {}", label_for(flag), line));
    }

    fn emit(&self, line: String) {
        #[cfg(test)]
        {
            CAPTURED.with(|cell| cell.borrow_mut().push(line));
            return;
        }
        #[cfg(not(test))]
        eprintln!("{line}");
    }
}

#[cfg(test)]
thread_local! {
    static CAPTURED: std::cell::RefCell<Vec<String>> = std::cell::RefCell::new(Vec::new());
}

static LOGGER: Lazy<LogManager> = Lazy::new(LogManager::new);

fn label_for(flags: BreadcrumbFlags) -> &'static str {
    if flags.contains(BreadcrumbFlags::FLOW_TABLE) {
        "FLOW_TABLE"
    } else if flags.contains(BreadcrumbFlags::PACKET_BUFFER) {
        "PACKET_BUFFER"
    } else if flags.contains(BreadcrumbFlags::SRH) {
        "SRH"
    } else if flags.contains(BreadcrumbFlags::USDN) {
        "USDN"
    } else if flags.contains(BreadcrumbFlags::CONTROLLER) {
        "CONTROLLER"
    } else if flags.contains(BreadcrumbFlags::NET_MODEL) {
        "NET_MODEL"
    } else {
        "LOG"
    }
}

pub fn set_breadcrumb_mask(mask: BreadcrumbFlags) {
    *LOGGER.mask.lock() = mask;
}

pub fn set_min_level(level: LogLevel) {
    *LOGGER.min_level.lock() = level;
}

pub fn warn(message: impl Into<String>) {
    LOGGER.dispatch(LogLevel::Warn, format!("[{}] {}", LogLevel::Warn.as_str(), message.into()));
}

pub fn error(message: impl Into<String>) {
    LOGGER.dispatch(LogLevel::Error, format!("[{}] {}", LogLevel::Error.as_str(), message.into()));
}

pub fn info(message: impl Into<String>) {
    LOGGER.dispatch(LogLevel::Info, format!("[{}] {}", LogLevel::Info.as_str(), message.into()));
}

pub fn breadcrumb(flag: BreadcrumbFlags, message: impl Into<String>) {
    LOGGER.breadcrumb(flag, message.into());
}

/// Structured `IN` sink: an inbound uSDN/RPL message was decoded.
pub fn log_in(msg_type: &str, src_id: u16, dst_id: u16, flow_id: u16, hop_count: u8) {
    LOGGER.dispatch(
        LogLevel::Info,
        format!("IN {msg_type} s:{src_id} d:{dst_id} id:{flow_id} h:{hop_count}"),
    );
}

/// Structured `OUT` sink: an outbound uSDN/RPL message was sent.
pub fn log_out(msg_type: &str, src_id: u16, dst_id: u16, flow_id: u16) {
    LOGGER.dispatch(LogLevel::Info, format!("OUT {msg_type} s:{src_id} d:{dst_id} id:{flow_id}"));
}

/// Structured `BUF` sink: a packet was buffered pending a controller reply.
pub fn log_buf(msg_type: &str, src_id: u16, dst_id: u16, flow_id: u16, hop_count: u8) {
    LOGGER.dispatch(
        LogLevel::Info,
        format!("BUF {msg_type} s:{src_id} d:{dst_id} id:{flow_id} h:{hop_count}"),
    );
}

/// Structured `STAT` sink: a one-off counter line (e.g. first-configuration).
pub fn log_stat(fields: std::fmt::Arguments) {
    LOGGER.dispatch(LogLevel::Info, format!("STAT {fields}"));
}

#[cfg(test)]
pub fn take_captured() -> Vec<String> {
    CAPTURED.with(|cell| std::mem::take(&mut *cell.borrow_mut()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breadcrumb_gated_by_mask() {
        set_breadcrumb_mask(BreadcrumbFlags::empty());
        take_captured();
        breadcrumb(BreadcrumbFlags::FLOW_TABLE, "hidden");
        assert!(take_captured().is_empty());

        set_breadcrumb_mask(BreadcrumbFlags::FLOW_TABLE);
        breadcrumb(BreadcrumbFlags::FLOW_TABLE, "visible");
        let lines = take_captured();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("FLOW_TABLE"));
        assert!(lines[0].contains("visible"));
        set_breadcrumb_mask(BreadcrumbFlags::empty());
    }

    #[test]
    fn structured_sinks_format_expected_fields() {
        take_captured();
        log_in("CJOIN", 9, 1, 0, 1);
        log_out("CFG", 1, 9, 0);
        log_buf("FTQ", 3, 10, 7, 2);
        log_stat(format_args!("n:{} c:1", 9));
        let lines = take_captured();
        assert!(lines[0].starts_with("IN CJOIN s:9 d:1 id:0 h:1"));
        assert!(lines[1].starts_with("OUT CFG s:1 d:9 id:0"));
        assert!(lines[2].starts_with("BUF FTQ s:3 d:10 id:7 h:2"));
        assert!(lines[3].starts_with("STAT n:9 c:1"));
    }
}
