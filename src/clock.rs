// SCHEDLAT CLOCK
// TIMESTAMPS ARE (SECONDS, MICROSECONDS) PAIRS, LIKE struct timeval.
// THE SAMPLING LOOP READS THROUGH THE Clock TRAIT SO TESTS CAN SCRIPT TIME.

use std::time::Duration;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ClockSource {
    // WALL CLOCK. MAY STEP BACKWARDS (NTP, VM RESUME) -> NEGATIVE DIFFS.
    Realtime,
    // NEVER STEPS BACKWARDS. NOT THE WALL CLOCK: DEADLINES DRIFT FROM CALENDAR SECONDS.
    Monotonic,
}

impl ClockSource {
    fn clock_id(self) -> libc::clockid_t {
        match self {
            Self::Realtime => libc::CLOCK_REALTIME,
            Self::Monotonic => libc::CLOCK_MONOTONIC,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Realtime => "REALTIME",
            Self::Monotonic => "MONOTONIC",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Timestamp {
    pub secs: i64,
    pub usecs: i64,
}

impl Timestamp {
    pub fn new(secs: i64, usecs: i64) -> Self {
        Self { secs, usecs }
    }

    // SIGNED MICROSECOND GAP. NEGATIVE IF self IS EARLIER THAN earlier.
    pub fn micros_since(&self, earlier: &Timestamp) -> i64 {
        (self.secs - earlier.secs) * 1_000_000 + (self.usecs - earlier.usecs)
    }

    pub fn plus_secs(&self, secs: u32) -> Timestamp {
        Timestamp {
            secs: self.secs + secs as i64,
            usecs: self.usecs,
        }
    }

    // BOUNDARY TEST: BOTH COMPONENTS MUST INDIVIDUALLY REACH THE DEADLINE.
    // NOT EQUIVALENT TO self >= deadline: 12.000100 HAS NOT "REACHED" 11.500000.
    // A LATE BOUNDARY CAN THEREFORE SLIP BY UP TO ONE SECOND.
    pub fn reached(&self, deadline: &Timestamp) -> bool {
        self.secs >= deadline.secs && self.usecs >= deadline.usecs
    }
}

pub trait Clock {
    fn now(&mut self) -> Timestamp;
}

pub struct SystemClock {
    id: libc::clockid_t,
}

impl SystemClock {
    pub fn new(source: ClockSource) -> Self {
        Self { id: source.clock_id() }
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now(&mut self) -> Timestamp {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        unsafe {
            libc::clock_gettime(self.id, &mut ts);
        }
        Timestamp {
            secs: ts.tv_sec as i64,
            usecs: ts.tv_nsec as i64 / 1000,
        }
    }
}

// PLAIN BLOCKING SLEEP FOR THE SETTLE DELAY AND THE INTER-INTERVAL PAUSE.
// NEVER CALLED INSIDE THE MEASURED REGION.
pub fn pause(d: Duration) {
    let req = libc::timespec {
        tv_sec: d.as_secs() as _,
        tv_nsec: d.subsec_nanos() as _,
    };
    unsafe {
        libc::nanosleep(&req, std::ptr::null_mut());
    }
}
