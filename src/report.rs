// SCHEDLAT REPORT LINE
// ONE PER INTERVAL BOUNDARY. WRITTEN, FLUSHED, DROPPED.
//
// <cpu>:<interval>:<max>:<min>:<avg>:<median>:<samples>:<overflows>:

use std::fmt;
use std::io::Write;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Report {
    pub cpu: usize,
    pub interval_index: u32,
    pub max: i64,
    pub min: i64,
    pub average: i64,
    pub median: i64,
    pub sample_count: usize,
    pub overflow_count: u32,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}:{}:{}:{}:",
            self.cpu,
            self.interval_index,
            self.max,
            self.min,
            self.average,
            self.median,
            self.sample_count,
            self.overflow_count,
        )
    }
}

impl Report {
    // SINGLE write_all SO LINES FROM DIFFERENT CPU THREADS NEVER INTERLEAVE
    pub fn emit<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        let line = format!("{}\n", self);
        out.write_all(line.as_bytes())?;
        out.flush()
    }
}

pub const FORMAT_HELP: &str = "\
Output:
<cpu>:<secs>:<max>:<min>:<avg>:<median>:<samples>:<overflows>:
avg == -1 in case of overflow during calculation.
overflows > 0 if number of samples does not fit in calibrated array.
Values in usec.";

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Report {
        Report {
            cpu: 3,
            interval_index: 4,
            max: 120,
            min: 1,
            average: -1,
            median: 2,
            sample_count: 9000,
            overflow_count: 1,
        }
    }

    #[test]
    fn display_field_order() {
        assert_eq!(sample().to_string(), "3:4:120:1:-1:2:9000:1:");
    }

    #[test]
    fn emit_writes_one_line() {
        let mut out = Vec::new();
        sample().emit(&mut out).unwrap();
        sample().emit(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "3:4:120:1:-1:2:9000:1:\n3:4:120:1:-1:2:9000:1:\n");
    }
}
