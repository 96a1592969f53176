// SCHEDLAT TOPOLOGY
// ONLINE CPU LIST FROM <sysfs>/devices/system/cpu/online
// FORMAT: "0", "0-7", "0-3,8-11" (KERNEL cpulist)

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed cpu list {0:?}")]
    Parse(String),
}

pub fn online_path(sysfs: &Path) -> PathBuf {
    sysfs.join("devices/system/cpu/online")
}

pub fn parse_cpu_list(raw: &str) -> Result<Vec<usize>, TopologyError> {
    let raw = raw.trim();
    let bad = || TopologyError::Parse(raw.to_string());
    if raw.is_empty() {
        return Err(bad());
    }

    let mut cpus = Vec::new();
    for range in raw.split(',') {
        match range.split_once('-') {
            None => cpus.push(range.parse::<usize>().map_err(|_| bad())?),
            Some((lo, hi)) => {
                let lo = lo.parse::<usize>().map_err(|_| bad())?;
                let hi = hi.parse::<usize>().map_err(|_| bad())?;
                if hi < lo {
                    return Err(bad());
                }
                cpus.extend(lo..=hi);
            }
        }
    }
    cpus.sort_unstable();
    cpus.dedup();
    Ok(cpus)
}

pub fn online_cpus(sysfs: &Path) -> Result<Vec<usize>, TopologyError> {
    let path = online_path(sysfs);
    let raw = fs::read_to_string(&path).map_err(|source| TopologyError::Read {
        path: path.clone(),
        source,
    })?;
    parse_cpu_list(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_cpu() {
        assert_eq!(parse_cpu_list("0\n").unwrap(), vec![0]);
    }

    #[test]
    fn contiguous_range() {
        assert_eq!(parse_cpu_list("0-3").unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn split_ranges() {
        assert_eq!(
            parse_cpu_list("0-1,4,6-7\n").unwrap(),
            vec![0, 1, 4, 6, 7]
        );
    }

    #[test]
    fn garbage_rejected() {
        assert!(parse_cpu_list("").is_err());
        assert!(parse_cpu_list("a-b").is_err());
        assert!(parse_cpu_list("3-1").is_err());
        assert!(parse_cpu_list("0,,2").is_err());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = online_cpus(Path::new("/nonexistent-sysfs-root")).unwrap_err();
        assert!(err.to_string().contains("devices/system/cpu/online"));
    }
}
