// SCHEDLAT AFFINITY BINDER
// PINS THE CALLING THREAD TO ONE LOGICAL CPU. NO FALLBACK:
// AN UNPINNED SAMPLER MEASURES MIGRATIONS, NOT SCHEDULING LATENCY.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindError {
    #[error("cpu {cpu} is outside the affinity mask range (max {max})")]
    InvalidCpu { cpu: usize, max: usize },

    #[error("sched_setaffinity(cpu={cpu}) failed: {source}")]
    Affinity {
        cpu: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("cpu affinity is not supported on this platform")]
    Unsupported,
}

#[cfg(target_os = "linux")]
pub fn bind(cpu: usize) -> Result<(), BindError> {
    let max = libc::CPU_SETSIZE as usize;
    if cpu >= max {
        return Err(BindError::InvalidCpu { cpu, max });
    }

    // PID 0 == CALLING THREAD
    let ret = unsafe {
        let mut mask: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut mask);
        libc::CPU_SET(cpu, &mut mask);
        libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &mask)
    };

    if ret != 0 {
        return Err(BindError::Affinity {
            cpu,
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
pub fn bind(_cpu: usize) -> Result<(), BindError> {
    Err(BindError::Unsupported)
}

// CPU THE CALLING THREAD IS RUNNING ON RIGHT NOW
#[cfg(target_os = "linux")]
pub fn current_cpu() -> Option<usize> {
    let cpu = unsafe { libc::sched_getcpu() };
    if cpu < 0 {
        None
    } else {
        Some(cpu as usize)
    }
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> Option<usize> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_os = "linux")]
    fn out_of_range_cpu_rejected() {
        let err = bind(libc::CPU_SETSIZE as usize + 5).unwrap_err();
        assert!(matches!(err, BindError::InvalidCpu { .. }));
    }

    // NEEDS A LINUX HOST THAT LETS US PIN TO CPU 0
    #[test]
    #[ignore]
    #[cfg(target_os = "linux")]
    fn bind_pins_calling_thread() {
        std::thread::spawn(|| {
            bind(0).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(10));
            assert_eq!(current_cpu(), Some(0));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn error_messages_name_the_cpu() {
        let err = BindError::Affinity {
            cpu: 12,
            source: std::io::Error::from_raw_os_error(libc::EINVAL),
        };
        assert!(err.to_string().starts_with("sched_setaffinity(cpu=12) failed"));
    }
}
