// Reachability probe via the system `ping` binary (one echo request).

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::ReachabilityTransport;
use crate::error::ProbeError;

/// Slack on top of the probe timeout for process start-up and exit.
const PROCESS_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct SystemPing {
    program: String,
}

impl Default for SystemPing {
    fn default() -> Self {
        Self::new("ping")
    }
}

impl SystemPing {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl ReachabilityTransport for SystemPing {
    async fn probe(&self, host: &str, timeout: Duration) -> Result<f64, ProbeError> {
        if host.starts_with('-') {
            return Err(ProbeError::Unreachable(format!("refusing host '{}'", host)));
        }
        let wait_secs = timeout.as_secs().max(1).to_string();
        let output = Command::new(&self.program)
            .args(["-c", "1", "-W", wait_secs.as_str(), host])
            .kill_on_drop(true)
            .output();
        let output = match tokio::time::timeout(timeout + PROCESS_GRACE, output).await {
            Ok(Ok(o)) => o,
            Ok(Err(e)) => return Err(ProbeError::Unreachable(format!("spawn ping: {}", e))),
            Err(_) => return Err(ProbeError::Timeout),
        };
        if !output.status.success() {
            return Err(ProbeError::Unreachable(format!(
                "ping exited with {}",
                output.status
            )));
        }
        parse_latency_ms(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| ProbeError::Unreachable("no latency in ping reply".into()))
    }
}

/// Extracts the round-trip time from a `time=12.3 ms` (or `time<1 ms`) token.
pub(crate) fn parse_latency_ms(stdout: &str) -> Option<f64> {
    let start = stdout.find("time=").map(|i| i + 5).or_else(|| stdout.find("time<").map(|i| i + 5))?;
    let rest = &stdout[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest[..end].parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

#[cfg(test)]
mod tests {
    use super::parse_latency_ms;

    #[test]
    fn parses_linux_reply() {
        let out = "PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.\n\
                   64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=14.2 ms\n";
        assert_eq!(parse_latency_ms(out), Some(14.2));
    }

    #[test]
    fn parses_sub_millisecond_reply() {
        assert_eq!(parse_latency_ms("64 bytes from ::1: icmp_seq=1 time<1 ms"), Some(1.0));
    }

    #[test]
    fn missing_time_is_none() {
        assert_eq!(parse_latency_ms("Request timeout for icmp_seq 0"), None);
    }
}
