use crate::ingest::*;

use booth_tally::extract::SourceError;
use std::io::ErrorKind;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

pub fn simplify_file_name(p: &Path) -> String {
    p.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| p.display().to_string())
}

/// The pages of a text dump. Pages are separated by form feeds and a final
/// form feed does not start a new page.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(|p| p.to_string()).collect();
    if pages.len() > 1 && pages.last().map_or(false, |p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Runs an external program to completion, killing it after the timeout.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<(), SourceError> {
    let program = cmd.get_program().to_string_lossy().to_string();
    debug!("run_with_timeout: {:?} (timeout {:?})", cmd, timeout);
    let mut child = match cmd.stdout(Stdio::null()).stderr(Stdio::null()).spawn() {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(SourceError::Unavailable(format!("{} is not installed", program)));
        }
        Err(e) => return Err(SourceError::Failed(format!("{}: {}", program, e))),
    };
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) if status.success() => return Ok(()),
            Ok(Some(status)) => {
                return Err(SourceError::Failed(format!("{} exited with {}", program, status)));
            }
            Ok(None) => {}
            Err(e) => return Err(SourceError::Failed(format!("{}: {}", program, e))),
        }
        if start.elapsed() >= timeout {
            warn!("run_with_timeout: killing {} after {:?}", program, timeout);
            if let Err(e) = child.kill() {
                warn!("run_with_timeout: could not kill {}: {}", program, e);
            }
            if let Err(e) = child.wait() {
                warn!("run_with_timeout: could not reap {}: {}", program, e);
            }
            return Err(SourceError::Timeout(format!(
                "{} after {}s",
                program,
                timeout.as_secs()
            )));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_split_on_form_feeds() {
        assert_eq!(split_pages("a\x0cb\x0c"), vec!["a", "b"]);
        assert_eq!(split_pages("a\x0c\x0cb"), vec!["a", "", "b"]);
        assert_eq!(split_pages(""), vec![""]);
    }

    #[test]
    fn missing_program_is_unavailable() {
        let mut cmd = Command::new("form20-no-such-program");
        let res = run_with_timeout(&mut cmd, Duration::from_secs(1));
        assert!(matches!(res, Err(SourceError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[test]
    fn slow_program_is_killed() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let start = Instant::now();
        let res = run_with_timeout(&mut cmd, Duration::from_millis(200));
        assert!(matches!(res, Err(SourceError::Timeout(_))));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name(Path::new("/a/b/TS_2018.json")), "TS_2018.json");
    }
}
