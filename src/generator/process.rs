use async_trait::async_trait;
use log::{ debug, info, warn };
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{ AsyncRead, AsyncReadExt };
use tokio::process::Command;
use tokio::time::Instant;

use super::Generator;
use crate::error::GenerationError;

/// Runs `interpreter script_path <message>` once per call.
///
/// The child is killed when the deadline passes or when the calling future
/// is dropped, so the child never outlives the request that spawned it.
#[derive(Debug, Clone)]
pub struct ProcessGenerator {
    interpreter: String,
    script_path: String,
    timeout: Duration,
}

impl ProcessGenerator {
    pub fn new(interpreter: &str, script_path: &str, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.to_string(),
            script_path: script_path.to_string(),
            timeout,
        }
    }
}

/// How long the pipes may stay open after the child exits. A background
/// descendant can inherit them and never close them.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

async fn drain<R>(stream: Option<R>, buf: &mut Vec<u8>) -> io::Result<()>
    where R: AsyncRead + Unpin
{
    if let Some(mut s) = stream {
        let mut chunk = [0u8; 8192];
        loop {
            let n = s.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }
    Ok(())
}

fn log_drain_result(result: io::Result<()>) {
    if let Err(e) = result {
        warn!("Failed to read generation process output: {}", e);
    }
}

#[async_trait]
impl Generator for ProcessGenerator {
    async fn generate(&self, message: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        let deadline = started + self.timeout;

        let mut child = Command::new(&self.interpreter)
            .arg(&self.script_path)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| GenerationError::Unavailable {
                reason: format!("{} {}: {}", self.interpreter, self.script_path, e),
            })?;
        debug!("Spawned generation process pid={:?}", child.id());

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut out = Vec::new();
        let mut err = Vec::new();
        let mut drained = false;

        let status = {
            let drains = async {
                let (o, e) = tokio::join!(drain(stdout, &mut out), drain(stderr, &mut err));
                o.and(e)
            };
            tokio::pin!(drains);

            // Only the child's exit races the deadline. The pipes are drained
            // alongside so a chatty child never blocks on a full pipe.
            let waited = tokio::time::timeout_at(deadline, async {
                loop {
                    tokio::select! {
                        status = child.wait() => break status,
                        res = &mut drains, if !drained => {
                            drained = true;
                            log_drain_result(res);
                        }
                    }
                }
            }).await;

            match waited {
                Ok(Ok(status)) => {
                    if !drained {
                        match tokio::time::timeout(OUTPUT_GRACE, &mut drains).await {
                            Ok(res) => log_drain_result(res),
                            Err(_) =>
                                debug!(
                                    "Output pipes still open {:?} after exit, using output read so far",
                                    OUTPUT_GRACE
                                ),
                        }
                    }
                    status
                }
                Ok(Err(e)) => {
                    return Err(GenerationError::Unavailable {
                        reason: format!("failed to wait for generation process: {}", e),
                    });
                }
                Err(_) => {
                    warn!("Generation process exceeded {:?}, killing it", self.timeout);
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill timed out generation process: {}", e);
                    }
                    return Err(GenerationError::Timeout(self.timeout));
                }
            }
        };

        if status.success() {
            info!("Generation process finished in {:.2?}", started.elapsed());
            Ok(String::from_utf8_lossy(&out).into_owned())
        } else {
            Err(GenerationError::ExecutionFailed {
                code: status.code(),
                stderr: String::from_utf8_lossy(&err).into_owned(),
            })
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::generator::testing::sh_generator;

    const LONG: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn returns_raw_stdout_on_success() {
        let (_dir, generator) = sh_generator("printf 'Hello\\n'\n", LONG);
        let out = generator.generate("hi").await.unwrap();
        assert_eq!(out, "Hello\n");
    }

    #[tokio::test]
    async fn message_is_passed_as_single_argument() {
        let (_dir, generator) = sh_generator("printf '%s|%s' \"$#\" \"$1\"\n", LONG);
        let message = "what's up; echo $(whoami) && \"quoted\"";
        let out = generator.generate(message).await.unwrap();
        assert_eq!(out, format!("1|{}", message));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_code_and_stderr() {
        let (_dir, generator) = sh_generator("echo partial\necho boom >&2\nexit 1\n", LONG);
        match generator.generate("hi").await {
            Err(GenerationError::ExecutionFailed { code, stderr }) => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr.trim(), "boom");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn signal_termination_has_no_exit_code() {
        let (_dir, generator) = sh_generator("kill -9 $$\n", LONG);
        match generator.generate("hi").await {
            Err(GenerationError::ExecutionFailed { code, .. }) => assert_eq!(code, None),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_interpreter_is_unavailable() {
        let generator = ProcessGenerator::new("/nonexistent/python3", "mini.py", LONG);
        let err = generator.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn hung_process_is_killed_at_deadline() {
        let timeout = Duration::from_millis(300);
        let (_dir, generator) = sh_generator("echo early\nexec sleep 20\n", timeout);
        let started = std::time::Instant::now();
        let err = generator.generate("hi").await.unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, GenerationError::Timeout(t) if t == timeout), "{:?}", err);
        assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(5), "returned late after {:?}", elapsed);
    }

    #[tokio::test]
    async fn exit_is_not_held_up_by_background_descendant() {
        let (_dir, generator) = sh_generator("sleep 5 &\necho hi\nexit 0\n", Duration::from_secs(3));
        let started = std::time::Instant::now();
        let out = generator.generate("x").await.unwrap();
        assert_eq!(out, "hi\n");
        assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn large_output_on_both_streams_is_captured() {
        let script = "head -c 200000 /dev/zero | tr '\\0' a\nhead -c 200000 /dev/zero | tr '\\0' b >&2\n";
        let (_dir, generator) = sh_generator(script, LONG);
        let out = generator.generate("hi").await.unwrap();
        assert_eq!(out.len(), 200000);
        assert!(out.bytes().all(|b| b == b'a'));
    }
}
