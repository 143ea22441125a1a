pub mod process;

use async_trait::async_trait;
use std::sync::Arc;

use crate::cli::Args;
use crate::error::GenerationError;
pub use self::process::ProcessGenerator;

/// Produces raw generated text for a single chat message.
///
/// Implementations return the untrimmed output; trimming and the empty
/// output fallback are applied by the HTTP layer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, message: &str) -> Result<String, GenerationError>;
}

pub fn new_generator(args: &Args) -> Arc<dyn Generator> {
    Arc::new(ProcessGenerator::new(&args.interpreter, &args.script_path, args.timeout()))
}

#[cfg(all(test, unix))]
pub(crate) mod testing {
    use super::ProcessGenerator;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes `body` to a temporary shell script and returns a generator
    /// running it through `sh`. Keep the `TempDir` alive for the test.
    pub(crate) fn sh_generator(body: &str, timeout: Duration) -> (TempDir, ProcessGenerator) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mini_iceburg.sh");
        std::fs::write(&path, body).unwrap();
        let generator = ProcessGenerator::new("sh", &path.to_string_lossy(), timeout);
        (dir, generator)
    }
}
