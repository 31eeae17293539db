//! Client artifact generation.
//!
//! A successful bootstrap answers with a compiled client artifact: a
//! per-identity binary carrying the session key, a challenge seed, and the
//! value the client must be able to derive from it. The generator seam
//! keeps the dispatcher testable; the production implementation renders a
//! source template and shells out to a compiler.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use rand::RngCore;
use sealpost_crypto::{hash32, random_buffer_from_seed};
use thiserror::Error;

use crate::{config::ServiceConfig, matcher::glob_match};

/// Everything a generator needs for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRequest {
    /// Identity the artifact is bound to.
    pub id_hash: [u8; 32],
    /// Session key baked into the artifact.
    pub session_key: [u8; 16],
    /// Challenge seed baked into the artifact.
    pub seed: u32,
    /// Value the artifact must derive from the seed.
    pub expected_value: u64,
}

/// Per-identity values minted at bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientValues {
    /// Fresh session key.
    pub session_key: [u8; 16],
    /// Challenge seed.
    pub seed: u32,
    /// Challenge answer: `(h1 << 32) | h0` over the identity hash.
    pub expected_value: u64,
}

/// Mint session key and challenge values for a new identity.
///
/// The session key is drawn from a 4 KiB hash-chain expansion of fresh
/// entropy rather than raw RNG output, matching what the client derives on
/// its side.
pub fn derive_client_values(id_hash: &[u8; 32], rng: &mut dyn RngCore) -> ClientValues {
    let mut entropy = [0u8; 32];
    rng.fill_bytes(&mut entropy);

    let mut pool = vec![0u8; 0x1000];
    random_buffer_from_seed(&entropy, rng.next_u32(), &mut pool, 1);

    let mut session_key = [0u8; 16];
    session_key.copy_from_slice(&pool[..16]);

    let seed = rng.next_u32();
    let h0 = hash32(id_hash, seed);
    let h1 = hash32(id_hash, h0);

    ClientValues { session_key, seed, expected_value: (u64::from(h1) << 32) | u64::from(h0) }
}

/// Generation failures.
#[derive(Debug, Error)]
pub enum CodegenError {
    /// Template missing a placeholder or carrying it the wrong number of
    /// times.
    #[error("template placeholder {placeholder} occurs {found} times, need {need}")]
    BadTemplate {
        /// The offending placeholder.
        placeholder: &'static str,
        /// Occurrences found.
        found: usize,
        /// Occurrence requirement, as text.
        need: &'static str,
    },

    /// Filesystem failure around template, source, or artifact.
    #[error("codegen I/O error: {0}")]
    Io(String),

    /// Compiler exited unsuccessfully.
    #[error("compiler failed with status {code:?}")]
    CompilerFailed {
        /// Process exit code, when the platform reports one.
        code: Option<i32>,
    },

    /// Compiler ran past its deadline and was killed.
    #[error("compiler exceeded the {limit_ms}ms deadline")]
    Timeout {
        /// The configured deadline.
        limit_ms: u64,
    },
}

impl From<std::io::Error> for CodegenError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Produces the client artifact for a bootstrap.
pub trait ArtifactGenerator {
    /// Build the artifact bytes for one identity.
    ///
    /// # Errors
    ///
    /// [`CodegenError`] on any failure; the bootstrap is then rejected and
    /// the registry left unmodified.
    fn generate(&self, req: &ArtifactRequest) -> Result<Vec<u8>, CodegenError>;
}

/// Alphabet for filename encoding: 6 bits per character, filesystem-safe.
const ASCII6: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz.~";

/// Encode bytes as a filename, 6 bits per character.
#[must_use]
pub fn ascii6_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 8 / 6 + 1);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for &byte in bytes {
        acc = (acc << 8) | u32::from(byte);
        bits += 8;
        while bits >= 6 {
            bits -= 6;
            out.push(ASCII6[(acc >> bits) as usize & 0x3f] as char);
        }
    }
    if bits > 0 {
        out.push(ASCII6[(acc << (6 - bits)) as usize & 0x3f] as char);
    }
    out
}

/// Template-and-compiler artifact generator.
///
/// Renders the source template into the work directory under a name
/// derived from the identity hash, invokes the external compiler with a
/// hard deadline, reads the artifact back, and removes every intermediate
/// matching `<name>.*`.
#[derive(Debug)]
pub struct CompilerGenerator {
    template_path: PathBuf,
    compiler_path: PathBuf,
    work_dir: PathBuf,
    timeout: Duration,
}

impl CompilerGenerator {
    /// Generator wired from the service config.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            template_path: config.template_path.clone(),
            compiler_path: config.compiler_path.clone(),
            work_dir: config.work_dir.clone(),
            timeout: config.compile_timeout,
        }
    }

    fn render(&self, req: &ArtifactRequest) -> Result<String, CodegenError> {
        let template = fs::read_to_string(&self.template_path)?;

        let occurrences = |placeholder: &str| template.matches(placeholder).count();
        for (placeholder, found) in
            [("#SEED#", occurrences("#SEED#")), ("#KEY#", occurrences("#KEY#"))]
        {
            if found != 1 {
                return Err(CodegenError::BadTemplate { placeholder, found, need: "exactly 1" });
            }
        }
        if occurrences("#EV#") == 0 {
            return Err(CodegenError::BadTemplate {
                placeholder: "#EV#",
                found: 0,
                need: "at least 1",
            });
        }

        Ok(template
            .replace("#SEED#", &req.seed.to_string())
            .replace("#EV#", &req.expected_value.to_string())
            .replace("#KEY#", &hex::encode_upper(req.session_key)))
    }

    fn run_compiler(&self, source: &Path, artifact: &Path) -> Result<(), CodegenError> {
        let mut child = Command::new(&self.compiler_path)
            .arg(source)
            .arg("-o")
            .arg(artifact)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let deadline = Instant::now() + self.timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                if !status.success() {
                    return Err(CodegenError::CompilerFailed { code: status.code() });
                }
                return Ok(());
            }

            if Instant::now() >= deadline {
                // Kill failure means the process already exited; the final
                // wait reaps it either way.
                let _ = child.kill();
                let _ = child.wait();
                return Err(CodegenError::Timeout { limit_ms: self.timeout.as_millis() as u64 });
            }
            thread::sleep(Duration::from_millis(20));
        }
    }

    fn cleanup(&self, name: &str) {
        let pattern = format!("{name}.*");
        let Ok(entries) = fs::read_dir(&self.work_dir) else { return };

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else { continue };
            if glob_match(pattern.as_bytes(), file_name.as_bytes())
                && fs::remove_file(entry.path()).is_err()
            {
                tracing::warn!(file = file_name, "failed to remove intermediate");
            }
        }
    }
}

impl ArtifactGenerator for CompilerGenerator {
    fn generate(&self, req: &ArtifactRequest) -> Result<Vec<u8>, CodegenError> {
        let rendered = self.render(req)?;

        let name = ascii6_encode(&req.id_hash);
        let source = self.work_dir.join(format!("{name}.src"));
        let artifact = self.work_dir.join(format!("{name}.bin"));

        fs::write(&source, rendered)?;

        let result = self
            .run_compiler(&source, &artifact)
            .and_then(|()| fs::read(&artifact).map_err(CodegenError::from));

        self.cleanup(&name);

        match &result {
            Ok(bytes) => tracing::debug!(size = bytes.len(), "artifact compiled"),
            Err(err) => tracing::error!(%err, "artifact generation failed"),
        }
        result
    }
}
