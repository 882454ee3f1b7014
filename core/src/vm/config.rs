use serde::Deserialize;

/// Options for [`Engine::compile_with`](crate::vm::Engine::compile_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Run the peephole optimizer before verification.
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Resource limits of one [`Runtime`](crate::vm::Runtime). Both stacks are
/// allocated up front and never grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Operand stack slots shared by all frames.
    pub stack_capacity: usize,
    /// Maximum number of active script calls.
    pub max_frames: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_capacity: 65_536,
            max_frames: 1_024,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let config: RuntimeConfig = toml::from_str(input)?;
        if config.stack_capacity == 0 || config.max_frames == 0 {
            anyhow::bail!("stack_capacity and max_frames must be positive");
        }
        Ok(config)
    }
}
