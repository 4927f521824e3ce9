use std::path::PathBuf;

/// Ambient environment the session machine is allowed to see. Everything
/// else (terminal handles, env vars) stays outside the core.
pub trait Host {
    fn columns(&self) -> u16;
    fn working_dir(&self) -> PathBuf;
}

/// Live process environment.
pub struct SystemHost;

impl Host for SystemHost {
    fn columns(&self) -> u16 {
        crossterm::terminal::size().map(|(cols, _)| cols).unwrap_or(80)
    }

    fn working_dir(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }
}

/// Deterministic host for tests.
#[derive(Debug, Clone)]
pub struct FixedHost {
    pub columns: u16,
    pub working_dir: PathBuf,
}

impl Default for FixedHost {
    fn default() -> Self {
        Self {
            columns: 80,
            working_dir: PathBuf::from("/tmp"),
        }
    }
}

impl Host for FixedHost {
    fn columns(&self) -> u16 {
        self.columns
    }

    fn working_dir(&self) -> PathBuf {
        self.working_dir.clone()
    }
}
