use std::sync::{LazyLock, Mutex};

/// Serializes every test that touches process environment variables.
pub(crate) static ENV_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// Sets or clears one variable and restores the prior value on drop.
pub(crate) struct EnvVarGuard {
    key: &'static str,
    previous: Option<String>,
}

impl EnvVarGuard {
    pub(crate) fn set(key: &'static str, value: &str) -> Self {
        Self::replace(key, Some(value))
    }

    pub(crate) fn unset(key: &'static str) -> Self {
        Self::replace(key, None)
    }

    fn replace(key: &'static str, value: Option<&str>) -> Self {
        let previous = std::env::var(key).ok();
        write_var(key, value);
        Self { key, previous }
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        write_var(self.key, self.previous.as_deref());
    }
}

fn write_var(key: &str, value: Option<&str>) {
    // SAFETY: only called from tests holding ENV_LOCK, so no other thread
    // reads or writes the environment concurrently.
    unsafe {
        match value {
            Some(value) => std::env::set_var(key, value),
            None => std::env::remove_var(key),
        }
    }
}
