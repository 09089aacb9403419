use tokio::sync::Mutex as AsyncMutex;

/// Serializes tests that touch process environment variables.
/// Sync tests take it with `.blocking_lock()`, async ones with `.lock().await`.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Sets variables for the lifetime of the guard, then restores prior values.
/// Hold [`ENV_LOCK`] while one is alive.
pub struct ScopedEnv {
    saved: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    pub fn set(vars: &[(&str, &str)]) -> Self {
        let saved = vars
            .iter()
            .map(|(name, value)| {
                let previous = std::env::var(name).ok();
                std::env::set_var(name, value);
                (name.to_string(), previous)
            })
            .collect();
        Self { saved }
    }

    pub fn unset(names: &[&str]) -> Self {
        let saved = names
            .iter()
            .map(|name| {
                let previous = std::env::var(name).ok();
                std::env::remove_var(name);
                (name.to_string(), previous)
            })
            .collect();
        Self { saved }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => std::env::set_var(&name, value),
                None => std::env::remove_var(&name),
            }
        }
    }
}
