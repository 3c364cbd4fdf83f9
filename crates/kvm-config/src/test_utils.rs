use std::{env, ffi::OsString};

/// Runs `f` with the given variables set, or removed when the value is `None`.
///
/// Previous values are restored afterwards, also when `f` panics.
pub fn with_env<F>(vars: &[(&str, Option<&str>)], f: F)
where
    F: FnOnce(),
{
    let _restore = EnvRestore(
        vars.iter()
            .map(|(key, _)| (key.to_string(), env::var_os(key)))
            .collect(),
    );

    for (key, value) in vars {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }

    f();
}

struct EnvRestore(Vec<(String, Option<OsString>)>);

impl Drop for EnvRestore {
    fn drop(&mut self) {
        for (key, value) in self.0.drain(..) {
            match value {
                Some(value) => env::set_var(&key, value),
                None => env::remove_var(&key),
            }
        }
    }
}
