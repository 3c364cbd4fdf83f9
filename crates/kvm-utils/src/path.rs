use std::{env, path::PathBuf};

use crate::error::{PathError, PathResult};

pub trait PathResolver {
    /// Resolves a path string that may contain environment variables
    ///
    /// This method expands environment variables in the format `$VAR` or `${VAR}`, resolves tilde
    /// (`~`) to the user's home directory when it appears at the start of the path, and converts
    /// relative paths to absolute paths based on the current working directory.
    ///
    /// # Errors
    ///
    /// * [`PathError::Empty`] if the path is empty
    /// * [`PathError::CurrentDir`] if the current directory cannot be determined
    /// * [`PathError::MissingEnvVar`] if the environment variables are undefined
    ///
    /// # Example
    ///
    /// ```
    /// use kvm_utils::error::PathResult;
    /// use kvm_utils::path::{PathResolver, SystemPathResolver};
    ///
    /// fn main() -> PathResult<()> {
    ///     let resolver = SystemPathResolver;
    ///     let resolved = resolver.resolve_path("$HOME/.cache/kvm")?;
    ///     println!("Resolved path is {:#?}", resolved);
    ///     Ok(())
    /// }
    /// ```
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf>;

    /// Returns the user's home directory from `HOME`, falling back to `/home/$USER`.
    fn home_dir(&self) -> PathBuf;

    /// Returns `XDG_CONFIG_HOME`, defaulting to `$HOME/.config`.
    fn xdg_config_home(&self) -> PathBuf;

    /// Returns `XDG_CACHE_HOME`, defaulting to `$HOME/.cache`.
    fn xdg_cache_home(&self) -> PathBuf;
}

pub struct SystemPathResolver;

impl PathResolver for SystemPathResolver {
    fn resolve_path(&self, path: &str) -> PathResult<PathBuf> {
        let path = path.trim();

        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let resolved = self.expand_variables(path)?;
        let path_buf = PathBuf::from(resolved);

        if path_buf.is_absolute() {
            Ok(path_buf)
        } else {
            env::current_dir()
                .map(|cwd| cwd.join(path_buf))
                .map_err(|err| PathError::CurrentDir { source: err })
        }
    }

    fn home_dir(&self) -> PathBuf {
        env::var("HOME").map(PathBuf::from).unwrap_or_else(|_| {
            let user = env::var("USER").unwrap_or_else(|_| "root".to_string());
            PathBuf::from(format!("/home/{user}"))
        })
    }

    fn xdg_config_home(&self) -> PathBuf {
        env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".config"))
    }

    fn xdg_cache_home(&self) -> PathBuf {
        env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| self.home_dir().join(".cache"))
    }
}

impl SystemPathResolver {
    fn expand_variables(&self, path: &str) -> PathResult<String> {
        let mut result = String::with_capacity(path.len());
        let mut chars = path.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '$' => {
                    if chars.peek() == Some(&'{') {
                        chars.next();
                        let var_name = self.consume_until(&mut chars, '}')?;
                        self.expand_env_var(&var_name, &mut result, path)?;
                    } else {
                        let var_name = self.consume_var_name(&mut chars);
                        if var_name.is_empty() {
                            result.push('$');
                        } else {
                            self.expand_env_var(&var_name, &mut result, path)?;
                        }
                    }
                }
                '~' if result.is_empty() => result.push_str(&self.home_dir().to_string_lossy()),
                _ => result.push(c),
            }
        }

        Ok(result)
    }

    fn consume_until(
        &self,
        chars: &mut std::iter::Peekable<std::str::Chars>,
        delimiter: char,
    ) -> PathResult<String> {
        let mut var_name = String::new();

        for c in chars.by_ref() {
            if c == delimiter {
                return Ok(var_name);
            }
            var_name.push(c);
        }

        Err(PathError::UnclosedVariable {
            input: format!("${{{var_name}"),
        })
    }

    fn consume_var_name(&self, chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
        let mut var_name = String::new();

        while let Some(&c) = chars.peek() {
            if c.is_alphanumeric() || c == '_' {
                var_name.push(c);
                chars.next();
            } else {
                break;
            }
        }

        var_name
    }

    fn expand_env_var(
        &self,
        var_name: &str,
        result: &mut String,
        original: &str,
    ) -> PathResult<()> {
        match var_name {
            "HOME" => result.push_str(&self.home_dir().to_string_lossy()),
            "XDG_CONFIG_HOME" => result.push_str(&self.xdg_config_home().to_string_lossy()),
            "XDG_CACHE_HOME" => result.push_str(&self.xdg_cache_home().to_string_lossy()),
            _ => {
                let value = env::var(var_name).map_err(|_| {
                    PathError::MissingEnvVar {
                        input: original.into(),
                        var: var_name.into(),
                    }
                })?;
                result.push_str(&value);
            }
        }
        Ok(())
    }
}

pub fn resolve_path(path: &str) -> PathResult<PathBuf> {
    SystemPathResolver.resolve_path(path)
}

pub fn home_dir() -> PathBuf {
    SystemPathResolver.home_dir()
}

pub fn xdg_config_home() -> PathBuf {
    SystemPathResolver.xdg_config_home()
}

pub fn xdg_cache_home() -> PathBuf {
    SystemPathResolver.xdg_cache_home()
}
