//! # Parameter loading
//!
//! Parameters for the bridge live in TOML files under the `params`
//! directory of the software root, which the `SIM_BRIDGE_SW_ROOT`
//! environment variable points at. Each executable deserialises its own
//! parameter struct from its own file.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the environment variable pointing at the software root directory.
///
/// The root holds the `params` and `sessions` directories used by the
/// executables.
pub const SW_ROOT_ENV_VAR: &str = "SIM_BRIDGE_SW_ROOT";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("The software root environment variable ({}) is not set", SW_ROOT_ENV_VAR)]
    SwRootNotSet,

    #[error("Cannot read the parameter file {0:?}: {1}")]
    FileReadError(PathBuf, std::io::Error),

    #[error("The parameter file {0:?} is not valid TOML: {1}")]
    ParseError(PathBuf, toml::de::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Retrieve the software root directory from the environment.
pub fn sw_root() -> Result<PathBuf, LoadError> {
    std::env::var(SW_ROOT_ENV_VAR)
        .map(PathBuf::from)
        .map_err(|_| LoadError::SwRootNotSet)
}

/// Load a parameter file.
///
/// The file path is relative to the software root's "params" directory.
/// Errors carry the resolved path, since the indirection through the
/// environment variable makes "file not found" hard to act on otherwise.
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError>
where
    P: DeserializeOwned,
{
    let path = sw_root()?.join("params").join(param_file_path);

    let params_str = std::fs::read_to_string(&path)
        .map_err(|e| LoadError::FileReadError(path.clone(), e))?;

    toml::from_str(&params_str).map_err(|e| LoadError::ParseError(path, e))
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;
    use std::fs;

    #[derive(Deserialize)]
    struct TestParams {
        endpoint: String,
        timeout_ms: i32,
    }

    #[test]
    fn test_load_from_sw_root() {
        let root = std::env::temp_dir().join(format!("bridge_params_test_{}", std::process::id()));
        fs::create_dir_all(root.join("params")).expect("params dir should be creatable");
        fs::write(
            root.join("params").join("test.toml"),
            "endpoint = \"tcp://localhost:23000\"\ntimeout_ms = 100\n",
        )
        .expect("param file should be writable");

        std::env::set_var(SW_ROOT_ENV_VAR, &root);

        let params: TestParams = load("test.toml").expect("params should load");
        assert_eq!(params.endpoint, "tcp://localhost:23000");
        assert_eq!(params.timeout_ms, 100);

        assert!(matches!(
            load::<TestParams>("missing.toml"),
            Err(LoadError::FileReadError(_, _))
        ));
    }
}
