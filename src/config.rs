use std::{net::SocketAddr, str::FromStr};

use log::{error, info};

use crate::auth::UserType;
use crate::crypto;

// get and parse an environment variable
// use default value if not set
fn var<T>(name: &str, default: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Debug,
{
    let given = std::env::var(name).unwrap_or(default.to_owned());
    match given.parse() {
        Ok(parsed) => parsed,
        Err(e) => {
            error!(
                "Invalid config option `{}={}`: {:?} ({}'s default is usually {})",
                name, given, e, name, default
            );
            std::process::exit(1);
        }
    }
}

/// Process-wide configuration, built once at startup and passed around
/// explicitly as `web::Data<Config>`. Nothing reads it from globals.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub secret_key: [u8; 32],
    pub debug: bool,
    /// Disables CSRF enforcement and token minting.
    pub testing: bool,
    /// Display labels for the `UserType` enumeration, in code order.
    pub user_types: Vec<String>,
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_path: var("DATABASE_PATH", "ideawheel.db"),
            secret_key: load_secret_key(),
            debug: var("DEBUG", "false"),
            testing: var("TESTING", "false"),
            user_types: default_user_types(),
            bind_addr: var("BIND_ADDR", "127.0.0.1:8080"),
        }
    }

    /// Fixed secret and no environment reads, for the test suite.
    pub fn for_tests(testing: bool) -> Self {
        Self {
            database_path: ":memory:".into(),
            secret_key: [7; 32],
            debug: false,
            testing,
            user_types: default_user_types(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        }
    }

    pub fn user_type_label(&self, user_type: UserType) -> &str {
        self.user_types
            .get(user_type.code() as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}

fn default_user_types() -> Vec<String> {
    vec!["user".into(), "staff".into(), "admin".into()]
}

fn load_secret_key() -> [u8; 32] {
    let provided: String = var("SECRET_KEY", "");

    if provided.is_empty() {
        info!("Generating new session signing key... (provide one with SECRET_KEY)");
        let generated = crypto::generate_secret_key();
        info!("Session signing key: {}", hex::encode(generated));
        generated
    } else {
        let key = match hex::decode(&provided) {
            Ok(key) => key,
            Err(_) => {
                error!("SECRET_KEY must be hex encoded");
                std::process::exit(1);
            }
        };
        match key.try_into() {
            Ok(key) => key,
            Err(_) => {
                error!("Invalid session signing key length, must be 32 bytes");
                std::process::exit(1);
            }
        }
    }
}
