//! # CLI - Moorings Interactive Shell
//!
//! A REPL-style command-line interface for the Moorings settings store.
//! Reads commands from stdin, executes them against the store, and prints
//! results to stdout. Designed for both interactive use and scripted testing
//! (pipe commands via stdin).
//!
//! ## Commands
//!
//! ```text
//! REGI key perms n       Register an integer setting with default n
//! REGR key perms x       Register a real setting with default x
//! REGS key perms text    Register a string setting with default text
//! SETI key n             Overwrite an integer setting
//! SETR key x             Overwrite a real setting
//! SETS key text          Overwrite a string setting
//! GETI / GETR / GETS key Read the live value
//! DEFI / DEFR / DEFS key Read the registered default
//! LIST [prefix [perms [mode]]]     List matching keys
//! RESTORE [prefix [perms [mode]]]  Restore matching defaults
//! PERMS key              Show a setting's permission columns
//! SAVE                   Write the snapshot
//! LOAD                   Reload the snapshot
//! PERSIST                Show whether persistence is enabled
//! DISABLE                Disable persistence
//! STATS                  Print store debug info
//! EXIT / QUIT            Shut down
//! ```
//!
//! `perms` is a `,`- or `|`-separated list of `system`, `admin`, `user`,
//! `volatile`, `all`, or `none`. `mode` is one of `matchall`, `matchany`,
//! `excludeall`, `excludeany` (default `matchany`).
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! MOORINGS_PATH        Settings file path      (default: "settings.conf")
//! MOORINGS_NO_PERSIST  Run without a file      (default: "false")
//! ```
//!
//! ## Example
//!
//! ```text
//! $ cargo run -p cli
//! Moorings started on defaults; settings.conf was not loaded (...); SAVE recreates it
//! > REGI net/port admin 8080
//! OK
//! > GETI net/port
//! 8080
//! > SAVE
//! OK
//! > EXIT
//! bye
//! ```

use anyhow::Result;
use osal::StdOs;
use std::io::{self, BufRead, Write};
use store::{
    permissions_to_string, DiskFile, FilterMode, Permissions, SettingError, SettingsStorage,
    ALL_PERMISSIONS, ALL_PERMISSIONS_VOLATILE, NO_PERMISSIONS, PERMISSION_STRING_SIZE,
};

type Shell = SettingsStorage<StdOs, DiskFile>;

/// Reads a configuration value from the environment, falling back to `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_permissions(text: &str) -> Option<Permissions> {
    if text.eq_ignore_ascii_case("none") {
        return Some(NO_PERMISSIONS);
    }
    let mut mask = NO_PERMISSIONS;
    for token in text.split([',', '|']) {
        match token.trim().to_ascii_lowercase().as_str() {
            "system" => mask |= Permissions::SYSTEM,
            "admin" => mask |= Permissions::ADMIN,
            "user" => mask |= Permissions::USER,
            "volatile" => mask |= Permissions::VOLATILE,
            "all" => mask |= ALL_PERMISSIONS,
            _ => return None,
        }
    }
    Some(mask)
}

fn parse_mode(text: &str) -> Option<FilterMode> {
    match text.to_ascii_lowercase().as_str() {
        "matchall" => Some(FilterMode::MatchAll),
        "matchany" => Some(FilterMode::MatchAny),
        "excludeall" => Some(FilterMode::ExcludeAll),
        "excludeany" => Some(FilterMode::ExcludeAny),
        _ => None,
    }
}

/// Reads a string setting, growing the buffer until the value fits.
fn get_string(
    shell: &Shell,
    key: &str,
    default: bool,
) -> Result<(String, Permissions), SettingError> {
    let mut buf = vec![0u8; 64];
    loop {
        let read = if default {
            shell.get_default_setting_as_string(key, &mut buf)
        } else {
            shell.get_setting_as_string(key, &mut buf)
        };
        match read {
            Ok((len, perms)) => {
                return Ok((String::from_utf8_lossy(&buf[..len]).into_owned(), perms));
            }
            Err(SettingError::InsufficientBufferSize) => {
                let doubled = buf.len() * 2;
                buf.resize(doubled, 0);
            }
            Err(err) => return Err(err),
        }
    }
}

/// Finds a key's permissions by probing the typed getters in turn.
fn lookup_permissions(shell: &Shell, key: &str) -> Result<Permissions, SettingError> {
    match shell.get_setting_as_int(key) {
        Ok((_, perms)) => return Ok(perms),
        Err(SettingError::TypeMismatch) => {}
        Err(err) => return Err(err),
    }
    match shell.get_setting_as_real(key) {
        Ok((_, perms)) => return Ok(perms),
        Err(SettingError::TypeMismatch) => {}
        Err(err) => return Err(err),
    }
    get_string(shell, key, false).map(|(_, perms)| perms)
}

/// Parses the optional `[prefix [perms [mode]]]` tail of LIST and RESTORE.
fn parse_selection(parts: &[&str]) -> Option<(String, Permissions, FilterMode)> {
    if parts.len() > 3 {
        return None;
    }
    let prefix = parts.first().copied().unwrap_or("").to_string();
    let perms = match parts.get(1) {
        Some(text) => parse_permissions(text)?,
        None => ALL_PERMISSIONS_VOLATILE,
    };
    let mode = match parts.get(2) {
        Some(text) => parse_mode(text)?,
        None => FilterMode::MatchAny,
    };
    Some((prefix, perms, mode))
}

fn prompt() {
    print!("> ");
    io::stdout().flush().ok();
}

fn main() -> Result<()> {
    env_logger::init();

    let path = env_or("MOORINGS_PATH", "settings.conf");
    let no_persist: bool = env_or("MOORINGS_NO_PERSIST", "false").parse().unwrap_or(false);

    let file = if no_persist {
        None
    } else {
        Some(DiskFile::new(path.clone()))
    };
    let (mut shell, built) = SettingsStorage::new(&StdOs, &[], file);
    match built {
        Ok(()) => println!(
            "Moorings started (file={}, persist={})",
            if no_persist { "<none>" } else { &path },
            shell.is_persistent_storage_enabled()
        ),
        Err(err) => println!(
            "Moorings started on defaults; {path} was not loaded ({err}); SAVE recreates it"
        ),
    }
    println!("Commands: REGI/REGR/REGS key perms default | SETI/SETR/SETS key value");
    println!("          GETI/GETR/GETS key | DEFI/DEFR/DEFS key | LIST | RESTORE");
    println!("          PERMS key | SAVE | LOAD | PERSIST | DISABLE | STATS | EXIT");
    prompt();

    let stdin = io::stdin();

    for line in stdin.lock().lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let cmd = match parts.next() {
            Some(cmd) => cmd.to_uppercase(),
            None => {
                prompt();
                continue;
            }
        };
        let rest: Vec<&str> = parts.collect();
        match cmd.as_str() {
            "REGI" | "REGR" | "REGS" => match rest.as_slice() {
                [key, perms, default @ ..] if !default.is_empty() => {
                    let Some(perms) = parse_permissions(perms) else {
                        println!("ERR unknown permission set");
                        prompt();
                        continue;
                    };
                    let joined = default.join(" ");
                    let result = match cmd.as_str() {
                        "REGI" => match joined.parse::<i64>() {
                            Ok(v) => shell.register_setting_as_int(key, perms, v),
                            Err(_) => {
                                println!("ERR not an integer: {joined}");
                                prompt();
                                continue;
                            }
                        },
                        "REGR" => match joined.parse::<f64>() {
                            Ok(v) => shell.register_setting_as_real(key, perms, v),
                            Err(_) => {
                                println!("ERR not a real: {joined}");
                                prompt();
                                continue;
                            }
                        },
                        _ => shell.register_setting_as_string(key, perms, &joined),
                    };
                    match result {
                        Ok(()) => println!("OK"),
                        Err(err) => println!("ERR register failed: {err}"),
                    }
                }
                _ => println!("ERR usage: {cmd} key perms default"),
            },
            "SETI" => match rest.as_slice() {
                [key, value] => match value.parse::<i64>() {
                    Ok(v) => match shell.put_setting_value_as_int(key, v) {
                        Ok(()) => println!("OK"),
                        Err(err) => println!("ERR put failed: {err}"),
                    },
                    Err(_) => println!("ERR not an integer: {value}"),
                },
                _ => println!("ERR usage: SETI key n"),
            },
            "SETR" => match rest.as_slice() {
                [key, value] => match value.parse::<f64>() {
                    Ok(v) => match shell.put_setting_value_as_real(key, v) {
                        Ok(()) => println!("OK"),
                        Err(err) => println!("ERR put failed: {err}"),
                    },
                    Err(_) => println!("ERR not a real: {value}"),
                },
                _ => println!("ERR usage: SETR key x"),
            },
            "SETS" => match rest.as_slice() {
                [key, value @ ..] if !value.is_empty() => {
                    match shell.put_setting_value_as_string(key, &value.join(" ")) {
                        Ok(()) => println!("OK"),
                        Err(err) => println!("ERR put failed: {err}"),
                    }
                }
                _ => println!("ERR usage: SETS key text"),
            },
            "GETI" | "DEFI" => match rest.as_slice() {
                [key] => {
                    let read = if cmd == "GETI" {
                        shell.get_setting_as_int(key)
                    } else {
                        shell.get_default_setting_as_int(key)
                    };
                    match read {
                        Ok((value, _)) => println!("{value}"),
                        Err(err) => println!("ERR read failed: {err}"),
                    }
                }
                _ => println!("ERR usage: {cmd} key"),
            },
            "GETR" | "DEFR" => match rest.as_slice() {
                [key] => {
                    let read = if cmd == "GETR" {
                        shell.get_setting_as_real(key)
                    } else {
                        shell.get_default_setting_as_real(key)
                    };
                    match read {
                        Ok((value, _)) => println!("{value}"),
                        Err(err) => println!("ERR read failed: {err}"),
                    }
                }
                _ => println!("ERR usage: {cmd} key"),
            },
            "GETS" | "DEFS" => match rest.as_slice() {
                [key] => match get_string(&shell, key, cmd == "DEFS") {
                    Ok((value, _)) => println!("{value}"),
                    Err(err) => println!("ERR read failed: {err}"),
                },
                _ => println!("ERR usage: {cmd} key"),
            },
            "LIST" => match parse_selection(&rest) {
                None => println!("ERR usage: LIST [prefix [perms [mode]]]"),
                Some((prefix, perms, mode)) => {
                    match shell.list_settings_keys(&prefix, perms, mode) {
                        Ok(keys) if keys.is_empty() => println!("(empty)"),
                        Ok(keys) => {
                            for key in &keys {
                                println!("{key}");
                            }
                            println!("({} keys)", keys.len());
                        }
                        Err(err) => println!("ERR list failed: {err}"),
                    }
                }
            },
            "RESTORE" => match parse_selection(&rest) {
                None => println!("ERR usage: RESTORE [prefix [perms [mode]]]"),
                Some((prefix, perms, mode)) => {
                    match shell.restore_default_settings(&prefix, perms, mode) {
                        Ok(()) => println!("OK"),
                        Err(err) => println!("ERR restore failed: {err}"),
                    }
                }
            },
            "PERMS" => match rest.as_slice() {
                [key] => match lookup_permissions(&shell, key) {
                    Ok(perms) => {
                        let mut buf = [0u8; PERMISSION_STRING_SIZE];
                        match permissions_to_string(perms, &mut buf) {
                            Some(rendered) => println!("[{rendered}]"),
                            None => println!("ERR render failed"),
                        }
                    }
                    Err(err) => println!("ERR read failed: {err}"),
                },
                _ => println!("ERR usage: PERMS key"),
            },
            "SAVE" => match shell.store_settings_in_persistent_storage() {
                Ok(()) => println!("OK"),
                Err(err) => println!("ERR save failed: {err}"),
            },
            "LOAD" => match shell.load_settings_from_persistent_storage() {
                Ok(()) => println!("OK"),
                Err(err) => println!("ERR load failed: {err}"),
            },
            "PERSIST" => println!("{}", shell.is_persistent_storage_enabled()),
            "DISABLE" => {
                if shell.disable_persistent_storage() {
                    println!("OK");
                } else {
                    println!("ERR disable timed out");
                }
            }
            "STATS" => println!("{shell:?}"),
            "EXIT" | "QUIT" => {
                println!("bye");
                break;
            }
            other => println!("unknown command: {other}"),
        }

        prompt();
    }

    Ok(())
}
