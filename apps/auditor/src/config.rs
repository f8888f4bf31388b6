use std::env;

use bastion_audit_core::{AppError, AppResult};
use chrono::{DateTime, Utc};

/// What the binary does after loading configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    /// Apply migrations and exit.
    Migrate,
    /// Log recent audit runs and exit.
    History,
    /// Run audits once or periodically.
    Run,
}

impl Command {
    pub(crate) fn parse(mut args: impl Iterator<Item = String>) -> AppResult<Self> {
        let command = match args.next().as_deref() {
            None | Some("run") => Self::Run,
            Some("migrate") => Self::Migrate,
            Some("history") => Self::History,
            Some(other) => {
                return Err(AppError::Validation(format!(
                    "unknown command '{other}', expected one of: run, migrate, history"
                )));
            }
        };

        if let Some(extra) = args.next() {
            return Err(AppError::Validation(format!(
                "unexpected argument '{extra}'"
            )));
        }

        Ok(command)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuditorConfig {
    pub(crate) database_url: String,
    pub(crate) redis_url: Option<String>,
    pub(crate) holder_id: String,
    pub(crate) lease_seconds: u32,
    pub(crate) run_timeout_seconds: u64,
    pub(crate) interval_seconds: Option<u64>,
    pub(crate) run_time: Option<DateTime<Utc>>,
}

impl AuditorConfig {
    pub(crate) fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let database_url = optional("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let redis_url = optional("REDIS_URL");
        let holder_id = optional("AUDIT_HOLDER_ID")
            .unwrap_or_else(|| format!("auditor-{}", std::process::id()));
        let lease_seconds =
            parse_value::<u32>("AUDIT_LEASE_SECONDS", optional("AUDIT_LEASE_SECONDS"))?
                .unwrap_or(300);
        let run_timeout_seconds = parse_value::<u64>(
            "AUDIT_RUN_TIMEOUT_SECONDS",
            optional("AUDIT_RUN_TIMEOUT_SECONDS"),
        )?
        .unwrap_or(120);
        let interval_seconds =
            parse_value::<u64>("AUDIT_INTERVAL_SECONDS", optional("AUDIT_INTERVAL_SECONDS"))?;
        let run_time = optional("AUDIT_RUN_TIME")
            .map(|value| {
                DateTime::parse_from_rfc3339(value.as_str())
                    .map(|parsed| parsed.with_timezone(&Utc))
                    .map_err(|error| {
                        AppError::Validation(format!(
                            "invalid AUDIT_RUN_TIME value '{value}': {error}"
                        ))
                    })
            })
            .transpose()?;

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "AUDIT_LEASE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if run_timeout_seconds == 0 {
            return Err(AppError::Validation(
                "AUDIT_RUN_TIMEOUT_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if u64::from(lease_seconds) < run_timeout_seconds {
            return Err(AppError::Validation(format!(
                "AUDIT_LEASE_SECONDS ({lease_seconds}) must not be shorter than \
                 AUDIT_RUN_TIMEOUT_SECONDS ({run_timeout_seconds})"
            )));
        }

        if interval_seconds == Some(0) {
            return Err(AppError::Validation(
                "AUDIT_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            redis_url,
            holder_id,
            lease_seconds,
            run_timeout_seconds,
            interval_seconds,
            run_time,
        })
    }
}

fn parse_value<T>(name: &str, value: Option<String>) -> AppResult<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|value| {
            value.parse::<T>().map_err(|error| {
                AppError::Validation(format!("invalid {name} value '{value}': {error}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{AuditorConfig, Command};

    fn load(pairs: &[(&str, &str)]) -> Result<AuditorConfig, bastion_audit_core::AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();

        AuditorConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_database_is_set() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/audit")]);
        assert!(config.is_ok());
        let config = config.unwrap_or_else(|_| unreachable!());

        assert_eq!(config.lease_seconds, 300);
        assert_eq!(config.run_timeout_seconds, 120);
        assert_eq!(config.interval_seconds, None);
        assert_eq!(config.redis_url, None);
        assert!(config.holder_id.starts_with("auditor-"));
    }

    #[test]
    fn database_url_is_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("DATABASE_URL", "  ")]).is_err());
    }

    #[test]
    fn zero_and_garbage_values_are_rejected() {
        let base = ("DATABASE_URL", "postgres://localhost/audit");

        assert!(load(&[base, ("AUDIT_LEASE_SECONDS", "0")]).is_err());
        assert!(load(&[base, ("AUDIT_RUN_TIMEOUT_SECONDS", "soon")]).is_err());
        assert!(load(&[base, ("AUDIT_INTERVAL_SECONDS", "0")]).is_err());
        assert!(load(&[base, ("AUDIT_RUN_TIME", "yesterday")]).is_err());
    }

    #[test]
    fn lease_must_cover_run_timeout() {
        let base = ("DATABASE_URL", "postgres://localhost/audit");

        let short = load(&[
            base,
            ("AUDIT_LEASE_SECONDS", "10"),
            ("AUDIT_RUN_TIMEOUT_SECONDS", "120"),
        ]);
        assert!(matches!(
            short,
            Err(bastion_audit_core::AppError::Validation(message))
                if message.contains("AUDIT_LEASE_SECONDS")
        ));

        assert!(load(&[base, ("AUDIT_RUN_TIMEOUT_SECONDS", "600")]).is_err());
        assert!(
            load(&[
                base,
                ("AUDIT_LEASE_SECONDS", "120"),
                ("AUDIT_RUN_TIMEOUT_SECONDS", "120"),
            ])
            .is_ok()
        );
    }

    #[test]
    fn run_time_override_is_parsed_as_utc() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/audit"),
            ("AUDIT_RUN_TIME", "2024-06-01T08:00:00+08:00"),
            ("AUDIT_INTERVAL_SECONDS", "3600"),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(
            config.run_time.map(|value| value.to_rfc3339()),
            Some("2024-06-01T00:00:00+00:00".to_owned())
        );
        assert_eq!(config.interval_seconds, Some(3600));
    }

    #[test]
    fn command_parsing() {
        let parse = |args: &[&str]| Command::parse(args.iter().map(|arg| (*arg).to_owned()));

        assert!(matches!(parse(&[]), Ok(Command::Run)));
        assert!(matches!(parse(&["migrate"]), Ok(Command::Migrate)));
        assert!(matches!(parse(&["history"]), Ok(Command::History)));
        assert!(parse(&["purge"]).is_err());
        assert!(parse(&["run", "now"]).is_err());
    }
}
