use core::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use skid::{ClockConfig, IdConfig, MAX_APP_ID, MAX_APP_INSTANCE_ID, MIN_KEY_LEN, MacKey};

/// Configuration for the `skid` binary.
///
/// Every identifier setting can come from a flag, an environment variable or a
/// `.env` file in the working directory. The MAC key is the only required
/// value.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "skid",
    version,
    about = "Issue, decode and verify source-known IDs"
)]
pub struct CliArgs {
    /// Application id embedded in every ID (0-63).
    ///
    /// Environment variable: `SKID_APP_ID`
    #[arg(long, env = "SKID_APP_ID", default_value_t = 0)]
    pub app_id: u8,

    /// Application instance id embedded in every ID (0-31). Must be unique
    /// among running instances of the same application.
    ///
    /// Environment variable: `SKID_APP_INSTANCE_ID`
    #[arg(long, env = "SKID_APP_INSTANCE_ID", default_value_t = 0)]
    pub app_instance_id: u8,

    /// Hex-encoded key for Entity ID hashes, at least 32 bytes.
    ///
    /// Environment variable: `SKID_MAC_KEY`
    #[arg(long, env = "SKID_MAC_KEY", hide_env_values = true)]
    pub mac_key: String,

    /// Epoch in seconds since 1970-01-01 UTC. Defaults to 2025-01-01.
    ///
    /// Environment variable: `SKID_EPOCH_SECS`
    #[arg(long, env = "SKID_EPOCH_SECS")]
    pub epoch_secs: Option<u64>,

    /// Timestamp cache refresh period in milliseconds.
    ///
    /// Environment variable: `SKID_CACHE_REFRESH_MS`
    #[arg(long, env = "SKID_CACHE_REFRESH_MS", default_value_t = 10)]
    pub cache_refresh_ms: u64,

    /// Seconds between clock drift checks.
    ///
    /// Environment variable: `SKID_DRIFT_CHECK_SECS`
    #[arg(long, env = "SKID_DRIFT_CHECK_SECS", default_value_t = 10)]
    pub drift_check_secs: u64,

    /// Drift below this many milliseconds is ignored.
    ///
    /// Environment variable: `SKID_DRIFT_GRACE_MS`
    #[arg(long, env = "SKID_DRIFT_GRACE_MS", default_value_t = 5)]
    pub drift_grace_ms: u64,

    /// Drift above this many seconds requests a shutdown.
    ///
    /// Environment variable: `SKID_DRIFT_CATASTROPHIC_SECS`
    #[arg(long, env = "SKID_DRIFT_CATASTROPHIC_SECS", default_value_t = 60)]
    pub drift_catastrophic_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Issue IDs and print one per line.
    Generate {
        /// Entity type the IDs are issued for. Each type has its own sequence.
        #[arg(short = 't', long, default_value_t = 0)]
        entity_type: u16,
        /// Number of IDs to issue.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
        /// Print Entity IDs instead of 64-bit IDs.
        #[arg(short, long, default_value_t = false)]
        entity: bool,
    },
    /// Decode a 64-bit ID.
    Parse {
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },
    /// Validate and decode an Entity ID. Exits non-zero when it is invalid.
    Verify { entity_id: String },
    /// Keep the clock running and exit non-zero on catastrophic drift.
    Watch {
        /// How often the shutdown flag is polled, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        poll_ms: u64,
    },
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub ids: IdConfig,
    pub command: Command,
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.app_id > MAX_APP_ID {
            bail!("SKID_APP_ID ({}) exceeds the maximum of {MAX_APP_ID}", args.app_id);
        }
        if args.app_instance_id > MAX_APP_INSTANCE_ID {
            bail!(
                "SKID_APP_INSTANCE_ID ({}) exceeds the maximum of {MAX_APP_INSTANCE_ID}",
                args.app_instance_id
            );
        }

        let material = hex::decode(args.mac_key.trim()).context("SKID_MAC_KEY is not valid hex")?;
        if material.len() < MIN_KEY_LEN {
            bail!(
                "SKID_MAC_KEY is {} bytes, at least {MIN_KEY_LEN} required",
                material.len()
            );
        }

        if args.cache_refresh_ms == 0 {
            bail!("SKID_CACHE_REFRESH_MS must be greater than 0");
        }
        if args.drift_check_secs == 0 {
            bail!("SKID_DRIFT_CHECK_SECS must be greater than 0");
        }
        let clock = ClockConfig {
            drift_check_period: Duration::from_secs(args.drift_check_secs),
            grace: Duration::from_millis(args.drift_grace_ms),
            catastrophic: Duration::from_secs(args.drift_catastrophic_secs),
        };
        if clock.catastrophic <= clock.grace {
            bail!("SKID_DRIFT_CATASTROPHIC_SECS must exceed SKID_DRIFT_GRACE_MS");
        }

        let mut ids = IdConfig::new(
            args.app_id,
            args.app_instance_id,
            vec![MacKey::new(material, true)],
        )
        .with_clock(clock)
        .with_cache_refresh(Duration::from_millis(args.cache_refresh_ms));
        if let Some(epoch_secs) = args.epoch_secs {
            ids = ids.with_epoch(Duration::from_secs(epoch_secs));
        }

        Ok(Self {
            ids,
            command: args.command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn parse(extra: &[&str]) -> anyhow::Result<RunConfig> {
        let mut argv = vec!["skid", "--mac-key", KEY];
        argv.extend_from_slice(extra);
        RunConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn builds_an_id_config() {
        let config = parse(&[
            "--app-id",
            "5",
            "--app-instance-id",
            "12",
            "--epoch-secs",
            "1700000000",
            "generate",
            "-t",
            "7",
            "-n",
            "3",
        ])
        .unwrap();
        assert_eq!(config.ids.application_id, 5);
        assert_eq!(config.ids.application_instance_id, 12);
        assert_eq!(config.ids.epoch, Duration::from_secs(1_700_000_000));
        assert_eq!(config.ids.keys[0].material.len(), 32);
        assert!(config.ids.keys[0].is_default);
        assert_eq!(
            config.command,
            Command::Generate {
                entity_type: 7,
                count: 3,
                entity: false
            }
        );
    }

    #[test]
    fn accepts_negative_ids() {
        let config = parse(&["parse", "-9223372036854775807"]).unwrap();
        assert_eq!(config.command, Command::Parse { id: -i64::MAX });
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse(&["--app-id", "64", "watch"]).is_err());
        assert!(parse(&["--app-instance-id", "32", "watch"]).is_err());
        assert!(
            parse(&[
                "--drift-grace-ms",
                "60000",
                "--drift-catastrophic-secs",
                "60",
                "watch"
            ])
            .is_err()
        );

        let short = CliArgs::try_parse_from(["skid", "--mac-key", "00ff", "watch"]).unwrap();
        assert!(RunConfig::try_from(short).is_err());

        let not_hex = CliArgs::try_parse_from(["skid", "--mac-key", "zz", "watch"]).unwrap();
        assert!(RunConfig::try_from(not_hex).is_err());
    }
}
