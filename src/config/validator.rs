//! Configuration validation

use super::*;
use crate::error::KroneckerError;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    match config.mode {
        Mode::Serial => {
            validate_partitions(&config.partitions)?;
            validate_evaluator(&config.evaluator)?;
        }
        Mode::Master => {
            validate_partitions(&config.partitions)?;
            validate_master(&config.distributed)?;
        }
        Mode::Worker => {
            validate_evaluator(&config.evaluator)?;
            validate_worker(&config.distributed)?;
        }
    }

    if config.weight_multiplicity && config.mode != Mode::Serial {
        anyhow::bail!("--weight-multiplicity is only available in serial mode");
    }

    Ok(())
}

/// Validate the partition tuple (shape only; degrees are checked later)
pub fn validate_partitions(partitions: &[Weight]) -> Result<()> {
    if partitions.is_empty() {
        return Err(KroneckerError::InvalidDimensions("need at least one partition".to_string()).into());
    }
    if let Some(i) = partitions.iter().position(Weight::is_empty) {
        return Err(KroneckerError::InvalidDimensions(format!("partition {} is empty", i + 1)).into());
    }
    Ok(())
}

/// Exactly one back-end must be selected
pub fn validate_evaluator(evaluator: &EvaluatorConfig) -> Result<()> {
    let selected = [evaluator.barvinok.is_some(), evaluator.latte.is_some(), evaluator.enumerate]
        .iter()
        .filter(|&&s| s)
        .count();

    match selected {
        0 => Err(KroneckerError::NoEvaluatorConfigured.into()),
        1 => Ok(()),
        _ => Err(KroneckerError::ConflictingEvaluators.into()),
    }
}

/// Validate master settings
pub fn validate_master(distributed: &DistributedConfig) -> Result<()> {
    if distributed.port == 0 {
        anyhow::bail!("master port must be between 1 and 65535");
    }
    validate_authkey(distributed)?;

    if distributed.lease_timeout_secs == Some(0) {
        anyhow::bail!("lease timeout must be at least 1 second");
    }
    Ok(())
}

/// Validate worker settings
pub fn validate_worker(distributed: &DistributedConfig) -> Result<()> {
    match distributed.host.as_deref() {
        Some(host) if !host.trim().is_empty() => {}
        _ => anyhow::bail!("worker needs the master's host (-H/--host)"),
    }
    if distributed.port == 0 {
        anyhow::bail!("master port must be between 1 and 65535");
    }
    validate_authkey(distributed)?;

    if distributed.jobs == Some(0) {
        anyhow::bail!("jobs must be at least 1");
    }
    Ok(())
}

fn validate_authkey(distributed: &DistributedConfig) -> Result<()> {
    match distributed.authkey.as_deref() {
        Some(key) if !key.is_empty() => Ok(()),
        _ => anyhow::bail!("an authkey is required (-K/--authkey)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partitions() -> Vec<Weight> {
        vec![Weight::from_iter([1, 1]); 3]
    }

    fn serial() -> Config {
        Config {
            mode: Mode::Serial,
            partitions: partitions(),
            evaluator: EvaluatorConfig {
                enumerate: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn master() -> Config {
        Config {
            mode: Mode::Master,
            partitions: partitions(),
            distributed: DistributedConfig {
                authkey: Some("secret".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn worker() -> Config {
        Config {
            mode: Mode::Worker,
            evaluator: EvaluatorConfig {
                enumerate: true,
                ..Default::default()
            },
            distributed: DistributedConfig {
                host: Some("localhost".to_string()),
                authkey: Some("secret".to_string()),
                jobs: Some(2),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_configs() {
        validate_config(&serial()).unwrap();
        validate_config(&master()).unwrap();
        validate_config(&worker()).unwrap();
    }

    #[test]
    fn test_validate_evaluator() {
        let mut config = serial();
        config.evaluator = EvaluatorConfig::default();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KroneckerError>(),
            Some(KroneckerError::NoEvaluatorConfigured)
        ));

        config.evaluator = EvaluatorConfig {
            barvinok: Some(PathBuf::from("/usr/bin/barvinok_count")),
            latte: Some(PathBuf::from("/usr/bin/count")),
            enumerate: false,
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KroneckerError>(),
            Some(KroneckerError::ConflictingEvaluators)
        ));
    }

    #[test]
    fn test_master_needs_no_evaluator() {
        let config = master();
        assert!(config.evaluator.is_empty());
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_validate_master() {
        let mut config = master();
        config.distributed.port = 0;
        assert!(validate_config(&config).is_err());

        let mut config = master();
        config.distributed.authkey = Some(String::new());
        assert!(validate_config(&config).is_err());

        let mut config = master();
        config.distributed.authkey = None;
        assert!(validate_config(&config).is_err());

        let mut config = master();
        config.distributed.lease_timeout_secs = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_worker() {
        let mut config = worker();
        config.distributed.jobs = Some(0);
        assert!(validate_config(&config).is_err());

        let mut config = worker();
        config.distributed.host = None;
        assert!(validate_config(&config).is_err());

        let mut config = worker();
        config.distributed.authkey = None;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_partitions() {
        let mut config = serial();
        config.partitions.clear();
        assert!(validate_config(&config).is_err());

        let mut config = master();
        config.partitions.push(Weight::new(Vec::new()));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_weight_multiplicity_serial_only() {
        let mut config = serial();
        config.weight_multiplicity = true;
        validate_config(&config).unwrap();

        let mut config = master();
        config.weight_multiplicity = true;
        assert!(validate_config(&config).is_err());
    }
}
